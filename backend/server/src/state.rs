use std::sync::Arc;

use reqwest::Client;

use super::{
    config::Config,
    database::{FeedbackGateway, SupabaseStore},
    pages::Pages,
    sentiment::{ChatClient, FallbackClassifier, SentimentResolver},
};

pub struct AppState {
    pub config: Config,
    pub gateway: FeedbackGateway,
    pub pages: Pages,
}

impl AppState {
    /// Loads the fallback model and compiles the templates. Blocking, call off the runtime.
    pub fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let client = Client::new();

        let fallback = FallbackClassifier::load(&config.sentiment_model)?;
        let chat = ChatClient::new(
            client.clone(),
            config.openai_url.clone(),
            config.openai_key.clone(),
            config.openai_model.clone(),
        );
        let resolver = SentimentResolver::new(
            chat,
            fallback,
            config.sentiment_retries,
            config.backoff_unit,
        );

        let store = SupabaseStore::new(
            client,
            &config.supabase_url,
            config.supabase_key.clone(),
            &config.feedback_table,
        );

        Ok(Self::with_gateway(
            config,
            FeedbackGateway::new(Arc::new(store), resolver),
        )?)
    }

    pub fn with_gateway(
        config: Config,
        gateway: FeedbackGateway,
    ) -> Result<Arc<Self>, minijinja::Error> {
        Ok(Arc::new(Self {
            config,
            gateway,
            pages: Pages::new()?,
        }))
    }
}
