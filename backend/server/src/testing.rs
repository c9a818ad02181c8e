use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{Router, routing::MethodRouter};
use reqwest::Client;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::{
    config::Config,
    database::{FeedbackGateway, FeedbackRecord, FeedbackStore, StoreError},
    sentiment::{ChatClient, FallbackClassifier, LexiconModel, ModelSource, SentimentResolver},
    state::AppState,
};

/// Nothing listens on port 1, so completion calls fail fast and fall back locally.
pub const OFFLINE_URL: &str = "http://127.0.0.1:1/v1/chat/completions";

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<FeedbackRecord>>,
    drop_inserts: bool,
}

impl MemoryStore {
    /// Accepts inserts but reports no rows, like a store that silently rejects them.
    pub fn dropping() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            drop_inserts: true,
        }
    }

    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn select_all(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        Ok(self.records())
    }

    async fn insert(&self, record: &FeedbackRecord) -> Result<Vec<FeedbackRecord>, StoreError> {
        if self.drop_inserts {
            return Ok(Vec::new());
        }

        self.records.lock().unwrap().push(record.clone());
        Ok(vec![record.clone()])
    }
}

pub async fn spawn_router(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{address}")
}

/// Serves `route` as a chat completion endpoint and returns its full URL.
pub async fn spawn_mock(route: MethodRouter) -> String {
    let base = spawn_router(Router::new().route("/v1/chat/completions", route)).await;

    format!("{base}/v1/chat/completions")
}

pub fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

/// Builtin lexicon, stands in for the DistilBERT weights in tests.
pub fn lexicon_fallback() -> FallbackClassifier {
    FallbackClassifier::new(Arc::new(LexiconModel::builtin()))
}

pub fn resolver_with(url: &str, retries: u32, backoff_unit: Duration) -> SentimentResolver {
    SentimentResolver::new(
        ChatClient::new(
            Client::new(),
            url.to_string(),
            "sk-test".to_string(),
            "gpt-3.5-turbo".to_string(),
        ),
        lexicon_fallback(),
        retries,
        backoff_unit,
    )
}

pub fn resolver_for(url: &str) -> SentimentResolver {
    resolver_with(url, 3, Duration::from_millis(1))
}

pub fn offline_resolver() -> SentimentResolver {
    resolver_for(OFFLINE_URL)
}

pub fn test_config() -> Config {
    Config {
        port: 0,
        openai_key: "sk-test".to_string(),
        openai_url: OFFLINE_URL.to_string(),
        openai_model: "gpt-3.5-turbo".to_string(),
        sentiment_retries: 3,
        backoff_unit: Duration::from_millis(1),
        sentiment_model: ModelSource::Lexicon(None),
        supabase_url: "http://127.0.0.1:1".to_string(),
        supabase_key: "anon".to_string(),
        feedback_table: "feedback".to_string(),
        admin_user: "admin".to_string(),
        admin_password: "password".to_string(),
    }
}

pub fn test_state(store: Arc<dyn FeedbackStore>, resolver: SentimentResolver) -> Arc<AppState> {
    AppState::with_gateway(test_config(), FeedbackGateway::new(store, resolver)).unwrap()
}
