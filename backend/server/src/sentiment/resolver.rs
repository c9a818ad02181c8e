use std::time::Duration;

use tokio::{task::spawn_blocking, time::sleep};
use tracing::warn;

use super::{
    fallback::{FallbackClassifier, ModelError},
    remote::{ChatClient, RemoteError},
};

pub const ERROR_MARKER: &str = "Error";

pub struct SentimentResolver {
    chat: ChatClient,
    fallback: FallbackClassifier,
    retries: u32,
    backoff_unit: Duration,
}

impl SentimentResolver {
    pub fn new(
        chat: ChatClient,
        fallback: FallbackClassifier,
        retries: u32,
        backoff_unit: Duration,
    ) -> Self {
        Self {
            chat,
            fallback,
            retries,
            backoff_unit,
        }
    }

    /// Remote label when the API answers, local label once it is rate limited past
    /// the retry budget or fails, and [`ERROR_MARKER`] when no attempt produced either.
    pub async fn resolve(&self, text: &str) -> Result<String, ModelError> {
        let mut attempt = 0;

        while attempt < self.retries {
            match self.chat.analyze(text).await {
                Ok(sentiment) => return Ok(sentiment),
                Err(RemoteError::RateLimited) => {
                    attempt += 1;

                    if attempt < self.retries {
                        let wait = self.backoff(attempt - 1);
                        warn!("Completion API rate limited, retrying in {wait:?}");

                        sleep(wait).await;
                    }
                }
                Err(RemoteError::EmptyCompletion) => {
                    warn!("Completion API returned no content");
                    return Ok(ERROR_MARKER.to_string());
                }
                Err(e) => {
                    warn!("{e}. Using local model for sentiment analysis.");
                    return self.classify_locally(text).await;
                }
            }
        }

        if attempt == 0 {
            return Ok(ERROR_MARKER.to_string());
        }

        warn!("Completion API retries exhausted. Using local model for sentiment analysis.");
        self.classify_locally(text).await
    }

    /// Runs the local model on the blocking pool so inference never stalls the runtime.
    async fn classify_locally(&self, text: &str) -> Result<String, ModelError> {
        let fallback = self.fallback.clone();
        let text = text.to_string();

        spawn_blocking(move || fallback.classify(&text))
            .await
            .map_err(|err| ModelError::Inference(err.to_string()))?
    }

    /// Saturates at [`Duration::MAX`] instead of overflowing.
    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }
}
