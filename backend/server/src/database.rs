//! # Supabase
//!
//! Hosted Postgres behind PostgREST. Only durable state this service has.
//!
//! ## Schema
//! - Table `feedback` (name configurable)
//! - Columns: feedback_id (**uuid**), user_id (**text**), feedback_text (**text**), sentiment (**text**)
//! - Extra columns such as `created_at` are ignored on read
//!
//! ## Access
//! - Select: `GET /rest/v1/feedback?select=*`, rows in store order, no sort applied
//! - Insert: `POST /rest/v1/feedback` with `Prefer: return=representation` so the inserted rows come back
//! - Both send `apikey` and a bearer token with the same key
//!
//! Records are append-only. No update or delete path exists.
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::sentiment::{ModelError, SentimentResolver};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub feedback_id: Uuid,
    pub user_id: String,
    pub feedback_text: String,
    pub sentiment: String,
}

/// Submitted feedback before it gets an id and a sentiment.
#[derive(Clone, Debug)]
pub struct NewFeedback {
    pub user_id: String,
    pub feedback_text: String,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Store rejected request with {0}")]
    Rejected(StatusCode),
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Sentiment classification failed: {0}")]
    Classifier(#[from] ModelError),

    #[error("Failed to insert feedback {feedback_id}: {source}")]
    Store {
        feedback_id: Uuid,
        source: StoreError,
    },

    #[error("Store reported no inserted rows for feedback {0}")]
    NothingInserted(Uuid),
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn select_all(&self) -> Result<Vec<FeedbackRecord>, StoreError>;

    /// Returns the rows the store reports as inserted.
    async fn insert(&self, record: &FeedbackRecord) -> Result<Vec<FeedbackRecord>, StoreError>;
}

pub struct SupabaseStore {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(client: Client, supabase_url: &str, api_key: String, table: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/rest/v1/{table}", supabase_url.trim_end_matches('/')),
            api_key,
        }
    }
}

#[async_trait]
impl FeedbackStore for SupabaseStore {
    async fn select_all(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("select", "*")])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Rejected(response.status()));
        }

        Ok(response.json().await?)
    }

    async fn insert(&self, record: &FeedbackRecord) -> Result<Vec<FeedbackRecord>, StoreError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.api_key)
            .header("Prefer", "return=representation")
            .bearer_auth(&self.api_key)
            .json(&[record])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Rejected(response.status()));
        }

        Ok(response.json().await?)
    }
}

pub struct FeedbackGateway {
    store: Arc<dyn FeedbackStore>,
    resolver: SentimentResolver,
}

impl FeedbackGateway {
    pub fn new(store: Arc<dyn FeedbackStore>, resolver: SentimentResolver) -> Self {
        Self { store, resolver }
    }

    pub async fn fetch_all(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        self.store.select_all().await
    }

    /// Assigns a fresh id and a resolved sentiment, then persists the record once.
    pub async fn insert(&self, feedback: NewFeedback) -> Result<FeedbackRecord, GatewayError> {
        let feedback_id = Uuid::new_v4();
        let sentiment = self.resolver.resolve(&feedback.feedback_text).await?;

        let record = FeedbackRecord {
            feedback_id,
            user_id: feedback.user_id,
            feedback_text: feedback.feedback_text,
            sentiment,
        };

        let inserted = self
            .store
            .insert(&record)
            .await
            .map_err(|source| GatewayError::Store {
                feedback_id,
                source,
            })?;

        let persisted = inserted
            .into_iter()
            .next()
            .ok_or(GatewayError::NothingInserted(feedback_id))?;
        info!(
            "Inserted feedback {} with sentiment {}",
            persisted.feedback_id, persisted.sentiment
        );

        Ok(persisted)
    }
}
