//! # Fallback Classifier
//!
//! Local sentiment model used whenever the remote completion API is rate limited
//! past its retry budget or fails outright.
//!
//! ## Models
//! - [`DistilBertClassifier`]: `distilbert-base-uncased-finetuned-sst-2-english`, run on
//!   CPU with candle. Production default, fetched from the Hugging Face hub unless a local
//!   directory is configured
//! - [`LexiconModel`]: weighted word list, opt-in for machines without the weights
//!
//! Either model is loaded once at startup. A model that fails to load stops the process.
//!
//! ## Labels
//! The first prediction wins. A missing label, or one outside the model's vocabulary,
//! is reported as `Neutral`.
use std::{path::PathBuf, sync::Arc};

use thiserror::Error;
use tracing::info;

use super::{distilbert::DistilBertClassifier, lexicon::LexiconModel};

pub const POSITIVE: &str = "POSITIVE";
pub const NEGATIVE: &str = "NEGATIVE";
pub const NEUTRAL: &str = "Neutral";

pub const DEFAULT_MODEL_ID: &str = "distilbert/distilbert-base-uncased-finetuned-sst-2-english";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read lexicon {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed lexicon entry on line {line}: {content}")]
    Parse { line: usize, content: String },

    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Where the fallback model comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelSource {
    /// Directory holding `config.json`, `vocab.txt` and `model.safetensors`.
    Directory(PathBuf),
    /// Hugging Face hub model id, cached locally after the first download.
    Hub(String),
    /// Word lexicon, from a file when given.
    Lexicon(Option<PathBuf>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub label: Option<String>,
    pub score: f32,
}

pub trait SentimentModel: Send + Sync {
    fn predict(&self, text: &str) -> Result<Vec<Prediction>, ModelError>;

    /// Labels this model may emit.
    fn vocabulary(&self) -> &[String];
}

#[derive(Clone)]
pub struct FallbackClassifier {
    model: Arc<dyn SentimentModel>,
}

impl FallbackClassifier {
    pub fn new(model: Arc<dyn SentimentModel>) -> Self {
        Self { model }
    }

    pub fn load(source: &ModelSource) -> Result<Self, ModelError> {
        info!("Loading fallback sentiment model from {source:?}");

        let model: Arc<dyn SentimentModel> = match source {
            ModelSource::Directory(dir) => Arc::new(DistilBertClassifier::from_dir(dir)?),
            ModelSource::Hub(model_id) => Arc::new(DistilBertClassifier::from_hub(model_id)?),
            ModelSource::Lexicon(Some(path)) => Arc::new(LexiconModel::from_file(path)?),
            ModelSource::Lexicon(None) => Arc::new(LexiconModel::builtin()),
        };

        Ok(Self::new(model))
    }

    pub fn classify(&self, text: &str) -> Result<String, ModelError> {
        let predictions = self.model.predict(text)?;

        let label = predictions
            .into_iter()
            .next()
            .and_then(|prediction| prediction.label)
            .filter(|label| self.model.vocabulary().contains(label))
            .unwrap_or_else(|| NEUTRAL.to_string());

        Ok(label)
    }
}
