//! # Sentiment
//!
//! Labels feedback text before it is persisted.
//!
//! - Remote OpenAI-compatible chat completion, reply used verbatim
//! - 429 retried with `2^attempt` backoff up to the retry budget
//! - Any other failure, or an exhausted budget, goes to the local [`FallbackClassifier`],
//!   a DistilBERT SST-2 model by default
//!
//! Remote labels are free text while fallback labels come from a fixed vocabulary.
//! Both land in the same `sentiment` column.
pub mod distilbert;
pub mod fallback;
pub mod lexicon;
pub mod remote;
pub mod resolver;

pub use distilbert::DistilBertClassifier;
pub use fallback::{
    DEFAULT_MODEL_ID, FallbackClassifier, ModelError, ModelSource, Prediction, SentimentModel,
};
pub use lexicon::LexiconModel;
pub use remote::{ChatClient, RemoteError};
pub use resolver::{ERROR_MARKER, SentimentResolver};
