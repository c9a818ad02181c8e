use std::{
    fmt::Display,
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use thiserror::Error;
use tracing::{info, warn};

use crate::sentiment::{DEFAULT_MODEL_ID, ModelSource};

const SECRETS_DIR: &str = "/run/secrets";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(String),

    #[error("Invalid {key} value: {message}")]
    Invalid { key: String, message: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub openai_key: String,
    pub openai_url: String,
    pub openai_model: String,
    pub sentiment_retries: u32,
    pub backoff_unit: Duration,
    pub sentiment_model: ModelSource,
    pub supabase_url: String,
    pub supabase_key: String,
    pub feedback_table: String,
    pub admin_user: String,
    pub admin_password: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), Some(Path::new(SECRETS_DIR)))
    }

    /// Builds the config from an arbitrary key lookup. Secrets fall back to
    /// `<secrets_dir>/<NAME>` files when the lookup has no value for them.
    pub fn from_lookup<F>(lookup: F, secrets_dir: Option<&Path>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backoff_ms: u64 = try_load(&lookup, "SENTIMENT_BACKOFF_MS", "1000")?;

        Ok(Self {
            port: try_load(&lookup, "RUST_PORT", "8000")?,
            openai_key: read_secret(&lookup, secrets_dir, "OPENAI_API_KEY")?,
            openai_url: try_load(
                &lookup,
                "OPENAI_URL",
                "https://api.openai.com/v1/chat/completions",
            )?,
            openai_model: try_load(&lookup, "OPENAI_MODEL", "gpt-3.5-turbo")?,
            sentiment_retries: try_load(&lookup, "SENTIMENT_RETRIES", "3")?,
            backoff_unit: Duration::from_millis(backoff_ms),
            sentiment_model: model_source(&lookup)?,
            supabase_url: require(&lookup, "SUPABASE_URL")?,
            supabase_key: read_secret(&lookup, secrets_dir, "SUPABASE_API_KEY")?,
            feedback_table: try_load(&lookup, "SUPABASE_TABLE", "feedback")?,
            admin_user: try_load(&lookup, "ADMIN_USER", "admin")?,
            admin_password: read_secret(&lookup, secrets_dir, "ADMIN_PASSWORD")?,
        })
    }
}

/// `SENTIMENT_BACKEND` picks the model family. DistilBERT loads from
/// `SENTIMENT_MODEL_DIR` when set, otherwise from the hub repo `SENTIMENT_MODEL_ID`.
fn model_source<F>(lookup: &F) -> Result<ModelSource, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let backend: String = try_load(lookup, "SENTIMENT_BACKEND", "distilbert")?;

    match backend.to_lowercase().as_str() {
        "distilbert" => Ok(match var(lookup, "SENTIMENT_MODEL_DIR") {
            Some(dir) => ModelSource::Directory(PathBuf::from(dir.trim())),
            None => ModelSource::Hub(try_load(lookup, "SENTIMENT_MODEL_ID", DEFAULT_MODEL_ID)?),
        }),
        "lexicon" => Ok(ModelSource::Lexicon(
            var(lookup, "SENTIMENT_LEXICON_PATH").map(|path| PathBuf::from(path.trim())),
        )),
        other => {
            warn!("Invalid SENTIMENT_BACKEND value: {other}");

            Err(ConfigError::Invalid {
                key: "SENTIMENT_BACKEND".to_string(),
                message: format!("expected distilbert or lexicon, got {other}"),
            })
        }
    }
}

fn var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    var(lookup, key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .trim()
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");

            ConfigError::Invalid {
                key: key.to_string(),
                message: e.to_string(),
            }
        })
}

fn require<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(lookup, key).ok_or_else(|| {
        warn!("Environment variable {key} not found");
        ConfigError::Missing(key.to_string())
    })
}

fn read_secret<F>(
    lookup: &F,
    secrets_dir: Option<&Path>,
    secret_name: &str,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = var(lookup, secret_name) {
        return Ok(value.trim().to_string());
    }

    let Some(dir) = secrets_dir else {
        return Err(ConfigError::Missing(secret_name.to_string()));
    };

    read_to_string(dir.join(secret_name))
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            warn!("Failed to read {secret_name} from environment or secrets");
            ConfigError::Missing(secret_name.to_string())
        })
}
