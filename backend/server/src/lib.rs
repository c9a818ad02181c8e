//! Feedback collection service with sentiment labelling.
//!
//!
//!
//! # General Flow
//! - User submits feedback text and a user ID through the form on `/`
//! - Handler rejects the submission if either field is empty
//! - Sentiment is resolved remotely, falling back to the local model when needed
//! - Record gets a fresh UUID and the label, then is inserted into Supabase once
//! - User is redirected back to `/`, which re-fetches every record
//!
//!
//!
//! # Routes
//!
//! | Method | Path | Result |
//! |---|---|---|
//! | GET | `/` | listing page + submission form |
//! | POST | `/submit_feedback` | 303 to `/`, 422 on missing fields, 500 on failed insert |
//! | GET | `/admin_analysis` | admin login form |
//! | POST | `/view_analysis` | analysis page, 403 on wrong credentials |
//!
//!
//!
//! # Notes
//!
//! ## Sentiment Representation
//! Remote labels are whatever text the completion API replies with, e.g. `Positive` or a
//! whole sentence. Fallback labels are `POSITIVE`, `NEGATIVE` or `Neutral`. Both are stored
//! as-is in the same column, so the admin summary may show the same polarity twice.
//!
//! ## Backoff
//! Rate limited completion calls wait on a tokio timer. Only the request being retried is
//! suspended, other requests keep being served.
//!
//! ## Local Model
//! `distilbert-base-uncased-finetuned-sst-2-english` on CPU via candle, loaded once at startup
//! from `SENTIMENT_MODEL_DIR` or the Hugging Face hub cache. Inference runs on the blocking
//! pool. `SENTIMENT_BACKEND=lexicon` swaps in a word list for hosts without the weights.
//!
//! ## Admin Access
//! One credential pair from config, compared with plain string equality.
//!
//!
//!
//! # Setup
//!
//! Required settings, either as env vars or as files under `/run/secrets`.
//! ```sh
//! export OPENAI_API_KEY=...
//! export SUPABASE_URL=https://<project>.supabase.co
//! export SUPABASE_API_KEY=...
//! export ADMIN_PASSWORD=...
//! ```
//!
//! Table expected by the store.
//! ```sql
//! create table feedback (
//!     feedback_id uuid primary key,
//!     user_id text not null,
//!     feedback_text text not null,
//!     sentiment text not null,
//!     created_at timestamptz default now()
//! );
//! ```
//!
//! Optional, pre-downloaded model weights.
//! ```sh
//! export SENTIMENT_MODEL_DIR=/models/distilbert-sst2  # config.json, vocab.txt, model.safetensors
//! ```
//!
//! Run with logs.
//! ```sh
//! RUST_LOG=info cargo run -p feedback
//! ```
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal, task::spawn_blocking};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod pages;
pub mod routes;
pub mod sentiment;
pub mod state;

#[cfg(test)]
mod testing;

use config::Config;
use routes::{
    admin_analysis_handler, index_handler, submit_feedback_handler, view_analysis_handler,
};
use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/submit_feedback", post(submit_feedback_handler))
        .route("/admin_analysis", get(admin_analysis_handler))
        .route("/view_analysis", post(view_analysis_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = spawn_blocking(move || AppState::new(config)).await??;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
