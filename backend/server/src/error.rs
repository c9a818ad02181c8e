use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{
    database::{GatewayError, StoreError},
    sentiment::ModelError,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Both feedback text and user ID are required.")]
    MissingFields,

    #[error("Incorrect admin credentials")]
    Forbidden,

    #[error("Error inserting feedback")]
    InsertFailed,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ModelError),

    #[error("Template error: {0}")]
    Render(#[from] minijinja::Error),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Classifier(e) => AppError::Classifier(e),
            other => {
                error!("{other}");
                AppError::InsertFailed
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MissingFields => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InsertFailed
            | AppError::Store(_)
            | AppError::Classifier(_)
            | AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match self {
            AppError::Store(_) | AppError::Classifier(_) | AppError::Render(_) => {
                error!("{self}");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}
