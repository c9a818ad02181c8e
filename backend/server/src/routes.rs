use std::sync::Arc;

use axum::{
    Form,
    extract::{State, rejection::FormRejection},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{database::NewFeedback, error::AppError, state::AppState};

#[derive(Deserialize)]
pub struct FeedbackForm {
    #[serde(default)]
    feedback_text: String,
    #[serde(default)]
    user_id: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    password: String,
}

pub async fn index_handler(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let records = state.gateway.fetch_all().await?;

    Ok(Html(state.pages.index(&records, false)?))
}

pub async fn submit_feedback_handler(
    State(state): State<Arc<AppState>>,
    form: Result<Form<FeedbackForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let Form(form) = form.map_err(|rejection| {
        warn!("Unreadable feedback submission: {rejection}");
        AppError::MissingFields
    })?;

    info!(
        "Received feedback_text: {}, user_id: {}",
        form.feedback_text, form.user_id
    );

    if form.feedback_text.is_empty() || form.user_id.is_empty() {
        return Err(AppError::MissingFields);
    }

    state
        .gateway
        .insert(NewFeedback {
            user_id: form.user_id,
            feedback_text: form.feedback_text,
        })
        .await?;

    Ok(Redirect::to("/"))
}

pub async fn admin_analysis_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, AppError> {
    Ok(Html(state.pages.login()?))
}

pub async fn view_analysis_handler(
    State(state): State<Arc<AppState>>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Html<String>, AppError> {
    let Form(form) = form.map_err(|rejection| {
        warn!("Unreadable admin login: {rejection}");
        AppError::Forbidden
    })?;

    if form.user_id != state.config.admin_user || form.password != state.config.admin_password {
        warn!("Rejected admin login for user_id: {}", form.user_id);
        return Err(AppError::Forbidden);
    }

    let records = state.gateway.fetch_all().await?;

    Ok(Html(state.pages.analysis(&records)?))
}
