use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use common::{Action, TotalStats, UserStats};
use myerrors::AppError;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use vision::sanitize_label;

use crate::service::Translator;

#[derive(Clone)]
pub struct AppState {
    pub translator: Arc<dyn Translator>,
    pub pool: SqlitePool,
    pub max_upload_bytes: usize,
}

#[derive(Deserialize)]
pub struct UserStatsRequest {
    pub user_id: String,
}

#[derive(Serialize)]
pub struct TranslationResponse {
    pub translated_text: String,
}

/// Fields of one `/upload/` form.
#[derive(Debug)]
pub struct UploadForm {
    pub image: Vec<u8>,
    pub target_language: String,
    pub user_id: Option<String>,
}

fn multipart_error(e: MultipartError, context: &str, limit: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("upload exceeds the {limit} byte size limit"))
    } else {
        AppError::bad_request(format!("{context}: {}", e.body_text()))
    }
}

async fn read_upload_form(mut multipart: Multipart, limit: usize) -> Result<UploadForm, AppError> {
    let mut image = None;
    let mut target_language = None;
    let mut user_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "invalid multipart body", limit))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, "failed to read file", limit))?;
                image = Some(data.to_vec());
            }
            "target_language" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, "failed to read target_language", limit))?;
                target_language = Some(text);
            }
            "user_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, "failed to read user_id", limit))?;
                user_id = Some(text);
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| AppError::bad_request("missing form field `file`"))?;
    if image.is_empty() {
        return Err(AppError::bad_request("uploaded file is empty"));
    }
    // Validate what the model will actually see.
    let target_language = target_language
        .map(|t| sanitize_label(&t).trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::bad_request("missing form field `target_language`"))?;
    let user_id = user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());

    Ok(UploadForm {
        image,
        target_language,
        user_id,
    })
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranslationResponse>, AppError> {
    let multipart = multipart.map_err(|e| AppError::bad_request(e.body_text()))?;
    let form = read_upload_form(multipart, state.max_upload_bytes).await?;

    log::info!(
        "Translating {} byte image into {:?}",
        form.image.len(),
        form.target_language
    );

    let translated_text = state
        .translator
        .translate(&form.image, &form.target_language)
        .await?;

    // Losing a usage row is cheaper than losing a finished translation.
    if let Some(user_id) = &form.user_id {
        if let Err(e) = db::record_usage(&state.pool, user_id, Action::UploadAndTranslate).await {
            log::error!("Failed to record usage for {user_id}: {e:#}");
        }
    }

    Ok(Json(TranslationResponse { translated_text }))
}

pub async fn user_stats(
    State(state): State<AppState>,
    request: Result<Json<UserStatsRequest>, JsonRejection>,
) -> Result<Json<UserStats>, AppError> {
    let Json(request) = request.map_err(|e| AppError::bad_request(e.body_text()))?;
    let stats = db::usage_by_user(&state.pool, &request.user_id).await?;
    Ok(Json(UserStats {
        user_id: request.user_id,
        stats,
    }))
}

pub async fn total_stats(State(state): State<AppState>) -> Result<Json<TotalStats>, AppError> {
    let total_stats = db::usage_total(&state.pool).await?;
    Ok(Json(TotalStats { total_stats }))
}
