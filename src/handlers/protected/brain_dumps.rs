// handlers/protected/brain_dumps.rs - /api/brain-dumps and /api/brain-dumps/:id handlers

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::Identity;
use crate::database::models::BrainDump;
use crate::error::ApiError;
use crate::handlers::public::auth::validation::FieldErrors;
use crate::middleware::{ApiResponse, ApiResult};

pub const CONTENT_MAX: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct BrainDumpRequest {
    #[serde(default)]
    pub content: String,
}

impl BrainDumpRequest {
    fn validated(self) -> Result<String, ApiError> {
        let mut errors = FieldErrors::new();
        if self.content.trim().is_empty() {
            errors.add("content", "Content is required");
        } else if self.content.chars().count() > CONTENT_MAX {
            errors.add("content", format!("Content must be at most {} characters", CONTENT_MAX));
        }
        errors.into_result()?;
        Ok(self.content)
    }
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Brain dump {} not found", id))
}

/// GET /api/brain-dumps - The caller's brain dumps, newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<BrainDump>> {
    let dumps = state.brain_dumps.list(identity.user.id).await?;
    Ok(ApiResponse::success(dumps))
}

/// POST /api/brain-dumps - Create a brain dump
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<BrainDumpRequest>, JsonRejection>,
) -> ApiResult<BrainDump> {
    let Json(request) = payload?;
    let content = request.validated()?;

    let dump = state.brain_dumps.create(identity.user.id, &content).await?;
    tracing::debug!("Brain dump {} created by {}", dump.id, identity.user.username);
    Ok(ApiResponse::created(dump))
}

/// GET /api/brain-dumps/:id - One brain dump; other users' dumps are 404
pub async fn show(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<BrainDump> {
    let dump = state
        .brain_dumps
        .find(identity.user.id, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(ApiResponse::success(dump))
}

/// PUT /api/brain-dumps/:id - Replace a brain dump's content
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    payload: Result<Json<BrainDumpRequest>, JsonRejection>,
) -> ApiResult<BrainDump> {
    let Json(request) = payload?;
    let content = request.validated()?;

    let dump = state
        .brain_dumps
        .update(identity.user.id, id, &content)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(ApiResponse::success(dump))
}

/// DELETE /api/brain-dumps/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    if !state.brain_dumps.delete(identity.user.id, id).await? {
        return Err(not_found(id));
    }
    Ok(ApiResponse::no_content())
}
