//! Event API endpoints.

use axum::extract::{Path, State};

use super::search::reindex_event_quotes;
use super::{error, require_staff, success, ApiJson, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateEventRequest, Event, UpdateEventRequest};
use crate::workflow::ActorRole;
use crate::AppState;

/// GET /api/events - List all events.
pub async fn list_events(State(state): State<AppState>) -> ApiResult<Vec<Event>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_events().await {
        Ok(events) => success(events, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/events/{id} - Get a single event.
pub async fn get_event(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Event> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_event(&id).await {
        Ok(Some(event)) => success(event, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Event {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/events - Create a new event.
pub async fn create_event(
    State(state): State<AppState>,
    actor: ActorRole,
    ApiJson(request): ApiJson<CreateEventRequest>,
) -> ApiResult<Event> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_staff(actor) {
        return error(e, revision_id);
    }
    if request.name.trim().is_empty() {
        return error(
            AppError::Validation("Event name is required".to_string()),
            revision_id,
        );
    }

    match state.repo.create_event(&request, actor).await {
        Ok(event) => {
            tracing::info!(event_id = %event.id, "Event created");
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(event, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/events/{id} - Update an event.
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: ActorRole,
    ApiJson(request): ApiJson<UpdateEventRequest>,
) -> ApiResult<Event> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_staff(actor) {
        return error(e, revision_id);
    }

    match state.repo.update_event(&id, &request, actor).await {
        Ok(event) => {
            if request.name.is_some() {
                reindex_event_quotes(&state, &event.id).await;
            }
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(event, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/events/{id} - Delete an event without quotes.
///
/// Refused while quotes reference the event, so the quote index has nothing
/// to drop.
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: ActorRole,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = require_staff(actor) {
        return error(e, revision_id);
    }

    match state.repo.delete_event(&id, actor).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
