//! Quote (devis) API endpoints.
//!
//! Handlers translate HTTP calls into workflow commands; every legality
//! decision is taken by `crate::workflow`.

use axum::extract::{Path, Query, State};
use serde::Serialize;

use super::search::{index_quote, unindex_quote};
use super::{error, success, ApiJson, ApiResult};
use crate::errors::AppError;
use crate::models::{
    CreateQuoteRequest, ModificationRequest, Quote, QuoteFilter, QuoteStatus, TransitionRequest,
    UpdateQuoteRequest,
};
use crate::workflow::{allowed_actions, ActorRole, QuoteAction, QuoteCommand};
use crate::AppState;

/// Actions offered to the caller on one quote.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteActions {
    pub quote_id: String,
    pub status: QuoteStatus,
    pub role: ActorRole,
    pub actions: Vec<QuoteAction>,
}

/// GET /api/devis - List quotes, optionally by event and status.
pub async fn list_quotes(
    State(state): State<AppState>,
    Query(filter): Query<QuoteFilter>,
) -> ApiResult<Vec<Quote>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let status = match filter.status.as_deref() {
        None | Some("") => None,
        Some(raw) => match QuoteStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return error(
                    AppError::Validation(format!("Unknown quote status: {}", raw)),
                    revision_id,
                )
            }
        },
    };

    match state
        .repo
        .list_quotes(filter.event_id.as_deref(), status)
        .await
    {
        Ok(quotes) => success(quotes, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/devis/{id} - Get a single quote.
pub async fn get_quote(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Quote> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_quote(&id).await {
        Ok(Some(quote)) => success(quote, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Quote {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/devis/{id}/actions - Actions the calling role may attempt.
pub async fn get_quote_actions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: ActorRole,
) -> ApiResult<QuoteActions> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_quote(&id).await {
        Ok(Some(quote)) => success(
            QuoteActions {
                actions: allowed_actions(quote.status, actor),
                quote_id: quote.id,
                status: quote.status,
                role: actor,
            },
            revision_id,
        ),
        Ok(None) => error(
            AppError::NotFound(format!("Quote {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/devis - Create a draft quote for an event.
pub async fn create_quote(
    State(state): State<AppState>,
    actor: ActorRole,
    ApiJson(request): ApiJson<CreateQuoteRequest>,
) -> ApiResult<Quote> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state
        .repo
        .create_quote(&request, state.config.default_vat_rate, actor)
        .await
    {
        Ok(quote) => {
            tracing::info!(quote_id = %quote.id, event_id = %quote.event_id, "Quote created");
            index_quote(&state, &quote).await;
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(quote, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/devis/{id} - Replace the line items and VAT rate of a quote.
pub async fn update_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: ActorRole,
    ApiJson(request): ApiJson<UpdateQuoteRequest>,
) -> ApiResult<Quote> {
    let command = QuoteCommand::Edit {
        line_items: request.line_items,
        vat_rate: request.vat_rate,
    };
    run_command(&state, &id, actor, command, request.expected_version).await
}

/// POST /api/devis/{id}/send - Send the quote to the client.
pub async fn send_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: ActorRole,
    body: Option<ApiJson<TransitionRequest>>,
) -> ApiResult<Quote> {
    let expected_version = body.and_then(|ApiJson(b)| b.expected_version);
    let result = run_command(&state, &id, actor, QuoteCommand::Send, expected_version).await;

    if let Ok(response) = &result {
        // Delivery to the client (mail, PDF) is handled outside this service.
        tracing::info!(
            quote_id = %id,
            event_id = %response.data.event_id,
            "Client notification requested"
        );
    }
    result
}

/// POST /api/devis/{id}/review - Client opens the quote for review.
pub async fn review_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: ActorRole,
    body: Option<ApiJson<TransitionRequest>>,
) -> ApiResult<Quote> {
    let expected_version = body.and_then(|ApiJson(b)| b.expected_version);
    run_command(&state, &id, actor, QuoteCommand::Review, expected_version).await
}

/// POST /api/devis/{id}/accept - Client accepts the quote.
pub async fn accept_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: ActorRole,
    body: Option<ApiJson<TransitionRequest>>,
) -> ApiResult<Quote> {
    let expected_version = body.and_then(|ApiJson(b)| b.expected_version);
    run_command(&state, &id, actor, QuoteCommand::Accept, expected_version).await
}

/// POST /api/devis/{id}/refuse - Client rejects the quote.
pub async fn refuse_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: ActorRole,
    body: Option<ApiJson<TransitionRequest>>,
) -> ApiResult<Quote> {
    let expected_version = body.and_then(|ApiJson(b)| b.expected_version);
    run_command(&state, &id, actor, QuoteCommand::Reject, expected_version).await
}

/// POST /api/devis/{id}/modify - Client asks for changes, with a reason.
pub async fn request_quote_modification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: ActorRole,
    ApiJson(request): ApiJson<ModificationRequest>,
) -> ApiResult<Quote> {
    let command = QuoteCommand::RequestModification {
        motif: request.motif,
    };
    run_command(&state, &id, actor, command, request.expected_version).await
}

/// DELETE /api/devis/{id} - Delete a quote that was never accepted.
pub async fn delete_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: ActorRole,
    Query(params): Query<TransitionRequest>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state
        .repo
        .delete_quote(&id, actor, params.expected_version)
        .await
    {
        Ok(()) => {
            unindex_quote(&state, &id).await;
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

async fn run_command(
    state: &AppState,
    id: &str,
    actor: ActorRole,
    command: QuoteCommand,
    expected_version: Option<i64>,
) -> ApiResult<Quote> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state
        .repo
        .apply_quote_command(id, command, actor, expected_version)
        .await
    {
        Ok(quote) => {
            index_quote(state, &quote).await;
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(quote, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
