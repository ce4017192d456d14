//! Quote search endpoint and index upkeep.
//!
//! Index updates follow successful writes. A failed index update is logged
//! and never fails the request: the quote is already committed.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Quote, QuoteStatus};
use crate::search::{QuoteDocument, QuoteQuery};
use crate::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

/// Query string of `GET /api/devis/search`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSearchHit {
    pub quote: Quote,
    pub score: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSearchResponse {
    pub hits: Vec<QuoteSearchHit>,
    pub limit: usize,
    pub offset: usize,
}

/// GET /api/devis/search - Find quotes by line label, motif or event name.
pub async fn search_quotes(
    State(state): State<AppState>,
    Query(params): Query<QuoteSearchParams>,
) -> ApiResult<QuoteSearchResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        None => None,
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

    let query = QuoteQuery {
        text: params.q,
        status,
        limit: params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        offset: params.offset,
    };

    let found = match state.search.search(&query) {
        Ok(found) => found,
        Err(e) => return error(e, revision_id),
    };

    let mut hits = Vec::with_capacity(found.len());
    for hit in found {
        match state.repo.get_quote(&hit.quote_id).await {
            Ok(Some(quote)) => hits.push(QuoteSearchHit {
                quote,
                score: hit.score,
            }),
            // Deleted between indexing and lookup.
            Ok(None) => {}
            Err(e) => return error(e, revision_id),
        }
    }

    success(
        QuoteSearchResponse {
            hits,
            limit: query.limit,
            offset: query.offset,
        },
        revision_id,
    )
}

/// Refresh the index entry of `quote` after a write.
pub(crate) async fn index_quote(state: &AppState, quote: &Quote) {
    let event_name = match state.repo.get_event(&quote.event_id).await {
        Ok(event) => event.map(|e| e.name).unwrap_or_default(),
        Err(e) => {
            tracing::warn!(quote_id = %quote.id, "Skipping quote index update: {}", e);
            return;
        }
    };

    let document = QuoteDocument {
        quote,
        event_name: &event_name,
    };
    if let Err(e) = state.search.upsert(&document).await {
        tracing::warn!(quote_id = %quote.id, "Failed to index quote: {}", e);
    }
}

/// Drop a deleted quote from the index.
pub(crate) async fn unindex_quote(state: &AppState, quote_id: &str) {
    if let Err(e) = state.search.remove(quote_id).await {
        tracing::warn!(quote_id = %quote_id, "Failed to remove quote from index: {}", e);
    }
}

/// Re-index every quote of an event whose name may have changed.
pub(crate) async fn reindex_event_quotes(state: &AppState, event_id: &str) {
    match state.repo.list_quotes(Some(event_id), None).await {
        Ok(quotes) => {
            for quote in &quotes {
                index_quote(state, quote).await;
            }
        }
        Err(e) => tracing::warn!(event_id = %event_id, "Failed to re-index quotes: {}", e),
    }
}
