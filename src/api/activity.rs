//! Activity log API endpoint.

use axum::extract::{Query, State};

use super::{error, success, ApiResult};
use crate::models::{ActivityEntry, ActivityFilter};
use crate::AppState;

/// GET /api/activity - Recent writes, newest first.
pub async fn list_activity(
    State(state): State<AppState>,
    Query(filter): Query<ActivityFilter>,
) -> ApiResult<Vec<ActivityEntry>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_activity(&filter).await {
        Ok(entries) => success(entries, revision_id),
        Err(e) => error(e, revision_id),
    }
}
