//! REST API module.
//!
//! Contains all API routes and handlers following the frontend contract.

mod activity;
mod events;
mod quotes;
mod revision;
mod search;

pub use activity::*;
pub use events::*;
pub use quotes::*;
pub use revision::*;
pub use search::*;

use axum::{
    extract::{FromRequest, OptionalFromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::{AppError, AppErrorWithRevision};
use crate::workflow::ActorRole;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    Err(AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// JSON request body whose rejections use the error envelope.
///
/// Malformed bodies (bad syntax, wrong types, unparsable amounts) are
/// `VALIDATION_ERROR`; a missing JSON content type is `BAD_REQUEST`.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppErrorWithRevision;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match <Json<T> as FromRequest<S>>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppErrorWithRevision {
                error: rejection.into(),
                revision_id: 0,
            }),
        }
    }
}

impl<T, S> OptionalFromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppErrorWithRevision;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        match <Json<T> as OptionalFromRequest<S>>::from_request(req, state).await {
            Ok(value) => Ok(value.map(|Json(value)| ApiJson(value))),
            Err(rejection) => Err(AppErrorWithRevision {
                error: rejection.into(),
                revision_id: 0,
            }),
        }
    }
}

/// Reject non-staff callers on back-office routes.
pub fn require_staff(actor: ActorRole) -> Result<(), AppError> {
    match actor {
        ActorRole::Staff => Ok(()),
        ActorRole::Client => Err(AppError::Forbidden(
            "This operation is reserved to agency staff".to_string(),
        )),
    }
}
