use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::HttpError;

/// JSON body that has been deserialized *and* validated
///
/// Any rejection (wrong content type, malformed JSON, missing or mistyped
/// fields, failed `validator` rules) becomes a 400 in the usual error envelope
/// instead of axum's plain-text 415/422.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                tracing::error!("Rejected request body: {}", rejection.body_text());
                HttpError::bad_request(rejection.body_text())
            })?;

        value.validate().map_err(|e| {
            tracing::error!("Invalid request body: {}", e);
            HttpError::bad_request(e.to_string())
        })?;

        Ok(ValidatedJson(value))
    }
}

/// Query string that has been deserialized and validated, same envelope as
/// [`ValidatedJson`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::error!("Rejected query string: {}", rejection.body_text());
                HttpError::bad_request(rejection.body_text())
            })?;

        value.validate().map_err(|e| {
            tracing::error!("Invalid query string: {}", e);
            HttpError::bad_request(e.to_string())
        })?;

        Ok(ValidatedQuery(value))
    }
}

/// Path parameters; a segment that does not parse (`/titles/abc/`) is a 400
/// in the error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathParams<T>(pub T);

impl<T, S> FromRequestParts<S> for PathParams<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::error!("Rejected path: {}", rejection.body_text());
                HttpError::bad_request(rejection.body_text())
            })?;

        Ok(PathParams(value))
    }
}
