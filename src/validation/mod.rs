//! Request extractors that decode (applying serde defaults) and then run the
//! declarative `validator` rules, before the handler body sees the value.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Json, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use crate::error::ApiError;

/// JSON body that has passed both decoding and validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation_error(rejection.body_text(), None))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string that has passed both decoding and validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::validation_error(rejection.body_text(), None))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Path parameters whose decoding failures use the JSON error envelope.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Decodes and validates an embedded JSON value, e.g. a per-step payload
/// whose schema depends on a sibling field.
pub fn validate_value<T>(value: Value) -> Result<T, ApiError>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T =
        serde_json::from_value(value).map_err(|e| ApiError::validation_error(e.to_string(), None))?;
    parsed.validate()?;
    Ok(parsed)
}

/// Rejects blank entries in a list of strings.
pub fn non_blank_items(items: &[String]) -> Result<(), validator::ValidationError> {
    if items.iter().any(|item| item.trim().is_empty()) {
        let mut err = validator::ValidationError::new("blank_item");
        err.message = Some("entries must not be blank".into());
        return Err(err);
    }
    Ok(())
}
