use axum::{
    extract::{Form, FromRequest, Json, Request},
    http::header::CONTENT_TYPE,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::api::models::CheckRequest;
use crate::error::{AppError, Result};

const INVALID_URL: &str = "URL is invalid.";

/// Accepts `{"url": "..."}` as JSON or as a urlencoded form.
#[axum::async_trait]
impl<S> FromRequest<S> for CheckRequest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        let url = if is_form {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| {
                    debug!(error = %e, "rejected form body");
                    AppError::InvalidInput(INVALID_URL.to_string())
                })?;
            fields.get("url").cloned().map(Value::String)
        } else {
            let Json(body) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| {
                    debug!(error = %e, "rejected JSON body");
                    AppError::InvalidInput(INVALID_URL.to_string())
                })?;
            body.get("url").cloned()
        };

        validate_url(url.as_ref())
    }
}

/// The `url` field must be a string that is not blank.
pub fn validate_url(url: Option<&Value>) -> Result<CheckRequest> {
    match url.and_then(Value::as_str).map(str::trim) {
        Some(url) if !url.is_empty() => Ok(CheckRequest { url: url.to_string() }),
        _ => Err(AppError::InvalidInput(INVALID_URL.to_string())),
    }
}
