//! Mapping from domain errors to HTTP responses.
//!
//! Every error body is `{"message": "..."}`. An iteration failure also
//! carries `last_request`, the request the client was answering, so the UI
//! can re-render it.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use st_domain::error::Error;

#[derive(Debug)]
pub enum ApiError {
    Domain(Error),
    /// The request body could not be parsed.
    BadRequest(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Domain(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

pub fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::NotFound(_) | Error::UnknownMethod { .. } => StatusCode::NOT_FOUND,
        Error::IncompatibleProblemType(_) => StatusCode::NOT_ACCEPTABLE,
        Error::InvalidState(_)
        | Error::NoPendingRequest
        | Error::PreferenceIndexOutOfRange(_)
        | Error::InvalidPreference(_)
        | Error::Iteration { .. } => StatusCode::BAD_REQUEST,
        Error::Auth(_) => StatusCode::UNAUTHORIZED,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "message": message }))).into_response()
            }
            Self::Domain(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    tracing::error!(error = %e, status = status.as_u16(), "request failed");
                } else {
                    tracing::debug!(error = %e, status = status.as_u16(), "request rejected");
                }
                let body = match &e {
                    Error::Iteration { last_request, .. } => json!({
                        "message": e.to_string(),
                        "last_request": last_request,
                    }),
                    _ => json!({ "message": e.to_string() }),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (Error::NotFound("x".into()), 404),
            (
                Error::UnknownMethod {
                    name: "bogus".into(),
                    available: vec![],
                },
                404,
            ),
            (Error::IncompatibleProblemType("x".into()), 406),
            (Error::InvalidState("x".into()), 400),
            (Error::NoPendingRequest, 400),
            (Error::PreferenceIndexOutOfRange(42), 400),
            (Error::InvalidPreference("x".into()), 400),
            (Error::Auth("x".into()), 401),
            (Error::Timeout("x".into()), 504),
            (Error::Serialization("x".into()), 500),
            (Error::Engine("x".into()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(status_for(&err).as_u16(), code, "{err}");
        }
    }
}
