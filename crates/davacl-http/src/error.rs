//! Mapping of engine errors onto HTTP responses.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use davacl_core::{Classification, Error};

/// An engine error on its way out as a response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

/// HTTP status for an error class.
pub fn status_for(classification: Classification) -> StatusCode {
    match classification {
        Classification::Forbidden => StatusCode::FORBIDDEN,
        Classification::Conflict => StatusCode::CONFLICT,
        Classification::BadRequest => StatusCode::BAD_REQUEST,
        Classification::NotFound => StatusCode::NOT_FOUND,
        Classification::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        Classification::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Category reported in the error body: the RFC 3744 precondition name
/// where one exists.
pub fn category(err: &Error) -> &'static str {
    match err {
        Error::NeedPrivileges { .. } => "need-privileges",
        Error::AceConflict { .. } => "no-protected-ace-conflict",
        Error::NotSupportedPrivilege(_) => "not-supported-privilege",
        Error::NoAbstractPrivilege(_) => "no-abstract",
        Error::NotRecognizedPrincipal(_) => "recognized-principal",
        other => match other.classification() {
            Classification::Forbidden => "forbidden",
            Classification::Conflict => "conflict",
            Classification::BadRequest => "bad-request",
            Classification::NotFound => "not-found",
            Classification::MethodNotAllowed => "method-not-allowed",
            Classification::Internal => "internal",
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.classification());
        if status.is_server_error() {
            log::error!("Request failed: {}", self.0);
        } else {
            log::debug!("Request refused ({status}): {}", self.0);
        }

        let body = serde_json::json!({
            "error": {
                "category": category(&self.0),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
