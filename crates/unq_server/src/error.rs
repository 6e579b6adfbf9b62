use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, warn};
use unq_core::{BridgeError, ErrorKind};

/// Error returned by every handler, rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub enum ApiError {
    /// A component failure, mapped to a status by its [`ErrorKind`].
    Bridge(BridgeError),
    /// The request itself could not be decoded.
    Rejected { status: StatusCode, message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Bridge(err) => status_for(err.kind()),
            Self::Rejected { status, .. } => *status,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Bridge(err) => err.to_string(),
            Self::Rejected { message, .. } => message.clone(),
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::UnsupportedOperation => StatusCode::BAD_REQUEST,
        ErrorKind::ExternalToolMissing | ErrorKind::GenericFailure => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            warn!(status = status.as_u16(), "request failed: {message}");
        } else {
            debug!(status = status.as_u16(), "request rejected: {message}");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self::Bridge(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (BridgeError::not_found("a.txt"), StatusCode::NOT_FOUND),
            (BridgeError::OutsideBase("../x".into()), StatusCode::FORBIDDEN),
            (BridgeError::Forbidden("git".into()), StatusCode::FORBIDDEN),
            (BridgeError::Conflict("b".into()), StatusCode::CONFLICT),
            (
                BridgeError::Timeout(Duration::from_secs(30)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                BridgeError::UnsupportedLanguage("cobol".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                BridgeError::ExternalToolMissing {
                    tool: "git".into(),
                    hint: String::new(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}
