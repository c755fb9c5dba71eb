//! HTTP mapping for `RoomcastError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use roomcast_core::error::{ClientCode, RoomcastError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Error returned from HTTP handlers; renders as `{code, message}`.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    body: ErrorBody,
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RoomcastError> for HttpError {
    fn from(err: RoomcastError) -> Self {
        let code = err.client_code();
        let (status, message) = match code {
            ClientCode::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated".to_string()),
            ClientCode::AuthFailed => (StatusCode::UNAUTHORIZED, "invalid credential".to_string()),
            ClientCode::BadRequest | ClientCode::UnsupportedVersion => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ClientCode::Broker | ClientCode::Presence => {
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            ClientCode::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
        };
        Self {
            status,
            body: ErrorBody {
                code: code.as_str(),
                message,
            },
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_401_without_detail() {
        let e = HttpError::from(RoomcastError::AuthFailed("InvalidSignature".into()));
        assert_eq!(e.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(e.body.message, "invalid credential");

        let e = HttpError::from(RoomcastError::Unauthenticated);
        assert_eq!(e.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(e.body.code, "UNAUTHENTICATED");
    }

    #[test]
    fn store_errors_are_503() {
        let e = HttpError::from(RoomcastError::Presence("down".into()));
        assert_eq!(e.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
