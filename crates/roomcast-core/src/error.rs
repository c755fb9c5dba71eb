//! Shared error type across roomcast crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed message.
    BadRequest,
    /// No credential was presented.
    Unauthenticated,
    /// Credential was presented but rejected.
    AuthFailed,
    /// Broker could not publish or subscribe.
    Broker,
    /// Presence store failure.
    Presence,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Unauthenticated => "UNAUTHENTICATED",
            ClientCode::AuthFailed => "AUTH_FAILED",
            ClientCode::Broker => "BROKER",
            ClientCode::Presence => "PRESENCE",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RoomcastError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum RoomcastError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("auth failed: {0}")]
    AuthFailed(String),
    #[error("broker: {0}")]
    Broker(String),
    #[error("presence: {0}")]
    Presence(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl RoomcastError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            RoomcastError::BadRequest(_) => ClientCode::BadRequest,
            RoomcastError::Unauthenticated => ClientCode::Unauthenticated,
            RoomcastError::AuthFailed(_) => ClientCode::AuthFailed,
            RoomcastError::Broker(_) => ClientCode::Broker,
            RoomcastError::Presence(_) => ClientCode::Presence,
            RoomcastError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            RoomcastError::Internal(_) => ClientCode::Internal,
        }
    }
}
