use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Failure of a backend call, reduced to the one message worth showing a user.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a structured error message.
    #[error("{message}")]
    Backend { status: StatusCode, message: String },
    /// The request never produced an HTTP response.
    #[error("{0}")]
    Transport(String),
    /// Non-success status without a usable message.
    #[error("{}", .0.as_u16())]
    Status(StatusCode),
    #[error("unexpected response from server: {0}")]
    Decode(String),
    #[error("failed to store session: {0}")]
    Session(String),
}

impl ApiError {
    /// Normalizes a non-success response. The backend message wins, the bare
    /// status code is the last resort.
    pub(crate) fn from_response(status: StatusCode, body: &[u8]) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(default)]
            message: Option<String>,
        }

        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(ErrorBody {
                message: Some(message),
            }) if !message.is_empty() => Self::Backend { status, message },
            _ => Self::Status(status),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Backend { status, .. } | Self::Status(status) => Some(*status),
            _ => None,
        }
    }
}

/// Error raised below HTTP, e.g. DNS, TLS or connection failures.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<http::Error> for TransportError {
    fn from(err: http::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_message_takes_priority() {
        let err = ApiError::from_response(
            StatusCode::BAD_REQUEST,
            br#"{"error":"bad_request","message":"invalid credentials"}"#,
        );
        assert_eq!(err.to_string(), "invalid credentials");
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn falls_back_to_status_code() {
        let err = ApiError::from_response(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>");
        assert_eq!(err.to_string(), "502");

        let err = ApiError::from_response(StatusCode::NOT_FOUND, br#"{"message":""}"#);
        assert_eq!(err.to_string(), "404");
    }

    #[test]
    fn transport_message_is_kept() {
        let err: ApiError = TransportError("connection refused".to_owned()).into();
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(err.status(), None);
    }
}
