use serde::Deserialize;
use thiserror::Error;

/// Every failure the client can surface.
///
/// Sequences yield at most one of these, always as their last item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Connection setup or body read failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// A transport failure caused by the request timeout.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The service answered with a non-2xx status.
    #[error("triage: {status} {kind}: {message}")]
    Service {
        status: u16,
        kind: String,
        message: String,
    },
    #[error("decode error: {0}")]
    Decode(String),
    /// The service broke the paging or event protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("sample {sample_id} is in a failed state")]
    SampleFailed { sample_id: String },
    #[error("prompt failed: {0}")]
    Prompt(String),
    /// The caller withdrew before completion.
    #[error("cancelled")]
    Cancelled,
}

impl ClientError {
    /// Machine readable kind of a service error, e.g. `NOT_FOUND`.
    pub fn service_kind(&self) -> Option<&str> {
        match self {
            ClientError::Service { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ClientError::Timeout(err.to_string());
        }
        if err.is_decode() {
            return ClientError::Decode(err.to_string());
        }
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// Builds a service error from a non-2xx body, keeping the raw text when the
/// body is not the usual `{error, message}` object.
pub(crate) fn service_error(status: u16, body: &[u8]) -> ClientError {
    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(parsed) => ClientError::Service {
            status,
            kind: parsed.error,
            message: parsed.message,
        },
        Err(_) => ClientError::Service {
            status,
            kind: String::new(),
            message: String::from_utf8_lossy(body).trim().to_string(),
        },
    }
}
