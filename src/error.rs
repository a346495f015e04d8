//! Client error type
//!
//! Every failure is scoped to the user action that triggered it: nothing here
//! is fatal to the process. Listing failures additionally put the controller
//! into its errored phase, mutation failures are only reported.

use thiserror::Error;

/// Maximum number of characters of a server error body kept in messages
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not signed in")]
    AuthMissing,

    #[error("Gateway returned {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether the front end should offer a way back to the login screen
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ClientError::AuthMissing | ClientError::Gateway { status: 401 | 403, .. }
        )
    }

    /// Request never produced a usable HTTP response
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Gateway { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Parse(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

/// Reduce a raw error body to something safe to show in a banner.
///
/// JSON bodies of the form `{"error": ".."}`, `{"message": ".."}` or
/// `{"detail": ".."}` are unwrapped; anything else is whitespace-collapsed and
/// truncated.
pub fn sanitize_api_error(body: &str) -> String {
    let extracted = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message", "detail"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_string))
        });

    let text = extracted.unwrap_or_else(|| body.split_whitespace().collect::<Vec<_>>().join(" "));
    if text.is_empty() {
        return "no details".to_string();
    }
    if text.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}…", cut)
    } else {
        text
    }
}
