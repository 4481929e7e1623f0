use thiserror::Error;

/// Top-level error type for the `sitereg-api` crate.
///
/// Covers every failure mode across both API surfaces: transport,
/// registry responses, and the publisher lifecycle. `sitereg-core`
/// maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The credential token could not be turned into a request header.
    #[error("Invalid credential token: {0}")]
    InvalidToken(String),

    // ── Service responses ───────────────────────────────────────────
    /// Structured error from the registry or publishing service.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A request body could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Publisher lifecycle ─────────────────────────────────────────
    /// A publish (or second shutdown) was attempted after shutdown.
    #[error("Publisher already shut down")]
    PublisherClosed,
}

impl Error {
    /// Returns `true` if the service reported the target resource missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the service rejected the supplied credential.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == 401 || *status == 403)
    }

    /// Build an error from a non-success response, preferring the
    /// structured `{"error": {"message": ...}}` body when the service
    /// provides one.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|parsed| parsed.error.message)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    "(no response body)".to_string()
                } else {
                    preview(&body)
                }
            });
        Self::Api { status, message }
    }
}

/// Wire shape of service error bodies.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorDetail {
    message: String,
}

/// First couple hundred bytes of a body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut cut = MAX;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &body[..cut])
    }
}
