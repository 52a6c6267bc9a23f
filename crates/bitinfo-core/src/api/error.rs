use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Account locked - captcha required, log in through a browser first")]
    AccountLocked,

    #[error("Invalid username or password")]
    InvalidCredential,

    #[error("Not authenticated - log in before requesting data")]
    NotAuthenticated,

    #[error("Malformed response ({what}): {detail}")]
    MalformedResponse { what: &'static str, detail: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },
}

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn malformed(what: &'static str, detail: impl Into<String>) -> Self {
        ApiError::MalformedResponse {
            what,
            detail: detail.into(),
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status {
            401 => ApiError::InvalidCredential,
            500..=599 => ApiError::ServerError {
                status,
                body: truncated,
            },
            _ => ApiError::malformed("unexpected status", format!("Status {}: {}", status, truncated)),
        }
    }

    /// Transport-level failures the caller may retry. Nothing is retried internally.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkError(_) | ApiError::ServerError { .. } | ApiError::NotAuthenticated
        )
    }
}
