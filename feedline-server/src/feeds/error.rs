use serde::Deserialize;
use thiserror::Error;

pub type FeedResult<T> = std::result::Result<T, FeedServiceError>;

/// Error code the feed service uses for a missing resource
const CODE_DOES_NOT_EXIST: i64 = 16;

#[derive(Debug, Error)]
pub enum FeedServiceError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Feed service error (status {status}, code {code:?}): {message}")]
    Remote {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Error body returned by the feed service
#[derive(Debug, Default, Deserialize)]
struct RemoteErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl FeedServiceError {
    /// Turn a non-success response into a typed error.
    ///
    /// Everything vendor specific about "already exists" and "not found"
    /// lives here, so callers only ever match on variants.
    pub fn classify(status: u16, body: &str) -> Self {
        let parsed: RemoteErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message
            .or(parsed.detail)
            .unwrap_or_else(|| body.trim().to_string());
        let lowered = message.to_lowercase();

        if status == 409 || lowered.contains("already exists") {
            return FeedServiceError::AlreadyExists(message);
        }

        if status == 404
            || parsed.code == Some(CODE_DOES_NOT_EXIST)
            || lowered.contains("does not exist")
            || lowered.contains("not found")
        {
            return FeedServiceError::NotFound(message);
        }

        FeedServiceError::Remote {
            status,
            code: parsed.code,
            message,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, FeedServiceError::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FeedServiceError::NotFound(_))
    }
}

impl From<reqwest::Error> for FeedServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeedServiceError::Serialization(err.to_string())
        } else {
            FeedServiceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedServiceError {
    fn from(err: serde_json::Error) -> Self {
        FeedServiceError::Serialization(err.to_string())
    }
}
