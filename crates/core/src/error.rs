use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The caller sent something we refuse to turn into a query.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// True for errors the caller caused (maps to a 400-style response).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    pub(crate) fn backend(backend: &str, details: impl Into<String>) -> Self {
        Self::BackendResponse {
            backend: backend.to_string(),
            details: details.into(),
        }
    }
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;
