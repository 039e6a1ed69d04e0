use thiserror::Error;

/// Failure of a call to the sentiment service.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Another analysis holds the in-flight flag. No request was sent.
    #[error("another analysis is already in progress")]
    Busy,

    /// Non-2xx response, transport failure or unreadable input.
    #[error("{0}")]
    RequestFailed(String),
}

impl AnalysisError {
    pub fn request_failed(message: impl Into<String>) -> Self {
        AnalysisError::RequestFailed(message.into())
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::RequestFailed(err.to_string())
    }
}
