use parlor_session::SessionError;

/// Errors from the room REST API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never got a usable response.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },

    /// The response body was not the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl From<ApiError> for SessionError {
    fn from(e: ApiError) -> Self {
        SessionError::Directory(e.to_string())
    }
}
