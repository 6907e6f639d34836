pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("HTTP error: {context} status_code={status_code:?} message={message:?}")]
    Http {
        status_code: reqwest::StatusCode,
        message: Option<String>,
        context: String,
    },

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("base URL cannot have path segments: {0}")]
    CannotBeABase(url::Url),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The `message` field the backend sent along with an HTTP error, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Http { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}
