use reqwest::StatusCode;

pub type SinkResult<T> = core::result::Result<T, SinkError>;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink configuration error: {0}")]
    Config(String),
    #[error("service account credentials error: {0}")]
    Credentials(String),
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),
}

/// The spreadsheet provider (or its token endpoint) failed the call.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("token endpoint responded with {status}: {body}")]
    Token { status: StatusCode, body: String },
    #[error("sheets api responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode the response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else if value.is_decode() {
            Self::Decode(value)
        } else {
            Self::Transport(value)
        }
    }
}
