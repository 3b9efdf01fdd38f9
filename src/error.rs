use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// A single failed refresh of one source. Never fatal: the poller keeps the
/// previous sample and reports the source as failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("upstream reported status FAIL")]
    UpstreamFailed,
}

impl FetchError {
    /// Maps reqwest's error kinds onto the variants the poller cares about.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Http(e)
        }
    }
}

/// Rejected alert settings. The display strings are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlertConfigError {
    #[error("请输入有效的数字")]
    NotANumber,

    #[error("价格必须大于0，涨跌金额必须>=0")]
    OutOfRange,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel {0} unavailable")]
    Unavailable(&'static str),

    #[error("channel {channel} failed: {reason}")]
    Failed {
        channel: &'static str,
        reason: String,
    },
}
