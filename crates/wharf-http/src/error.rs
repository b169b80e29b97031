use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, HttpError>;

/// Wire-level HTTP errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {message}")]
    Parse { message: String },

    #[error("illegal request-target")]
    InvalidTarget,

    #[error("message head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("message body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("operation timed out")]
    Timeout,

    #[error("peer closed the connection")]
    ConnectionClosed,
}

impl HttpError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        HttpError::Parse {
            message: message.into(),
        }
    }

    /// Whether observing this error during a session means "the peer went
    /// away gracefully" rather than something worth escalating.
    pub fn is_benign_close(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            HttpError::ConnectionClosed | HttpError::Timeout => true,
            HttpError::Io(e) => matches!(
                e.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
