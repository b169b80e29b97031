use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Protocol-misuse and lifecycle errors for the sync primitives.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SyncError {
    #[error("value was already sent on this channel")]
    AlreadySent,

    #[error("value was already received from this channel")]
    AlreadyReceived,

    #[error("channel is closed")]
    Closed,
}
