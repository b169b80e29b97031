use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the executor pool and task helpers.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("executor is shut down")]
    Shutdown,

    #[error("target executor is gone: {message}")]
    ExecutorGone { message: String },

    #[error("task was cancelled")]
    Cancelled,
}
