//! Error taxonomy for lifecycle commands.

use thiserror::Error;

use crate::status::JobStatus;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("job #{0} not found")]
    JobNotFound(i64),

    #[error("application #{0} not found")]
    ApplicationNotFound(i64),

    /// The command is not allowed from the job's current status.
    #[error("cannot {command} a job in status '{status}'")]
    InvalidTransition {
        command: &'static str,
        status: JobStatus,
    },

    #[error("application #{0} is already hired")]
    AlreadyHired(i64),

    #[error("application #{0} is not hired")]
    NotHired(i64),

    #[error("job #{0} has no open positions")]
    NoOpenPositions(i64),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unknown status '{0}'")]
    UnknownStatus(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(rusqlite::Error),
}

// Status columns are decoded through `FromSql`; surface a bad value as
// `UnknownStatus` rather than a generic conversion failure.
impl From<rusqlite::Error> for LifecycleError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(idx, ty, inner) => {
                match inner.downcast::<LifecycleError>() {
                    Ok(e) => *e,
                    Err(inner) => LifecycleError::Store(
                        rusqlite::Error::FromSqlConversionFailure(idx, ty, inner),
                    ),
                }
            }
            other => LifecycleError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
