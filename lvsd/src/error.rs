use lvs_model::ValidationError;
use thiserror::Error;

/// A control program invocation that did not succeed. Carries what the
/// program printed so the caller can see why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{command}` failed: {output}")]
pub struct CommandError {
    pub command: String,
    pub output: String,
}

impl CommandError {
    pub fn new(argv: &[String], output: impl Into<String>) -> Self {
        Self {
            command: argv.join(" "),
            output: output.into(),
        }
    }
}

/// Errors returned by mirror operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("{0} was not found")]
    NotFound(String),

    #[error("{0} is still present after being deleted")]
    DeleteFailed(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("unable to find the {0} command on the system")]
    ToolMissing(String),

    #[error("mirror thread has stopped")]
    Stopped,
}

pub type MirrorResult<T> = Result<T, MirrorError>;
