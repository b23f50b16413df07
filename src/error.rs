// Error kinds surfaced by the attempt lifecycle core.

use std::path::PathBuf;

use crate::lifecycle::template::TemplateError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown game `{0}`")]
    UnknownGame(String),
    /// Not enumerated for the caller, or gone before its state could be read.
    #[error("attempt {0} not found")]
    AttemptNotFound(u64),
    /// Results were asked for before the attempt finished.
    #[error("results for attempt {0} are not ready")]
    NotReady(u64),
    /// Every attempt number up to `u64::MAX` is taken.
    #[error("no attempt numbers left for {user} in {game}")]
    AttemptsExhausted { game: String, user: String },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("filesystem error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error describes something the caller asked for that does
    /// not exist (as opposed to a failure while looking).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::UnknownGame(_) | Error::AttemptNotFound(_) | Error::NotReady(_)
        )
    }
}
