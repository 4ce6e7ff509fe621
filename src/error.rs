use crate::{fetch::FetchError, storage::StorageError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no handler registered for command `{0}`")]
    NotRegistered(String),
    #[error("command `{name}` failed")]
    Command {
        name: String,
        #[source]
        source: Box<Error>,
    },
    #[error("invalid arguments: {0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("no user is logged in, run `register` or `login` first")]
    NotLoggedIn,
    #[error("could not resolve user `{name}`")]
    UserResolution {
        name: String,
        #[source]
        source: StorageError,
    },
    #[error("no feeds registered")]
    NoFeedsRegistered,
    #[error("interrupted by shutdown")]
    Interrupted,
    #[error("invalid interval `{0}`, expected a positive duration such as `30s` or `1m`")]
    InvalidInterval(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to write configuration")]
    Config(#[from] crate::config::ConfigError),
}

impl Error {
    /// Innermost error of a `Command` wrapper chain.
    pub fn root(&self) -> &Error {
        match self {
            Error::Command { source, .. } => source.root(),
            other => other,
        }
    }
}
