use crate::status::RemoteBuildResult;
use http::Method;
use std::error::Error as StdError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    Config,
    QueueLocation,
    Cancelled,
    Precheck,
    RetryLimit,
    RemoteFormat,
    Interrupted,
    Unsuccessful,
    Transport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Other,
}

/// All errors returned by the crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No remote server with the requested display name is configured.
    #[error("no remote server named `{name}` is configured")]
    UnknownRemoteServer { name: String },

    /// The trigger response carried no usable queue location.
    #[error("remote job queue location could not be read: {detail}")]
    MalformedQueueLocation { detail: String },

    /// The queue item was cancelled before it resolved into a build.
    #[error("the remote build was cancelled while queued")]
    RemoteBuildCancelled,

    /// The duplicate-build precheck did not return a usable document.
    #[error("remote job precheck did not return a usable response: {detail}")]
    PrecheckUnavailable { detail: String },

    /// Transport failures exhausted the connection retry limit.
    #[error("max number of connection retries exceeded after {attempts} attempts")]
    RetryLimitExceeded {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// The remote system answered, but not in the shape this protocol expects.
    #[error("unexpected response format from the remote server: {detail}")]
    UnexpectedRemoteFormat { detail: String },

    /// The run was cancelled while waiting between polls.
    #[error("the run was interrupted while waiting")]
    Interrupted,

    /// The remote build reached a terminal state other than success.
    #[error("the remote job did not succeed (finished with {status})")]
    UnsuccessfulBuild { status: RemoteBuildResult },

    /// A single HTTP attempt failed below the retry layer.
    #[error("transport error during {method} {path}: {source}")]
    Transport {
        method: Method,
        path: Box<str>,
        kind: TransportErrorKind,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfig {
        message: Box<str>,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownRemoteServer { .. } | Self::InvalidConfig { .. } => ErrorKind::Config,
            Self::MalformedQueueLocation { .. } => ErrorKind::QueueLocation,
            Self::RemoteBuildCancelled => ErrorKind::Cancelled,
            Self::PrecheckUnavailable { .. } => ErrorKind::Precheck,
            Self::RetryLimitExceeded { .. } => ErrorKind::RetryLimit,
            Self::UnexpectedRemoteFormat { .. } => ErrorKind::RemoteFormat,
            Self::Interrupted => ErrorKind::Interrupted,
            Self::UnsuccessfulBuild { .. } => ErrorKind::Unsuccessful,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// True for single-attempt transport failures, the only class the
    /// invoker's bounded retry loop replays.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub(crate) fn invalid_config(message: impl Into<Box<str>>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            source: None,
        }
    }
}
