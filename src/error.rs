//! Error types shared by the transport, session and configuration layers.
//!
//! Each variant corresponds to one failure class the command-line front end
//! reports distinctly. Nothing in the library retries; errors surface to the
//! caller as soon as they happen.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::transport::Endpoint;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to connect to {endpoint}: {source}")]
    Connection {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    #[error("transport error while {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("unexpected reply {reply:?} to {query:?}: {reason}")]
    Protocol {
        query: String,
        reply: String,
        reason: String,
    },

    /// The instrument did not answer in time. It may only be busy, so this is
    /// kept apart from a hard disconnect.
    #[error("no reply to {query:?} within {after:?}")]
    Timeout { query: String, after: Duration },
}

impl Error {
    pub(crate) fn transport(context: impl Into<String>, source: io::Error) -> Self {
        Error::Transport {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn protocol(
        query: impl Into<String>,
        reply: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Protocol {
            query: query.into(),
            reply: reply.into(),
            reason: reason.into(),
        }
    }
}

/// Outcomes of looking up the instrument address in `config.yml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("\"config.yml\" not found in either {}", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed YAML in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{} has no `ip` key", .path.display())]
    MissingIp { path: PathBuf },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}
