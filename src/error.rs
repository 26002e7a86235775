//! Error type shared by all samplers.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single sampler for one pass.
///
/// Only required inputs produce an `Error`. Optional files, kernel sentinel
/// text and not-ready readings are skipped inside the sampler instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A required kernel file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A required key was absent from a keyed file.
    #[error("{} has no '{key}' entry", path.display())]
    MissingKey { path: PathBuf, key: &'static str },

    /// A required line did not have the expected layout.
    #[error("malformed line in {}: {message} ({line:?})", path.display())]
    Parse {
        path: PathBuf,
        line: String,
        message: String,
    },

    /// statvfs(3) failed for a mount point.
    #[error("statvfs failed for {}: {source}", path.display())]
    Statvfs {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(
        path: impl Into<PathBuf>,
        line: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Parse {
            path: path.into(),
            line: line.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
