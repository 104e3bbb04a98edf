//! Error type shared by the library and its `Result` alias.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was missing or invalid. Raised before any I/O.
    #[error("{0}")]
    Precondition(String),

    /// An I/O operation on a known path failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An I/O error from inside an archive stream.
    #[error("I/O error: {0}")]
    Stream(#[from] io::Error),

    /// The archive contained invalid data per the ZIP format.
    #[error("Invalid ZIP archive: {0}")]
    InvalidArchive(&'static str),

    /// The archive is valid but uses features this tool does not handle.
    #[error("Unsupported ZIP archive: {0}")]
    Unsupported(String),

    #[error("CRC-32 mismatch in entry {name}")]
    ChecksumMismatch { name: String },

    /// The new archive was fully built but could not be moved into place.
    /// The temporary file is left behind at `temp`.
    #[error(
        "Could not replace {} with {}: {source}",
        target.display(),
        temp.display()
    )]
    AtomicReplace {
        temp: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not find a free entry name for {name}")]
    NamingExhausted { name: String },
}

impl Error {
    /// Wrap an `io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True if the operation was refused before touching the filesystem.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }
}

/// Attach a path to the error of an `io::Result`.
pub(crate) trait IoContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
