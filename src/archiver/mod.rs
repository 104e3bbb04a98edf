//! High-level archive operations: add files, extract, read and write the comment.
//!
//! [`Archiver`] ties the ZIP codec to the filesystem. Every mutation builds
//! a complete new archive in a temporary file next to the target and moves it
//! into place only once it is finished, so a failed operation never leaves a
//! half-written archive at the target path.
//!
//! Note that every mutation replaces the archive comment with the one passed
//! in, including [`Archiver::add_files`]. Callers that want to keep a comment
//! must read it first and pass it back.

mod collect;
mod mutate;
mod names;
mod read;

pub use collect::{ARTIFACT_MARKERS, PendingFile, collect, entry_name, is_artifact};
pub use names::{RENAME_TOKEN, UsedNames, resolve};
pub use read::default_destination;

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::zip::CompressionMethod;

/// Comment used when the caller does not give one.
pub const DEFAULT_COMMENT: &str = "";

const DEFAULT_BUF_SIZE: usize = 8 * 1024;
const DEFAULT_LEVEL: u32 = 6;

/// Settings for writing new entries.
#[derive(Debug, Clone, Copy)]
pub struct ArchiverOptions {
    pub method: CompressionMethod,
    pub level: u32,
    pub buf_size: usize,
}

impl Default for ArchiverOptions {
    fn default() -> Self {
        Self {
            method: CompressionMethod::Deflate,
            level: DEFAULT_LEVEL,
            buf_size: DEFAULT_BUF_SIZE,
        }
    }
}

impl ArchiverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: CompressionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = level.min(9);
        self
    }

    pub fn buf_size(mut self, buf_size: usize) -> Self {
        self.buf_size = buf_size.max(1);
        self
    }
}

/// What a mutation did.
#[derive(Debug, Clone, Default)]
pub struct MutationReport {
    /// True if the archive did not exist before
    pub created: bool,
    /// Entries carried over from the previous archive
    pub copied: usize,
    /// New entries as (source file, entry name)
    pub added: Vec<(PathBuf, String)>,
    /// How many of `added` were renamed to avoid a collision
    pub renamed: usize,
}

/// What an extraction did.
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    /// Files written, in archive order
    pub extracted: Vec<PathBuf>,
    /// Directory entries created
    pub directories: usize,
    /// Entries skipped as artifacts or unsafe names
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Archiver {
    options: ArchiverOptions,
}

impl Archiver {
    pub fn new(options: ArchiverOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ArchiverOptions {
        &self.options
    }
}

fn require_path(path: &Path, what: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Precondition(format!("Expected {what}, but found none")));
    }
    Ok(())
}

fn require_existing_archive(path: &Path) -> Result<()> {
    require_path(path, "an archive path")?;
    if !path.is_file() {
        return Err(Error::Precondition(format!(
            "Can't find {} file",
            path.display()
        )));
    }
    Ok(())
}
