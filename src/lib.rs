//! # zarch
//!
//! A Rust zip utility that adds files to ZIP archives, extracts them, and
//! reads or writes the archive comment.
//!
//! Adding to an existing archive copies its entries into a new archive built
//! in a temporary file, appends the new files, and only then replaces the
//! original. Entries are copied without being recompressed. When a new file's
//! name is already taken, `New_` is prepended to its base name until it is
//! unique, so no entry is ever overwritten.
//!
//! ## Features
//!
//! - Add files and whole directory trees, skipping macOS artifacts
//!   (`__MACOSX`, `.DS_Store`)
//! - Extract to a chosen or derived directory
//! - Read and replace the archive comment
//! - STORED and DEFLATE entries, ZIP64 archives on read
//!
//! ## Example
//!
//! ```no_run
//! use zarch::Archiver;
//!
//! fn main() -> zarch::Result<()> {
//!     let archiver = Archiver::default();
//!     archiver.add_files("docs.zip", "v1", &["docs", "notes.txt"])?;
//!     assert_eq!(archiver.read_comment("docs.zip")?, "v1");
//!     archiver.extract("docs.zip", "restored")?;
//!     Ok(())
//! }
//! ```

pub mod archiver;
pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use archiver::{Archiver, ArchiverOptions, ExtractReport, MutationReport};
pub use cli::{Cli, Command};
pub use error::{Error, Result};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use zip::{ZipExtractor, ZipFileEntry, ZipWriter};
