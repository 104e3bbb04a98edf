//! Expands input paths into the flat list of files to add.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, IoContext, Result};

/// Names containing any of these are OS bookkeeping, never archived or extracted.
pub const ARTIFACT_MARKERS: [&str; 2] = ["__MACOSX", ".DS_Store"];

/// True if `name` looks like an OS-generated artifact (macOS resource forks, Finder metadata).
pub fn is_artifact(name: &str) -> bool {
    ARTIFACT_MARKERS.iter().any(|marker| name.contains(marker))
}

/// A file waiting to be written into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub source: PathBuf,
    /// Entry name before collision resolution
    pub entry_name: String,
}

impl PendingFile {
    fn new(source: PathBuf) -> Self {
        let entry_name = entry_name(&source);
        Self { source, entry_name }
    }
}

/// Recursively expand `paths` into regular files, in input order.
///
/// Directories are walked depth first with siblings sorted by name. Artifact
/// directories are not descended, and a file is dropped when its own name or
/// its containing directory's name is an artifact. Empty directories
/// contribute nothing.
pub fn collect<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PendingFile>> {
    let mut files = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let metadata = fs::metadata(path).at(path)?;

        if !metadata.is_dir() {
            if metadata.is_file() && !is_artifact_file(path) {
                files.push(PendingFile::new(path.to_path_buf()));
            }
            continue;
        }

        let walk = WalkDir::new(path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && is_artifact(&e.file_name().to_string_lossy())));

        for entry in walk {
            let entry = entry.map_err(|e| {
                let at = e.path().unwrap_or(path).to_path_buf();
                Error::io(at, io::Error::from(e))
            })?;
            if entry.file_type().is_file() && !is_artifact_file(entry.path()) {
                files.push(PendingFile::new(entry.into_path()));
            }
        }
    }

    Ok(files)
}

fn is_artifact_file(path: &Path) -> bool {
    let own = path.file_name().map(|n| n.to_string_lossy());
    let parent = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy());
    own.is_some_and(|n| is_artifact(&n)) || parent.is_some_and(|n| is_artifact(&n))
}

/// Slash-separated entry name for a filesystem path.
///
/// Only normal components are kept, so the name is always relative and
/// never climbs out of the directory it is extracted into.
pub fn entry_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
