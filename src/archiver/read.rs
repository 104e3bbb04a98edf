use log::{debug, info, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, IoContext, Result};
use crate::io::LocalFileReader;
use crate::zip::{ZipExtractor, ZipFileEntry};

use super::collect::is_artifact;
use super::{Archiver, DEFAULT_COMMENT, ExtractReport, require_existing_archive, require_path};

impl Archiver {
    /// Extract every entry of `archive_path` under `destination`.
    ///
    /// `destination` itself is created if missing (its parent must exist).
    /// Existing files are overwritten. Artifact entries and entries whose
    /// names would land outside `destination` are skipped.
    pub fn extract(
        &self,
        archive_path: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<ExtractReport> {
        let archive_path = archive_path.as_ref();
        let destination = destination.as_ref();
        require_existing_archive(archive_path)?;
        require_path(destination, "a destination directory")?;

        let extractor = ZipExtractor::new(LocalFileReader::new(archive_path)?);
        if !destination.exists() {
            fs::create_dir(destination).at(destination)?;
        }

        let mut report = ExtractReport::default();
        for entry in extractor.list_files()? {
            if is_artifact(&entry.file_name) {
                debug!("skipping artifact {}", entry.file_name);
                report.skipped += 1;
                continue;
            }
            let Some(relative) = enclosed_path(&entry.file_name) else {
                warn!("skipping {}: it points outside the destination", entry.file_name);
                report.skipped += 1;
                continue;
            };

            let target = destination.join(relative);
            if entry.is_directory {
                fs::create_dir_all(&target).at(&target)?;
                report.directories += 1;
                continue;
            }

            extractor.extract_to_file(&entry, &target, self.options.buf_size)?;
            debug!("extracted: {}", target.display());
            report.extracted.push(target);
        }

        info!(
            "extracted {} files from {} into {}",
            report.extracted.len(),
            archive_path.display(),
            destination.display()
        );
        Ok(report)
    }

    /// Extract next to the archive, into its path minus the extension.
    pub fn extract_default(&self, archive_path: impl AsRef<Path>) -> Result<ExtractReport> {
        let archive_path = archive_path.as_ref();
        let destination = default_destination(archive_path)?;
        self.extract(archive_path, destination)
    }

    /// The archive comment.
    ///
    /// An archive that exists but cannot be read yields the empty default
    /// comment; the failure is only logged.
    pub fn read_comment(&self, archive_path: impl AsRef<Path>) -> Result<String> {
        let archive_path = archive_path.as_ref();
        require_existing_archive(archive_path)?;

        let read = || -> Result<String> {
            ZipExtractor::new(LocalFileReader::new(archive_path)?).comment()
        };
        match read() {
            Ok(comment) => Ok(comment),
            Err(e) => {
                warn!("could not read the comment of {}: {}", archive_path.display(), e);
                Ok(DEFAULT_COMMENT.to_string())
            }
        }
    }

    /// Central directory entries in stored order.
    pub fn list(&self, archive_path: impl AsRef<Path>) -> Result<Vec<ZipFileEntry>> {
        let archive_path = archive_path.as_ref();
        require_existing_archive(archive_path)?;
        ZipExtractor::new(LocalFileReader::new(archive_path)?).list_files()
    }
}

/// Where an archive is extracted when no destination is given: its path with
/// the last extension removed, so `out/data.zip` extracts into `out/data`.
pub fn default_destination(archive_path: &Path) -> Result<PathBuf> {
    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    match name.rfind('.') {
        Some(dot) if dot > 0 => Ok(archive_path.with_file_name(&name[..dot])),
        _ => Err(Error::Precondition(format!(
            "Can't derive a destination from {}: it has no extension",
            archive_path.display()
        ))),
    }
}

/// The entry name as a relative path, or None if it is absolute or climbs up.
fn enclosed_path(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!path.as_os_str().is_empty()).then_some(path)
}
