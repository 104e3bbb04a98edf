use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;

use crate::error::{Error, IoContext, Result};
use crate::io::LocalFileReader;
use crate::zip::{EntryOptions, MAX_FIELD_LEN, ZipExtractor, ZipWriter};

use super::collect::collect;
use super::names::{UsedNames, resolve};
use super::{Archiver, DEFAULT_COMMENT, MutationReport, require_existing_archive, require_path};

const TEMP_PREFIX: &str = ".zarch-";
const TEMP_SUFFIX: &str = ".tmp";

impl Archiver {
    /// Add `files` (directories are expanded) to the archive at `archive_path`,
    /// creating it if needed, and set its comment to `comment`.
    ///
    /// Existing entries are kept. A new file whose name is already taken gets
    /// `New_` prepended to its base name until it is unique.
    pub fn add_files<P: AsRef<Path>>(
        &self,
        archive_path: impl AsRef<Path>,
        comment: &str,
        files: &[P],
    ) -> Result<MutationReport> {
        let archive_path = archive_path.as_ref();
        require_path(archive_path, "an archive path")?;
        if files.is_empty() {
            return Err(Error::Precondition(
                "Expected files to add, but found none".to_string(),
            ));
        }
        self.rewrite(archive_path, comment, files)
    }

    /// [`add_files`](Self::add_files) with the empty default comment.
    pub fn add_files_default_comment<P: AsRef<Path>>(
        &self,
        archive_path: impl AsRef<Path>,
        files: &[P],
    ) -> Result<MutationReport> {
        self.add_files(archive_path, DEFAULT_COMMENT, files)
    }

    /// Replace the comment of an existing archive, keeping every entry.
    pub fn write_comment(
        &self,
        archive_path: impl AsRef<Path>,
        comment: &str,
    ) -> Result<MutationReport> {
        let archive_path = archive_path.as_ref();
        require_existing_archive(archive_path)?;
        self.rewrite::<PathBuf>(archive_path, comment, &[])
    }

    /// Build the new archive in a temporary file, then move it over `archive_path`.
    fn rewrite<P: AsRef<Path>>(
        &self,
        archive_path: &Path,
        comment: &str,
        files: &[P],
    ) -> Result<MutationReport> {
        if comment.len() > MAX_FIELD_LEN {
            return Err(Error::Precondition(format!(
                "Comment is {} bytes, the limit is {}",
                comment.len(),
                MAX_FIELD_LEN
            )));
        }
        if archive_path.is_dir() {
            return Err(Error::Precondition(format!(
                "{} is a directory",
                archive_path.display()
            )));
        }

        let exists = archive_path.is_file();
        let parent = match archive_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX);
        // Let the umask decide, as it would for a plain create
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o666));
        }
        let temp = builder.tempfile_in(parent).at(parent)?;
        let temp_path = temp.path().to_path_buf();
        let mut writer = ZipWriter::new(BufWriter::new(temp))?;

        let mut report = MutationReport {
            created: !exists,
            ..Default::default()
        };
        let mut used = UsedNames::new();

        if exists {
            let source = ZipExtractor::new(LocalFileReader::new(archive_path)?);
            for entry in source.list_files()? {
                let mut raw = source.raw_data(&entry)?;
                writer.raw_copy(&entry, &mut raw, self.options.buf_size)?;
                if !used.insert(entry.file_name.clone()) {
                    warn!("{} already holds {} twice", archive_path.display(), entry.file_name);
                }
                debug!("copied: {}", entry.file_name);
                report.copied += 1;
            }
        }

        // Never feed the archive back into itself
        let archive_canonical = fs::canonicalize(archive_path).ok();

        for pending in collect(files)? {
            if is_temp_file(&pending.source) {
                debug!("skipping {}: unfinished archive", pending.source.display());
                continue;
            }
            if let Ok(canonical) = fs::canonicalize(&pending.source)
                && archive_canonical.as_ref() == Some(&canonical)
            {
                debug!("skipping {}: it is the archive", pending.source.display());
                continue;
            }

            let name = resolve(&pending.entry_name, &mut used)?;
            if name != pending.entry_name {
                debug!("renamed {} to {}", pending.entry_name, name);
                report.renamed += 1;
            }

            let mut file = File::open(&pending.source).at(&pending.source)?;
            let metadata = file.metadata().ok();
            let options = EntryOptions {
                method: self.options.method,
                level: self.options.level,
                modified: metadata
                    .as_ref()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or_else(SystemTime::now),
                unix_mode: metadata.as_ref().and_then(unix_mode),
                buf_size: self.options.buf_size,
            };
            writer.write_entry(&name, &mut file, &options)?;
            debug!("added: {} as {}", pending.source.display(), name);
            report.added.push((pending.source, name));
        }

        let buffered = writer.finish(comment.as_bytes())?;
        let temp = buffered
            .into_inner()
            .map_err(|e| Error::io(&temp_path, e.into_error()))?;
        if exists {
            let permissions = fs::metadata(archive_path).at(archive_path)?.permissions();
            temp.as_file().set_permissions(permissions).at(&temp_path)?;
        }
        temp.as_file().sync_all().at(&temp_path)?;

        replace(temp, archive_path)?;
        info!(
            "{} {}: {} entries kept, {} added ({} renamed)",
            if report.created { "created" } else { "updated" },
            archive_path.display(),
            report.copied,
            report.added.len(),
            report.renamed
        );
        Ok(report)
    }
}

/// Whether `path` is named like an archive this tool is (or was) building.
fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(TEMP_PREFIX) && n.ends_with(TEMP_SUFFIX))
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.mode())
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &fs::Metadata) -> Option<u32> {
    None
}

/// Move the finished temporary file over `target`.
///
/// On failure the temporary file stays on disk so nothing that was built is lost.
fn replace(temp: NamedTempFile, target: &Path) -> Result<()> {
    temp.persist(target).map_err(|e| {
        let temp_path = e.file.path().to_path_buf();
        if let Err(keep) = e.file.keep() {
            warn!("could not keep {}: {}", temp_path.display(), keep.error);
        }
        Error::AtomicReplace {
            temp: temp_path,
            target: target.to_path_buf(),
            source: e.error,
        }
    })?;
    Ok(())
}
