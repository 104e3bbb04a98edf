//! End-to-end archive operations against a temporary directory.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zarch::zip::CompressionMethod;
use zarch::{Archiver, ArchiverOptions, Error, LocalFileReader, ZipExtractor};

fn write(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn entry_names(archive: &Path) -> Vec<String> {
    Archiver::default()
        .list(archive)
        .unwrap()
        .into_iter()
        .map(|e| e.file_name)
        .collect()
}

/// Every file under `root`, relative, with its contents.
fn tree(root: &Path) -> BTreeSet<(String, Vec<u8>)> {
    let mut out = BTreeSet::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let relative = path.strip_prefix(root).unwrap();
                let name = zarch::archiver::entry_name(relative);
                out.insert((name, fs::read(&path).unwrap()));
            }
        }
    }
    out
}

/// A temporary directory holding the inputs and the archive under test.
///
/// Inputs are passed as absolute paths, so entry names mirror those paths
/// minus the root.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn archive(&self) -> PathBuf {
        self.path().join("archive.zip")
    }
}

#[test]
fn creates_a_new_archive_with_exactly_the_inputs() {
    let ws = Workspace::new();
    let root = ws.path();
    let a = write(root, "in/a.txt", b"alpha");
    let b = write(root, "in/sub/b.txt", b"bravo");

    let report = Archiver::default()
        .add_files(ws.archive(), "first", &[&a, &b])
        .unwrap();

    assert!(report.created);
    assert_eq!(report.copied, 0);
    assert_eq!(report.renamed, 0);
    let names = entry_names(&ws.archive());
    assert_eq!(
        names,
        [zarch::archiver::entry_name(&a), zarch::archiver::entry_name(&b)]
    );
    assert_eq!(Archiver::default().read_comment(ws.archive()).unwrap(), "first");
}

#[test]
fn round_trip_reproduces_contents() {
    let ws = Workspace::new();
    let src = ws.path().join("src");
    write(&src, "text.txt", &b"line of text\n".repeat(500));
    write(&src, "bin/noise.bin", &(0..20_000u32).map(|i| (i * 7919 % 251) as u8).collect::<Vec<_>>());
    write(&src, "empty.txt", b"");

    let archiver = Archiver::default();
    archiver.add_files(ws.archive(), "", &[&src]).unwrap();

    let out = ws.path().join("out");
    let report = archiver.extract(ws.archive(), &out).unwrap();
    assert_eq!(report.extracted.len(), 3);

    // Entry names carry the full source path, so compare below the mirrored prefix
    let extracted_src = out.join(zarch::archiver::entry_name(&src));
    assert_eq!(tree(&extracted_src), tree(&src));
}

#[test]
fn stored_entries_round_trip() {
    let ws = Workspace::new();
    let file = write(ws.path(), "plain.txt", b"not compressed at all");

    let archiver = Archiver::new(ArchiverOptions::new().method(CompressionMethod::Stored));
    archiver.add_files(ws.archive(), "", &[&file]).unwrap();

    let entries = archiver.list(ws.archive()).unwrap();
    assert_eq!(entries[0].compression_method, CompressionMethod::Stored);
    assert_eq!(entries[0].compressed_size, entries[0].uncompressed_size);

    let out = ws.path().join("out");
    let report = archiver.extract(ws.archive(), &out).unwrap();
    assert_eq!(fs::read(&report.extracted[0]).unwrap(), b"not compressed at all");
}

#[test]
fn adding_to_an_existing_archive_keeps_old_entries() {
    let ws = Workspace::new();
    let one = write(ws.path(), "one.txt", b"1");
    let two = write(ws.path(), "two.txt", b"2");
    let archiver = Archiver::default();

    archiver.add_files(ws.archive(), "c", &[&one]).unwrap();
    let report = archiver.add_files(ws.archive(), "c", &[&two]).unwrap();

    assert!(!report.created);
    assert_eq!(report.copied, 1);
    let names = entry_names(&ws.archive());
    assert_eq!(names.len(), 2);
    assert!(names[0].ends_with("one.txt"));
    assert!(names[1].ends_with("two.txt"));

    // The copied entry still decompresses to the same bytes
    let out = ws.path().join("out");
    let report = archiver.extract(ws.archive(), &out).unwrap();
    assert_eq!(fs::read(&report.extracted[0]).unwrap(), b"1");
    assert_eq!(fs::read(&report.extracted[1]).unwrap(), b"2");
}

#[test]
fn colliding_names_get_the_rename_token() {
    let ws = Workspace::new();
    let docs = ws.path().join("docs");
    let a = write(&docs, "a.txt", b"from the directory");
    let archiver = Archiver::default();

    // docs/ expands to docs/a.txt, then docs/a.txt is given again
    let report = archiver.add_files(ws.archive(), "v1", &[&docs, &a]).unwrap();
    assert_eq!(report.renamed, 1);

    let base = zarch::archiver::entry_name(&docs);
    assert_eq!(
        entry_names(&ws.archive()),
        [format!("{base}/a.txt"), format!("{base}/New_a.txt")]
    );
    assert_eq!(archiver.read_comment(ws.archive()).unwrap(), "v1");
}

#[test]
fn names_stay_unique_across_repeated_adds() {
    let ws = Workspace::new();
    let a = write(ws.path(), "a.txt", b"same file");
    let archiver = Archiver::default();

    for _ in 0..4 {
        archiver.add_files(ws.archive(), "", &[&a]).unwrap();
    }

    let names = entry_names(&ws.archive());
    let unique: BTreeSet<_> = names.iter().collect();
    assert_eq!(names.len(), 4);
    assert_eq!(unique.len(), 4);
    assert!(names[3].ends_with("New_New_New_a.txt"));
}

#[test]
fn every_mutation_overwrites_the_comment() {
    let ws = Workspace::new();
    let a = write(ws.path(), "a.txt", b"a");
    let b = write(ws.path(), "b.txt", b"b");
    let archiver = Archiver::default();

    archiver.add_files(ws.archive(), "C1", &[&a]).unwrap();
    archiver.add_files(ws.archive(), "C2", &[&b]).unwrap();
    assert_eq!(archiver.read_comment(ws.archive()).unwrap(), "C2");

    archiver.add_files_default_comment(ws.archive(), &[&a]).unwrap();
    assert_eq!(archiver.read_comment(ws.archive()).unwrap(), "");
}

#[test]
fn write_comment_keeps_entries() {
    let ws = Workspace::new();
    let a = write(ws.path(), "a.txt", b"keep me");
    let archiver = Archiver::default();
    archiver.add_files(ws.archive(), "old", &[&a]).unwrap();
    let before = entry_names(&ws.archive());

    let report = archiver.write_comment(ws.archive(), "nouveau ünïcode").unwrap();
    assert_eq!(report.copied, 1);
    assert!(report.added.is_empty());
    assert_eq!(entry_names(&ws.archive()), before);
    assert_eq!(
        archiver.read_comment(ws.archive()).unwrap(),
        "nouveau ünïcode"
    );
}

#[test]
fn re_extraction_is_idempotent() {
    let ws = Workspace::new();
    let src = ws.path().join("src");
    write(&src, "x.txt", b"x");
    write(&src, "y/z.txt", b"z");
    let archiver = Archiver::default();
    archiver.add_files(ws.archive(), "", &[&src]).unwrap();

    let out = ws.path().join("out");
    archiver.extract(ws.archive(), &out).unwrap();
    let first = tree(&out);
    archiver.extract(ws.archive(), &out).unwrap();
    assert_eq!(tree(&out), first);
    assert_eq!(first.len(), 2);
}

#[test]
fn extraction_overwrites_existing_files() {
    let ws = Workspace::new();
    let a = write(ws.path(), "a.txt", b"archived");
    let archiver = Archiver::default();
    archiver.add_files(ws.archive(), "", &[&a]).unwrap();

    let out = ws.path().join("out");
    let stale = write(&out, &zarch::archiver::entry_name(&a), b"stale contents");
    archiver.extract(ws.archive(), &out).unwrap();
    assert_eq!(fs::read(stale).unwrap(), b"archived");
}

#[test]
fn artifacts_are_neither_collected_nor_extracted() {
    let ws = Workspace::new();
    let src = ws.path().join("src");
    write(&src, "keep.txt", b"keep");
    write(&src, ".DS_Store", b"finder");
    write(&src, "__MACOSX/._keep.txt", b"fork");
    let archiver = Archiver::default();

    archiver.add_files(ws.archive(), "", &[&src]).unwrap();
    let names = entry_names(&ws.archive());
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with("keep.txt"));

    // An archive built elsewhere may contain artifacts; they are skipped on extract
    let foreign = ws.path().join("foreign.zip");
    {
        let file = fs::File::create(&foreign).unwrap();
        let mut writer = zarch::ZipWriter::new(file).unwrap();
        let options = zarch::zip::EntryOptions {
            method: CompressionMethod::Deflate,
            level: 6,
            modified: std::time::SystemTime::now(),
            unix_mode: None,
            buf_size: 1024,
        };
        for name in ["docs/a.txt", "__MACOSX/docs/._a.txt", "docs/.DS_Store"] {
            writer
                .write_entry(name, &mut name.as_bytes(), &options)
                .unwrap();
        }
        writer.finish(b"").unwrap();
    }
    let out = ws.path().join("out");
    let report = archiver.extract(&foreign, &out).unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(
        tree(&out),
        BTreeSet::from([("docs/a.txt".to_string(), b"docs/a.txt".to_vec())])
    );
}

#[test]
fn unsafe_entry_names_are_skipped() {
    let ws = Workspace::new();
    let evil = ws.path().join("evil.zip");
    {
        let file = fs::File::create(&evil).unwrap();
        let mut writer = zarch::ZipWriter::new(file).unwrap();
        let options = zarch::zip::EntryOptions {
            method: CompressionMethod::Stored,
            level: 0,
            modified: std::time::SystemTime::now(),
            unix_mode: None,
            buf_size: 1024,
        };
        writer
            .write_entry("../escaped.txt", &mut &b"nope"[..], &options)
            .unwrap();
        writer
            .write_entry("inside.txt", &mut &b"yes"[..], &options)
            .unwrap();
        writer.finish(b"").unwrap();
    }

    let out = ws.path().join("out");
    let report = Archiver::default().extract(&evil, &out).unwrap();
    assert_eq!(report.skipped, 1);
    assert!(!ws.path().join("escaped.txt").exists());
    assert_eq!(fs::read(out.join("inside.txt")).unwrap(), b"yes");
}

#[test]
fn default_destination_is_the_archive_stem() {
    let ws = Workspace::new();
    let a = write(ws.path(), "a.txt", b"a");
    let archiver = Archiver::default();
    archiver.add_files(ws.archive(), "", &[&a]).unwrap();

    let report = archiver.extract_default(ws.archive()).unwrap();
    assert!(report.extracted[0].starts_with(ws.path().join("archive")));
    assert_eq!(fs::read(&report.extracted[0]).unwrap(), b"a");
}

#[test]
fn failed_add_leaves_the_original_untouched() {
    let ws = Workspace::new();
    let a = write(ws.path(), "a.txt", b"a");
    let archiver = Archiver::default();
    archiver.add_files(ws.archive(), "orig", &[&a]).unwrap();
    let before = fs::read(ws.archive()).unwrap();

    let missing = ws.path().join("missing.txt");
    let err = archiver
        .add_files(ws.archive(), "new", &[&missing])
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(fs::read(ws.archive()).unwrap(), before);

    // No temporary files are left next to the archive
    let leftovers: Vec<_> = fs::read_dir(ws.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".zarch-"))
        .collect();
    assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
}

#[test]
fn corrupt_archive_is_not_replaced() {
    let ws = Workspace::new();
    let a = write(ws.path(), "a.txt", b"a");
    fs::write(ws.archive(), b"this is not a zip file at all").unwrap();

    let err = Archiver::default()
        .add_files(ws.archive(), "", &[&a])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArchive(_)));
    assert_eq!(
        fs::read(ws.archive()).unwrap(),
        b"this is not a zip file at all"
    );
}

#[test]
fn adding_the_archive_directory_skips_the_archive_itself() {
    let ws = Workspace::new();
    write(ws.path(), "a.txt", b"a");
    let archiver = Archiver::default();
    archiver
        .add_files(ws.archive(), "", &[ws.path().join("a.txt")])
        .unwrap();

    archiver.add_files(ws.archive(), "", &[ws.path()]).unwrap();
    let names = entry_names(&ws.archive());
    assert!(names.iter().all(|n| !n.ends_with(".zip") && !n.ends_with(".tmp")));
    assert_eq!(names.len(), 2);
}

#[test]
fn preconditions_are_checked_before_io() {
    let ws = Workspace::new();
    let archiver = Archiver::default();
    let none: [&Path; 0] = [];

    assert!(archiver
        .add_files(ws.archive(), "", &none)
        .unwrap_err()
        .is_precondition());
    assert!(archiver
        .add_files("", "", &[ws.path()])
        .unwrap_err()
        .is_precondition());
    assert!(archiver
        .write_comment(ws.archive(), "x")
        .unwrap_err()
        .is_precondition());
    assert!(archiver.read_comment(ws.archive()).unwrap_err().is_precondition());
    assert!(archiver
        .extract(ws.archive(), ws.path().join("out"))
        .unwrap_err()
        .is_precondition());

    let long = "c".repeat(70_000);
    let a = write(ws.path(), "a.txt", b"a");
    assert!(archiver
        .add_files(ws.archive(), &long, &[&a])
        .unwrap_err()
        .is_precondition());
    assert!(!ws.archive().exists());
}

#[test]
fn unreadable_archive_comment_falls_back_to_empty() {
    let ws = Workspace::new();
    fs::write(ws.archive(), b"garbage").unwrap();
    assert_eq!(Archiver::default().read_comment(ws.archive()).unwrap(), "");
}

#[test]
fn archives_are_valid_for_a_fresh_reader() {
    let ws = Workspace::new();
    let a = write(ws.path(), "a.txt", &b"abc".repeat(1000));
    Archiver::default()
        .add_files(ws.archive(), "check", &[&a])
        .unwrap();

    let extractor = ZipExtractor::new(LocalFileReader::new(&ws.archive()).unwrap());
    let entries = extractor.list_files().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].uncompressed_size, 3000);
    assert_eq!(extractor.comment().unwrap(), "check");

    let mut out = Vec::new();
    extractor.extract_to_writer(&entries[0], &mut out, 100).unwrap();
    assert_eq!(out, b"abc".repeat(1000));
}

#[test]
fn leftover_temp_files_are_not_archived() {
    let ws = Workspace::new();
    write(ws.path(), "a.txt", b"a");
    // What a rename that failed earlier leaves behind
    write(ws.path(), ".zarch-Xy12ab.tmp", b"half an archive");

    Archiver::default()
        .add_files(ws.archive(), "", &[ws.path()])
        .unwrap();
    let names = entry_names(&ws.archive());
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with("a.txt"));
}

#[cfg(unix)]
#[test]
fn archive_permissions_follow_umask_and_survive_rewrites() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new();
    let a = write(ws.path(), "a.txt", b"a");
    let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
    let archiver = Archiver::default();

    // A new archive gets what a plain create would get under the current umask
    let plain = ws.path().join("plain");
    fs::File::create(&plain).unwrap();
    archiver.add_files(ws.archive(), "", &[&a]).unwrap();
    assert_eq!(mode(&ws.archive()), mode(&plain));

    fs::set_permissions(ws.archive(), fs::Permissions::from_mode(0o640)).unwrap();
    archiver.write_comment(ws.archive(), "c").unwrap();
    assert_eq!(mode(&ws.archive()), 0o640);

    archiver.add_files(ws.archive(), "d", &[&a]).unwrap();
    assert_eq!(mode(&ws.archive()), 0o640);
}

#[cfg(unix)]
#[test]
fn added_files_record_their_unix_mode() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new();
    let script = write(ws.path(), "run.sh", b"#!/bin/sh\n");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).unwrap();

    Archiver::default()
        .add_files(ws.archive(), "", &[&script])
        .unwrap();
    let entries = Archiver::default().list(ws.archive()).unwrap();
    assert_eq!(entries[0].unix_mode().map(|m| m & 0o777), Some(0o750));
}
