//! ZIP archive writer.
//!
//! Entries are written one after another: local header, then data. Sizes
//! and CRC-32 are not known until a file has been streamed, so the local
//! header is written with zeros and patched afterwards by seeking back.
//! This keeps the output free of data descriptors, which every ZIP reader
//! understands. [`ZipWriter::finish`] appends the central directory and the
//! end record carrying the archive comment.
//!
//! ZIP64 is not written: entries and archives must stay below 4 GiB and
//! 65535 entries.

use byteorder::{LittleEndian, WriteBytesExt};
use crc32fast::Hasher;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::io::copy_chunked;

use super::structures::*;

// All-ones values mark ZIP64 fields, so the largest usable value is one less
const MAX_ENTRIES: usize = u16::MAX as usize - 1;
const MAX_OFFSET: u64 = u32::MAX as u64 - 1;

/// How a new entry is written.
#[derive(Debug, Clone, Copy)]
pub struct EntryOptions {
    pub method: CompressionMethod,
    /// Deflate level, 0-9
    pub level: u32,
    pub modified: SystemTime,
    /// Unix mode (type and permission bits) recorded in the external attributes
    pub unix_mode: Option<u32>,
    pub buf_size: usize,
}

pub struct ZipWriter<W: Write + Seek> {
    inner: W,
    entries: Vec<ZipFileEntry>,
    offset: u64,
}

impl<W: Write + Seek> ZipWriter<W> {
    /// Start an archive at the current position of `inner`.
    pub fn new(mut inner: W) -> Result<Self> {
        let offset = inner.stream_position()?;
        Ok(Self {
            inner,
            entries: Vec::new(),
            offset,
        })
    }

    /// Entries written so far, in order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Compress `source` into a new entry called `name`.
    pub fn write_entry<R: Read + ?Sized>(
        &mut self,
        name: &str,
        source: &mut R,
        options: &EntryOptions,
    ) -> Result<&ZipFileEntry> {
        self.check_capacity(name.len())?;
        let (last_mod_time, last_mod_date) = dos_datetime(options.modified);

        let method = match options.method {
            CompressionMethod::Unknown(m) => {
                return Err(Error::Unsupported(format!("writing compression method {m}")));
            }
            known => known,
        };

        let (version_made_by, external_attrs) = match options.unix_mode {
            Some(mode) => ((HOST_UNIX << 8) | VERSION_20, mode << 16),
            None => (VERSION_20, 0),
        };

        let mut entry = ZipFileEntry {
            file_name: name.to_string(),
            file_name_raw: name.as_bytes().to_vec(),
            version_made_by,
            version_needed: VERSION_20,
            flags: FLAG_UTF8,
            compression_method: method,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: self.offset,
            last_mod_time,
            last_mod_date,
            internal_attrs: 0,
            external_attrs,
            file_comment: Vec::new(),
            is_directory: name.ends_with('/'),
        };
        entry.write_local_header(&mut self.inner)?;
        let data_start = self.offset + LFH_SIZE as u64 + entry.file_name_raw.len() as u64;

        let mut hashing = HashingReader {
            inner: source,
            hasher: Hasher::new(),
        };
        let mut counting = CountingWriter {
            inner: &mut self.inner,
            count: 0,
        };
        let uncompressed_size = match method {
            CompressionMethod::Deflate => {
                let mut encoder =
                    DeflateEncoder::new(&mut counting, Compression::new(options.level.min(9)));
                let n = copy_chunked(&mut hashing, &mut encoder, options.buf_size)?;
                encoder.finish()?;
                n
            }
            _ => copy_chunked(&mut hashing, &mut counting, options.buf_size)?,
        };
        let compressed_size = counting.count;

        if compressed_size > MAX_OFFSET || uncompressed_size > MAX_OFFSET {
            return Err(Error::Unsupported(format!(
                "{name} is larger than 4 GiB (ZIP64 is not written)"
            )));
        }

        entry.crc32 = hashing.hasher.finalize();
        entry.compressed_size = compressed_size;
        entry.uncompressed_size = uncompressed_size;

        // Patch CRC and sizes into the local header
        let data_end = data_start + compressed_size;
        self.inner
            .seek(SeekFrom::Start(entry.lfh_offset + LFH_CRC_OFFSET))?;
        self.inner.write_u32::<LittleEndian>(entry.crc32)?;
        self.inner.write_u32::<LittleEndian>(compressed_size as u32)?;
        self.inner.write_u32::<LittleEndian>(uncompressed_size as u32)?;
        self.inner.seek(SeekFrom::Start(data_end))?;

        self.offset = data_end;
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Copy an entry from another archive without recompressing it.
    ///
    /// `data` must yield exactly the entry's stored bytes.
    pub fn raw_copy<R: Read + ?Sized>(
        &mut self,
        source: &ZipFileEntry,
        data: &mut R,
        buf_size: usize,
    ) -> Result<&ZipFileEntry> {
        self.check_capacity(source.file_name_raw.len())?;
        if source.compressed_size > MAX_OFFSET || source.uncompressed_size > MAX_OFFSET {
            return Err(Error::Unsupported(format!(
                "{} is larger than 4 GiB (ZIP64 is not written)",
                source.file_name
            )));
        }

        let mut entry = source.clone();
        entry.lfh_offset = self.offset;
        // Sizes are known up front, so no data descriptor follows the copy
        entry.flags &= !FLAG_DATA_DESCRIPTOR;
        entry.write_local_header(&mut self.inner)?;

        let copied = copy_chunked(data, &mut self.inner, buf_size)?;
        if copied != entry.compressed_size {
            return Err(Error::InvalidArchive("entry data shorter than its declared size"));
        }

        self.offset += LFH_SIZE as u64 + entry.file_name_raw.len() as u64 + copied;
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Write the central directory and end record, returning the inner writer.
    pub fn finish(mut self, comment: &[u8]) -> Result<W> {
        if comment.len() > MAX_FIELD_LEN {
            return Err(Error::Precondition(format!(
                "archive comment is {} bytes, the limit is {}",
                comment.len(),
                MAX_FIELD_LEN
            )));
        }

        let cd_offset = self.offset;
        let mut counting = CountingWriter {
            inner: &mut self.inner,
            count: 0,
        };
        for entry in &self.entries {
            entry.write_central_header(&mut counting)?;
        }
        let cd_size = counting.count;

        if cd_offset > MAX_OFFSET || cd_size > MAX_OFFSET {
            return Err(Error::Unsupported(
                "archive larger than 4 GiB (ZIP64 is not written)".to_string(),
            ));
        }

        let count = self.entries.len() as u16;
        EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: count,
            total_entries: count,
            cd_size: cd_size as u32,
            cd_offset: cd_offset as u32,
            comment_len: comment.len() as u16,
        }
        .write_to(&mut self.inner, comment)?;
        self.inner.flush()?;

        Ok(self.inner)
    }

    fn check_capacity(&self, name_len: usize) -> Result<()> {
        if name_len > MAX_FIELD_LEN {
            return Err(Error::Precondition(format!(
                "entry name is {name_len} bytes, the limit is {MAX_FIELD_LEN}"
            )));
        }
        if self.entries.len() >= MAX_ENTRIES {
            return Err(Error::Unsupported(format!(
                "more than {MAX_ENTRIES} entries (ZIP64 is not written)"
            )));
        }
        if self.offset > MAX_OFFSET {
            return Err(Error::Unsupported(
                "archive larger than 4 GiB (ZIP64 is not written)".to_string(),
            ));
        }
        Ok(())
    }
}

struct HashingReader<'a, R: ?Sized> {
    inner: &'a mut R,
    hasher: Hasher,
}

impl<R: Read + ?Sized> Read for HashingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

struct CountingWriter<'a, W: ?Sized> {
    inner: &'a mut W,
    count: u64,
}

impl<W: Write + ?Sized> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
