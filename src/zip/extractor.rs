use flate2::read::DeflateDecoder;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::error::{Error, IoContext, Result};
use crate::io::{ReadAt, Window, copy_chunked};

use super::crc_reader::{ChecksumError, Crc32Reader};
use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files()
    }

    /// Archive comment, decoded lossily as UTF-8
    pub fn comment(&self) -> Result<String> {
        let raw = self.parser.comment()?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// The entry's stored (still compressed) bytes.
    pub fn raw_data(&self, entry: &ZipFileEntry) -> Result<Window<'_, R>> {
        let data_offset = self.parser.get_data_offset(entry)?;
        Ok(Window::new(
            self.parser.reader(),
            data_offset,
            entry.compressed_size,
        ))
    }

    /// Open a stream of the entry's decompressed bytes.
    ///
    /// The CRC-32 is checked when the stream reaches its end.
    pub fn open_entry(&self, entry: &ZipFileEntry) -> Result<Box<dyn Read + '_>> {
        if entry.is_encrypted() {
            return Err(Error::Unsupported(format!(
                "{} is encrypted",
                entry.file_name
            )));
        }

        let raw = self.raw_data(entry)?;
        let decoded: Box<dyn Read + '_> = match entry.compression_method {
            CompressionMethod::Stored => Box::new(raw),
            CompressionMethod::Deflate => Box::new(DeflateDecoder::new(raw)),
            CompressionMethod::Unknown(method) => {
                return Err(Error::Unsupported(format!(
                    "compression method {} in {}",
                    method, entry.file_name
                )));
            }
        };

        // Bound the decoder by the declared size, then verify what came out
        let limited = decoded.take(entry.uncompressed_size);
        Ok(Box::new(Crc32Reader::new(limited, entry.crc32)))
    }

    /// Stream the entry's decompressed bytes into `out`.
    pub fn extract_to_writer<W: Write + ?Sized>(
        &self,
        entry: &ZipFileEntry,
        out: &mut W,
        buf_size: usize,
    ) -> Result<u64> {
        let mut reader = self.open_entry(entry)?;
        let written = copy_chunked(&mut reader, out, buf_size)
            .map_err(|e| stream_error(entry, e))?;
        if written != entry.uncompressed_size {
            return Err(Error::InvalidArchive("entry shorter than its declared size"));
        }
        Ok(written)
    }

    /// Extract file to disk, replacing whatever is at `output_path`
    pub fn extract_to_file(
        &self,
        entry: &ZipFileEntry,
        output_path: &Path,
        buf_size: usize,
    ) -> Result<u64> {
        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).at(parent)?;
            }
        }

        let mut file = fs::File::create(output_path).at(output_path)?;
        let written = self.extract_to_writer(entry, &mut file, buf_size)?;
        file.flush().at(output_path)?;

        Ok(written)
    }
}

fn stream_error(entry: &ZipFileEntry, e: io::Error) -> Error {
    if ChecksumError::is_checksum_error(&e) {
        Error::ChecksumMismatch {
            name: entry.file_name.clone(),
        }
    } else {
        Error::Stream(e)
    }
}
