//! Reader that checks a CRC-32 once the wrapped stream is exhausted.

use std::fmt;
use std::io::{self, Read};

use crc32fast::Hasher;

/// Marker carried inside the `io::Error` raised on a CRC mismatch, so
/// callers can tell it apart from decoder errors.
#[derive(Debug)]
pub struct ChecksumError;

impl fmt::Display for ChecksumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invalid checksum")
    }
}

impl std::error::Error for ChecksumError {}

impl ChecksumError {
    pub fn is_checksum_error(e: &io::Error) -> bool {
        e.get_ref().is_some_and(|inner| inner.is::<ChecksumError>())
    }
}

pub struct Crc32Reader<R> {
    inner: R,
    hasher: Hasher,
    expected: u32,
}

impl<R> Crc32Reader<R> {
    pub fn new(inner: R, expected: u32) -> Crc32Reader<R> {
        Crc32Reader {
            inner,
            hasher: Hasher::new(),
            expected,
        }
    }

    fn check_matches(&self) -> bool {
        self.expected == self.hasher.clone().finalize()
    }
}

impl<R: Read> Read for Crc32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = match self.inner.read(buf) {
            Ok(0) if !buf.is_empty() && !self.check_matches() => {
                return Err(io::Error::new(io::ErrorKind::InvalidData, ChecksumError));
            }
            Ok(n) => n,
            Err(e) => return Err(e),
        };
        self.hasher.update(&buf[0..count]);
        Ok(count)
    }
}
