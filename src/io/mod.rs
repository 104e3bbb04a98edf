mod local;
mod memory;

pub use local::LocalFileReader;
pub use memory::MemoryReader;

use std::io;

/// Trait for random access reading from a data source
pub trait ReadAt {
    /// Read data at the specified offset into the buffer
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill the whole buffer from `offset`, failing on a short read.
    fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(offset, buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "read past end of archive",
                    ));
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// A bounded `Read` over `len` bytes of a [`ReadAt`] source starting at `offset`.
///
/// Lets entry data be streamed through decoders in chunks instead of being
/// loaded into memory at once.
pub struct Window<'a, R: ReadAt + ?Sized> {
    reader: &'a R,
    offset: u64,
    remaining: u64,
}

impl<'a, R: ReadAt + ?Sized> Window<'a, R> {
    pub fn new(reader: &'a R, offset: u64, len: u64) -> Self {
        Self {
            reader,
            offset,
            remaining: len,
        }
    }
}

impl<R: ReadAt + ?Sized> io::Read for Window<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.reader.read_at(self.offset, &mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "entry data truncated",
            ));
        }
        self.offset += n as u64;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Stream `reader` into `writer` through a buffer of `buf_size` bytes.
///
/// Returns the number of bytes copied.
pub fn copy_chunked<R, W>(reader: &mut R, writer: &mut W, buf_size: usize) -> io::Result<u64>
where
    R: io::Read + ?Sized,
    W: io::Write + ?Sized,
{
    let mut buf = vec![0u8; buf_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn window_reads_only_its_range() {
        let source = MemoryReader::new(b"0123456789".to_vec());
        let mut window = Window::new(&source, 3, 4);
        let mut out = String::new();
        window.read_to_string(&mut out).unwrap();
        assert_eq!(out, "3456");
    }

    #[test]
    fn window_past_end_is_an_error() {
        let source = MemoryReader::new(b"abc".to_vec());
        let mut window = Window::new(&source, 1, 10);
        let mut out = Vec::new();
        let err = window.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn copy_chunked_preserves_every_byte() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut out = Vec::new();
        let n = copy_chunked(&mut data.as_slice(), &mut out, 7).unwrap();
        assert_eq!(n, 10_000);
        assert_eq!(out, data);
    }

    #[test]
    fn read_exact_at_rejects_short_source() {
        let source = MemoryReader::new(vec![1, 2, 3]);
        let mut buf = [0u8; 4];
        assert!(source.read_exact_at(0, &mut buf).is_err());
        let mut buf = [0u8; 2];
        source.read_exact_at(1, &mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
    }
}
