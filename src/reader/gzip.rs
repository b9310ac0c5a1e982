//! Gzip detection and multi-member decompression

use std::fs::File;
use std::io::{self, BufRead, Read};
use std::path::Path;

use flate2::bufread::GzDecoder;
use tracing::debug;

use crate::error::GunzipFailure;
use crate::Result;

/// gzip magic bytes (RFC 1952)
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Check whether a byte prefix starts with the gzip magic number
#[must_use]
pub fn is_gzip_magic(prefix: &[u8]) -> bool {
    prefix.len() >= 2 && prefix[..2] == GZIP_MAGIC
}

/// Check whether the file at `path` is gzip-compressed.
///
/// Only the leading magic bytes are inspected; the file extension is ignored.
/// The file handle is closed before returning.
///
/// # Errors
///
/// Returns error if the file cannot be opened or read
pub fn is_gzipped(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut prefix = [0u8; 2];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = file.read(&mut prefix[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(is_gzip_magic(&prefix[..filled]))
}

/// `BufRead` wrapper counting the compressed bytes handed to the decoder
struct CountingReader<R> {
    inner: R,
    consumed: u64,
}

impl<R: BufRead> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed += n as u64;
        Ok(n)
    }
}

impl<R: BufRead> BufRead for CountingReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.consumed += amt as u64;
        self.inner.consume(amt);
    }
}

/// Decompresses a stream of concatenated gzip members as one logical stream.
///
/// WARC files commonly compress every record as its own gzip member. A single
/// member decoder stops at the first member trailer; this reader starts a fresh
/// decoder on the remaining input each time a member completes, until the
/// compressed input is exhausted.
pub struct ChunkedGunzip<R: BufRead> {
    decoder: Option<GzDecoder<CountingReader<R>>>,
    members: u64,
    finished_offset: u64,
}

impl<R: BufRead> ChunkedGunzip<R> {
    /// Wrap a buffered compressed source
    pub fn new(inner: R) -> Self {
        let counting = CountingReader { inner, consumed: 0 };
        Self {
            decoder: Some(GzDecoder::new(counting)),
            members: 1,
            finished_offset: 0,
        }
    }

    /// Number of gzip members started so far
    #[must_use]
    pub fn members(&self) -> u64 {
        self.members
    }

    /// Compressed bytes consumed from the source so far
    #[must_use]
    pub fn compressed_offset(&self) -> u64 {
        self.decoder
            .as_ref()
            .map_or(self.finished_offset, |d| d.get_ref().consumed)
    }
}

impl<R: BufRead> Read for ChunkedGunzip<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let Some(decoder) = self.decoder.as_mut() else {
                return Ok(0);
            };

            match decoder.read(buf) {
                Ok(0) => {}
                Ok(n) => return Ok(n),
                Err(source) => {
                    let offset = decoder.get_ref().consumed;
                    self.finished_offset = offset;
                    self.decoder = None;
                    return Err(GunzipFailure { offset, source }.into());
                }
            }

            // Member complete: resynchronize on whatever compressed input remains
            let Some(decoder) = self.decoder.take() else {
                return Ok(0);
            };
            let mut source = decoder.into_inner();
            let has_more = match source.fill_buf() {
                Ok(rest) => !rest.is_empty(),
                Err(source_err) => {
                    self.finished_offset = source.consumed;
                    return Err(source_err);
                }
            };
            if !has_more {
                self.finished_offset = source.consumed;
                debug!(
                    "Gzip input exhausted after {} member(s), {} compressed bytes",
                    self.members, source.consumed
                );
                return Ok(0);
            }
            self.members += 1;
            self.decoder = Some(GzDecoder::new(source));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{BufReader, Write};
    use tempfile::NamedTempFile;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_sniff_gzip_magic() {
        assert!(is_gzip_magic(&[0x1f, 0x8b, 0x08, 0x00]));
        assert!(!is_gzip_magic(&[0x1f]));
        assert!(!is_gzip_magic(b"WARC/1.1"));
    }

    #[test]
    fn test_is_gzipped_file() {
        let mut gz_file = NamedTempFile::new().unwrap();
        gz_file.write_all(&gzip(b"WARC/1.1\r\n")).unwrap();
        assert!(is_gzipped(gz_file.path()).unwrap());

        let mut plain_file = NamedTempFile::new().unwrap();
        plain_file.write_all(b"WARC/1.1\r\n").unwrap();
        assert!(!is_gzipped(plain_file.path()).unwrap());

        let empty_file = NamedTempFile::new().unwrap();
        assert!(!is_gzipped(empty_file.path()).unwrap());
    }

    #[test]
    fn test_is_gzipped_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = is_gzipped(&dir.path().join("missing.warc.gz"));
        assert!(matches!(result, Err(crate::WarcError::Io(_))));
    }

    #[test]
    fn test_single_member() {
        let compressed = gzip(b"hello world");
        let mut reader = ChunkedGunzip::new(&compressed[..]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
        assert_eq!(reader.members(), 1);
        assert_eq!(reader.compressed_offset(), compressed.len() as u64);
    }

    #[test]
    fn test_concatenated_members() {
        let mut compressed = gzip(b"first ");
        compressed.extend(gzip(b"second "));
        compressed.extend(gzip(b"third"));

        // Small buffer so member boundaries fall mid-buffer and mid-read
        let mut reader = ChunkedGunzip::new(BufReader::with_capacity(7, &compressed[..]));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"first second third");
        assert_eq!(reader.members(), 3);
    }

    #[test]
    fn test_empty_member_in_the_middle() {
        let mut compressed = gzip(b"a");
        compressed.extend(gzip(b""));
        compressed.extend(gzip(b"b"));
        let mut out = Vec::new();
        ChunkedGunzip::new(&compressed[..])
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"ab");
    }

    #[test]
    fn test_garbage_after_member_is_decode_error() {
        let mut compressed = gzip(b"valid");
        let boundary = compressed.len() as u64;
        compressed.extend_from_slice(b"definitely not gzip");

        let mut reader = ChunkedGunzip::new(&compressed[..]);
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        match crate::WarcError::from_source(err) {
            crate::WarcError::Decode { offset, .. } => assert!(offset >= boundary),
            other => panic!("unexpected error: {other}"),
        }
    }
}
