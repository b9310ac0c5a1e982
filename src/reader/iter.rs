//! Pull-style record iteration over a byte source

use std::io::{self, Read};

use crate::record::WarcRecord;
use crate::{Result, WarcError};

use super::parser::{FrameParser, ParserLimits};

/// Default number of bytes read from the source per parser feed
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Lazy, single-pass sequence of records read from `R`.
///
/// The source is read one chunk at a time and only when the parser needs more
/// input. After the first error, or after [`stop`](Self::stop), the iterator
/// yields `None` and the source has been dropped.
pub struct WarcRecords<R: Read> {
    source: Option<R>,
    parser: FrameParser,
    chunk: Vec<u8>,
}

impl<R: Read> WarcRecords<R> {
    /// Iterate over records in `source`
    pub fn new(source: R) -> Self {
        Self::with_options(source, DEFAULT_CHUNK_SIZE, ParserLimits::default())
    }

    /// Iterate with an explicit chunk size and parser limits
    pub fn with_options(source: R, chunk_size: usize, limits: ParserLimits) -> Self {
        Self {
            source: Some(source),
            parser: FrameParser::with_limits(limits),
            chunk: vec![0; chunk_size.max(1)],
        }
    }

    /// Stop iterating and release the source
    pub fn stop(&mut self) {
        self.source = None;
    }

    /// Whether the source is still held
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at the clean end of the stream or once stopped.
    ///
    /// # Errors
    ///
    /// Returns error if the source fails or the stream is badly framed
    pub fn read_next(&mut self) -> Result<Option<WarcRecord>> {
        let result = self.pull();
        if !matches!(result, Ok(Some(_))) {
            self.source = None;
        }
        result
    }

    fn pull(&mut self) -> Result<Option<WarcRecord>> {
        loop {
            let Some(source) = self.source.as_mut() else {
                return Ok(None);
            };
            if let Some(record) = self.parser.next_record()? {
                return Ok(Some(record));
            }

            let n = match source.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(WarcError::from_source(e)),
            };
            if n == 0 {
                self.parser.finish()?;
                return Ok(None);
            }
            self.parser.push(&self.chunk[..n]);
        }
    }
}

impl<R: Read> Iterator for WarcRecords<R> {
    type Item = Result<WarcRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &[u8] =
        b"WARC/1.1\r\nWARC-Type: resource\r\nContent-Length: 4\r\n\r\ndata\r\n\r\n";

    /// Reader that hands out at most `step` bytes per call
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_iterate_records() {
        let mut input = RECORD.to_vec();
        input.extend_from_slice(RECORD);
        let records: Vec<_> = WarcRecords::new(&input[..])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].stream_pos(), RECORD.len() as u64);
    }

    #[test]
    fn test_trickled_source() {
        let records: Vec<_> = WarcRecords::with_options(
            Trickle { data: RECORD, step: 3 },
            2,
            ParserLimits::default(),
        )
        .collect::<Result<_>>()
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content().as_ref(), b"data");
    }

    #[test]
    fn test_error_fuses_iterator() {
        let mut records = WarcRecords::new(&b"WARC/1.1\r\nContent-Length: 9\r\n\r\nabc"[..]);
        assert!(matches!(records.next(), Some(Err(WarcError::Framing { .. }))));
        assert!(records.next().is_none());
        assert!(!records.is_active());
    }

    #[test]
    fn test_stop_releases_source() {
        let mut records = WarcRecords::new(RECORD);
        records.stop();
        assert!(!records.is_active());
        assert!(records.next().is_none());
    }
}
