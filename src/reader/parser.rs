//! Incremental WARC framing state machine

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use crate::record::{HeaderMap, WarcRecord, RECORD_SEPARATOR, VERSION_PREFIX};
use crate::{Result, WarcError};

/// Default longest accepted header or version line
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Upper bound on the content buffer reserved up front for one record
const CONTENT_PREALLOC_MAX: usize = 1024 * 1024;

/// Limits applied while framing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    /// Longest accepted header or version line, in bytes
    pub max_line_length: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Parser state, exposed for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Looking for a `WARC/<version>` line
    SeekingVersionLine,
    /// Reading `Name: value` lines until a blank line
    ReadingHeaders,
    /// Collecting exactly `Content-Length` bytes
    ReadingContent,
    /// Consuming the `\r\n\r\n` record separator
    SkippingTrailingCrlf,
    /// A framing error occurred; no further records will be produced
    Failed,
}

/// Record under construction
struct PendingRecord {
    version: String,
    headers: HeaderMap,
    content: BytesMut,
    expected: usize,
    stream_pos: u64,
}

/// Incremental WARC record parser.
///
/// Bytes are pushed in chunks of any size; chunk boundaries need not line up with
/// anything in the WARC structure. Unconsumed bytes are carried over between calls.
/// [`next_record`](Self::next_record) advances the state machine until exactly one
/// record completes or more input is needed, so at most one finished record is
/// ever held by the parser.
pub struct FrameParser {
    state: ParserState,
    buffer: BytesMut,
    /// Stream offset of `buffer[0]`
    offset: u64,
    pending: Option<PendingRecord>,
    limits: ParserLimits,
    records_emitted: u64,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a parser with default limits
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(ParserLimits::default())
    }

    /// Create a parser with explicit limits
    #[must_use]
    pub fn with_limits(limits: ParserLimits) -> Self {
        Self {
            state: ParserState::SeekingVersionLine,
            buffer: BytesMut::new(),
            offset: 0,
            pending: None,
            limits,
            records_emitted: 0,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Bytes carried over and not yet consumed
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Number of records produced so far
    #[must_use]
    pub fn records_emitted(&self) -> u64 {
        self.records_emitted
    }

    /// Append a chunk of input
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Push a chunk and collect every record it completes
    ///
    /// # Errors
    ///
    /// Returns error if the input is not validly framed
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<WarcRecord>> {
        self.push(chunk);
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Advance until the next record is complete.
    ///
    /// Returns `Ok(None)` when more input is needed.
    ///
    /// # Errors
    ///
    /// Returns error if the input is not validly framed. The parser is unusable
    /// afterwards.
    pub fn next_record(&mut self) -> Result<Option<WarcRecord>> {
        let result = self.advance();
        if result.is_err() {
            self.state = ParserState::Failed;
            self.pending = None;
        }
        result
    }

    /// Signal end of input.
    ///
    /// # Errors
    ///
    /// Returns a framing error if input ended inside a record
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            ParserState::SeekingVersionLine
                if self.buffer.iter().all(u8::is_ascii_whitespace) =>
            {
                self.buffer.clear();
                debug!(
                    "Parser finished after {} record(s), {} bytes",
                    self.records_emitted, self.offset
                );
                Ok(())
            }
            ParserState::Failed => Err(WarcError::Usage(
                "parser already failed on earlier input".to_string(),
            )),
            _ => {
                let offset = self
                    .pending
                    .as_ref()
                    .map_or(self.offset, |p| p.stream_pos);
                self.state = ParserState::Failed;
                self.pending = None;
                Err(WarcError::framing(offset, "truncated record"))
            }
        }
    }

    fn advance(&mut self) -> Result<Option<WarcRecord>> {
        loop {
            match self.state {
                ParserState::SeekingVersionLine => {
                    let line_start = self.offset;
                    let Some(line) = self.take_line()? else {
                        return Ok(None);
                    };
                    let text = String::from_utf8_lossy(&line);
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if let Some(version) = text.strip_prefix(VERSION_PREFIX) {
                        self.pending = Some(PendingRecord {
                            version: version.trim().to_string(),
                            headers: HeaderMap::new(),
                            content: BytesMut::new(),
                            expected: 0,
                            stream_pos: line_start,
                        });
                        self.state = ParserState::ReadingHeaders;
                    } else {
                        warn!("Skipping non-WARC line at offset {}", line_start);
                    }
                }
                ParserState::ReadingHeaders => {
                    let line_start = self.offset;
                    let Some(line) = self.take_line()? else {
                        return Ok(None);
                    };
                    let pending = self.pending_mut()?;
                    if line.is_empty() {
                        pending.expected = pending
                            .headers
                            .get("Content-Length")
                            .and_then(|v| v.parse::<usize>().ok())
                            .unwrap_or(0);
                        pending.content =
                            BytesMut::with_capacity(pending.expected.min(CONTENT_PREALLOC_MAX));
                        self.state = ParserState::ReadingContent;
                        continue;
                    }
                    let text = String::from_utf8_lossy(&line);
                    if text.starts_with(|c: char| c == ' ' || c == '\t') {
                        if !pending.headers.extend_last(&text) {
                            return Err(WarcError::framing(
                                line_start,
                                "continuation line before any header",
                            ));
                        }
                        continue;
                    }
                    match text.split_once(": ").or_else(|| text.split_once(':')) {
                        Some((name, value)) if !name.trim().is_empty() => {
                            pending.headers.insert(name, value);
                        }
                        _ => {
                            return Err(WarcError::framing(
                                line_start,
                                format!("malformed header line {:?}", text),
                            ));
                        }
                    }
                }
                ParserState::ReadingContent => {
                    let available = self.buffer.len();
                    let pending = self
                        .pending
                        .as_mut()
                        .ok_or_else(|| WarcError::framing(self.offset, "no record in progress"))?;
                    let needed = pending.expected - pending.content.len();
                    let take = needed.min(available);
                    if take > 0 {
                        let chunk = self.buffer.split_to(take);
                        if pending.content.is_empty() && take == needed {
                            pending.content = chunk;
                        } else {
                            pending.content.extend_from_slice(&chunk);
                        }
                        self.offset += take as u64;
                    }
                    if pending.content.len() < pending.expected {
                        return Ok(None);
                    }

                    let Some(done) = self.pending.take() else {
                        return Err(WarcError::framing(self.offset, "no record in progress"));
                    };
                    self.state = ParserState::SkippingTrailingCrlf;
                    self.records_emitted += 1;
                    debug!(
                        "Parsed WARC record at offset {} ({} content bytes)",
                        done.stream_pos, done.expected
                    );
                    return Ok(Some(WarcRecord::parsed(
                        done.version,
                        done.headers,
                        done.content.freeze(),
                        done.stream_pos,
                    )));
                }
                ParserState::SkippingTrailingCrlf => {
                    let sep_len = RECORD_SEPARATOR.len();
                    let have = self.buffer.len().min(sep_len);
                    if self.buffer[..have] != RECORD_SEPARATOR[..have] {
                        return Err(WarcError::framing(
                            self.offset,
                            "missing CRLF CRLF separator after record content",
                        ));
                    }
                    if have < sep_len {
                        return Ok(None);
                    }
                    self.buffer.advance(sep_len);
                    self.offset += sep_len as u64;
                    self.state = ParserState::SeekingVersionLine;
                }
                ParserState::Failed => {
                    return Err(WarcError::Usage(
                        "parser already failed on earlier input".to_string(),
                    ));
                }
            }
        }
    }

    fn pending_mut(&mut self) -> Result<&mut PendingRecord> {
        let offset = self.offset;
        self.pending
            .as_mut()
            .ok_or_else(|| WarcError::framing(offset, "no record in progress"))
    }

    /// Split off one line, without its `\n` / `\r\n` terminator
    fn take_line(&mut self) -> Result<Option<BytesMut>> {
        let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') else {
            if self.buffer.len() > self.limits.max_line_length {
                return Err(WarcError::framing(self.offset, "line too long"));
            }
            return Ok(None);
        };
        if newline > self.limits.max_line_length {
            return Err(WarcError::framing(self.offset, "line too long"));
        }

        let mut line = self.buffer.split_to(newline + 1);
        self.offset += line.len() as u64;
        line.truncate(newline);
        if line.last() == Some(&b'\r') {
            line.truncate(newline - 1);
        }
        Ok(Some(line))
    }
}
