//! Writer sessions: ordered, per-record commits to a sink

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::config::WriterOptions;
use crate::record::{HeaderMap, WarcRecord};
use crate::{Result, WarcError};

use super::builder::{self, HttpMessage, Linkage, WarcInfoFields};

/// State owned by an open writer
struct WriterSession<W: Write> {
    sink: W,
    filename: String,
    options: WriterOptions,
    warcinfo_id: Option<String>,
    records_written: u64,
}

impl<W: Write> WriterSession<W> {
    /// Commit one unit: optionally gzip it, then a single `write_all` and a flush
    fn commit(&mut self, block: &[u8]) -> Result<()> {
        if self.options.gzip {
            let mut encoder = GzEncoder::new(
                Vec::with_capacity(block.len() / 2 + 32),
                Compression::new(self.options.compression_level),
            );
            encoder.write_all(block)?;
            let member = encoder.finish()?;
            self.sink.write_all(&member)?;
        } else {
            self.sink.write_all(block)?;
        }
        self.sink.flush()?;
        self.records_written += 1;
        Ok(())
    }

    fn links(&self) -> Linkage {
        Linkage {
            concurrent_to: None,
            warcinfo_id: self.warcinfo_id.clone(),
        }
    }
}

/// Writes WARC records to a file or any other sink.
///
/// Every record is serialized completely before its first byte is written and
/// is committed with one write followed by a flush, so records appear in the
/// sink in call order and never interleave. With `gzip` enabled each record
/// becomes its own gzip member.
pub struct WarcWriter<W: Write = File> {
    session: Option<WriterSession<W>>,
}

impl<W: Write> Default for WarcWriter<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl WarcWriter<File> {
    /// Open `path` for writing, appending or truncating per `options`
    ///
    /// # Errors
    ///
    /// Returns error if a session is already open or the file cannot be opened
    pub fn open(&mut self, path: &Path, options: WriterOptions) -> Result<()> {
        self.ensure_closed()?;
        let mut open = OpenOptions::new();
        open.create(true);
        if options.appending {
            open.append(true);
        } else {
            open.write(true).truncate(true);
        }
        let file = open.open(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.open_sink(file, filename, options)
    }
}

impl<W: Write> WarcWriter<W> {
    /// Create a writer with no open session
    #[must_use]
    pub fn new() -> Self {
        Self { session: None }
    }

    /// Start a session writing to `sink`.
    ///
    /// `filename` is recorded in `WARC-Filename` of warcinfo records.
    ///
    /// # Errors
    ///
    /// Returns error if a session is already open
    pub fn open_sink(
        &mut self,
        sink: W,
        filename: impl Into<String>,
        options: WriterOptions,
    ) -> Result<()> {
        self.ensure_closed()?;
        let filename = filename.into();
        info!(
            "Opened WARC writer for {} (appending: {}, gzip: {})",
            filename, options.appending, options.gzip
        );
        self.session = Some(WriterSession {
            sink,
            filename,
            options,
            warcinfo_id: None,
            records_written: 0,
        });
        Ok(())
    }

    /// Whether a session is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Record id of the session's warcinfo record, once one was written
    #[must_use]
    pub fn warcinfo_id(&self) -> Option<&str> {
        self.session.as_ref()?.warcinfo_id.as_deref()
    }

    /// Forget the current warcinfo id so the next warcinfo write replaces it
    pub fn reset_warcinfo(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.warcinfo_id = None;
        }
    }

    /// Number of units committed in this session
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.records_written)
    }

    /// Write a generated warcinfo record
    ///
    /// # Errors
    ///
    /// Returns error if no session is open or the write fails
    pub fn write_warcinfo_record(
        &mut self,
        is_part_of: &str,
        description: &str,
        user_agent: &str,
    ) -> Result<()> {
        let session = self.session_mut()?;
        let record = builder::warcinfo_record(
            &session.filename,
            &WarcInfoFields {
                is_part_of,
                description,
                user_agent,
            },
        );
        self.write_warcinfo(&record)
    }

    /// Write a warcinfo record whose body is `body` verbatim
    ///
    /// # Errors
    ///
    /// Returns error if no session is open or the write fails
    pub fn write_warc_raw_info_record(&mut self, body: impl Into<Bytes>) -> Result<()> {
        let session = self.session_mut()?;
        let record = builder::raw_warcinfo_record(&session.filename, body.into());
        self.write_warcinfo(&record)
    }

    /// Write a metadata record listing outlinks of `target_uri`
    ///
    /// # Errors
    ///
    /// Returns error if no session is open or the write fails
    pub fn write_warc_metadata(&mut self, target_uri: &str, outlinks: &str) -> Result<()> {
        let session = self.session_mut()?;
        let links = Linkage {
            concurrent_to: session.warcinfo_id.clone(),
            warcinfo_id: session.warcinfo_id.clone(),
        };
        let record = builder::metadata_record(target_uri, outlinks, &links);
        self.write_record(&record)
    }

    /// Write a request record
    ///
    /// # Errors
    ///
    /// Returns error if no session is open or the write fails
    pub fn write_request_record(
        &mut self,
        target_uri: &str,
        http_head: &str,
        payload: Option<&[u8]>,
    ) -> Result<()> {
        let session = self.session_mut()?;
        let http = HttpMessage {
            head: http_head,
            payload,
        };
        let record = builder::request_record(target_uri, http, &session.links());
        self.write_record(&record)
    }

    /// Write a response record
    ///
    /// # Errors
    ///
    /// Returns error if no session is open or the write fails
    pub fn write_response_record(
        &mut self,
        target_uri: &str,
        http_head: &str,
        payload: Option<&[u8]>,
    ) -> Result<()> {
        let session = self.session_mut()?;
        let http = HttpMessage {
            head: http_head,
            payload,
        };
        let record = builder::response_record(target_uri, http, &session.links());
        self.write_record(&record)
    }

    /// Write a linked request/response pair, request first.
    ///
    /// The request's `WARC-Concurrent-To` names the response's record id.
    ///
    /// # Errors
    ///
    /// Returns error if no session is open or either write fails
    pub fn write_request_response_records(
        &mut self,
        target_uri: &str,
        request: &HttpMessage<'_>,
        response: &HttpMessage<'_>,
    ) -> Result<()> {
        let session = self.session_mut()?;
        let links = session.links();
        let response = builder::response_record(target_uri, *response, &links);
        let request = builder::request_record(
            target_uri,
            *request,
            &Linkage {
                concurrent_to: response.record_id().map(str::to_string),
                ..links
            },
        );
        self.write_record(&request)?;
        self.write_record(&response)
    }

    /// Write a record built from caller-supplied headers and body.
    ///
    /// `Content-Length` is recomputed from `body`.
    ///
    /// # Errors
    ///
    /// Returns error if no session is open or the write fails
    pub fn write_raw_record(
        &mut self,
        version: &str,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Result<()> {
        let record = builder::raw_record(version, headers, body.into());
        self.write_record(&record)
    }

    /// Write pre-serialized bytes as one unit, unchanged
    ///
    /// # Errors
    ///
    /// Returns error if no session is open or the write fails
    pub fn write_record_block(&mut self, block: &[u8]) -> Result<()> {
        let session = self.session_mut()?;
        session.commit(block)?;
        debug!("Wrote raw block ({} bytes)", block.len());
        Ok(())
    }

    /// Write each block as its own unit, in order
    ///
    /// # Errors
    ///
    /// Returns error if no session is open or a write fails; blocks before the
    /// failing one have been written
    pub fn write_record_chunks<B: AsRef<[u8]>>(&mut self, blocks: &[B]) -> Result<()> {
        for block in blocks {
            self.write_record_block(block.as_ref())?;
        }
        Ok(())
    }

    /// Flush and end the session, handing back the sink
    ///
    /// # Errors
    ///
    /// Returns error if no session is open or the final flush fails
    pub fn close(&mut self) -> Result<W> {
        let mut session = self.session.take().ok_or_else(not_open)?;
        session.sink.flush()?;
        info!(
            "Closed WARC writer for {} ({} records)",
            session.filename, session.records_written
        );
        Ok(session.sink)
    }

    fn write_warcinfo(&mut self, record: &WarcRecord) -> Result<()> {
        self.write_record(record)?;
        let session = self.session_mut()?;
        if session.warcinfo_id.is_none() {
            session.warcinfo_id = record.record_id().map(str::to_string);
        }
        Ok(())
    }

    fn write_record(&mut self, record: &WarcRecord) -> Result<()> {
        let session = self.session_mut()?;
        session.commit(&record.to_bytes())?;
        debug!(
            "Wrote {} record {} ({} content bytes)",
            record
                .record_type()
                .map_or_else(|| "untyped".to_string(), |t| t.to_string()),
            record.record_id().unwrap_or("-"),
            record.content().len()
        );
        Ok(())
    }

    fn session_mut(&mut self) -> Result<&mut WriterSession<W>> {
        self.session.as_mut().ok_or_else(not_open)
    }

    fn ensure_closed(&self) -> Result<()> {
        if self.session.is_some() {
            return Err(WarcError::Usage(
                "a writer session is already open".to_string(),
            ));
        }
        Ok(())
    }
}

fn not_open() -> WarcError {
    WarcError::Usage("no writer session is open".to_string())
}
