//! File-backed parser with push (event) and pull (iterator) consumption

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ReaderConfig;
use crate::record::WarcRecord;
use crate::{Result, WarcError};

use super::iter::WarcRecords;
use super::parser::ParserLimits;
use super::{open_source, Source};

/// Notification produced by a parse run
#[derive(Debug)]
pub enum ParseEvent {
    /// A record was fully parsed
    Record(WarcRecord),
    /// The whole file was parsed
    Done,
    /// Parsing failed; no further events follow
    Error(WarcError),
}

impl ParseEvent {
    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Record(_))
    }
}

/// An in-flight push-mode parse
struct ParseRun {
    events: mpsc::Receiver<ParseEvent>,
    stop: Arc<AtomicBool>,
}

/// Parser for a WARC file that detects gzip compression automatically.
///
/// A run started with [`start`](Self::start) delivers [`ParseEvent`]s through
/// [`next_event`](Self::next_event) or [`events`](Self::events). Records are
/// handed over through a channel holding at most one record, so the file is
/// only read as fast as events are consumed.
///
/// [`records`](Self::records) offers the same records as a plain iterator over a
/// fresh read of the file.
pub struct WarcParser {
    path: Option<PathBuf>,
    chunk_size: usize,
    limits: ParserLimits,
    run: Option<ParseRun>,
}

impl Default for WarcParser {
    fn default() -> Self {
        Self::new()
    }
}

impl WarcParser {
    /// Create a parser without a file
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(None, &ReaderConfig::default())
    }

    /// Create a parser for the WARC file at `path`
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self::from_config(Some(path.into()), &ReaderConfig::default())
    }

    /// Create a parser using reader settings from configuration
    #[must_use]
    pub fn from_config(path: Option<PathBuf>, config: &ReaderConfig) -> Self {
        Self {
            path,
            chunk_size: config.chunk_size,
            limits: ParserLimits {
                max_line_length: config.max_line_length,
            },
            run: None,
        }
    }

    /// File that will be parsed
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether a push-mode run is in progress
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Begin a push-mode parse run.
    ///
    /// Returns `Ok(true)` if a run was started and `Ok(false)` if one is already
    /// running (nothing new is started). Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if no path is known, if there is no Tokio runtime, or if the
    /// file cannot be opened
    pub fn start(&mut self) -> Result<bool> {
        if self.run.is_some() {
            return Ok(false);
        }
        let Some(path) = self.path.clone() else {
            return Err(WarcError::Usage(
                "the path to the WARC file is not set".to_string(),
            ));
        };
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            WarcError::Usage("parse runs must be started within a Tokio runtime".to_string())
        })?;

        let source = open_source(&path)?;
        let (tx, rx) = mpsc::channel(1);
        let stop = Arc::new(AtomicBool::new(false));
        let records = WarcRecords::with_options(source, self.chunk_size, self.limits);

        info!("Starting parse run for {}", path.display());
        let task_stop = Arc::clone(&stop);
        handle.spawn_blocking(move || run_to_channel(records, &tx, &task_stop));

        self.run = Some(ParseRun { events: rx, stop });
        Ok(true)
    }

    /// Set the file to parse (unless a run is in progress) and start parsing it
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start)
    pub fn parse_warc(&mut self, path: impl Into<PathBuf>) -> Result<bool> {
        if self.run.is_none() {
            self.path = Some(path.into());
        }
        self.start()
    }

    /// Wait for the next event of the current run.
    ///
    /// Returns `None` when no run is in progress. After `Done` or `Error` the run
    /// is over and the parser may be started again.
    pub async fn next_event(&mut self) -> Option<ParseEvent> {
        let run = self.run.as_mut()?;
        let event = run.events.recv().await;
        if event.as_ref().map_or(true, ParseEvent::is_terminal) {
            self.run = None;
        }
        event
    }

    /// The current run as a stream of events
    pub fn events(&mut self) -> impl Stream<Item = ParseEvent> + '_ {
        futures_util::stream::unfold(self, |parser| async move {
            let event = parser.next_event().await?;
            Some((event, parser))
        })
    }

    /// Stop the current run; no further events are delivered and the file is released
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            run.stop.store(true, Ordering::Release);
            debug!("Parse run stopped");
        }
    }

    /// Iterate over the file's records, reading it from the beginning
    ///
    /// # Errors
    ///
    /// Returns error if no path is known, a push-mode run is in progress, or the
    /// file cannot be opened
    pub fn records(&self) -> Result<WarcRecords<Source>> {
        if self.run.is_some() {
            return Err(WarcError::Usage(
                "a parse run is already in progress".to_string(),
            ));
        }
        let Some(path) = self.path.as_deref() else {
            return Err(WarcError::Usage(
                "the path to the WARC file is not set".to_string(),
            ));
        };
        Ok(WarcRecords::with_options(
            open_source(path)?,
            self.chunk_size,
            self.limits,
        ))
    }
}

impl Drop for WarcParser {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the blocking parse task
fn run_to_channel(
    mut records: WarcRecords<Source>,
    tx: &mpsc::Sender<ParseEvent>,
    stop: &AtomicBool,
) {
    loop {
        if stop.load(Ordering::Acquire) {
            return;
        }
        let event = match records.read_next() {
            Ok(Some(record)) => ParseEvent::Record(record),
            Ok(None) => ParseEvent::Done,
            Err(e) => ParseEvent::Error(e),
        };
        let terminal = event.is_terminal();
        if tx.blocking_send(event).is_err() {
            debug!("Event receiver dropped, ending parse run");
            return;
        }
        if terminal {
            return;
        }
    }
}
