//! warc-framer - WARC record reader and writer
//!
//! Reads WARC 1.0/1.1 files (plain or with per-record gzip members) as a
//! record iterator or a stream of parse events, and writes request, response,
//! metadata and warcinfo records with correct framing and linkage.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod reader;
pub mod record;
pub mod writer;

pub use config::{Config, ReaderConfig, WriterOptions};
pub use error::{Result, WarcError};
pub use reader::{read_warc, FrameParser, ParseEvent, WarcParser, WarcRecords};
pub use record::{HeaderMap, WarcRecord, WarcRecordType};
pub use writer::{HttpMessage, WarcWriter};
