//! WARC reading: compression detection, framing and record iteration

mod auto;
mod gzip;
mod iter;
mod parser;

pub use auto::{ParseEvent, WarcParser};
pub use gzip::{is_gzip_magic, is_gzipped, ChunkedGunzip, GZIP_MAGIC};
pub use iter::{WarcRecords, DEFAULT_CHUNK_SIZE};
pub use parser::{FrameParser, ParserLimits, ParserState, DEFAULT_MAX_LINE_LENGTH};

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::Result;

/// Byte source handed to the frame parser
pub type Source = Box<dyn Read + Send>;

/// Open `path` as a decompressed byte stream.
///
/// Gzip-compressed files (detected by magic bytes) are wrapped in a
/// [`ChunkedGunzip`]; anything else is read as-is.
///
/// # Errors
///
/// Returns error if the file cannot be opened or inspected
pub fn open_source(path: &Path) -> Result<Source> {
    let gzipped = is_gzipped(path)?;
    let file = File::open(path)?;
    debug!("Opening {} (gzip: {})", path.display(), gzipped);
    if gzipped {
        Ok(Box::new(ChunkedGunzip::new(BufReader::new(file))))
    } else {
        Ok(Box::new(file))
    }
}

/// Iterate over the records of a WARC file, compressed or not
///
/// # Errors
///
/// Returns error if the file cannot be opened
pub fn read_warc(path: &Path) -> Result<WarcRecords<Source>> {
    Ok(WarcRecords::new(open_source(path)?))
}
