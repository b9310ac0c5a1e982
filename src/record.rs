//! WARC record model shared by the reader and the writer

use std::fmt;
use std::io::{self, Write};

use bytes::Bytes;

/// Line terminator used throughout the WARC format
pub const CRLF: &[u8] = b"\r\n";

/// Separator written after every record's content block
pub const RECORD_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Version prefix of a record's first line
pub const VERSION_PREFIX: &str = "WARC/";

/// Version written by this crate
pub const WARC_VERSION: &str = "1.1";

/// WARC record type
///
/// The set of types is open: anything not listed is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WarcRecordType {
    /// `warcinfo`
    WarcInfo,
    /// `response`
    Response,
    /// `resource`
    Resource,
    /// `request`
    Request,
    /// `metadata`
    Metadata,
    /// `revisit`
    Revisit,
    /// `conversion`
    Conversion,
    /// `continuation`
    Continuation,
    /// Any other value of `WARC-Type`
    Other(String),
}

impl WarcRecordType {
    /// Value as written in the `WARC-Type` header
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::WarcInfo => "warcinfo",
            Self::Response => "response",
            Self::Resource => "resource",
            Self::Request => "request",
            Self::Metadata => "metadata",
            Self::Revisit => "revisit",
            Self::Conversion => "conversion",
            Self::Continuation => "continuation",
            Self::Other(value) => value,
        }
    }
}

impl From<&str> for WarcRecordType {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "warcinfo" => Self::WarcInfo,
            "response" => Self::Response,
            "resource" => Self::Resource,
            "request" => Self::Request,
            "metadata" => Self::Metadata,
            "revisit" => Self::Revisit,
            "conversion" => Self::Conversion,
            "continuation" => Self::Continuation,
            _ => Self::Other(value.to_string()),
        }
    }
}

impl fmt::Display for WarcRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered WARC header block.
///
/// Lookups are case-insensitive. Keys are unique: inserting an existing name
/// overwrites its value in place and keeps the casing it was first seen with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    headers: Vec<(String, String)>,
}

impl HeaderMap {
    /// Create an empty header map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Get the value for a (case-insensitive) header name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.headers[i].1.as_str())
    }

    /// Check whether a (case-insensitive) header name exists
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Insert a header, overwriting the value of an existing one.
    ///
    /// Surrounding whitespace is trimmed from name and value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref().trim();
        let value = value.into().trim().to_string();
        match self.position(name) {
            Some(i) => self.headers[i].1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    /// Remove a header, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.headers.remove(i).1)
    }

    /// Append a continuation line to the most recently inserted header
    pub(crate) fn extend_last(&mut self, continuation: &str) -> bool {
        match self.headers.last_mut() {
            Some((_, value)) => {
                value.push(' ');
                value.push_str(continuation.trim());
                true
            }
            None => false,
        }
    }

    /// Iterate over names and values in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Write `Name: value\r\n` lines into a stream, returning bytes written
    ///
    /// # Errors
    ///
    /// Returns error if the underlying writer fails
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<usize> {
        let mut written = 0usize;
        for (name, value) in &self.headers {
            writer.write_all(name.as_bytes())?;
            writer.write_all(b": ")?;
            writer.write_all(value.as_bytes())?;
            writer.write_all(CRLF)?;
            written += name.len() + value.len() + 4;
        }
        Ok(written)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// A single, fully buffered WARC record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarcRecord {
    version: String,
    headers: HeaderMap,
    content: Bytes,
    stream_pos: u64,
}

impl WarcRecord {
    /// Create a record from its parts.
    ///
    /// The `Content-Length` header is set from `content`; any previous value is replaced.
    #[must_use]
    pub fn new(version: impl Into<String>, mut headers: HeaderMap, content: Bytes) -> Self {
        headers.insert("Content-Length", content.len().to_string());
        Self {
            version: version.into(),
            headers,
            content,
            stream_pos: 0,
        }
    }

    /// Record produced by the parser, keeping headers exactly as read
    pub(crate) fn parsed(
        version: String,
        headers: HeaderMap,
        content: Bytes,
        stream_pos: u64,
    ) -> Self {
        Self {
            version,
            headers,
            content,
            stream_pos,
        }
    }

    /// WARC version, e.g. `"1.1"`
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Record headers
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Record content block
    #[must_use]
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Offset of the record's version line in the (decompressed) input stream
    #[must_use]
    pub fn stream_pos(&self) -> u64 {
        self.stream_pos
    }

    /// Record type from `WARC-Type`
    #[must_use]
    pub fn record_type(&self) -> Option<WarcRecordType> {
        self.headers.get("WARC-Type").map(WarcRecordType::from)
    }

    /// `WARC-Record-ID`, including the angle brackets
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        self.headers.get("WARC-Record-ID")
    }

    /// `WARC-Date`
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("WARC-Date")
    }

    /// `WARC-Target-URI`
    #[must_use]
    pub fn target_uri(&self) -> Option<&str> {
        self.headers.get("WARC-Target-URI")
    }

    /// `WARC-Concurrent-To`
    #[must_use]
    pub fn concurrent_to(&self) -> Option<&str> {
        self.headers.get("WARC-Concurrent-To")
    }

    /// `WARC-Warcinfo-ID`
    #[must_use]
    pub fn warcinfo_id(&self) -> Option<&str> {
        self.headers.get("WARC-Warcinfo-ID")
    }

    /// `Content-Type`
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    /// Parsed `Content-Length` header, if present and numeric
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("Content-Length")
            .and_then(|v| v.parse().ok())
    }

    /// Serialize the record in wire format, returning bytes written
    ///
    /// # Errors
    ///
    /// Returns error if the underlying writer fails
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<usize> {
        let version_line = format!("{VERSION_PREFIX}{}", self.version);
        writer.write_all(version_line.as_bytes())?;
        writer.write_all(CRLF)?;
        let mut written = version_line.len() + CRLF.len();

        written += self.headers.write_to(writer)?;
        writer.write_all(CRLF)?;
        writer.write_all(&self.content)?;
        writer.write_all(RECORD_SEPARATOR)?;
        written += CRLF.len() + self.content.len() + RECORD_SEPARATOR.len();

        Ok(written)
    }

    /// Serialize the record into a new buffer
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.content.len() + 512);
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("WARC-Type", "response");
        assert_eq!(headers.get("warc-type"), Some("response"));
        assert!(headers.contains_key("WARC-TYPE"));
        assert!(!headers.contains_key("Content-Type"));
    }

    #[test]
    fn test_header_overwrite_keeps_first_casing_and_position() {
        let mut headers = HeaderMap::new();
        headers.insert("WARC-Type", "request");
        headers.insert("Content-Length", "10");
        headers.insert("warc-type", "  response ");

        let items: Vec<_> = headers.iter().collect();
        assert_eq!(
            items,
            vec![("WARC-Type", "response"), ("Content-Length", "10")]
        );
    }

    #[test]
    fn test_header_continuation() {
        let mut headers = HeaderMap::new();
        assert!(!headers.extend_last("orphan"));
        headers.insert("description", "first");
        assert!(headers.extend_last("  second"));
        assert_eq!(headers.get("description"), Some("first second"));
    }

    #[test]
    fn test_record_type_parse() {
        assert_eq!(WarcRecordType::from("WarcInfo"), WarcRecordType::WarcInfo);
        assert_eq!(WarcRecordType::from("response"), WarcRecordType::Response);
        assert_eq!(
            WarcRecordType::from("x-custom"),
            WarcRecordType::Other("x-custom".to_string())
        );
        assert_eq!(WarcRecordType::Other("x-custom".into()).as_str(), "x-custom");
    }

    #[test]
    fn test_new_record_computes_content_length() {
        let mut headers = HeaderMap::new();
        headers.insert("WARC-Type", "resource");
        headers.insert("Content-Length", "9999");
        let record = WarcRecord::new("1.1", headers, Bytes::from_static(b"hello"));
        assert_eq!(record.content_length(), Some(5));
    }

    #[test]
    fn test_record_serialization() {
        let headers: HeaderMap = [("WARC-Type", "resource")].into_iter().collect();
        let record = WarcRecord::new("1.0", headers, Bytes::from_static(b"abc"));
        let bytes = record.to_bytes();
        assert_eq!(
            bytes,
            b"WARC/1.0\r\nWARC-Type: resource\r\nContent-Length: 3\r\n\r\nabc\r\n\r\n"
        );
        let mut sink = Vec::new();
        assert_eq!(record.write_to(&mut sink).unwrap(), bytes.len());
    }
}
