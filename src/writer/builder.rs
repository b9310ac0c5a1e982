//! Record assembly
//!
//! Pure functions building one record each. Every record gets a fresh
//! `WARC-Record-ID`, the current `WARC-Date` and a computed `Content-Length`.

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::record::{HeaderMap, WarcRecord, WarcRecordType, CRLF, WARC_VERSION};

/// Content type of `warcinfo` and `metadata` bodies
pub const WARC_FIELDS: &str = "application/warc-fields";

/// Content type of `request` records
pub const HTTP_REQUEST: &str = "application/http; msgtype=request";

/// Content type of `response` records
pub const HTTP_RESPONSE: &str = "application/http; msgtype=response";

/// Software line written into `warcinfo` bodies.
///
/// Its length feeds the generated warcinfo body: with `warc-framer/0.1.0` the
/// standard test body is exactly 177 bytes. A version string of another length
/// shifts that count.
const SOFTWARE: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Format a record id as a linkage reference: `<urn:uuid:...>`
#[must_use]
pub fn record_urn(id: &Uuid) -> String {
    format!("<urn:uuid:{id}>")
}

/// Current UTC time in `WARC-Date` format (second precision)
#[must_use]
pub fn warc_date() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// References from a new record to previously written ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Linkage {
    /// `WARC-Concurrent-To` value
    pub concurrent_to: Option<String>,
    /// `WARC-Warcinfo-ID` value
    pub warcinfo_id: Option<String>,
}

/// Fields of a generated `warcinfo` body
#[derive(Debug, Clone, Copy)]
pub struct WarcInfoFields<'a> {
    /// `isPartOf`
    pub is_part_of: &'a str,
    /// `description`
    pub description: &'a str,
    /// `http-header-user-agent`
    pub user_agent: &'a str,
}

/// An HTTP message as captured: raw head text plus optional payload
#[derive(Debug, Clone, Copy)]
pub struct HttpMessage<'a> {
    /// Request or status line followed by header lines, each CRLF-terminated
    pub head: &'a str,
    /// Body bytes
    pub payload: Option<&'a [u8]>,
}

impl<'a> HttpMessage<'a> {
    /// Message without a payload
    #[must_use]
    pub fn new(head: &'a str) -> Self {
        Self {
            head,
            payload: None,
        }
    }

    /// Attach a payload
    #[must_use]
    pub fn with_payload(mut self, payload: &'a [u8]) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Content block: head, blank line, payload
    fn to_block(self) -> Bytes {
        let payload = self.payload.unwrap_or_default();
        let mut block = BytesMut::with_capacity(self.head.len() + CRLF.len() + payload.len());
        block.put_slice(self.head.as_bytes());
        block.put_slice(CRLF);
        block.put_slice(payload);
        block.freeze()
    }
}

/// Shared header-block assembly
fn assemble(
    record_type: &WarcRecordType,
    fields: &[(&str, &str)],
    links: &Linkage,
    content_type: &str,
    content: Bytes,
) -> WarcRecord {
    let mut headers = HeaderMap::new();
    headers.insert("WARC-Type", record_type.as_str());
    for (name, value) in fields {
        headers.insert(name, *value);
    }
    headers.insert("WARC-Date", warc_date());
    if let Some(concurrent_to) = &links.concurrent_to {
        headers.insert("WARC-Concurrent-To", concurrent_to.as_str());
    }
    if let Some(warcinfo_id) = &links.warcinfo_id {
        headers.insert("WARC-Warcinfo-ID", warcinfo_id.as_str());
    }
    headers.insert("WARC-Record-ID", record_urn(&Uuid::new_v4()));
    headers.insert("Content-Type", content_type);
    WarcRecord::new(WARC_VERSION, headers, content)
}

/// `warcinfo` record with a generated `application/warc-fields` body
#[must_use]
pub fn warcinfo_record(filename: &str, info: &WarcInfoFields<'_>) -> WarcRecord {
    let body = format!(
        "isPartOf: {}\r\n\
         description: {}\r\n\
         robots: ignore\r\n\
         http-header-user-agent: {}\r\n\
         format: WARC File Format {WARC_VERSION}\r\n\
         software: {SOFTWARE}\r\n",
        info.is_part_of, info.description, info.user_agent
    );
    raw_warcinfo_record(filename, Bytes::from(body))
}

/// `warcinfo` record whose body is supplied verbatim
#[must_use]
pub fn raw_warcinfo_record(filename: &str, body: Bytes) -> WarcRecord {
    assemble(
        &WarcRecordType::WarcInfo,
        &[("WARC-Filename", filename)],
        &Linkage::default(),
        WARC_FIELDS,
        body,
    )
}

/// `metadata` record carrying an outlinks block
#[must_use]
pub fn metadata_record(target_uri: &str, outlinks: &str, links: &Linkage) -> WarcRecord {
    let mut body = BytesMut::with_capacity(outlinks.len() + CRLF.len());
    body.put_slice(outlinks.as_bytes());
    body.put_slice(CRLF);
    assemble(
        &WarcRecordType::Metadata,
        &[("WARC-Target-URI", target_uri)],
        links,
        WARC_FIELDS,
        body.freeze(),
    )
}

/// `request` record
#[must_use]
pub fn request_record(target_uri: &str, http: HttpMessage<'_>, links: &Linkage) -> WarcRecord {
    assemble(
        &WarcRecordType::Request,
        &[("WARC-Target-URI", target_uri)],
        links,
        HTTP_REQUEST,
        http.to_block(),
    )
}

/// `response` record
#[must_use]
pub fn response_record(target_uri: &str, http: HttpMessage<'_>, links: &Linkage) -> WarcRecord {
    assemble(
        &WarcRecordType::Response,
        &[("WARC-Target-URI", target_uri)],
        links,
        HTTP_RESPONSE,
        http.to_block(),
    )
}

/// Record from a caller-supplied header set and body.
///
/// Headers are kept as given except `Content-Length`, which is recomputed.
#[must_use]
pub fn raw_record(version: &str, headers: HeaderMap, content: Bytes) -> WarcRecord {
    WarcRecord::new(version, headers, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST_HEAD: &str = "GET / HTTP/1.1\r\n\
Host: stringjs.com\r\n\
Connection: keep-alive\r\n\
Upgrade-Insecure-Requests: 1\r\n\
X-DevTools-Request-Id: 12704.1\r\n\
User-Agent: Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Electron/1.7.4 Safari/537.36\r\n\
Accept: text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8\r\n\
Accept-Encoding: gzip, deflate\r\n\
Accept-Language: en-US\r\n";

    fn assert_urn(value: &str) {
        let inner = value
            .strip_prefix("<urn:uuid:")
            .and_then(|v| v.strip_suffix('>'))
            .unwrap();
        assert!(Uuid::parse_str(inner).is_ok(), "bad urn {value}");
    }

    #[test]
    fn test_warc_date_format() {
        let date = warc_date();
        assert!(chrono::NaiveDateTime::parse_from_str(&date, "%Y-%m-%dT%H:%M:%SZ").is_ok());
        assert_eq!(date.len(), 20);
    }

    #[test]
    fn test_warcinfo_record() {
        let record = warcinfo_record(
            "dummy.warc",
            &WarcInfoFields {
                is_part_of: "testing",
                description: "createdByTesting",
                user_agent: "superduper awesome browser",
            },
        );
        assert_eq!(record.version(), "1.1");
        assert_eq!(record.record_type(), Some(WarcRecordType::WarcInfo));
        assert_eq!(record.content_length(), Some(177));
        assert_eq!(record.content().len(), 177);
        assert_eq!(record.headers().get("WARC-Filename"), Some("dummy.warc"));
        assert_eq!(record.content_type(), Some(WARC_FIELDS));
        assert_urn(record.record_id().unwrap());
        assert!(record.warcinfo_id().is_none());

        let body = String::from_utf8(record.content().to_vec()).unwrap();
        assert!(body.contains("http-header-user-agent: superduper awesome browser\r\n"));
    }

    #[test]
    fn test_software_line_length() {
        // warcinfo Content-Length expectations assume a 17-byte software line
        assert_eq!(SOFTWARE.len(), "warc-framer/0.1.0".len(), "software line {SOFTWARE}");
    }

    #[test]
    fn test_raw_warcinfo_empty_body() {
        let record = raw_warcinfo_record("dummy.warc", Bytes::new());
        assert_eq!(record.content_length(), Some(0));
        assert_eq!(record.content_type(), Some(WARC_FIELDS));
    }

    #[test]
    fn test_metadata_record() {
        let outlinks = "outlinks: https://example.cm\nhttps://bar.example.com";
        let links = Linkage {
            concurrent_to: Some("<urn:uuid:123>".to_string()),
            warcinfo_id: None,
        };
        let record = metadata_record("http://example.com", outlinks, &links);
        assert_eq!(record.content_length(), Some(54));
        assert_eq!(record.target_uri(), Some("http://example.com"));
        assert_eq!(record.concurrent_to(), Some("<urn:uuid:123>"));
    }

    #[test]
    fn test_request_record() {
        let record = request_record(
            "http://stringjs.com/",
            HttpMessage::new(REQUEST_HEAD),
            &Linkage::default(),
        );
        assert_eq!(record.content_length(), Some(398));
        assert_eq!(record.content_type(), Some(HTTP_REQUEST));
        assert!(record.content().ends_with(b"en-US\r\n\r\n"));
        assert!(record.concurrent_to().is_none());
    }

    #[test]
    fn test_response_record_with_payload() {
        let head = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n";
        let record = response_record(
            "http://example.com/",
            HttpMessage::new(head).with_payload("héllo".as_bytes()),
            &Linkage {
                concurrent_to: None,
                warcinfo_id: Some("<urn:uuid:abc>".to_string()),
            },
        );
        // UTF-8 byte length, not character count
        assert_eq!(
            record.content_length(),
            Some((head.len() + 2 + "héllo".len()) as u64)
        );
        assert_eq!(record.warcinfo_id(), Some("<urn:uuid:abc>"));
        assert_eq!(record.content_type(), Some(HTTP_RESPONSE));
    }

    #[test]
    fn test_header_order() {
        let record = request_record(
            "http://example.com/",
            HttpMessage::new("GET / HTTP/1.1\r\n"),
            &Linkage {
                concurrent_to: Some("<urn:uuid:c>".to_string()),
                warcinfo_id: Some("<urn:uuid:w>".to_string()),
            },
        );
        let names: Vec<_> = record.headers().iter().map(|(k, _)| k).collect();
        assert_eq!(
            names,
            vec![
                "WARC-Type",
                "WARC-Target-URI",
                "WARC-Date",
                "WARC-Concurrent-To",
                "WARC-Warcinfo-ID",
                "WARC-Record-ID",
                "Content-Type",
                "Content-Length",
            ]
        );
    }

    #[test]
    fn test_fresh_ids() {
        let a = raw_warcinfo_record("a.warc", Bytes::new());
        let b = raw_warcinfo_record("a.warc", Bytes::new());
        assert_ne!(a.record_id(), b.record_id());
    }

    #[test]
    fn test_raw_record_recomputes_length() {
        let headers: HeaderMap = [("WARC-Type", "resource"), ("Content-Length", "42")]
            .into_iter()
            .collect();
        let record = raw_record("1.0", headers, Bytes::new());
        assert_eq!(record.content_length(), Some(0));
        assert_eq!(record.version(), "1.0");
    }
}
