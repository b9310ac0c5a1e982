//! WARC writing: record builders and the writer session

pub mod builder;
mod engine;

pub use builder::{HttpMessage, Linkage, WarcInfoFields, HTTP_REQUEST, HTTP_RESPONSE, WARC_FIELDS};
pub use engine::WarcWriter;
