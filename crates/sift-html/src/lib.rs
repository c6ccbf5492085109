//! Sift HTML Parser
//!
//! Streaming HTML parser built on html5ever's tokenizer.
//! Resolves the input encoding, decides between document, content and
//! fragment parsing, and builds a path-indexed [`Document`].

mod builder;
mod config;
mod context;
mod decoder;
mod encoding;
mod error;
mod parser;
mod sink;
mod stream;

pub use builder::{BuildOptions, EncodingHook, TreeBuilder};
pub use config::{ParseMode, ParseOptions};
pub use context::{default_context, sniff_mode, ResolvedMode};
pub use decoder::{CharDecoder, DecodingReader};
pub use encoding::{
    detect_bom, resolve as resolve_encoding, Charset, EncodingSource, ResolvedEncoding,
};
pub use error::{HtmlError, HtmlResult};
pub use parser::{HtmlParser, ParseOutput, Reencoding};
pub use sink::BuilderSink;
pub use stream::{CombinedStream, CombinedTextReader, ReadSeek};

pub use sift_dom::Document;

/// Parse an HTML string, deciding the mode from its first tag
pub fn parse(html: &str) -> HtmlResult<Document> {
    HtmlParser::new().parse(html).map(|output| output.document)
}

/// Parse an HTML string as the children of a `context` element
pub fn parse_fragment(html: &str, context: &str) -> HtmlResult<Document> {
    HtmlParser::with_options(ParseOptions::default().with_fragment_context(context))
        .parse(html)
        .map(|output| output.document)
}

/// Parse bytes, resolving their encoding first
pub fn parse_bytes(bytes: &[u8]) -> HtmlResult<Document> {
    HtmlParser::new().parse_bytes(bytes).map(|output| output.document)
}
