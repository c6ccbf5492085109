//! Encoding resolution
//!
//! Picks the character encoding for a byte stream from, in order of
//! precedence: the caller's declaration, a byte-order mark, a leading
//! `<?xml ... encoding="..."?>` declaration and finally a `<meta>` tag seen
//! while tokenizing. Labels resolve through `encoding_rs`, with UTF-32 and
//! UTF-7 handled here because `encoding_rs` does not decode them.

use std::fmt;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::decoder::CharDecoder;

/// A decodable character encoding
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// Any encoding known to `encoding_rs`
    Whatwg(&'static Encoding),
    Utf32Le,
    Utf32Be,
    Utf7,
}

impl Charset {
    pub fn utf8() -> Charset {
        Charset::Whatwg(UTF_8)
    }

    /// Resolve any supported label, including UTF-32 and UTF-7
    pub fn for_label(label: &str) -> Option<Charset> {
        let trimmed = label.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "utf-32" | "utf32" | "utf-32le" | "utf32le" => Some(Charset::Utf32Le),
            "utf-32be" | "utf32be" => Some(Charset::Utf32Be),
            "utf-7" | "utf7" | "unicode-1-1-utf-7" => Some(Charset::Utf7),
            _ => Encoding::for_label(trimmed.as_bytes()).map(Charset::Whatwg),
        }
    }

    /// Resolve a label found in a `<meta>` tag. UTF-16 declarations in a
    /// document that was readable as ASCII mean UTF-8.
    pub fn for_meta_label(label: &str) -> Option<Charset> {
        Encoding::for_label(label.trim().as_bytes()).map(|e| Charset::Whatwg(e.output_encoding()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Charset::Whatwg(encoding) => encoding.name(),
            Charset::Utf32Le => "UTF-32LE",
            Charset::Utf32Be => "UTF-32BE",
            Charset::Utf7 => "UTF-7",
        }
    }

    /// UTF-8 or UTF-16, the encodings whose byte-order mark overrides a
    /// caller declaration
    pub fn is_utf8_or_utf16(self) -> bool {
        matches!(self, Charset::Whatwg(e) if e == UTF_8 || e == UTF_16LE || e == UTF_16BE)
    }

    /// Fresh decoder; byte-order marks are not stripped
    pub fn decoder(self) -> CharDecoder {
        CharDecoder::new(self)
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the resolved encoding came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    /// Nothing was declared; UTF-8 assumed
    Default,
    Caller,
    ByteOrderMark,
    XmlDeclaration,
    Meta,
}

/// Outcome of sniffing the preprocessor block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEncoding {
    pub charset: Charset,
    pub source: EncodingSource,
    /// Length of the byte-order mark to skip before decoding
    pub bom_len: usize,
}

impl ResolvedEncoding {
    /// Whether an in-document `<meta>` declaration may still change the
    /// encoding
    pub fn accepts_meta(&self) -> bool {
        self.source == EncodingSource::Default
    }
}

/// Detect a byte-order mark, returning the encoding and the mark length
pub fn detect_bom(bytes: &[u8]) -> Option<(Charset, usize)> {
    match bytes {
        [0xFF, 0xFE, 0x00, 0x00, ..] => Some((Charset::Utf32Le, 4)),
        [0x00, 0x00, 0xFE, 0xFF, ..] => Some((Charset::Utf32Be, 4)),
        [0xEF, 0xBB, 0xBF, ..] => Some((Charset::utf8(), 3)),
        [0xFF, 0xFE, ..] => Some((Charset::Whatwg(UTF_16LE), 2)),
        [0xFE, 0xFF, ..] => Some((Charset::Whatwg(UTF_16BE), 2)),
        [0x2B, 0x2F, 0x76, b'8' | b'9' | b'+' | b'/', ..] => Some((Charset::Utf7, 0)),
        _ => None,
    }
}

/// Encoding named by a leading XML declaration. Anything malformed or
/// unrecognised yields `None`.
pub fn sniff_xml_declaration(bytes: &[u8]) -> Option<Charset> {
    let rest = bytes.strip_prefix(b"<?xml")?;
    if !rest.first().is_some_and(u8::is_ascii_whitespace) {
        return None;
    }
    let end = rest.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&rest[..end]).ok()?;

    let after = &decl[decl.find("encoding")? + "encoding".len()..];
    let after = after.trim_start().strip_prefix('=')?.trim_start();
    let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &after[1..];
    let label = &value[..value.find(quote)?];
    Charset::for_label(label)
}

/// Resolve the encoding before tokenizing starts
pub fn resolve(block: &[u8], caller: Option<Charset>) -> ResolvedEncoding {
    let bom = detect_bom(block);
    let resolved = match (caller, bom) {
        (Some(declared), Some((charset, bom_len))) if declared.is_utf8_or_utf16() => {
            ResolvedEncoding {
                charset,
                source: EncodingSource::ByteOrderMark,
                bom_len,
            }
        }
        (Some(declared), bom) => ResolvedEncoding {
            charset: declared,
            source: EncodingSource::Caller,
            bom_len: bom.filter(|(c, _)| *c == declared).map_or(0, |(_, len)| len),
        },
        (None, Some((charset, bom_len))) => ResolvedEncoding {
            charset,
            source: EncodingSource::ByteOrderMark,
            bom_len,
        },
        (None, None) => match sniff_xml_declaration(block) {
            Some(charset) => ResolvedEncoding {
                charset,
                source: EncodingSource::XmlDeclaration,
                bom_len: 0,
            },
            None => ResolvedEncoding {
                charset: Charset::utf8(),
                source: EncodingSource::Default,
                bom_len: 0,
            },
        },
    };
    tracing::debug!(
        "Resolved encoding {} from {:?}",
        resolved.charset,
        resolved.source
    );
    resolved
}

/// Charset label inside a `content="text/html; charset=..."` value
pub fn charset_from_content(content: &str) -> Option<&str> {
    let lower = content.to_ascii_lowercase();
    let mut from = 0;
    while let Some(found) = lower[from..].find("charset") {
        let start = from + found + "charset".len();
        from = start;
        let rest = content[start..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let label = match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let inner = &rest[1..];
                &inner[..inner.find(quote)?]
            }
            _ => {
                let end = rest
                    .find(|c: char| c == ';' || c.is_ascii_whitespace())
                    .unwrap_or(rest.len());
                &rest[..end]
            }
        };
        return (!label.is_empty()).then_some(label);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{ISO_8859_2, WINDOWS_1252};

    #[test]
    fn test_bom_detection() {
        assert_eq!(detect_bom(b"\xEF\xBB\xBF<p>"), Some((Charset::utf8(), 3)));
        assert_eq!(detect_bom(b"\xFF\xFE<\x00"), Some((Charset::Whatwg(UTF_16LE), 2)));
        assert_eq!(detect_bom(b"\xFF\xFE\x00\x00"), Some((Charset::Utf32Le, 4)));
        assert_eq!(detect_bom(b"\x00\x00\xFE\xFF"), Some((Charset::Utf32Be, 4)));
        assert_eq!(detect_bom(b"+/v8-"), Some((Charset::Utf7, 0)));
        assert_eq!(detect_bom(b"<html>"), None);
    }

    #[test]
    fn test_xml_declaration() {
        assert_eq!(
            sniff_xml_declaration(b"<?xml version=\"1.0\" encoding='ISO-8859-2'?><a/>"),
            Some(Charset::Whatwg(ISO_8859_2))
        );
        assert_eq!(sniff_xml_declaration(b"<?xml version=\"1.0\"?>"), None);
        assert_eq!(sniff_xml_declaration(b"<?xml encoding=\"bogus\"?>"), None);
        assert_eq!(sniff_xml_declaration(b"<?xml encoding=\"utf-8"), None);
    }

    #[test]
    fn test_bom_beats_unicode_caller() {
        let resolved = resolve(b"\xFF\xFEx\x00", Some(Charset::utf8()));
        assert_eq!(resolved.charset, Charset::Whatwg(UTF_16LE));
        assert_eq!(resolved.source, EncodingSource::ByteOrderMark);
        assert_eq!(resolved.bom_len, 2);
    }

    #[test]
    fn test_legacy_caller_beats_bom() {
        let caller = Charset::Whatwg(WINDOWS_1252);
        let resolved = resolve(b"\xEF\xBB\xBFx", Some(caller));
        assert_eq!(resolved.charset, caller);
        assert_eq!(resolved.source, EncodingSource::Caller);
        assert_eq!(resolved.bom_len, 0);
    }

    #[test]
    fn test_default_accepts_meta() {
        let resolved = resolve(b"<p>plain", None);
        assert_eq!(resolved.charset, Charset::utf8());
        assert!(resolved.accepts_meta());
        assert!(!resolve(b"\xEF\xBB\xBF", None).accepts_meta());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Charset::for_label(" latin1 "), Some(Charset::Whatwg(WINDOWS_1252)));
        assert_eq!(Charset::for_label("UTF-32BE"), Some(Charset::Utf32Be));
        assert_eq!(Charset::for_label("no-such-thing"), None);
        assert_eq!(Charset::for_meta_label("utf-16"), Some(Charset::utf8()));
        assert_eq!(Charset::for_meta_label("utf-7"), None);
    }

    #[test]
    fn test_charset_from_content() {
        assert_eq!(charset_from_content("text/html; charset=ISO-8859-1"), Some("ISO-8859-1"));
        assert_eq!(charset_from_content("text/html;CHARSET = \"koi8-r\""), Some("koi8-r"));
        assert_eq!(charset_from_content("text/html; charset=utf-8; x=y"), Some("utf-8"));
        assert_eq!(charset_from_content("text/html"), None);
        assert_eq!(charset_from_content("charsetx; charset="), None);
    }
}
