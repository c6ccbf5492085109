//! HTML parser
//!
//! Drives html5ever's tokenizer over decoded input and builds a
//! [`Document`] through [`BuilderSink`]. Byte input goes through encoding
//! resolution first. A `<meta>` declaration found inside the preprocessor
//! block restarts the parse with the declared encoding; one found later
//! switches the decoder for the remaining bytes.

use std::cell::Cell;
use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Rc;

use html5ever::tendril::StrTendril;
use html5ever::TokenizerResult;
use html5ever::tokenizer::{BufferQueue, Tokenizer, TokenizerOpts};
use sift_dom::Document;

use crate::builder::{BuildOptions, EncodingHook, TreeBuilder};
use crate::config::{ParseMode, ParseOptions};
use crate::context::{mode_from_options, sniff_fragment_context, sniff_mode, ResolvedMode};
use crate::decoder::DecodingReader;
use crate::encoding::{self, Charset, EncodingSource};
use crate::error::{HtmlError, HtmlResult};
use crate::sink::BuilderSink;
use crate::stream::{CombinedStream, CombinedTextReader};

/// How an in-document encoding declaration changed the decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reencoding {
    #[default]
    None,
    /// Parsed again from the start with the declared encoding
    Restarted,
    /// Decoder switched once this many bytes had been consumed
    Switched { at: u64 },
}

/// Result of a parse
#[derive(Debug)]
pub struct ParseOutput {
    pub document: Document,
    pub mode: ResolvedMode,
    pub encoding: Charset,
    pub encoding_source: EncodingSource,
    pub reencoding: Reencoding,
}

/// HTML5 parser
#[derive(Debug, Clone, Default)]
pub struct HtmlParser {
    options: ParseOptions,
}

impl HtmlParser {
    /// Create a parser with default options
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    fn build_options(&self) -> BuildOptions {
        BuildOptions {
            allow_self_closing: self.options.allow_self_closing,
            strip_comments: self.options.strip_comments,
        }
    }

    /// Parse already-decoded text. Encoding declarations are ignored.
    pub fn parse(&self, html: &str) -> HtmlResult<ParseOutput> {
        tracing::debug!("Parsing {} chars of text", html.len());
        let mode = match mode_from_options(&self.options)? {
            Some(mode) => mode,
            None => self.sniff(html),
        };

        let sink = BuilderSink::new(TreeBuilder::new(mode, self.build_options()));
        let tokenizer = Tokenizer::new(sink, TokenizerOpts::default());
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from_slice(html));
        feed(&tokenizer, &queue);
        tokenizer.end();

        Ok(ParseOutput {
            document: tokenizer.sink.finish(self.options.index),
            mode,
            encoding: Charset::utf8(),
            encoding_source: EncodingSource::Default,
            reencoding: Reencoding::None,
        })
    }

    /// Parse bytes held in memory
    pub fn parse_bytes(&self, bytes: &[u8]) -> HtmlResult<ParseOutput> {
        self.parse_stream(CombinedStream::new().with_memory(bytes.to_vec()))
    }

    /// Parse a forward-only byte source. The first
    /// `preprocessor_block_size` bytes are buffered so the parse can
    /// restart after an early encoding declaration.
    pub fn parse_reader<R: Read + 'static>(&self, mut reader: R) -> HtmlResult<ParseOutput> {
        let block = read_block(&mut reader, self.options.preprocessor_block_size)?;
        self.parse_stream(CombinedStream::new().with_memory(block).with_forward(reader))
    }

    /// Parse a seekable byte source from its current position
    pub fn parse_seekable<S: Read + Seek + 'static>(&self, source: S) -> HtmlResult<ParseOutput> {
        self.parse_stream(CombinedStream::new().with_seekable(source)?)
    }

    /// Parse a combined byte stream positioned at its start
    pub fn parse_stream(&self, mut stream: CombinedStream) -> HtmlResult<ParseOutput> {
        let caller = match self.options.encoding.as_deref() {
            Some(label) => Some(
                Charset::for_label(label)
                    .ok_or_else(|| HtmlError::UnknownEncoding(label.to_owned()))?,
            ),
            None => None,
        };
        let mut decided_mode = mode_from_options(&self.options)?;

        let block = read_block(&mut stream, self.options.preprocessor_block_size)?;
        let block_len = block.len() as u64;
        let resolved = encoding::resolve(&block, caller);

        let mut charset = resolved.charset;
        let mut source = resolved.source;
        let mut reencoding = Reencoding::None;

        loop {
            stream.seek(SeekFrom::Start(block_len))?;

            let skip = if charset == resolved.charset { resolved.bom_len } else { 0 };
            let mut decoder = charset.decoder();
            let text = decoder.decode(&block[skip..], false);
            let mode = *decided_mode.get_or_insert_with(|| self.sniff(&text));

            let pending = Rc::new(Cell::new(None));
            let allow_change = resolved.accepts_meta() && reencoding == Reencoding::None;
            let hook = meta_hook(charset, allow_change, Rc::clone(&pending));

            let builder = TreeBuilder::new(mode, self.build_options()).with_encoding_hook(hook);
            let tokenizer = Tokenizer::new(BuilderSink::new(builder), TokenizerOpts::default());
            let queue = BufferQueue::default();

            let mut input = CombinedTextReader::new();
            input.push_decoded(text, block_len);
            input.push_reader(DecodingReader::with_decoder(&mut stream, decoder));

            let mut restart = None;
            while let Some(chunk) = input.next_chunk()? {
                queue.push_back(StrTendril::from_slice(&chunk));
                feed(&tokenizer, &queue);

                let Some(declared) = pending.take() else {
                    continue;
                };
                if input.bytes_consumed() <= block_len {
                    restart = Some(declared);
                    break;
                }
                input.switch_encoding(declared);
                reencoding = Reencoding::Switched {
                    at: input.bytes_consumed(),
                };
                charset = declared;
                source = EncodingSource::Meta;
            }

            if let Some(declared) = restart {
                tracing::debug!("Restarting parse as {} (was {})", declared, charset);
                charset = declared;
                source = EncodingSource::Meta;
                reencoding = Reencoding::Restarted;
                continue;
            }

            tokenizer.end();
            let document = tokenizer.sink.finish(self.options.index);
            tracing::debug!(
                "Parsed {} bytes as {} ({:?})",
                input.bytes_consumed(),
                charset,
                reencoding
            );
            return Ok(ParseOutput {
                document,
                mode,
                encoding: charset,
                encoding_source: source,
                reencoding,
            });
        }
    }

    fn sniff(&self, text: &str) -> ResolvedMode {
        if self.options.mode == ParseMode::Fragment {
            sniff_fragment_context(text)
        } else {
            sniff_mode(text)
        }
    }
}

/// Accepts the first usable `<meta>` declaration. A declaration naming a
/// different encoding is queued in `pending` when a change is still
/// allowed; every later declaration is ignored.
fn meta_hook(
    current: Charset,
    allow_change: bool,
    pending: Rc<Cell<Option<Charset>>>,
) -> EncodingHook {
    let mut decided = false;
    Box::new(move |label| {
        let Some(declared) = Charset::for_meta_label(label) else {
            tracing::warn!("ignoring unknown meta encoding {:?}", label);
            return false;
        };
        if decided {
            tracing::debug!("ignoring repeated meta encoding {}", declared);
            return false;
        }
        decided = true;
        if declared == current {
            return true;
        }
        if !allow_change {
            tracing::debug!("meta encoding {} overridden by {}", declared, current);
            return false;
        }
        pending.set(Some(declared));
        true
    })
}

/// Read up to `size` bytes from the front of `reader`
/// Tokenize everything queued so far
fn feed(tokenizer: &Tokenizer<BuilderSink>, queue: &BufferQueue) {
    match tokenizer.feed(queue) {
        TokenizerResult::Done => {}
        // the sink never asks for a script pause
        TokenizerResult::Script(_) => tracing::warn!("tokenizer paused for a script"),
    }
}

fn read_block<R: Read>(reader: &mut R, size: usize) -> io::Result<Vec<u8>> {
    let mut block = Vec::with_capacity(size);
    reader.by_ref().take(size as u64).read_to_end(&mut block)?;
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn test_meta_hook_takes_first_declaration() {
        let pending = Rc::new(Cell::new(None));
        let mut hook = meta_hook(Charset::utf8(), true, Rc::clone(&pending));
        assert!(!hook("bogus"));
        assert!(hook("windows-1252"));
        assert!(!hook("koi8-r"));
        assert_eq!(pending.take(), Some(Charset::Whatwg(WINDOWS_1252)));
    }

    #[test]
    fn test_meta_hook_locked() {
        let pending = Rc::new(Cell::new(None));
        let mut hook = meta_hook(Charset::utf8(), false, Rc::clone(&pending));
        assert!(!hook("windows-1252"));
        assert_eq!(pending.take(), None);

        let mut hook = meta_hook(Charset::utf8(), false, Rc::clone(&pending));
        assert!(hook("utf-8"));
    }

    #[test]
    fn test_read_block_stops_at_size() {
        let mut reader = &b"0123456789"[..];
        assert_eq!(read_block(&mut reader, 4).unwrap(), b"0123");
        assert_eq!(reader, b"456789");
    }

    #[test]
    fn test_unknown_caller_encoding() {
        let parser = HtmlParser::with_options(ParseOptions::default().with_encoding("nope"));
        assert!(matches!(parser.parse_bytes(b"<p>"), Err(HtmlError::UnknownEncoding(_))));
    }
}
