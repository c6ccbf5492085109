//! Incremental character decoding
//!
//! [`CharDecoder`] turns byte chunks into text, carrying incomplete
//! sequences over to the next chunk. [`DecodingReader`] pulls fixed-size
//! chunks from a byte source through a decoder and can switch encodings
//! between chunks.

use std::io::{self, Read};

use encoding_rs::{CoderResult, Decoder};

use crate::encoding::Charset;

/// Bytes read from the source per decoded chunk
pub const CHUNK_SIZE: usize = 1024;

/// Streaming decoder for one [`Charset`]
pub struct CharDecoder {
    charset: Charset,
    state: DecoderState,
}

enum DecoderState {
    Whatwg(Decoder),
    Utf32 { big_endian: bool, pending: Vec<u8> },
    Utf7(Utf7Decoder),
}

impl CharDecoder {
    pub fn new(charset: Charset) -> Self {
        let state = match charset {
            Charset::Whatwg(encoding) => {
                DecoderState::Whatwg(encoding.new_decoder_without_bom_handling())
            }
            Charset::Utf32Le => DecoderState::Utf32 { big_endian: false, pending: Vec::new() },
            Charset::Utf32Be => DecoderState::Utf32 { big_endian: true, pending: Vec::new() },
            Charset::Utf7 => DecoderState::Utf7(Utf7Decoder::default()),
        };
        Self { charset, state }
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Decode `bytes`, appending to `out`. With `last` set, incomplete
    /// trailing input is flushed as replacement characters.
    pub fn decode_into(&mut self, bytes: &[u8], out: &mut String, last: bool) {
        match &mut self.state {
            DecoderState::Whatwg(decoder) => decode_whatwg(decoder, bytes, out, last),
            DecoderState::Utf32 { big_endian, pending } => {
                decode_utf32(*big_endian, pending, bytes, out, last)
            }
            DecoderState::Utf7(decoder) => decoder.decode(bytes, out, last),
        }
    }

    pub fn decode(&mut self, bytes: &[u8], last: bool) -> String {
        let mut out = String::with_capacity(bytes.len());
        self.decode_into(bytes, &mut out, last);
        out
    }
}

fn decode_whatwg(decoder: &mut Decoder, bytes: &[u8], out: &mut String, last: bool) {
    let mut input = bytes;
    loop {
        let needed = decoder
            .max_utf8_buffer_length(input.len())
            .unwrap_or(input.len() * 3 + 16);
        out.reserve(needed);
        let (result, read, _replaced) = decoder.decode_to_string(input, out, last);
        input = &input[read..];
        match result {
            CoderResult::InputEmpty => break,
            CoderResult::OutputFull => continue,
        }
    }
}

fn decode_utf32(
    big_endian: bool,
    pending: &mut Vec<u8>,
    bytes: &[u8],
    out: &mut String,
    last: bool,
) {
    pending.extend_from_slice(bytes);
    let whole = pending.len() / 4 * 4;
    for unit in pending[..whole].chunks_exact(4) {
        let raw = [unit[0], unit[1], unit[2], unit[3]];
        let scalar = if big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        };
        out.push(char::from_u32(scalar).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    pending.drain(..whole);
    if last && !pending.is_empty() {
        pending.clear();
        out.push(char::REPLACEMENT_CHARACTER);
    }
}

/// UTF-7 (RFC 2152): ASCII passes through, `+` opens a modified-base64 run
/// of UTF-16 code units, `-` or any non-base64 byte closes it.
#[derive(Default)]
struct Utf7Decoder {
    in_base64: bool,
    /// Just saw the `+` opening a run
    run_start: bool,
    bits: u32,
    bit_count: u32,
    high_surrogate: Option<u16>,
    started: bool,
}

impl Utf7Decoder {
    fn decode(&mut self, bytes: &[u8], out: &mut String, last: bool) {
        for &byte in bytes {
            if self.in_base64 {
                if let Some(value) = base64_value(byte) {
                    self.run_start = false;
                    self.bits = (self.bits << 6) | value;
                    self.bit_count += 6;
                    if self.bit_count >= 16 {
                        self.bit_count -= 16;
                        let unit = (self.bits >> self.bit_count) as u16;
                        self.bits &= (1 << self.bit_count) - 1;
                        self.push_unit(unit, out);
                    }
                    continue;
                }
                let literal_plus = self.run_start && byte == b'-';
                self.close_run(out);
                if literal_plus {
                    self.push_char('+', out);
                    continue;
                }
                if byte == b'-' {
                    continue;
                }
            }
            if byte == b'+' {
                self.in_base64 = true;
                self.run_start = true;
            } else if byte.is_ascii() {
                self.push_char(byte as char, out);
            } else {
                self.push_char(char::REPLACEMENT_CHARACTER, out);
            }
        }
        if last && self.in_base64 {
            self.close_run(out);
        }
    }

    fn close_run(&mut self, out: &mut String) {
        if self.high_surrogate.take().is_some() {
            self.push_char(char::REPLACEMENT_CHARACTER, out);
        }
        self.in_base64 = false;
        self.run_start = false;
        self.bits = 0;
        self.bit_count = 0;
    }

    fn push_unit(&mut self, unit: u16, out: &mut String) {
        match (self.high_surrogate.take(), unit) {
            (None, 0xD800..=0xDBFF) => self.high_surrogate = Some(unit),
            (Some(high), 0xDC00..=0xDFFF) => {
                let scalar = 0x10000 + (((high as u32) - 0xD800) << 10) + ((unit as u32) - 0xDC00);
                self.push_char(char::from_u32(scalar).unwrap_or(char::REPLACEMENT_CHARACTER), out);
            }
            (Some(_), _) => {
                self.push_char(char::REPLACEMENT_CHARACTER, out);
                self.push_unit(unit, out);
            }
            (None, _) => {
                let c = char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
                self.push_char(c, out);
            }
        }
    }

    fn push_char(&mut self, c: char, out: &mut String) {
        // A leading U+FEFF is the signature, not content
        let signature = !self.started && c == '\u{FEFF}';
        self.started = true;
        if !signature {
            out.push(c);
        }
    }
}

fn base64_value(byte: u8) -> Option<u32> {
    match byte {
        b'A'..=b'Z' => Some((byte - b'A') as u32),
        b'a'..=b'z' => Some((byte - b'a') as u32 + 26),
        b'0'..=b'9' => Some((byte - b'0') as u32 + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Reads a byte source in chunks and decodes them
pub struct DecodingReader<R> {
    inner: R,
    decoder: CharDecoder,
    buffer: Vec<u8>,
    bytes_consumed: u64,
    finished: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, charset: Charset) -> Self {
        Self::with_decoder(inner, charset.decoder())
    }

    /// Continue decoding with a decoder that may hold a partial sequence
    pub fn with_decoder(inner: R, decoder: CharDecoder) -> Self {
        Self {
            inner,
            decoder,
            buffer: vec![0; CHUNK_SIZE],
            bytes_consumed: 0,
            finished: false,
        }
    }

    pub fn charset(&self) -> Charset {
        self.decoder.charset()
    }

    /// Bytes pulled from the source so far
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    /// Next decoded chunk with the number of bytes it came from; `None`
    /// once the source is exhausted
    pub fn read_chunk(&mut self) -> io::Result<Option<(String, usize)>> {
        if self.finished {
            return Ok(None);
        }
        let read = loop {
            match self.inner.read(&mut self.buffer) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.bytes_consumed += read as u64;
        if read == 0 {
            self.finished = true;
            let tail = self.decoder.decode(&[], true);
            return Ok((!tail.is_empty()).then_some((tail, 0)));
        }
        Ok(Some((self.decoder.decode(&self.buffer[..read], false), read)))
    }

    /// Decode everything after this point with `charset`. Bytes held by
    /// the old decoder as an incomplete sequence are dropped.
    pub fn switch_encoding(&mut self, charset: Charset) {
        tracing::debug!(
            "Switching decoder from {} to {} at byte {}",
            self.decoder.charset(),
            charset,
            self.bytes_consumed
        );
        self.decoder = charset.decoder();
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_16LE, WINDOWS_1252};

    #[test]
    fn test_split_multibyte_sequence() {
        let mut decoder = Charset::utf8().decoder();
        let bytes = "héllo".as_bytes();
        let mut text = decoder.decode(&bytes[..2], false);
        text += &decoder.decode(&bytes[2..], true);
        assert_eq!(text, "héllo");
    }

    #[test]
    fn test_legacy_encoding() {
        let mut decoder = Charset::Whatwg(WINDOWS_1252).decoder();
        assert_eq!(decoder.decode(b"caf\xE9 \x80", true), "café €");
    }

    #[test]
    fn test_utf16_without_bom_handling() {
        let mut decoder = Charset::Whatwg(UTF_16LE).decoder();
        assert_eq!(decoder.decode(b"h\x00i\x00", true), "hi");
    }

    #[test]
    fn test_utf32_both_orders() {
        let mut le = Charset::Utf32Le.decoder();
        let mut text = le.decode(b"A\x00\x00\x00\x00\xF6", false);
        text += &le.decode(b"\x01\x00", true);
        assert_eq!(text, "A\u{1F600}");

        let mut be = Charset::Utf32Be.decoder();
        assert_eq!(be.decode(b"\x00\x00\x00B\x00\x00\xD8\x00", true), "B\u{FFFD}");
    }

    #[test]
    fn test_utf32_truncated_tail() {
        let mut decoder = Charset::Utf32Le.decoder();
        assert_eq!(decoder.decode(b"A\x00\x00\x00B\x00", true), "A\u{FFFD}");
    }

    #[test]
    fn test_utf7() {
        let mut decoder = Charset::Utf7.decoder();
        assert_eq!(decoder.decode(b"Hi Mom -+Jjo--!", true), "Hi Mom -\u{263A}-!");

        let mut decoder = Charset::Utf7.decoder();
        assert_eq!(decoder.decode(b"1 +- 1 = 2", true), "1 + 1 = 2");

        let mut decoder = Charset::Utf7.decoder();
        assert_eq!(decoder.decode(b"+/v8-<p>+ZeVnLIqe-", true), "<p>\u{65E5}\u{672C}\u{8A9E}");
    }

    #[test]
    fn test_utf7_run_split_across_chunks() {
        let mut decoder = Charset::Utf7.decoder();
        let mut text = decoder.decode(b"a+ZeV", false);
        text += &decoder.decode(b"nLIqe-b", true);
        assert_eq!(text, "a\u{65E5}\u{672C}\u{8A9E}b");
    }

    #[test]
    fn test_reader_counts_bytes() {
        let data = vec![b'x'; CHUNK_SIZE + 10];
        let mut reader = DecodingReader::new(data.as_slice(), Charset::utf8());
        let (first, n) = reader.read_chunk().unwrap().unwrap();
        assert_eq!((first.len(), n), (CHUNK_SIZE, CHUNK_SIZE));
        let (second, _) = reader.read_chunk().unwrap().unwrap();
        assert_eq!(second.len(), 10);
        assert!(reader.read_chunk().unwrap().is_none());
        assert_eq!(reader.bytes_consumed(), (CHUNK_SIZE + 10) as u64);
    }

    #[test]
    fn test_reader_switches_encoding() {
        let mut reader = DecodingReader::new(&b"\xE9"[..], Charset::utf8());
        reader.switch_encoding(Charset::Whatwg(WINDOWS_1252));
        let (text, _) = reader.read_chunk().unwrap().unwrap();
        assert_eq!(text, "é");
        assert_eq!(reader.charset(), Charset::Whatwg(WINDOWS_1252));
    }
}
