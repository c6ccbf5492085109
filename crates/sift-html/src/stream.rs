//! Stream combinators
//!
//! [`CombinedStream`] presents a sequence of byte sources as one stream:
//! it reads each source until exhausted and then moves to the next.
//! Seeking backwards is possible as long as every source between the
//! target and the current position can seek; forward-only sources are
//! normally wrapped behind an in-memory copy of their first bytes.
//!
//! [`CombinedTextReader`] does the same for text: already-decoded text
//! followed by live decoders.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use crate::decoder::DecodingReader;
use crate::encoding::Charset;

/// Byte source that can also seek
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

enum ByteSource {
    Memory(Cursor<Vec<u8>>),
    Seekable { inner: Box<dyn ReadSeek>, origin: u64 },
    Forward(Box<dyn Read>),
}

impl ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::Memory(cursor) => cursor.read(buf),
            ByteSource::Seekable { inner, .. } => inner.read(buf),
            ByteSource::Forward(inner) => inner.read(buf),
        }
    }

    fn can_seek(&self) -> bool {
        !matches!(self, ByteSource::Forward(_))
    }

    /// Position this source `offset` bytes from its own start
    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        match self {
            ByteSource::Memory(cursor) => {
                cursor.set_position(offset);
                Ok(())
            }
            ByteSource::Seekable { inner, origin } => {
                inner.seek(SeekFrom::Start(*origin + offset)).map(drop)
            }
            ByteSource::Forward(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "cannot seek back into a forward-only source",
            )),
        }
    }
}

/// Several byte sources read back to back
pub struct CombinedStream {
    sources: Vec<ByteSource>,
    current: usize,
    position: u64,
    /// Absolute offset at which each source reached so far begins
    starts: Vec<u64>,
}

impl CombinedStream {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            current: 0,
            position: 0,
            starts: vec![0],
        }
    }

    /// Append an in-memory source
    pub fn with_memory(mut self, bytes: Vec<u8>) -> Self {
        self.sources.push(ByteSource::Memory(Cursor::new(bytes)));
        self
    }

    /// Append a seekable source, read from its current position
    pub fn with_seekable<S: Read + Seek + 'static>(mut self, mut inner: S) -> io::Result<Self> {
        let origin = inner.stream_position()?;
        self.sources.push(ByteSource::Seekable {
            inner: Box::new(inner),
            origin,
        });
        Ok(self)
    }

    /// Append a forward-only source
    pub fn with_forward<R: Read + 'static>(mut self, inner: R) -> Self {
        self.sources.push(ByteSource::Forward(Box::new(inner)));
        self
    }

    /// Absolute position in the combined stream
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    fn rewind_to(&mut self, target: u64) -> io::Result<()> {
        let index = self.starts.iter().rposition(|&start| start <= target).unwrap_or(0);
        let last = self.current.min(self.sources.len().saturating_sub(1));
        if self.sources[index..=last].iter().any(|s| !s.can_seek()) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "cannot seek back into a forward-only source",
            ));
        }
        for later in index + 1..=last {
            self.sources[later].seek_to(0)?;
        }
        self.sources[index].seek_to(target - self.starts[index])?;
        self.starts.truncate(index + 1);
        self.current = index;
        self.position = target;
        Ok(())
    }

    fn skip_forward(&mut self, count: u64) -> io::Result<()> {
        let skipped = io::copy(&mut self.by_ref().take(count), &mut io::sink())?;
        if skipped < count {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "seek past the end of the combined stream",
            ));
        }
        Ok(())
    }
}

impl Default for CombinedStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for CombinedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.current < self.sources.len() {
            let read = self.sources[self.current].read(buf)?;
            if read > 0 {
                self.position += read as u64;
                return Ok(read);
            }
            self.current += 1;
            if self.current < self.sources.len() {
                self.starts.push(self.position);
            }
        }
        Ok(0)
    }
}

impl Seek for CombinedStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "seek before the start of the stream")
            })?,
            SeekFrom::End(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "combined stream length is unknown",
                ));
            }
        };
        if target < self.position {
            self.rewind_to(target)?;
        } else if target > self.position {
            self.skip_forward(target - self.position)?;
        }
        Ok(self.position)
    }
}

enum TextSource<R> {
    Decoded { text: String, bytes: u64 },
    Decoding(DecodingReader<R>),
}

/// Decoded text followed by live decoding readers
pub struct CombinedTextReader<R> {
    sources: VecDeque<TextSource<R>>,
    bytes_consumed: u64,
}

impl<R: Read> CombinedTextReader<R> {
    pub fn new() -> Self {
        Self {
            sources: VecDeque::new(),
            bytes_consumed: 0,
        }
    }

    /// Append text already decoded from `bytes` source bytes
    pub fn push_decoded(&mut self, text: String, bytes: u64) {
        self.sources.push_back(TextSource::Decoded { text, bytes });
    }

    pub fn push_reader(&mut self, reader: DecodingReader<R>) {
        self.sources.push_back(TextSource::Decoding(reader));
    }

    /// Source bytes behind all text returned so far
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    /// Next piece of text; `None` when every source is exhausted
    pub fn next_chunk(&mut self) -> io::Result<Option<String>> {
        while let Some(source) = self.sources.front_mut() {
            match source {
                TextSource::Decoded { text, bytes } => {
                    let text = std::mem::take(text);
                    self.bytes_consumed += *bytes;
                    self.sources.pop_front();
                    if !text.is_empty() {
                        return Ok(Some(text));
                    }
                }
                TextSource::Decoding(reader) => match reader.read_chunk()? {
                    Some((text, bytes)) => {
                        self.bytes_consumed += bytes as u64;
                        return Ok(Some(text));
                    }
                    None => {
                        self.sources.pop_front();
                    }
                },
            }
        }
        Ok(None)
    }

    /// Switch every live reader to `charset`. Text that was already
    /// decoded keeps its original decoding.
    pub fn switch_encoding(&mut self, charset: Charset) {
        for source in self.sources.iter_mut() {
            if let TextSource::Decoding(reader) = source {
                reader.switch_encoding(charset);
            }
        }
    }
}

impl<R: Read> Default for CombinedTextReader<R> {
    fn default() -> Self {
        Self::new()
    }
}
