//! Chunk framing, the repeating layer under every pack stream.
//!
//! After the header, a pack is nothing but chunks laid end to end. Each chunk
//! is three fields, all contiguous:
//!
//! ```text
//! section id (varint)  chunk length (varint)  payload (chunk length bytes)
//! ```
//!
//! The section id is restated on every chunk rather than carried as reader
//! state, so a chunk is interpretable on its own and section interleaving
//! costs nothing extra to parse.
//!
//! # Writer
//! [`ChunkWriter`] stamps each chunk with its current section, set via
//! [`ChunkWriter::begin_section`]. It never inspects payloads.
//!
//! # Reader
//! [`ChunkReader`] yields chunks until a clean end of stream, which is only
//! legal at a chunk boundary (before the first byte of a section id). A
//! stream that ends anywhere else is truncated. After any fatal error the
//! reader latches: every later call returns [`PackError::Failed`] rather
//! than resynchronising on garbage.

use std::io::{Read, Write};

use crate::error::{PackError, Result};
use crate::varint::{self, VarintRead};

/// Section reserved for type declarations.
pub const SPECIAL_SECTION: u64 = 0;

/// Pre-allocation cap for declared payload lengths. A hostile length field
/// only ever costs this much up front; real growth is driven by bytes that
/// actually arrive.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// One framed unit of a pack stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub section: u64,
    pub payload: Vec<u8>,
    /// Byte offset of this chunk's first byte from the start of the stream.
    pub offset:  u64,
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct ChunkWriter<W: Write> {
    inner:   W,
    section: u64,
    offset:  u64,
}

impl<W: Write> ChunkWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::at_offset(inner, 0)
    }

    /// Wrap a sink whose current position is `offset`, so chunk offsets line
    /// up with the surrounding stream.
    pub fn at_offset(inner: W, offset: u64) -> Self {
        Self {
            inner,
            section: SPECIAL_SECTION,
            offset,
        }
    }

    /// Section stamped on subsequent chunks. Takes effect from the next
    /// `write_chunk`; already-written chunks keep the section they carried.
    pub fn begin_section(&mut self, section: u64) {
        self.section = section;
    }

    pub fn current_section(&self) -> u64 {
        self.section
    }

    /// Frame `payload` as one chunk in the current section.
    pub fn write_chunk(&mut self, payload: &[u8]) -> Result<()> {
        let mut n = varint::write_uvarint(&mut self.inner, self.section)?;
        n += varint::write_uvarint(&mut self.inner, payload.len() as u64)?;
        self.inner.write_all(payload)?;
        self.offset += (n + payload.len()) as u64;
        Ok(())
    }

    /// Stream position after everything written so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct ChunkReader<R: Read> {
    inner:  R,
    offset: u64,
    failed: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R) -> Self {
        Self::at_offset(inner, 0)
    }

    /// Wrap a source whose current position is `offset`; reported chunk and
    /// error offsets are absolute within the surrounding stream.
    pub fn at_offset(inner: R, offset: u64) -> Self {
        Self {
            inner,
            offset,
            failed: false,
        }
    }

    /// Next chunk, or `None` at a clean end of stream.
    ///
    /// Any error other than the latched [`PackError::Failed`] is positioned:
    /// it names the field being read and the byte offset where the stream
    /// stopped making sense.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.failed {
            return Err(PackError::Failed);
        }
        match self.read_chunk_inner() {
            Ok(chunk) => Ok(chunk),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    fn read_chunk_inner(&mut self) -> Result<Option<Chunk>> {
        let chunk_start = self.offset;
        let section = match varint::read_uvarint(&mut self.inner)? {
            VarintRead::Value { value, len } => {
                self.offset += len as u64;
                value
            }
            // EOF before the first byte of a section id is the one legal end.
            VarintRead::Eof => return Ok(None),
            VarintRead::Truncated { len } => {
                self.offset += len as u64;
                return Err(PackError::Truncated {
                    offset: self.offset,
                    what:   "section id",
                });
            }
            VarintRead::Overflow => {
                self.offset += varint::MAX_VARINT_LEN as u64;
                return Err(PackError::VarintOverflow { offset: chunk_start });
            }
        };

        let length_start = self.offset;
        let length = match varint::read_uvarint(&mut self.inner)? {
            VarintRead::Value { value, len } => {
                self.offset += len as u64;
                value
            }
            VarintRead::Eof => {
                return Err(PackError::Truncated {
                    offset: length_start,
                    what:   "chunk length",
                })
            }
            VarintRead::Truncated { len } => {
                self.offset += len as u64;
                return Err(PackError::Truncated {
                    offset: self.offset,
                    what:   "chunk length",
                });
            }
            VarintRead::Overflow => {
                self.offset += varint::MAX_VARINT_LEN as u64;
                return Err(PackError::VarintOverflow { offset: length_start });
            }
        };

        let mut payload = Vec::with_capacity(length.min(INITIAL_BUFFER_SIZE as u64) as usize);
        let got = (&mut self.inner).take(length).read_to_end(&mut payload)?;
        self.offset += got as u64;
        if (got as u64) < length {
            return Err(PackError::Truncated {
                offset: self.offset,
                what:   "chunk payload",
            });
        }

        Ok(Some(Chunk {
            section,
            payload,
            offset: chunk_start,
        }))
    }

    /// Stream position after everything consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// True once a fatal error has latched this reader.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
