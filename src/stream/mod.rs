//! Pack streams: the writer and reader that tie the header, framing, and
//! type registry layers into one API.
//!
//! # Writer
//! [`PackWriter`] emits the header at construction and thereafter frames
//! whatever it is handed. `declare_type` dedups by descriptor, so declaring
//! the same type twice costs one wire declaration and returns the same id.
//! `close` flushes and hands the sink back; dropping a writer without
//! closing loses nothing already framed but may leave sink buffers unflushed.
//!
//! # Reader
//! [`PackReader`] validates the header up front and is forward-only from
//! there: one pass, no `Seek` bound, suitable for sockets and pipes.
//! Section-0 declarations are absorbed into the registry as a side effect of
//! `next_entry`; callers only ever see entries.
//!
//! # Failure
//! Errors split two ways. An entry referencing an undeclared type is an
//! entry-level error: the chunk is already consumed, and the next call moves
//! on to the following chunk. Everything else (truncation, malformed
//! payloads, IO) is stream-fatal and latches the reader, which from then on
//! returns [`PackError::Failed`] instead of parsing past the damage.

use std::io::{Read, Write};

use crate::error::{PackError, Result};
use crate::framing::{ChunkReader, ChunkWriter, SPECIAL_SECTION};
use crate::header::{self, Version, VERSION_MAJOR};
use crate::registry::{self, TypeDescriptor, TypeRegistry};
use crate::varint;

/// One record pulled off a stream: the chunk's section, the resolved type,
/// and the record bytes with the type id prefix already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub section:    u64,
    pub type_id:    u64,
    pub descriptor: TypeDescriptor,
    pub payload:    Vec<u8>,
    /// Stream offset of the chunk this entry came from.
    pub offset:     u64,
}

/// Read-side policy knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Accept streams with a newer minor version within the supported major.
    /// Unknown minor additions are forward-compatible by format rule, so a
    /// consumer may opt in to reading past them. Majors are never negotiable.
    pub accept_newer_minor: bool,
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct PackWriter<W: Write> {
    chunks:   ChunkWriter<W>,
    registry: TypeRegistry,
}

impl<W: Write> PackWriter<W> {
    /// Start a new pack on `inner`, writing the header immediately.
    pub fn new(mut inner: W) -> Result<Self> {
        header::write_header(&mut inner)?;
        Ok(Self {
            chunks:   ChunkWriter::at_offset(inner, header::header_len() as u64),
            registry: TypeRegistry::new(),
        })
    }

    /// Ensure `desc` is declared, returning its id.
    ///
    /// The first call for a descriptor allocates an id and writes one
    /// section-0 declaration chunk; later calls with an equal descriptor are
    /// free and return the same id. The declaration hits the wire before the
    /// id is cached, so a failed write leaves no id behind for later entries
    /// to reference.
    pub fn declare_type(&mut self, desc: &TypeDescriptor) -> Result<u64> {
        if let Some(id) = self.registry.find(desc) {
            return Ok(id);
        }
        let id = self.registry.next_id();
        let payload = registry::encode_declaration(id, desc);
        self.write_raw(SPECIAL_SECTION, &payload)?;
        self.registry.allocate(desc.clone());
        Ok(id)
    }

    /// Frame `payload` verbatim as one chunk in `section`.
    ///
    /// This is the raw framing operation: readers expect every non-reserved
    /// chunk to begin with a declared type id varint, which `payload` must
    /// already carry. [`write_entry`](Self::write_entry) builds that prefix;
    /// use this only when the payload is pre-framed (relays, splitters).
    pub fn write_chunk(&mut self, section: u64, payload: &[u8]) -> Result<()> {
        if section == SPECIAL_SECTION {
            return Err(PackError::ReservedSection);
        }
        self.write_raw(section, payload)
    }

    /// Write one record of an already-declared type into `section`.
    pub fn write_entry(&mut self, section: u64, type_id: u64, payload: &[u8]) -> Result<()> {
        if section == SPECIAL_SECTION {
            return Err(PackError::ReservedSection);
        }
        if self.registry.get(type_id).is_none() {
            return Err(PackError::UnknownType {
                id:     type_id,
                offset: self.chunks.offset(),
            });
        }
        let mut head = [0u8; varint::MAX_VARINT_LEN];
        let n = varint::encode_into(&mut head, type_id);
        let mut body = Vec::with_capacity(n + payload.len());
        body.extend_from_slice(&head[..n]);
        body.extend_from_slice(payload);
        self.write_raw(section, &body)
    }

    /// Declare-if-needed and write in one step. Returns the type id.
    pub fn append(&mut self, section: u64, desc: &TypeDescriptor, payload: &[u8]) -> Result<u64> {
        if section == SPECIAL_SECTION {
            return Err(PackError::ReservedSection);
        }
        let type_id = self.declare_type(desc)?;
        self.write_entry(section, type_id, payload)?;
        Ok(type_id)
    }

    fn write_raw(&mut self, section: u64, payload: &[u8]) -> Result<()> {
        self.chunks.begin_section(section);
        self.chunks.write_chunk(payload)
    }

    /// Types declared so far.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Stream position after everything written so far, header included.
    pub fn offset(&self) -> u64 {
        self.chunks.offset()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.chunks.flush()
    }

    /// Flush and return the sink. Consuming `self` is what guarantees no
    /// chunk can be written after the stream is handed back.
    pub fn close(mut self) -> Result<W> {
        self.chunks.flush()?;
        Ok(self.chunks.into_inner())
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct PackReader<R: Read> {
    chunks:   ChunkReader<R>,
    version:  Version,
    registry: TypeRegistry,
    failed:   bool,
}

impl<R: Read> PackReader<R> {
    /// Open a pack, enforcing the strict version gate.
    pub fn new(inner: R) -> Result<Self> {
        Self::with_options(inner, ReadOptions::default())
    }

    pub fn with_options(mut inner: R, options: ReadOptions) -> Result<Self> {
        let (version, header_bytes) = header::read_version(&mut inner)?;
        if options.accept_newer_minor {
            if version.major != VERSION_MAJOR {
                return Err(PackError::UnknownVersion(version));
            }
        } else {
            version.ensure_supported()?;
        }
        Ok(Self {
            chunks: ChunkReader::at_offset(inner, header_bytes),
            version,
            registry: TypeRegistry::new(),
            failed: false,
        })
    }

    /// Next entry, or `None` at a clean end of stream.
    ///
    /// Declaration chunks are absorbed silently; a call returns once it has
    /// an entry, the end of the stream, or an error. `UnknownType` leaves
    /// the reader usable, everything else latches it.
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        if self.failed {
            return Err(PackError::Failed);
        }
        match self.next_entry_inner() {
            Err(e) => {
                if e.is_stream_fatal() {
                    self.failed = true;
                }
                Err(e)
            }
            ok => ok,
        }
    }

    fn next_entry_inner(&mut self) -> Result<Option<Entry>> {
        loop {
            let chunk = match self.chunks.next_chunk()? {
                Some(chunk) => chunk,
                None => return Ok(None),
            };

            if chunk.section == SPECIAL_SECTION {
                let (id, desc) = registry::decode_declaration(&chunk.payload, chunk.offset)?;
                self.registry.insert(id, desc);
                continue;
            }

            let (type_id, consumed) = varint::decode(&chunk.payload).map_err(|_| {
                PackError::Malformed {
                    what:   "entry type id",
                    offset: chunk.offset,
                }
            })?;
            let descriptor = self.registry.resolve(type_id, chunk.offset)?.clone();

            let mut payload = chunk.payload;
            payload.drain(..consumed);
            return Ok(Some(Entry {
                section: chunk.section,
                type_id,
                descriptor,
                payload,
                offset: chunk.offset,
            }));
        }
    }

    /// Iterator over entries. Fuses after a stream-fatal error, continues
    /// after entry-level ones.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries {
            reader: self,
            done:   false,
        }
    }

    /// Version read from the header.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Types declared by the stream so far. Grows as entries are read.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Stream position after everything consumed so far.
    pub fn offset(&self) -> u64 {
        self.chunks.offset()
    }
}

// ── Entries iterator ─────────────────────────────────────────────────────────

pub struct Entries<'a, R: Read> {
    reader: &'a mut PackReader<R>,
    done:   bool,
}

impl<R: Read> Iterator for Entries<'_, R> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                if e.is_stream_fatal() {
                    self.done = true;
                }
                Some(Err(e))
            }
        }
    }
}
