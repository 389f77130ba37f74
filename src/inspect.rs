//! Single-pass stream inspection.
//!
//! # How it works
//!
//! [`summarize`] walks a pack once with the framing reader and its own type
//! registry, tallying what it sees. It deliberately sits below
//! [`PackReader`](crate::stream::PackReader)'s error policy: payload-level
//! damage (an undecodable declaration, an entry with no usable type id, a
//! reference to an undeclared type) is counted and walked past rather than
//! returned, so one bad chunk does not hide the shape of the rest of the
//! stream.
//!
//! The header is not negotiable. A wrong magic or an unsupported major
//! version is a hard error; a newer minor within the supported major is
//! recorded in the summary and the walk proceeds, matching the lenient
//! reader policy.
//!
//! The walk stops at the first framing failure: a truncated stream sets
//! `truncated`, a framing varint gone bad counts as a malformed chunk.
//! Genuine IO errors propagate.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;

use crate::error::{PackError, Result};
use crate::framing::{ChunkReader, SPECIAL_SECTION};
use crate::header::{self, Version, VERSION_MAJOR};
use crate::registry::{self, TypeRegistry};
use crate::varint;

// ── Report types ─────────────────────────────────────────────────────────────

/// Per-section tally, in first-appearance order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub id:     u64,
    pub chunks: usize,
    /// Framed payload bytes, type id prefixes included.
    pub payload_bytes: u64,
}

/// Per-type tally, in id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeSummary {
    pub id:         u64,
    pub name:       String,
    pub schema_len: usize,
    /// Entries that resolved to this type.
    pub entries:    usize,
}

/// Everything one pass over a pack can tell without interpreting records.
#[derive(Debug, Clone, Serialize)]
pub struct PackSummary {
    pub version:      Version,
    /// Header bytes as found on the wire.
    pub header_bytes: u64,
    /// Total bytes consumed, header included.
    pub stream_bytes: u64,

    pub chunk_count:       usize,
    pub declaration_count: usize,
    pub entry_count:       usize,
    /// Record bytes across all entries, type id prefixes excluded.
    pub payload_bytes:     u64,

    pub sections: Vec<SectionSummary>,
    pub types:    Vec<TypeSummary>,

    /// Entries referencing a type id with no declaration before them.
    pub unresolved_entries: usize,
    /// Chunks whose payload did not decode as their section requires.
    pub malformed_chunks:   usize,
    /// True when the stream ended inside a chunk.
    pub truncated:          bool,
}

impl PackSummary {
    /// Summary line for display.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "pack v{}: {} chunk(s), {} declaration(s), {} entry(s), {} type(s), {} payload byte(s)",
            self.version,
            self.chunk_count,
            self.declaration_count,
            self.entry_count,
            self.types.len(),
            self.payload_bytes,
        );
        if self.unresolved_entries > 0 {
            line.push_str(&format!(", {} unresolved", self.unresolved_entries));
        }
        if self.malformed_chunks > 0 {
            line.push_str(&format!(", {} malformed", self.malformed_chunks));
        }
        if self.truncated {
            line.push_str(" [truncated]");
        }
        line
    }
}

// ── Walker ───────────────────────────────────────────────────────────────────

/// Summarize a pack stream in one forward pass.
pub fn summarize<R: Read>(r: &mut R) -> Result<PackSummary> {
    let (version, header_bytes) = header::read_version(r)?;
    if version.major != VERSION_MAJOR {
        return Err(PackError::UnknownVersion(version));
    }

    let mut registry = TypeRegistry::new();
    let mut entries_per_type: Vec<(u64, usize)> = Vec::new();
    let mut chunks = ChunkReader::at_offset(r, header_bytes);

    let mut summary = PackSummary {
        version,
        header_bytes,
        stream_bytes: header_bytes,
        chunk_count: 0,
        declaration_count: 0,
        entry_count: 0,
        payload_bytes: 0,
        sections: Vec::new(),
        types: Vec::new(),
        unresolved_entries: 0,
        malformed_chunks: 0,
        truncated: false,
    };

    loop {
        let chunk = match chunks.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(PackError::Truncated { .. }) => {
                summary.truncated = true;
                break;
            }
            Err(e @ PackError::Io(_)) => return Err(e),
            Err(_) => {
                summary.malformed_chunks += 1;
                break;
            }
        };

        summary.chunk_count += 1;
        match summary.sections.iter_mut().find(|s| s.id == chunk.section) {
            Some(section) => {
                section.chunks += 1;
                section.payload_bytes += chunk.payload.len() as u64;
            }
            None => summary.sections.push(SectionSummary {
                id:            chunk.section,
                chunks:        1,
                payload_bytes: chunk.payload.len() as u64,
            }),
        }

        if chunk.section == SPECIAL_SECTION {
            summary.declaration_count += 1;
            match registry::decode_declaration(&chunk.payload, chunk.offset) {
                Ok((id, desc)) => registry.insert(id, desc),
                Err(_) => summary.malformed_chunks += 1,
            }
            continue;
        }

        match varint::decode(&chunk.payload) {
            Ok((type_id, consumed)) => {
                summary.entry_count += 1;
                summary.payload_bytes += (chunk.payload.len() - consumed) as u64;
                if registry.get(type_id).is_some() {
                    match entries_per_type.iter_mut().find(|(id, _)| *id == type_id) {
                        Some((_, n)) => *n += 1,
                        None => entries_per_type.push((type_id, 1)),
                    }
                } else {
                    summary.unresolved_entries += 1;
                }
            }
            Err(_) => summary.malformed_chunks += 1,
        }
    }

    summary.stream_bytes = chunks.offset();
    summary.types = registry
        .iter()
        .map(|(id, desc)| TypeSummary {
            id,
            name:       desc.name.clone(),
            schema_len: desc.schema.len(),
            entries:    entries_per_type
                .iter()
                .find(|(tid, _)| *tid == id)
                .map(|(_, n)| *n)
                .unwrap_or(0),
        })
        .collect();

    Ok(summary)
}

/// Convenience: summarize the pack at `path`.
pub fn summarize_file(path: &Path) -> Result<PackSummary> {
    let mut r = BufReader::new(File::open(path)?);
    summarize(&mut r)
}
