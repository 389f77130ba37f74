//! Type registry: per-stream numeric identities for record types.
//!
//! # Identity rules
//! Every record type is identified by a u64 id that is only meaningful
//! inside the stream that declared it.  That id is:
//!   - Assigned by the writer, densely from [`TYPE_ID_BASE`] upward, in
//!     first-declaration order.
//!   - Written once into section 0 as a declaration chunk.
//!   - Referenced by every entry chunk that carries a record of the type.
//!
//! Ids are never negotiated and never global: two streams may assign the
//! same id to different types.  A reader MUST resolve ids strictly against
//! the declarations it has already consumed from the current stream, and
//! MUST NOT guess at an id it has not seen declared.
//!
//! Declarations carry an opaque schema tail after the type name.  This layer
//! stores and restates those bytes verbatim; interpreting them belongs to
//! whatever sits above the container.

use std::collections::HashMap;

use crate::error::{PackError, Result};
use crate::varint;

/// First id a writer assigns.  Id 0 is never produced, which keeps type ids
/// visually distinct from the reserved declaration section in dumps.
pub const TYPE_ID_BASE: u64 = 1;

// ── Descriptors ──────────────────────────────────────────────────────────────

/// A declared record type: a name plus an opaque schema blob.
///
/// Equality is over both fields.  Two types with the same name but different
/// schema bytes are different types and receive different ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub name:   String,
    pub schema: Vec<u8>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:   name.into(),
            schema: Vec::new(),
        }
    }

    pub fn with_schema(name: impl Into<String>, schema: impl Into<Vec<u8>>) -> Self {
        Self {
            name:   name.into(),
            schema: schema.into(),
        }
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// The id table built up as a stream is written or read.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types:   HashMap<u64, TypeDescriptor>,
    next_id: u64,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            types:   HashMap::new(),
            next_id: TYPE_ID_BASE,
        }
    }

    /// Id already assigned to a descriptor equal to `desc`, if any.
    /// The smallest matching id wins, so lookups are deterministic even on a
    /// registry populated out of order.
    pub fn find(&self, desc: &TypeDescriptor) -> Option<u64> {
        self.types
            .iter()
            .filter(|(_, d)| *d == desc)
            .map(|(id, _)| *id)
            .min()
    }

    /// Id the next [`allocate`](Self::allocate) call will assign.
    pub fn next_id(&self) -> u64 {
        self.next_id.max(TYPE_ID_BASE)
    }

    /// Assign the next free id to `desc` and return it.  Callers that want
    /// dedup semantics check [`find`](Self::find) first.
    pub fn allocate(&mut self, desc: TypeDescriptor) -> u64 {
        let id = self.next_id();
        self.types.insert(id, desc);
        self.next_id = id.saturating_add(1);
        id
    }

    /// Record a declaration read off the wire under its declared id.
    ///
    /// A restated id overwrites silently: re-declaration is legal and the
    /// last one read wins.  Id allocation stays ahead of everything seen,
    /// saturating at the id ceiling.
    pub fn insert(&mut self, id: u64, desc: TypeDescriptor) {
        self.types.insert(id, desc);
        self.next_id = self.next_id.max(id.saturating_add(1)).max(TYPE_ID_BASE);
    }

    pub fn get(&self, id: u64) -> Option<&TypeDescriptor> {
        self.types.get(&id)
    }

    /// Resolve `id` or report it as undeclared at the chunk offset that
    /// referenced it.
    pub fn resolve(&self, id: u64, offset: u64) -> Result<&TypeDescriptor> {
        self.types
            .get(&id)
            .ok_or(PackError::UnknownType { id, offset })
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Declared types in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &TypeDescriptor)> {
        let mut ids: Vec<u64> = self.types.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().map(|id| (id, &self.types[&id]))
    }
}

// ── Declaration payloads ─────────────────────────────────────────────────────
//
// A section-0 chunk payload is:
//
//   declared id (varint)  name length (varint)  name (UTF-8)  schema (rest)
//
// The schema tail runs to the end of the payload and is not interpreted here.

/// Encode one declaration payload.
pub fn encode_declaration(id: u64, desc: &TypeDescriptor) -> Vec<u8> {
    let name = desc.name.as_bytes();
    let mut head = [0u8; varint::MAX_VARINT_LEN];
    let mut payload = Vec::with_capacity(
        varint::encoded_len(id)
            + varint::encoded_len(name.len() as u64)
            + name.len()
            + desc.schema.len(),
    );
    let n = varint::encode_into(&mut head, id);
    payload.extend_from_slice(&head[..n]);
    let n = varint::encode_into(&mut head, name.len() as u64);
    payload.extend_from_slice(&head[..n]);
    payload.extend_from_slice(name);
    payload.extend_from_slice(&desc.schema);
    payload
}

/// Decode one declaration payload.
///
/// `offset` is the stream offset of the chunk carrying the payload; every
/// error is positioned with it.  Failures inside a payload are `Malformed`
/// rather than stream truncation: the chunk itself arrived intact.
pub fn decode_declaration(payload: &[u8], offset: u64) -> Result<(u64, TypeDescriptor)> {
    let malformed = |what: &'static str| PackError::Malformed { what, offset };

    let (id, consumed) =
        varint::decode(payload).map_err(|_| malformed("type declaration"))?;
    let rest = &payload[consumed..];

    let (name_len, consumed) = varint::decode(rest).map_err(|_| malformed("type name"))?;
    let rest = &rest[consumed..];

    let name_len = usize::try_from(name_len).map_err(|_| malformed("type name"))?;
    if name_len > rest.len() {
        return Err(malformed("type name"));
    }
    let name = std::str::from_utf8(&rest[..name_len])
        .map_err(|_| malformed("type name"))?
        .to_owned();
    let schema = rest[name_len..].to_vec();

    Ok((id, TypeDescriptor { name, schema }))
}
