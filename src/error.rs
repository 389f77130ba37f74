use std::io;
use thiserror::Error;

use crate::header::Version;
use crate::varint::MAX_VARINT_LEN;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PackError>;

#[derive(Error, Debug)]
pub enum PackError {
    /// The stream does not begin with the pack magic token; it is not this
    /// format at all. Carries whatever bytes were present (possibly short).
    #[error("Incorrect pack magic header (found {:?})", String::from_utf8_lossy(.0))]
    IncorrectMagic(Vec<u8>),

    /// The header declares a version this implementation cannot read.
    #[error("Unknown pack file version: {0} (reader supports {supported})", supported = Version::supported())]
    UnknownVersion(Version),

    /// The source ended mid varint or mid chunk. Chunk boundaries past this
    /// point are unrecoverable.
    #[error("Stream truncated at byte offset {offset} while reading {what}")]
    Truncated { offset: u64, what: &'static str },

    #[error("Varint at byte offset {offset} exceeds {max} bytes", max = MAX_VARINT_LEN)]
    VarintOverflow { offset: u64 },

    /// An entry references a type id with no prior declaration. The chunk has
    /// already been consumed, so the caller may continue with the next entry.
    #[error("Chunk at byte offset {offset} references undeclared type id {id}")]
    UnknownType { id: u64, offset: u64 },

    /// A fully framed chunk whose payload sub-format is damaged (declaration
    /// or entry prefix).
    #[error("Malformed {what} in chunk at byte offset {offset}")]
    Malformed { what: &'static str, offset: u64 },

    #[error("Section 0 is reserved for type declarations")]
    ReservedSection,

    /// Returned by every call after a stream-fatal error has latched.
    #[error("Pack stream is unusable after an earlier fatal error")]
    Failed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PackError {
    /// Whether this error poisons the whole stream.
    ///
    /// `UnknownType` is fatal only for the entry that raised it (its chunk is
    /// already consumed, framing stays synchronized) and `ReservedSection` is
    /// a producer-side guard that writes nothing; everything else leaves the
    /// stream unusable.
    pub fn is_stream_fatal(&self) -> bool {
        !matches!(
            self,
            PackError::UnknownType { .. } | PackError::ReservedSection
        )
    }
}
