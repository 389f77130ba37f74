//! Stream header: magic bytes followed by the format version.
//!
//! The header is the only part of a pack that is not chunk-framed. Everything
//! after it is read and written by the framing layer.

use std::fmt;
use std::io::{self, Read, Write};

use serde::Serialize;

use crate::error::{PackError, Result};
use crate::varint::{self, VarintRead};

/// Leading bytes of every pack stream.
pub const MAGIC: &[u8; 9] = b"protopack";

/// Major version produced by this implementation. Readers reject any other
/// major outright.
pub const VERSION_MAJOR: u64 = 1;

/// Minor version produced by this implementation. Readers accept equal or
/// older minors within the same major.
pub const VERSION_MINOR: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
}

impl Version {
    /// The version this implementation writes and fully understands.
    pub const fn supported() -> Self {
        Version {
            major: VERSION_MAJOR,
            minor: VERSION_MINOR,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.major == VERSION_MAJOR && self.minor <= VERSION_MINOR
    }

    pub fn ensure_supported(&self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(PackError::UnknownVersion(*self))
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Encoded size of the header this implementation writes.
pub fn header_len() -> usize {
    MAGIC.len() + varint::encoded_len(VERSION_MAJOR) + varint::encoded_len(VERSION_MINOR)
}

/// Write the magic bytes and current version to `w`.
pub fn write_header<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(MAGIC)?;
    varint::write_uvarint(w, VERSION_MAJOR)?;
    varint::write_uvarint(w, VERSION_MINOR)?;
    Ok(())
}

/// Read and validate a header, enforcing the version gate.
pub fn read_header<R: Read>(r: &mut R) -> Result<Version> {
    let (version, _) = read_version(r)?;
    version.ensure_supported()?;
    Ok(version)
}

/// Read a header without enforcing the version gate, returning the version
/// and the exact number of header bytes consumed. The count tracks what was
/// actually on the wire, including non-minimal version varints.
///
/// The magic bytes are still mandatory. A stream that ends inside them is
/// reported as `IncorrectMagic` carrying whatever bytes were present, so the
/// caller can show what it actually saw.
pub fn read_version<R: Read>(r: &mut R) -> Result<(Version, u64)> {
    let mut magic = [0u8; MAGIC.len()];
    let mut filled = 0;
    while filled < magic.len() {
        match r.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if magic[..filled] != MAGIC[..] {
        return Err(PackError::IncorrectMagic(magic[..filled].to_vec()));
    }

    let mut offset = MAGIC.len() as u64;
    let major = read_version_field(r, &mut offset)?;
    let minor = read_version_field(r, &mut offset)?;
    Ok((Version { major, minor }, offset))
}

fn read_version_field<R: Read>(r: &mut R, offset: &mut u64) -> Result<u64> {
    match varint::read_uvarint(r)? {
        VarintRead::Value { value, len } => {
            *offset += len as u64;
            Ok(value)
        }
        VarintRead::Eof => Err(PackError::Truncated {
            offset: *offset,
            what: "version",
        }),
        VarintRead::Truncated { len } => Err(PackError::Truncated {
            offset: *offset + len as u64,
            what: "version",
        }),
        VarintRead::Overflow => Err(PackError::VarintOverflow { offset: *offset }),
    }
}
