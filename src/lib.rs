pub mod error;
pub mod varint;
pub mod header;
pub mod framing;
pub mod registry;
pub mod stream;
pub mod inspect;

pub use error::{PackError, Result};
pub use header::{Version, MAGIC, VERSION_MAJOR, VERSION_MINOR};
pub use framing::{Chunk, ChunkReader, ChunkWriter, SPECIAL_SECTION};
pub use registry::{TypeDescriptor, TypeRegistry, TYPE_ID_BASE};
pub use stream::{Entries, Entry, PackReader, PackWriter, ReadOptions};
pub use inspect::{summarize, summarize_file, PackSummary};
