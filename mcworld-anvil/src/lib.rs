//! On-disk formats of an Anvil save: region container files and the
//! NBT documents stored inside them.

pub mod document;
pub mod nbt;
pub mod region;

pub use document::{ChunkDocument, Section};
pub use region::{Compression, RegionFile};
