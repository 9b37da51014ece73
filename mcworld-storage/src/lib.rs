//! Storage collaborators used by the world caches.
//!
//! A [`WorldStorage`] hands out one [`RegionContainer`] per region and reads
//! player records. Two backends ship here: [`DirectoryStorage`] over a
//! vanilla save folder, and [`MemoryStorage`] for tests and tooling.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

pub mod directory;
pub mod memory;

pub use directory::{DirectoryLayout, DirectoryStorage};
pub use memory::{MemoryRegion, MemoryStorage};

/// Random access to the chunk slots of one region.
///
/// `local_x` / `local_z` are always in `0..32`.
#[async_trait]
pub trait RegionContainer: Send + Sync {
    /// Raw (uncompressed) NBT bytes of a chunk, `None` if the slot is empty.
    async fn read(&self, local_x: u8, local_z: u8) -> Result<Option<Vec<u8>>>;
    async fn write(&self, local_x: u8, local_z: u8, data: &[u8]) -> Result<()>;
}

#[async_trait]
pub trait WorldStorage: Send + Sync {
    /// Open the container of a region. Must not fail: a region that does not
    /// exist yet simply has no chunks until something is written.
    fn open_region(&self, region_x: i32, region_z: i32) -> Arc<dyn RegionContainer>;

    /// Raw bytes of a player record, `None` if there is no such player.
    async fn read_player(&self, name: &str) -> Result<Option<Vec<u8>>>;
}
