use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;

use crate::{RegionContainer, WorldStorage};

/// Chunk slots of one in-memory region.
#[derive(Debug, Default)]
pub struct MemoryRegion {
    chunks: Mutex<HashMap<(u8, u8), Vec<u8>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryRegion {
    pub fn insert(&self, local_x: u8, local_z: u8, data: Vec<u8>) {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((local_x, local_z), data);
    }

    pub fn get(&self, local_x: u8, local_z: u8) -> Option<Vec<u8>> {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(local_x, local_z))
            .cloned()
    }

    /// Number of `read` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RegionContainer for MemoryRegion {
    async fn read(&self, local_x: u8, local_z: u8) -> Result<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.get(local_x, local_z))
    }

    async fn write(&self, local_x: u8, local_z: u8, data: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.insert(local_x, local_z, data.to_vec());
        Ok(())
    }
}

/// Whole world kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    regions: Mutex<HashMap<(i32, i32), Arc<MemoryRegion>>>,
    players: Mutex<HashMap<String, Vec<u8>>>,
    region_opens: AtomicUsize,
    player_reads: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The region at `(x, z)`, created empty on first use.
    pub fn region(&self, region_x: i32, region_z: i32) -> Arc<MemoryRegion> {
        let mut regions = self.regions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(regions.entry((region_x, region_z)).or_default())
    }

    pub fn insert_player(&self, name: &str, data: Vec<u8>) {
        self.players
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), data);
    }

    /// Number of `open_region` calls served so far.
    pub fn region_opens(&self) -> usize {
        self.region_opens.load(Ordering::Relaxed)
    }

    pub fn player_reads(&self) -> usize {
        self.player_reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl WorldStorage for MemoryStorage {
    fn open_region(&self, region_x: i32, region_z: i32) -> Arc<dyn RegionContainer> {
        self.region_opens.fetch_add(1, Ordering::Relaxed);
        self.region(region_x, region_z)
    }

    async fn read_player(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.player_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .players
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_region_is_shared() {
        let storage = MemoryStorage::new();
        storage.region(1, 2).insert(0, 0, vec![1, 2, 3]);

        let container = storage.open_region(1, 2);
        assert_eq!(container.read(0, 0).await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(container.read(0, 1).await.unwrap(), None);
        assert_eq!(storage.region(1, 2).reads(), 2);

        container.write(0, 1, &[9]).await.unwrap();
        assert_eq!(storage.region(1, 2).get(0, 1), Some(vec![9]));
        assert_eq!(storage.region_opens(), 1);
    }

    #[tokio::test]
    async fn test_players() {
        let storage = MemoryStorage::new();
        storage.insert_player("Alex", vec![4]);
        assert_eq!(storage.read_player("Alex").await.unwrap(), Some(vec![4]));
        assert_eq!(storage.read_player("Steve").await.unwrap(), None);
        assert_eq!(storage.player_reads(), 2);
    }
}
