use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use mcworld_anvil::nbt;
use mcworld_metrics::WorldMetrics;
use mcworld_storage::{DirectoryStorage, WorldStorage};

use crate::chunk::{Block, Chunk};
use crate::config::WorldConfig;
use crate::coords::{self, BlockCoord, ChunkCoord, RegionCoord};
use crate::error::{Error, Result};
use crate::player::Player;
use crate::region::Region;
use crate::single_flight::SingleFlight;

/// Entry point to a save: regions, chunks, blocks and players, all loaded
/// lazily and kept for the lifetime of the `World`.
pub struct World {
    storage: Arc<dyn WorldStorage>,
    regions: Mutex<HashMap<RegionCoord, Arc<Region>>>,
    players: SingleFlight<String, Arc<Player>>,
    metrics: Arc<WorldMetrics>,
}

impl World {
    pub fn new(storage: Arc<dyn WorldStorage>) -> Self {
        let metrics = Arc::new(WorldMetrics::new());
        Self {
            storage,
            regions: Mutex::new(HashMap::new()),
            players: SingleFlight::new(Arc::clone(&metrics.players)),
            metrics,
        }
    }

    /// World over a save folder on disk.
    pub fn open(root: impl Into<PathBuf>, config: WorldConfig) -> Self {
        let storage = DirectoryStorage::new(root, config.layout, config.compression);
        Self::new(Arc::new(storage))
    }

    pub fn metrics(&self) -> &Arc<WorldMetrics> {
        &self.metrics
    }

    /// Region at `coord`, created (not loaded) on first use.
    pub fn region(&self, coord: RegionCoord) -> Arc<Region> {
        let mut regions = self.regions.lock().unwrap_or_else(PoisonError::into_inner);
        let region = regions.entry(coord).or_insert_with(|| {
            self.metrics.record_region_opened();
            let container = self.storage.open_region(coord.x, coord.z);
            Arc::new(Region::new(coord, container, Arc::clone(&self.metrics)))
        });
        Arc::clone(region)
    }

    pub fn loaded_regions(&self) -> usize {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub async fn chunk(&self, coord: ChunkCoord) -> Result<Arc<Chunk>> {
        let (region, local) = coords::chunk_and_region_of(coord);
        self.region(region).chunk(local).await
    }

    /// Block at absolute coordinates. Loads its chunk if needed.
    pub async fn block(&self, x: i32, y: i32, z: i32) -> Result<Block> {
        let (chunk, local) = coords::chunk_and_block_of(BlockCoord::new(x, y, z));
        Ok(self.chunk(chunk).await?.block(local))
    }

    /// Player record by name. Concurrent requests share one read.
    pub async fn player(&self, name: &str) -> Result<Arc<Player>> {
        let storage = Arc::clone(&self.storage);
        let owned = name.to_string();
        self.players
            .get_or_load(name.to_string(), move || load_player(storage, owned))
            .await
    }

    /// Write back every loaded chunk that was modified. Returns how many
    /// chunks were written; stops at the first failure.
    pub async fn save_all(&self) -> Result<usize> {
        let regions: Vec<Arc<Region>> = self
            .regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut saved = 0;
        for region in regions {
            for chunk in region.resident_chunks() {
                if chunk.is_dirty() {
                    chunk.save().await?;
                    saved += 1;
                }
            }
        }
        log::info!("Saved {} modified chunks", saved);
        Ok(saved)
    }
}

async fn load_player(storage: Arc<dyn WorldStorage>, name: String) -> Result<Arc<Player>> {
    log::debug!("Loading player {:?}", name);
    let bytes = storage
        .read_player(&name)
        .await
        .map_err(Error::storage)?
        .ok_or_else(|| Error::PlayerNotFound(name.clone()))?;
    let document = nbt::decode(&bytes).map_err(Error::decode)?;
    Ok(Arc::new(Player::new(name, document)))
}
