use std::sync::Arc;

use mcworld_anvil::ChunkDocument;
use mcworld_metrics::WorldMetrics;
use mcworld_storage::RegionContainer;

use crate::chunk::Chunk;
use crate::coords::{ChunkLocal, RegionCoord};
use crate::error::{Error, Result};
use crate::single_flight::SingleFlight;

/// One region container and the chunks loaded from it.
pub struct Region {
    coord: RegionCoord,
    container: Arc<dyn RegionContainer>,
    chunks: SingleFlight<ChunkLocal, Arc<Chunk>>,
    metrics: Arc<WorldMetrics>,
}

impl Region {
    pub(crate) fn new(coord: RegionCoord, container: Arc<dyn RegionContainer>, metrics: Arc<WorldMetrics>) -> Self {
        Self {
            coord,
            container,
            chunks: SingleFlight::new(Arc::clone(&metrics.chunks)),
            metrics,
        }
    }

    pub fn coord(&self) -> RegionCoord {
        self.coord
    }

    /// Chunk at `local` (both axes in `0..32`), loaded on first request.
    /// Concurrent requests for the same chunk share one read.
    pub async fn chunk(&self, local: ChunkLocal) -> Result<Arc<Chunk>> {
        let coord = self.coord;
        let container = Arc::clone(&self.container);
        let metrics = Arc::clone(&self.metrics);
        self.chunks
            .get_or_load(local, move || load_chunk(coord, local, container, metrics))
            .await
    }

    /// Already loaded chunk, without touching storage.
    pub fn cached_chunk(&self, local: ChunkLocal) -> Option<Arc<Chunk>> {
        self.chunks.get(&local)
    }

    pub fn loaded_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn resident_chunks(&self) -> Vec<Arc<Chunk>> {
        self.chunks.values()
    }
}

async fn load_chunk(
    region: RegionCoord,
    local: ChunkLocal,
    container: Arc<dyn RegionContainer>,
    metrics: Arc<WorldMetrics>,
) -> Result<Arc<Chunk>> {
    let absolute = region.chunk(local);
    log::debug!("Loading chunk {:?} from region {:?}", absolute, region);

    let bytes = container
        .read(local.x, local.z)
        .await
        .map_err(Error::storage)?
        .ok_or(Error::ChunkNotFound {
            x: absolute.x,
            z: absolute.z,
        })?;

    let document = ChunkDocument::decode(&bytes).map_err(Error::decode)?;
    Ok(Arc::new(Chunk::new(region, local, container, document, metrics)))
}
