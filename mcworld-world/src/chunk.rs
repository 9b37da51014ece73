use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use mcworld_anvil::ChunkDocument;
use mcworld_metrics::WorldMetrics;
use mcworld_storage::RegionContainer;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::block::{BlockState, BlockView, BlockViewMut};
use crate::coords::{self, BlockLocal, ChunkCoord, ChunkLocal, RegionCoord};
use crate::error::{Error, Result};

/// One loaded chunk. Shared by every caller that asked for it.
pub struct Chunk {
    region: RegionCoord,
    local: ChunkLocal,
    container: Arc<dyn RegionContainer>,
    document: RwLock<ChunkDocument>,
    dirty: AtomicBool,
    metrics: Arc<WorldMetrics>,
}

impl Chunk {
    pub(crate) fn new(
        region: RegionCoord,
        local: ChunkLocal,
        container: Arc<dyn RegionContainer>,
        document: ChunkDocument,
        metrics: Arc<WorldMetrics>,
    ) -> Self {
        Self {
            region,
            local,
            container,
            document: RwLock::new(document),
            dirty: AtomicBool::new(false),
            metrics,
        }
    }

    /// Absolute coordinate this chunk was loaded from.
    pub fn coord(&self) -> ChunkCoord {
        self.region.chunk(self.local)
    }

    pub fn region(&self) -> RegionCoord {
        self.region
    }

    pub fn local(&self) -> ChunkLocal {
        self.local
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ChunkDocument> {
        self.document.read().await
    }

    /// Write access to the document; marks the chunk as modified.
    pub async fn write(&self) -> RwLockWriteGuard<'_, ChunkDocument> {
        let guard = self.document.write().await;
        self.mark_dirty();
        guard
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Handle to one block of this chunk.
    pub fn block(self: &Arc<Self>, local: BlockLocal) -> Block {
        Block {
            chunk: Arc::clone(self),
            local,
        }
    }

    /// Encode the document and write it back through the owning region,
    /// at the position stored in the document itself.
    pub async fn save(&self) -> Result<()> {
        let started = Instant::now();
        let (bytes, target) = {
            let document = self.document.read().await;
            let bytes = document.encode().map_err(Error::encode)?;
            let stored = ChunkCoord::new(
                document.x_pos().unwrap_or_else(|| self.coord().x),
                document.z_pos().unwrap_or_else(|| self.coord().z),
            );
            // Edits made after this snapshot set the flag again
            self.dirty.store(false, Ordering::Release);
            (bytes, stored)
        };

        let (target_region, target_local) = coords::chunk_and_region_of(target);
        if target_region != self.region {
            log::warn!(
                "Chunk loaded from {:?} stores position {:?} outside region {:?}; writing slot {:?}",
                self.coord(),
                target,
                self.region,
                target_local
            );
        }

        if let Err(e) = self.container.write(target_local.x, target_local.z, &bytes).await {
            self.mark_dirty();
            self.metrics.record_save_failure();
            return Err(Error::storage(e));
        }

        self.metrics.record_save(started.elapsed(), bytes.len());
        log::info!("Saved chunk {:?} ({} bytes)", target, bytes.len());
        Ok(())
    }
}

/// A block addressed through its chunk. Cheap to clone; each accessor takes
/// the chunk lock for the duration of one read or write.
#[derive(Clone)]
pub struct Block {
    chunk: Arc<Chunk>,
    local: BlockLocal,
}

impl Block {
    pub fn chunk(&self) -> &Arc<Chunk> {
        &self.chunk
    }

    pub fn local(&self) -> BlockLocal {
        self.local
    }

    pub async fn type_id(&self) -> Option<u16> {
        BlockView::new(&*self.chunk.read().await, self.local).type_id()
    }

    pub async fn data(&self) -> Option<u8> {
        BlockView::new(&*self.chunk.read().await, self.local).data()
    }

    pub async fn sky_light(&self) -> Option<u8> {
        BlockView::new(&*self.chunk.read().await, self.local).sky_light()
    }

    pub async fn block_light(&self) -> Option<u8> {
        BlockView::new(&*self.chunk.read().await, self.local).block_light()
    }

    pub async fn state(&self) -> BlockState {
        BlockView::new(&*self.chunk.read().await, self.local).state()
    }

    pub async fn set_type(&self, id: u16) -> bool {
        self.update(|view| view.set_type(id)).await
    }

    pub async fn set_data(&self, value: u8) -> bool {
        self.update(|view| view.set_data(value)).await
    }

    pub async fn set_sky_light(&self, value: u8) -> bool {
        self.update(|view| view.set_sky_light(value)).await
    }

    pub async fn set_block_light(&self, value: u8) -> bool {
        self.update(|view| view.set_block_light(value)).await
    }

    async fn update(&self, apply: impl FnOnce(&mut BlockViewMut<'_>) -> bool) -> bool {
        let mut document = self.chunk.document.write().await;
        let changed = apply(&mut BlockViewMut::new(&mut document, self.local));
        if changed {
            self.chunk.mark_dirty();
        }
        changed
    }
}
