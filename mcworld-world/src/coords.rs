//! Coordinate translation between world, region, chunk and block space.
//!
//! All divisions are floored and all remainders lie in `[0, n)`, so negative
//! coordinates map the same way vanilla does (`-1` is the last chunk of
//! region `-1`, not chunk `-1` of region `0`).

/// Chunks along one side of a region.
pub const REGION_CHUNKS: i32 = 32;
/// Blocks along one horizontal side of a chunk.
pub const CHUNK_BLOCKS: i32 = 16;
/// Blocks along each side of a section.
pub const SECTION_BLOCKS: i32 = 16;

/// A 32x32-chunk region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionCoord {
    pub x: i32,
    pub z: i32,
}

/// A chunk in world-chunk units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

/// A chunk inside its region, both axes in `0..32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkLocal {
    pub x: u8,
    pub z: u8,
}

/// A block in world-block units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// A block inside its chunk: `x` and `z` in `0..16`, `y` unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockLocal {
    pub x: u8,
    pub y: i32,
    pub z: u8,
}

impl RegionCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Absolute coordinate of a chunk of this region.
    pub fn chunk(self, local: ChunkLocal) -> ChunkCoord {
        ChunkCoord {
            x: self.x * REGION_CHUNKS + local.x as i32,
            z: self.z * REGION_CHUNKS + local.z as i32,
        }
    }
}

impl ChunkCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Absolute coordinate of a block of this chunk.
    pub fn block(self, local: BlockLocal) -> BlockCoord {
        BlockCoord {
            x: self.x * CHUNK_BLOCKS + local.x as i32,
            y: local.y,
            z: self.z * CHUNK_BLOCKS + local.z as i32,
        }
    }
}

impl ChunkLocal {
    pub const fn new(x: u8, z: u8) -> Self {
        Self { x, z }
    }
}

impl BlockCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl BlockLocal {
    pub const fn new(x: u8, y: i32, z: u8) -> Self {
        Self { x, y, z }
    }
}

/// Split a chunk coordinate into its region and its position in that region.
pub fn chunk_and_region_of(chunk: ChunkCoord) -> (RegionCoord, ChunkLocal) {
    let region = RegionCoord {
        x: chunk.x.div_euclid(REGION_CHUNKS),
        z: chunk.z.div_euclid(REGION_CHUNKS),
    };
    let local = ChunkLocal {
        x: chunk.x.rem_euclid(REGION_CHUNKS) as u8,
        z: chunk.z.rem_euclid(REGION_CHUNKS) as u8,
    };
    (region, local)
}

/// Split a block coordinate into its chunk and its position in that chunk.
/// The vertical component passes through untouched.
pub fn chunk_and_block_of(block: BlockCoord) -> (ChunkCoord, BlockLocal) {
    let chunk = ChunkCoord {
        x: block.x.div_euclid(CHUNK_BLOCKS),
        z: block.z.div_euclid(CHUNK_BLOCKS),
    };
    let local = BlockLocal {
        x: block.x.rem_euclid(CHUNK_BLOCKS) as u8,
        y: block.y,
        z: block.z.rem_euclid(CHUNK_BLOCKS) as u8,
    };
    (chunk, local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_to_region_examples() {
        assert_eq!(
            chunk_and_region_of(ChunkCoord::new(3, 5)),
            (RegionCoord::new(0, 0), ChunkLocal::new(3, 5))
        );
        assert_eq!(
            chunk_and_region_of(ChunkCoord::new(-1, -32)),
            (RegionCoord::new(-1, -1), ChunkLocal::new(31, 0))
        );
        assert_eq!(
            chunk_and_region_of(ChunkCoord::new(-33, 64)),
            (RegionCoord::new(-2, 2), ChunkLocal::new(31, 0))
        );
    }

    #[test]
    fn test_chunk_to_region_reconstructs_input() {
        for x in -100..100 {
            for z in [-1025, -64, -33, -32, -31, -1, 0, 1, 31, 32, 1000] {
                let chunk = ChunkCoord::new(x, z);
                let (region, local) = chunk_and_region_of(chunk);
                assert!(local.x < 32 && local.z < 32);
                assert_eq!(region.chunk(local), chunk, "chunk {:?}", chunk);
            }
        }
    }

    #[test]
    fn test_block_to_chunk_examples() {
        assert_eq!(
            chunk_and_block_of(BlockCoord::new(48, 32, 80)),
            (ChunkCoord::new(3, 5), BlockLocal::new(0, 32, 0))
        );
        assert_eq!(
            chunk_and_block_of(BlockCoord::new(-1, 70, -16)),
            (ChunkCoord::new(-1, -1), BlockLocal::new(15, 70, 0))
        );
        assert_eq!(
            chunk_and_block_of(BlockCoord::new(-17, 0, 15)),
            (ChunkCoord::new(-2, 0), BlockLocal::new(15, 0, 15))
        );
    }

    #[test]
    fn test_block_to_chunk_reconstructs_input() {
        for x in -70..70 {
            for z in [-257, -17, -16, -15, -1, 0, 1, 15, 16, 255] {
                let block = BlockCoord::new(x, 64, z);
                let (chunk, local) = chunk_and_block_of(block);
                assert!(local.x < 16 && local.z < 16);
                assert_eq!(local.y, 64);
                assert_eq!(chunk.block(local), block, "block {:?}", block);
            }
        }
    }
}
