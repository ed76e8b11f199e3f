use serde::{Deserialize, Serialize};

use crate::WorldId;

/// log2 of the number of chunks along one side of a region
pub const REGION_CHUNK_SHIFT: i32 = 5;
/// log2 of the number of blocks along one side of a region
pub const REGION_BLOCK_SHIFT: i32 = 9;

/// Identifies one region of one world (region coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionLocation {
    pub world: WorldId,
    pub x: i32,
    pub z: i32,
}

impl RegionLocation {
    pub fn new(world: WorldId, x: i32, z: i32) -> Self {
        Self { world, x, z }
    }

    /// Region containing the given chunk
    pub fn from_chunk(world: WorldId, chunk: ChunkCoord) -> Self {
        Self::new(
            world,
            chunk.x >> REGION_CHUNK_SHIFT,
            chunk.z >> REGION_CHUNK_SHIFT,
        )
    }

    /// Region containing the given block
    pub fn from_block(world: WorldId, pos: BlockPos) -> Self {
        Self::new(
            world,
            pos.x >> REGION_BLOCK_SHIFT,
            pos.z >> REGION_BLOCK_SHIFT,
        )
    }

    /// Check whether a chunk lies inside this region
    pub fn contains_chunk(&self, chunk: ChunkCoord) -> bool {
        chunk.x >> REGION_CHUNK_SHIFT == self.x && chunk.z >> REGION_CHUNK_SHIFT == self.z
    }
}

impl std::fmt::Display for RegionLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{},{}", self.world, self.x, self.z)
    }
}

/// Position of a chunk in the world (chunk coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Position of a block in the world (world coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Get the chunk this block belongs to
    pub fn chunk(&self) -> ChunkCoord {
        ChunkCoord::new(
            self.x >> (REGION_BLOCK_SHIFT - REGION_CHUNK_SHIFT),
            self.z >> (REGION_BLOCK_SHIFT - REGION_CHUNK_SHIFT),
        )
    }
}
