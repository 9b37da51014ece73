use std::sync::Arc;

use thiserror::Error;

/// Failure of a world request.
///
/// `Clone` because one failed load is delivered to every caller that was
/// waiting on it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The region has no data for this chunk (absolute chunk coordinates).
    #[error("Chunk ({x}, {z}) does not exist")]
    ChunkNotFound { x: i32, z: i32 },

    #[error("Player {0:?} does not exist")]
    PlayerNotFound(String),

    /// Storage read/write error, passed through verbatim.
    #[error("Storage failure: {0:#}")]
    Storage(Arc<anyhow::Error>),

    #[error("Malformed document: {0}")]
    Decode(String),

    #[error("Failed to encode document: {0}")]
    Encode(String),

    /// The load task ended without a result (the loader panicked or the
    /// runtime shut down).
    #[error("Load was abandoned before it completed")]
    Abandoned,
}

impl Error {
    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(Arc::new(err))
    }

    pub fn decode(err: anyhow::Error) -> Self {
        Self::Decode(format!("{:#}", err))
    }

    pub fn encode(err: anyhow::Error) -> Self {
        Self::Encode(format!("{:#}", err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ChunkNotFound { .. } | Self::PlayerNotFound(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
