//! Lazy, coalescing access to an Anvil save: world → region → chunk → block.
//!
//! ```no_run
//! # async fn demo() -> mcworld_world::Result<()> {
//! use mcworld_world::{World, WorldConfig};
//!
//! let world = World::open("/srv/minecraft/world", WorldConfig::from_env());
//! let block = world.block(100, 64, -20).await?;
//! println!("type {:?}", block.type_id().await);
//! block.set_type(1).await;
//! block.chunk().save().await?;
//! # Ok(())
//! # }
//! ```

pub mod block;
pub mod chunk;
pub mod config;
pub mod coords;
pub mod error;
pub mod player;
pub mod region;
pub mod single_flight;
pub mod world;

pub use block::{BlockState, BlockView, BlockViewMut};
pub use chunk::{Block, Chunk};
pub use config::WorldConfig;
pub use coords::{BlockCoord, BlockLocal, ChunkCoord, ChunkLocal, RegionCoord};
pub use error::{Error, Result};
pub use player::Player;
pub use region::Region;
pub use world::World;
