//! Core library for dynamic sprite batching with atlas caching.
//!
//! - Callers push sprites (opaque image ids + transforms) every frame;
//!   `flush` resolves them against the texture cache, sorts them and
//!   emits contiguous per-texture batches through host callbacks.
//! - `tick`/`defrag` age the cache: stale atlases are flushed, sparse
//!   atlases merged, dead lonely textures evicted, and accumulated
//!   lonely textures bin-packed into fresh atlases.
//! - The host supplies GPU texture create/destroy, pixel fetch and
//!   batch submission via the [`BatchHost`](host::BatchHost) trait.
//!
//! Quick example:
//! ```ignore
//! use sprite_batch_core::prelude::*;
//! # fn main() -> sprite_batch_core::Result<()> {
//! let cfg = SpriteBatchConfig::builder()
//!     .with_atlas_dimensions(1024, 1024)
//!     .build();
//! let mut batch = SpriteBatch::new(cfg, renderer)?;
//! batch.push(SpriteRequest {
//!     image_id: ImageId(42),
//!     w: 32,
//!     h: 32,
//!     transform: SpriteTransform::translation(100.0, 80.0),
//!     sort_bits: 0,
//!     premade_uv: None,
//! });
//! batch.flush();
//! batch.tick();
//! # Ok(()) }
//! ```

pub mod batch;
pub mod compositing;
pub mod config;
pub mod error;
pub mod host;
pub mod model;
pub mod packer;
pub mod registry;

mod atlas;

pub use batch::*;
pub use config::*;
pub use error::*;
pub use host::*;
pub use model::*;
pub use packer::*;
pub use registry::*;

/// Convenience prelude for common types and functions.
/// Importing `sprite_batch_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::batch::SpriteBatch;
    pub use crate::config::{SpriteBatchConfig, SpriteBatchConfigBuilder};
    pub use crate::host::BatchHost;
    pub use crate::model::{
        ImageId, Rect, ResolvedSprite, SpriteRequest, SpriteTransform, TextureId, UvRect,
    };
    pub use crate::packer::{BestFitPacker, PackCandidate};
}
