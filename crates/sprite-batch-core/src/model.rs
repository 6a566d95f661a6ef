use serde::{Deserialize, Serialize};

/// Opaque 64-bit image key. Owned by the caller; the batcher never
/// invents or retires ids, it only tracks where their pixels live.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ImageId(pub u64);

/// Handle to a GPU texture, as returned by the host's `generate_texture`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TextureId(pub u64);

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    pub fn area(&self) -> u64 {
        (self.w as u64) * (self.h as u64)
    }
    /// Half-perimeter would do for ordering; kept as the full perimeter
    /// to match the placement heuristic's scoring.
    pub fn perimeter(&self) -> u64 {
        2 * (self.w as u64 + self.h as u64)
    }
    /// Returns true if a `w` by `h` rectangle fits inside `self`.
    pub fn fits(&self, w: u32, h: u32) -> bool {
        w <= self.w && h <= self.h
    }
}

/// Normalized texture-space box. `min` is the top-left corner unless the
/// atlas was built with flipped V, in which case min/max y are exchanged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UvRect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl UvRect {
    /// The whole texture.
    pub const FULL: UvRect = UvRect {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 1.0,
        max_y: 1.0,
    };

    /// Width/height in texture space, sign-insensitive (flipped V yields
    /// a negative raw extent).
    pub fn extent(&self) -> (f32, f32) {
        (
            (self.max_x - self.min_x).abs(),
            (self.max_y - self.min_y).abs(),
        )
    }
}

/// Destination transform for one sprite: translation, per-axis scale and
/// a rotation expressed as a cos/sin pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpriteTransform {
    pub x: f32,
    pub y: f32,
    pub sx: f32,
    pub sy: f32,
    pub c: f32,
    pub s: f32,
}

impl SpriteTransform {
    pub fn translation(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            sx: 1.0,
            sy: 1.0,
            c: 1.0,
            s: 0.0,
        }
    }
}

/// One sprite as pushed by the caller. Lives in the input buffer until
/// the next flush (or defrag dry-run) resolves it.
#[derive(Debug, Clone, Copy)]
pub struct SpriteRequest {
    pub image_id: ImageId,
    /// Source image size in pixels. Must not exceed the configured atlas
    /// dimensions.
    pub w: u32,
    pub h: u32,
    pub transform: SpriteTransform,
    /// Major sort key; batches are ordered by `(sort_bits, texture_id)`
    /// unless the host overrides the comparator.
    pub sort_bits: u64,
    /// UV box for images living in a premade atlas. Ignored for images
    /// the batcher packs itself.
    pub premade_uv: Option<UvRect>,
}

/// A fully resolved draw entry: the sprite plus the texture that holds
/// its pixels this frame. Consumed by the sort/emit step.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSprite {
    pub image_id: ImageId,
    pub texture_id: TextureId,
    /// Pixel dimensions of the texture behind `texture_id`, forwarded to
    /// `submit_batch` so hosts can build texel-space vertex data.
    pub texture_w: u32,
    pub texture_h: u32,
    pub transform: SpriteTransform,
    pub sort_bits: u64,
    pub uv: UvRect,
}

/// An image that owns a dedicated GPU texture because it is not (yet)
/// packed into an atlas. `texture` stays unset when the entry was
/// registered by a dry-run resolve.
#[derive(Debug, Clone, Copy)]
pub struct LonelyTexture {
    pub image_id: ImageId,
    pub w: u32,
    pub h: u32,
    pub texture: Option<TextureId>,
    /// Ticks since last reference. Reset to 0 on every resolve.
    pub timestamp: u32,
}

/// A caller-supplied, already-packed atlas. Never produced by the bin
/// packer; the caller keeps authoring UVs for its members.
#[derive(Debug, Clone, Copy)]
pub struct PremadeAtlasEntry {
    pub image_id: ImageId,
    pub w: u32,
    pub h: u32,
    pub texture: TextureId,
    pub mark_for_cleanup: bool,
}

/// Per-sprite record inside a built atlas.
#[derive(Debug, Clone, Copy)]
pub struct AtlasTexture {
    pub image_id: ImageId,
    pub w: u32,
    pub h: u32,
    pub uv: UvRect,
    /// Ticks since last reference, aged by `tick()`.
    pub timestamp: u32,
}
