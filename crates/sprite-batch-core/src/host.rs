use std::cmp::Ordering;

use crate::model::{ImageId, ResolvedSprite, TextureId};

/// Capabilities the batcher consumes from its host renderer.
///
/// The host owns the GPU and all image storage; the batcher only decides
/// *which* textures exist and what goes into them. All calls are
/// synchronous and are assumed to succeed; a `get_pixels` that blocks on
/// I/O stalls the batching step (the host's concern).
pub trait BatchHost {
    /// Uploads `pixels` (`w * h * pixel_stride` bytes, row-major) and
    /// returns a handle for the new texture.
    fn generate_texture(&mut self, pixels: &[u8], w: u32, h: u32) -> TextureId;

    /// Releases a texture previously returned by `generate_texture`.
    fn delete_texture(&mut self, texture: TextureId);

    /// Fills `out` with the source pixels of `image`. `out` is sized to
    /// exactly `w * h * pixel_stride` for the dimensions the image was
    /// pushed with.
    fn get_pixels(&mut self, image: ImageId, out: &mut [u8]);

    /// Receives one maximal run of sprites sharing a texture, already
    /// sorted. `texture_w`/`texture_h` are the pixel dimensions of that
    /// texture.
    fn submit_batch(&mut self, sprites: &[ResolvedSprite], texture_w: u32, texture_h: u32);

    /// Total order used by the flush sort. The default orders by
    /// `(sort_bits, texture_id)` ascending; override to inject a custom
    /// comparator. Must be a total order, and sprites the comparator
    /// considers equal still split into separate batches when their
    /// textures differ.
    fn compare(&self, a: &ResolvedSprite, b: &ResolvedSprite) -> Ordering {
        a.sort_bits
            .cmp(&b.sort_bits)
            .then(a.texture_id.cmp(&b.texture_id))
    }
}
