use tracing::{debug, instrument, trace};

use crate::atlas::{Atlas, AtlasArena};
use crate::compositing::blit;
use crate::config::SpriteBatchConfig;
use crate::error::{Result, SpriteBatchError};
use crate::host::BatchHost;
use crate::model::{
    AtlasTexture, ImageId, LonelyTexture, PremadeAtlasEntry, Rect, ResolvedSprite, SpriteRequest,
    TextureId, UvRect,
};
use crate::packer::{BestFitPacker, PackCandidate};
use crate::registry::ImageRegistry;

/// UV inset applied to every edge of a packed sprite, in texels, so
/// bilinear sampling cannot reach the neighboring sprite.
const UV_EDGE_INSET_TEXELS: f32 = 1.0 / 128.0;

/// Dynamic sprite batcher with atlas caching.
///
/// Callers `push` sprites each frame and `flush` to receive sorted,
/// per-texture draw batches through the host. `tick` ages every cached
/// texture once per frame boundary; `defrag` (run occasionally, not
/// every frame) retires stale atlases, merges sparse ones, evicts dead
/// lonely textures and promotes accumulated lonely textures into a
/// fresh atlas.
///
/// One instance is the sole unit of state; instances are fully
/// independent. All GPU work goes through the injected [`BatchHost`].
pub struct SpriteBatch<H: BatchHost> {
    config: SpriteBatchConfig,
    host: H,
    input: Vec<SpriteRequest>,
    resolved: Vec<ResolvedSprite>,
    lonely: ImageRegistry<LonelyTexture>,
    premade: ImageRegistry<PremadeAtlasEntry>,
    sprite_to_atlas: ImageRegistry<usize>,
    atlases: AtlasArena,
    scratch: Vec<u8>,
}

impl<H: BatchHost> SpriteBatch<H> {
    /// Validates `config` and takes ownership of the host. No state is
    /// retained on failure.
    pub fn new(config: SpriteBatchConfig, host: H) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            host,
            input: Vec::new(),
            resolved: Vec::new(),
            lonely: ImageRegistry::new(),
            premade: ImageRegistry::new(),
            sprite_to_atlas: ImageRegistry::new(),
            atlases: AtlasArena::new(),
            scratch: Vec::new(),
        })
    }

    pub fn config(&self) -> &SpriteBatchConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Number of sprites buffered since the last flush.
    pub fn buffered_count(&self) -> usize {
        self.input.len() + self.resolved.len()
    }

    pub fn lonely_count(&self) -> usize {
        self.lonely.len()
    }

    pub fn atlas_count(&self) -> usize {
        self.atlases.len()
    }

    pub fn premade_count(&self) -> usize {
        self.premade.len()
    }

    /// Buffers one sprite for the next flush.
    ///
    /// # Panics
    ///
    /// Panics if the sprite is larger than the configured atlas
    /// dimensions; that is a misconfiguration, not a runtime condition,
    /// and is never silently truncated.
    pub fn push(&mut self, sprite: SpriteRequest) {
        self.assert_sprite_fits(sprite.w, sprite.h);
        self.input.push(sprite);
    }

    /// Eagerly creates a lonely texture for `image_id` so its first
    /// on-screen frame pays no pixel-fetch hitch. A no-op when the image
    /// is already tracked anywhere.
    ///
    /// # Panics
    ///
    /// Panics if the image is larger than the configured atlas
    /// dimensions (same precondition as [`push`](Self::push)).
    pub fn prefetch(&mut self, image_id: ImageId, w: u32, h: u32) {
        self.assert_sprite_fits(w, h);
        if self.premade.contains(image_id) || self.sprite_to_atlas.contains(image_id) {
            return;
        }
        if !self.lonely.contains(image_id) {
            self.lonely.insert(
                image_id,
                LonelyTexture {
                    image_id,
                    w,
                    h,
                    texture: None,
                    timestamp: 0,
                },
            );
        }
        let record = match self.lonely.get(image_id) {
            Some(r) => *r,
            None => return,
        };
        if record.texture.is_none() {
            let texture = self.fetch_and_generate(image_id, record.w, record.h);
            if let Some(entry) = self.lonely.get_mut(image_id) {
                entry.texture = Some(texture);
            }
        }
    }

    /// Forcibly forgets `image_id` wherever it lives: a lonely texture
    /// is deleted, an atlas member is dropped from its atlas (the shared
    /// atlas texture stays). Returns whether anything was removed.
    /// Premade entries are untouched; mark those for cleanup instead.
    pub fn invalidate(&mut self, image_id: ImageId) -> bool {
        if let Some(lonely) = self.lonely.remove(image_id) {
            if let Some(texture) = lonely.texture {
                self.host.delete_texture(texture);
            }
            return true;
        }
        if let Some(atlas_index) = self.sprite_to_atlas.remove(image_id) {
            if let Some(atlas) = self.atlases.get_mut(atlas_index) {
                atlas.sprites.remove(image_id);
            }
            return true;
        }
        false
    }

    /// Registers a caller-packed atlas under `image_id`. Its pixels are
    /// fetched and uploaded once here; sprites pushed against this id
    /// must carry their own UV box. Fails if the id is already tracked.
    pub fn register_premade_atlas(&mut self, image_id: ImageId, w: u32, h: u32) -> Result<()> {
        if self.premade.contains(image_id)
            || self.lonely.contains(image_id)
            || self.sprite_to_atlas.contains(image_id)
        {
            return Err(SpriteBatchError::DuplicateImage(image_id));
        }
        let texture = self.fetch_and_generate(image_id, w, h);
        self.premade.insert(
            image_id,
            PremadeAtlasEntry {
                image_id,
                w,
                h,
                texture,
                mark_for_cleanup: false,
            },
        );
        Ok(())
    }

    /// Marks a premade atlas for destruction on the next defrag.
    /// Returns whether the id named a premade entry.
    pub fn mark_premade_for_cleanup(&mut self, image_id: ImageId) -> bool {
        match self.premade.get_mut(image_id) {
            Some(entry) => {
                entry.mark_for_cleanup = true;
                true
            }
            None => false,
        }
    }

    /// Ages every atlas member and lonely texture by one tick.
    pub fn tick(&mut self) {
        for entry in self.lonely.values_mut() {
            entry.timestamp = entry.timestamp.saturating_add(1);
        }
        for index in self.atlases.ring_indices() {
            if let Some(atlas) = self.atlases.get_mut(index) {
                for member in atlas.sprites.values_mut() {
                    member.timestamp = member.timestamp.saturating_add(1);
                }
            }
        }
    }

    /// Resolves everything pushed since the last flush, sorts it and
    /// emits one `submit_batch` per maximal same-texture run.
    #[instrument(skip_all)]
    pub fn flush(&mut self) {
        self.resolve_inputs(false);
        let host = &self.host;
        self.resolved.sort_by(|a, b| host.compare(a, b));
        let mut start = 0;
        while start < self.resolved.len() {
            let texture_id = self.resolved[start].texture_id;
            let mut end = start + 1;
            while end < self.resolved.len() && self.resolved[end].texture_id == texture_id {
                end += 1;
            }
            let run = &self.resolved[start..end];
            self.host
                .submit_batch(run, run[0].texture_w, run[0].texture_h);
            start = end;
        }
        self.resolved.clear();
    }

    /// Runs the decay, merge, eviction, promotion and premade-cleanup
    /// passes. Meant to run occasionally (every few frames), not per
    /// flush.
    #[instrument(skip_all)]
    pub fn defrag(&mut self) {
        self.decay_pass();
        self.merge_pass();
        self.evict_stale_lonely();
        self.promote_lonely();
        self.cleanup_premade();
    }

    fn assert_sprite_fits(&self, w: u32, h: u32) {
        assert!(
            w <= self.config.atlas_width_in_pixels && h <= self.config.atlas_height_in_pixels,
            "sprite {w}x{h} exceeds atlas dimensions {}x{}",
            self.config.atlas_width_in_pixels,
            self.config.atlas_height_in_pixels,
        );
    }

    /// Fetches an image's pixels into the scratch buffer and uploads
    /// them as a standalone texture.
    fn fetch_and_generate(&mut self, image_id: ImageId, w: u32, h: u32) -> TextureId {
        let size = self.config.byte_size_of(w, h);
        self.scratch.resize(size, 0);
        self.host.get_pixels(image_id, &mut self.scratch[..size]);
        self.host.generate_texture(&self.scratch[..size], w, h)
    }

    /// UV box for lonely and premade-default sprites: the whole texture,
    /// V-flipped when configured.
    fn full_uv(&self) -> UvRect {
        if self.config.atlas_flip_uvs {
            UvRect {
                min_x: 0.0,
                min_y: 1.0,
                max_x: 1.0,
                max_y: 0.0,
            }
        } else {
            UvRect::FULL
        }
    }

    /// UV box of a placed content rect, inset by 1/128 of a texel on
    /// every edge so bilinear filtering cannot bleed across neighbors.
    fn uv_for(&self, rect: Rect) -> UvRect {
        let aw = self.config.atlas_width_in_pixels as f32;
        let ah = self.config.atlas_height_in_pixels as f32;
        let inset_x = UV_EDGE_INSET_TEXELS / aw;
        let inset_y = UV_EDGE_INSET_TEXELS / ah;
        let min_x = rect.x as f32 / aw + inset_x;
        let max_x = (rect.x + rect.w) as f32 / aw - inset_x;
        let mut min_y = rect.y as f32 / ah + inset_y;
        let mut max_y = (rect.y + rect.h) as f32 / ah - inset_y;
        if self.config.atlas_flip_uvs {
            min_y = 1.0 - min_y;
            max_y = 1.0 - max_y;
        }
        UvRect {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Drains the input buffer, turning each request into a resolved
    /// sprite: premade lookup, then atlas-member lookup, then the lonely
    /// pool (creating an entry on first miss).
    ///
    /// In `dry_run` mode no GPU textures are generated; requests whose
    /// lonely texture has none yet are re-buffered for the next real
    /// pass. Everything else resolves normally and waits for the next
    /// flush.
    fn resolve_inputs(&mut self, dry_run: bool) {
        let requests = std::mem::take(&mut self.input);
        for req in requests {
            if let Some(premade) = self.premade.get(req.image_id) {
                let uv = req.premade_uv.unwrap_or_else(|| self.full_uv());
                self.resolved.push(ResolvedSprite {
                    image_id: req.image_id,
                    texture_id: premade.texture,
                    texture_w: premade.w,
                    texture_h: premade.h,
                    transform: req.transform,
                    sort_bits: req.sort_bits,
                    uv,
                });
                continue;
            }

            if let Some(&atlas_index) = self.sprite_to_atlas.get(req.image_id) {
                if let Some(atlas) = self.atlases.get_mut(atlas_index) {
                    let texture_id = atlas.texture;
                    if let Some(member) = atlas.sprites.get_mut(req.image_id) {
                        member.timestamp = 0;
                        self.resolved.push(ResolvedSprite {
                            image_id: req.image_id,
                            texture_id,
                            texture_w: self.config.atlas_width_in_pixels,
                            texture_h: self.config.atlas_height_in_pixels,
                            transform: req.transform,
                            sort_bits: req.sort_bits,
                            uv: member.uv,
                        });
                    }
                }
                continue;
            }

            if !self.lonely.contains(req.image_id) {
                trace!(image = req.image_id.0, "new lonely texture");
                self.lonely.insert(
                    req.image_id,
                    LonelyTexture {
                        image_id: req.image_id,
                        w: req.w,
                        h: req.h,
                        texture: None,
                        timestamp: 0,
                    },
                );
            }
            let mut record = match self.lonely.get_mut(req.image_id) {
                Some(entry) => {
                    entry.timestamp = 0;
                    *entry
                }
                None => continue,
            };
            if record.texture.is_none() {
                if dry_run {
                    self.input.push(req);
                    continue;
                }
                let texture = self.fetch_and_generate(req.image_id, record.w, record.h);
                if let Some(entry) = self.lonely.get_mut(req.image_id) {
                    entry.texture = Some(texture);
                }
                record.texture = Some(texture);
            }
            let texture_id = match record.texture {
                Some(t) => t,
                None => continue,
            };
            self.resolved.push(ResolvedSprite {
                image_id: req.image_id,
                texture_id,
                texture_w: record.w,
                texture_h: record.h,
                transform: req.transform,
                sort_bits: req.sort_bits,
                uv: self.full_uv(),
            });
        }
    }

    /// Flushes one atlas back into the lonely pool: fresh members keep
    /// their elapsed timestamp (and get no texture until referenced
    /// again), stale members are dropped outright, and the shared GPU
    /// texture is destroyed.
    fn flush_atlas(&mut self, index: usize) {
        let Some(atlas) = self.atlases.remove(index) else {
            return;
        };
        let decay = self.config.ticks_to_decay_texture;
        let mut returned = 0usize;
        for (image_id, member) in atlas.sprites.iter() {
            self.sprite_to_atlas.remove(image_id);
            if member.timestamp < decay {
                returned += 1;
                self.lonely.insert(
                    image_id,
                    LonelyTexture {
                        image_id,
                        w: member.w,
                        h: member.h,
                        texture: None,
                        timestamp: member.timestamp,
                    },
                );
            }
        }
        debug!(
            members = atlas.sprites.len(),
            returned, "flushed atlas to lonely pool"
        );
        self.host.delete_texture(atlas.texture);
    }

    /// Retires atlases whose stale-to-fresh member ratio exceeds
    /// `ratio_to_decay_atlas`.
    fn decay_pass(&mut self) {
        let decay = self.config.ticks_to_decay_texture;
        let threshold = self.config.ratio_to_decay_atlas;
        for index in self.atlases.ring_indices() {
            let Some(atlas) = self.atlases.get(index) else {
                continue;
            };
            let total = atlas.sprites.len();
            let stale = atlas
                .sprites
                .values()
                .filter(|m| m.timestamp >= decay)
                .count();
            let fresh = total - stale;
            let should_flush = if total == 0 {
                true
            } else if fresh == 0 {
                stale > 0
            } else {
                stale as f32 / fresh as f32 > threshold
            };
            if should_flush {
                debug!(stale, fresh, "decaying atlas");
                self.flush_atlas(index);
            }
        }
    }

    /// Flushes pairs of sparse atlases so their contents can repack into
    /// a denser one on a later promotion.
    fn merge_pass(&mut self) {
        let threshold = self.config.ratio_to_merge_atlases;
        let sparse: Vec<usize> = self
            .atlases
            .ring_indices()
            .into_iter()
            .filter(|&i| {
                self.atlases
                    .get(i)
                    .is_some_and(|a| a.volume_ratio < threshold)
            })
            .collect();
        for pair in sparse.chunks_exact(2) {
            debug!(first = pair[0], second = pair[1], "merging sparse atlases");
            self.flush_atlas(pair[0]);
            self.flush_atlas(pair[1]);
        }
    }

    /// Once the lonely pool is big enough to be worth scanning,
    /// partitions it in place by staleness and destroys the stale tail.
    fn evict_stale_lonely(&mut self) {
        if self.lonely.len() < self.config.lonely_buffer_count_till_decay() {
            return;
        }
        let decay = self.config.ticks_to_decay_texture;
        let mut fresh_end = 0;
        let mut stale_begin = self.lonely.len();
        while fresh_end < stale_begin {
            if self.lonely.value_at(fresh_end).timestamp < decay {
                fresh_end += 1;
            } else {
                stale_begin -= 1;
                self.lonely.swap(fresh_end, stale_begin);
            }
        }
        let stale_ids: Vec<ImageId> = (stale_begin..self.lonely.len())
            .map(|i| self.lonely.key_at(i))
            .collect();
        for image_id in stale_ids {
            if let Some(entry) = self.lonely.remove(image_id) {
                trace!(image = image_id.0, "evicting stale lonely texture");
                if let Some(texture) = entry.texture {
                    self.host.delete_texture(texture);
                }
            }
        }
    }

    /// Registers placeholders for any still-buffered input, then packs
    /// accumulated lonely textures into a fresh atlas once the pool
    /// exceeds the flush threshold.
    fn promote_lonely(&mut self) {
        self.resolve_inputs(true);
        let till_flush = self.config.lonely_buffer_count_till_flush;
        if self.lonely.len() <= till_flush {
            return;
        }
        let take = till_flush.min(self.lonely.len());
        let candidates: Vec<ImageId> = (0..take).map(|i| self.lonely.key_at(i)).collect();
        self.build_atlas(&candidates);
    }

    /// Bin-packs `candidates` (ids of lonely entries) into one new atlas
    /// bitmap and GPU texture, re-pointing every fitted entry at it.
    ///
    /// # Panics
    ///
    /// Panics when zero candidates fit: the atlas dimensions are too
    /// small relative to the sprite sizes, which is a fatal
    /// misconfiguration.
    fn build_atlas(&mut self, candidates: &[ImageId]) {
        let aw = self.config.atlas_width_in_pixels;
        let ah = self.config.atlas_height_in_pixels;
        let border: u32 = if self.config.atlas_use_border_pixels {
            1
        } else {
            0
        };

        let pack_candidates: Vec<PackCandidate> = candidates
            .iter()
            .filter_map(|&id| self.lonely.get(id))
            .map(|l| PackCandidate {
                image_id: l.image_id,
                w: l.w + border * 2,
                h: l.h + border * 2,
            })
            .collect();
        if pack_candidates.is_empty() {
            return;
        }

        let mut packer = BestFitPacker::new(aw, ah);
        let result = packer.pack_all(&pack_candidates);
        assert!(
            !result.placed.is_empty(),
            "atlas build failed: no candidate fits a {aw}x{ah} atlas",
        );

        let stride = self.config.pixel_stride;
        let mut pixels = vec![0u8; aw as usize * ah as usize * stride];
        let mut members: Vec<AtlasTexture> = Vec::with_capacity(result.placed.len());
        for placed in &result.placed {
            let Some(lonely) = self.lonely.get(placed.image_id).copied() else {
                continue;
            };
            let content = Rect::new(
                placed.rect.x + border,
                placed.rect.y + border,
                lonely.w,
                lonely.h,
            );
            let size = self.config.byte_size_of(lonely.w, lonely.h);
            self.scratch.resize(size, 0);
            self.host.get_pixels(placed.image_id, &mut self.scratch[..size]);
            blit(
                &mut pixels,
                aw,
                ah,
                content.x,
                content.y,
                &self.scratch[..size],
                lonely.w,
                lonely.h,
                stride,
            );
            members.push(AtlasTexture {
                image_id: placed.image_id,
                w: lonely.w,
                h: lonely.h,
                uv: self.uv_for(content),
                timestamp: 0,
            });
        }

        let texture = self.host.generate_texture(&pixels, aw, ah);
        let volume_ratio = result.used_area as f32 / (aw as u64 * ah as u64) as f32;
        let mut sprites = ImageRegistry::new();
        for member in members {
            sprites.insert(member.image_id, member);
        }
        let member_count = sprites.len();
        let atlas_index = self.atlases.insert(Atlas::new(texture, sprites, volume_ratio));

        for placed in &result.placed {
            if let Some(lonely) = self.lonely.remove(placed.image_id) {
                if let Some(old) = lonely.texture {
                    self.host.delete_texture(old);
                }
            }
            self.sprite_to_atlas.insert(placed.image_id, atlas_index);
        }
        debug!(
            members = member_count,
            unfit = result.unfit.len(),
            volume_ratio,
            "built atlas"
        );
    }

    /// Destroys premade atlases marked for cleanup.
    fn cleanup_premade(&mut self) {
        let marked: Vec<ImageId> = self
            .premade
            .iter()
            .filter(|(_, entry)| entry.mark_for_cleanup)
            .map(|(id, _)| id)
            .collect();
        for image_id in marked {
            if let Some(entry) = self.premade.remove(image_id) {
                self.host.delete_texture(entry.texture);
            }
        }
    }
}

impl<H: BatchHost> Drop for SpriteBatch<H> {
    /// Releases every GPU texture this batch owns: all atlases and all
    /// lonely textures. Premade textures are destroyed only when marked
    /// for cleanup; unmarked ones remain the caller's to manage.
    fn drop(&mut self) {
        for atlas in self.atlases.values() {
            self.host.delete_texture(atlas.texture);
        }
        for entry in self.lonely.values() {
            if let Some(texture) = entry.texture {
                self.host.delete_texture(texture);
            }
        }
        for (_, entry) in self.premade.iter() {
            if entry.mark_for_cleanup {
                self.host.delete_texture(entry.texture);
            }
        }
    }
}
