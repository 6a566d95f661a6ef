use serde::{Deserialize, Serialize};

/// Runtime atlas/cache configuration.
/// Key notes:
///   - `atlas_*_in_pixels` bound every sprite; pushing a larger sprite is
///     a precondition violation, never a silent truncation
///   - `lonely_buffer_count_till_flush` also derives the decay-scan
///     threshold (half, minimum 1)
///   - the decay/merge ratios gate the defrag passes, see `SpriteBatch::defrag`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteBatchConfig {
    /// Bytes per pixel for all pixel buffers moved through `get_pixels`
    /// and `generate_texture` (e.g. 4 for RGBA8).
    #[serde(default = "default_pixel_stride")]
    pub pixel_stride: usize,
    /// Width of every atlas the builder produces, in pixels.
    pub atlas_width_in_pixels: u32,
    /// Height of every atlas the builder produces, in pixels.
    pub atlas_height_in_pixels: u32,
    /// Reserve a transparent 1-pixel border around each packed sprite to
    /// reduce sampling bleed between neighbors.
    #[serde(default)]
    pub atlas_use_border_pixels: bool,
    /// Flip the V axis of generated UV boxes (for hosts with a
    /// bottom-left texture origin).
    #[serde(default)]
    pub atlas_flip_uvs: bool,
    /// A texture untouched for this many ticks counts as stale.
    #[serde(default = "default_ticks_to_decay_texture")]
    pub ticks_to_decay_texture: u32,
    /// Once this many lonely textures accumulate, defrag packs (up to)
    /// that many of them into a fresh atlas.
    #[serde(default = "default_lonely_buffer_count_till_flush")]
    pub lonely_buffer_count_till_flush: usize,
    /// Flush a whole atlas when stale members / fresh members exceeds
    /// this ratio. Range [0, 1].
    #[serde(default = "default_ratio_to_decay_atlas")]
    pub ratio_to_decay_atlas: f32,
    /// Flush pairs of atlases whose volume ratio sits below this, so
    /// their contents can repack densely. Range [0, 0.5].
    #[serde(default = "default_ratio_to_merge_atlases")]
    pub ratio_to_merge_atlases: f32,
}

impl Default for SpriteBatchConfig {
    fn default() -> Self {
        Self {
            pixel_stride: default_pixel_stride(),
            atlas_width_in_pixels: 1024,
            atlas_height_in_pixels: 1024,
            atlas_use_border_pixels: false,
            atlas_flip_uvs: false,
            ticks_to_decay_texture: default_ticks_to_decay_texture(),
            lonely_buffer_count_till_flush: default_lonely_buffer_count_till_flush(),
            ratio_to_decay_atlas: default_ratio_to_decay_atlas(),
            ratio_to_merge_atlases: default_ratio_to_merge_atlases(),
        }
    }
}

impl SpriteBatchConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - Atlas dimensions or the pixel stride are zero
    /// - Either decay/merge ratio sits outside its documented range
    /// - The decay tick count or lonely flush threshold is zero
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SpriteBatchError;

        if self.atlas_width_in_pixels == 0 || self.atlas_height_in_pixels == 0 {
            return Err(SpriteBatchError::InvalidDimensions {
                width: self.atlas_width_in_pixels,
                height: self.atlas_height_in_pixels,
            });
        }

        if self.pixel_stride == 0 {
            return Err(SpriteBatchError::InvalidConfig(
                "pixel_stride must be at least 1 byte".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.ratio_to_decay_atlas) {
            return Err(SpriteBatchError::InvalidConfig(format!(
                "ratio_to_decay_atlas ({}) outside [0, 1]",
                self.ratio_to_decay_atlas
            )));
        }

        if !(0.0..=0.5).contains(&self.ratio_to_merge_atlases) {
            return Err(SpriteBatchError::InvalidConfig(format!(
                "ratio_to_merge_atlases ({}) outside [0, 0.5]",
                self.ratio_to_merge_atlases
            )));
        }

        if self.ticks_to_decay_texture == 0 {
            return Err(SpriteBatchError::InvalidConfig(
                "ticks_to_decay_texture must be at least 1".into(),
            ));
        }

        if self.lonely_buffer_count_till_flush == 0 {
            return Err(SpriteBatchError::InvalidConfig(
                "lonely_buffer_count_till_flush must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Lonely-pool size at which the decay pass starts scanning for
    /// stale entries: half the flush threshold, minimum 1.
    pub fn lonely_buffer_count_till_decay(&self) -> usize {
        (self.lonely_buffer_count_till_flush / 2).max(1)
    }

    /// Byte size of one fetched image with this config's pixel stride.
    pub fn byte_size_of(&self, w: u32, h: u32) -> usize {
        (w as usize) * (h as usize) * self.pixel_stride
    }
}

fn default_pixel_stride() -> usize {
    4
}
fn default_ticks_to_decay_texture() -> u32 {
    60 * 3
}
fn default_lonely_buffer_count_till_flush() -> usize {
    64
}
fn default_ratio_to_decay_atlas() -> f32 {
    0.5
}
fn default_ratio_to_merge_atlases() -> f32 {
    0.25
}

/// Builder for `SpriteBatchConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct SpriteBatchConfigBuilder {
    cfg: SpriteBatchConfig,
}

impl SpriteBatchConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: SpriteBatchConfig::default(),
        }
    }
    pub fn with_atlas_dimensions(mut self, w: u32, h: u32) -> Self {
        self.cfg.atlas_width_in_pixels = w;
        self.cfg.atlas_height_in_pixels = h;
        self
    }
    pub fn pixel_stride(mut self, v: usize) -> Self {
        self.cfg.pixel_stride = v;
        self
    }
    pub fn use_border_pixels(mut self, v: bool) -> Self {
        self.cfg.atlas_use_border_pixels = v;
        self
    }
    pub fn flip_uvs(mut self, v: bool) -> Self {
        self.cfg.atlas_flip_uvs = v;
        self
    }
    pub fn ticks_to_decay_texture(mut self, v: u32) -> Self {
        self.cfg.ticks_to_decay_texture = v;
        self
    }
    pub fn lonely_buffer_count_till_flush(mut self, v: usize) -> Self {
        self.cfg.lonely_buffer_count_till_flush = v;
        self
    }
    pub fn ratio_to_decay_atlas(mut self, v: f32) -> Self {
        self.cfg.ratio_to_decay_atlas = v;
        self
    }
    pub fn ratio_to_merge_atlases(mut self, v: f32) -> Self {
        self.cfg.ratio_to_merge_atlases = v;
        self
    }
    pub fn build(self) -> SpriteBatchConfig {
        self.cfg
    }
}

impl SpriteBatchConfig {
    /// Create a fluent builder for `SpriteBatchConfig`.
    pub fn builder() -> SpriteBatchConfigBuilder {
        SpriteBatchConfigBuilder::new()
    }
}
