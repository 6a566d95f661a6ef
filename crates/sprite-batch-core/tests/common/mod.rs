#![allow(dead_code)]

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use sprite_batch_core::prelude::*;

/// One `submit_batch` call as observed by the host.
#[derive(Debug, Clone)]
pub struct SubmittedBatch {
    pub texture_id: TextureId,
    pub texture_w: u32,
    pub texture_h: u32,
    pub sprites: Vec<ResolvedSprite>,
}

/// Everything the batcher asked the host to do, in call order.
#[derive(Debug, Default)]
pub struct HostLog {
    pub generated: Vec<(TextureId, u32, u32, usize)>,
    pub deleted: Vec<TextureId>,
    pub fetches: Vec<ImageId>,
    pub batches: Vec<SubmittedBatch>,
}

impl HostLog {
    pub fn live_texture_count(&self) -> usize {
        self.generated.len() - self.deleted.len()
    }

    pub fn generated_ids(&self) -> Vec<TextureId> {
        self.generated.iter().map(|g| g.0).collect()
    }

    /// Total sprites across all submitted batches.
    pub fn submitted_sprite_count(&self) -> usize {
        self.batches.iter().map(|b| b.sprites.len()).sum()
    }
}

/// Test double for the renderer side: hands out sequential texture ids,
/// fills pixel fetches with the image id's low byte, and records every
/// call into a shared log the test keeps a handle to.
pub struct RecordingHost {
    log: Rc<RefCell<HostLog>>,
    next_texture: u64,
    comparator: Option<fn(&ResolvedSprite, &ResolvedSprite) -> Ordering>,
}

impl RecordingHost {
    pub fn new() -> (Self, Rc<RefCell<HostLog>>) {
        let log = Rc::new(RefCell::new(HostLog::default()));
        (
            Self {
                log: Rc::clone(&log),
                next_texture: 1,
                comparator: None,
            },
            log,
        )
    }

    pub fn with_comparator(
        cmp: fn(&ResolvedSprite, &ResolvedSprite) -> Ordering,
    ) -> (Self, Rc<RefCell<HostLog>>) {
        let (mut host, log) = Self::new();
        host.comparator = Some(cmp);
        (host, log)
    }
}

impl BatchHost for RecordingHost {
    fn generate_texture(&mut self, pixels: &[u8], w: u32, h: u32) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.log
            .borrow_mut()
            .generated
            .push((id, w, h, pixels.len()));
        id
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.log.borrow_mut().deleted.push(texture);
    }

    fn get_pixels(&mut self, image: ImageId, out: &mut [u8]) {
        out.fill(image.0 as u8);
        self.log.borrow_mut().fetches.push(image);
    }

    fn submit_batch(&mut self, sprites: &[ResolvedSprite], texture_w: u32, texture_h: u32) {
        self.log.borrow_mut().batches.push(SubmittedBatch {
            texture_id: sprites[0].texture_id,
            texture_w,
            texture_h,
            sprites: sprites.to_vec(),
        });
    }

    fn compare(&self, a: &ResolvedSprite, b: &ResolvedSprite) -> Ordering {
        match self.comparator {
            Some(cmp) => cmp(a, b),
            None => a
                .sort_bits
                .cmp(&b.sort_bits)
                .then(a.texture_id.cmp(&b.texture_id)),
        }
    }
}

/// A plain sprite request for tests that only care about identity.
pub fn sprite(image_id: u64, w: u32, h: u32) -> SpriteRequest {
    SpriteRequest {
        image_id: ImageId(image_id),
        w,
        h,
        transform: SpriteTransform::translation(0.0, 0.0),
        sort_bits: 0,
        premade_uv: None,
    }
}

pub fn sprite_sorted(image_id: u64, w: u32, h: u32, sort_bits: u64) -> SpriteRequest {
    SpriteRequest {
        sort_bits,
        ..sprite(image_id, w, h)
    }
}
