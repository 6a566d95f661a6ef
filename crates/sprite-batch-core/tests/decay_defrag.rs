mod common;

use common::{sprite, RecordingHost};
use sprite_batch_core::prelude::*;

#[test]
fn test_stale_lonely_textures_are_evicted_with_one_delete_each() {
    let cfg = SpriteBatchConfig::builder()
        .with_atlas_dimensions(128, 128)
        .ticks_to_decay_texture(2)
        .lonely_buffer_count_till_flush(8)
        .build();
    let (host, log) = RecordingHost::new();
    let mut batch = SpriteBatch::new(cfg, host).unwrap();

    for id in 1..=4 {
        batch.push(sprite(id, 16, 16));
    }
    batch.flush();
    assert_eq!(batch.lonely_count(), 4);
    assert_eq!(log.borrow().generated.len(), 4);

    batch.tick();
    batch.tick();
    batch.defrag();

    assert_eq!(batch.lonely_count(), 0);
    let log = log.borrow();
    assert_eq!(log.deleted.len(), 4);
    // Exactly the four lonely textures, each deleted once.
    let mut deleted = log.deleted.clone();
    deleted.sort();
    deleted.dedup();
    assert_eq!(deleted.len(), 4);
}

#[test]
fn test_referenced_textures_survive_eviction() {
    let cfg = SpriteBatchConfig::builder()
        .with_atlas_dimensions(128, 128)
        .ticks_to_decay_texture(2)
        .lonely_buffer_count_till_flush(8)
        .build();
    let (host, log) = RecordingHost::new();
    let mut batch = SpriteBatch::new(cfg, host).unwrap();

    for id in 1..=4 {
        batch.push(sprite(id, 16, 16));
    }
    batch.flush();
    batch.tick();
    batch.tick();

    // Touch two of them; their timestamps reset to zero.
    batch.push(sprite(1, 16, 16));
    batch.push(sprite(2, 16, 16));
    batch.flush();

    batch.defrag();
    assert_eq!(batch.lonely_count(), 2);
    assert_eq!(log.borrow().deleted.len(), 2);
}

#[test]
fn test_promotion_packs_lonely_textures_into_one_atlas() {
    let cfg = SpriteBatchConfig::builder()
        .with_atlas_dimensions(128, 128)
        .lonely_buffer_count_till_flush(3)
        .build();
    let (host, log) = RecordingHost::new();
    let mut batch = SpriteBatch::new(cfg, host).unwrap();

    // Buffer four sprites and defrag before any flush: the dry-run
    // resolve registers placeholders without generating textures, then
    // promotion packs three of them.
    for id in 1..=4 {
        batch.push(sprite(id, 16, 16));
    }
    batch.defrag();

    assert_eq!(batch.atlas_count(), 1);
    assert_eq!(batch.lonely_count(), 1);
    // One generate call: the atlas itself.
    assert_eq!(log.borrow().generated.len(), 1);
    assert_eq!(log.borrow().deleted.len(), 0);

    // The re-buffered sprites resolve on the next flush: three against
    // the atlas, one as a fresh lonely texture.
    batch.flush();
    let log = log.borrow();
    assert_eq!(log.generated.len(), 2);
    assert_eq!(log.batches.len(), 2);
    let atlas_batch = log
        .batches
        .iter()
        .find(|b| b.sprites.len() == 3)
        .expect("one batch with the three atlas members");
    assert_eq!((atlas_batch.texture_w, atlas_batch.texture_h), (128, 128));

    // Atlas-member UVs sit inside [0,1] and never overlap.
    let uvs: Vec<UvRect> = atlas_batch.sprites.iter().map(|s| s.uv).collect();
    for uv in &uvs {
        assert!(uv.min_x < uv.max_x && uv.min_y < uv.max_y);
        assert!(uv.max_x <= 1.0 && uv.max_y <= 1.0);
        assert!(uv.min_x >= 0.0 && uv.min_y >= 0.0);
    }
    for (i, a) in uvs.iter().enumerate() {
        for b in &uvs[i + 1..] {
            let disjoint = a.max_x <= b.min_x
                || b.max_x <= a.min_x
                || a.max_y <= b.min_y
                || b.max_y <= a.min_y;
            assert!(disjoint, "{a:?} overlaps {b:?}");
        }
    }
}

#[test]
fn test_promotion_replaces_individual_textures_with_the_atlas() {
    let cfg = SpriteBatchConfig::builder()
        .with_atlas_dimensions(128, 128)
        .lonely_buffer_count_till_flush(3)
        .build();
    let (host, log) = RecordingHost::new();
    let mut batch = SpriteBatch::new(cfg, host).unwrap();

    for id in 1..=4 {
        batch.push(sprite(id, 16, 16));
    }
    batch.flush();
    assert_eq!(log.borrow().generated.len(), 4);

    batch.defrag();

    // Three promoted entries lost their dedicated textures; the atlas
    // texture replaced them.
    assert_eq!(batch.atlas_count(), 1);
    assert_eq!(batch.lonely_count(), 1);
    let log = log.borrow();
    assert_eq!(log.generated.len(), 5);
    assert_eq!(log.deleted.len(), 3);
    assert_eq!(log.live_texture_count(), 2);
}

#[test]
fn test_atlas_decay_returns_fresh_members_and_drops_stale_ones() {
    let cfg = SpriteBatchConfig::builder()
        .with_atlas_dimensions(128, 128)
        .lonely_buffer_count_till_flush(3)
        .ticks_to_decay_texture(3)
        .ratio_to_decay_atlas(0.5)
        .ratio_to_merge_atlases(0.0)
        .build();
    let (host, log) = RecordingHost::new();
    let mut batch = SpriteBatch::new(cfg, host).unwrap();

    // Atlas over images 1..=3, image 4 stays lonely.
    for id in 1..=4 {
        batch.push(sprite(id, 16, 16));
    }
    batch.defrag();
    batch.flush();
    assert_eq!(batch.atlas_count(), 1);

    batch.tick();
    // Keep image 1 fresh, let 2 and 3 go stale.
    batch.push(sprite(1, 16, 16));
    batch.flush();
    batch.tick();
    batch.tick();

    let deletes_before = log.borrow().deleted.len();
    batch.defrag();

    // stale/fresh = 2/1 > 0.5: the atlas flushes. Its texture dies, the
    // fresh member returns to the lonely pool without one, and the
    // stale lonely image 4 is evicted with its texture.
    assert_eq!(batch.atlas_count(), 0);
    assert_eq!(batch.lonely_count(), 1);
    assert_eq!(log.borrow().deleted.len() - deletes_before, 2);

    // The returned member kept its elapsed age: one more tick reaches
    // the decay threshold and the next defrag drops it (no texture to
    // delete).
    batch.tick();
    let deletes_before = log.borrow().deleted.len();
    batch.defrag();
    assert_eq!(batch.lonely_count(), 0);
    assert_eq!(log.borrow().deleted.len(), deletes_before);
}

#[test]
fn test_sparse_atlases_merge_in_pairs() {
    let cfg = SpriteBatchConfig::builder()
        .with_atlas_dimensions(256, 256)
        .lonely_buffer_count_till_flush(3)
        .ratio_to_merge_atlases(0.25)
        .build();
    let (host, log) = RecordingHost::new();
    let mut batch = SpriteBatch::new(cfg, host).unwrap();

    // First atlas from images 1..=3 (16x16 in 256x256: volume ratio
    // far below the merge threshold).
    for id in 1..=4 {
        batch.push(sprite(id, 16, 16));
    }
    batch.defrag();
    batch.flush();
    assert_eq!(batch.atlas_count(), 1);

    // Second sparse atlas from three more images.
    for id in 5..=7 {
        batch.push(sprite(id, 16, 16));
    }
    batch.defrag();
    batch.flush();
    assert_eq!(batch.atlas_count(), 2);

    let atlas_textures: Vec<TextureId> = {
        let log = log.borrow();
        log.generated
            .iter()
            .filter(|g| (g.1, g.2) == (256, 256))
            .map(|g| g.0)
            .collect()
    };
    assert_eq!(atlas_textures.len(), 2);

    let deletes_before = log.borrow().deleted.len();
    batch.defrag();

    // Both sparse atlases flushed; their contents went back to the
    // lonely pool and repacked into a single denser atlas.
    let log = log.borrow();
    let deleted_now = &log.deleted[deletes_before..];
    assert!(deleted_now.contains(&atlas_textures[0]));
    assert!(deleted_now.contains(&atlas_textures[1]));
    assert_eq!(batch.atlas_count(), 1);
}

#[test]
fn test_single_sparse_atlas_is_not_merged_alone() {
    let cfg = SpriteBatchConfig::builder()
        .with_atlas_dimensions(256, 256)
        .lonely_buffer_count_till_flush(3)
        .ratio_to_merge_atlases(0.25)
        .build();
    let (host, log) = RecordingHost::new();
    let mut batch = SpriteBatch::new(cfg, host).unwrap();

    for id in 1..=4 {
        batch.push(sprite(id, 16, 16));
    }
    batch.defrag();
    batch.flush();
    assert_eq!(batch.atlas_count(), 1);

    let deletes_before = log.borrow().deleted.len();
    batch.defrag();
    assert_eq!(batch.atlas_count(), 1);
    assert_eq!(log.borrow().deleted.len(), deletes_before);
}

#[test]
fn test_marked_premade_atlas_dies_on_defrag() {
    let cfg = SpriteBatchConfig::builder()
        .with_atlas_dimensions(128, 128)
        .build();
    let (host, log) = RecordingHost::new();
    let mut batch = SpriteBatch::new(cfg, host).unwrap();

    batch.register_premade_atlas(ImageId(50), 256, 256).unwrap();
    assert!(batch.mark_premade_for_cleanup(ImageId(50)));
    assert!(!batch.mark_premade_for_cleanup(ImageId(51)));

    batch.defrag();
    assert_eq!(batch.premade_count(), 0);
    assert_eq!(log.borrow().deleted.len(), 1);
}

#[test]
fn test_invalidate_forgets_an_image_wherever_it_lives() {
    let cfg = SpriteBatchConfig::builder()
        .with_atlas_dimensions(128, 128)
        .lonely_buffer_count_till_flush(3)
        .build();
    let (host, log) = RecordingHost::new();
    let mut batch = SpriteBatch::new(cfg, host).unwrap();

    // Lonely: the dedicated texture dies with the entry.
    batch.push(sprite(1, 16, 16));
    batch.flush();
    assert!(batch.invalidate(ImageId(1)));
    assert_eq!(batch.lonely_count(), 0);
    assert_eq!(log.borrow().deleted.len(), 1);

    // Atlas member: the shared atlas texture survives.
    for id in 2..=5 {
        batch.push(sprite(id, 16, 16));
    }
    batch.defrag();
    let deletes_before = log.borrow().deleted.len();
    assert!(batch.invalidate(ImageId(2)));
    assert_eq!(log.borrow().deleted.len(), deletes_before);
    assert_eq!(batch.atlas_count(), 1);

    assert!(!batch.invalidate(ImageId(99)));
}

#[test]
fn test_tick_ages_premade_entries_not_at_all() {
    let cfg = SpriteBatchConfig::builder()
        .with_atlas_dimensions(128, 128)
        .ticks_to_decay_texture(1)
        .build();
    let (host, log) = RecordingHost::new();
    let mut batch = SpriteBatch::new(cfg, host).unwrap();

    batch.register_premade_atlas(ImageId(10), 64, 64).unwrap();
    batch.tick();
    batch.tick();
    batch.defrag();

    // Premade entries never decay; only an explicit mark removes them.
    assert_eq!(batch.premade_count(), 1);
    assert_eq!(log.borrow().deleted.len(), 0);
}
