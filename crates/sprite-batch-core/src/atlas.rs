use crate::model::{AtlasTexture, TextureId};
use crate::registry::ImageRegistry;

/// One live atlas: the shared GPU texture, its member registry, and the
/// occupancy ratio computed at build time.
pub(crate) struct Atlas {
    pub texture: TextureId,
    pub sprites: ImageRegistry<AtlasTexture>,
    pub volume_ratio: f32,
    prev: usize,
    next: usize,
}

impl Atlas {
    pub fn new(texture: TextureId, sprites: ImageRegistry<AtlasTexture>, volume_ratio: f32) -> Self {
        Self {
            texture,
            sprites,
            volume_ratio,
            prev: 0,
            next: 0,
        }
    }
}

/// Arena of live atlases threaded into a circular list.
///
/// Atlases are referenced by arena index everywhere (the sprite-to-atlas
/// registry maps image ids to these indices), so slots are reused but
/// never shifted. Ring adjacency is stored as indices, giving O(1)
/// link/unlink while the decay and merge passes walk the ring.
pub(crate) struct AtlasArena {
    slots: Vec<Option<Atlas>>,
    free: Vec<usize>,
    head: Option<usize>,
    len: usize,
}

impl AtlasArena {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn get(&self, index: usize) -> Option<&Atlas> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Atlas> {
        self.slots.get_mut(index).and_then(|s| s.as_mut())
    }

    /// Adds an atlas, linking it at the tail of the ring (just before
    /// the head). Returns its arena index.
    pub fn insert(&mut self, atlas: Atlas) -> usize {
        let index = match self.free.pop() {
            Some(i) => {
                self.slots[i] = Some(atlas);
                i
            }
            None => {
                self.slots.push(Some(atlas));
                self.slots.len() - 1
            }
        };
        self.link(index);
        self.len += 1;
        index
    }

    /// Unlinks the atlas at `index` from the ring and frees its slot.
    pub fn remove(&mut self, index: usize) -> Option<Atlas> {
        let atlas = self.slots.get_mut(index)?.take()?;
        if atlas.next == index {
            self.head = None;
        } else {
            self.set_next(atlas.prev, atlas.next);
            self.set_prev(atlas.next, atlas.prev);
            if self.head == Some(index) {
                self.head = Some(atlas.next);
            }
        }
        self.free.push(index);
        self.len -= 1;
        Some(atlas)
    }

    /// Snapshot of the ring order starting at the head. Taken up front
    /// so passes can unlink atlases mid-walk.
    pub fn ring_indices(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.len);
        let Some(head) = self.head else {
            return out;
        };
        let mut index = head;
        loop {
            out.push(index);
            index = self.next_of(index);
            if index == head {
                break;
            }
        }
        out
    }

    /// All live atlases in slot order, for teardown.
    pub fn values(&self) -> impl Iterator<Item = &Atlas> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    fn link(&mut self, index: usize) {
        match self.head {
            None => {
                if let Some(a) = self.slots[index].as_mut() {
                    a.prev = index;
                    a.next = index;
                }
                self.head = Some(index);
            }
            Some(head) => {
                let tail = self.prev_of(head);
                self.set_next(tail, index);
                self.set_prev(index, tail);
                self.set_next(index, head);
                self.set_prev(head, index);
            }
        }
    }

    fn prev_of(&self, index: usize) -> usize {
        self.slots[index].as_ref().map_or(index, |a| a.prev)
    }

    fn next_of(&self, index: usize) -> usize {
        self.slots[index].as_ref().map_or(index, |a| a.next)
    }

    fn set_prev(&mut self, index: usize, value: usize) {
        if let Some(a) = self.slots[index].as_mut() {
            a.prev = value;
        }
    }

    fn set_next(&mut self, index: usize, value: usize) {
        if let Some(a) = self.slots[index].as_mut() {
            a.next = value;
        }
    }
}
