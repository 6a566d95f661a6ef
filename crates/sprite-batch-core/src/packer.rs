use crate::model::{ImageId, Rect};

/// One rectangle to place, in source pixels (already expanded by the
/// border reservation when the atlas uses border pixels).
#[derive(Debug, Clone, Copy)]
pub struct PackCandidate {
    pub image_id: ImageId,
    pub w: u32,
    pub h: u32,
}

impl PackCandidate {
    fn perimeter(&self) -> u64 {
        2 * (self.w as u64 + self.h as u64)
    }
}

/// A candidate's placed rect within the atlas.
#[derive(Debug, Clone, Copy)]
pub struct PackedRect {
    pub image_id: ImageId,
    pub rect: Rect,
}

/// Outcome of one packing run. `unfit` candidates stay behind in the
/// lonely pool; `used_area` feeds the atlas volume ratio.
#[derive(Debug)]
pub struct PackResult {
    pub placed: Vec<PackedRect>,
    pub unfit: Vec<ImageId>,
    pub used_area: u64,
}

/// Best-fit free-rectangle packer.
///
/// Keeps a stack of free nodes seeded with the whole atlas. Each
/// candidate takes the smallest-area node that can contain it (an
/// exact-area node wins the scan outright); the chosen node is then
/// split along the axis that leaves the smaller leftover strip, pushing
/// the strip as a new node and shrinking the original in place.
pub struct BestFitPacker {
    width: u32,
    height: u32,
    free: Vec<Rect>,
}

impl BestFitPacker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            free: vec![Rect::new(0, 0, width, height)],
        }
    }

    pub fn atlas_width(&self) -> u32 {
        self.width
    }

    pub fn atlas_height(&self) -> u32 {
        self.height
    }

    /// Number of free nodes currently on the stack.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Places every candidate it can, largest perimeter first (stable,
    /// so equal-perimeter candidates keep their input order).
    pub fn pack_all(&mut self, candidates: &[PackCandidate]) -> PackResult {
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| candidates[b].perimeter().cmp(&candidates[a].perimeter()));

        let mut placed = Vec::with_capacity(candidates.len());
        let mut unfit = Vec::new();
        let mut used_area = 0u64;
        for &i in &order {
            let c = &candidates[i];
            match self.place(c.w, c.h) {
                Some(rect) => {
                    used_area += rect.area();
                    placed.push(PackedRect {
                        image_id: c.image_id,
                        rect,
                    });
                }
                None => unfit.push(c.image_id),
            }
        }
        PackResult {
            placed,
            unfit,
            used_area,
        }
    }

    /// Finds the best-fit free node for a `w` by `h` rect and consumes
    /// it. Returns `None` when no node can contain the rect.
    pub fn place(&mut self, w: u32, h: u32) -> Option<Rect> {
        if w == 0 || h == 0 {
            return None;
        }
        let want = (w as u64) * (h as u64);
        let mut best_index = None;
        let mut best_area = u64::MAX;
        for (i, node) in self.free.iter().enumerate() {
            if !node.fits(w, h) {
                continue;
            }
            let area = node.area();
            if area == want {
                // Exact-area fit (which forces exact dimensions): take it
                // and stop scanning.
                best_index = Some(i);
                break;
            }
            if area < best_area {
                best_index = Some(i);
                best_area = area;
            }
        }
        let index = best_index?;
        let node = self.free[index];
        let rect = Rect::new(node.x, node.y, w, h);

        if node.w == w && node.h == h {
            self.free.swap_remove(index);
            return Some(rect);
        }

        let leftover_w = node.w - w;
        let leftover_h = node.h - h;
        if leftover_w < leftover_h {
            // Thin strip to the right of the placement; the remainder of
            // the node becomes the full-width strip below it.
            if leftover_w > 0 {
                self.free.push(Rect::new(node.x + w, node.y, leftover_w, h));
            }
            let node = &mut self.free[index];
            node.y += h;
            node.h = leftover_h;
        } else {
            if leftover_h > 0 {
                self.free.push(Rect::new(node.x, node.y + h, w, leftover_h));
            }
            let node = &mut self.free[index];
            node.x += w;
            node.w = leftover_w;
        }
        Some(rect)
    }
}
