//! Fill-order tracking for masked pixels.
//!
//! The frontier is the set of masked pixels touching at least one known
//! pixel. Pixels with more known neighbors have more context and are filled
//! first ("onion peel"), which keeps propagation stable.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::mask::BinaryMask;

/// A masked pixel annotated with its count of known 8-neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Unmasked in-bounds 8-neighbors at the time of the pop.
    pub known_neighbors: u8,
}

/// Compute the frontier of `mask`, most-known-neighbors first.
///
/// Pixels with equal counts keep raster order. An all-false mask yields an
/// empty list.
#[must_use]
pub fn compute_frontier(mask: &BinaryMask) -> Vec<FrontierEntry> {
    let mut entries = Vec::new();
    for y in 0..mask.height() {
        for x in 0..mask.width() {
            if !mask.get(x, y) {
                continue;
            }
            let known = mask.known_neighbors(x, y);
            if known > 0 {
                entries.push(FrontierEntry {
                    x,
                    y,
                    known_neighbors: known,
                });
            }
        }
    }
    // Stable, so raster order survives among equal counts.
    entries.sort_by_key(|e| Reverse(e.known_neighbors));
    entries
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    known: u8,
    order: Reverse<u64>,
    index: usize,
}

/// Incrementally maintained frontier queue.
///
/// Pops the pixel with the most known neighbors, breaking ties by insertion
/// order. Counts only grow while the mask shrinks, so a count change pushes a
/// fresh heap entry and the outdated one is skipped when it surfaces.
#[derive(Debug)]
pub struct Frontier {
    width: u32,
    height: u32,
    heap: BinaryHeap<HeapEntry>,
    /// Current known-neighbor count of queued pixels.
    counts: Vec<u8>,
    /// Insertion sequence of queued pixels.
    seq: Vec<u64>,
    queued: Vec<bool>,
    next_seq: u64,
    len: usize,
}

impl Frontier {
    /// Seed the queue with every frontier pixel of `mask`, in raster order.
    #[must_use]
    pub fn from_mask(mask: &BinaryMask) -> Self {
        let (width, height) = mask.dimensions();
        let n = width as usize * height as usize;
        let mut frontier = Self {
            width,
            height,
            heap: BinaryHeap::new(),
            counts: vec![0; n],
            seq: vec![0; n],
            queued: vec![false; n],
            next_seq: 0,
            len: 0,
        };
        for y in 0..height {
            for x in 0..width {
                if mask.get(x, y) {
                    let known = mask.known_neighbors(x, y);
                    if known > 0 {
                        frontier.enqueue(mask.index(x, y), known);
                    }
                }
            }
        }
        frontier
    }

    /// Number of queued pixels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove and return the highest-priority pixel.
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        while let Some(entry) = self.heap.pop() {
            let idx = entry.index;
            if !self.queued[idx] || self.counts[idx] != entry.known {
                continue;
            }
            self.queued[idx] = false;
            self.len -= 1;
            let w = self.width as usize;
            #[allow(clippy::cast_possible_truncation)]
            let (x, y) = ((idx % w) as u32, (idx / w) as u32);
            return Some(FrontierEntry {
                x,
                y,
                known_neighbors: entry.known,
            });
        }
        None
    }

    /// Update the queue after `(x, y)` has been cleared in `mask`.
    ///
    /// Queued neighbors gain one known neighbor; masked neighbors not yet
    /// queued are appended.
    pub fn on_filled(&mut self, mask: &BinaryMask, x: u32, y: u32) {
        for ny in y.saturating_sub(1)..=(y + 1).min(self.height.saturating_sub(1)) {
            for nx in x.saturating_sub(1)..=(x + 1).min(self.width.saturating_sub(1)) {
                if (nx, ny) == (x, y) || !mask.get(nx, ny) {
                    continue;
                }
                let idx = mask.index(nx, ny);
                if self.queued[idx] {
                    self.counts[idx] = self.counts[idx].saturating_add(1);
                    self.heap.push(HeapEntry {
                        known: self.counts[idx],
                        order: Reverse(self.seq[idx]),
                        index: idx,
                    });
                } else {
                    let known = mask.known_neighbors(nx, ny);
                    self.enqueue(idx, known);
                }
            }
        }
    }

    fn enqueue(&mut self, idx: usize, known: u8) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queued[idx] = true;
        self.counts[idx] = known;
        self.seq[idx] = seq;
        self.len += 1;
        self.heap.push(HeapEntry {
            known,
            order: Reverse(seq),
            index: idx,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(size: u32, x0: u32, y0: u32, side: u32) -> BinaryMask {
        BinaryMask::from_fn(size, size, |x, y| {
            (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y)
        })
    }

    #[test]
    fn empty_mask_has_empty_frontier() {
        let mask = BinaryMask::new(6, 6);
        assert!(compute_frontier(&mask).is_empty());
        assert!(Frontier::from_mask(&mask).is_empty());
    }

    #[test]
    fn fully_masked_image_has_no_frontier() {
        let mask = BinaryMask::from_fn(4, 4, |_, _| true);
        assert!(compute_frontier(&mask).is_empty());
    }

    #[test]
    fn frontier_excludes_interior_pixels() {
        let mask = square_mask(10, 3, 3, 3);
        let frontier = compute_frontier(&mask);
        assert_eq!(frontier.len(), 8);
        assert!(!frontier.iter().any(|e| (e.x, e.y) == (4, 4)));
    }

    #[test]
    fn frontier_orders_by_known_neighbors_then_raster() {
        let mask = square_mask(10, 3, 3, 3);
        let frontier = compute_frontier(&mask);
        // Corners see 5 known neighbors, edge midpoints 3.
        let counts: Vec<u8> = frontier.iter().map(|e| e.known_neighbors).collect();
        assert_eq!(counts, vec![5, 5, 5, 5, 3, 3, 3, 3]);
        let corners: Vec<(u32, u32)> = frontier[..4].iter().map(|e| (e.x, e.y)).collect();
        assert_eq!(corners, vec![(3, 3), (5, 3), (3, 5), (5, 5)]);
    }

    #[test]
    fn queue_pops_in_same_order_as_sorted_frontier() {
        let mask = square_mask(10, 3, 3, 3);
        let sorted = compute_frontier(&mask);
        let mut queue = Frontier::from_mask(&mask);
        assert_eq!(queue.len(), sorted.len());
        for expected in sorted {
            assert_eq!(queue.pop(), Some(expected));
        }
        assert!(queue.pop().is_none());
    }

    #[test]
    fn filling_raises_neighbor_priority_and_exposes_interior() {
        let mut mask = square_mask(10, 3, 3, 3);
        let mut queue = Frontier::from_mask(&mask);

        let first = queue.pop().unwrap();
        assert_eq!((first.x, first.y), (3, 3));
        mask.set(3, 3, false);
        queue.on_filled(&mask, 3, 3);

        // (4,3) and (3,4) each gained a known neighbor (3 -> 4), still below
        // the remaining corners at 5.
        let next = queue.pop().unwrap();
        assert_eq!((next.x, next.y, next.known_neighbors), (5, 3, 5));

        // The interior pixel became a frontier member.
        assert_eq!(queue.len(), 7);
        let mut seen_center = false;
        while let Some(e) = queue.pop() {
            if (e.x, e.y) == (4, 4) {
                seen_center = true;
                assert_eq!(e.known_neighbors, 1);
            }
        }
        assert!(seen_center);
    }
}
