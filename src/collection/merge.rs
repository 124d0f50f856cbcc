//! Working set for streaming the global point array into parts
//!
//! Point arrays are stored once for the whole model, but every part only
//! needs the points its cells reference. Parts are sorted by the span of
//! global point ids they use, then the array is streamed in fixed-size chunks.
//! Parts that end before the current chunk are dropped from the front of the
//! working set, and only parts starting before the end of the chunk are fed.
//!
//! ```text
//! chunks   |  0..40  | 40..80  | 80..120 | 120..160 | ...
//! A 0..100 |    x    |    x    |    x    |          |
//! B 50..150|         |    x    |    x    |    x     |
//! ```

// standard library
use std::collections::VecDeque;

/// Span of global point ids used by one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointRange {
    /// Part slot
    pub slot: usize,
    /// Lowest global point id
    pub min: usize,
    /// One past the highest global point id
    pub max: usize,
}

impl PointRange {
    pub fn new(slot: usize, min: usize, max: usize) -> Self {
        Self { slot, min, max }
    }

    /// Does the range share any point with `start..end`
    #[inline]
    fn intersects(&self, start: usize, end: usize) -> bool {
        self.min < end && self.max > start
    }
}

/// Parts still waiting for chunks of the point array, sorted by range
#[derive(Debug, Clone, Default)]
pub struct PointMerge {
    working: VecDeque<PointRange>,
}

impl PointMerge {
    /// Sort ranges lexicographically by `(min, max)`
    pub fn new(mut ranges: Vec<PointRange>) -> Self {
        ranges.sort_by_key(|r| (r.min, r.max));
        Self {
            working: ranges.into(),
        }
    }

    /// Lowest min and highest max across every range
    ///
    /// The highest max is not necessarily the last range's, since ranges are
    /// ordered by their min first.
    pub fn span(&self) -> Option<(usize, usize)> {
        let min = self.working.front()?.min;
        let max = self.working.iter().map(|r| r.max).max()?;
        Some((min, max))
    }

    /// Number of parts still resident
    pub fn len(&self) -> usize {
        self.working.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working.is_empty()
    }

    /// Drop ranges from the front that end strictly before `offset`
    ///
    /// Eviction only looks at the max of the front range. A later range with a
    /// smaller max stays resident until everything before it is gone.
    pub fn evict_before(&mut self, offset: usize) {
        while self.working.front().is_some_and(|r| r.max < offset) {
            self.working.pop_front();
        }
    }

    /// Slots of the resident parts that overlap the chunk `offset..offset + len`
    ///
    /// Stops at the first range starting at or after the end of the chunk.
    pub fn intersecting(&self, offset: usize, len: usize) -> impl Iterator<Item = usize> + '_ {
        let end = offset + len;
        self.working
            .iter()
            .take_while(move |r| r.min < end)
            .filter(move |r| r.intersects(offset, end))
            .map(|r| r.slot)
    }

    /// Evict, then list the slots to feed for the chunk `offset..offset + len`
    pub fn next_chunk(&mut self, offset: usize, len: usize) -> Vec<usize> {
        self.evict_before(offset);
        self.intersecting(offset, len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> PointMerge {
        PointMerge::new(vec![
            PointRange::new(2, 200, 300),
            PointRange::new(1, 50, 150),
            PointRange::new(0, 0, 100),
        ])
    }

    #[test]
    fn sorted_by_min_then_max() {
        let merge = PointMerge::new(vec![
            PointRange::new(0, 10, 50),
            PointRange::new(1, 10, 20),
            PointRange::new(2, 5, 90),
        ]);
        let order: Vec<usize> = merge.working.iter().map(|r| r.slot).collect();
        assert_eq!(order, vec![2, 1, 0]);
        assert_eq!(merge.span(), Some((5, 90)));
    }

    #[test]
    fn each_intersecting_chunk_delivered_once() {
        let mut merge = example();
        let (min, max) = merge.span().unwrap();
        assert_eq!((min, max), (0, 300));

        let chunk = 40;
        let mut deliveries = vec![Vec::new(); 3];
        let mut offset = min;
        while offset < max {
            let len = chunk.min(max - offset);
            for slot in merge.next_chunk(offset, len) {
                deliveries[slot].push(offset);
            }
            offset += len;
        }

        assert_eq!(deliveries[0], vec![0, 40, 80]);
        assert_eq!(deliveries[1], vec![40, 80, 120]);
        assert_eq!(deliveries[2], vec![200, 240, 280]);
    }

    #[test]
    fn eviction_needs_max_before_offset() {
        let mut merge = example();
        merge.evict_before(100);
        assert_eq!(merge.len(), 3);
        merge.evict_before(101);
        assert_eq!(merge.len(), 2);
        merge.evict_before(1000);
        assert!(merge.is_empty());
        assert_eq!(merge.span(), None);
    }
}
