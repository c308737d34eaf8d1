use log::trace;

use crate::constants::*;

/// Tracks how many valid PTEs, across all processes, name each page frame.
///
/// A frame is free iff its count is zero. The pool never hands out a
/// referenced frame; sharing a frame is done by [`FramePool::get`] and
/// [`FramePool::put`] from the fork path.
#[derive(Debug, Clone)]
pub struct FramePool {
    mapcounts: Vec<u32>,
}

impl FramePool {
    /// Create a pool of `nr_frames` unreferenced frames
    pub fn new(nr_frames: usize) -> Self {
        FramePool {
            mapcounts: vec![0; nr_frames],
        }
    }

    /// Number of frames in the pool
    #[inline]
    pub fn len(&self) -> usize {
        self.mapcounts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mapcounts.is_empty()
    }

    /// Current reference count of `pfn`
    #[inline]
    pub fn mapcount(&self, pfn: usize) -> u32 {
        self.mapcounts[pfn]
    }

    /// The whole reference count table, indexed by pfn
    pub fn mapcounts(&self) -> &[u32] {
        &self.mapcounts
    }

    /// Smallest-numbered frame nobody references, if any
    pub fn first_free(&self) -> Option<usize> {
        self.mapcounts.iter().position(|&count| count == 0)
    }

    /// Number of unreferenced frames
    pub fn free_count(&self) -> usize {
        self.mapcounts.iter().filter(|&&count| count == 0).count()
    }

    /// Add one reference to `pfn`
    pub fn get(&mut self, pfn: usize) {
        self.mapcounts[pfn] += 1;
        trace!("frame {} mapcount -> {}", pfn, self.mapcounts[pfn]);
    }

    /// Drop one reference to `pfn` and return the remaining count
    pub fn put(&mut self, pfn: usize) -> u32 {
        debug_assert!(self.mapcounts[pfn] > 0, "put on unreferenced frame {}", pfn);
        self.mapcounts[pfn] = self.mapcounts[pfn].saturating_sub(1);
        trace!("frame {} mapcount -> {}", pfn, self.mapcounts[pfn]);
        self.mapcounts[pfn]
    }
}

impl Default for FramePool {
    fn default() -> Self {
        Self::new(NR_PAGEFRAMES)
    }
}
