use parking_lot::Mutex;

use crate::common::FrameId;

/// Links of one frame in the recency list. A frame is tracked iff `tracked` is set.
#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<FrameId>,
    next: Option<FrameId>,
    tracked: bool,
}

/// Recency list threaded through a per-frame link table, giving O(1) insert, erase and
/// membership. `head` is the most recently unpinned frame, `tail` the next victim.
#[derive(Debug)]
struct LruList {
    links: Vec<Link>,
    head: Option<FrameId>,
    tail: Option<FrameId>,
    len: usize,
}

impl LruList {
    fn new(capacity: usize) -> Self {
        Self {
            links: vec![Link::default(); capacity],
            head: None,
            tail: None,
            len: 0,
        }
    }

    fn contains(&self, frame_id: FrameId) -> bool {
        self.links[frame_id.as_usize()].tracked
    }

    fn push_front(&mut self, frame_id: FrameId) {
        self.links[frame_id.as_usize()] = Link {
            prev: None,
            next: self.head,
            tracked: true,
        };
        match self.head {
            Some(old_head) => self.links[old_head.as_usize()].prev = Some(frame_id),
            None => self.tail = Some(frame_id),
        }
        self.head = Some(frame_id);
        self.len += 1;
    }

    fn unlink(&mut self, frame_id: FrameId) {
        let Link { prev, next, .. } = std::mem::take(&mut self.links[frame_id.as_usize()]);
        match prev {
            Some(prev) => self.links[prev.as_usize()].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.links[next.as_usize()].prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
    }
}

/// LRU replacement policy over unpinned frames.
///
/// `unpin` makes a frame evictable as the most recently used one, `pin` withdraws it, and
/// `victim` hands out the least recently unpinned frame.
pub struct LruReplacer {
    /// Maximum number of frames the replacer can track (the pool size)
    capacity: usize,
    list: Mutex<LruList>,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            list: Mutex::new(LruList::new(capacity)),
        }
    }

    /// Removes and returns the least recently unpinned frame.
    pub fn victim(&self) -> Option<FrameId> {
        let mut list = self.list.lock();
        let frame_id = list.tail?;
        list.unlink(frame_id);
        Some(frame_id)
    }

    /// Stops tracking a frame that is now in use. Unknown frames are ignored.
    pub fn pin(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.capacity {
            return;
        }
        let mut list = self.list.lock();
        if list.contains(frame_id) {
            list.unlink(frame_id);
        }
    }

    /// Starts tracking a frame whose pin count dropped to zero.
    pub fn unpin(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.capacity {
            return;
        }
        let mut list = self.list.lock();
        if list.contains(frame_id) || list.len >= self.capacity {
            return;
        }
        list.push_front(frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.list.lock().len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_replacer_new() {
        let replacer = LruReplacer::new(7);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_lru_replacer_victim_order() {
        let replacer = LruReplacer::new(7);
        for i in 1..=6 {
            replacer.unpin(FrameId::new(i));
        }
        // Repeated unpin does not refresh recency.
        replacer.unpin(FrameId::new(1));
        assert_eq!(replacer.size(), 6);

        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), Some(FrameId::new(2)));
        assert_eq!(replacer.victim(), Some(FrameId::new(3)));

        replacer.pin(FrameId::new(3));
        replacer.pin(FrameId::new(4));
        assert_eq!(replacer.size(), 2);

        replacer.unpin(FrameId::new(4));
        assert_eq!(replacer.victim(), Some(FrameId::new(5)));
        assert_eq!(replacer.victim(), Some(FrameId::new(6)));
        assert_eq!(replacer.victim(), Some(FrameId::new(4)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_lru_replacer_pin_middle_and_ends() {
        let replacer = LruReplacer::new(4);
        for i in 0..4 {
            replacer.unpin(FrameId::new(i));
        }
        replacer.pin(FrameId::new(2));
        replacer.pin(FrameId::new(0));
        replacer.pin(FrameId::new(3));
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_lru_replacer_ignores_out_of_range_frames() {
        let replacer = LruReplacer::new(2);
        replacer.unpin(FrameId::new(5));
        replacer.pin(FrameId::new(5));
        assert_eq!(replacer.size(), 0);
    }
}
