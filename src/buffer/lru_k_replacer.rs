use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// How a frame was touched. The base policy ignores this, but it travels
/// with every access so a scan-resistant variant can use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Unknown,
    Lookup,
    Scan,
    Index,
}

/// Tracks access history for a single frame
#[derive(Debug)]
struct LruKNode {
    /// History of access timestamps (most recent at back), at most k entries
    history: VecDeque<Timestamp>,
    /// Whether this frame is currently evictable
    is_evictable: bool,
}

impl LruKNode {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            is_evictable: false,
        }
    }

    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    /// Returns the backward k-distance, or None when the frame has fewer
    /// than k recorded accesses (+inf distance).
    fn k_distance(&self, current_timestamp: Timestamp, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            Some(current_timestamp - self.history[self.history.len() - k])
        }
    }

    fn earliest_timestamp(&self) -> Option<Timestamp> {
        self.history.front().copied()
    }
}

struct ReplacerState {
    node_store: HashMap<FrameId, LruKNode>,
    /// Number of evictable tracked frames
    curr_size: usize,
}

/// LRU-K replacement policy.
///
/// Evicts the frame whose backward k-distance (time since the kth most
/// recent access) is the largest among all evictable frames. A frame with
/// fewer than k recorded accesses has +inf distance; ties between +inf
/// frames break toward the earliest recorded access.
pub struct LruKReplacer {
    k: usize,
    /// Frame ids must be in `0..num_frames`
    num_frames: usize,
    current_timestamp: AtomicU64,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    pub fn new(k: usize, num_frames: usize) -> Self {
        assert!(k >= 1, "LRU-K requires k >= 1");
        Self {
            k,
            num_frames,
            current_timestamp: AtomicU64::new(0),
            state: Mutex::new(ReplacerState {
                node_store: HashMap::new(),
                curr_size: 0,
            }),
        }
    }

    /// Evicts the evictable frame with the largest backward k-distance and
    /// erases its access record. Returns None if nothing is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        if state.curr_size == 0 {
            return None;
        }

        let current_ts = self.current_timestamp.load(Ordering::Relaxed);

        let mut victim: Option<FrameId> = None;
        let mut victim_k_dist: Option<Timestamp> = None;
        let mut victim_earliest: Option<Timestamp> = None;

        for (&frame_id, node) in state.node_store.iter() {
            if !node.is_evictable {
                continue;
            }

            let k_dist = node.k_distance(current_ts, self.k);
            let earliest = node.earliest_timestamp();

            let replace = match (victim_k_dist, k_dist) {
                // candidate has finite distance, victim is +inf: keep victim
                (None, Some(_)) => false,
                // candidate is +inf, victim finite: +inf wins
                (Some(_), None) => true,
                // both +inf: earliest first access wins
                (None, None) => match (victim_earliest, earliest) {
                    (Some(v), Some(c)) => c < v,
                    (None, Some(_)) => true,
                    _ => false,
                },
                (Some(v), Some(c)) => c > v,
            };

            if victim.is_none() || replace {
                victim = Some(frame_id);
                victim_k_dist = k_dist;
                victim_earliest = earliest;
            }
        }

        if let Some(frame_id) = victim {
            state.node_store.remove(&frame_id);
            state.curr_size -= 1;
        }

        victim
    }

    /// Records an access to the given frame at the next timestamp.
    ///
    /// Panics if the frame id is outside the replacer's range.
    pub fn record_access(&self, frame_id: FrameId, _access_type: AccessType) {
        assert!(
            frame_id.as_usize() < self.num_frames,
            "frame id {} out of range (replacer tracks {} frames)",
            frame_id,
            self.num_frames
        );

        let timestamp = self.current_timestamp.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.state.lock();
        state
            .node_store
            .entry(frame_id)
            .or_insert_with(LruKNode::new)
            .record_access(timestamp, self.k);
    }

    /// Sets whether a frame may be evicted. Untracked frames are ignored.
    ///
    /// Panics if the frame id is outside the replacer's range.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        assert!(
            frame_id.as_usize() < self.num_frames,
            "frame id {} out of range (replacer tracks {} frames)",
            frame_id,
            self.num_frames
        );

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(node) = state.node_store.get_mut(&frame_id) else {
            return;
        };
        if node.is_evictable != evictable {
            node.is_evictable = evictable;
            if evictable {
                state.curr_size += 1;
            } else {
                state.curr_size -= 1;
            }
        }
    }

    /// Erases a frame's access record. No-op for untracked frames.
    ///
    /// Panics if the frame is tracked but not evictable; callers must only
    /// remove unpinned frames.
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        let Some(node) = state.node_store.get(&frame_id) else {
            return;
        };
        assert!(
            node.is_evictable,
            "cannot remove non-evictable frame {}",
            frame_id
        );
        state.node_store.remove(&frame_id);
        state.curr_size -= 1;
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().curr_size
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_replacer_is_empty() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.k(), 2);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_evict_earliest_among_inf() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0), AccessType::Unknown);
        replacer.record_access(FrameId::new(1), AccessType::Unknown);
        replacer.record_access(FrameId::new(2), AccessType::Unknown);

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);
        replacer.set_evictable(FrameId::new(2), true);

        assert_eq!(replacer.size(), 3);

        // All have a single access (< k), so all are +inf; the earliest
        // accessed frame goes first.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_inf_beats_finite_distance() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0), AccessType::Unknown);
        replacer.record_access(FrameId::new(0), AccessType::Unknown);
        replacer.record_access(FrameId::new(1), AccessType::Unknown);

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 1 has only one access, so its distance is +inf.
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    }

    #[test]
    fn test_largest_k_distance_wins() {
        let replacer = LruKReplacer::new(2, 10);

        for fid in 0..3u32 {
            replacer.record_access(FrameId::new(fid), AccessType::Unknown);
            replacer.record_access(FrameId::new(fid), AccessType::Unknown);
        }
        for fid in 0..3u32 {
            replacer.set_evictable(FrameId::new(fid), true);
        }

        // Frame 0's second-most-recent access is the oldest.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    }

    #[test]
    fn test_non_evictable_skipped() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0), AccessType::Unknown);
        replacer.record_access(FrameId::new(1), AccessType::Unknown);
        replacer.set_evictable(FrameId::new(1), true);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_toggle_evictable() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0), AccessType::Unknown);
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(FrameId::new(0), false);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_remove_untracked_is_noop() {
        let replacer = LruKReplacer::new(2, 10);
        replacer.remove(FrameId::new(3));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn test_remove_pinned_frame_panics() {
        let replacer = LruKReplacer::new(2, 10);
        replacer.record_access(FrameId::new(0), AccessType::Unknown);
        replacer.remove(FrameId::new(0));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_record_access_out_of_range_panics() {
        let replacer = LruKReplacer::new(2, 4);
        replacer.record_access(FrameId::new(4), AccessType::Unknown);
    }

    #[test]
    fn test_history_bounded_by_k() {
        let replacer = LruKReplacer::new(2, 10);

        for _ in 0..10 {
            replacer.record_access(FrameId::new(0), AccessType::Unknown);
        }
        replacer.record_access(FrameId::new(1), AccessType::Unknown);
        replacer.record_access(FrameId::new(1), AccessType::Unknown);

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        // Only frame 0's last two accesses count; those still predate both
        // of frame 1's, so frame 0 carries the larger k-distance.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    }
}
