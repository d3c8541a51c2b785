//! Memory-bounded eviction of whole GOPs.

use tracing::{debug, warn};

use super::BufferStream;
use crate::range::BufferRange;

impl BufferStream {
    /// Evict data until the stream fits its memory limit: GOPs from the
    /// front first, then from the back. The GOP under the reader's cursor is
    /// never evicted, so the limit may stay exceeded.
    pub(super) fn garbage_collect_if_needed(&mut self) {
        let total = self.total_bytes();
        if total <= self.settings.memory_limit {
            return;
        }

        let to_free = total - self.settings.memory_limit;
        let mut freed = self.free_buffers(to_free, false);
        if freed < to_free {
            freed += self.free_buffers(to_free - freed, true);
        }

        debug!(
            kind = %self.kind(),
            requested = to_free,
            freed,
            total = self.total_bytes(),
            "Garbage collection finished"
        );
        if freed < to_free {
            warn!(
                limit = self.settings.memory_limit,
                total = self.total_bytes(),
                "Could not get under memory limit without evicting the playback position"
            );
        }
    }

    /// Delete GOPs from the front (or back, with `from_back`) until at least
    /// `bytes_to_free` bytes are gone. Returns the bytes actually freed.
    ///
    /// The GOP holding the most recently appended buffer is not freed: it is
    /// moved into a range of its own so the next append can still extend it.
    fn free_buffers(&mut self, bytes_to_free: usize, from_back: bool) -> usize {
        let mut freed = 0;
        let mut relocated: Option<BufferRange> = None;
        let last_appended = self.last_appended.map(|(timestamp, _)| timestamp);

        while freed < bytes_to_free && !self.ranges.is_empty() {
            let index = if from_back { self.ranges.len() - 1 } else { 0 };

            let gop = if from_back {
                if self.ranges[index].last_gop_contains_cursor() {
                    assert_eq!(self.selected, Some(index), "cursor outside the selected range");
                    break;
                }
                self.ranges[index].delete_gop_from_back()
            } else {
                if self.ranges[index].first_gop_contains_cursor() {
                    assert_eq!(self.selected, Some(index), "cursor outside the selected range");
                    break;
                }
                self.ranges[index].delete_gop_from_front()
            };

            let holds_last_appended = last_appended.is_some()
                && gop.last().map(|b| b.timestamp()) == last_appended;
            if holds_last_appended && relocated.is_none() {
                debug!(start = %gop[0].timestamp(), "Relocating most recently appended GOP");
                relocated = Some(BufferRange::new(gop, None));
                self.append_target = None;
            } else {
                freed += gop.iter().map(|b| b.data_size()).sum::<usize>();
            }

            if self.ranges[index].is_empty() {
                debug_assert_ne!(self.selected, Some(index));
                self.remove_range_at(index);
            }
        }

        if let Some(range) = relocated {
            let index = self.add_to_ranges(range);
            self.append_target = Some(index);
            if index > 0 {
                self.merge_with_next_range_if_necessary(index - 1);
            }
            if let Some(index) = self.append_target {
                self.merge_with_next_range_if_necessary(index);
            }
        }

        freed
    }
}
