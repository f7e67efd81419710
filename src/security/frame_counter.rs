//! Group key frame counters (GTK and LGTK lineages)

use std::fmt;

use zeroize::Zeroize;

use super::{GTK_LEN, GTK_NUM};

/// Frame counter state captured for one group key slot
#[derive(Clone, PartialEq, Eq)]
pub struct FrameCounterEntry {
    /// Group key the counter belongs to
    pub gtk: [u8; GTK_LEN],
    /// Outgoing frame counter
    pub frame_counter: u32,
    /// Frame counter value at the last persist, used to decide the next one
    pub max_frame_counter_chg: u32,
}

impl Drop for FrameCounterEntry {
    fn drop(&mut self) {
        self.gtk.zeroize();
    }
}

impl fmt::Debug for FrameCounterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCounterEntry")
            .field("gtk", &"<redacted>")
            .field("frame_counter", &self.frame_counter)
            .field("max_frame_counter_chg", &self.max_frame_counter_chg)
            .finish()
    }
}

/// Fixed set of `GTK_NUM` frame counter slots
///
/// The slot count is part of the persisted format, so this is a fixed array
/// rather than a growable collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameCounters {
    slots: [Option<FrameCounterEntry>; GTK_NUM],
}

impl FrameCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot at `index`, `None` when out of range or empty
    pub fn slot(&self, index: usize) -> Option<&FrameCounterEntry> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Store counters for a slot. Out-of-range indexes are ignored.
    pub fn set(&mut self, index: usize, entry: FrameCounterEntry) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(entry);
        }
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = None;
        }
    }

    pub fn slots(&self) -> &[Option<FrameCounterEntry>; GTK_NUM] {
        &self.slots
    }

    pub(crate) fn replace_slots(&mut self, slots: [Option<FrameCounterEntry>; GTK_NUM]) {
        self.slots = slots;
    }

    /// Number of slots holding a key
    pub fn present(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Move every present frame counter forward by `margin` (saturating)
    ///
    /// Applied after a restore so frames sent before an ungraceful shutdown
    /// are never re-numbered.
    pub fn advance(&mut self, margin: u32) {
        for entry in self.slots.iter_mut().flatten() {
            entry.frame_counter = entry.frame_counter.saturating_add(margin);
            entry.max_frame_counter_chg = entry.frame_counter;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(counter: u32) -> FrameCounterEntry {
        FrameCounterEntry {
            gtk: [0x5A; GTK_LEN],
            frame_counter: counter,
            max_frame_counter_chg: counter,
        }
    }

    #[test]
    fn test_set_and_clear_slot() {
        let mut counters = FrameCounters::new();
        counters.set(1, entry(10));
        assert_eq!(counters.present(), 1);
        assert_eq!(counters.slot(1).map(|e| e.frame_counter), Some(10));

        counters.clear(1);
        assert!(counters.slot(1).is_none());
    }

    #[test]
    fn test_out_of_range_ignored() {
        let mut counters = FrameCounters::new();
        counters.set(GTK_NUM, entry(1));
        assert_eq!(counters.present(), 0);
        assert!(counters.slot(GTK_NUM).is_none());
    }

    #[test]
    fn test_advance_saturates_and_skips_absent() {
        let mut counters = FrameCounters::new();
        counters.set(0, entry(100));
        counters.set(3, entry(u32::MAX - 5));

        counters.advance(1000);

        assert_eq!(counters.slot(0).map(|e| e.frame_counter), Some(1100));
        assert_eq!(counters.slot(0).map(|e| e.max_frame_counter_chg), Some(1100));
        assert_eq!(counters.slot(3).map(|e| e.frame_counter), Some(u32::MAX));
        assert!(counters.slot(1).is_none());
    }
}
