use crate::CmdId;
use std::fmt;

/// Half-open interval `[start, end)` of command ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CmdIdRange {
    pub start: CmdId,
    pub end: CmdId,
}

impl CmdIdRange {
    /// # Panics
    /// Panics when `start > end`; an inverted range is a programming error.
    pub fn new(start: CmdId, end: CmdId) -> Self {
        assert!(start <= end, "inverted CmdIdRange {start}..{end}");
        CmdIdRange { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.value() - self.start.value()
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, id: CmdId) -> bool {
        self.start <= id && id < self.end
    }

    pub fn first(&self) -> CmdId {
        self.start
    }

    /// Last id in the range. Meaningless for empty ranges.
    pub fn last(&self) -> CmdId {
        CmdId::new(self.end.value() - 1)
    }
}

impl fmt::Debug for CmdIdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{})", self.start, self.end)
    }
}

/// Byte interval `[base, base + size)` in the captured address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemoryRange {
    pub base: u64,
    pub size: u64,
}

impl MemoryRange {
    /// # Panics
    /// Debug-asserts that `base + size` does not wrap the address space;
    /// untrusted input goes through [`MemoryRange::checked`] instead.
    pub fn new(base: u64, size: u64) -> Self {
        debug_assert!(
            base.checked_add(size).is_some(),
            "MemoryRange wraps: base {base:#x} size {size:#x}"
        );
        MemoryRange { base, size }
    }

    /// Validating constructor: `None` when the interval would wrap the
    /// address space.
    pub fn checked(base: u64, size: u64) -> Option<Self> {
        base.checked_add(size)?;
        Some(MemoryRange { base, size })
    }

    /// One past the last byte. Cannot overflow for ranges built through
    /// the constructors.
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    pub fn overlaps(&self, other: &MemoryRange) -> bool {
        self.base < other.end() && other.base < self.end()
    }

    /// Overlapping or directly adjacent, i.e. mergeable into one interval.
    pub fn touches(&self, other: &MemoryRange) -> bool {
        self.base <= other.end() && other.base <= self.end()
    }
}

/// Sorted, coalesced list of memory ranges.
///
/// Captures accumulate every observation's range here so the observed
/// footprint of the whole stream stays small and queryable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryRangeList {
    ranges: Vec<MemoryRange>,
}

impl MemoryRangeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `range`, merging it with every range it overlaps or abuts.
    pub fn add(&mut self, range: MemoryRange) {
        if range.size == 0 {
            return;
        }
        // Find the insertion window of ranges that touch the new one.
        let lo = self.ranges.partition_point(|r| r.end() < range.base);
        let hi = self.ranges.partition_point(|r| r.base <= range.end());
        if lo == hi {
            self.ranges.insert(lo, range);
            return;
        }
        let base = self.ranges[lo].base.min(range.base);
        let end = self.ranges[hi - 1].end().max(range.end());
        self.ranges
            .splice(lo..hi, std::iter::once(MemoryRange::new(base, end - base)));
    }

    pub fn ranges(&self) -> &[MemoryRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u64) -> CmdId {
        CmdId::new(v)
    }

    #[test]
    fn cmd_range_basics() {
        let r = CmdIdRange::new(id(10), id(20));
        assert_eq!(r.len(), 10);
        assert!(r.contains(id(10)));
        assert!(r.contains(id(19)));
        assert!(!r.contains(id(20)));
        assert_eq!(r.first(), id(10));
        assert_eq!(r.last(), id(19));
    }

    #[test]
    #[should_panic(expected = "inverted")]
    fn inverted_cmd_range_panics() {
        let _ = CmdIdRange::new(id(5), id(4));
    }

    #[test]
    fn range_list_merges_overlap_and_adjacency() {
        let mut list = MemoryRangeList::new();
        list.add(MemoryRange::new(0, 10));
        list.add(MemoryRange::new(20, 10));
        assert_eq!(list.ranges().len(), 2);
        // Adjacent on the left, overlapping on the right: collapses all.
        list.add(MemoryRange::new(10, 15));
        assert_eq!(list.ranges(), &[MemoryRange::new(0, 30)]);
    }

    #[test]
    fn range_list_keeps_sorted_order() {
        let mut list = MemoryRangeList::new();
        list.add(MemoryRange::new(100, 1));
        list.add(MemoryRange::new(50, 1));
        list.add(MemoryRange::new(75, 1));
        let bases: Vec<u64> = list.ranges().iter().map(|r| r.base).collect();
        assert_eq!(bases, vec![50, 75, 100]);
    }

    #[test]
    fn checked_rejects_wrapping_intervals() {
        assert_eq!(MemoryRange::checked(u64::MAX, 2), None);
        assert_eq!(MemoryRange::checked(1, u64::MAX), None);
        assert_eq!(
            MemoryRange::checked(1, u64::MAX - 1),
            Some(MemoryRange::new(1, u64::MAX - 1))
        );
        assert_eq!(MemoryRange::checked(0, 0), Some(MemoryRange::new(0, 0)));
    }

    #[test]
    fn range_list_ignores_empty_ranges() {
        let mut list = MemoryRangeList::new();
        list.add(MemoryRange::new(42, 0));
        assert!(list.is_empty());
    }
}
