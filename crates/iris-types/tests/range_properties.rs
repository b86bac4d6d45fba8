use iris_types::{MemoryRange, MemoryRangeList, SubCmdIdx, SubCmdIdxTrie};
use proptest::prelude::*;

proptest! {
    #[test]
    fn merged_list_is_sorted_and_disjoint(
        ranges in prop::collection::vec((0u64..10_000, 1u64..256), 0..64),
    ) {
        let mut list = MemoryRangeList::new();
        for (base, size) in &ranges {
            list.add(MemoryRange::new(*base, *size));
        }
        for pair in list.ranges().windows(2) {
            // Strictly separated: a gap of at least one byte, otherwise
            // they would have been coalesced.
            prop_assert!(pair[0].end() < pair[1].base);
        }
    }

    #[test]
    fn merged_list_covers_every_input_byte(
        ranges in prop::collection::vec((0u64..10_000, 1u64..256), 1..32),
    ) {
        let mut list = MemoryRangeList::new();
        for (base, size) in &ranges {
            list.add(MemoryRange::new(*base, *size));
        }
        for (base, size) in &ranges {
            let covered = list
                .ranges()
                .iter()
                .any(|r| r.base <= *base && base + size <= r.end());
            prop_assert!(covered, "input [{}, {}) not covered", base, base + size);
        }
    }

    #[test]
    fn insertion_order_does_not_matter(
        ranges in prop::collection::vec((0u64..1_000, 1u64..64), 1..16),
    ) {
        let mut forward = MemoryRangeList::new();
        for (base, size) in &ranges {
            forward.add(MemoryRange::new(*base, *size));
        }
        let mut backward = MemoryRangeList::new();
        for (base, size) in ranges.iter().rev() {
            backward.add(MemoryRange::new(*base, *size));
        }
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn trie_returns_last_value_set(
        keys in prop::collection::vec(prop::collection::vec(0u64..8, 1..5), 1..32),
    ) {
        let mut trie = SubCmdIdxTrie::new();
        // Later writes to the same key win.
        for (i, key) in keys.iter().enumerate() {
            trie.set(&SubCmdIdx::new(key.clone()), i);
        }
        for (i, key) in keys.iter().enumerate() {
            let last = keys.iter().rposition(|k| k == key).unwrap();
            let got = trie.value(&SubCmdIdx::new(key.clone())).copied();
            prop_assert_eq!(got, Some(last), "key {:?} set at {}", key, i);
        }
    }
}
