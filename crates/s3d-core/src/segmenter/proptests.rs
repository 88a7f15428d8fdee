//! Property-based tests for partition coverage.

use proptest::prelude::*;

use super::{partition, ranges};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Ranges start at 0, end at total_size, and each starts where the previous ended.
    #[test]
    fn prop_partition_is_contiguous(total in 0u64..1_000_000, chunk in 1u64..100_000) {
        let p = partition(total, chunk).unwrap();
        let mut cursor = 0u64;
        for r in p.iter() {
            prop_assert_eq!(r.start, cursor);
            prop_assert!(r.start < r.end);
            prop_assert!(r.len() <= chunk);
            cursor = r.end;
        }
        prop_assert_eq!(cursor, total);
    }

    /// Lengths sum to the object size and only the last range may be short.
    #[test]
    fn prop_partition_lengths(total in 0u64..1_000_000, chunk in 1u64..100_000) {
        let p = partition(total, chunk).unwrap();
        let sum: u64 = p.iter().map(|r| r.len()).sum();
        prop_assert_eq!(sum, total);
        prop_assert_eq!(p.is_empty(), total == 0);
        if p.len() > 1 {
            for r in &p[..p.len() - 1] {
                prop_assert_eq!(r.len(), chunk);
            }
        }
        prop_assert_eq!(p.len() as u64, total.div_ceil(chunk));
    }

    /// Every byte offset is covered by exactly one range.
    #[test]
    fn prop_partition_covers_each_offset_once(total in 1u64..5_000, chunk in 1u64..700, probe in 0u64..5_000) {
        let offset = probe % total;
        let p = partition(total, chunk).unwrap();
        let hits = p.iter().filter(|r| r.contains(offset)).count();
        prop_assert_eq!(hits, 1);
    }

    /// Same inputs give the same partition, and the lazy form agrees with it.
    #[test]
    fn prop_partition_is_deterministic(total in 0u64..1_000_000, chunk in 1u64..100_000) {
        let a = partition(total, chunk).unwrap();
        let b = partition(total, chunk).unwrap();
        prop_assert_eq!(&a, &b);
        let lazy: Vec<_> = ranges(total, chunk).unwrap().collect();
        prop_assert_eq!(&a[..], &lazy[..]);
    }
}
