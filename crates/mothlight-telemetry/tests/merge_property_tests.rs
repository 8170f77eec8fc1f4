//! Property tests for the ledger merge: sequential merges of independent
//! deltas must agree with one merge of their pointwise sum.

use std::collections::BTreeMap;

use chrono::{Local, TimeZone};
use mothlight_telemetry::ledger::merge_into_partition;
use proptest::prelude::*;

fn delta_strategy() -> impl Strategy<Value = BTreeMap<String, u64>> {
    proptest::collection::btree_map("[a-zA-Z0-9 /.;_-]{1,24}", 1u64..1_000, 0..12)
}

fn read_partition_counts(path: &std::path::Path) -> BTreeMap<String, u64> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    content
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (quoted, count) = line.rsplit_once(',').expect("record has a delimiter");
            let signature = quoted
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .expect("signature is quoted");
            (signature.to_string(), count.parse().expect("count parses"))
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sequential_merges_equal_merged_sum(
        first in delta_strategy(),
        second in delta_strategy(),
    ) {
        let stamp = Local.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();

        // Two sequential merges into one partition.
        let sequential = tempfile::tempdir().unwrap();
        if !first.is_empty() {
            merge_into_partition(sequential.path(), &stamp, &first).unwrap();
        }
        if !second.is_empty() {
            merge_into_partition(sequential.path(), &stamp, &second).unwrap();
        }

        // One merge of the pointwise sum.
        let mut combined = first.clone();
        for (signature, count) in &second {
            *combined.entry(signature.clone()).or_insert(0) += count;
        }
        let summed = tempfile::tempdir().unwrap();
        if !combined.is_empty() {
            merge_into_partition(summed.path(), &stamp, &combined).unwrap();
        }

        let key = mothlight_telemetry::PartitionKey::for_timestamp(&stamp);
        let sequential_counts = read_partition_counts(&key.partition_path(sequential.path()));
        let summed_counts = read_partition_counts(&key.partition_path(summed.path()));
        prop_assert_eq!(sequential_counts, combined.clone());
        prop_assert_eq!(summed_counts, combined);
    }

    #[test]
    fn merged_partitions_never_duplicate_signatures(
        first in delta_strategy(),
        second in delta_strategy(),
    ) {
        let stamp = Local.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
        let dir = tempfile::tempdir().unwrap();

        for delta in [&first, &second] {
            if !delta.is_empty() {
                merge_into_partition(dir.path(), &stamp, delta).unwrap();
            }
        }

        let key = mothlight_telemetry::PartitionKey::for_timestamp(&stamp);
        let path = key.partition_path(dir.path());
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        let signatures: Vec<&str> = content
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| line.rsplit_once(',').unwrap().0)
            .collect();
        let mut deduped = signatures.clone();
        deduped.sort_unstable();
        deduped.dedup();
        prop_assert_eq!(signatures.len(), deduped.len());
    }
}
