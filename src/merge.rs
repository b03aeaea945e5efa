// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
use crate::audit::AuditRecord;

// Two distinct mutable elements of one slice
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert!(a != b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// Merge every pair of compatible records in place.
///
/// This is a single pass over all ordered pairs.  The merge key (verdict,
/// source, target, class) never changes while operations accumulate, so one
/// pass leaves exactly one valid record per key holding the union of the
/// operations; the others are marked consumed.  Returns the number of records
/// that were absorbed.
pub fn merge_records(records: &mut [AuditRecord]) -> usize {
    let mut merged = 0;
    for outer in 0..records.len() {
        for inner in 0..records.len() {
            if outer == inner {
                continue;
            }
            let (a, b) = pair_mut(records, outer, inner);
            if a.absorb(b) {
                merged += 1;
            }
        }
    }
    merged
}
