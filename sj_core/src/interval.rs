/*
This file is part of the Building Aggregration Tool
Copyright (C) 2022 Novel-T

The Building Aggregration Tool is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/
use std::collections::BTreeSet;

/// Fixed span thresholds stratifying the active-interval buckets:
/// `{10, 10^2, ..., 10^8}`, plus an implicit final "infinite" bucket.
const THRESHOLDS: [i64; 8] = [10, 100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000, 100_000_000];

fn bucket_for_span(span: i64) -> usize {
    THRESHOLDS
        .iter()
        .position(|&t| span <= t)
        .unwrap_or(THRESHOLDS.len())
}

/// Stratified-by-span y-interval index: currently-active geometries'
/// y-extents, split across fixed-threshold buckets so overlap queries
/// usually touch far fewer than `O(active)` entries. Each bucket is an
/// ordered set keyed `(lo, hi, id)` so duplicate `(lo, hi)` pairs from
/// distinct geometries coexist.
pub struct IntervalIdx {
    buckets: Vec<BTreeSet<(i64, i64, u64)>>,
    /// Running maximum span ever inserted into the infinite (last) bucket;
    /// used as that bucket's dynamic threshold for the lower-bound probe.
    inf_max_span: i64,
}

impl IntervalIdx {
    pub fn new() -> Self {
        IntervalIdx {
            buckets: (0..=THRESHOLDS.len()).map(|_| BTreeSet::new()).collect(),
            inf_max_span: 0,
        }
    }

    fn threshold_for(&self, bucket: usize) -> i64 {
        if bucket < THRESHOLDS.len() {
            THRESHOLDS[bucket]
        } else {
            self.inf_max_span
        }
    }

    pub fn insert(&mut self, lo: i64, hi: i64, id: u64) {
        let span = hi - lo;
        let bucket = bucket_for_span(span);
        if bucket == THRESHOLDS.len() {
            self.inf_max_span = self.inf_max_span.max(span);
        }
        self.buckets[bucket].insert((lo, hi, id));
    }

    pub fn erase(&mut self, lo: i64, hi: i64, id: u64) {
        let span = hi - lo;
        let bucket = bucket_for_span(span);
        self.buckets[bucket].remove(&(lo, hi, id));
    }

    /// Returns the ids of all active intervals overlapping `[q_lo, q_hi]`.
    pub fn find_overlaps(&self, q_lo: i64, q_hi: i64) -> Vec<u64> {
        let mut out = Vec::new();
        for (bi, bucket) in self.buckets.iter().enumerate() {
            let t = self.threshold_for(bi);
            let probe = (q_lo - t, i64::MIN, 0u64);
            for &(lo, hi, id) in bucket.range(probe..) {
                if lo >= q_hi {
                    break;
                }
                if lo <= q_hi && hi >= q_lo {
                    out.push(id);
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.is_empty())
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).sum()
    }
}

impl Default for IntervalIdx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_overlapping_interval_across_buckets() {
        let mut idx = IntervalIdx::new();
        idx.insert(0, 5, 1); // small-span bucket
        idx.insert(0, 1_000_000_000, 2); // huge-span -> infinite bucket
        idx.insert(100, 110, 3);

        let hits = idx.find_overlaps(2, 8);
        assert!(hits.contains(&1));
        assert!(hits.contains(&2));
        assert!(!hits.contains(&3));
    }

    #[test]
    fn erase_removes_from_correct_bucket() {
        let mut idx = IntervalIdx::new();
        idx.insert(0, 5, 1);
        idx.erase(0, 5, 1);
        assert!(idx.find_overlaps(0, 5).is_empty());
        assert!(idx.is_empty());
    }

    #[test]
    fn empty_index_returns_no_candidates() {
        let idx = IntervalIdx::new();
        assert!(idx.find_overlaps(-100, 100).is_empty());
    }
}
