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
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::info;

/// Run-wide counters surfaced at the end of a sweep, mirroring the
/// reference codebase's end-of-run log line (parsed geometries, written
/// relations, candidate pairs considered, wall time per phase).
#[derive(Default)]
pub struct Stats {
    pub lines_parsed: AtomicU64,
    pub lines_skipped: AtomicU64,
    pub geometries_by_kind: [AtomicU64; 3],
    pub candidates_considered: AtomicU64,
    pub relations_written: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_parsed(&self) {
        self.lines_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.lines_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_candidate(&self) {
        self.candidates_considered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relation(&self) {
        self.relations_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn log_summary(&self, elapsed: Duration) {
        info!(
            "parsed {} lines ({} skipped), {} candidates, {} relations written in {:.2}s",
            self.lines_parsed.load(Ordering::Relaxed),
            self.lines_skipped.load(Ordering::Relaxed),
            self.candidates_considered.load(Ordering::Relaxed),
            self.relations_written.load(Ordering::Relaxed),
            elapsed.as_secs_f64(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let s = Stats::new();
        s.record_parsed();
        s.record_parsed();
        s.record_skipped();
        assert_eq!(s.lines_parsed.load(Ordering::Relaxed), 2);
        assert_eq!(s.lines_skipped.load(Ordering::Relaxed), 1);
    }
}
