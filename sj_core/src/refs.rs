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
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// A reference geometry is a gid that stands in for one or more other
/// gids without itself being fed through the sweep. Every relation found
/// for the referenced gid is replayed for each of its referrers, and
/// references never contribute negative witnesses (§4.9).
#[derive(Default)]
pub struct RefTable {
    /// referenced gid -> set of gids that alias it.
    referrers: RwLock<HashMap<u64, HashSet<u64>>>,
}

impl RefTable {
    pub fn new() -> Self {
        RefTable::default()
    }

    /// Registers `referrer` as aliasing `target`. Transitive aliasing
    /// (a referrer of a referrer) is flattened at insertion time so
    /// lookups stay O(1) per referenced gid.
    pub fn add_reference(&self, referrer: u64, target: u64) {
        let mut map = self.referrers.write().unwrap();
        let mut transitive: Vec<u64> = vec![referrer];
        if let Some(existing) = map.get(&referrer) {
            transitive.extend(existing.iter().copied());
        }
        let entry = map.entry(target).or_default();
        for r in transitive {
            entry.insert(r);
        }
    }

    pub fn referrers_of(&self, gid: u64) -> Vec<u64> {
        self.referrers
            .read()
            .unwrap()
            .get(&gid)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_reference(&self, gid: u64) -> bool {
        self.referrers.read().unwrap().values().any(|s| s.contains(&gid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_single_reference() {
        let t = RefTable::new();
        t.add_reference(100, 1);
        assert_eq!(t.referrers_of(1), vec![100]);
        assert!(t.referrers_of(2).is_empty());
    }

    #[test]
    fn no_references_means_empty_replay() {
        let t = RefTable::new();
        assert!(t.referrers_of(5).is_empty());
    }
}
