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
use std::sync::Mutex;

use crate::output::{OutputWriter, Relation};
use crate::refs::RefTable;

/// Per-thread (+1 aggregator slot) maps accumulating sub-geometry
/// verdicts for multi-part geometries, mirroring §4.9/§5: every worker
/// and the aggregator slot gets an independent, separately-locked
/// bucket so a worker never blocks on another worker's unrelated pair.
#[derive(Default)]
struct ThreadMaps {
    /// gid -> other gid -> sub-ids of `gid` contained in `other`.
    sub_contains: HashMap<u64, HashMap<u64, HashSet<u16>>>,
    sub_covers: HashMap<u64, HashMap<u64, HashSet<u16>>>,
    sub_equals: HashMap<u64, HashMap<u64, HashSet<u16>>>,
    /// gid -> set of gids it was ever found to intersect; unlike
    /// touches/overlaps/crosses this relation has no negative-witness set,
    /// since any sub-part pair intersecting makes the parents intersect.
    intersects: HashMap<u64, HashSet<u64>>,
    touches: HashMap<u64, HashSet<u64>>,
    overlaps: HashMap<u64, HashSet<u64>>,
    crosses: HashMap<u64, HashSet<u64>>,
    not_touches: HashMap<u64, HashSet<u64>>,
    not_overlaps: HashMap<u64, HashSet<u64>>,
    not_crosses: HashMap<u64, HashSet<u64>>,
}

/// Sub-part counts per gid, needed to decide when an aggregated cardinality
/// means "every sub-part accounted for".
pub struct SubCounts {
    counts: Mutex<HashMap<u64, u16>>,
}

impl SubCounts {
    pub fn new() -> Self {
        SubCounts { counts: Mutex::new(HashMap::new()) }
    }

    pub fn set(&self, gid: u64, count: u16) {
        self.counts.lock().unwrap().insert(gid, count);
    }

    pub fn get(&self, gid: u64) -> u16 {
        *self.counts.lock().unwrap().get(&gid).unwrap_or(&0)
    }
}

/// Concurrent relation aggregator: pairwise relations that don't need
/// cross-sub-part bookkeeping are written straight through; multi-part
/// relations are buffered here until `finalize_gid` is driven for that
/// gid by the sweeper once no further candidate can arrive for it.
pub struct Aggregator {
    threads: Vec<Mutex<ThreadMaps>>,
    pub sub_counts: SubCounts,
}

impl Aggregator {
    pub fn new(num_slots: usize) -> Self {
        Aggregator {
            threads: (0..num_slots.max(1)).map(|_| Mutex::new(ThreadMaps::default())).collect(),
            sub_counts: SubCounts::new(),
        }
    }

    fn slot(&self, t: usize) -> usize {
        t % self.threads.len()
    }

    pub fn add_contains(&self, t: usize, gid: u64, other: u64, sub_id: u16) {
        self.threads[self.slot(t)]
            .lock()
            .unwrap()
            .sub_contains
            .entry(gid)
            .or_default()
            .entry(other)
            .or_default()
            .insert(sub_id);
    }

    pub fn add_covers(&self, t: usize, gid: u64, other: u64, sub_id: u16) {
        self.threads[self.slot(t)]
            .lock()
            .unwrap()
            .sub_covers
            .entry(gid)
            .or_default()
            .entry(other)
            .or_default()
            .insert(sub_id);
    }

    pub fn add_equals(&self, t: usize, gid: u64, sub_id: u16, other: u64) {
        self.threads[self.slot(t)]
            .lock()
            .unwrap()
            .sub_equals
            .entry(gid)
            .or_default()
            .entry(other)
            .or_default()
            .insert(sub_id);
    }

    pub fn add_intersects(&self, t: usize, gid: u64, other: u64) {
        self.threads[self.slot(t)].lock().unwrap().intersects.entry(gid).or_default().insert(other);
    }
    pub fn add_touches(&self, t: usize, gid: u64, other: u64) {
        self.threads[self.slot(t)].lock().unwrap().touches.entry(gid).or_default().insert(other);
    }
    pub fn add_not_touches(&self, t: usize, gid: u64, other: u64) {
        self.threads[self.slot(t)].lock().unwrap().not_touches.entry(gid).or_default().insert(other);
    }
    pub fn add_overlaps(&self, t: usize, gid: u64, other: u64) {
        self.threads[self.slot(t)].lock().unwrap().overlaps.entry(gid).or_default().insert(other);
    }
    pub fn add_not_overlaps(&self, t: usize, gid: u64, other: u64) {
        self.threads[self.slot(t)].lock().unwrap().not_overlaps.entry(gid).or_default().insert(other);
    }
    pub fn add_crosses(&self, t: usize, gid: u64, other: u64) {
        self.threads[self.slot(t)].lock().unwrap().crosses.entry(gid).or_default().insert(other);
    }
    pub fn add_not_crosses(&self, t: usize, gid: u64, other: u64) {
        self.threads[self.slot(t)].lock().unwrap().not_crosses.entry(gid).or_default().insert(other);
    }

    /// Drains every thread's entry for `gid` and writes the finalised
    /// parent relations, per §4.9's `multiOut`. Called once per gid, when
    /// the sweeper determines no further candidate for it can arrive.
    pub fn finalize_gid(&self, gid: u64, refs: &RefTable, out: &OutputWriter) -> crate::error::Result<()> {
        let my_subs = self.sub_counts.get(gid);

        let mut contains_hits: HashMap<u64, HashSet<u16>> = HashMap::new();
        let mut covers_hits: HashMap<u64, HashSet<u16>> = HashMap::new();
        let mut equals_hits: HashMap<u64, HashSet<u16>> = HashMap::new();
        let mut intersects_hits: HashSet<u64> = HashSet::new();
        let mut touches_hits: HashSet<u64> = HashSet::new();
        let mut overlaps_hits: HashSet<u64> = HashSet::new();
        let mut crosses_hits: HashSet<u64> = HashSet::new();
        let mut not_touches_hits: HashSet<u64> = HashSet::new();
        let mut not_overlaps_hits: HashSet<u64> = HashSet::new();
        let mut not_crosses_hits: HashSet<u64> = HashSet::new();

        for slot in &self.threads {
            let mut m = slot.lock().unwrap();
            if let Some(v) = m.sub_contains.remove(&gid) {
                for (other, subs) in v {
                    contains_hits.entry(other).or_default().extend(subs);
                }
            }
            if let Some(v) = m.sub_covers.remove(&gid) {
                for (other, subs) in v {
                    covers_hits.entry(other).or_default().extend(subs);
                }
            }
            if let Some(v) = m.sub_equals.remove(&gid) {
                for (other, subs) in v {
                    equals_hits.entry(other).or_default().extend(subs);
                }
            }
            if let Some(v) = m.intersects.remove(&gid) {
                intersects_hits.extend(v);
            }
            if let Some(v) = m.touches.remove(&gid) {
                touches_hits.extend(v);
            }
            if let Some(v) = m.overlaps.remove(&gid) {
                overlaps_hits.extend(v);
            }
            if let Some(v) = m.crosses.remove(&gid) {
                crosses_hits.extend(v);
            }
            if let Some(v) = m.not_touches.remove(&gid) {
                not_touches_hits.extend(v);
            }
            if let Some(v) = m.not_overlaps.remove(&gid) {
                not_overlaps_hits.extend(v);
            }
            if let Some(v) = m.not_crosses.remove(&gid) {
                not_crosses_hits.extend(v);
            }
        }

        // `contains_hits`/`covers_hits` record that *this* gid's sub-parts
        // are contained/covered by `other`, so the relation direction at
        // output time is `other -> gid`, not `gid -> other`.
        for (other, subs) in &contains_hits {
            if subs.len() as u16 == my_subs.max(1) {
                self.write_with_refs(out, *other, gid, Relation::Contains, refs)?;
            } else if !subs.is_empty() {
                self.write_with_refs(out, *other, gid, Relation::Overlaps, refs)?;
            }
        }
        for (other, subs) in &covers_hits {
            if subs.len() as u16 == my_subs.max(1) {
                self.write_with_refs(out, *other, gid, Relation::Covers, refs)?;
                if let Some(back) = equals_hits.get(other) {
                    if back.len() as u16 == my_subs.max(1) {
                        self.write_with_refs(out, gid, *other, Relation::Equals, refs)?;
                    }
                }
            }
        }
        for other in &intersects_hits {
            self.write_with_refs(out, gid, *other, Relation::Intersects, refs)?;
        }
        for other in &touches_hits {
            if !not_touches_hits.contains(other) {
                self.write_with_refs(out, gid, *other, Relation::Touches, refs)?;
            }
        }
        for other in &overlaps_hits {
            if !not_overlaps_hits.contains(other) {
                self.write_with_refs(out, gid, *other, Relation::Overlaps, refs)?;
            }
        }
        for other in &crosses_hits {
            if !not_crosses_hits.contains(other) {
                self.write_with_refs(out, gid, *other, Relation::Crosses, refs)?;
            }
        }

        Ok(())
    }

    /// Writes `gid rel other` and replays it for every transitive
    /// referrer of `gid` (references never produce negative witnesses,
    /// so this replay is unconditional once we reach here).
    fn write_with_refs(&self, out: &OutputWriter, gid: u64, other: u64, rel: Relation, refs: &RefTable) -> crate::error::Result<()> {
        out.write(gid, other, rel)?;
        for referrer in refs.referrers_of(gid) {
            out.write(referrer, other, rel)?;
        }
        Ok(())
    }
}

/// Writes a directly-decidable pairwise relation (no aggregation needed),
/// replaying it across reference aliases in both directions.
pub fn write_direct(out: &OutputWriter, refs: &RefTable, a: u64, b: u64, rel: Relation) -> crate::error::Result<()> {
    out.write(a, b, rel)?;
    for ra in refs.referrers_of(a) {
        out.write(ra, b, rel)?;
    }
    for rb in refs.referrers_of(b) {
        out.write(a, rb, rel)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputWriter;
    use std::path::Path;

    #[test]
    fn contains_finalizes_only_when_all_subparts_seen() {
        let agg = Aggregator::new(2);
        agg.sub_counts.set(10, 2);
        agg.add_contains(0, 10, 20, 1);
        // only 1 of 2 sub-parts of gid 10 are contained in 20 so far ->
        // finalizes as 20 overlapping 10, not 20 containing 10.
        let dir = std::env::temp_dir().join(format!("sj_agg_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let out = OutputWriter::new(&dir.join("out.txt"), Default::default()).unwrap();
        let refs = RefTable::new();
        agg.finalize_gid(10, &refs, &out).unwrap();
        out.close().unwrap();

        let contents = std::fs::read_to_string(dir.join("out.txt")).unwrap();
        assert_eq!(contents, "20 overlaps 10\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn contains_finalizes_as_contains_when_all_subparts_seen() {
        let agg = Aggregator::new(1);
        agg.sub_counts.set(10, 1);
        agg.add_contains(0, 10, 20, 1);
        let dir = std::env::temp_dir().join(format!("sj_agg_test4_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let out_path = dir.join("out.txt");
        let cfg = crate::output::OutputCfg { only: Some(Relation::Contains), ..Default::default() };
        let out = OutputWriter::new(&out_path, cfg).unwrap();
        let refs = RefTable::new();
        agg.finalize_gid(10, &refs, &out).unwrap();
        out.close().unwrap();

        // 20 contains 10 (10's only sub-part is fully inside 20), so the
        // `Contains`-only filtered output carries the pair as `20 10`.
        let contents = std::fs::read_to_string(&out_path).unwrap();
        assert_eq!(contents, "20 contains 10\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn intersects_has_no_negative_witness_and_always_finalizes() {
        let agg = Aggregator::new(1);
        agg.add_intersects(0, 1, 2);
        let dir = std::env::temp_dir().join(format!("sj_agg_test5_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let out = OutputWriter::new(&dir.join("out.txt"), Default::default()).unwrap();
        let refs = RefTable::new();
        agg.finalize_gid(1, &refs, &out).unwrap();
        out.close().unwrap();
        let contents = std::fs::read_to_string(dir.join("out.txt")).unwrap();
        assert_eq!(contents, "1 intersects 2\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn negative_witness_suppresses_touches() {
        let agg = Aggregator::new(1);
        agg.add_touches(0, 1, 2);
        agg.add_not_touches(0, 1, 2);
        let dir = std::env::temp_dir().join(format!("sj_agg_test2_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let out = OutputWriter::new(&dir.join("out.txt"), Default::default()).unwrap();
        let refs = RefTable::new();
        agg.finalize_gid(1, &refs, &out).unwrap();
        out.close().unwrap();
        let contents = std::fs::read_to_string(dir.join("out.txt")).unwrap();
        assert!(contents.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
        let _ = Path::new(".");
    }
}
