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
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info};

use crate::aggregate::Aggregator;
use crate::cache::GeometryCache;
use crate::check::{check_area_area, check_line_area, check_line_line, check_point_area, check_point_line, check_point_point, PairVerdict};
use crate::error::Result;
use crate::event::{BoxVal, EventReader, GeomType};
use crate::interval::IntervalIdx;
use crate::output::{OutputWriter, Relation};
use crate::records::{AreaRec, GeomRecord, LineRec, PointRec, SimpleAreaRec, SimpleLineRec};
use crate::refs::RefTable;

/// Tunables for a sweep run; field names mirror the CLI surface so
/// `sj_cli` can build one directly from parsed arguments.
pub struct SweeperCfg {
    pub cache_dir: PathBuf,
    pub num_threads: usize,
    pub cache_bytes_per_thread: u64,
    pub batch_size: usize,
    pub simplification_factor: f64,
    pub use_box_ids: bool,
    pub use_surface_area: bool,
}

impl Default for SweeperCfg {
    fn default() -> Self {
        SweeperCfg {
            cache_dir: std::env::temp_dir().join("sj_cache"),
            num_threads: 1,
            cache_bytes_per_thread: 64 * 1024 * 1024,
            batch_size: 100,
            simplification_factor: 1.0,
            use_box_ids: true,
            use_surface_area: true,
        }
    }
}

/// The five disk-backed stores a sweep reads geometry payloads from,
/// keyed by the `BoxVal::val` byte offset recorded at event-build time.
pub struct Caches {
    pub points: GeometryCache<PointRec>,
    pub simple_lines: GeometryCache<SimpleLineRec>,
    pub lines: GeometryCache<LineRec>,
    pub simple_areas: GeometryCache<SimpleAreaRec>,
    pub areas: GeometryCache<AreaRec>,
}

impl Caches {
    pub fn open(dir: &std::path::Path, max_size_per_thread: usize, threads: usize, reuse: bool) -> Result<Self> {
        Ok(Caches {
            points: GeometryCache::new(dir, "points.cache", threads, max_size_per_thread, reuse)?,
            simple_lines: GeometryCache::new(dir, "simplelines.cache", threads, max_size_per_thread, reuse)?,
            lines: GeometryCache::new(dir, "lines.cache", threads, max_size_per_thread, reuse)?,
            simple_areas: GeometryCache::new(dir, "simpleareas.cache", threads, max_size_per_thread, reuse)?,
            areas: GeometryCache::new(dir, "areas.cache", threads, max_size_per_thread, reuse)?,
        })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.points.flush()?;
        self.simple_lines.flush()?;
        self.lines.flush()?;
        self.simple_areas.flush()?;
        self.areas.flush()?;
        Ok(())
    }

    fn load(&self, thread: usize, gtype: GeomType, offset: u64) -> Result<GeomRecord> {
        match gtype {
            GeomType::Point => Ok(GeomRecord::Point((*self.points.get(offset, thread)?).clone())),
            GeomType::SimpleLine => Ok(GeomRecord::SimpleLine((*self.simple_lines.get(offset, thread)?).clone())),
            GeomType::Line => Ok(GeomRecord::Line((*self.lines.get(offset, thread)?).clone())),
            GeomType::SimpleArea => Ok(GeomRecord::SimpleArea((*self.simple_areas.get(offset, thread)?).clone())),
            GeomType::Area => Ok(GeomRecord::Area((*self.areas.get(offset, thread)?).clone())),
        }
    }
}

/// A candidate pair from opposite-side (or self-join) active sets whose
/// bounding boxes overlap on the sweep axis and the perpendicular axis.
struct Candidate {
    a: BoxVal,
    b: BoxVal,
}

type Batch = Vec<Candidate>;

/// Cancellation handle a caller can flip from another thread to stop a
/// running sweep between batches.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag(Arc::new(AtomicBool::new(false)))
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Sweeper {
    cfg: SweeperCfg,
    caches: Arc<Caches>,
    refs: Arc<RefTable>,
}

impl Sweeper {
    pub fn new(cfg: SweeperCfg, caches: Caches, refs: RefTable) -> Self {
        Sweeper { cfg, caches: Arc::new(caches), refs: Arc::new(refs) }
    }

    /// Runs the x-sweep over the already-flushed, sorted event stream,
    /// dispatching candidate batches to a worker pool and finalizing
    /// multi-part relations as each gid's group goes dead.
    pub fn sweep(&self, event_reader: EventReader, out: &OutputWriter, cancel: CancelFlag) -> Result<()> {
        let aggregator = Arc::new(Aggregator::new(self.cfg.num_threads.max(1)));
        let current_x = Arc::new(AtomicI64::new(i64::MIN));

        let (tx, rx): (Sender<Batch>, Receiver<Batch>) = bounded(self.cfg.num_threads.max(1) * 2);

        let mut handles = Vec::new();
        for t in 0..self.cfg.num_threads.max(1) {
            let rx = rx.clone();
            let caches = Arc::clone(&self.caches);
            let aggregator = Arc::clone(&aggregator);
            let refs = Arc::clone(&self.refs);
            let use_box_ids = self.cfg.use_box_ids;
            let use_surface_area = self.cfg.use_surface_area;
            handles.push(std::thread::spawn(move || -> Result<()> {
                while let Ok(batch) = rx.recv() {
                    if batch.is_empty() {
                        break;
                    }
                    for cand in batch {
                        process_pair(t, &cand, &caches, &aggregator, use_box_ids, use_surface_area)?;
                    }
                }
                Ok(())
            }));
        }

        self.generate_candidates(event_reader, &tx, &current_x, &aggregator, &self.refs, out, &cancel)?;

        for _ in 0..self.cfg.num_threads.max(1) {
            let _ = tx.send(Vec::new());
        }
        drop(tx);
        for h in handles {
            h.join().expect("worker thread panicked")?;
        }

        Ok(())
    }

    /// x-sweep proper: maintains a side-0 and side-1 y-interval index of
    /// currently active geometries, emits a candidate for every active
    /// opposite-side entry an incoming `in` event overlaps, and finalizes
    /// a gid once the sweep x-coordinate passes it and no sibling sub-part
    /// remains active (the `multiOut` moment from §4.9).
    fn generate_candidates(
        &self,
        mut reader: EventReader,
        tx: &Sender<Batch>,
        current_x: &Arc<AtomicI64>,
        aggregator: &Arc<Aggregator>,
        refs: &RefTable,
        out: &OutputWriter,
        cancel: &CancelFlag,
    ) -> Result<()> {
        let mut active: [IntervalIdx; 2] = [IntervalIdx::new(), IntervalIdx::new()];
        let mut active_vals: std::collections::HashMap<u64, BoxVal> = std::collections::HashMap::new();
        // Tracks how many sub-parts of a (possibly multi-part) gid are still
        // active; a gid only finalizes once its last sub-part goes out, so a
        // MULTIPOINT/MULTIPOLYGON group isn't aggregated prematurely after
        // its first part's x-interval closes.
        let mut live_parts: std::collections::HashMap<u64, u32> = std::collections::HashMap::new();
        let mut batch: Batch = Vec::new();
        let mut dead_candidates: Vec<u64> = Vec::new();

        // Cache offsets are only unique within their own per-class store, so
        // the active-set key folds the geometry class into the high bits to
        // avoid a point and an area that happen to share a byte offset
        // colliding with each other here.
        let active_key = |ev: &BoxVal| -> u64 { ((ev.gtype as u64) << 48) | (ev.val as u32 as u64) };

        while let Some(ev) = reader.next_event()? {
            if cancel.is_cancelled() {
                break;
            }
            current_x.store(ev.val as i64, Ordering::Relaxed);

            if ev.is_multi_sentinel() {
                continue;
            }

            let side = (ev.side % 2) as usize;
            let other_side = 1 - side;
            let key = active_key(&ev);

            if !ev.out {
                *live_parts.entry(ev.id).or_insert(0) += 1;
                for other_id in active[other_side].find_overlaps(ev.lo_y as i64, ev.up_y as i64) {
                    if let Some(other) = active_vals.get(&other_id) {
                        batch.push(Candidate { a: ev, b: *other });
                        if batch.len() >= self.cfg.batch_size {
                            tx.send(std::mem::take(&mut batch)).ok();
                        }
                    }
                }
                active[side].insert(ev.lo_y as i64, ev.up_y as i64, key);
                active_vals.insert(key, ev);
            } else {
                active[side].erase(ev.lo_y as i64, ev.up_y as i64, key);
                active_vals.remove(&key);
                if let Some(count) = live_parts.get_mut(&ev.id) {
                    *count -= 1;
                    if *count == 0 {
                        live_parts.remove(&ev.id);
                        dead_candidates.push(ev.id);
                    }
                }
            }
        }

        if !batch.is_empty() {
            tx.send(batch).ok();
        }

        debug!("sweep produced {} gids eligible for finalization", dead_candidates.len());
        for gid in dead_candidates {
            aggregator.finalize_gid(gid, refs, out)?;
        }

        info!("sweep complete");
        Ok(())
    }
}

fn process_pair(
    thread: usize,
    cand: &Candidate,
    caches: &Caches,
    aggregator: &Aggregator,
    use_box_ids: bool,
    use_surface_area: bool,
) -> Result<()> {
    if !cand.a.b45.intersects(&cand.b.b45) {
        return Ok(());
    }
    let _ = use_box_ids;

    let ra = caches.load(thread, cand.a.gtype, cand.a.val as u64)?;
    let rb = caches.load(thread, cand.b.gtype, cand.b.val as u64)?;

    let verdict = classify(&ra, &rb, use_surface_area);
    record_verdict(thread, &ra, &rb, verdict, aggregator);
    Ok(())
}

/// Swaps the directional fields of a verdict computed as `check(y, x)`
/// back into `(x, y)` order, so callers never have to reason about which
/// concrete check function happened to take which argument first.
fn swap_verdict(v: PairVerdict) -> PairVerdict {
    PairVerdict {
        intersects: v.intersects,
        touches: v.touches,
        crosses: v.crosses,
        overlaps: v.overlaps,
        a_contains_b: v.b_contains_a,
        a_covers_b: v.b_covers_a,
        b_contains_a: v.a_contains_b,
        b_covers_a: v.a_covers_b,
        equals: v.equals,
    }
}

fn area_from_simple(id: u64, ring: &[I32Point]) -> AreaRec {
    AreaRec::new(id, 0, ring.to_vec(), Vec::new())
}

/// Dispatches a candidate pair to the matching exact-check routine,
/// always feeding it in the caller's `(a, b)` order so the returned
/// verdict's directional fields line up with `a`/`b` as-given.
fn classify(a: &GeomRecord, b: &GeomRecord, use_surface_area: bool) -> PairVerdict {
    use GeomRecord::*;
    match (a, b) {
        (Area(x), Area(y)) => check_area_area(x, y, use_surface_area),
        (Area(x), SimpleArea(y)) => check_area_area(x, &area_from_simple(y.id, &y.ring), use_surface_area),
        (SimpleArea(x), Area(y)) => swap_verdict(check_area_area(y, &area_from_simple(x.id, &x.ring), use_surface_area)),
        (SimpleArea(x), SimpleArea(y)) => {
            check_area_area(&area_from_simple(x.id, &x.ring), &area_from_simple(y.id, &y.ring), use_surface_area)
        }

        (Line(x), Area(y)) => swap_verdict(check_line_area(&x.points, y)),
        (Area(x), Line(y)) => check_line_area(&y.points, x),
        (SimpleLine(x), Area(y)) => swap_verdict(check_line_area(&[x.a, x.b], y)),
        (Area(x), SimpleLine(y)) => check_line_area(&[y.a, y.b], x),
        (Line(x), SimpleArea(y)) => swap_verdict(check_line_area(&x.points, &area_from_simple(y.id, &y.ring))),
        (SimpleArea(x), Line(y)) => check_line_area(&y.points, &area_from_simple(x.id, &x.ring)),
        (SimpleLine(x), SimpleArea(y)) => swap_verdict(check_line_area(&[x.a, x.b], &area_from_simple(y.id, &y.ring))),
        (SimpleArea(x), SimpleLine(y)) => check_line_area(&[y.a, y.b], &area_from_simple(x.id, &x.ring)),

        (Line(x), Line(y)) => check_line_line(&x.points, &y.points),
        (Line(x), SimpleLine(y)) => check_line_line(&x.points, &[y.a, y.b]),
        (SimpleLine(x), Line(y)) => swap_verdict(check_line_line(&y.points, &[x.a, x.b])),
        (SimpleLine(x), SimpleLine(y)) => check_line_line(&[x.a, x.b], &[y.a, y.b]),

        (Point(x), Area(y)) => check_point_area(x.geom, y),
        (Area(x), Point(y)) => swap_verdict(check_point_area(y.geom, x)),
        (Point(x), SimpleArea(y)) => check_point_area(x.geom, &area_from_simple(y.id, &y.ring)),
        (SimpleArea(x), Point(y)) => swap_verdict(check_point_area(y.geom, &area_from_simple(x.id, &x.ring))),

        (Point(x), Line(y)) => check_point_line(x.geom, &y.points),
        (Line(x), Point(y)) => swap_verdict(check_point_line(y.geom, &x.points)),
        (Point(x), SimpleLine(y)) => check_point_line(x.geom, &[y.a, y.b]),
        (SimpleLine(x), Point(y)) => swap_verdict(check_point_line(y.geom, &[x.a, x.b])),

        (Point(x), Point(y)) => check_point_point(x.geom, y.geom),
    }
}

fn record_verdict(thread: usize, a: &GeomRecord, b: &GeomRecord, v: PairVerdict, agg: &Aggregator) {
    let (ga, gb) = (a.id(), b.id());
    if ga == gb {
        return;
    }
    if v.a_contains_b {
        agg.add_contains(thread, gb, ga, b.sub_id());
    }
    if v.b_contains_a {
        agg.add_contains(thread, ga, gb, a.sub_id());
    }
    if v.a_covers_b {
        agg.add_covers(thread, gb, ga, b.sub_id());
    }
    if v.b_covers_a {
        agg.add_covers(thread, ga, gb, a.sub_id());
    }
    if v.equals {
        agg.add_equals(thread, ga, a.sub_id(), gb);
        agg.add_equals(thread, gb, b.sub_id(), ga);
    }
    if v.intersects {
        agg.add_intersects(thread, ga, gb);
        agg.add_intersects(thread, gb, ga);
    }
    if v.touches {
        agg.add_touches(thread, ga, gb);
        agg.add_touches(thread, gb, ga);
    } else {
        agg.add_not_touches(thread, ga, gb);
        agg.add_not_touches(thread, gb, ga);
    }
    if v.overlaps {
        agg.add_overlaps(thread, ga, gb);
        agg.add_overlaps(thread, gb, ga);
    } else {
        agg.add_not_overlaps(thread, ga, gb);
        agg.add_not_overlaps(thread, gb, ga);
    }
    if v.crosses {
        agg.add_crosses(thread, ga, gb);
        agg.add_crosses(thread, gb, ga);
    } else {
        agg.add_not_crosses(thread, ga, gb);
        agg.add_not_crosses(thread, gb, ga);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_round_trips() {
        let c = CancelFlag::new();
        assert!(!c.is_cancelled());
        c.cancel();
        assert!(c.is_cancelled());
    }
}
