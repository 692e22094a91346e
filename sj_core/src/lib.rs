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
pub mod aggregate;
pub mod boxids;
pub mod cache;
pub mod check;
pub mod error;
pub mod event;
pub mod geo;
pub mod innerouter;
pub mod interval;
pub mod output;
pub mod records;
pub mod refs;
pub mod stats;
pub mod sweeper;
pub mod wkt;

pub use error::{Result, SjError};
pub use output::{OutputCfg, OutputWriter, Relation};
pub use refs::RefTable;
pub use sweeper::{CancelFlag, Caches, Sweeper, SweeperCfg};

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::warn;

use crate::boxids::compute_box_ids;
use crate::event::{BoxVal, EventStore, GeomType};
use crate::geo::{DiagBox, I32Box};
use crate::innerouter::simplified_poly;
use crate::records::{AreaRec, LineRec, PointRec, SimpleAreaRec, SimpleLineRec};
use crate::stats::Stats;
use crate::wkt::{parse_line, InputLine, ParsedGeom};

/// Ties the whole pipeline together: reads one or more WKT input files,
/// builds geometry cache records and sweep events, runs the sweep, and
/// writes DE-9IM relations to `out`. This is the entry point `sj_cli`
/// drives; library consumers wanting finer control can use `sweeper`,
/// `event`, and `cache` directly instead.
pub struct Engine {
    cfg: SweeperCfg,
    next_internal_id: AtomicU64,
}

impl Engine {
    pub fn new(cfg: SweeperCfg) -> Self {
        Engine { cfg, next_internal_id: AtomicU64::new(1) }
    }

    /// Runs a full self-join (single input) or bilateral join (two inputs,
    /// `side` 0 and 1) and writes every discovered relation to `out`.
    pub fn run(&self, inputs: &[(u8, &Path)], out: &OutputWriter) -> Result<()> {
        let start = Instant::now();
        let stats = Stats::new();
        let refs = RefTable::new();

        std::fs::create_dir_all(&self.cfg.cache_dir).map_err(|e| SjError::CacheIO(e.to_string()))?;
        let mut caches = Caches::open(&self.cfg.cache_dir, self.cfg.cache_bytes_per_thread as usize, self.cfg.num_threads.max(1), false)?;
        let mut events = EventStore::new(&self.cfg.cache_dir);

        for (side, path) in inputs {
            self.ingest_file(*side, path, &mut caches, &mut events, &refs, &stats)?;
        }

        caches.flush()?;
        events.flush()?;

        let sweeper = Sweeper::new(
            SweeperCfg {
                cache_dir: self.cfg.cache_dir.clone(),
                num_threads: self.cfg.num_threads,
                cache_bytes_per_thread: self.cfg.cache_bytes_per_thread,
                batch_size: self.cfg.batch_size,
                simplification_factor: self.cfg.simplification_factor,
                use_box_ids: self.cfg.use_box_ids,
                use_surface_area: self.cfg.use_surface_area,
            },
            caches,
            refs,
        );

        let reader = events.reader()?;
        sweeper.sweep(reader, out, CancelFlag::new())?;

        stats.log_summary(start.elapsed());
        Ok(())
    }

    fn ingest_file(
        &self,
        side: u8,
        path: &Path,
        caches: &mut Caches,
        events: &mut EventStore,
        refs: &RefTable,
        stats: &Stats,
    ) -> Result<()> {
        let file = std::fs::File::open(path).map_err(|e| SjError::ParseError(format!("{}: {e}", path.display())))?;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| SjError::ParseError(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(InputLine::Reference { id, targets, .. }) => {
                    for target in targets {
                        refs.add_reference(id, target);
                    }
                    stats.record_parsed();
                }
                Ok(InputLine::Geometry { id, side: parsed_side, geom }) => {
                    self.ingest_geometry(id, parsed_side.max(side), geom, caches, events)?;
                    stats.record_parsed();
                }
                Err(e) => {
                    warn!("skipping unparsable line in {}: {e}", path.display());
                    stats.record_skipped();
                }
            }
        }
        Ok(())
    }

    fn ingest_geometry(&self, id: u64, side: u8, geom: ParsedGeom, caches: &mut Caches, events: &mut EventStore) -> Result<()> {
        match geom {
            ParsedGeom::Point(p) => {
                let rec = PointRec { id, sub_id: 0, geom: p };
                let offset = caches.points.add(&rec)?;
                let diag = DiagBox::empty().extend(p);
                events.add(BoxVal {
                    id,
                    lo_y: p.y,
                    up_y: p.y,
                    val: offset as i32,
                    out: false,
                    gtype: GeomType::Point,
                    area_or_len: 0.0,
                    b45: diag,
                    side,
                })?;
                events.add(BoxVal {
                    id,
                    lo_y: p.y,
                    up_y: p.y,
                    val: offset as i32,
                    out: true,
                    gtype: GeomType::Point,
                    area_or_len: 0.0,
                    b45: diag,
                    side,
                })?;
            }
            ParsedGeom::LineString(pts) => self.ingest_line(id, 0, pts, caches, events)?,
            ParsedGeom::Polygon { outer, inners } => self.ingest_area(id, 0, outer, inners, caches, events)?,
            ParsedGeom::MultiPoint(pts) => {
                for (i, p) in pts.into_iter().enumerate() {
                    let rec = PointRec { id, sub_id: (i + 1) as u16, geom: p };
                    let offset = caches.points.add(&rec)?;
                    let diag = DiagBox::empty().extend(p);
                    for out in [false, true] {
                        events.add(BoxVal {
                            id,
                            lo_y: p.y,
                            up_y: p.y,
                            val: offset as i32,
                            out,
                            gtype: GeomType::Point,
                            area_or_len: 0.0,
                            b45: diag,
                            side,
                        })?;
                    }
                }
            }
            ParsedGeom::MultiLineString(lines) => {
                for (i, pts) in lines.into_iter().enumerate() {
                    self.ingest_line(id, (i + 1) as u16, pts, caches, events)?;
                }
            }
            ParsedGeom::MultiPolygon(polys) => {
                for (i, (outer, inners)) in polys.into_iter().enumerate() {
                    self.ingest_area(id, (i + 1) as u16, outer, inners, caches, events)?;
                }
            }
            ParsedGeom::GeometryCollection(parts) => {
                for part in parts {
                    self.ingest_geometry(id, side, part, caches, events)?;
                }
            }
        }
        Ok(())
    }

    fn ingest_line(&self, id: u64, sub_id: u16, points: Vec<crate::geo::I32Point>, caches: &mut Caches, events: &mut EventStore) -> Result<()> {
        if points.len() < 2 {
            return Err(SjError::InvalidGeometry(format!("line {id} has fewer than 2 points")));
        }
        let mut bbox = I32Box::default();
        let mut diag = DiagBox::empty();
        for p in &points {
            bbox = bbox.extend(*p);
            diag = diag.extend(*p);
        }
        let length = crate::geo::line_length(&points);

        if points.len() == 2 {
            let rec = SimpleLineRec { id, a: points[0], b: points[1] };
            let offset = caches.simple_lines.add(&rec)?;
            self.emit_bbox_events(id, offset, GeomType::SimpleLine, length, &bbox, diag, 0, events)?;
            return Ok(());
        }

        let box_ids = if self.cfg.use_box_ids { compute_box_ids(&points, &bbox, true) } else { Default::default() };
        let rec = LineRec { id, sub_id, points, bbox, length, box_ids };
        let offset = caches.lines.add(&rec)?;
        self.emit_bbox_events(id, offset, GeomType::Line, length, &bbox, diag, 0, events)
    }

    fn ingest_area(
        &self,
        id: u64,
        sub_id: u16,
        outer: Vec<crate::geo::I32Point>,
        inners: Vec<Vec<crate::geo::I32Point>>,
        caches: &mut Caches,
        events: &mut EventStore,
    ) -> Result<()> {
        if outer.len() < 4 {
            return Err(SjError::InvalidGeometry(format!("polygon {id} outer ring has fewer than 4 points")));
        }

        if inners.is_empty() && self.cfg.simplification_factor <= 0.0 {
            let mut bbox = I32Box::default();
            let mut diag = DiagBox::empty();
            for p in &outer {
                bbox = bbox.extend(*p);
                diag = diag.extend(*p);
            }
            let area = crate::geo::ring_area(&outer);
            let rec = SimpleAreaRec { id, ring: outer };
            let offset = caches.simple_areas.add(&rec)?;
            return self.emit_bbox_events(id, offset, GeomType::SimpleArea, area, &bbox, diag, 0, events);
        }

        let mut rec = AreaRec::new(id, sub_id, outer, inners);
        if self.cfg.use_box_ids {
            rec.box_ids = compute_box_ids(&rec.outer, &rec.bbox, false);
        }
        if self.cfg.simplification_factor > 0.0 {
            let inner_pts: Vec<Vec<crate::geo::I32Point>> = rec.inners.iter().map(|r| r.points.clone()).collect();
            if let Some(simplified) = simplified_poly(crate::innerouter::Mode::Outer, &rec.outer, &inner_pts, self.cfg.simplification_factor) {
                rec.outer_simplified = Some(simplified.into());
            }
            if let Some(simplified) = simplified_poly(crate::innerouter::Mode::Inner, &rec.outer, &inner_pts, self.cfg.simplification_factor) {
                rec.inner_simplified = Some(simplified.into());
            }
        }
        let diag = rec.outer.iter().fold(DiagBox::empty(), |d, p| d.extend(*p));
        rec.diag_box = Some(diag);
        let area = rec.area;
        let bbox = rec.bbox;
        let offset = caches.areas.add(&rec)?;
        self.emit_bbox_events(id, offset, GeomType::Area, area, &bbox, diag, 0, events)
    }

    fn emit_bbox_events(
        &self,
        id: u64,
        offset: u64,
        gtype: GeomType,
        area_or_len: f64,
        bbox: &I32Box,
        diag: DiagBox,
        side: u8,
        events: &mut EventStore,
    ) -> Result<()> {
        let b45 = diag;
        events.add(BoxVal { id, lo_y: bbox.ll.y, up_y: bbox.ur.y, val: offset as i32, out: false, gtype, area_or_len, b45, side })?;
        events.add(BoxVal { id, lo_y: bbox.ll.y, up_y: bbox.ur.y, val: offset as i32, out: true, gtype, area_or_len, b45, side })?;
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.next_internal_id.load(Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_runs_end_to_end_self_join() {
        let dir = std::env::temp_dir().join(format!("sj_engine_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input_path = dir.join("in.tsv");
        std::fs::write(
            &input_path,
            "1\t0\tPOLYGON ((0 0, 100 0, 100 100, 0 100, 0 0))\n2\t0\tPOINT (50 50)\n",
        )
        .unwrap();

        let cfg = SweeperCfg {
            cache_dir: dir.join("cache"),
            num_threads: 1,
            ..Default::default()
        };
        let engine = Engine::new(cfg);
        let out_path = dir.join("out.txt");
        let out = OutputWriter::new(&out_path, OutputCfg::default()).unwrap();
        engine.run(&[(0, &input_path)], &out).unwrap();
        out.close().unwrap();

        let contents = std::fs::read_to_string(&out_path).unwrap();
        assert!(contents.lines().any(|l| {
            let tokens: Vec<&str> = l.split_whitespace().collect();
            matches!(tokens.as_slice(), [a, .., b] if (*a == "1" && *b == "2") || (*a == "2" && *b == "1"))
        }));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
