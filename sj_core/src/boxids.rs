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
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::geo::{segments_intersect, I32Box, I32Point, PREC, WORLD_EXTENT};

/// Uniform grid resolution over the projected Mercator world.
pub const GRID_SIZE: i64 = 45_000;

/// Maximum run length storable in a single packed entry.
pub const MAX_RUN_LEN: u8 = 254;

fn cell_size() -> f64 {
    (2.0 * WORLD_EXTENT * PREC) / GRID_SIZE as f64
}

/// Maps a quantised point to its `(col, row)` cell coordinate, clamped to
/// the grid.
pub fn world_to_cell(p: I32Point) -> (i64, i64) {
    let cs = cell_size();
    let origin = -WORLD_EXTENT * PREC;
    let col = (((p.x as f64) - origin) / cs).floor() as i64;
    let row = (((p.y as f64) - origin) / cs).floor() as i64;
    (col.clamp(0, GRID_SIZE - 1), row.clamp(0, GRID_SIZE - 1))
}

fn cell_box(col: i64, row: i64, w: i64, h: i64) -> I32Box {
    let cs = cell_size();
    let origin = -WORLD_EXTENT * PREC;
    let ll = I32Point::new(
        (origin + col as f64 * cs).round() as i32,
        (origin + row as f64 * cs).round() as i32,
    );
    let ur = I32Point::new(
        (origin + (col + w) as f64 * cs).round() as i32,
        (origin + (row + h) as f64 * cs).round() as i32,
    );
    I32Box::new(ll, ur)
}

fn cell_id(col: i64, row: i64) -> i64 {
    // 1-based so a signed id never collapses positive/negative zero.
    row * GRID_SIZE + col + 1
}

/// A single run of consecutive, same-sign cell ids. Positive `id` means
/// every cell in the run is fully covered by the geometry; negative means
/// only intersected. `run_len` is the number of *additional* cells beyond
/// the first, capped at `MAX_RUN_LEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxIdRun {
    pub id: i64,
    pub run_len: u8,
}

/// The packed cover list for one geometry. `count` is the sentinel stored
/// conceptually as `boxIds[0].first`: the total number of cells the list
/// describes (`= sum(run.run_len + 1)`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxIdList {
    pub count: u64,
    pub runs: Vec<BoxIdRun>,
}

impl BoxIdList {
    pub fn total_cells(&self) -> u64 {
        self.runs.iter().map(|r| r.run_len as u64 + 1).sum()
    }
}

/// Weak order used by the galloping intersection search: compares only by
/// `abs(id)`, so a positive and a negative entry at the same cell compare
/// equal. Preserved exactly as an open design decision from the reference
/// implementation (see `SPEC_FULL.md` / `DESIGN.md`): do not "fix" this
/// into a total order, the galloping search in `box_id_isect` depends on
/// the weak equivalence.
pub fn box_id_cmp(a: &BoxIdRun, b: &BoxIdRun) -> Ordering {
    a.id.abs().cmp(&b.id.abs())
}

/// What a tile is to a geometry: used while recursively subdividing the
/// grid in `compute_box_ids`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileRel {
    Disjoint,
    Intersects,
    Covers,
}

pub fn point_in_ring(ring: &[I32Point], p: I32Point) -> bool {
    let mut inside = false;
    for w in ring.windows(2) {
        let (a, b) = (w[0], w[1]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_at_y = a.x as f64
                + (p.y as f64 - a.y as f64) * (b.x as f64 - a.x as f64) / (b.y as f64 - a.y as f64);
            if (p.x as f64) < x_at_y {
                inside = !inside;
            }
        }
    }
    inside
}

fn tile_rel_ring(tile: I32Box, ring: &[I32Point], ring_bbox: &I32Box) -> TileRel {
    if !tile.intersects(ring_bbox) {
        return TileRel::Disjoint;
    }
    let corners = [
        tile.ll,
        tile.ur,
        I32Point::new(tile.ll.x, tile.ur.y),
        I32Point::new(tile.ur.x, tile.ll.y),
    ];
    let edges: [(I32Point, I32Point); 4] = [
        (corners[0], corners[3]),
        (corners[3], corners[1]),
        (corners[1], corners[2]),
        (corners[2], corners[0]),
    ];
    for w in ring.windows(2) {
        for e in edges.iter() {
            if segments_intersect(w[0], w[1], e.0, e.1) {
                return TileRel::Intersects;
            }
        }
    }
    if point_in_ring(ring, corners[0]) {
        TileRel::Covers
    } else {
        TileRel::Disjoint
    }
}

/// Recursively subdivides the grid (starting from the geometry's
/// cell-aligned bbox) and appends one signed id per leaf cell that is not
/// disjoint, in increasing `(row, col)` order. `is_line` geometries can
/// never fully cover a tile, so only negative (intersects-only) leaves are
/// ever emitted for them.
fn subdivide(
    col0: i64,
    row0: i64,
    w: i64,
    h: i64,
    ring: &[I32Point],
    ring_bbox: &I32Box,
    is_line: bool,
    out: &mut Vec<i64>,
) {
    if w <= 0 || h <= 0 {
        return;
    }
    let tile = cell_box(col0, row0, w, h);
    let rel = tile_rel_ring(tile, ring, ring_bbox);

    match rel {
        TileRel::Disjoint => {}
        TileRel::Covers if !is_line => {
            for r in row0..row0 + h {
                for c in col0..col0 + w {
                    out.push(cell_id(c, r));
                }
            }
        }
        TileRel::Covers | TileRel::Intersects => {
            if w == 1 && h == 1 {
                out.push(-cell_id(col0, row0));
            } else {
                let hw = (w + 1) / 2;
                let hh = (h + 1) / 2;
                subdivide(col0, row0, hw, hh, ring, ring_bbox, is_line, out);
                if hw < w {
                    subdivide(col0 + hw, row0, w - hw, hh, ring, ring_bbox, is_line, out);
                }
                if hh < h {
                    subdivide(col0, row0 + hh, hw, h - hh, ring, ring_bbox, is_line, out);
                }
                if hw < w && hh < h {
                    subdivide(col0 + hw, row0 + hh, w - hw, h - hh, ring, ring_bbox, is_line, out);
                }
            }
        }
    }
}

/// Computes the raw (unpacked) signed cell id list for a closed ring
/// (area geometry) or an open line.
pub fn compute_box_ids(points: &[I32Point], bbox: &I32Box, is_line: bool) -> BoxIdList {
    if bbox.is_null() {
        return BoxIdList::default();
    }
    let (c0, r0) = world_to_cell(bbox.ll);
    let (c1, r1) = world_to_cell(bbox.ur);
    let mut raw = Vec::new();
    subdivide(c0, r0, c1 - c0 + 1, r1 - r0 + 1, points, bbox, is_line, &mut raw);
    pack_box_ids(raw)
}

/// Run-length merges adjacent same-sign singleton ids into runs, capping
/// each run at `MAX_RUN_LEN` additional cells, and prepends the sentinel
/// cell count.
pub fn pack_box_ids(mut raw: Vec<i64>) -> BoxIdList {
    raw.sort_by_key(|id| id.abs());
    let count = raw.len() as u64;
    let mut runs: Vec<BoxIdRun> = Vec::new();

    for id in raw {
        if let Some(last) = runs.last_mut() {
            let same_sign = (last.id > 0) == (id > 0);
            let contiguous = id.abs() == last.id.abs() + last.run_len as i64 + 1;
            if same_sign && contiguous && last.run_len < MAX_RUN_LEN {
                last.run_len += 1;
                continue;
            }
        }
        runs.push(BoxIdRun { id, run_len: 0 });
    }

    BoxIdList { count, runs }
}

/// Galloping intersection of two packed cover lists. Returns
/// `(fully_contained, partially_contained)`: the number of `a`'s cells for
/// which `b` has, respectively, a positive or negative entry at the same
/// cell. Relies on the weak `box_id_cmp` ordering (entries compare equal
/// across sign at the same `abs(id)`).
pub fn box_id_isect(a: &BoxIdList, b: &BoxIdList) -> (u64, u64) {
    let mut fully = 0u64;
    let mut partial = 0u64;

    let mut j = 0usize;
    for run_a in &a.runs {
        for k in 0..=(run_a.run_len as i64) {
            let cell = run_a.id.abs() + k;
            while j < b.runs.len() && b.runs[j].id.abs() + b.runs[j].run_len as i64 + 1 <= cell {
                j += 1;
            }
            if j >= b.runs.len() {
                break;
            }
            let run_b = &b.runs[j];
            if cell >= run_b.id.abs() && cell <= run_b.id.abs() + run_b.run_len as i64 {
                if run_b.id > 0 {
                    fully += 1;
                } else {
                    partial += 1;
                }
            }
        }
    }

    (fully, partial)
}
