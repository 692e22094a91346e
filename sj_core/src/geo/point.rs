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

/// Fixed precision factor applied to Mercator coordinates before they are
/// stored as 32-bit integers (~11cm resolution at the equator).
pub const PREC: f64 = 10.0;

/// Half-extent of the projected Web Mercator world, in projected units
/// (metres) before `PREC` quantisation.
pub const WORLD_EXTENT: f64 = 2.003_750_834e8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct I32Point {
    pub x: i32,
    pub y: i32,
}

impl I32Point {
    pub fn new(x: i32, y: i32) -> Self {
        I32Point { x, y }
    }

    /// Quantises a projected Mercator coordinate into grid units.
    pub fn from_proj(x: f64, y: f64) -> Self {
        I32Point {
            x: (x * PREC).round() as i32,
            y: (y * PREC).round() as i32,
        }
    }
}

/// Signed cross product of `(b - a) x (c - a)`; positive if `c` is to the
/// left of the directed line `a -> b`, negative if to the right, zero if
/// collinear. Used throughout as the exact integer orientation predicate.
pub fn cross(a: I32Point, b: I32Point, c: I32Point) -> i64 {
    let abx = (b.x - a.x) as i64;
    let aby = (b.y - a.y) as i64;
    let acx = (c.x - a.x) as i64;
    let acy = (c.y - a.y) as i64;
    abx * acy - aby * acx
}

/// `true` iff `p` lies on the closed segment `a-b`, assuming `p` is already
/// known to be collinear with `a` and `b` (cross == 0).
pub fn on_segment(a: I32Point, b: I32Point, p: I32Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Returns `Some(true)` if segments `(a1,a2)` and `(b1,b2)` properly cross
/// (interiors intersect at a single point not equal to any endpoint),
/// `Some(false)` if they touch only at endpoints or are disjoint, and
/// `None` is never returned -- collinear overlap is folded into `false`
/// here; callers needing that distinction use `segments_touch`.
pub fn segments_intersect(a1: I32Point, a2: I32Point, b1: I32Point, b2: I32Point) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);

    if ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0))
        && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0))
    {
        return true;
    }

    if d1 == 0 && on_segment(b1, b2, a1) {
        return true;
    }
    if d2 == 0 && on_segment(b1, b2, a2) {
        return true;
    }
    if d3 == 0 && on_segment(a1, a2, b1) {
        return true;
    }
    if d4 == 0 && on_segment(a1, a2, b2) {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_product_orientation() {
        let a = I32Point::new(0, 0);
        let b = I32Point::new(10, 0);
        assert!(cross(a, b, I32Point::new(5, 5)) > 0);
        assert!(cross(a, b, I32Point::new(5, -5)) < 0);
        assert_eq!(cross(a, b, I32Point::new(5, 0)), 0);
    }

    #[test]
    fn crossing_segments_detected() {
        assert!(segments_intersect(
            I32Point::new(0, 0),
            I32Point::new(10, 10),
            I32Point::new(0, 10),
            I32Point::new(10, 0),
        ));
    }

    #[test]
    fn touching_at_endpoint_counts_as_intersecting() {
        assert!(segments_intersect(
            I32Point::new(0, 0),
            I32Point::new(5, 0),
            I32Point::new(5, 0),
            I32Point::new(5, 5),
        ));
    }

    #[test]
    fn disjoint_segments_do_not_intersect() {
        assert!(!segments_intersect(
            I32Point::new(0, 0),
            I32Point::new(1, 0),
            I32Point::new(5, 5),
            I32Point::new(6, 6),
        ));
    }
}
