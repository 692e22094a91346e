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
use float_cmp::approx_eq;

use crate::boxids::{box_id_isect, point_in_ring};
use crate::geo::{cross, segments_intersect, I32Point};
use crate::records::AreaRec;

/// Two units of the precision grid -- the absolute tolerance used for area
/// and length equality comparisons (`PREC = 10`, so `EPS = 2`).
pub const EPS: f64 = 2.0;

/// Result of running the filter cascade on one ordered pair `(a, b)`.
/// Containment/covers fields are directional (`a_contains_b` means "a's
/// interior contains all of b") so the aggregator can write both relation
/// directions without re-deriving them from a single asymmetric tuple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairVerdict {
    pub intersects: bool,
    pub touches: bool,
    pub crosses: bool,
    pub overlaps: bool,
    pub a_contains_b: bool,
    pub a_covers_b: bool,
    pub b_contains_a: bool,
    pub b_covers_a: bool,
    pub equals: bool,
}

fn rings_equal(a: &[I32Point], b: &[I32Point]) -> bool {
    a.len() == b.len() && {
        // rings are stored closed and may start at any vertex; compare as
        // a cyclic sequence in either winding direction.
        let n = a.len() - 1;
        if n == 0 {
            return true;
        }
        (0..n).any(|shift| (0..n).all(|i| a[i] == b[(i + shift) % n]))
            || (0..n).any(|shift| (0..n).all(|i| a[n - 1 - i] == b[(i + shift) % n]))
    }
}

/// Layer 1 of the cascade (§4.8): byte-equal bbox, area, and ring vectors.
pub fn area_area_equivalent(a: &AreaRec, b: &AreaRec) -> bool {
    a.bbox == b.bbox
        && approx_eq!(f64, a.area, b.area, epsilon = EPS)
        && a.inners.len() == b.inners.len()
        && rings_equal(&a.outer, &b.outer)
        && a.inners.iter().zip(b.inners.iter()).all(|(x, y)| rings_equal(&x.points, &y.points))
}

fn boundary_segments_intersect(a_rings: &[&[I32Point]], b_rings: &[&[I32Point]]) -> bool {
    for ra in a_rings {
        for wa in ra.windows(2) {
            for rb in b_rings {
                for wb in rb.windows(2) {
                    if segments_intersect(wa[0], wa[1], wb[0], wb[1]) {
                        return true;
                    }
                }
            }
        }
    }
    false
}

fn point_on_ring_boundary(rings: &[&[I32Point]], p: I32Point) -> bool {
    for ring in rings {
        for w in ring.windows(2) {
            if cross(w[0], w[1], p) == 0 && on_segment_bbox(w[0], w[1], p) {
                return true;
            }
        }
    }
    false
}

fn on_segment_bbox(a: I32Point, b: I32Point, p: I32Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

fn area_rings<'a>(a: &'a AreaRec) -> Vec<&'a [I32Point]> {
    let mut v = vec![a.outer.as_slice()];
    v.extend(a.inners.iter().map(|r| r.points.as_slice()));
    v
}

/// Layer 2 (§4.2/§4.8): consults the packed box-id cover lists before
/// falling back to exact geometry. Returns `Some(verdict)` when the
/// box-id cascade alone can decide the pair.
fn area_area_box_id_cascade(a: &AreaRec, b: &AreaRec) -> Option<PairVerdict> {
    if a.box_ids.runs.is_empty() || b.box_ids.runs.is_empty() {
        return None;
    }
    let (fully, partial) = box_id_isect(&a.box_ids, &b.box_ids);
    if fully + partial == 0 {
        return Some(PairVerdict::default());
    }
    if fully == a.box_ids.total_cells() {
        return Some(PairVerdict {
            intersects: true,
            b_contains_a: true,
            b_covers_a: true,
            ..Default::default()
        });
    }
    None
}

fn ring_bbox(ring: &[I32Point]) -> crate::geo::I32Box {
    let mut b = crate::geo::I32Box::default();
    for p in ring {
        b = b.extend(*p);
    }
    b
}

/// Layer 4 (§4.8): the OUTER simplification is a ring that strictly
/// contains the original polygon, so if its bbox doesn't even reach the
/// other polygon, the real rings can't intersect either. Gated by
/// `use_surface_area` since it trades a cheap bbox check against the
/// simplified ring for skipping the exact ring walk below.
fn area_area_simplified_outer_reject(a: &AreaRec, b: &AreaRec) -> bool {
    if let Some(s) = &a.outer_simplified {
        if !ring_bbox(&s.outer).intersects(&b.bbox) {
            return true;
        }
    }
    if let Some(s) = &b.outer_simplified {
        if !ring_bbox(&s.outer).intersects(&a.bbox) {
            return true;
        }
    }
    false
}

/// Layer 5: exact segment-sweep intersection/containment for two areas.
pub fn check_area_area(a: &AreaRec, b: &AreaRec, use_surface_area: bool) -> PairVerdict {
    if !a.bbox.intersects(&b.bbox) {
        return PairVerdict::default();
    }

    if area_area_equivalent(a, b) {
        return PairVerdict {
            intersects: true,
            a_contains_b: true,
            a_covers_b: true,
            b_contains_a: true,
            b_covers_a: true,
            equals: true,
            ..Default::default()
        };
    }

    if let Some(v) = area_area_box_id_cascade(a, b) {
        if v.b_contains_a || (!v.intersects) {
            return v;
        }
    }

    if use_surface_area && area_area_simplified_outer_reject(a, b) {
        return PairVerdict::default();
    }

    let a_rings = area_rings(a);
    let b_rings = area_rings(b);

    let boundary_touch = boundary_segments_intersect(&a_rings, &b_rings);

    let a_outer_in_b = a.outer.iter().all(|p| b.contains_point(*p) || point_on_ring_boundary(&b_rings, *p));
    let b_outer_in_a = b.outer.iter().all(|p| a.contains_point(*p) || point_on_ring_boundary(&a_rings, *p));

    let a_strictly_in_b = a.outer.iter().any(|p| b.contains_point(*p) && !point_on_ring_boundary(&b_rings, *p));
    let b_strictly_in_a = b.outer.iter().any(|p| a.contains_point(*p) && !point_on_ring_boundary(&a_rings, *p));

    let b_covers_a = a_outer_in_b && !boundary_touch_crosses(&a_rings, &b_rings);
    let a_covers_b = b_outer_in_a && !boundary_touch_crosses(&b_rings, &a_rings);

    let b_contains_a = b_covers_a && a_strictly_in_b && !boundary_touch;
    let a_contains_b = a_covers_b && b_strictly_in_a && !boundary_touch;

    let intersects = boundary_touch || a_strictly_in_b || b_strictly_in_a || b_covers_a || a_covers_b;

    let touches = intersects && !a_strictly_in_b && !b_strictly_in_a && !a_covers_b && !b_covers_a;

    let overlaps = intersects && !touches && !a_covers_b && !b_covers_a;

    PairVerdict {
        intersects,
        touches,
        crosses: false,
        overlaps,
        a_contains_b,
        a_covers_b,
        b_contains_a,
        b_covers_a,
        equals: false,
    }
}

/// A boundary crossing (as opposed to a pure touch) exists if any `a`
/// boundary segment properly crosses (not merely meets) a `b` boundary
/// segment -- used to disqualify "covers" when a ring pokes outside.
fn boundary_touch_crosses(a_rings: &[&[I32Point]], b_rings: &[&[I32Point]]) -> bool {
    for ra in a_rings {
        for wa in ra.windows(2) {
            for rb in b_rings {
                for wb in rb.windows(2) {
                    if properly_crosses(wa[0], wa[1], wb[0], wb[1]) {
                        return true;
                    }
                }
            }
        }
    }
    false
}

fn properly_crosses(a1: I32Point, a2: I32Point, b1: I32Point, b2: I32Point) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);
    ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0)) && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0))
}

/// Point-vs-area check; the spec reduces the verdict vector to
/// `(contains, covers)` for this pair (plus `intersects`, which we keep
/// explicit for the aggregator).
pub fn check_point_area(p: I32Point, area: &AreaRec) -> PairVerdict {
    if !area.bbox.contains_point(p) {
        return PairVerdict::default();
    }
    let rings = area_rings(area);
    let on_boundary = point_on_ring_boundary(&rings, p);
    let inside = area.contains_point(p);

    PairVerdict {
        intersects: inside || on_boundary,
        b_covers_a: inside || on_boundary,
        b_contains_a: inside && !on_boundary,
        ..Default::default()
    }
}

enum LinePointRel {
    NotOn,
    Interior,
    Endpoint,
}

fn point_on_line_chain(points: &[I32Point], p: I32Point) -> LinePointRel {
    for w in points.windows(2) {
        if cross(w[0], w[1], p) == 0 && on_segment_bbox(w[0], w[1], p) {
            if p == points[0] || p == points[points.len() - 1] {
                return LinePointRel::Endpoint;
            }
            return LinePointRel::Interior;
        }
    }
    LinePointRel::NotOn
}

/// Line-vs-area: `covers` when the whole line lies in the closed area,
/// `contains` when additionally no point touches the area's boundary,
/// `touches` when the line meets the area only at its boundary without
/// ever entering the interior, `crosses` when it does both enter and
/// leave.
pub fn check_line_area(line_pts: &[I32Point], area: &AreaRec) -> PairVerdict {
    let mut bbox = crate::geo::I32Box::default();
    for p in line_pts {
        bbox = bbox.extend(*p);
    }
    if !bbox.intersects(&area.bbox) {
        return PairVerdict::default();
    }

    let rings = area_rings(area);
    let boundary_touch = line_pts.windows(2).any(|w| {
        rings.iter().any(|r| r.windows(2).any(|wb| segments_intersect(w[0], w[1], wb[0], wb[1])))
    });

    let any_strict_inside = line_pts
        .iter()
        .any(|p| area.contains_point(*p) && !point_on_ring_boundary(&rings, *p));
    let any_strict_outside = line_pts
        .iter()
        .any(|p| !area.contains_point(*p) && !point_on_ring_boundary(&rings, *p));

    let intersects = boundary_touch || any_strict_inside;
    let covers = intersects && !any_strict_outside;
    let contains = covers && !boundary_touch;
    let touches = intersects && !any_strict_inside;
    let crosses = intersects && any_strict_inside && any_strict_outside;

    PairVerdict {
        intersects,
        touches: touches && !crosses,
        crosses,
        overlaps: false,
        b_contains_a: contains,
        b_covers_a: covers,
        ..Default::default()
    }
}

/// Line-vs-line exact check. Per §4.8 the predicate vector for this pair
/// has no `contains` component, only `covers`.
pub fn check_line_line(a_pts: &[I32Point], b_pts: &[I32Point]) -> PairVerdict {
    let mut a_bbox = crate::geo::I32Box::default();
    for p in a_pts {
        a_bbox = a_bbox.extend(*p);
    }
    let mut b_bbox = crate::geo::I32Box::default();
    for p in b_pts {
        b_bbox = b_bbox.extend(*p);
    }
    if !a_bbox.intersects(&b_bbox) {
        return PairVerdict::default();
    }

    // Open question (preserved as-is, see SPEC_FULL.md §9): line/line
    // equality compares length with an absolute epsilon, not a relative
    // tolerance, matching the reference codebase's literal behaviour.
    let len_a = crate::geo::line_length(a_pts);
    let len_b = crate::geo::line_length(b_pts);
    if a_pts.len() == b_pts.len()
        && approx_eq!(f64, len_a, len_b, epsilon = EPS)
        && (a_pts == b_pts || a_pts.iter().zip(b_pts.iter().rev()).all(|(x, y)| x == y))
    {
        return PairVerdict {
            intersects: true,
            a_covers_b: true,
            b_covers_a: true,
            equals: true,
            ..Default::default()
        };
    }

    let mut intersects = false;
    let mut any_cross = false;
    let mut any_touch = false;

    for wa in a_pts.windows(2) {
        for wb in b_pts.windows(2) {
            if segments_intersect(wa[0], wa[1], wb[0], wb[1]) {
                intersects = true;
                if properly_crosses(wa[0], wa[1], wb[0], wb[1]) {
                    any_cross = true;
                } else {
                    any_touch = true;
                }
            }
        }
    }

    let a_on_b = a_pts.iter().all(|p| matches!(point_on_line_chain(b_pts, *p), LinePointRel::Interior | LinePointRel::Endpoint));
    let b_on_a = b_pts.iter().all(|p| matches!(point_on_line_chain(a_pts, *p), LinePointRel::Interior | LinePointRel::Endpoint));

    let crosses = any_cross;
    let touches = intersects && !crosses && !a_on_b && !b_on_a;

    PairVerdict {
        intersects,
        touches,
        crosses,
        overlaps: false,
        a_covers_b: b_on_a,
        b_covers_a: a_on_b,
        equals: false,
        ..Default::default()
    }
}

/// Point-vs-line: the point either lies on the line (interior ⇒ covers
/// and, since a point has no boundary of its own, also contains; endpoint
/// ⇒ touches) or it is disjoint from it.
pub fn check_point_line(p: I32Point, line_pts: &[I32Point]) -> PairVerdict {
    match point_on_line_chain(line_pts, p) {
        LinePointRel::NotOn => PairVerdict::default(),
        LinePointRel::Interior => PairVerdict {
            intersects: true,
            b_contains_a: true,
            b_covers_a: true,
            ..Default::default()
        },
        LinePointRel::Endpoint => PairVerdict {
            intersects: true,
            touches: true,
            b_covers_a: true,
            ..Default::default()
        },
    }
}

pub fn check_point_point(a: I32Point, b: I32Point) -> PairVerdict {
    if a == b {
        PairVerdict {
            intersects: true,
            a_contains_b: true,
            a_covers_b: true,
            b_contains_a: true,
            b_covers_a: true,
            equals: true,
            ..Default::default()
        }
    } else {
        PairVerdict::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<I32Point> {
        vec![
            I32Point::new(x0, y0),
            I32Point::new(x1, y0),
            I32Point::new(x1, y1),
            I32Point::new(x0, y1),
            I32Point::new(x0, y0),
        ]
    }

    #[test]
    fn identical_squares_are_equal_and_cover() {
        let a = AreaRec::new(1, 0, square(0, 0, 10, 10), vec![]);
        let b = AreaRec::new(2, 0, square(0, 0, 10, 10), vec![]);
        let v = check_area_area(&a, &b, true);
        assert!(v.equals);
        assert!(v.intersects);
        assert!(v.a_covers_b && v.b_covers_a);
        assert!(v.a_contains_b && v.b_contains_a);
    }

    #[test]
    fn outer_contains_inner_without_overlap() {
        let outer = AreaRec::new(1, 0, square(0, 0, 10, 10), vec![]);
        let inner = AreaRec::new(2, 0, square(2, 2, 3, 3), vec![]);
        let v = check_area_area(&outer, &inner, true);
        assert!(v.intersects);
        assert!(v.a_contains_b);
        assert!(v.a_covers_b);
        assert!(!v.overlaps);
    }

    #[test]
    fn crossing_lines_report_crosses_not_touches() {
        let a = vec![I32Point::new(0, 0), I32Point::new(10, 10)];
        let b = vec![I32Point::new(0, 10), I32Point::new(10, 0)];
        let v = check_line_line(&a, &b);
        assert!(v.intersects);
        assert!(v.crosses);
        assert!(!v.touches);
        assert!(!v.a_covers_b && !v.b_covers_a);
    }

    #[test]
    fn point_inside_polygon_is_contained_and_covered() {
        let poly = AreaRec::new(1, 0, square(0, 0, 10, 10), vec![]);
        let v = check_point_area(I32Point::new(5, 5), &poly);
        assert!(v.intersects);
        assert!(v.b_contains_a);
        assert!(v.b_covers_a);
    }

    #[test]
    fn line_touching_polygon_boundary_does_not_cross() {
        let poly = AreaRec::new(1, 0, square(0, 0, 10, 10), vec![]);
        let line = vec![I32Point::new(-5, 0), I32Point::new(0, 0)];
        let v = check_line_area(&line, &poly);
        assert!(v.intersects);
        assert!(v.touches);
        assert!(!v.crosses);
    }

    #[test]
    fn identical_points_equal() {
        let v = check_point_point(I32Point::new(1, 1), I32Point::new(1, 1));
        assert!(v.equals);
    }

    #[test]
    fn disjoint_bboxes_short_circuit_to_no_relation() {
        let a = AreaRec::new(1, 0, square(0, 0, 1, 1), vec![]);
        let b = AreaRec::new(2, 0, square(100, 100, 101, 101), vec![]);
        let v = check_area_area(&a, &b, true);
        assert_eq!(v, PairVerdict::default());
    }
}
