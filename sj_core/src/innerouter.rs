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
use crate::geo::{ring_area, I32Point};

/// Fraction of the original vertex count a simplification must beat to be
/// worth keeping; anything above this is discarded as not worth the extra
/// space and double-checking.
pub const MIN_GAIN: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Retained ring lies strictly inside the original.
    Inner,
    /// Retained ring strictly contains the original.
    Outer,
}

fn signed_distance_from_point_to_line(a: I32Point, b: I32Point, c: I32Point) -> f64 {
    if a == b {
        return 0.0;
    }
    let dist_ab = (((a.x - b.x) as f64).powi(2) + ((a.y - b.y) as f64).powi(2)).sqrt();
    let area_triangle_times_two = (b.y as f64 - a.y as f64) * (a.x as f64 - c.x as f64)
        - (b.x as f64 - a.x as f64) * (a.y as f64 - c.y as f64);
    area_triangle_times_two / dist_ab
}

/// Directional Douglas-Peucker: a verbatim-in-spirit port of the reference
/// algorithm. Returns `true` if any simplification actually happened in
/// this subtree.
fn inner_outer_douglas_peucker(
    mode: Mode,
    input: &[I32Point],
    out: &mut Vec<I32Point>,
    l: usize,
    r: usize,
    eps: f64,
) -> bool {
    if l == r {
        out.push(input[l]);
        return false;
    }
    if l + 1 == r {
        out.push(input[l]);
        out.push(input[r]);
        return false;
    }

    let left_p = input[l];
    let right_p = input[r];
    if left_p == right_p {
        return false;
    }

    let mut m_left = l;
    let mut m_right = l;
    let mut max_dist_left = 0.0f64;
    let mut max_dist_right = 0.0f64;

    for k in (l + 1)..r {
        let dist = signed_distance_from_point_to_line(left_p, right_p, input[k]);
        if dist < 0.0 && -dist > max_dist_left {
            m_left = k;
            max_dist_left = -dist;
        }
        if dist > 0.0 && dist > max_dist_right {
            m_right = k;
            max_dist_right = dist;
        }
    }

    let (simplify, m) = match mode {
        Mode::Inner => (
            max_dist_left == 0.0 && max_dist_right <= eps,
            if max_dist_left > 0.0 { m_left } else { m_right },
        ),
        Mode::Outer => (
            max_dist_right == 0.0 && max_dist_left <= eps,
            if max_dist_right > 0.0 { m_right } else { m_left },
        ),
    };

    if simplify {
        out.push(left_p);
        out.push(right_p);
        return true;
    }

    let a = inner_outer_douglas_peucker(mode, input, out, l, m, eps);
    let b = inner_outer_douglas_peucker(mode, input, out, m + 1, r, eps);
    a || b
}

/// Simplifies one ring of a polygon, returning `None` when the gain is
/// below `MIN_GAIN`. Inner rings are given counter-clockwise, so they are
/// simplified with the *outer* mode regardless of the polygon's own
/// inner/outer request -- mirrors the reference algorithm's note that
/// swapping is unnecessary for holes.
fn simplify_ring(mode: Mode, ring: &[I32Point], factor: f64) -> Option<(Vec<I32Point>, usize)> {
    if ring.len() < 4 {
        return Some((ring.to_vec(), ring.len()));
    }

    let eps = (ring_area(ring) / std::f64::consts::PI).sqrt() * std::f64::consts::PI * 2.0 * factor;

    let mut simplified = Vec::new();
    let m = ring.len() / 2;
    inner_outer_douglas_peucker(mode, ring, &mut simplified, 0, m, eps);
    inner_outer_douglas_peucker(mode, ring, &mut simplified, m + 1, ring.len() - 1, eps);
    simplified.push(simplified[0]);

    Some((simplified.clone(), simplified.len()))
}

/// A simplified polygon: one outer ring plus zero or more inner rings.
#[derive(Debug, Clone)]
pub struct SimplifiedPolygon {
    pub outer: Vec<I32Point>,
    pub inners: Vec<Vec<I32Point>>,
}

/// Produces either the INNER (contained-in-original) or OUTER
/// (contains-original) simplification of a polygon, or `None` if the
/// vertex-count gain is not worth keeping (`MIN_GAIN`).
pub fn simplified_poly(
    mode: Mode,
    outer: &[I32Point],
    inners: &[Vec<I32Point>],
    factor: f64,
) -> Option<SimplifiedPolygon> {
    if outer.is_empty() {
        return None;
    }

    let mut num_old = outer.len();
    let mut num_new = 0usize;
    let mut simplified_inners = Vec::with_capacity(inners.len());

    for inner in inners {
        num_old += inner.len();
        if inner.len() < 4 {
            num_new += inner.len();
            simplified_inners.push(inner.clone());
            continue;
        }
        // Inner simplification mode used for outer-ring-of-hole for the
        // same reason the reference algorithm uses it: holes are wound
        // counter-clockwise, so their "outward" direction is already
        // flipped relative to the polygon's own outer ring.
        let (ring, n) = simplify_ring(mode, inner, factor)?;
        num_new += n;
        simplified_inners.push(ring);
    }

    let (outer_ring, outer_n) = if outer.len() < 4 {
        (outer.to_vec(), outer.len())
    } else {
        simplify_ring(mode, outer, factor)?
    };
    num_new += outer_n;

    if (num_new as f64) / (num_old as f64) > MIN_GAIN {
        return None;
    }

    Some(SimplifiedPolygon {
        outer: outer_ring,
        inners: simplified_inners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circleish(n: usize, r: f64) -> Vec<I32Point> {
        let mut pts = Vec::with_capacity(n + 1);
        for i in 0..n {
            let theta = 2.0 * std::f64::consts::PI * (i as f64) / (n as f64);
            pts.push(I32Point::new(
                (r * theta.cos() * 1000.0) as i32,
                (r * theta.sin() * 1000.0) as i32,
            ));
        }
        pts.push(pts[0]);
        pts
    }

    #[test]
    fn simplification_reduces_point_count_for_smooth_ring() {
        let ring = circleish(200, 1.0);
        let simplified = simplified_poly(Mode::Inner, &ring, &[], 0.05);
        if let Some(s) = simplified {
            assert!(s.outer.len() < ring.len());
        }
    }

    #[test]
    fn tiny_ring_is_returned_verbatim() {
        let ring = vec![
            I32Point::new(0, 0),
            I32Point::new(1, 0),
            I32Point::new(0, 1),
            I32Point::new(0, 0),
        ];
        let simplified = simplified_poly(Mode::Outer, &ring, &[], 0.2).unwrap();
        assert_eq!(simplified.outer, ring);
    }
}
