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

use super::point::I32Point;

/// Axis-aligned bounding box. The default (empty) box is the maximum
/// inverse box, so that extending it with any point establishes correct
/// bounds without a separate "is this the first point" branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct I32Box {
    pub ll: I32Point,
    pub ur: I32Point,
}

impl Default for I32Box {
    fn default() -> Self {
        I32Box {
            ll: I32Point::new(i32::MAX, i32::MAX),
            ur: I32Point::new(i32::MIN, i32::MIN),
        }
    }
}

impl I32Box {
    pub fn new(ll: I32Point, ur: I32Point) -> Self {
        I32Box { ll, ur }
    }

    pub fn is_null(&self) -> bool {
        self.ll.x > self.ur.x
    }

    pub fn extend(&self, p: I32Point) -> I32Box {
        let mut b = *self;
        if p.x < b.ll.x {
            b.ll.x = p.x;
        }
        if p.y < b.ll.y {
            b.ll.y = p.y;
        }
        if p.x > b.ur.x {
            b.ur.x = p.x;
        }
        if p.y > b.ur.y {
            b.ur.y = p.y;
        }
        b
    }

    pub fn union(&self, other: &I32Box) -> I32Box {
        if self.is_null() {
            return *other;
        }
        if other.is_null() {
            return *self;
        }
        self.extend(other.ll).extend(other.ur)
    }

    pub fn intersects(&self, other: &I32Box) -> bool {
        if self.is_null() || other.is_null() {
            return false;
        }
        self.ll.x <= other.ur.x
            && self.ur.x >= other.ll.x
            && self.ll.y <= other.ur.y
            && self.ur.y >= other.ll.y
    }

    pub fn contains(&self, other: &I32Box) -> bool {
        !other.is_null()
            && other.ll.x >= self.ll.x
            && other.ll.y >= self.ll.y
            && other.ur.x <= self.ur.x
            && other.ur.y <= self.ur.y
    }

    pub fn contains_point(&self, p: I32Point) -> bool {
        p.x >= self.ll.x && p.x <= self.ur.x && p.y >= self.ll.y && p.y <= self.ur.y
    }

    pub fn width(&self) -> i64 {
        self.ur.x as i64 - self.ll.x as i64
    }

    pub fn height(&self) -> i64 {
        self.ur.y as i64 - self.ll.y as i64
    }
}

/// Bounding box of a geometry after rotating its vertices 45 degrees about
/// the origin -- a cheap rotated-rectangle pre-filter (`b45`, glossary
/// "diagonal bbox"). Rotation is folded into the two axes `u = x+y`,
/// `v = y-x`, which stay integral and avoid floating point in the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagBox {
    pub lo_u: i64,
    pub hi_u: i64,
    pub lo_v: i64,
    pub hi_v: i64,
}

impl DiagBox {
    pub fn empty() -> Self {
        DiagBox {
            lo_u: i64::MAX,
            hi_u: i64::MIN,
            lo_v: i64::MAX,
            hi_v: i64::MIN,
        }
    }

    pub fn extend(&self, p: I32Point) -> DiagBox {
        let u = p.x as i64 + p.y as i64;
        let v = p.y as i64 - p.x as i64;
        DiagBox {
            lo_u: self.lo_u.min(u),
            hi_u: self.hi_u.max(u),
            lo_v: self.lo_v.min(v),
            hi_v: self.hi_v.max(v),
        }
    }

    pub fn from_box(b: &I32Box) -> DiagBox {
        DiagBox::empty().extend(b.ll).extend(b.ur).extend(I32Point::new(b.ll.x, b.ur.y)).extend(I32Point::new(b.ur.x, b.ll.y))
    }

    pub fn intersects(&self, other: &DiagBox) -> bool {
        self.lo_u <= other.hi_u
            && self.hi_u >= other.lo_u
            && self.lo_v <= other.hi_v
            && self.hi_v >= other.lo_v
    }
}
