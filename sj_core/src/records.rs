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

use crate::boxids::BoxIdList;
use crate::geo::{ring_area, DiagBox, I32Box, I32Point};
use crate::innerouter::SimplifiedPolygon;

/// Zero denotes "this is the whole geometry"; a 1-based part index
/// otherwise.
pub type SubId = u16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointRec {
    pub id: u64,
    pub sub_id: SubId,
    pub geom: I32Point,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleLineRec {
    pub id: u64,
    pub a: I32Point,
    pub b: I32Point,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRec {
    pub id: u64,
    pub sub_id: SubId,
    pub points: Vec<I32Point>,
    pub bbox: I32Box,
    pub length: f64,
    pub box_ids: BoxIdList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleAreaRec {
    pub id: u64,
    pub ring: Vec<I32Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerRing {
    pub points: Vec<I32Point>,
    pub bbox: I32Box,
    pub area: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaRec {
    pub id: u64,
    pub sub_id: SubId,
    pub outer: Vec<I32Point>,
    pub inners: Vec<InnerRing>,
    pub bbox: I32Box,
    pub area: f64,
    pub outer_area: f64,
    pub box_ids: BoxIdList,
    pub diag_box: Option<DiagBox>,
    pub inner_simplified: Option<SimplifiedPolyOwned>,
    pub outer_simplified: Option<SimplifiedPolyOwned>,
}

/// Owned mirror of [`SimplifiedPolygon`]; derives `Serialize`/`Deserialize`
/// directly (unlike `SimplifiedPolygon`) so it survives the geometry
/// cache's disk round trip on `AreaRec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifiedPolyOwned {
    pub outer: Vec<I32Point>,
    pub inners: Vec<Vec<I32Point>>,
}

impl From<SimplifiedPolygon> for SimplifiedPolyOwned {
    fn from(p: SimplifiedPolygon) -> Self {
        SimplifiedPolyOwned {
            outer: p.outer,
            inners: p.inners,
        }
    }
}

impl AreaRec {
    pub fn new(id: u64, sub_id: SubId, outer: Vec<I32Point>, inners: Vec<Vec<I32Point>>) -> AreaRec {
        let mut bbox = I32Box::default();
        for p in &outer {
            bbox = bbox.extend(*p);
        }
        let outer_area = ring_area(&outer);
        let inner_recs: Vec<InnerRing> = inners
            .iter()
            .map(|r| {
                let mut b = I32Box::default();
                for p in r {
                    b = b.extend(*p);
                }
                InnerRing {
                    points: r.clone(),
                    bbox: b,
                    area: ring_area(r),
                }
            })
            .collect();
        let area = outer_area - inner_recs.iter().map(|r| r.area).sum::<f64>();

        AreaRec {
            id,
            sub_id,
            outer,
            inners: inner_recs,
            bbox,
            area,
            outer_area,
            box_ids: BoxIdList::default(),
            diag_box: None,
            inner_simplified: None,
            outer_simplified: None,
        }
    }

    /// `true` iff `p` lies within the outer ring and outside every hole.
    pub fn contains_point(&self, p: I32Point) -> bool {
        if !crate::boxids::point_in_ring(&self.outer, p) {
            return false;
        }
        for inner in &self.inners {
            if crate::boxids::point_in_ring(&inner.points, p) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeomKind {
    Point,
    Line,
    Area,
}

/// Tagged union over the five on-disk geometry variants, used wherever a
/// candidate pair needs to dispatch on kind before loading the record
/// from the appropriate cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GeomRecord {
    Point(PointRec),
    SimpleLine(SimpleLineRec),
    Line(LineRec),
    SimpleArea(SimpleAreaRec),
    Area(AreaRec),
}

impl GeomRecord {
    pub fn id(&self) -> u64 {
        match self {
            GeomRecord::Point(p) => p.id,
            GeomRecord::SimpleLine(p) => p.id,
            GeomRecord::Line(p) => p.id,
            GeomRecord::SimpleArea(p) => p.id,
            GeomRecord::Area(p) => p.id,
        }
    }

    pub fn sub_id(&self) -> SubId {
        match self {
            GeomRecord::Point(p) => p.sub_id,
            GeomRecord::SimpleLine(_) => 0,
            GeomRecord::Line(p) => p.sub_id,
            GeomRecord::SimpleArea(_) => 0,
            GeomRecord::Area(p) => p.sub_id,
        }
    }

    pub fn kind(&self) -> GeomKind {
        match self {
            GeomRecord::Point(_) => GeomKind::Point,
            GeomRecord::SimpleLine(_) | GeomRecord::Line(_) => GeomKind::Line,
            GeomRecord::SimpleArea(_) | GeomRecord::Area(_) => GeomKind::Area,
        }
    }
}
