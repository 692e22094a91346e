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
pub mod bbox;
pub mod point;
pub mod ring;

pub use bbox::{DiagBox, I32Box};
pub use point::{cross, segments_intersect, I32Point, PREC, WORLD_EXTENT};
pub use ring::{line_length, ring_area, ring_area_signed, segment_cmp, SegEvent, XSorted};
