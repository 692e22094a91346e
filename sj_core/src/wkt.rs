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
use crate::error::{Result, SjError};
use crate::geo::{I32Point, PREC, WORLD_EXTENT};

/// One parsed input line: `<gid>\t<side>\t<wkt>` or, for a reference
/// geometry, `<gid>\t<side>\tref:<targetGid1>,<targetGid2>,...`.
pub enum InputLine {
    Geometry { id: u64, side: u8, geom: ParsedGeom },
    Reference { id: u64, side: u8, targets: Vec<u64> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedGeom {
    Point(I32Point),
    LineString(Vec<I32Point>),
    Polygon { outer: Vec<I32Point>, inners: Vec<Vec<I32Point>> },
    MultiPoint(Vec<I32Point>),
    MultiLineString(Vec<Vec<I32Point>>),
    MultiPolygon(Vec<(Vec<I32Point>, Vec<Vec<I32Point>>)>),
    GeometryCollection(Vec<ParsedGeom>),
}

/// Parses one tab-separated input line. Malformed lines are reported as
/// `ParseError`/`InvalidGeometry` for the caller to skip-and-continue
/// (§7), never panicking on bad input.
pub fn parse_line(line: &str) -> Result<InputLine> {
    let mut parts = line.splitn(3, '\t');
    let id_str = parts.next().ok_or_else(|| SjError::ParseError("missing id column".into()))?;
    let side_str = parts.next().ok_or_else(|| SjError::ParseError("missing side column".into()))?;
    let rest = parts.next().ok_or_else(|| SjError::ParseError("missing geometry column".into()))?;

    let id: u64 = id_str.trim().parse().map_err(|_| SjError::ParseError(format!("bad id {:?}", id_str)))?;
    let side: u8 = side_str.trim().parse().map_err(|_| SjError::ParseError(format!("bad side {:?}", side_str)))?;

    let rest = rest.trim();
    if let Some(body) = rest.strip_prefix("ref:") {
        let targets = body
            .split(',')
            .map(|t| t.trim().parse::<u64>().map_err(|_| SjError::ParseError(format!("bad reference target {:?}", t))))
            .collect::<Result<Vec<u64>>>()?;
        return Ok(InputLine::Reference { id, side, targets });
    }

    let geom = parse_wkt(rest)?;
    Ok(InputLine::Geometry { id, side, geom })
}

/// Hand-rolled recursive-descent WKT reader for the 7 supported types.
/// Coordinates are projected to the integer grid as they're read.
pub fn parse_wkt(s: &str) -> Result<ParsedGeom> {
    let s = s.trim();
    let (tag, rest) = split_tag(s)?;
    match tag.as_str() {
        "POINT" => {
            let pts = parse_point_list(rest)?;
            pts.into_iter().next().map(ParsedGeom::Point).ok_or_else(|| SjError::InvalidGeometry("empty POINT".into()))
        }
        "LINESTRING" => Ok(ParsedGeom::LineString(parse_point_list(rest)?)),
        "POLYGON" => {
            let rings = parse_ring_list(rest)?;
            let mut it = rings.into_iter();
            let outer = it.next().ok_or_else(|| SjError::InvalidGeometry("POLYGON with no rings".into()))?;
            Ok(ParsedGeom::Polygon { outer, inners: it.collect() })
        }
        "MULTIPOINT" => Ok(ParsedGeom::MultiPoint(parse_point_list(&strip_nested_parens(rest))?)),
        "MULTILINESTRING" => Ok(ParsedGeom::MultiLineString(parse_ring_list(rest)?)),
        "MULTIPOLYGON" => {
            let groups = split_top_level(rest)?;
            let mut polys = Vec::new();
            for g in groups {
                let rings = parse_ring_list(&g)?;
                let mut it = rings.into_iter();
                let outer = it.next().ok_or_else(|| SjError::InvalidGeometry("empty polygon in MULTIPOLYGON".into()))?;
                polys.push((outer, it.collect()));
            }
            Ok(ParsedGeom::MultiPolygon(polys))
        }
        "GEOMETRYCOLLECTION" => {
            let parts = split_top_level(rest)?;
            let mut geoms = Vec::new();
            for p in parts {
                geoms.push(parse_wkt(&p)?);
            }
            Ok(ParsedGeom::GeometryCollection(geoms))
        }
        other => Err(SjError::InvalidGeometry(format!("unsupported WKT type {:?}", other))),
    }
}

fn split_tag(s: &str) -> Result<(String, &str)> {
    let open = s.find('(').ok_or_else(|| SjError::ParseError(format!("no '(' in {:?}", s)))?;
    let close = s.rfind(')').ok_or_else(|| SjError::ParseError(format!("no ')' in {:?}", s)))?;
    if close < open {
        return Err(SjError::ParseError(format!("unbalanced parens in {:?}", s)));
    }
    let tag = s[..open].trim().to_uppercase();
    Ok((tag, &s[open + 1..close]))
}

fn strip_nested_parens(s: &str) -> String {
    s.chars().filter(|&c| c != '(' && c != ')').collect()
}

/// Splits a comma-separated list respecting nested parentheses, so
/// `(a),(b),(c)` inside a MULTI* body isn't cut at the inner commas.
fn split_top_level(s: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                out.push(s[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = s[start..].trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    if depth != 0 {
        return Err(SjError::ParseError(format!("unbalanced parens in {:?}", s)));
    }
    Ok(out)
}

fn parse_ring_list(s: &str) -> Result<Vec<Vec<I32Point>>> {
    split_top_level(s)?
        .into_iter()
        .map(|ring| {
            let inner = ring.trim().strip_prefix('(').and_then(|r| r.strip_suffix(')')).unwrap_or(&ring).to_string();
            parse_point_list(&inner)
        })
        .collect()
}

fn parse_point_list(s: &str) -> Result<Vec<I32Point>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(parse_one_point)
        .collect()
}

fn parse_one_point(tok: &str) -> Result<I32Point> {
    let mut coords = tok.split_whitespace();
    let x: f64 = coords.next().ok_or_else(|| SjError::ParseError(format!("missing x in {:?}", tok)))?.parse().map_err(|_| SjError::ParseError(format!("bad x in {:?}", tok)))?;
    let y: f64 = coords.next().ok_or_else(|| SjError::ParseError(format!("missing y in {:?}", tok)))?.parse().map_err(|_| SjError::ParseError(format!("bad y in {:?}", tok)))?;
    if x.abs() > WORLD_EXTENT || y.abs() > WORLD_EXTENT {
        return Err(SjError::InvalidGeometry(format!("coordinate ({}, {}) outside world extent", x, y)));
    }
    let _ = PREC;
    Ok(I32Point::from_proj(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_point() {
        let g = parse_wkt("POINT (1 2)").unwrap();
        assert!(matches!(g, ParsedGeom::Point(_)));
    }

    #[test]
    fn parses_polygon_with_hole() {
        let g = parse_wkt("POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0), (2 2, 3 2, 3 3, 2 3, 2 2))").unwrap();
        match g {
            ParsedGeom::Polygon { outer, inners } => {
                assert_eq!(outer.len(), 5);
                assert_eq!(inners.len(), 1);
            }
            _ => panic!("expected polygon"),
        }
    }

    #[test]
    fn parses_multipolygon() {
        let g = parse_wkt("MULTIPOLYGON (((0 0, 1 0, 1 1, 0 1, 0 0)), ((5 5, 6 5, 6 6, 5 6, 5 5)))").unwrap();
        match g {
            ParsedGeom::MultiPolygon(polys) => assert_eq!(polys.len(), 2),
            _ => panic!("expected multipolygon"),
        }
    }

    #[test]
    fn parses_input_line_with_side() {
        let line = parse_line("42\t0\tPOINT (1 1)").unwrap();
        match line {
            InputLine::Geometry { id, side, .. } => {
                assert_eq!(id, 42);
                assert_eq!(side, 0);
            }
            _ => panic!("expected geometry line"),
        }
    }

    #[test]
    fn parses_reference_line() {
        let line = parse_line("99\t1\tref:1,2,3").unwrap();
        match line {
            InputLine::Reference { id, targets, .. } => {
                assert_eq!(id, 99);
                assert_eq!(targets, vec![1, 2, 3]);
            }
            _ => panic!("expected reference line"),
        }
    }

    #[test]
    fn rejects_unsupported_type() {
        assert!(parse_wkt("TIN (((0 0, 1 0, 0 1, 0 0)))").is_err());
    }
}
