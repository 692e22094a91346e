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
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SjError};
use crate::geo::DiagBox;

/// Tag distinguishing the geometry class an event belongs to; also used
/// directly as the "non-polygon before polygon, point before line"
/// comparator key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum GeomType {
    Point = 0,
    SimpleLine = 1,
    Line = 2,
    SimpleArea = 3,
    Area = 4,
}

/// A fixed-size sweep event marking either the "in" (left) or "out"
/// (right) boundary of a geometry's x-interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxVal {
    pub id: u64,
    pub lo_y: i32,
    pub up_y: i32,
    pub val: i32,
    pub out: bool,
    pub gtype: GeomType,
    pub area_or_len: f64,
    /// Rotated-rectangle pre-filter bbox (glossary "diagonal bbox"),
    /// built from the geometry's actual vertices, not its axis-aligned
    /// bbox corners -- see `geo::DiagBox` and `DESIGN.md`.
    pub b45: DiagBox,
    pub side: u8,
}

impl BoxVal {
    /// `true` for the reserved sentinel ("loY = 1, upY = 0") that marks a
    /// multi-geometry group becoming active, rather than a real y-extent.
    pub fn is_multi_sentinel(&self) -> bool {
        self.lo_y == 1 && self.up_y == 0
    }
}

/// Total order over events: ascending `val` (sweep x); at equal x, *in*
/// before *out*; non-polygon before polygon; point before line; and for
/// two polygons/two lines at equal x/type, smaller `area_or_len` first.
pub fn cmp_box_val(a: &BoxVal, b: &BoxVal) -> Ordering {
    a.val
        .cmp(&b.val)
        .then_with(|| a.out.cmp(&b.out))
        .then_with(|| is_polygon(a.gtype).cmp(&is_polygon(b.gtype)))
        .then_with(|| is_line_like(a.gtype).cmp(&is_line_like(b.gtype)))
        .then_with(|| a.area_or_len.partial_cmp(&b.area_or_len).unwrap_or(Ordering::Equal))
}

fn is_polygon(t: GeomType) -> bool {
    matches!(t, GeomType::SimpleArea | GeomType::Area)
}

fn is_line_like(t: GeomType) -> bool {
    matches!(t, GeomType::SimpleLine | GeomType::Line)
}

const CHUNK_LEN: usize = 100_000;

/// Append-only event store with external-merge-sort `flush`: events are
/// buffered in fixed-size chunks, each chunk is sorted in memory and
/// spilled to its own run file, and `flush` k-way merges every run into
/// the final sequential file (mirroring the reference codebase's
/// "externally sort the event file, then replace it" design, adapted to
/// not require holding the whole stream in memory at once).
pub struct EventStore {
    dir: PathBuf,
    buffer: Vec<BoxVal>,
    run_paths: Vec<PathBuf>,
    final_path: PathBuf,
    flushed: bool,
}

impl EventStore {
    pub fn new(dir: &Path) -> Self {
        EventStore {
            dir: dir.to_path_buf(),
            buffer: Vec::with_capacity(CHUNK_LEN),
            run_paths: Vec::new(),
            final_path: dir.join("events"),
            flushed: false,
        }
    }

    pub fn add(&mut self, ev: BoxVal) -> Result<()> {
        self.buffer.push(ev);
        if self.buffer.len() >= CHUNK_LEN {
            self.spill_chunk()?;
        }
        Ok(())
    }

    fn spill_chunk(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.buffer.sort_by(cmp_box_val);
        let run_path = self.dir.join(format!("events.run{}", self.run_paths.len()));
        let file = File::create(&run_path).map_err(|e| SjError::EventIO(e.to_string()))?;
        let mut w = BufWriter::with_capacity(32 * 1024 * 1024, file);
        for ev in &self.buffer {
            write_event(&mut w, ev)?;
        }
        w.flush().map_err(|e| SjError::EventIO(e.to_string()))?;
        self.run_paths.push(run_path);
        self.buffer.clear();
        Ok(())
    }

    /// Externally merge-sorts all spilled runs (plus any buffered
    /// remainder) into the final sequential event file. Must be called
    /// exactly once before `sweep` reads events.
    pub fn flush(&mut self) -> Result<()> {
        self.spill_chunk()?;

        let mut readers: Vec<EventReader> = self
            .run_paths
            .iter()
            .map(|p| EventReader::open(p))
            .collect::<Result<_>>()?;

        let out_file = File::create(&self.final_path).map_err(|e| SjError::EventIO(e.to_string()))?;
        let mut w = BufWriter::with_capacity(32 * 1024 * 1024, out_file);

        let mut heads: Vec<Option<BoxVal>> = readers.iter_mut().map(|r| r.next_event()).collect::<Result<_>>()?;

        loop {
            let mut best: Option<usize> = None;
            for (i, h) in heads.iter().enumerate() {
                if let Some(ev) = h {
                    if best.is_none() || cmp_box_val(ev, heads[best.unwrap()].as_ref().unwrap()) == Ordering::Less {
                        best = Some(i);
                    }
                }
            }
            match best {
                None => break,
                Some(i) => {
                    write_event(&mut w, heads[i].as_ref().unwrap())?;
                    heads[i] = readers[i].next_event()?;
                }
            }
        }
        w.flush().map_err(|e| SjError::EventIO(e.to_string()))?;

        for p in self.run_paths.drain(..) {
            let _ = std::fs::remove_file(p);
        }
        self.flushed = true;
        Ok(())
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Opens a forward-only reader over the merged, sorted event stream.
    pub fn reader(&self) -> Result<EventReader> {
        if !self.flushed {
            return Err(SjError::NotFlushed);
        }
        EventReader::open(&self.final_path)
    }
}

const EVENT_REC_LEN: usize = 8 + 4 + 4 + 4 + 1 + 1 + 8 + 32 + 1;

fn write_event<W: Write>(w: &mut W, ev: &BoxVal) -> Result<()> {
    w.write_all(&ev.id.to_le_bytes()).map_err(io_err)?;
    w.write_all(&ev.lo_y.to_le_bytes()).map_err(io_err)?;
    w.write_all(&ev.up_y.to_le_bytes()).map_err(io_err)?;
    w.write_all(&ev.val.to_le_bytes()).map_err(io_err)?;
    w.write_all(&[ev.out as u8]).map_err(io_err)?;
    w.write_all(&[ev.gtype as u8]).map_err(io_err)?;
    w.write_all(&ev.area_or_len.to_le_bytes()).map_err(io_err)?;
    w.write_all(&ev.b45.lo_u.to_le_bytes()).map_err(io_err)?;
    w.write_all(&ev.b45.hi_u.to_le_bytes()).map_err(io_err)?;
    w.write_all(&ev.b45.lo_v.to_le_bytes()).map_err(io_err)?;
    w.write_all(&ev.b45.hi_v.to_le_bytes()).map_err(io_err)?;
    w.write_all(&[ev.side]).map_err(io_err)?;
    Ok(())
}

fn io_err(e: std::io::Error) -> SjError {
    SjError::EventIO(e.to_string())
}

fn gtype_from_u8(v: u8) -> Result<GeomType> {
    Ok(match v {
        0 => GeomType::Point,
        1 => GeomType::SimpleLine,
        2 => GeomType::Line,
        3 => GeomType::SimpleArea,
        4 => GeomType::Area,
        _ => return Err(SjError::EventIO(format!("bad geom type tag {}", v))),
    })
}

/// Sequential reader over a (possibly unsorted, if used on a run file)
/// fixed-record event file.
pub struct EventReader {
    r: BufReader<File>,
}

impl EventReader {
    pub fn open(path: &Path) -> Result<Self> {
        let f = File::open(path).map_err(|e| SjError::EventIO(e.to_string()))?;
        Ok(EventReader {
            r: BufReader::with_capacity(4 * 1024 * 1024, f),
        })
    }

    pub fn next_event(&mut self) -> Result<Option<BoxVal>> {
        let mut buf = [0u8; EVENT_REC_LEN];
        match self.r.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(SjError::EventIO(e.to_string())),
        }
        let mut p = 0usize;
        macro_rules! take {
            ($n:expr) => {{
                let s = &buf[p..p + $n];
                p += $n;
                s
            }};
        }
        let id = u64::from_le_bytes(take!(8).try_into().unwrap());
        let lo_y = i32::from_le_bytes(take!(4).try_into().unwrap());
        let up_y = i32::from_le_bytes(take!(4).try_into().unwrap());
        let val = i32::from_le_bytes(take!(4).try_into().unwrap());
        let out = take!(1)[0] != 0;
        let gtype = gtype_from_u8(take!(1)[0])?;
        let area_or_len = f64::from_le_bytes(take!(8).try_into().unwrap());
        let lo_u = i64::from_le_bytes(take!(8).try_into().unwrap());
        let hi_u = i64::from_le_bytes(take!(8).try_into().unwrap());
        let lo_v = i64::from_le_bytes(take!(8).try_into().unwrap());
        let hi_v = i64::from_le_bytes(take!(8).try_into().unwrap());
        let side = take!(1)[0];

        Ok(Some(BoxVal {
            id,
            lo_y,
            up_y,
            val,
            out,
            gtype,
            area_or_len,
            b45: DiagBox { lo_u, hi_u, lo_v, hi_v },
            side,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(val: i32, out: bool, gtype: GeomType, area: f64) -> BoxVal {
        BoxVal {
            id: 1,
            lo_y: 0,
            up_y: 1,
            val,
            out,
            gtype,
            area_or_len: area,
            b45: DiagBox { lo_u: 0, hi_u: 1, lo_v: 0, hi_v: 1 },
            side: 0,
        }
    }

    #[test]
    fn comparator_orders_by_x_first() {
        let a = ev(1, false, GeomType::Point, 0.0);
        let b = ev(2, false, GeomType::Point, 0.0);
        assert_eq!(cmp_box_val(&a, &b), Ordering::Less);
    }

    #[test]
    fn in_sorts_before_out_at_same_x() {
        let a = ev(5, false, GeomType::Point, 0.0);
        let b = ev(5, true, GeomType::Point, 0.0);
        assert_eq!(cmp_box_val(&a, &b), Ordering::Less);
    }

    #[test]
    fn non_polygon_sorts_before_polygon_at_tie() {
        let a = ev(5, false, GeomType::Line, 0.0);
        let b = ev(5, false, GeomType::Area, 0.0);
        assert_eq!(cmp_box_val(&a, &b), Ordering::Less);
    }

    #[test]
    fn external_merge_sort_round_trips_sorted_stream() {
        let dir = std::env::temp_dir().join(format!("sj_event_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut store = EventStore::new(&dir);
        for v in [30, 10, 20, 5, 25, 15].iter() {
            store.add(ev(*v, false, GeomType::Point, 0.0)).unwrap();
        }
        store.flush().unwrap();

        let mut reader = store.reader().unwrap();
        let mut vals = Vec::new();
        while let Some(e) = reader.next_event().unwrap() {
            vals.push(e.val);
        }
        assert_eq!(vals, vec![5, 10, 15, 20, 25, 30]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reading_before_flush_fails() {
        let dir = std::env::temp_dir().join(format!("sj_event_test2_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = EventStore::new(&dir);
        assert!(matches!(store.reader(), Err(SjError::NotFlushed)));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
