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
use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;
use std::sync::Mutex;

use flate2::write::GzEncoder;
use flate2::Compression;
use log::warn;

use crate::error::{Result, SjError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Intersects,
    Contains,
    Covers,
    Equals,
    Touches,
    Overlaps,
    Crosses,
}

impl Relation {
    fn label(self) -> &'static str {
        match self {
            Relation::Intersects => "intersects",
            Relation::Contains => "contains",
            Relation::Covers => "covers",
            Relation::Equals => "equals",
            Relation::Touches => "touches",
            Relation::Overlaps => "overlaps",
            Relation::Crosses => "crosses",
        }
    }
}

/// Output line-shape configuration: `prefix gidA sep gidB suffix`, with a
/// per-relation separator override falling back to `default_sep`.
pub struct OutputCfg {
    pub prefix: String,
    pub suffix: String,
    pub default_sep: String,
    pub sep_for: Box<dyn Fn(Relation) -> Option<String> + Send + Sync>,
    /// When set, only this relation is ever written; every other
    /// relation is silently dropped (`--intersects`/`--contains`).
    pub only: Option<Relation>,
}

impl Default for OutputCfg {
    fn default() -> Self {
        OutputCfg {
            prefix: String::new(),
            suffix: String::new(),
            default_sep: " ".to_string(),
            sep_for: Box::new(|rel| Some(format!(" {} ", rel.label()))),
            only: None,
        }
    }
}

enum Sink {
    Plain(BufWriter<File>),
    Gz(Box<GzEncoder<BufWriter<File>>>),
    Stdout(Stdout),
    Null,
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gz(w) => w.write(buf),
            Sink::Stdout(w) => w.write(buf),
            Sink::Null => Ok(buf.len()),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gz(w) => w.flush(),
            Sink::Stdout(w) => w.flush(),
            Sink::Null => Ok(()),
        }
    }
}

/// Thread-shared relation writer. One instance serves every worker;
/// writes are serialized behind a mutex the way the cache's writer half
/// is, since DE-9IM output volume is normally far below the event stream.
pub struct OutputWriter {
    sink: Mutex<Sink>,
    cfg: OutputCfg,
}

impl OutputWriter {
    pub fn new(path: &Path, cfg: OutputCfg) -> Result<Self> {
        let sink = open_sink(path)?;
        Ok(OutputWriter { sink: Mutex::new(sink), cfg })
    }

    pub fn stdout(cfg: OutputCfg) -> Self {
        OutputWriter { sink: Mutex::new(Sink::Stdout(io::stdout())), cfg }
    }

    pub fn null(cfg: OutputCfg) -> Self {
        OutputWriter { sink: Mutex::new(Sink::Null), cfg }
    }

    pub fn write(&self, a: u64, b: u64, rel: Relation) -> Result<()> {
        if let Some(only) = self.cfg.only {
            if rel != only {
                return Ok(());
            }
        }
        let sep = (self.cfg.sep_for)(rel).unwrap_or_else(|| self.cfg.default_sep.clone());
        let line = format!("{}{}{}{}{}\n", self.cfg.prefix, a, sep, b, self.cfg.suffix);
        let mut sink = self.sink.lock().unwrap();
        sink.write_all(line.as_bytes())
            .map_err(|e| SjError::WriteFailed(format!("output write failed: {e}")))?;
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        let mut sink = self.sink.lock().unwrap();
        let taken = std::mem::replace(&mut *sink, Sink::Null);
        match taken {
            Sink::Gz(gz) => {
                gz.finish().map_err(|e| SjError::WriteFailed(format!("gzip finish failed: {e}")))?;
                Ok(())
            }
            mut other => {
                let r = other.flush().map_err(|e| SjError::WriteFailed(format!("output flush failed: {e}")));
                *sink = other;
                r
            }
        }
    }
}

fn open_sink(path: &Path) -> Result<Sink> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext == "bz2" {
        warn!("bz2 output requested for {:?}; no bzip2 encoder is wired up, writing plain text instead", path);
    }
    let file = File::create(path).map_err(|e| SjError::WriteFailed(format!("cannot create {:?}: {e}", path)))?;
    let w = BufWriter::new(file);
    if ext == "gz" {
        Ok(Sink::Gz(Box::new(GzEncoder::new(w, Compression::default()))))
    } else {
        Ok(Sink::Plain(w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_prefixed_lines_with_default_separator() {
        let dir = std::env::temp_dir().join(format!("sj_output_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.txt");
        let cfg = OutputCfg { prefix: "rel:".into(), ..Default::default() };
        let w = OutputWriter::new(&path, cfg).unwrap();
        w.write(1, 2, Relation::Intersects).unwrap();
        w.close().unwrap();
        let s = std::fs::read_to_string(&path).unwrap();
        assert_eq!(s, "rel:1 intersects 2\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn per_relation_separator_overrides_default() {
        let dir = std::env::temp_dir().join(format!("sj_output_test2_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.txt");
        let cfg = OutputCfg {
            sep_for: Box::new(|r| if r == Relation::Contains { Some(" CONTAINS ".into()) } else { None }),
            ..OutputCfg::default()
        };
        let w = OutputWriter::new(&path, cfg).unwrap();
        w.write(1, 2, Relation::Contains).unwrap();
        w.close().unwrap();
        let s = std::fs::read_to_string(&path).unwrap();
        assert_eq!(s, "1 CONTAINS 2\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn gz_extension_produces_nonempty_compressed_file() {
        let dir = std::env::temp_dir().join(format!("sj_output_test3_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.txt.gz");
        let w = OutputWriter::new(&path, OutputCfg::default()).unwrap();
        w.write(1, 2, Relation::Equals).unwrap();
        w.close().unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(!bytes.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
