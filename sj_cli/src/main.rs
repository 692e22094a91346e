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
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::LevelFilter;
use structopt::StructOpt;

use sj_core::output::{OutputCfg, OutputWriter, Relation};
use sj_core::sweeper::SweeperCfg;
use sj_core::Engine;

/// Computes DE-9IM spatial relations (intersects, contains, covers,
/// equals, touches, overlaps, crosses) between geometries read from one
/// or two WKT input files.
#[derive(StructOpt, Debug)]
#[structopt(name = "sj")]
struct Opt {
    /// Input file(s). One file performs a self-join; two perform a
    /// bilateral join between side 0 and side 1.
    #[structopt(name = "INPUT", required = true, max_values = 2)]
    inputs: Vec<PathBuf>,

    /// Output file; defaults to stdout. A `.gz` suffix gzip-compresses
    /// the output; a `.bz2` suffix falls back to plain text with a
    /// logged warning.
    #[structopt(short = "o", long = "output")]
    output: Option<PathBuf>,

    /// Directory for geometry/event caches.
    #[structopt(short = "c", long = "cache-dir", default_value = "/tmp/sj_cache")]
    cache_dir: PathBuf,

    /// Per-thread cache capacity, in bytes.
    #[structopt(short = "C", long = "cache-bytes", default_value = "67108864")]
    cache_bytes: u64,

    /// Number of worker threads.
    #[structopt(short = "t", long = "threads", default_value = "1")]
    threads: usize,

    /// Line prefix written before each output relation.
    #[structopt(long = "prefix", default_value = "")]
    prefix: String,

    /// Line suffix written after each output relation.
    #[structopt(long = "suffix", default_value = "")]
    suffix: String,

    /// Restrict output to the `intersects` predicate only.
    #[structopt(long = "intersects")]
    intersects_only: bool,

    /// Restrict output to the `contains` predicate only.
    #[structopt(long = "contains")]
    contains_only: bool,

    /// Disable box-id cover-list pruning.
    #[structopt(long = "no-box-ids")]
    no_box_ids: bool,

    /// Disable surface-area-based polygon simplification.
    #[structopt(long = "no-surface-area")]
    no_surface_area: bool,

    /// Logging verbosity (error, warn, info, debug, trace).
    #[structopt(long = "log-level", default_value = "info")]
    log_level: LevelFilter,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    simple_logger::SimpleLogger::new()
        .with_level(opt.log_level)
        .init()
        .context("failed to initialize logger")?;

    let restrict_to: Option<Relation> = if opt.intersects_only {
        Some(Relation::Intersects)
    } else if opt.contains_only {
        Some(Relation::Contains)
    } else {
        None
    };

    let output_cfg = OutputCfg {
        prefix: opt.prefix.clone(),
        suffix: opt.suffix.clone(),
        only: restrict_to,
        ..OutputCfg::default()
    };

    let out = match &opt.output {
        Some(path) => OutputWriter::new(path, output_cfg).context("failed to open output")?,
        None => OutputWriter::stdout(output_cfg),
    };

    let cfg = SweeperCfg {
        cache_dir: opt.cache_dir,
        num_threads: opt.threads.max(1),
        cache_bytes_per_thread: opt.cache_bytes,
        batch_size: 100,
        simplification_factor: if opt.no_surface_area { 0.0 } else { 1.0 },
        use_box_ids: !opt.no_box_ids,
        use_surface_area: !opt.no_surface_area,
    };

    let inputs: Vec<(u8, &std::path::Path)> = opt
        .inputs
        .iter()
        .enumerate()
        .map(|(i, p)| (i.min(1) as u8, p.as_path()))
        .collect();

    let engine = Engine::new(cfg);
    engine.run(&inputs, &out)?;
    out.close()?;

    Ok(())
}
