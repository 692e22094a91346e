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
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, SjError};

/// Index-linked arena LRU: a `Vec<Node>` with explicit `prev`/`next`
/// indices plus a `HashMap<offset, node index>`. Avoids per-node heap
/// allocation (no `std::collections::LinkedList`) while keeping O(1)
/// splice-to-front and O(1) evict-tail.
struct LruNode<W> {
    offset: u64,
    val: Arc<W>,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Lru<W> {
    nodes: Vec<LruNode<W>>,
    free: Vec<usize>,
    index: HashMap<u64, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    cap: usize,
}

impl<W> Lru<W> {
    fn new(cap: usize) -> Self {
        Lru {
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            cap,
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(h) = self.head {
            self.nodes[h].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn get(&mut self, offset: u64) -> Option<Arc<W>> {
        let idx = *self.index.get(&offset)?;
        self.detach(idx);
        self.push_front(idx);
        Some(self.nodes[idx].val.clone())
    }

    fn insert(&mut self, offset: u64, val: Arc<W>) {
        let idx = if let Some(free_idx) = self.free.pop() {
            self.nodes[free_idx] = LruNode {
                offset,
                val,
                prev: None,
                next: None,
            };
            free_idx
        } else {
            self.nodes.push(LruNode {
                offset,
                val,
                prev: None,
                next: None,
            });
            self.nodes.len() - 1
        };
        self.index.insert(offset, idx);
        self.push_front(idx);

        if self.index.len() > self.cap {
            if let Some(tail) = self.tail {
                let tail_offset = self.nodes[tail].offset;
                self.detach(tail);
                self.index.remove(&tail_offset);
                self.free.push(tail);
            }
        }
    }
}

enum WriterState {
    Open { file: File, offset: u64 },
    Flushed,
}

/// Append-only per-geometry-class cache: records are serialised with a
/// `u32` length prefix and appended to `path`; the returned byte offset of
/// the prefix is the record's permanent identity. After `flush`, one
/// read-only handle and one LRU are created per worker thread; no reads
/// may happen before `flush` (mirrors the reference codebase's
/// write-then-read-only-handles lifecycle).
pub struct GeometryCache<W> {
    path: PathBuf,
    writer: Mutex<WriterState>,
    max_size_per_thread: usize,
    num_threads: usize,
    reads: Vec<Mutex<File>>,
    lrus: Vec<Mutex<Lru<W>>>,
    accesses: Vec<AtomicU64>,
    disk_accesses: Vec<AtomicU64>,
}

impl<W> GeometryCache<W>
where
    W: Serialize + DeserializeOwned,
{
    pub fn new(dir: &Path, class_name: &str, num_threads: usize, max_size_per_thread: usize, reuse: bool) -> Result<Self> {
        let path = dir.join(class_name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(!reuse)
            .open(&path)
            .map_err(|e| SjError::CacheIO(format!("{}: {}", path.display(), e)))?;
        let offset = if reuse {
            file.metadata().map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };

        Ok(GeometryCache {
            path,
            writer: Mutex::new(WriterState::Open { file, offset }),
            max_size_per_thread,
            num_threads,
            reads: Vec::new(),
            lrus: (0..num_threads.max(1)).map(|_| Mutex::new(Lru::new(max_size_per_thread))).collect(),
            accesses: (0..num_threads.max(1)).map(|_| AtomicU64::new(0)).collect(),
            disk_accesses: (0..num_threads.max(1)).map(|_| AtomicU64::new(0)).collect(),
        })
    }

    /// Appends one record, returning its byte offset (its identity).
    pub fn add(&self, val: &W) -> Result<u64>
    where
        W: Serialize,
    {
        let bytes = bincode::serialize(val).map_err(|e| SjError::CacheIO(e.to_string()))?;
        let mut guard = self.writer.lock().unwrap();
        match &mut *guard {
            WriterState::Open { file, offset } => {
                let rec_offset = *offset;
                let len = bytes.len() as u32;
                file.write_all(&len.to_le_bytes())
                    .map_err(|e| SjError::CacheIO(e.to_string()))?;
                file.write_all(&bytes).map_err(|e| SjError::CacheIO(e.to_string()))?;
                *offset += 4 + bytes.len() as u64;
                Ok(rec_offset)
            }
            WriterState::Flushed => Err(SjError::CacheIO(
                "add() called after flush()".to_string(),
            )),
        }
    }

    /// Closes the writer and opens `num_threads` read-only handles. Must
    /// be called exactly once before any `get`.
    pub fn flush(&mut self) -> Result<()> {
        {
            let mut guard = self.writer.lock().unwrap();
            if let WriterState::Open { file, .. } = &mut *guard {
                file.flush().map_err(|e| SjError::CacheIO(e.to_string()))?;
            }
            *guard = WriterState::Flushed;
        }
        self.reads.clear();
        for _ in 0..self.num_threads.max(1) {
            let f = File::open(&self.path).map_err(|e| SjError::CacheIO(e.to_string()))?;
            self.reads.push(Mutex::new(f));
        }
        Ok(())
    }

    fn read_from_disk(&self, offset: u64, tid: usize) -> Result<W> {
        let idx = tid % self.reads.len().max(1);
        let mut file = self.reads[idx].lock().unwrap();
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| SjError::CacheIO(e.to_string()))?;
        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)
            .map_err(|e| SjError::CacheIO(format!("short read at offset {}: {}", offset, e)))?;
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)
            .map_err(|e| SjError::CacheIO(format!("short read at offset {}: {}", offset, e)))?;
        bincode::deserialize(&buf).map_err(|e| SjError::CacheIO(e.to_string()))
    }

    /// Retrieves the value at `offset` for worker `tid`, consulting that
    /// thread's LRU first.
    pub fn get(&self, offset: u64, tid: usize) -> Result<Arc<W>> {
        if self.reads.is_empty() {
            return Err(SjError::NotFlushed);
        }
        let lru_idx = tid % self.lrus.len();
        self.accesses[lru_idx].fetch_add(1, Ordering::Relaxed);

        if let Some(hit) = self.lrus[lru_idx].lock().unwrap().get(offset) {
            return Ok(hit);
        }

        self.disk_accesses[lru_idx].fetch_add(1, Ordering::Relaxed);
        let val = Arc::new(self.read_from_disk(offset, tid)?);
        self.lrus[lru_idx].lock().unwrap().insert(offset, val.clone());
        Ok(val)
    }

    pub fn stats(&self) -> (u64, u64) {
        let access: u64 = self.accesses.iter().map(|a| a.load(Ordering::Relaxed)).sum();
        let disk: u64 = self.disk_accesses.iter().map(|a| a.load(Ordering::Relaxed)).sum();
        (access, disk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Dummy {
        id: u64,
        payload: Vec<i32>,
    }

    #[test]
    fn round_trips_through_add_flush_get() {
        let dir = std::env::temp_dir().join(format!("sj_cache_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut cache: GeometryCache<Dummy> = GeometryCache::new(&dir, "dummy_class", 2, 16, false).unwrap();

        let a = Dummy { id: 1, payload: vec![1, 2, 3] };
        let b = Dummy { id: 2, payload: vec![4, 5] };
        let off_a = cache.add(&a).unwrap();
        let off_b = cache.add(&b).unwrap();
        assert_ne!(off_a, off_b);

        cache.flush().unwrap();

        let got_a = cache.get(off_a, 0).unwrap();
        let got_b = cache.get(off_b, 1).unwrap();
        assert_eq!(*got_a, a);
        assert_eq!(*got_b, b);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn get_before_flush_fails() {
        let dir = std::env::temp_dir().join(format!("sj_cache_test2_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let cache: GeometryCache<Dummy> = GeometryCache::new(&dir, "dummy_class2", 1, 4, false).unwrap();
        assert!(matches!(cache.get(0, 0), Err(SjError::NotFlushed)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn out_of_range_offset_is_cache_io_error() {
        let dir = std::env::temp_dir().join(format!("sj_cache_test3_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut cache: GeometryCache<Dummy> = GeometryCache::new(&dir, "dummy_class3", 1, 4, false).unwrap();
        cache.add(&Dummy { id: 1, payload: vec![] }).unwrap();
        cache.flush().unwrap();
        assert!(matches!(cache.get(10_000, 0), Err(SjError::CacheIO(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn lru_evicts_least_recently_used_beyond_cap() {
        let dir = std::env::temp_dir().join(format!("sj_cache_test4_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut cache: GeometryCache<Dummy> = GeometryCache::new(&dir, "dummy_class4", 1, 2, false).unwrap();
        let offs: Vec<u64> = (0..5)
            .map(|i| cache.add(&Dummy { id: i, payload: vec![i as i32] }).unwrap())
            .collect();
        cache.flush().unwrap();
        for &o in &offs {
            cache.get(o, 0).unwrap();
        }
        let (access, disk) = cache.stats();
        assert_eq!(access, 5);
        assert!(disk >= 3);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
