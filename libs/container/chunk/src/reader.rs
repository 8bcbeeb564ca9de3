// This file is part of zonekit.
//
// zonekit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// zonekit is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with zonekit.  If not, see <http://www.gnu.org/licenses/>.

use crate::{ChunkError, ChunkProcessorKind, PipelineConfig};
use byteorder::{LittleEndian, ReadBytesExt};
use log::trace;
use parking_lot::{Condvar, Mutex};
use std::{
    collections::HashMap,
    io::{self, Read},
    sync::Arc,
};

type DecodeResult = Result<Vec<u8>, ChunkError>;

/// Per-stream decode slot state shared between the fetch-and-decode workers
/// and the consuming [`ByteSource`]. One "decode stream" is one outstanding
/// prefetch slot; at most `worker_count` chunks are ever in flight.
struct Shared {
    cursor: Mutex<ReadCursor>,
    processors: Vec<ChunkProcessorKind>,
    chunk_size: usize,
    pending: Mutex<HashMap<u64, DecodeResult>>,
    ready: Condvar,
}

struct ReadCursor {
    inner: Box<dyn Read + Send>,
    next_index: u64,
}

/// Reads one length-prefixed chunk body from `inner`. Returns `Ok(None)` on
/// the zero-length EOF marker chunk.
fn read_one_chunk(inner: &mut dyn Read, max_size: usize) -> Result<Option<Vec<u8>>, ChunkError> {
    let len = match inner.read_u32::<LittleEndian>() {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            // A well-formed stream always ends with an explicit zero-length
            // marker; running off the end of the file without one is still
            // treated as end of stream rather than a hard failure, since the
            // pipeline itself cannot distinguish "truncated" from "the
            // caller stopped caring" once the length prefix is gone.
            return Ok(None);
        }
        Err(e) => return Err(ChunkError::from(e)),
    };
    if len == 0 {
        return Ok(None);
    }
    if len > max_size {
        return Err(ChunkError::InvalidChunkSize {
            size: len,
            max: max_size,
        });
    }
    let mut body = vec![0u8; len];
    match inner.read_exact(&mut body) {
        Ok(()) => Ok(Some(body)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ChunkError::ShortRead {
            expected: len,
            got: 0,
        }),
        Err(e) => Err(ChunkError::from(e)),
    }
}

fn decode_chunk(
    processors: &[ChunkProcessorKind],
    stream_index: usize,
    mut bytes: Vec<u8>,
    max_out: usize,
) -> DecodeResult {
    for proc in processors {
        bytes = proc.decode(stream_index, &bytes, max_out)?;
    }
    Ok(bytes)
}

fn spawn_job(shared: Arc<Shared>) {
    rayon::spawn(move || {
        let (index, raw) = {
            let mut cursor = shared.cursor.lock();
            let index = cursor.next_index;
            let raw = read_one_chunk(&mut *cursor.inner, shared.chunk_size);
            cursor.next_index += 1;
            (index, raw)
        };
        let result = match raw {
            Ok(Some(bytes)) => {
                decode_chunk(&shared.processors, index as usize, bytes, shared.chunk_size)
            }
            Ok(None) => Ok(Vec::new()),
            Err(e) => Err(e),
        };
        trace!("chunk {} decoded ({} bytes)", index, result.as_ref().map(Vec::len).unwrap_or(0));
        let mut pending = shared.pending.lock();
        pending.insert(index, result);
        shared.ready.notify_all();
    });
}

/// A logically contiguous, forward-only, uncompressed byte stream produced
/// by running the underlying chunked file through a [`PipelineConfig`]'s
/// processors, with up to `worker_count` chunks decoding concurrently.
/// Implements [`std::io::Read`] so callers can use it exactly like a plain
/// file: the parallelism is an internal prefetch detail, never visible in
/// the bytes returned.
pub struct ByteSource {
    shared: Arc<Shared>,
    next_read_index: u64,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl ByteSource {
    pub fn new<R: Read + Send + 'static>(inner: R, config: PipelineConfig) -> Self {
        let worker_count = config.worker_count.max(1);
        let shared = Arc::new(Shared {
            cursor: Mutex::new(ReadCursor {
                inner: Box::new(inner),
                next_index: 0,
            }),
            processors: config.processors,
            chunk_size: config.chunk_size,
            pending: Mutex::new(HashMap::new()),
            ready: Condvar::new(),
        });
        for _ in 0..worker_count {
            spawn_job(shared.clone());
        }
        Self {
            shared,
            next_read_index: 0,
            buf: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    fn fill(&mut self) -> Result<(), ChunkError> {
        if self.eof {
            return Ok(());
        }
        let index = self.next_read_index;
        let result = {
            let mut pending = self.shared.pending.lock();
            loop {
                if let Some(result) = pending.remove(&index) {
                    break result;
                }
                self.shared.ready.wait(&mut pending);
            }
        };
        let bytes = result?;
        self.next_read_index += 1;
        if bytes.is_empty() {
            self.eof = true;
            self.buf.clear();
            self.pos = 0;
            return Ok(());
        }
        // Keep `worker_count` chunks in flight: every consumed chunk is
        // replaced by exactly one new prefetch job.
        spawn_job(self.shared.clone());
        self.buf = bytes;
        self.pos = 0;
        Ok(())
    }
}

impl Read for ByteSource {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.buf.len() && !self.eof {
            self.fill().map_err(io::Error::from)?;
        }
        if self.eof {
            return Ok(0);
        }
        let n = (self.buf.len() - self.pos).min(out.len());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
