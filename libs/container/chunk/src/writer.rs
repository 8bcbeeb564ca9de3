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
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

/// Accumulates submitted bytes and emits them as length-prefixed,
/// processor-encoded chunks. The write side has no concurrency of its own
/// (spec §5: the only parallelism is in decode); it is a plain serial
/// accumulate-then-flush pipeline, the exact reverse of [`crate::ByteSource`].
pub struct ByteSink<'a, W: Write> {
    inner: &'a mut W,
    processors: Vec<ChunkProcessorKind>,
    chunk_size: usize,
    stream_index: usize,
    buf: Vec<u8>,
    finished: bool,
}

impl<'a, W: Write> ByteSink<'a, W> {
    pub fn new(inner: &'a mut W, config: PipelineConfig) -> Self {
        Self {
            inner,
            processors: config.processors,
            chunk_size: config.chunk_size,
            stream_index: 0,
            buf: Vec::with_capacity(config.chunk_size),
            finished: false,
        }
    }

    fn emit_chunk(&mut self, plain: &[u8]) -> Result<(), ChunkError> {
        let mut encoded = plain.to_vec();
        for proc in self.processors.iter().rev() {
            encoded = proc.encode(self.stream_index, &encoded)?;
        }
        self.inner
            .write_u32::<LittleEndian>(encoded.len() as u32)?;
        self.inner.write_all(&encoded)?;
        self.stream_index += 1;
        Ok(())
    }

    fn drain_full_chunks(&mut self) -> Result<(), ChunkError> {
        while self.buf.len() >= self.chunk_size {
            let rest = self.buf.split_off(self.chunk_size);
            let chunk = std::mem::replace(&mut self.buf, rest);
            self.emit_chunk(&chunk)?;
        }
        Ok(())
    }

    /// Flush any partial chunk and write the zero-length EOF marker. Must be
    /// called exactly once; dropping a `ByteSink` without calling `finish`
    /// leaves the stream without its EOF marker.
    pub fn finish(mut self) -> Result<(), ChunkError> {
        self.finish_inner()
    }

    fn finish_inner(&mut self) -> Result<(), ChunkError> {
        if self.finished {
            return Ok(());
        }
        self.drain_full_chunks()?;
        if !self.buf.is_empty() {
            let chunk = std::mem::take(&mut self.buf);
            self.emit_chunk(&chunk)?;
        }
        self.inner.write_u32::<LittleEndian>(0)?;
        self.finished = true;
        Ok(())
    }
}

impl<'a, W: Write> Write for ByteSink<'a, W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        self.drain_full_chunks().map_err(io::Error::from)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<'a, W: Write> Drop for ByteSink<'a, W> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.finish_inner();
        }
    }
}
