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

//! The chunk pipeline (spec §4.1): wraps a `.ff` file's on-disk
//! length-prefixed, optionally compressed/enciphered chunk stream in a
//! logically contiguous, forward-only byte stream, with parallel decode on
//! read and serial accumulate-then-flush on write.

mod error;
mod processor;
mod reader;
mod writer;

pub use error::ChunkError;
pub use processor::{CipherScheme, ChunkProcessorKind};
pub use reader::ByteSource;
pub use writer::ByteSink;

use std::io::{Read, Write};

/// An ordered list of chunk processors plus the chunk-size bound they must
/// all respect, and the number of decode streams to prefetch on read.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub processors: Vec<ChunkProcessorKind>,
    pub worker_count: usize,
}

impl PipelineConfig {
    pub fn new(chunk_size: usize, processors: Vec<ChunkProcessorKind>, worker_count: usize) -> Self {
        Self {
            chunk_size,
            processors,
            worker_count,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 0x8000,
            processors: Vec::new(),
            worker_count: 4,
        }
    }
}

pub fn open_reader<R: Read + Send + 'static>(inner: R, config: PipelineConfig) -> ByteSource {
    ByteSource::new(inner, config)
}

pub fn open_writer<W: Write>(inner: &mut W, config: PipelineConfig) -> ByteSink<'_, W> {
    ByteSink::new(inner, config)
}
