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

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ChunkError {
    #[error("chunk of {size} bytes exceeds configured maximum of {max} bytes")]
    InvalidChunkSize { size: usize, max: usize },

    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("decipher failed: {0}")]
    Decipher(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChunkError {
    fn from(e: std::io::Error) -> Self {
        ChunkError::Io(e.to_string())
    }
}

impl From<ChunkError> for std::io::Error {
    fn from(e: ChunkError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    }
}
