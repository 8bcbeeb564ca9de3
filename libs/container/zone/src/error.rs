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

use chunk::ChunkError;
use graph::GraphError;
use layout::LayoutError;
use pool::{AssetKind, PoolError};
use scriptstring::ScriptStringError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ZoneError {
    #[error("no loader registered for asset kind {0:?}")]
    NoSuchLoader(AssetKind),

    #[error("no loader registered for asset-kind identifier {0:?}")]
    UnknownAssetKind(String),

    #[error("asset ({0:?}, {1:?}) could not be loaded from the GDT, raw source, or any loaded zone")]
    UnresolvedAsset(AssetKind, String),

    #[error("missing required dependency ({0:?}, {1:?})")]
    MissingDependency(AssetKind, String),

    #[error("duplicate asset ({0:?}, {1:?})")]
    DuplicateAsset(AssetKind, String),

    #[error("zone definition is missing a required 'game' key")]
    MissingGame,

    #[error("unrecognized game tag {0:?}")]
    UnknownGame(String),

    #[error("key {key:?} set to conflicting values {first:?} and {second:?} across includes")]
    ConflictingMetadata { key: String, first: String, second: String },

    #[error("malformed zone definition line: {0:?}")]
    MalformedLine(String),

    #[error("unrecognized fast-file magic {0:?}")]
    InvalidMagic(String),

    #[error("unsupported fast-file version {0}")]
    InvalidVersion(u32),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    ScriptString(#[from] ScriptStringError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("zone definition source error: {0}")]
    Source(String),
}

impl From<std::io::Error> for ZoneError {
    fn from(e: std::io::Error) -> Self {
        ZoneError::Io(e.to_string())
    }
}

impl From<search_path::SearchPathError> for ZoneError {
    fn from(e: search_path::SearchPathError) -> Self {
        ZoneError::Source(e.to_string())
    }
}
