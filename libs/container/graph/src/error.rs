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

use crate::schema::TypeId;
use layout::{BlockId, LayoutError};
use pool::AssetKind;
use scriptstring::ScriptStringError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("no schema registered for type {0}")]
    UnknownType(TypeId),

    #[error("field {field} of type {type_id} did not hold the value shape its schema declares")]
    SchemaMismatch { type_id: TypeId, field: &'static str },

    #[error("missing strong dependency ({0:?}, {1:?})")]
    MissingDependency(AssetKind, String),

    #[error("dependency index {0} out of range")]
    BadDependencyIndex(u32),

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    ScriptStringRange(#[from] ScriptStringError),

    #[error("truncated stream: needed {needed} bytes in block {block:?}, had {available}")]
    ShortRead {
        block: BlockId,
        needed: u32,
        available: u32,
    },
}
