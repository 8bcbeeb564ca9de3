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

//! Field-kind schema describing a zone generation's asset payload shapes
//! (spec §4.4). One [`TypeSchema`] per substructure type; the walker never
//! hardcodes a shape, it only interprets whatever is registered here.

use crate::error::GraphError;
use layout::BlockId;
use pool::AssetKind;
use std::collections::HashMap;

pub type TypeId = u32;

/// The ten field shapes the walker understands (spec §4.4 "Field kinds").
#[derive(Clone, Debug)]
pub enum FieldKind {
    Scalar { width: u8 },
    Str,
    InlineBytes { len: u32 },
    Ptr { target: TypeId, block: BlockId, align: u32, follow_inline: bool },
    PtrArray { target: TypeId, len_field: usize, block: BlockId, align: u32 },
    AssetRef { kind: AssetKind, weak: bool },
    ScriptString,
    ScriptStringArray { len_field: usize, block: BlockId, align: u32 },
    Blob { len_field: usize, block: BlockId, align: u32 },
    Union { tag_field: usize, max_size: u32 },
    Custom { id: &'static str, size: u32 },
}

impl FieldKind {
    /// Size of the field's own slot in its owning substructure. For
    /// out-of-line kinds (`Str`, `PtrArray`, `Blob`, `ScriptStringArray`)
    /// this is the 4-byte stream offset, not the referenced payload.
    pub fn fixed_size(&self) -> u32 {
        match self {
            FieldKind::Scalar { width } => *width as u32,
            FieldKind::Str => 4,
            FieldKind::InlineBytes { len } => *len,
            FieldKind::Ptr { .. } => 4,
            FieldKind::PtrArray { .. } => 4,
            FieldKind::AssetRef { .. } => 4,
            FieldKind::ScriptString => 2,
            FieldKind::ScriptStringArray { .. } => 4,
            FieldKind::Blob { .. } => 4,
            FieldKind::Union { max_size, .. } => *max_size,
            FieldKind::Custom { size, .. } => *size,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// One substructure's shape: its designated block, alignment, and ordered
/// field list. Fields are packed with no inter-field padding; the struct as
/// a whole is aligned to `align` when allocated (spec §4.2, simplified —
/// this crate does not reproduce source-type struct padding rules, which
/// sit outside the invariants spec §4 actually enumerates).
#[derive(Clone, Debug)]
pub struct TypeSchema {
    pub id: TypeId,
    pub name: &'static str,
    pub block: BlockId,
    pub align: u32,
    pub fields: Vec<FieldSchema>,
}

impl TypeSchema {
    pub fn fixed_size(&self) -> u32 {
        self.fields.iter().map(|f| f.kind.fixed_size()).sum()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    types: HashMap<TypeId, TypeSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: TypeSchema) {
        self.types.insert(schema.id, schema);
    }

    pub fn get(&self, id: TypeId) -> Result<&TypeSchema, GraphError> {
        self.types.get(&id).ok_or(GraphError::UnknownType(id))
    }
}
