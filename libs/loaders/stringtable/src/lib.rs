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

//! The `stringtable` asset kind (spec §6.2 worked example, scenario S1): a
//! comma-separated source file of text cells, loaded into a table of rows of
//! hashed cells.
//!
//! `TYPE_TABLE` is this kind's numeric `AssetKind` reused as a `TypeId`, the
//! convention the zone driver uses for every top-level asset root. `TYPE_ROW`
//! and `TYPE_CELL` are substructure types private to this loader; they live
//! far outside the small range of kind-derived ids to avoid colliding with
//! another loader's own root type in a shared `SchemaRegistry`.

use graph::{Arena, FieldKind, FieldSchema, FieldValue, Node, NodeId, SchemaRegistry, TypeId, TypeSchema};
use layout::BlockId;
use log::debug;
use pool::AssetKind;
use search_path::SearchPath;
use strhash::r_hash_string;
use zone::{AssetLoader, Manager, ZoneError};

pub const KIND: AssetKind = AssetKind(1);
pub const TYPE_TABLE: TypeId = KIND.0 as TypeId;
pub const TYPE_ROW: TypeId = 0x5354_0001;
pub const TYPE_CELL: TypeId = 0x5354_0002;

/// Registers the table/row/cell schemas into `registry`, all three
/// addressed against `block` (the zone's "normal" persistence block in
/// every generation profile built so far).
pub fn register_schema(registry: &mut SchemaRegistry, block: BlockId) {
    registry.register(TypeSchema {
        id: TYPE_TABLE,
        name: "StringTable",
        block,
        align: 4,
        fields: vec![
            FieldSchema { name: "row_count", kind: FieldKind::Scalar { width: 4 } },
            FieldSchema { name: "rows", kind: FieldKind::PtrArray { target: TYPE_ROW, len_field: 0, block, align: 4 } },
        ],
    });
    registry.register(TypeSchema {
        id: TYPE_ROW,
        name: "StringTableRow",
        block,
        align: 4,
        fields: vec![
            FieldSchema { name: "cell_count", kind: FieldKind::Scalar { width: 4 } },
            FieldSchema { name: "cells", kind: FieldKind::PtrArray { target: TYPE_CELL, len_field: 0, block, align: 4 } },
        ],
    });
    registry.register(TypeSchema {
        id: TYPE_CELL,
        name: "StringTableCell",
        block,
        align: 4,
        fields: vec![
            FieldSchema { name: "text", kind: FieldKind::Str },
            FieldSchema { name: "hash", kind: FieldKind::Scalar { width: 4 } },
        ],
    });
}

/// Reads `name` as a headerless CSV file and builds a row/cell node tree
/// under it, hashing every cell with [`strhash::r_hash_string`] (spec §8 S1).
pub struct StringTableLoader;

impl AssetLoader for StringTableLoader {
    fn kind_name(&self) -> &'static str {
        "stringtable"
    }

    fn handled_kind(&self) -> AssetKind {
        KIND
    }

    fn create_empty(&self, _name: &str, arena: &mut Arena) -> NodeId {
        arena.insert(Node { type_id: TYPE_TABLE, fields: vec![FieldValue::Scalar(0), FieldValue::PtrArray(Vec::new())] })
    }

    fn can_load_from_raw(&self) -> bool {
        true
    }

    fn load_from_raw(&self, name: &str, source: &SearchPath, manager: &mut Manager, node: NodeId) -> Result<(), ZoneError> {
        let bytes = source.read(name)?;
        let mut csv_reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(bytes.as_ref());

        let mut row_ids = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(|e| ZoneError::MalformedLine(e.to_string()))?;
            let mut cell_ids = Vec::with_capacity(record.len());
            for cell in record.iter() {
                let hash = r_hash_string(cell, 0);
                let cell_node = manager.arena.insert(Node {
                    type_id: TYPE_CELL,
                    fields: vec![FieldValue::Str(cell.to_owned()), FieldValue::Scalar(hash as u64)],
                });
                cell_ids.push(cell_node);
            }
            let cell_count = cell_ids.len() as u64;
            row_ids.push(manager.arena.insert(Node {
                type_id: TYPE_ROW,
                fields: vec![FieldValue::Scalar(cell_count), FieldValue::PtrArray(cell_ids)],
            }));
        }

        debug!("{name:?} loaded as a stringtable with {} rows", row_ids.len());
        let row_count = row_ids.len() as u64;
        *manager.arena.get_mut(node) = Node {
            type_id: TYPE_TABLE,
            fields: vec![FieldValue::Scalar(row_count), FieldValue::PtrArray(row_ids)],
        };
        Ok(())
    }
}
