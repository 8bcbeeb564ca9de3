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

//! The in-memory graph the walker reads from and writes into: an arena of
//! [`Node`]s addressed by [`NodeId`], standing in for the pointer-linked
//! structures a loaded zone's payload actually forms. Pointers between
//! substructures are `NodeId`s, not raw addresses (spec §5 "Design Notes":
//! model in-memory pointers as arena indices).

use crate::schema::TypeId;
use pool::AssetKind;
use scriptstring::ScriptStringId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Scalar(u64),
    Str(String),
    InlineBytes(Vec<u8>),
    Ptr(Option<NodeId>),
    PtrArray(Vec<NodeId>),
    AssetRef(Option<(AssetKind, String)>),
    ScriptString(ScriptStringId),
    ScriptStringArray(Vec<ScriptStringId>),
    Blob(Vec<u8>),
    Union { tag: u32, raw: Vec<u8> },
    Custom(Vec<u8>),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub type_id: TypeId,
    pub fields: Vec<FieldValue>,
}

#[derive(Clone, Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }
}
