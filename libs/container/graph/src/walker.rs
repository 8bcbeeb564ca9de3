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

//! The graph walker (spec §4.4): drives [`layout::BlockAllocator`] and the
//! pointer tables to serialize or deserialize a schema-described graph.
//!
//! Ordering is breadth-first per substructure, depth-first across
//! substructures: filling one node's fields only *places* (reserves space
//! for) its pointer targets, queuing them; the outer drain loop fills each
//! queued node's own fields once the current one is done. A `follow_inline`
//! pointer is the one exception — its target is filled immediately, nested
//! in place, matching `FOLLOWING`'s "no separate placement" semantics.

use crate::arena::{Arena, FieldValue, Node, NodeId};
use crate::error::GraphError;
use crate::schema::{FieldKind, SchemaRegistry, TypeId};
use byteorder::{ByteOrder, LittleEndian};
use layout::{BlockAllocator, BlockId, FollowGuard, InverseTable, PointerTable, StreamOffset};
use pool::AssetKind;
use scriptstring::ScriptStringId;
use std::collections::HashMap;

fn align_up(value: u32, align: u32) -> u32 {
    if align <= 1 {
        return value;
    }
    (value + align - 1) & !(align - 1)
}

/// Checks whether `(kind, name)` names an asset available for `asset_ref`
/// resolution — this zone's own pool, or a previously loaded zone's (spec
/// §4.6 `FindAssetInAnyLoadedZone`). A strong reference that resolves to
/// `false` is fatal (`GraphError::MissingDependency`); a weak one is not.
pub type AssetResolver<'a> = &'a dyn Fn(AssetKind, &str) -> bool;

fn scalar_as_usize(fields: &[FieldValue], index: usize, type_id: TypeId) -> Result<usize, GraphError> {
    match fields.get(index) {
        Some(FieldValue::Scalar(v)) => Ok(*v as usize),
        _ => Err(GraphError::SchemaMismatch {
            type_id,
            field: "len_field",
        }),
    }
}

/// Serializes an [`Arena`] rooted at one node into per-block byte streams.
pub struct Writer<'a> {
    arena: &'a Arena,
    schemas: &'a SchemaRegistry,
    alloc: BlockAllocator,
    streams: HashMap<BlockId, Vec<u8>>,
    pointers: PointerTable<NodeId>,
    follow: FollowGuard<NodeId>,
    dependencies: Vec<(AssetKind, String)>,
    dependency_index: HashMap<(AssetKind, String), u32>,
    resolver: AssetResolver<'a>,
}

impl<'a> Writer<'a> {
    pub fn new(arena: &'a Arena, schemas: &'a SchemaRegistry, alloc: BlockAllocator, resolver: AssetResolver<'a>) -> Self {
        Self {
            arena,
            schemas,
            alloc,
            streams: HashMap::new(),
            pointers: PointerTable::new(),
            follow: FollowGuard::new(),
            dependencies: Vec::new(),
            dependency_index: HashMap::new(),
            resolver,
        }
    }

    pub fn into_parts(
        self,
    ) -> (
        BlockAllocator,
        HashMap<BlockId, Vec<u8>>,
        Vec<(AssetKind, String)>,
    ) {
        (self.alloc, self.streams, self.dependencies)
    }

    fn ensure_len(&mut self, block: BlockId, len: u32) {
        let buf = self.streams.entry(block).or_default();
        if (buf.len() as u32) < len {
            buf.resize(len as usize, 0);
        }
    }

    fn write_u16(&mut self, block: BlockId, offset: u32, value: u16) {
        self.ensure_len(block, offset + 2);
        let buf = self.streams.get_mut(&block).expect("ensured above");
        LittleEndian::write_u16(&mut buf[offset as usize..], value);
    }

    fn write_u32(&mut self, block: BlockId, offset: u32, value: u32) {
        self.ensure_len(block, offset + 4);
        let buf = self.streams.get_mut(&block).expect("ensured above");
        LittleEndian::write_u32(&mut buf[offset as usize..], value);
    }

    fn write_u64(&mut self, block: BlockId, offset: u32, value: u64) {
        self.ensure_len(block, offset + 8);
        let buf = self.streams.get_mut(&block).expect("ensured above");
        LittleEndian::write_u64(&mut buf[offset as usize..], value);
    }

    fn write_bytes(&mut self, block: BlockId, offset: u32, bytes: &[u8]) {
        self.ensure_len(block, offset + bytes.len() as u32);
        let buf = self.streams.get_mut(&block).expect("ensured above");
        buf[offset as usize..offset as usize + bytes.len()].copy_from_slice(bytes);
    }

    fn dependency_index_of(&mut self, kind: AssetKind, name: &str) -> u32 {
        let key = (kind, name.to_owned());
        if let Some(&idx) = self.dependency_index.get(&key) {
            return idx;
        }
        let idx = self.dependencies.len() as u32;
        self.dependencies.push(key.clone());
        self.dependency_index.insert(key, idx);
        idx
    }

    /// Reserve `node_id`'s region (Invariant C1: once per key) and queue its
    /// fields to be filled by the drain loop in [`Self::write_root`].
    fn place(&mut self, node_id: NodeId) -> Result<StreamOffset, GraphError> {
        if let Some(off) = self.pointers.get(&node_id) {
            return Ok(off);
        }
        let type_id = self.arena.get(node_id).type_id;
        let schema = self.schemas.get(type_id)?.clone();
        let base = self.alloc.alloc(schema.block, schema.fixed_size(), schema.align)?;
        let offset = StreamOffset::tagged(schema.block, base);
        self.ensure_len(schema.block, base + schema.fixed_size());
        self.pointers.place(node_id, || offset);
        Ok(offset)
    }

    pub fn write_root(&mut self, root: NodeId) -> Result<StreamOffset, GraphError> {
        let offset = self.place(root)?;
        self.fill(root)?;
        while let Some(id) = self.pointers.pop_queued() {
            if id != root {
                self.fill(id)?;
            }
        }
        Ok(offset)
    }

    fn fill(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        let type_id = self.arena.get(node_id).type_id;
        let schema = self.schemas.get(type_id)?.clone();
        let (block, base) = match self.pointers.get(&node_id) {
            Some(StreamOffset::Tagged { block, offset }) => (block, offset),
            _ => unreachable!("fill() called before place()"),
        };
        let mut cursor = base;
        for (i, field_schema) in schema.fields.iter().enumerate() {
            let value = self.arena.get(node_id).fields[i].clone();
            match &field_schema.kind {
                FieldKind::Scalar { width } => {
                    let FieldValue::Scalar(v) = value else {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    };
                    match width {
                        1 => self.write_bytes(block, cursor, &[v as u8]),
                        2 => self.write_u16(block, cursor, v as u16),
                        4 => self.write_u32(block, cursor, v as u32),
                        8 => self.write_u64(block, cursor, v),
                        _ => return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name }),
                    }
                }
                FieldKind::Str => {
                    let FieldValue::Str(s) = value else {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    };
                    if s.is_empty() {
                        self.write_u32(block, cursor, StreamOffset::Null.encode());
                    } else {
                        let mut bytes = s.into_bytes();
                        bytes.push(0);
                        let str_base = self.alloc.alloc(block, bytes.len() as u32, 1)?;
                        self.write_bytes(block, str_base, &bytes);
                        self.write_u32(block, cursor, StreamOffset::tagged(block, str_base).encode());
                    }
                }
                FieldKind::InlineBytes { len } => {
                    let FieldValue::InlineBytes(bytes) = value else {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    };
                    if bytes.len() as u32 != *len {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    }
                    self.write_bytes(block, cursor, &bytes);
                }
                FieldKind::Ptr { follow_inline, .. } => {
                    let FieldValue::Ptr(target_id) = value else {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    };
                    match target_id {
                        None => self.write_u32(block, cursor, StreamOffset::Null.encode()),
                        Some(id) => {
                            let target_block = self.schemas.get(self.arena.get(id).type_id)?.block;
                            layout::check_pointer_persistence(self.alloc.persistence(block)?, self.alloc.persistence(target_block)?)?;
                            if *follow_inline && self.pointers.get(&id).is_none() {
                                self.follow.enter(id)?;
                                self.write_u32(block, cursor, StreamOffset::Following.encode());
                                self.place(id)?;
                                self.fill(id)?;
                                self.follow.exit(id);
                            } else {
                                let off = self.place(id)?;
                                self.write_u32(block, cursor, off.encode());
                            }
                        }
                    }
                }
                FieldKind::PtrArray { target, block: tblock, align, .. } => {
                    let FieldValue::PtrArray(ids) = value else {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    };
                    if ids.is_empty() {
                        self.write_u32(block, cursor, StreamOffset::Null.encode());
                    } else if let Some(off) = self.pointers.get(&ids[0]) {
                        self.write_u32(block, cursor, off.encode());
                    } else {
                        layout::check_pointer_persistence(self.alloc.persistence(block)?, self.alloc.persistence(*tblock)?)?;
                        let elem_size = self.schemas.get(*target)?.fixed_size();
                        let total = elem_size * ids.len() as u32;
                        let elem_base = self.alloc.alloc(*tblock, total, *align)?;
                        self.ensure_len(*tblock, elem_base + total);
                        for (j, id) in ids.iter().enumerate() {
                            let elem_off = StreamOffset::tagged(*tblock, elem_base + j as u32 * elem_size);
                            self.pointers.place(*id, || elem_off);
                        }
                        self.write_u32(block, cursor, StreamOffset::tagged(*tblock, elem_base).encode());
                    }
                }
                FieldKind::AssetRef { weak, .. } => {
                    let FieldValue::AssetRef(reference) = value else {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    };
                    match reference {
                        None => self.write_u32(block, cursor, u32::MAX),
                        Some((k, name)) => {
                            if !*weak && !(self.resolver)(k, &name) {
                                return Err(GraphError::MissingDependency(k, name));
                            }
                            let idx = self.dependency_index_of(k, &name);
                            self.write_u32(block, cursor, idx);
                        }
                    }
                }
                FieldKind::ScriptString => {
                    let FieldValue::ScriptString(id) = value else {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    };
                    self.write_u16(block, cursor, id.0);
                }
                FieldKind::ScriptStringArray { block: tblock, align, .. } => {
                    let FieldValue::ScriptStringArray(ids) = value else {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    };
                    if ids.is_empty() {
                        self.write_u32(block, cursor, StreamOffset::Null.encode());
                    } else {
                        let total = 2 * ids.len() as u32;
                        let data_base = self.alloc.alloc(*tblock, total, *align)?;
                        for (j, id) in ids.iter().enumerate() {
                            self.write_u16(*tblock, data_base + 2 * j as u32, id.0);
                        }
                        self.write_u32(block, cursor, StreamOffset::tagged(*tblock, data_base).encode());
                    }
                }
                FieldKind::Blob { block: tblock, align, .. } => {
                    let FieldValue::Blob(bytes) = value else {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    };
                    if bytes.is_empty() {
                        self.write_u32(block, cursor, StreamOffset::Null.encode());
                    } else {
                        let data_base = self.alloc.alloc(*tblock, bytes.len() as u32, *align)?;
                        self.write_bytes(*tblock, data_base, &bytes);
                        self.write_u32(block, cursor, StreamOffset::tagged(*tblock, data_base).encode());
                    }
                }
                FieldKind::Union { max_size, .. } => {
                    let FieldValue::Union { raw, .. } = value else {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    };
                    let mut padded = raw;
                    padded.resize(*max_size as usize, 0);
                    self.write_bytes(block, cursor, &padded);
                }
                FieldKind::Custom { size, .. } => {
                    let FieldValue::Custom(raw) = value else {
                        return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                    };
                    let mut padded = raw;
                    padded.resize(*size as usize, 0);
                    self.write_bytes(block, cursor, &padded);
                }
            }
            cursor += field_schema.kind.fixed_size();
        }
        Ok(())
    }

    pub fn dependencies(&self) -> &[(AssetKind, String)] {
        &self.dependencies
    }
}

/// Deserializes per-block byte streams back into an [`Arena`], mirroring
/// [`Writer`]'s ordering exactly (spec §4.4 "Read").
pub struct Reader<'a> {
    schemas: &'a SchemaRegistry,
    streams: HashMap<BlockId, &'a [u8]>,
    dependencies: &'a [(AssetKind, String)],
    inverse: InverseTable<NodeId>,
    follow: FollowGuard<(BlockId, u32)>,
    placements: HashMap<NodeId, (BlockId, u32)>,
    arena: Arena,
    resolver: AssetResolver<'a>,
}

impl<'a> Reader<'a> {
    pub fn new(
        schemas: &'a SchemaRegistry,
        streams: HashMap<BlockId, &'a [u8]>,
        dependencies: &'a [(AssetKind, String)],
        resolver: AssetResolver<'a>,
    ) -> Self {
        Self {
            schemas,
            streams,
            dependencies,
            inverse: InverseTable::new(),
            follow: FollowGuard::new(),
            placements: HashMap::new(),
            arena: Arena::new(),
            resolver,
        }
    }

    pub fn into_arena(self) -> Arena {
        self.arena
    }

    fn read_bytes(&self, block: BlockId, offset: u32, len: u32) -> Result<&'a [u8], GraphError> {
        let buf = *self.streams.get(&block).ok_or(GraphError::ShortRead { block, needed: len, available: 0 })?;
        let start = offset as usize;
        let end = start + len as usize;
        if end > buf.len() {
            return Err(GraphError::ShortRead {
                block,
                needed: len,
                available: buf.len().saturating_sub(start) as u32,
            });
        }
        Ok(&buf[start..end])
    }

    fn read_u16(&self, block: BlockId, offset: u32) -> Result<u16, GraphError> {
        Ok(LittleEndian::read_u16(self.read_bytes(block, offset, 2)?))
    }

    fn read_u32(&self, block: BlockId, offset: u32) -> Result<u32, GraphError> {
        Ok(LittleEndian::read_u32(self.read_bytes(block, offset, 4)?))
    }

    fn read_u64(&self, block: BlockId, offset: u32) -> Result<u64, GraphError> {
        Ok(LittleEndian::read_u64(self.read_bytes(block, offset, 8)?))
    }

    fn read_cstr(&self, block: BlockId, offset: u32) -> Result<String, GraphError> {
        let buf = *self.streams.get(&block).ok_or(GraphError::ShortRead { block, needed: 1, available: 0 })?;
        let start = offset as usize;
        if start > buf.len() {
            return Err(GraphError::ShortRead { block, needed: 1, available: 0 });
        }
        let nul = buf[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(GraphError::ShortRead { block, needed: 1, available: 0 })?;
        String::from_utf8(buf[start..start + nul].to_vec()).map_err(|_| GraphError::InvalidUtf8)
    }

    fn resolve(&mut self, type_id: TypeId, offset: StreamOffset) -> Result<NodeId, GraphError> {
        let (block, off) = match offset {
            StreamOffset::Tagged { block, offset } => (block, offset),
            _ => {
                return Err(GraphError::SchemaMismatch { type_id, field: "ptr target" });
            }
        };
        let (id, existed) = self.inverse.resolve(block, off, || {
            self.arena.insert(Node { type_id, fields: Vec::new() })
        });
        if !existed {
            self.placements.insert(id, (block, off));
        }
        Ok(id)
    }

    pub fn read_root(&mut self, type_id: TypeId, root: StreamOffset) -> Result<NodeId, GraphError> {
        let id = self.resolve(type_id, root)?;
        self.fill(id)?;
        while let Some(next) = self.inverse.pop_queued() {
            if next != id {
                self.fill(next)?;
            }
        }
        Ok(id)
    }

    fn fill(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        let type_id = self.arena.get(node_id).type_id;
        let schema = self.schemas.get(type_id)?.clone();
        let (block, base) = self.placements[&node_id];
        let mut cursor = base;
        let mut fields: Vec<FieldValue> = Vec::with_capacity(schema.fields.len());
        for field_schema in &schema.fields {
            let value = match &field_schema.kind {
                FieldKind::Scalar { width } => {
                    let v = match width {
                        1 => self.read_bytes(block, cursor, 1)?[0] as u64,
                        2 => self.read_u16(block, cursor)? as u64,
                        4 => self.read_u32(block, cursor)? as u64,
                        8 => self.read_u64(block, cursor)?,
                        _ => return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name }),
                    };
                    FieldValue::Scalar(v)
                }
                FieldKind::Str => {
                    let raw = self.read_u32(block, cursor)?;
                    if raw == 0 {
                        FieldValue::Str(String::new())
                    } else {
                        let (sblock, soff) = tagged_parts(StreamOffset::decode(raw), type_id, field_schema.name)?;
                        FieldValue::Str(self.read_cstr(sblock, soff)?)
                    }
                }
                FieldKind::InlineBytes { len } => {
                    FieldValue::InlineBytes(self.read_bytes(block, cursor, *len)?.to_vec())
                }
                FieldKind::Ptr { target, follow_inline, .. } => {
                    let raw = self.read_u32(block, cursor)?;
                    if raw == 0 {
                        FieldValue::Ptr(None)
                    } else if raw == u32::MAX {
                        if !follow_inline {
                            return Err(GraphError::SchemaMismatch { type_id, field: field_schema.name });
                        }
                        let target_schema = self.schemas.get(*target)?.clone();
                        let follow_off = align_up(cursor + 4, target_schema.align);
                        self.follow.enter((block, follow_off))?;
                        let id = self.arena.insert(Node { type_id: *target, fields: Vec::new() });
                        self.placements.insert(id, (block, follow_off));
                        self.fill(id)?;
                        self.follow.exit((block, follow_off));
                        FieldValue::Ptr(Some(id))
                    } else {
                        let id = self.resolve(*target, StreamOffset::decode(raw))?;
                        FieldValue::Ptr(Some(id))
                    }
                }
                FieldKind::PtrArray { target, len_field, .. } => {
                    let raw = self.read_u32(block, cursor)?;
                    if raw == 0 {
                        FieldValue::PtrArray(Vec::new())
                    } else {
                        let (tblock, base_off) = tagged_parts(StreamOffset::decode(raw), type_id, field_schema.name)?;
                        let len = scalar_as_usize(&fields, *len_field, type_id)?;
                        let elem_size = self.schemas.get(*target)?.fixed_size();
                        let mut ids = Vec::with_capacity(len);
                        for j in 0..len {
                            let elem_off = base_off + j as u32 * elem_size;
                            let (id, existed) = self.inverse.resolve(tblock, elem_off, || {
                                self.arena.insert(Node { type_id: *target, fields: Vec::new() })
                            });
                            if !existed {
                                self.placements.insert(id, (tblock, elem_off));
                            }
                            ids.push(id);
                        }
                        FieldValue::PtrArray(ids)
                    }
                }
                FieldKind::AssetRef { weak, .. } => {
                    let raw = self.read_u32(block, cursor)?;
                    if raw == u32::MAX {
                        FieldValue::AssetRef(None)
                    } else {
                        let dep = self
                            .dependencies
                            .get(raw as usize)
                            .ok_or(GraphError::BadDependencyIndex(raw))?;
                        if !*weak && !(self.resolver)(dep.0, &dep.1) {
                            return Err(GraphError::MissingDependency(dep.0, dep.1.clone()));
                        }
                        FieldValue::AssetRef(Some(dep.clone()))
                    }
                }
                FieldKind::ScriptString => FieldValue::ScriptString(ScriptStringId(self.read_u16(block, cursor)?)),
                FieldKind::ScriptStringArray { len_field, .. } => {
                    let raw = self.read_u32(block, cursor)?;
                    if raw == 0 {
                        FieldValue::ScriptStringArray(Vec::new())
                    } else {
                        let (dblock, doff) = tagged_parts(StreamOffset::decode(raw), type_id, field_schema.name)?;
                        let len = scalar_as_usize(&fields, *len_field, type_id)?;
                        let mut ids = Vec::with_capacity(len);
                        for j in 0..len {
                            ids.push(ScriptStringId(self.read_u16(dblock, doff + 2 * j as u32)?));
                        }
                        FieldValue::ScriptStringArray(ids)
                    }
                }
                FieldKind::Blob { len_field, .. } => {
                    let raw = self.read_u32(block, cursor)?;
                    if raw == 0 {
                        FieldValue::Blob(Vec::new())
                    } else {
                        let (dblock, doff) = tagged_parts(StreamOffset::decode(raw), type_id, field_schema.name)?;
                        let len = scalar_as_usize(&fields, *len_field, type_id)? as u32;
                        FieldValue::Blob(self.read_bytes(dblock, doff, len)?.to_vec())
                    }
                }
                FieldKind::Union { tag_field, max_size } => {
                    let tag = scalar_as_usize(&fields, *tag_field, type_id)? as u32;
                    let raw = self.read_bytes(block, cursor, *max_size)?.to_vec();
                    FieldValue::Union { tag, raw }
                }
                FieldKind::Custom { size, .. } => FieldValue::Custom(self.read_bytes(block, cursor, *size)?.to_vec()),
            };
            fields.push(value);
            cursor += field_schema.kind.fixed_size();
        }
        self.arena.get_mut(node_id).fields = fields;
        Ok(())
    }
}

fn tagged_parts(offset: StreamOffset, type_id: TypeId, field: &'static str) -> Result<(BlockId, u32), GraphError> {
    match offset {
        StreamOffset::Tagged { block, offset } => Ok((block, offset)),
        _ => Err(GraphError::SchemaMismatch { type_id, field }),
    }
}

/// Post-load backpatch hook (spec §4.4 "Finalize"): run once per node of a
/// registered type after the whole graph has materialized, e.g. to compute
/// a derived bitmask from a set of now-resolved pointer fields.
pub trait FinalizeHook {
    fn finalize(&self, arena: &mut Arena, node: NodeId) -> Result<(), GraphError>;
}

#[derive(Default)]
pub struct FinalizeRegistry {
    hooks: HashMap<TypeId, Box<dyn FinalizeHook>>,
}

impl FinalizeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_id: TypeId, hook: Box<dyn FinalizeHook>) {
        self.hooks.insert(type_id, hook);
    }

    pub fn run(&self, arena: &mut Arena) -> Result<(), GraphError> {
        for id in arena.ids() {
            let type_id = arena.get(id).type_id;
            if let Some(hook) = self.hooks.get(&type_id) {
                hook.finalize(arena, id)?;
            }
        }
        Ok(())
    }
}
