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

//! The graph walker (spec §4.4): schema-driven serialization of typed,
//! pointer-linked asset payloads over the block allocator and pointer codec
//! (the `layout` crate).

mod arena;
mod error;
mod schema;
mod walker;

pub use arena::{Arena, FieldValue, Node, NodeId};
pub use error::GraphError;
pub use schema::{FieldKind, FieldSchema, SchemaRegistry, TypeId, TypeSchema};
pub use walker::{AssetResolver, FinalizeHook, FinalizeRegistry, Reader, Writer};

#[cfg(test)]
mod tests {
    use super::*;
    use layout::{BlockAllocator, BlockCatalog, BlockDef, BlockId, Persistence, StreamOffset};
    use pool::AssetKind;
    use scriptstring::ScriptStringId;
    use std::collections::HashMap;

    const ROW: TypeId = 1;
    const LIST_NODE: TypeId = 2;
    const WEAPON: TypeId = 3;
    const ATTACHMENT: TypeId = 4;
    const IMAGE_REF: TypeId = 5;

    /// Stand-in for schemas with no `asset_ref` fields, where the resolver
    /// is declared but never actually called.
    fn no_refs(_: AssetKind, _: &str) -> bool {
        false
    }

    fn catalog() -> BlockCatalog {
        BlockCatalog::new(vec![
            BlockDef::new(0, "normal", Persistence::Normal, false, 4),
            BlockDef::new(1, "runtime", Persistence::Runtime, false, 4),
        ])
        .unwrap()
    }

    fn normal() -> BlockId {
        BlockId(0)
    }

    /// Two flat string cells, mirroring a stringtable row: no pointers at
    /// all, exercising `Str`'s inline bump allocation.
    fn row_schema() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(TypeSchema {
            id: ROW,
            name: "Row",
            block: normal(),
            align: 4,
            fields: vec![
                FieldSchema { name: "col0", kind: FieldKind::Str },
                FieldSchema { name: "col1", kind: FieldKind::Str },
            ],
        });
        reg
    }

    #[test]
    fn flat_string_struct_round_trips() {
        let schemas = row_schema();
        let mut arena = Arena::new();
        let row = arena.insert(Node {
            type_id: ROW,
            fields: vec![
                FieldValue::Str("hello".to_owned()),
                FieldValue::Str("world".to_owned()),
            ],
        });

        let mut writer = Writer::new(&arena, &schemas, BlockAllocator::new(catalog()), &no_refs);
        let root_offset = writer.write_root(row).unwrap();
        let (_alloc, streams, deps) = writer.into_parts();
        assert!(deps.is_empty());

        let borrowed: HashMap<BlockId, &[u8]> = streams.iter().map(|(&k, v)| (k, v.as_slice())).collect();
        let mut reader = Reader::new(&schemas, borrowed, &[], &no_refs);
        let read_root = reader.read_root(ROW, root_offset).unwrap();
        let out = reader.into_arena();
        assert_eq!(out.get(read_root).fields[0], FieldValue::Str("hello".to_owned()));
        assert_eq!(out.get(read_root).fields[1], FieldValue::Str("world".to_owned()));
    }

    /// A singly linked list of three nodes via a non-follow-inline `Ptr`,
    /// checking pointer identity (a node referenced twice resolves to the
    /// same id both sides) and that the BFS-per-substructure queue drains
    /// every reachable node regardless of chunking.
    fn list_schema() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(TypeSchema {
            id: LIST_NODE,
            name: "ListNode",
            block: normal(),
            align: 4,
            fields: vec![
                FieldSchema { name: "value", kind: FieldKind::Scalar { width: 4 } },
                FieldSchema {
                    name: "next",
                    kind: FieldKind::Ptr { target: LIST_NODE, block: normal(), align: 4, follow_inline: false },
                },
            ],
        });
        reg
    }

    #[test]
    fn pointer_chain_round_trips_and_preserves_identity() {
        let schemas = list_schema();
        let mut arena = Arena::new();
        let tail = arena.insert(Node { type_id: LIST_NODE, fields: vec![FieldValue::Scalar(3), FieldValue::Ptr(None)] });
        let mid = arena.insert(Node { type_id: LIST_NODE, fields: vec![FieldValue::Scalar(2), FieldValue::Ptr(Some(tail))] });
        let head = arena.insert(Node { type_id: LIST_NODE, fields: vec![FieldValue::Scalar(1), FieldValue::Ptr(Some(mid))] });

        let mut writer = Writer::new(&arena, &schemas, BlockAllocator::new(catalog()), &no_refs);
        let root_offset = writer.write_root(head).unwrap();
        let (_alloc, streams, _deps) = writer.into_parts();

        let borrowed: HashMap<BlockId, &[u8]> = streams.iter().map(|(&k, v)| (k, v.as_slice())).collect();
        let mut reader = Reader::new(&schemas, borrowed, &[], &no_refs);
        let read_head = reader.read_root(LIST_NODE, root_offset).unwrap();
        let out = reader.into_arena();

        assert_eq!(out.get(read_head).fields[0], FieldValue::Scalar(1));
        let FieldValue::Ptr(Some(read_mid)) = out.get(read_head).fields[1] else { panic!("expected ptr") };
        assert_eq!(out.get(read_mid).fields[0], FieldValue::Scalar(2));
        let FieldValue::Ptr(Some(read_tail)) = out.get(read_mid).fields[1] else { panic!("expected ptr") };
        assert_eq!(out.get(read_tail).fields[0], FieldValue::Scalar(3));
        assert_eq!(out.get(read_tail).fields[1], FieldValue::Ptr(None));
    }

    /// A `follow_inline` pointer is written as `FOLLOWING` and its target's
    /// fields immediately follow in the same block, rather than being
    /// queued to the end.
    #[test]
    fn follow_inline_pointer_lands_immediately_after_its_slot() {
        let mut schemas = SchemaRegistry::new();
        schemas.register(TypeSchema {
            id: LIST_NODE,
            name: "Owner",
            block: normal(),
            align: 4,
            fields: vec![FieldSchema {
                name: "inline_child",
                kind: FieldKind::Ptr { target: WEAPON, block: normal(), align: 4, follow_inline: true },
            }],
        });
        schemas.register(TypeSchema {
            id: WEAPON,
            name: "Child",
            block: normal(),
            align: 4,
            fields: vec![FieldSchema { name: "tag", kind: FieldKind::Scalar { width: 4 } }],
        });

        let mut arena = Arena::new();
        let child = arena.insert(Node { type_id: WEAPON, fields: vec![FieldValue::Scalar(77)] });
        let owner = arena.insert(Node { type_id: LIST_NODE, fields: vec![FieldValue::Ptr(Some(child))] });

        let mut writer = Writer::new(&arena, &schemas, BlockAllocator::new(catalog()), &no_refs);
        let root_offset = writer.write_root(owner).unwrap();
        let (_alloc, streams, _deps) = writer.into_parts();
        let bytes = &streams[&normal()];
        // slot is FOLLOWING (u32::MAX), and the child's 4-byte tag is the
        // very next thing in the block.
        assert_eq!(&bytes[0..4], &u32::MAX.to_le_bytes());
        assert_eq!(&bytes[4..8], &77u32.to_le_bytes());

        let borrowed: HashMap<BlockId, &[u8]> = streams.iter().map(|(&k, v)| (k, v.as_slice())).collect();
        let mut reader = Reader::new(&schemas, borrowed, &[], &no_refs);
        let read_owner = reader.read_root(LIST_NODE, root_offset).unwrap();
        let out = reader.into_arena();
        let FieldValue::Ptr(Some(read_child)) = out.get(read_owner).fields[0] else { panic!("expected ptr") };
        assert_eq!(out.get(read_child).fields[0], FieldValue::Scalar(77));
    }

    /// A fixed-size inline array of (possibly null) pointers, with a
    /// finalize hook deriving a bitmask from which slots resolved —
    /// the shape behind a weapon's attachment-set mask.
    struct AttachmentMaskHook;
    impl FinalizeHook for AttachmentMaskHook {
        fn finalize(&self, arena: &mut Arena, node: NodeId) -> Result<(), GraphError> {
            let mask: u64 = (0..4)
                .map(|i| match arena.get(node).fields[i] {
                    FieldValue::Ptr(Some(_)) => 1u64 << i,
                    FieldValue::Ptr(None) => 0,
                    _ => 0,
                })
                .sum();
            arena.get_mut(node).fields.push(FieldValue::Scalar(mask));
            Ok(())
        }
    }

    fn weapon_schema() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        let attach_ptr = |i: usize| FieldSchema {
            name: match i {
                0 => "attachment_0",
                1 => "attachment_1",
                2 => "attachment_2",
                _ => "attachment_3",
            },
            kind: FieldKind::Ptr { target: ATTACHMENT, block: normal(), align: 4, follow_inline: false },
        };
        reg.register(TypeSchema {
            id: WEAPON,
            name: "Weapon",
            block: normal(),
            align: 4,
            fields: (0..4).map(attach_ptr).collect(),
        });
        reg.register(TypeSchema {
            id: ATTACHMENT,
            name: "Attachment",
            block: normal(),
            align: 4,
            fields: vec![FieldSchema { name: "id", kind: FieldKind::Scalar { width: 4 } }],
        });
        reg
    }

    #[test]
    fn attachment_mask_finalize_hook_reflects_resolved_slots() {
        let schemas = weapon_schema();
        let mut arena = Arena::new();
        let scope = arena.insert(Node { type_id: ATTACHMENT, fields: vec![FieldValue::Scalar(10)] });
        let grip = arena.insert(Node { type_id: ATTACHMENT, fields: vec![FieldValue::Scalar(20)] });
        let weapon = arena.insert(Node {
            type_id: WEAPON,
            fields: vec![
                FieldValue::Ptr(Some(scope)),
                FieldValue::Ptr(None),
                FieldValue::Ptr(Some(grip)),
                FieldValue::Ptr(None),
            ],
        });

        let mut writer = Writer::new(&arena, &schemas, BlockAllocator::new(catalog()), &no_refs);
        let root_offset = writer.write_root(weapon).unwrap();
        let (_alloc, streams, _deps) = writer.into_parts();

        let borrowed: HashMap<BlockId, &[u8]> = streams.iter().map(|(&k, v)| (k, v.as_slice())).collect();
        let mut reader = Reader::new(&schemas, borrowed, &[], &no_refs);
        let read_weapon = reader.read_root(WEAPON, root_offset).unwrap();
        let mut out = reader.into_arena();

        let mut hooks = FinalizeRegistry::new();
        hooks.register(WEAPON, Box::new(AttachmentMaskHook));
        hooks.run(&mut out).unwrap();

        assert_eq!(out.get(read_weapon).fields[4], FieldValue::Scalar(0b0101));
    }

    /// `asset_ref` fields serialize as an index into the asset's own
    /// dependency table, not a stream pointer — allowing them to name
    /// assets that may live in a different, already-loaded zone.
    fn image_ref_schema(weak: bool) -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(TypeSchema {
            id: IMAGE_REF,
            name: "Material",
            block: normal(),
            align: 4,
            fields: vec![FieldSchema {
                name: "diffuse",
                kind: FieldKind::AssetRef { kind: AssetKind(9), weak },
            }],
        });
        reg
    }

    /// Stands in for a previously loaded zone's own pool — the thing
    /// `asset_ref` resolution actually checks against
    /// (`FindAssetInAnyLoadedZone`), rather than inert dependency-table data.
    fn loaded_zone_pool(kind: AssetKind, name: &str) -> pool::AssetPool<()> {
        let mut loaded = pool::AssetPool::new();
        loaded
            .register(pool::AssetRecord {
                kind,
                name: name.to_owned(),
                identity: 0,
                payload: (),
                dependencies: Vec::new(),
                used_script_strings: Vec::new(),
            })
            .unwrap();
        loaded
    }

    #[test]
    fn asset_ref_round_trips_through_dependency_table() {
        let schemas = image_ref_schema(false);
        let mut arena = Arena::new();
        let material = arena.insert(Node {
            type_id: IMAGE_REF,
            fields: vec![FieldValue::AssetRef(Some((AssetKind(9), "$white".to_owned())))],
        });
        let loaded = loaded_zone_pool(AssetKind(9), "$white");
        let resolver = |kind: AssetKind, name: &str| loaded.find(kind, name).is_some();

        let mut writer = Writer::new(&arena, &schemas, BlockAllocator::new(catalog()), &resolver);
        let root_offset = writer.write_root(material).unwrap();
        assert_eq!(writer.dependencies(), &[(AssetKind(9), "$white".to_owned())]);
        let (_alloc, streams, deps) = writer.into_parts();

        let borrowed: HashMap<BlockId, &[u8]> = streams.iter().map(|(&k, v)| (k, v.as_slice())).collect();
        let mut reader = Reader::new(&schemas, borrowed, &deps, &resolver);
        let read_material = reader.read_root(IMAGE_REF, root_offset).unwrap();
        let out = reader.into_arena();
        assert_eq!(
            out.get(read_material).fields[0],
            FieldValue::AssetRef(Some((AssetKind(9), "$white".to_owned())))
        );
    }

    /// Scenario S6: an `asset_ref` naming an asset this zone never
    /// registered itself still resolves, against a previously loaded
    /// zone's pool, to that zone's own asset.
    #[test]
    fn strong_asset_ref_resolves_against_a_previously_loaded_zones_pool() {
        let schemas = image_ref_schema(false);
        let mut arena = Arena::new();
        let material = arena.insert(Node {
            type_id: IMAGE_REF,
            fields: vec![FieldValue::AssetRef(Some((AssetKind(9), "$white".to_owned())))],
        });
        let loaded = loaded_zone_pool(AssetKind(9), "$white");
        let earlier_handle = loaded.find(AssetKind(9), "$white").unwrap();
        let resolver = |kind: AssetKind, name: &str| loaded.find(kind, name).is_some();

        let mut writer = Writer::new(&arena, &schemas, BlockAllocator::new(catalog()), &resolver);
        let root_offset = writer.write_root(material).unwrap();
        let (_alloc, streams, deps) = writer.into_parts();

        let borrowed: HashMap<BlockId, &[u8]> = streams.iter().map(|(&k, v)| (k, v.as_slice())).collect();
        let mut reader = Reader::new(&schemas, borrowed, &deps, &resolver);
        let read_material = reader.read_root(IMAGE_REF, root_offset).unwrap();
        let out = reader.into_arena();
        let FieldValue::AssetRef(Some((kind, name))) = &out.get(read_material).fields[0] else {
            panic!("expected a resolved asset_ref")
        };
        assert_eq!(loaded.find(*kind, name), Some(earlier_handle));
    }

    /// Property/error path named alongside S6: a strong `asset_ref` that
    /// resolves against nothing is fatal.
    #[test]
    fn strong_asset_ref_unresolved_is_missing_dependency() {
        let schemas = image_ref_schema(false);
        let mut arena = Arena::new();
        let material = arena.insert(Node {
            type_id: IMAGE_REF,
            fields: vec![FieldValue::AssetRef(Some((AssetKind(9), "$missing".to_owned())))],
        });

        let mut writer = Writer::new(&arena, &schemas, BlockAllocator::new(catalog()), &no_refs);
        let err = writer.write_root(material);
        assert_eq!(err, Err(GraphError::MissingDependency(AssetKind(9), "$missing".to_owned())));
    }

    /// A `weak` reference tolerates an unresolved target on both sides.
    #[test]
    fn weak_asset_ref_tolerates_an_unresolved_target() {
        let schemas = image_ref_schema(true);
        let mut arena = Arena::new();
        let material = arena.insert(Node {
            type_id: IMAGE_REF,
            fields: vec![FieldValue::AssetRef(Some((AssetKind(9), "$missing".to_owned())))],
        });

        let mut writer = Writer::new(&arena, &schemas, BlockAllocator::new(catalog()), &no_refs);
        let root_offset = writer.write_root(material).unwrap();
        let (_alloc, streams, deps) = writer.into_parts();

        let borrowed: HashMap<BlockId, &[u8]> = streams.iter().map(|(&k, v)| (k, v.as_slice())).collect();
        let mut reader = Reader::new(&schemas, borrowed, &deps, &no_refs);
        let read_material = reader.read_root(IMAGE_REF, root_offset).unwrap();
        let out = reader.into_arena();
        assert_eq!(
            out.get(read_material).fields[0],
            FieldValue::AssetRef(Some((AssetKind(9), "$missing".to_owned())))
        );
    }

    /// `script_string_array`: an out-of-line array of interned ids, length
    /// taken from a sibling scalar field.
    #[test]
    fn script_string_array_round_trips() {
        const TBL: TypeId = 6;
        let mut schemas = SchemaRegistry::new();
        schemas.register(TypeSchema {
            id: TBL,
            name: "StringSet",
            block: normal(),
            align: 4,
            fields: vec![
                FieldSchema { name: "count", kind: FieldKind::Scalar { width: 4 } },
                FieldSchema {
                    name: "ids",
                    kind: FieldKind::ScriptStringArray { len_field: 0, block: normal(), align: 2 },
                },
            ],
        });
        let mut arena = Arena::new();
        let node = arena.insert(Node {
            type_id: TBL,
            fields: vec![
                FieldValue::Scalar(3),
                FieldValue::ScriptStringArray(vec![ScriptStringId(1), ScriptStringId(4), ScriptStringId(9)]),
            ],
        });

        let mut writer = Writer::new(&arena, &schemas, BlockAllocator::new(catalog()), &no_refs);
        let root_offset = writer.write_root(node).unwrap();
        let (_alloc, streams, _deps) = writer.into_parts();

        let borrowed: HashMap<BlockId, &[u8]> = streams.iter().map(|(&k, v)| (k, v.as_slice())).collect();
        let mut reader = Reader::new(&schemas, borrowed, &[], &no_refs);
        let read_node = reader.read_root(TBL, root_offset).unwrap();
        let out = reader.into_arena();
        assert_eq!(
            out.get(read_node).fields[1],
            FieldValue::ScriptStringArray(vec![ScriptStringId(1), ScriptStringId(4), ScriptStringId(9)])
        );
    }

    #[test]
    fn unresolved_stream_offset_block_surfaces_as_short_read() {
        let schemas = row_schema();
        let streams: HashMap<BlockId, &[u8]> = HashMap::new();
        let mut reader = Reader::new(&schemas, streams, &[], &no_refs);
        let err = reader.read_root(ROW, StreamOffset::tagged(normal(), 0));
        assert!(matches!(err, Err(GraphError::ShortRead { .. })));
    }

    const TEMP_HOLDER: TypeId = 6;
    const TEMP_LEAF: TypeId = 7;

    fn temp_and_normal_catalog() -> BlockCatalog {
        BlockCatalog::new(vec![
            BlockDef::new(0, "temp", Persistence::Temp, false, 4),
            BlockDef::new(1, "normal", Persistence::Normal, false, 4),
        ])
        .unwrap()
    }

    fn temp_pointing_schema(holder_block: BlockId, leaf_block: BlockId) -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(TypeSchema {
            id: TEMP_HOLDER,
            name: "Holder",
            block: holder_block,
            align: 4,
            fields: vec![FieldSchema {
                name: "leaf",
                kind: FieldKind::Ptr { target: TEMP_LEAF, block: leaf_block, align: 4, follow_inline: false },
            }],
        });
        reg.register(TypeSchema {
            id: TEMP_LEAF,
            name: "Leaf",
            block: leaf_block,
            align: 4,
            fields: vec![FieldSchema { name: "value", kind: FieldKind::Scalar { width: 4 } }],
        });
        reg
    }

    /// Property 6: a *normal*-block node may not hold a pointer into a
    /// *temp*-block node; the writer must reject it rather than produce a
    /// dangling reference once temp-block memory is discarded after build.
    #[test]
    fn normal_block_pointer_into_temp_block_is_rejected() {
        let schemas = temp_pointing_schema(BlockId(1), BlockId(0));
        let mut arena = Arena::new();
        let leaf = arena.insert(Node { type_id: TEMP_LEAF, fields: vec![FieldValue::Scalar(7)] });
        let holder = arena.insert(Node { type_id: TEMP_HOLDER, fields: vec![FieldValue::Ptr(Some(leaf))] });

        let alloc = BlockAllocator::new(temp_and_normal_catalog());
        let mut writer = Writer::new(&arena, &schemas, alloc, &no_refs);
        let err = writer.write_root(holder);
        assert!(matches!(err, Err(GraphError::Layout(layout::LayoutError::PersistenceViolation { .. }))));
    }

    /// The reverse direction (temp pointing at normal) is the ordinary,
    /// allowed case: a scratch structure referencing durable data.
    #[test]
    fn temp_block_pointer_into_normal_block_is_allowed() {
        let schemas = temp_pointing_schema(BlockId(0), BlockId(1));
        let mut arena = Arena::new();
        let leaf = arena.insert(Node { type_id: TEMP_LEAF, fields: vec![FieldValue::Scalar(7)] });
        let holder = arena.insert(Node { type_id: TEMP_HOLDER, fields: vec![FieldValue::Ptr(Some(leaf))] });

        let alloc = BlockAllocator::new(temp_and_normal_catalog());
        let mut writer = Writer::new(&arena, &schemas, alloc, &no_refs);
        assert!(writer.write_root(holder).is_ok());
    }
}
