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

//! The zone driver: build a `Zone` from a definition and write it to a
//! `.ff` file (spec §4.7 "Build"), or load one back (spec §4.7 "Load").

use crate::definition::{parse_definition, ZoneDefinition};
use crate::error::ZoneError;
use crate::generation::{Generation, GenerationProfile};
use crate::loader::LoaderRegistry;
use crate::manager::Manager;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chunk::{open_reader, open_writer, ChunkProcessorKind, PipelineConfig};
use graph::{Arena, NodeId, Reader, SchemaRegistry, TypeId, Writer};
use layout::{BlockAllocator, BlockId, StreamOffset};
use log::{debug, info};
use pool::{AssetHandle, AssetKind, AssetPool};
use scriptstring::{ScriptStringId, ScriptStringTable};
use std::collections::HashMap;
use std::io::{Read, Write};

/// Loader dispatch order: try GDT first, then raw sources, then the
/// ignored-project assetlist fallback; strict/lenient governs whether an
/// ignored project's own `ignore` directives are honored (spec §9 open
/// question (b)).
pub struct BuildConfig<'a> {
    pub loaders: &'a LoaderRegistry,
    pub asset_search_path: &'a search_path::SearchPath,
    pub gdt_search_path: Option<&'a search_path::SearchPath>,
    pub source_search_path: &'a search_path::SearchPath,
    pub strict_ignore: bool,
}

/// A loaded or built zone (spec §3 "Zone"): name, generation tag,
/// script-string table, asset pool, and the memory arena owning every
/// asset's payload storage.
pub struct Zone {
    pub name: String,
    pub generation: Generation,
    pub strings: ScriptStringTable,
    pub pool: AssetPool<NodeId>,
    pub arena: Arena,
    pub referenced_archives: Vec<String>,
}

impl Zone {
    /// Spec §4.7 "Build", steps 1-5: parse the definition, resolve the
    /// generation and ignores, dispatch loaders, then run finalizers.
    /// Serialization (step 6) is [`Zone::write_to`].
    pub fn build(project: &str, config: &BuildConfig<'_>) -> Result<Self, ZoneError> {
        info!("building zone {project:?}");
        let mut definition = parse_definition(project, config.asset_search_path)?;
        let generation = Generation::resolve(&definition.game)?;
        resolve_ignores(&mut definition, config.asset_search_path, config.strict_ignore)?;
        debug!("{project:?} resolved to {} assets after ignores", definition.assets.len());

        let mut manager = Manager::new(
            generation,
            config.asset_search_path,
            config.gdt_search_path,
            config.source_search_path,
            config.loaders,
        );

        for (kind_name, name) in &definition.assets {
            manager.load_dependency(kind_name, name)?;
        }

        let loaders = config.loaders;
        let node_ids: Vec<(AssetKind, NodeId)> = manager
            .pool
            .iter_flat()
            .map(|record| (record.kind, record.payload))
            .collect();
        for (kind, node) in node_ids {
            if let Some(loader) = loaders.by_kind(kind) {
                loader.finalize_for_zone(&mut manager.arena, node)?;
            }
        }

        info!("{project:?} built with {} assets", manager.pool.len());
        Ok(Zone {
            name: definition.name,
            generation,
            strings: manager.strings,
            pool: manager.pool,
            arena: manager.arena,
            referenced_archives: Vec::new(),
        })
    }

    /// Spec §4.7 "Build" step 6 / §6.1: serialize every pooled asset through
    /// one shared [`Writer`], then frame the result as a `.ff` file.
    ///
    /// `previously_loaded` is consulted, alongside this zone's own pool
    /// (already fully built by now), to resolve `asset_ref` fields that name
    /// an asset from another zone (spec §9 "Global singletons" F2).
    pub fn write_to(
        &self,
        schemas: &SchemaRegistry,
        profile: &GenerationProfile,
        previously_loaded: &[Zone],
        out: &mut impl Write,
    ) -> Result<(), ZoneError> {
        let alloc = BlockAllocator::new(profile.block_catalog());
        let resolver = |kind: AssetKind, name: &str| {
            self.pool.find(kind, name).is_some() || find_in_loaded_zones(previously_loaded, kind, name).is_some()
        };
        let mut writer = Writer::new(&self.arena, schemas, alloc, &resolver);

        struct AssetEntry {
            kind: AssetKind,
            name: String,
            offset: StreamOffset,
            dependencies: Vec<(AssetKind, String)>,
            used_script_strings: Vec<ScriptStringId>,
        }
        let mut entries = Vec::with_capacity(self.pool.len());
        for record in self.pool.iter_flat() {
            let offset = writer.write_root(record.payload)?;
            entries.push(AssetEntry {
                kind: record.kind,
                name: record.name.clone(),
                offset,
                dependencies: record.dependencies.clone(),
                used_script_strings: record.used_script_strings.clone(),
            });
        }
        let (alloc, streams, dependencies) = writer.into_parts();

        let catalog = profile.block_catalog();
        let blocks: Vec<_> = catalog.iter().cloned().collect();

        let mut body = Vec::new();
        body.write_u32::<LittleEndian>(blocks.len() as u32)?;
        for def in &blocks {
            body.write_u16::<LittleEndian>(def.id.0)?;
            body.write_u32::<LittleEndian>(alloc.cursor(def.id)?)?;
        }

        let strings: Vec<&str> = self.strings.iter().collect();
        body.write_u32::<LittleEndian>(strings.len() as u32)?;
        for s in &strings {
            write_counted_string(&mut body, s)?;
        }

        body.write_u32::<LittleEndian>(dependencies.len() as u32)?;
        for (kind, name) in &dependencies {
            body.write_u16::<LittleEndian>(kind.0)?;
            write_counted_string(&mut body, name)?;
        }

        body.write_u32::<LittleEndian>(entries.len() as u32)?;
        for entry in &entries {
            body.write_u16::<LittleEndian>(entry.kind.0)?;
            write_counted_string(&mut body, &entry.name)?;
            body.write_u32::<LittleEndian>(entry.offset.encode())?;
            body.write_u32::<LittleEndian>(entry.dependencies.len() as u32)?;
            for (dk, dn) in &entry.dependencies {
                body.write_u16::<LittleEndian>(dk.0)?;
                write_counted_string(&mut body, dn)?;
            }
            body.write_u32::<LittleEndian>(entry.used_script_strings.len() as u32)?;
            for id in &entry.used_script_strings {
                body.write_u16::<LittleEndian>(id.0)?;
            }
        }

        for def in &blocks {
            let bytes = streams.get(&def.id).cloned().unwrap_or_default();
            body.write_u32::<LittleEndian>(bytes.len() as u32)?;
            body.write_all(&bytes)?;
        }

        write_header(out, profile)?;
        let pipeline = PipelineConfig::new(profile.chunk_size, vec![ChunkProcessorKind::Inflate], 4);
        let mut sink = open_writer(out, pipeline);
        sink.write_all(&body)?;
        sink.finish()?;
        Ok(())
    }

    /// Spec §4.7 "Load", steps 1-5: header, chunk pipeline, zone header,
    /// script-string table, asset index, payloads.
    ///
    /// `previously_loaded` resolves cross-zone `asset_ref` fields (spec §9
    /// "Global singletons" F2, scenario S6). This zone's own pool is still
    /// being built entry by entry as it reads, so unlike [`Zone::write_to`]
    /// resolution here only ever checks `previously_loaded`, not `self`.
    pub fn read_from(
        name: String,
        schemas: &SchemaRegistry,
        expected: &GenerationProfile,
        previously_loaded: &[Zone],
        mut inner: impl Read + Send + 'static,
    ) -> Result<Self, ZoneError> {
        let (magic, version, _flags) = read_header(&mut inner)?;
        if magic != expected.magic {
            return Err(ZoneError::InvalidMagic(magic));
        }
        if version != expected.version {
            return Err(ZoneError::InvalidVersion(version));
        }

        let pipeline = PipelineConfig::new(expected.chunk_size, vec![ChunkProcessorKind::Inflate], 4);
        let mut source = open_reader(inner, pipeline);
        let mut body = Vec::new();
        source.read_to_end(&mut body)?;
        let mut cursor = std::io::Cursor::new(body);

        let catalog = expected.block_catalog();
        let mut alloc = BlockAllocator::new(catalog.clone());
        let block_count = cursor.read_u32::<LittleEndian>()?;
        let mut sizes = HashMap::new();
        for _ in 0..block_count {
            let id = BlockId(cursor.read_u16::<LittleEndian>()?);
            let size = cursor.read_u32::<LittleEndian>()?;
            alloc.set_capacity(id, size)?;
            sizes.insert(id, size);
        }

        let string_count = cursor.read_u32::<LittleEndian>()?;
        let mut owned_strings = Vec::with_capacity(string_count as usize);
        for _ in 0..string_count {
            owned_strings.push(read_counted_string(&mut cursor)?);
        }
        let strings = ScriptStringTable::from_ordered(owned_strings)?;

        let dependency_count = cursor.read_u32::<LittleEndian>()?;
        let mut dependencies = Vec::with_capacity(dependency_count as usize);
        for _ in 0..dependency_count {
            let kind = AssetKind(cursor.read_u16::<LittleEndian>()?);
            let name = read_counted_string(&mut cursor)?;
            dependencies.push((kind, name));
        }

        struct AssetEntry {
            kind: AssetKind,
            name: String,
            offset: StreamOffset,
            dep_list: Vec<(AssetKind, String)>,
            used_script_strings: Vec<ScriptStringId>,
        }
        let asset_count = cursor.read_u32::<LittleEndian>()?;
        let mut entries = Vec::with_capacity(asset_count as usize);
        for _ in 0..asset_count {
            let kind = AssetKind(cursor.read_u16::<LittleEndian>()?);
            let name = read_counted_string(&mut cursor)?;
            let offset = StreamOffset::decode(cursor.read_u32::<LittleEndian>()?);
            let dep_count = cursor.read_u32::<LittleEndian>()?;
            let mut dep_list = Vec::with_capacity(dep_count as usize);
            for _ in 0..dep_count {
                let dk = AssetKind(cursor.read_u16::<LittleEndian>()?);
                let dn = read_counted_string(&mut cursor)?;
                dep_list.push((dk, dn));
            }
            let used_count = cursor.read_u32::<LittleEndian>()?;
            let mut used_script_strings = Vec::with_capacity(used_count as usize);
            for _ in 0..used_count {
                used_script_strings.push(ScriptStringId(cursor.read_u16::<LittleEndian>()?));
            }
            entries.push(AssetEntry { kind, name, offset, dep_list, used_script_strings });
        }

        let mut owned_payloads = HashMap::new();
        for def in catalog.iter() {
            let len = cursor.read_u32::<LittleEndian>()?;
            let mut bytes = vec![0u8; len as usize];
            std::io::Read::read_exact(&mut cursor, &mut bytes)?;
            owned_payloads.insert(def.id, bytes);
        }
        let borrowed: HashMap<BlockId, &[u8]> = owned_payloads.iter().map(|(&k, v)| (k, v.as_slice())).collect();

        let resolver = |kind: AssetKind, name: &str| find_in_loaded_zones(previously_loaded, kind, name).is_some();
        let mut reader = Reader::new(schemas, borrowed, &dependencies, &resolver);
        let mut pool = AssetPool::new();
        for entry in entries {
            let type_id = entry.kind.0 as TypeId;
            let node = reader.read_root(type_id, entry.offset)?;
            pool.register(pool::AssetRecord {
                kind: entry.kind,
                name: entry.name,
                identity: node.0,
                payload: node,
                dependencies: entry.dep_list,
                used_script_strings: entry.used_script_strings,
            })?;
        }
        let arena = reader.into_arena();

        Ok(Zone {
            name,
            generation: expected.generation,
            strings,
            pool,
            arena,
            referenced_archives: Vec::new(),
        })
    }
}

fn write_header(out: &mut impl Write, profile: &GenerationProfile) -> Result<(), ZoneError> {
    let magic = profile.magic.as_bytes();
    debug_assert_eq!(magic.len(), 8);
    out.write_all(magic)?;
    out.write_u32::<LittleEndian>(profile.version)?;
    out.write_u32::<LittleEndian>(0)?;
    Ok(())
}

fn read_header(inner: &mut impl Read) -> Result<(String, u32, u32), ZoneError> {
    let mut magic = [0u8; 8];
    inner.read_exact(&mut magic)?;
    let magic = String::from_utf8_lossy(&magic).into_owned();
    let version = inner.read_u32::<LittleEndian>()?;
    let flags = inner.read_u32::<LittleEndian>()?;
    Ok((magic, version, flags))
}

fn write_counted_string(out: &mut Vec<u8>, s: &str) -> Result<(), ZoneError> {
    out.write_u16::<LittleEndian>(s.len() as u16)?;
    out.write_all(s.as_bytes())?;
    Ok(())
}

fn read_counted_string(cursor: &mut std::io::Cursor<Vec<u8>>) -> Result<String, ZoneError> {
    let len = cursor.read_u16::<LittleEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    std::io::Read::read_exact(cursor, &mut bytes)?;
    String::from_utf8(bytes).map_err(|_| ZoneError::MalformedLine("non-utf8 string table entry".to_owned()))
}

/// Spec §4.7 step 3 / §9 open question (b): an ignored project's own assets
/// are subtracted from `definition`. `strict` additionally re-applies the
/// ignored project's own `ignore` directives before subtracting (the
/// undocumented original behavior is lenient: it does not).
fn resolve_ignores(
    definition: &mut ZoneDefinition,
    source: &search_path::SearchPath,
    strict: bool,
) -> Result<(), ZoneError> {
    if definition.ignores.is_empty() {
        return Ok(());
    }
    let mut excluded = std::collections::HashSet::new();
    for ignored_project in &definition.ignores {
        let mut ignored = parse_definition(ignored_project, source)?;
        if strict {
            let nested = std::mem::take(&mut ignored.ignores);
            if !nested.is_empty() {
                let mut nested_def = ZoneDefinition {
                    ignores: nested,
                    ..ignored.clone()
                };
                resolve_ignores(&mut nested_def, source, strict)?;
                ignored.assets = nested_def.assets;
            }
        }
        for asset in ignored.assets {
            excluded.insert(asset);
        }
    }
    let before = definition.assets.len();
    definition.assets.retain(|asset| !excluded.contains(asset));
    debug!("ignore directives dropped {} of {before} assets", before - definition.assets.len());
    Ok(())
}

/// Scans a set of previously loaded zones for an asset, most-recently-loaded
/// first (spec §9 "Global singletons", Invariant F2). Used to resolve a
/// cross-zone `asset_ref` that this zone's own pool doesn't satisfy.
pub fn find_in_loaded_zones<'a>(zones: &'a [Zone], kind: AssetKind, name: &str) -> Option<(&'a Zone, AssetHandle)> {
    zones
        .iter()
        .rev()
        .find_map(|zone| zone.pool.find(kind, name).map(|handle| (zone, handle)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::AssetLoader;
    use graph::{FieldKind, FieldSchema, FieldValue, Node, SchemaRegistry, TypeSchema};
    use layout::Persistence;
    use search_path::{DirectorySource, SearchPath};
    use std::fs;

    const NOTE: TypeId = 100;

    fn schemas() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(TypeSchema {
            id: NOTE,
            name: "Note",
            block: BlockId(1),
            align: 4,
            fields: vec![FieldSchema { name: "body", kind: FieldKind::Str }],
        });
        reg
    }

    struct NoteLoader;
    impl AssetLoader for NoteLoader {
        fn kind_name(&self) -> &'static str {
            "note"
        }
        fn handled_kind(&self) -> AssetKind {
            AssetKind(100)
        }
        fn create_empty(&self, name: &str, arena: &mut Arena) -> NodeId {
            arena.insert(Node { type_id: NOTE, fields: vec![FieldValue::Str(name.to_owned())] })
        }
        fn can_load_from_raw(&self) -> bool {
            true
        }
        fn load_from_raw(
            &self,
            _name: &str,
            _source: &search_path::SearchPath,
            _manager: &mut Manager,
            _node: NodeId,
        ) -> Result<(), ZoneError> {
            Ok(())
        }
    }

    fn zone_dir(tag: &str, files: &[(&str, &str)]) -> SearchPath {
        let root = std::env::temp_dir().join(format!("zonekit-zone-test-{tag}"));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        for (name, contents) in files {
            fs::write(root.join(name), contents).unwrap();
        }
        SearchPath::with_sources(vec![Box::new(
            DirectorySource::new("zones", 0, root.to_str().unwrap()).unwrap(),
        )])
        .unwrap()
    }

    fn registry() -> LoaderRegistry {
        let mut registry = LoaderRegistry::new();
        registry.register(Box::new(NoteLoader));
        registry
    }

    const QUOTE: TypeId = 101;

    /// Interns its own body as a script string on load, so a round trip
    /// exercises an asset's `used_script_strings` list end to end.
    struct QuoteLoader;
    impl AssetLoader for QuoteLoader {
        fn kind_name(&self) -> &'static str {
            "quote"
        }
        fn handled_kind(&self) -> AssetKind {
            AssetKind(101)
        }
        fn create_empty(&self, _name: &str, arena: &mut Arena) -> NodeId {
            arena.insert(Node { type_id: QUOTE, fields: vec![FieldValue::Scalar(0)] })
        }
        fn can_load_from_raw(&self) -> bool {
            true
        }
        fn load_from_raw(
            &self,
            name: &str,
            _source: &search_path::SearchPath,
            manager: &mut Manager,
            node: NodeId,
        ) -> Result<(), ZoneError> {
            let id = manager.intern_script_string(name);
            *manager.arena.get_mut(node) = Node { type_id: QUOTE, fields: vec![FieldValue::Scalar(id.0 as u64)] };
            Ok(())
        }
    }

    fn quote_schemas() -> SchemaRegistry {
        let mut reg = schemas();
        reg.register(TypeSchema {
            id: QUOTE,
            name: "Quote",
            block: BlockId(1),
            align: 4,
            fields: vec![FieldSchema { name: "text_id", kind: FieldKind::Scalar { width: 4 } }],
        });
        reg
    }

    #[test]
    fn interned_script_strings_round_trip_within_table_bounds() {
        let source = zone_dir("scriptstrings", &[("t1.zone", "name,t1\ngame,g3\nquote,borrowed_lines\n")]);
        let mut loaders = registry();
        loaders.register(Box::new(QuoteLoader));
        let profile = Generation::G3.profile();
        let schemas = quote_schemas();
        let config = BuildConfig {
            loaders: &loaders,
            asset_search_path: &source,
            gdt_search_path: None,
            source_search_path: &source,
            strict_ignore: false,
        };

        let zone = Zone::build("t1", &config).unwrap();
        let handle = zone.pool.find(AssetKind(101), "borrowed_lines").unwrap();
        let record = zone.pool.get(handle);
        assert_eq!(record.used_script_strings, vec![ScriptStringId(1)]);

        let mut bytes = Vec::new();
        zone.write_to(&schemas, &profile, &[], &mut bytes).unwrap();
        let loaded = Zone::read_from("t1".to_owned(), &schemas, &profile, &[], std::io::Cursor::new(bytes)).unwrap();

        let table_count = loaded.strings.iter().count();
        let loaded_handle = loaded.pool.find(AssetKind(101), "borrowed_lines").unwrap();
        let loaded_record = loaded.pool.get(loaded_handle);
        assert_eq!(loaded_record.used_script_strings.len(), 1);
        for id in &loaded_record.used_script_strings {
            assert!(id.0 == 0 || (id.0 as usize) < table_count);
        }
        assert_eq!(loaded.strings.iter().nth(loaded_record.used_script_strings[0].0 as usize), Some("borrowed_lines"));
    }

    #[test]
    fn build_and_round_trip_through_ff_bytes() {
        let source = zone_dir("roundtrip", &[("t1.zone", "name,t1\ngame,g3\nnote,hello\n")]);
        let loaders = registry();
        let profile = Generation::G3.profile();
        let schemas = schemas();
        let config = BuildConfig {
            loaders: &loaders,
            asset_search_path: &source,
            gdt_search_path: None,
            source_search_path: &source,
            strict_ignore: false,
        };

        let zone = Zone::build("t1", &config).unwrap();
        assert_eq!(zone.pool.len(), 1);

        let mut bytes = Vec::new();
        zone.write_to(&schemas, &profile, &[], &mut bytes).unwrap();

        let loaded = Zone::read_from("t1".to_owned(), &schemas, &profile, &[], std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(loaded.pool.len(), 1);
        let handle = loaded.pool.find(AssetKind(100), "hello").unwrap();
        let record = loaded.pool.get(handle);
        assert_eq!(loaded.arena.get(record.payload).fields[0], FieldValue::Str("hello".to_owned()));
    }

    #[test]
    fn ignored_project_assets_are_excluded() {
        let source = zone_dir(
            "ignore",
            &[
                ("t1.zone", "name,t1\ngame,g3\nignore,skip\nnote,keep\nnote,drop_me\n"),
                ("skip.zone", "game,g3\nnote,drop_me\n"),
            ],
        );
        let loaders = registry();
        let config = BuildConfig {
            loaders: &loaders,
            asset_search_path: &source,
            gdt_search_path: None,
            source_search_path: &source,
            strict_ignore: false,
        };
        let zone = Zone::build("t1", &config).unwrap();
        assert_eq!(zone.pool.len(), 1);
        assert!(zone.pool.find(AssetKind(100), "keep").is_some());
        assert!(zone.pool.find(AssetKind(100), "drop_me").is_none());
    }

    #[test]
    fn cross_zone_asset_is_found_in_reverse_load_order() {
        let source = zone_dir(
            "crosszone",
            &[
                ("a.zone", "name,a\ngame,g3\nnote,shared\n"),
                ("b.zone", "name,b\ngame,g3\nnote,other\n"),
            ],
        );
        let loaders = registry();
        let config = BuildConfig {
            loaders: &loaders,
            asset_search_path: &source,
            gdt_search_path: None,
            source_search_path: &source,
            strict_ignore: false,
        };
        let zone_a = Zone::build("a", &config).unwrap();
        let zone_b = Zone::build("b", &config).unwrap();
        let zones = vec![zone_a, zone_b];
        let (found_in, _handle) = find_in_loaded_zones(&zones, AssetKind(100), "shared").unwrap();
        assert_eq!(found_in.name, "a");
        assert!(find_in_loaded_zones(&zones, AssetKind(100), "missing").is_none());
    }
}
