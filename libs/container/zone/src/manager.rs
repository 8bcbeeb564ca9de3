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

//! The object asset loaders build against: `add_asset` registers a freshly
//! built payload with the pool, `load_dependency` recursively resolves
//! another asset within the same zone (spec §6.2).

use crate::error::ZoneError;
use crate::generation::Generation;
use crate::loader::LoaderRegistry;
use graph::{Arena, NodeId};
use log::{trace, warn};
use pool::{AssetHandle, AssetKind, AssetPool, AssetRecord};
use scriptstring::{ScriptStringId, ScriptStringTable};
use search_path::SearchPath;

pub struct Manager<'a> {
    pub generation: Generation,
    pub asset_search_path: &'a SearchPath,
    pub gdt_search_path: Option<&'a SearchPath>,
    pub source_search_path: &'a SearchPath,
    loaders: &'a LoaderRegistry,
    pub arena: Arena,
    pub pool: AssetPool<NodeId>,
    pub strings: ScriptStringTable,
    /// Dependency edges and interned script strings accumulated by the
    /// currently-loading asset, consumed by [`Self::load_one`] once its
    /// loader call returns (spec property 5: every id an asset emits must
    /// appear in its own `used_script_strings` list).
    pending_dependencies: Vec<(AssetKind, String)>,
    pending_script_strings: Vec<ScriptStringId>,
}

impl<'a> Manager<'a> {
    pub fn new(
        generation: Generation,
        asset_search_path: &'a SearchPath,
        gdt_search_path: Option<&'a SearchPath>,
        source_search_path: &'a SearchPath,
        loaders: &'a LoaderRegistry,
    ) -> Self {
        Self {
            generation,
            asset_search_path,
            gdt_search_path,
            source_search_path,
            loaders,
            arena: Arena::new(),
            pool: AssetPool::new(),
            strings: ScriptStringTable::new(),
            pending_dependencies: Vec::new(),
            pending_script_strings: Vec::new(),
        }
    }

    /// Interns `s` and records it against the asset currently being loaded
    /// (spec §4.5). Loaders call this instead of `self.strings.intern`
    /// directly so the id ends up in that asset's `used_script_strings`.
    pub fn intern_script_string(&mut self, s: &str) -> ScriptStringId {
        let id = self.strings.intern(s);
        self.pending_script_strings.push(id);
        id
    }

    /// Registers a built payload with the pool (spec §6.2 `manager.add_asset`).
    /// `payload`'s own arena index doubles as the pool's idempotency identity
    /// (Invariant F1): re-adding the same node is a no-op, a different node
    /// under the same `(kind, name)` is `DuplicateAsset`.
    pub fn add_asset(
        &mut self,
        kind: AssetKind,
        name: String,
        payload: NodeId,
        dependencies: Vec<(AssetKind, String)>,
        used_script_strings: Vec<ScriptStringId>,
    ) -> Result<AssetHandle, ZoneError> {
        let identity = payload.0;
        let handle = self.pool.register(AssetRecord {
            kind,
            name,
            identity,
            payload,
            dependencies,
            used_script_strings,
        })?;
        Ok(handle)
    }

    /// Resolves `(kind_name, name)` against the pool, loading it on demand
    /// against this zone's search paths if it isn't already present (spec
    /// §6.2 `manager.load_dependency`).
    pub fn load_dependency(&mut self, kind_name: &str, name: &str) -> Result<AssetHandle, ZoneError> {
        let loaders = self.loaders;
        let loader = loaders
            .get(kind_name)
            .ok_or_else(|| ZoneError::UnknownAssetKind(kind_name.to_owned()))?;
        let kind = loader.handled_kind();
        self.pending_dependencies.push((kind, name.to_owned()));
        if let Some(handle) = self.pool.find(kind, name) {
            return Ok(handle);
        }
        self.load_one(kind_name, name)
    }

    /// Dispatches a not-yet-loaded `(kind_name, name)` through the matching
    /// loader: GDT first, then raw source, then the loader's own global
    /// pools (spec §4.7 step 4).
    pub fn load_one(&mut self, kind_name: &str, name: &str) -> Result<AssetHandle, ZoneError> {
        let loaders = self.loaders;
        let loader = loaders
            .get(kind_name)
            .ok_or_else(|| ZoneError::UnknownAssetKind(kind_name.to_owned()))?;
        let kind = loader.handled_kind();
        let dep_mark = self.pending_dependencies.len();
        let string_mark = self.pending_script_strings.len();

        if loader.can_load_from_gdt() {
            if let Some(gdt) = self.gdt_search_path {
                let node = loader.create_empty(name, &mut self.arena);
                if loader.load_from_gdt(name, gdt, self, node).is_ok() {
                    let dependencies = self.pending_dependencies.split_off(dep_mark);
                    let used_script_strings = self.pending_script_strings.split_off(string_mark);
                    return self.add_asset(kind, name.to_owned(), node, dependencies, used_script_strings);
                }
                self.pending_dependencies.truncate(dep_mark);
                self.pending_script_strings.truncate(string_mark);
            }
        }

        if loader.can_load_from_raw() {
            let source = self.source_search_path;
            let node = loader.create_empty(name, &mut self.arena);
            if loader.load_from_raw(name, source, self, node).is_ok() {
                let dependencies = self.pending_dependencies.split_off(dep_mark);
                let used_script_strings = self.pending_script_strings.split_off(string_mark);
                return self.add_asset(kind, name.to_owned(), node, dependencies, used_script_strings);
            }
            self.pending_dependencies.truncate(dep_mark);
            self.pending_script_strings.truncate(string_mark);
        }

        if let Some(handle) = loader.load_from_global_pools(name) {
            trace!("{kind_name}:{name} resolved from a loader-owned global pool");
            return Ok(handle);
        }

        warn!("{kind_name}:{name} could not be resolved from any source");
        Err(ZoneError::UnresolvedAsset(kind, name.to_owned()))
    }

    pub fn loaders(&self) -> &'a LoaderRegistry {
        self.loaders
    }
}
