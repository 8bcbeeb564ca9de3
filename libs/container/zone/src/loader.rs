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

//! The asset-loader plugin interface (spec §6.2): one implementation per
//! `(generation, kind)`, registered by the zone-definition's asset-kind
//! identifier (`stringtable`, `xmodel`, ...).

use crate::error::ZoneError;
use crate::manager::Manager;
use graph::{Arena, NodeId};
use pool::{AssetHandle, AssetKind};
use search_path::SearchPath;
use std::collections::HashMap;

/// One asset-type plugin. Every method has a default that reports "not
/// supported" so a loader only needs to implement the paths it actually
/// uses (spec §6.2 lists `can_load_from_gdt`/`can_load_from_raw` as the
/// gates for the optional `load_from_gdt`/`load_from_raw` paths).
pub trait AssetLoader: Send + Sync {
    /// The zone-definition key this loader answers to (e.g. `"stringtable"`).
    fn kind_name(&self) -> &'static str;

    fn handled_kind(&self) -> AssetKind;

    /// A zero-initialized payload carrying only `name` (spec §6.2).
    fn create_empty(&self, name: &str, arena: &mut Arena) -> NodeId;

    fn can_load_from_gdt(&self) -> bool {
        false
    }

    fn load_from_gdt(
        &self,
        name: &str,
        gdt: &SearchPath,
        manager: &mut Manager,
        node: NodeId,
    ) -> Result<(), ZoneError> {
        let _ = (name, gdt, manager, node);
        Err(ZoneError::NoSuchLoader(self.handled_kind()))
    }

    fn can_load_from_raw(&self) -> bool {
        false
    }

    fn load_from_raw(
        &self,
        name: &str,
        source: &SearchPath,
        manager: &mut Manager,
        node: NodeId,
    ) -> Result<(), ZoneError> {
        let _ = (name, source, manager, node);
        Err(ZoneError::NoSuchLoader(self.handled_kind()))
    }

    /// A loader-owned fallback pool consulted for cross-zone references this
    /// loader keeps track of itself. Most loaders have none.
    fn load_from_global_pools(&self, name: &str) -> Option<AssetHandle> {
        let _ = name;
        None
    }

    /// Per-kind fixups run once structural load has completed (spec §9
    /// "hand-coded payload fixups"): weapon attachment linking and similar.
    fn finalize_for_zone(&self, arena: &mut Arena, node: NodeId) -> Result<(), ZoneError> {
        let _ = (arena, node);
        Ok(())
    }
}

/// Static registry of loaders, keyed by the zone-definition asset-kind
/// identifier. One registry is built per generation (spec §9 "encode as a
/// static registry of `(generation, kind) -> schema + loader`").
#[derive(Default)]
pub struct LoaderRegistry {
    by_name: HashMap<&'static str, Box<dyn AssetLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, loader: Box<dyn AssetLoader>) {
        self.by_name.insert(loader.kind_name(), loader);
    }

    pub fn get(&self, kind_name: &str) -> Option<&dyn AssetLoader> {
        self.by_name.get(kind_name).map(Box::as_ref)
    }

    /// Looks a loader up by its numeric `AssetKind` rather than its
    /// zone-definition key; used to dispatch the per-kind finalize pass over
    /// an already-built pool, where only the numeric kind is at hand.
    pub fn by_kind(&self, kind: AssetKind) -> Option<&dyn AssetLoader> {
        self.by_name
            .values()
            .map(Box::as_ref)
            .find(|loader| loader.handled_kind() == kind)
    }
}
