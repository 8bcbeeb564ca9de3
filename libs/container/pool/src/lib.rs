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

//! The asset pool (spec §4.6): a per-kind ordered dictionary keyed by name,
//! plus a flat, insertion-order view used by the zone driver to emit assets
//! in declaration order.

use scriptstring::ScriptStringId;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKind(pub u16);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssetHandle {
    pub kind: AssetKind,
    index: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("duplicate asset ({0:?}, {1:?})")]
    DuplicateAsset(AssetKind, String),
}

pub struct AssetRecord<P> {
    pub kind: AssetKind,
    pub name: String,
    /// Caller-chosen identity for the payload (an arena index, typically).
    /// Invariant F1's "re-registering with an identical payload address is a
    /// no-op" is implemented against this, not against `payload`'s contents,
    /// since payloads need not be comparable.
    pub identity: usize,
    pub payload: P,
    pub dependencies: Vec<(AssetKind, String)>,
    pub used_script_strings: Vec<ScriptStringId>,
}

/// Per-zone pool of assets of every kind (spec §4.6). `P` is the zone's own
/// payload representation; this crate never inspects it.
pub struct AssetPool<P> {
    by_kind_name: HashMap<(AssetKind, String), usize>,
    records: Vec<AssetRecord<P>>,
}

impl<P> Default for AssetPool<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> AssetPool<P> {
    pub fn new() -> Self {
        Self {
            by_kind_name: HashMap::new(),
            records: Vec::new(),
        }
    }

    /// Register `record`. Invariant F1: within a pool, each `(kind, name)`
    /// maps to at most one asset. Re-registering the same `(kind, name)`
    /// with the same `identity` is a no-op that returns the existing
    /// handle; a different `identity` is `DuplicateAsset`.
    pub fn register(&mut self, record: AssetRecord<P>) -> Result<AssetHandle, PoolError> {
        let key = (record.kind, record.name.clone());
        if let Some(&index) = self.by_kind_name.get(&key) {
            if self.records[index].identity == record.identity {
                return Ok(AssetHandle {
                    kind: record.kind,
                    index,
                });
            }
            return Err(PoolError::DuplicateAsset(record.kind, record.name));
        }
        let index = self.records.len();
        self.by_kind_name.insert(key, index);
        let handle = AssetHandle {
            kind: record.kind,
            index,
        };
        self.records.push(record);
        Ok(handle)
    }

    pub fn find(&self, kind: AssetKind, name: &str) -> Option<AssetHandle> {
        self.by_kind_name
            .get(&(kind, name.to_owned()))
            .map(|&index| AssetHandle { kind, index })
    }

    pub fn get(&self, handle: AssetHandle) -> &AssetRecord<P> {
        &self.records[handle.index]
    }

    /// Flat, insertion-order iteration across every kind — the order the
    /// zone driver emits assets in (spec §4.6, §4.7 step 6).
    pub fn iter_flat(&self) -> impl Iterator<Item = &AssetRecord<P>> {
        self.records.iter()
    }

    pub fn iter_kind(&self, kind: AssetKind) -> impl Iterator<Item = &AssetRecord<P>> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(kind: u16, name: &str, identity: usize) -> AssetRecord<&'static str> {
        AssetRecord {
            kind: AssetKind(kind),
            name: name.to_owned(),
            identity,
            payload: "payload",
            dependencies: Vec::new(),
            used_script_strings: Vec::new(),
        }
    }

    #[test]
    fn registration_is_idempotent_for_same_identity() {
        let mut pool = AssetPool::new();
        let h1 = pool.register(rec(1, "a", 0xAAAA)).unwrap();
        let h2 = pool.register(rec(1, "a", 0xAAAA)).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn registration_with_different_identity_is_duplicate_asset() {
        let mut pool = AssetPool::new();
        pool.register(rec(1, "a", 1)).unwrap();
        let err = pool.register(rec(1, "a", 2));
        assert!(matches!(err, Err(PoolError::DuplicateAsset(_, _))));
    }

    #[test]
    fn same_name_different_kind_does_not_collide() {
        let mut pool = AssetPool::new();
        pool.register(rec(1, "shared_name", 1)).unwrap();
        pool.register(rec(2, "shared_name", 2)).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn flat_iteration_is_insertion_order() {
        let mut pool = AssetPool::new();
        pool.register(rec(1, "c", 1)).unwrap();
        pool.register(rec(1, "a", 2)).unwrap();
        pool.register(rec(2, "b", 3)).unwrap();
        let names: Vec<_> = pool.iter_flat().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn find_resolves_registered_asset() {
        let mut pool = AssetPool::new();
        pool.register(rec(5, "image", 1)).unwrap();
        let handle = pool.find(AssetKind(5), "image").unwrap();
        assert_eq!(pool.get(handle).name, "image");
        assert!(pool.find(AssetKind(5), "missing").is_none());
    }
}
