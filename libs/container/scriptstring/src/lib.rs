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

//! The script-string table (spec §4.5): a per-zone interned-string table
//! with a bidirectional mapping, plus the process-global interner that zone
//! ids are remapped through on read.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptStringId(pub u16);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptStringError {
    #[error("script-string id {0:?} is out of range")]
    OutOfRange(ScriptStringId),
}

/// A zone's own script-string table: `L` and its inverse `L^-1` (spec §4.5).
/// Id 0 is reserved for the empty string and present at construction
/// (Invariant E1).
#[derive(Clone, Debug)]
pub struct ScriptStringTable {
    strings: Vec<String>,
    ids: HashMap<String, ScriptStringId>,
}

impl Default for ScriptStringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptStringTable {
    pub fn new() -> Self {
        let mut ids = HashMap::new();
        ids.insert(String::new(), ScriptStringId(0));
        Self {
            strings: vec![String::new()],
            ids,
        }
    }

    /// Reconstruct a table from an on-disk id table (spec §6.1 "script-string
    /// id table"), in emission order. Used on read.
    pub fn from_ordered(strings: Vec<String>) -> Result<Self, ScriptStringError> {
        let mut ids = HashMap::with_capacity(strings.len());
        for (i, s) in strings.iter().enumerate() {
            ids.insert(s.clone(), ScriptStringId(i as u16));
        }
        let table = Self { strings, ids };
        if table.strings.first().map(String::as_str) != Some("") {
            return Err(ScriptStringError::OutOfRange(ScriptStringId(0)));
        }
        Ok(table)
    }

    /// Intern `s`, returning its existing id if present (Invariant E2) or a
    /// freshly assigned one otherwise. Emission order is insertion order, so
    /// re-reading the same sequence of interns always produces the same
    /// on-disk table (spec §4.5 "deterministic emission order").
    pub fn intern(&mut self, s: &str) -> ScriptStringId {
        if let Some(&id) = self.ids.get(s) {
            return id;
        }
        let id = ScriptStringId(self.strings.len() as u16);
        self.strings.push(s.to_owned());
        self.ids.insert(s.to_owned(), id);
        id
    }

    pub fn get(&self, id: ScriptStringId) -> Result<&str, ScriptStringError> {
        self.strings
            .get(id.0 as usize)
            .map(String::as_str)
            .ok_or(ScriptStringError::OutOfRange(id))
    }

    pub fn lookup(&self, s: &str) -> Option<ScriptStringId> {
        self.ids.get(s).copied()
    }

    pub fn count(&self) -> u16 {
        self.strings.len() as u16
    }

    /// Emission order: the on-disk id table is exactly this sequence.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}

/// The process-global script-string interner (spec §4.5: "each id is
/// remapped via `remap[id] = GlobalInterner.intern(L[id])`"). Populated
/// during zone loads and read-mostly thereafter, matching the "shared state"
/// discipline in spec §5.
pub struct GlobalInterner {
    inner: Mutex<ScriptStringTable>,
}

impl GlobalInterner {
    pub fn global() -> &'static GlobalInterner {
        static INSTANCE: Lazy<GlobalInterner> = Lazy::new(|| GlobalInterner {
            inner: Mutex::new(ScriptStringTable::new()),
        });
        &INSTANCE
    }

    pub fn intern(&self, s: &str) -> ScriptStringId {
        self.inner.lock().intern(s)
    }

    pub fn get(&self, id: ScriptStringId) -> Result<String, ScriptStringError> {
        self.inner.lock().get(id).map(str::to_owned)
    }
}

/// Remap every id in a freshly read `local` table through `interner`,
/// returning `local_id -> global_id`. Applied once per zone load (spec
/// §4.5).
pub fn remap_on_read(
    local: &ScriptStringTable,
    interner: &GlobalInterner,
) -> HashMap<ScriptStringId, ScriptStringId> {
    local
        .iter()
        .enumerate()
        .map(|(i, s)| (ScriptStringId(i as u16), interner.intern(s)))
        .collect()
}
