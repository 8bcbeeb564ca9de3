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

//! A uniform, priority-ordered lookup over one or more resource [`Source`]s.
//!
//! The zone driver uses a `SearchPath` for each of the asset, GDT and raw
//! source search roots (spec §4.7 step 1, §6.4), and the per-zone list of
//! referenced archive containers (spec §3 Zone, §9 "global singletons") is
//! built the same way: one `SearchPath` per archive kind, reference-counted
//! by name.

mod directory_source;
mod source;

pub use directory_source::DirectorySource;
pub use source::{EntryMetadata, Source, SourceEntryId};

use glob::{MatchOptions, Pattern};
use std::{borrow::Cow, collections::HashMap};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchPathError {
    #[error("duplicate source at the same priority: {0:?}")]
    DuplicateSource(String),

    #[error("no entry named {0:?}")]
    NoSuchName(String),

    #[error("entry id does not belong to this source")]
    NoSuchEntry,

    #[error("invalid glob pattern: {0}")]
    InvalidGlob(#[from] glob::PatternError),

    #[error("io error at {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

type SourceId = u32;

/// A resolved, cross-source reference returned by [`SearchPath::resolve`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ResourceId {
    source_id: SourceId,
    entry_id: SourceEntryId,
}

pub struct SearchPath {
    next_source_id: SourceId,
    source_keys: HashMap<(i64, String), SourceId>,
    sources: HashMap<SourceId, Box<dyn Source>>,
    index: HashMap<String, ResourceId>,
}

impl SearchPath {
    pub fn empty() -> Self {
        Self {
            next_source_id: 0,
            source_keys: HashMap::new(),
            sources: HashMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_sources(sources: Vec<Box<dyn Source>>) -> Result<Self, SearchPathError> {
        let mut path = Self::empty();
        for source in sources {
            path.attach(source)?;
        }
        Ok(path)
    }

    /// Index and attach a new source. A same-name, same-priority source is
    /// rejected; otherwise the merged index keeps whichever of the two
    /// colliding entries belongs to the higher-priority source, preferring
    /// the most recently attached one on a tie (matching attach order as a
    /// final tiebreaker, the same as the teacher's `Catalog::add_drawer`).
    pub fn attach(&mut self, source: Box<dyn Source>) -> Result<(), SearchPathError> {
        let priority = source.priority();
        let key = (priority, source.name().to_owned());
        if self.source_keys.contains_key(&key) {
            return Err(SearchPathError::DuplicateSource(key.1));
        }
        let index = source.index()?;
        let source_id = self.next_source_id;
        self.next_source_id += 1;
        self.source_keys.insert(key, source_id);
        self.sources.insert(source_id, source);

        for (entry_id, name) in index {
            if let Some(prior) = self.index.get(&name) {
                let prior_priority = self.sources[&prior.source_id].priority();
                if priority < prior_priority {
                    continue;
                }
            }
            self.index.insert(
                name,
                ResourceId {
                    source_id,
                    entry_id,
                },
            );
        }
        Ok(())
    }

    pub fn find_matching(&self, glob: &str) -> Result<Vec<String>, SearchPathError> {
        let opts = MatchOptions {
            case_sensitive: false,
            require_literal_leading_dot: false,
            require_literal_separator: true,
        };
        let pattern = Pattern::new(glob)?;
        Ok(self
            .index
            .keys()
            .filter(|key| pattern.matches_with(key, opts))
            .cloned()
            .collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn stat(&self, name: &str) -> Result<EntryMetadata, SearchPathError> {
        let rid = self.resolve(name)?;
        self.sources[&rid.source_id].stat(rid.entry_id)
    }

    pub fn read(&self, name: &str) -> Result<Cow<[u8]>, SearchPathError> {
        let rid = self.resolve(name)?;
        self.sources[&rid.source_id].read(rid.entry_id)
    }

    fn resolve(&self, name: &str) -> Result<ResourceId, SearchPathError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SearchPathError::NoSuchName(name.to_owned()))
    }
}
