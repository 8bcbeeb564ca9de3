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

use crate::SearchPathError;
use std::{borrow::Cow, collections::HashMap, path::PathBuf};

/// Identifies a resource within one [`Source`]. Opaque to callers of
/// [`SearchPath`](crate::SearchPath); only the owning source interprets it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SourceEntryId(u32);

impl SourceEntryId {
    pub fn from_u32(i: u32) -> Self {
        SourceEntryId(i)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

pub struct EntryMetadata {
    pub entry_id: SourceEntryId,
    pub name: String,
    pub size: u64,
    pub path: Option<PathBuf>,
}

/// One member of a [`SearchPath`](crate::SearchPath): a uniform interface
/// over a directory tree, an archive, or any other named-blob container.
/// A new backing format (a `.ff` asset archive, an audio bank) is added by
/// implementing this trait, not by changing `SearchPath` itself.
pub trait Source {
    /// Every name loadable from this source, keyed by the id the source will
    /// recognize in later `stat`/`read` calls. Called once, at attach time.
    fn index(&self) -> Result<HashMap<SourceEntryId, String>, SearchPathError>;

    /// Sources with a higher priority mask same-named entries from sources
    /// with a lower priority.
    fn priority(&self) -> i64;

    fn name(&self) -> &str;

    fn stat(&self, id: SourceEntryId) -> Result<EntryMetadata, SearchPathError>;

    fn read(&self, id: SourceEntryId) -> Result<Cow<[u8]>, SearchPathError>;
}
