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

use crate::{EntryMetadata, SearchPathError, Source, SourceEntryId};
use log::trace;
use std::{
    borrow::Cow,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// A [`Source`] backed by a directory tree on the filesystem, walked once at
/// attach time. This is the only source kind the container pipeline needs
/// directly; archive-backed sources (asset packs, audio banks) implement the
/// same trait out of tree.
pub struct DirectorySource {
    name: String,
    priority: i64,
    root: PathBuf,
    entries: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new(name: &str, priority: i64, root: impl AsRef<Path>) -> Result<Self, SearchPathError> {
        let root = root.as_ref().to_path_buf();
        let mut entries = Vec::new();
        walk(&root, &root, &mut entries)?;
        trace!(
            "indexed directory source {:?} at {:?}: {} files",
            name,
            root,
            entries.len()
        );
        Ok(Self {
            name: name.to_owned(),
            priority,
            root,
            entries,
        })
    }

    fn full_path(&self, id: SourceEntryId) -> Result<&Path, SearchPathError> {
        self.entries
            .get(id.raw() as usize)
            .map(PathBuf::as_path)
            .ok_or(SearchPathError::NoSuchEntry)
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), SearchPathError> {
    for entry in fs::read_dir(dir).map_err(|source| SearchPathError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        let entry = entry.map_err(|source| SearchPathError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, out)?;
        } else {
            out.push(path.strip_prefix(root).unwrap_or(&path).to_path_buf());
        }
    }
    Ok(())
}

impl Source for DirectorySource {
    fn index(&self) -> Result<HashMap<SourceEntryId, String>, SearchPathError> {
        let mut map = HashMap::with_capacity(self.entries.len());
        for (i, rel) in self.entries.iter().enumerate() {
            let name = rel.to_string_lossy().replace('\\', "/");
            map.insert(SourceEntryId::from_u32(i as u32), name);
        }
        Ok(map)
    }

    fn priority(&self) -> i64 {
        self.priority
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self, id: SourceEntryId) -> Result<EntryMetadata, SearchPathError> {
        let rel = self.full_path(id)?.to_path_buf();
        let abs = self.root.join(&rel);
        let meta = fs::metadata(&abs).map_err(|source| SearchPathError::Io {
            path: abs.clone(),
            source,
        })?;
        Ok(EntryMetadata {
            entry_id: id,
            name: rel.to_string_lossy().replace('\\', "/"),
            size: meta.len(),
            path: Some(abs),
        })
    }

    fn read(&self, id: SourceEntryId) -> Result<Cow<[u8]>, SearchPathError> {
        let rel = self.full_path(id)?.to_path_buf();
        let abs = self.root.join(rel);
        let bytes = fs::read(&abs).map_err(|source| SearchPathError::Io { path: abs, source })?;
        Ok(Cow::Owned(bytes))
    }
}
