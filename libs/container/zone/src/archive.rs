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

//! Process-lifetime registry of loaded archive containers (spec §9 "Global
//! singletons (IWD repository, IPAK repository, SoundBank repository)"):
//! acquired by name on first use, released by reference count when the
//! last referencing zone drops it.

use parking_lot::Mutex;
use search_path::SearchPath;
use std::collections::HashMap;
use std::sync::Arc;

/// One named archive, reference-counted across the zones that use it. The
/// repository itself only tracks the name-to-archive mapping; attaching the
/// concrete [`search_path::Source`]s that back an archive is the caller's
/// job (spec leaves IWD/IPAK/SoundBank container formats out of scope; this
/// type is generic over whatever `SearchPath` a caller builds for one).
#[derive(Default)]
pub struct ArchiveRepository {
    archives: Mutex<HashMap<String, Arc<SearchPath>>>,
}

impl ArchiveRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the archive named `name`, creating it via `build` if this is
    /// the first acquisition. Every returned `Arc` counts toward the same
    /// refcount; the entry is dropped from the repository once the last
    /// clone is released.
    pub fn acquire(
        &self,
        name: &str,
        build: impl FnOnce() -> SearchPath,
    ) -> Arc<SearchPath> {
        let mut archives = self.archives.lock();
        if let Some(existing) = archives.get(name) {
            return existing.clone();
        }
        let archive = Arc::new(build());
        archives.insert(name.to_owned(), archive.clone());
        archive
    }

    /// Drops any archive entries whose only remaining reference is this
    /// repository's own table entry. Called after a zone unloads to release
    /// archives no other loaded zone still references.
    pub fn collect_unreferenced(&self) {
        self.archives
            .lock()
            .retain(|_, archive| Arc::strong_count(archive) > 1);
    }

    pub fn loaded_count(&self) -> usize {
        self.archives.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_acquire_shares_the_same_archive() {
        let repo = ArchiveRepository::new();
        let a = repo.acquire("iwd_0", SearchPath::empty);
        let b = repo.acquire("iwd_0", SearchPath::empty);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(repo.loaded_count(), 1);
    }

    #[test]
    fn unreferenced_archive_is_collected() {
        let repo = ArchiveRepository::new();
        {
            let _handle = repo.acquire("iwd_0", SearchPath::empty);
            assert_eq!(repo.loaded_count(), 1);
        }
        repo.collect_unreferenced();
        assert_eq!(repo.loaded_count(), 0);
    }

    #[test]
    fn still_referenced_archive_is_kept() {
        let repo = ArchiveRepository::new();
        let _held = repo.acquire("iwd_0", SearchPath::empty);
        repo.collect_unreferenced();
        assert_eq!(repo.loaded_count(), 1);
    }
}
