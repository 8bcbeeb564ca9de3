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

use crate::{LayoutError, StreamOffset};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    hash::Hash,
};

/// Write-side placement table (spec §4.3 "Write"). `K` is whatever identity
/// the graph walker uses for a pointer's target (an arena address or index);
/// the table never looks inside it.
///
/// Guarantees Invariant C1 (a target is placed exactly once; repeat
/// references reuse its offset) and exposes the "enqueue, then drain
/// breadth-first per substructure" order the walker needs (spec §4.4
/// "Ordering"): out-of-line targets go on the back of `queue` and the walker
/// drains it after finishing the current substructure.
pub struct PointerTable<K> {
    placed: HashMap<K, StreamOffset>,
    queue: VecDeque<K>,
}

impl<K: Copy + Eq + Hash> Default for PointerTable<K> {
    fn default() -> Self {
        Self {
            placed: HashMap::new(),
            queue: VecDeque::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> PointerTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key`'s stream offset, calling `alloc` to place it the first
    /// time it is seen. Returns `(offset, was_already_placed)`.
    pub fn place(&mut self, key: K, alloc: impl FnOnce() -> StreamOffset) -> (StreamOffset, bool) {
        if let Some(&offset) = self.placed.get(&key) {
            return (offset, true);
        }
        let offset = alloc();
        self.placed.insert(key, offset);
        self.queue.push_back(key);
        (offset, false)
    }

    pub fn pop_queued(&mut self) -> Option<K> {
        self.queue.pop_front()
    }

    pub fn is_drained(&self) -> bool {
        self.queue.is_empty()
    }

    /// Peek a key's offset without placing it.
    pub fn get(&self, key: &K) -> Option<StreamOffset> {
        self.placed.get(key).copied()
    }
}

/// Read-side mirror of [`PointerTable`]: maps a tagged `(block, offset)`
/// pair to the arena key it resolves to, allocating that key's storage the
/// first time the pair is observed (spec §4.3 "Read").
pub struct InverseTable<K> {
    resolved: HashMap<(crate::BlockId, u32), K>,
    queue: VecDeque<K>,
}

impl<K: Copy + Eq + Hash> Default for InverseTable<K> {
    fn default() -> Self {
        Self {
            resolved: HashMap::new(),
            queue: VecDeque::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> InverseTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &mut self,
        block: crate::BlockId,
        offset: u32,
        alloc: impl FnOnce() -> K,
    ) -> (K, bool) {
        if let Some(&key) = self.resolved.get(&(block, offset)) {
            return (key, true);
        }
        let key = alloc();
        self.resolved.insert((block, offset), key);
        self.queue.push_back(key);
        (key, false)
    }

    pub fn pop_queued(&mut self) -> Option<K> {
        self.queue.pop_front()
    }
}

/// Detects a `FOLLOWING` chain that cycles back on a key already being
/// serialized in place (spec §7 `CyclicFollowing`).
pub struct FollowGuard<K> {
    in_progress: HashSet<K>,
}

impl<K: Copy + Eq + Hash> Default for FollowGuard<K> {
    fn default() -> Self {
        Self {
            in_progress: HashSet::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> FollowGuard<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, key: K) -> Result<(), LayoutError> {
        if !self.in_progress.insert(key) {
            return Err(LayoutError::CyclicFollowing);
        }
        Ok(())
    }

    pub fn exit(&mut self, key: K) {
        self.in_progress.remove(&key);
    }
}
