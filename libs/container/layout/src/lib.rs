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

//! The block allocator (spec §4.2) and pointer/offset codec (spec §4.3):
//! the in-stream memory layout primitives the graph walker (C4, the `graph`
//! crate) drives.

mod block;
mod error;
mod offset;
mod pointer;

pub use block::{BlockCatalog, BlockDef, Persistence};
pub use error::LayoutError;
pub use offset::{BlockId, StreamOffset, BLOCK_ID_BITS, MAX_BLOCKS, MAX_BLOCK_OFFSET, OFFSET_BITS};
pub use pointer::{FollowGuard, InverseTable, PointerTable};

pub use block::BlockAllocator;

/// Invariant A2: a pointer field may only reference an address in a block of
/// equal or greater persistence than its own block.
pub fn check_pointer_persistence(from: Persistence, to: Persistence) -> Result<(), LayoutError> {
    if to < from {
        return Err(LayoutError::PersistenceViolation { from, to });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_may_point_at_runtime_but_not_vice_versa() {
        assert!(check_pointer_persistence(Persistence::Normal, Persistence::Runtime).is_ok());
        assert!(check_pointer_persistence(Persistence::Runtime, Persistence::Normal).is_err());
        assert!(check_pointer_persistence(Persistence::Temp, Persistence::Normal).is_ok());
        assert!(check_pointer_persistence(Persistence::Normal, Persistence::Temp).is_err());
    }
}
