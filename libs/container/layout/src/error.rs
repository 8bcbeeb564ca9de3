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

use crate::{BlockId, Persistence};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("block {0:?} overflowed its declared capacity")]
    BlockOverflow(BlockId),

    #[error("pointer field in a block of persistence {from:?} may not reference {to:?} (Invariant A2)")]
    PersistenceViolation {
        from: Persistence,
        to: Persistence,
    },

    #[error("misaligned access: align {align} is not a power of two")]
    MisalignedAccess { align: u32 },

    #[error("stream offset references unknown or out-of-range block/offset ({block:?}, {offset})")]
    UnresolvedOffset { block: BlockId, offset: u32 },

    #[error("FOLLOWING chain cycles back on itself")]
    CyclicFollowing,

    #[error("too many blocks: block ids must be < {0}")]
    TooManyBlocks(u32),
}
