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

/// A block identifier: the high bits of a 32-bit stream offset (spec §3).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u16);

/// Block ids occupy the top [`BLOCK_ID_BITS`] bits of a stream offset. The
/// all-ones pattern is reserved by [`FOLLOWING`][StreamOffset::Following]
/// (the whole word is `u32::MAX`), so only `2^BLOCK_ID_BITS - 1` ids are
/// actually usable.
pub const BLOCK_ID_BITS: u32 = 6;
pub const OFFSET_BITS: u32 = 32 - BLOCK_ID_BITS;
pub const OFFSET_MASK: u32 = (1 << OFFSET_BITS) - 1;
pub const MAX_BLOCKS: u32 = (1 << BLOCK_ID_BITS) - 1;
pub const MAX_BLOCK_OFFSET: u32 = OFFSET_MASK;

/// A 32-bit on-disk pointer value: `(block_id: high bits, offset: low
/// bits)`, with `0` and `u32::MAX` reserved for null and `FOLLOWING` (spec
/// §3 "Stream offset"). Block 0, offset 0 is therefore unaddressable as a
/// real pointer target — the same trade every implementation of this stream
/// offset scheme makes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StreamOffset {
    Null,
    Following,
    Tagged { block: BlockId, offset: u32 },
}

impl StreamOffset {
    pub fn tagged(block: BlockId, offset: u32) -> Self {
        debug_assert!(offset <= MAX_BLOCK_OFFSET);
        StreamOffset::Tagged { block, offset }
    }

    pub fn encode(self) -> u32 {
        match self {
            StreamOffset::Null => 0,
            StreamOffset::Following => u32::MAX,
            StreamOffset::Tagged { block, offset } => {
                ((block.0 as u32) << OFFSET_BITS) | (offset & OFFSET_MASK)
            }
        }
    }

    pub fn decode(raw: u32) -> Self {
        if raw == 0 {
            StreamOffset::Null
        } else if raw == u32::MAX {
            StreamOffset::Following
        } else {
            let block = BlockId((raw >> OFFSET_BITS) as u16);
            let offset = raw & OFFSET_MASK;
            StreamOffset::Tagged { block, offset }
        }
    }

    pub fn is_null(self) -> bool {
        matches!(self, StreamOffset::Null)
    }

    pub fn is_following(self) -> bool {
        matches!(self, StreamOffset::Following)
    }
}
