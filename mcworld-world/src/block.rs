//! Per-block attribute access over a section's packed arrays.
//!
//! `Blocks` holds one byte per block. `Add`, `Data`, `SkyLight` and
//! `BlockLight` hold one nibble per block, two blocks per byte: the even
//! index in bits 0-3, the odd index in bits 4-7. Every array is addressed
//! with the same linear index `y * 256 + z * 16 + x` (section-local axes).

use mcworld_anvil::{ChunkDocument, Section};

use crate::coords::{BlockLocal, SECTION_BLOCKS};

/// Read one nibble out of a packed byte.
#[inline]
pub fn unpack_nibble(byte: u8, high: bool) -> u8 {
    if high { (byte >> 4) & 0x0F } else { byte & 0x0F }
}

/// Replace one nibble of a packed byte, keeping the other one.
#[inline]
pub fn pack_nibble(byte: u8, high: bool, value: u8) -> u8 {
    if high {
        (byte & 0x0F) | ((value & 0x0F) << 4)
    } else {
        (byte & 0xF0) | (value & 0x0F)
    }
}

/// Location of one block inside the packed arrays of its section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockIndex {
    /// Vertical section slot (`y / 16`).
    pub slot: i32,
    /// Linear index in `0..4096`.
    pub index: usize,
}

impl BlockIndex {
    pub fn new(local: BlockLocal) -> Self {
        let slot = local.y.div_euclid(SECTION_BLOCKS);
        let section_y = local.y.rem_euclid(SECTION_BLOCKS) as usize;
        Self {
            slot,
            index: section_y * 256 + (local.z as usize & 15) * 16 + (local.x as usize & 15),
        }
    }

    /// Byte holding this block's nibble.
    #[inline]
    pub fn packed(&self) -> usize {
        self.index / 2
    }

    /// Whether this block uses the upper nibble of its byte.
    #[inline]
    pub fn is_high(&self) -> bool {
        self.index % 2 == 1
    }

    fn nibble(&self, array: &[u8]) -> Option<u8> {
        array.get(self.packed()).map(|&b| unpack_nibble(b, self.is_high()))
    }

    fn set_nibble(&self, array: &mut [u8], value: u8) -> bool {
        match array.get_mut(self.packed()) {
            Some(byte) => {
                *byte = pack_nibble(*byte, self.is_high(), value);
                true
            }
            None => false,
        }
    }
}

/// All attributes of one block; `None` where the section stores nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockState {
    pub type_id: Option<u16>,
    pub data: Option<u8>,
    pub sky_light: Option<u8>,
    pub block_light: Option<u8>,
}

/// Read access to one block of a chunk document.
#[derive(Debug, Clone, Copy)]
pub struct BlockView<'a> {
    section: Option<&'a Section>,
    index: BlockIndex,
}

impl<'a> BlockView<'a> {
    pub fn new(document: &'a ChunkDocument, local: BlockLocal) -> Self {
        let index = BlockIndex::new(local);
        Self {
            section: document.section(index.slot),
            index,
        }
    }

    pub fn index(&self) -> BlockIndex {
        self.index
    }

    /// 12-bit id when the section has `Add`, 8-bit otherwise.
    pub fn type_id(&self) -> Option<u16> {
        let section = self.section?;
        let low = *section.blocks.as_deref()?.get(self.index.index)? as u16;
        match section.add.as_deref() {
            Some(add) => Some(low | (self.index.nibble(add)? as u16) << 8),
            None => Some(low),
        }
    }

    pub fn data(&self) -> Option<u8> {
        self.index.nibble(self.section?.data.as_deref()?)
    }

    pub fn sky_light(&self) -> Option<u8> {
        self.index.nibble(self.section?.sky_light.as_deref()?)
    }

    pub fn block_light(&self) -> Option<u8> {
        self.index.nibble(self.section?.block_light.as_deref()?)
    }

    pub fn state(&self) -> BlockState {
        BlockState {
            type_id: self.type_id(),
            data: self.data(),
            sky_light: self.sky_light(),
            block_light: self.block_light(),
        }
    }
}

/// Write access to one block of a chunk document.
///
/// Setters return `false` and change nothing when the backing array (or the
/// whole section) is missing.
#[derive(Debug)]
pub struct BlockViewMut<'a> {
    section: Option<&'a mut Section>,
    index: BlockIndex,
}

impl<'a> BlockViewMut<'a> {
    pub fn new(document: &'a mut ChunkDocument, local: BlockLocal) -> Self {
        let index = BlockIndex::new(local);
        Self {
            section: document.section_mut(index.slot),
            index,
        }
    }

    pub fn as_view(&self) -> BlockView<'_> {
        BlockView {
            section: self.section.as_deref(),
            index: self.index,
        }
    }

    /// Low byte goes to `Blocks`, high nibble to `Add` when present.
    /// Without `Add` ids above 255 are truncated to 8 bits. Nothing is
    /// written unless every array involved covers this block.
    pub fn set_type(&mut self, id: u16) -> bool {
        let index = self.index;
        let Some(section) = self.section.as_deref_mut() else {
            return false;
        };
        if section.add.as_deref().is_some_and(|add| add.len() <= index.packed()) {
            return false;
        }
        let Some(slot) = section.blocks.as_deref_mut().and_then(|b| b.get_mut(index.index)) else {
            return false;
        };
        *slot = (id & 0xFF) as u8;
        if let Some(add) = section.add.as_deref_mut() {
            index.set_nibble(add, ((id >> 8) & 0x0F) as u8);
        }
        true
    }

    pub fn set_data(&mut self, value: u8) -> bool {
        let index = self.index;
        self.with_nibbles(|s| s.data.as_deref_mut(), |array| index.set_nibble(array, value))
    }

    pub fn set_sky_light(&mut self, value: u8) -> bool {
        let index = self.index;
        self.with_nibbles(|s| s.sky_light.as_deref_mut(), |array| index.set_nibble(array, value))
    }

    pub fn set_block_light(&mut self, value: u8) -> bool {
        let index = self.index;
        self.with_nibbles(|s| s.block_light.as_deref_mut(), |array| index.set_nibble(array, value))
    }

    fn with_nibbles(
        &mut self,
        select: impl FnOnce(&mut Section) -> Option<&mut [u8]>,
        write: impl FnOnce(&mut [u8]) -> bool,
    ) -> bool {
        self.section.as_deref_mut().and_then(select).is_some_and(write)
    }
}
