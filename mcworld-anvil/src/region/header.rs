//! Region file header.
//!
//! The header consists of two tables:
//! - Location table: where each chunk is stored
//! - Timestamp table: when each chunk was last saved

use anyhow::{Result, bail};

use super::{CHUNKS_PER_REGION, HEADER_BYTES, SECTOR_BYTES};

/// Where a chunk lives inside the region file, in 4 KiB sectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    pub sector: u32,
    pub count: u8,
}

impl Location {
    /// Entries with no sectors mean "chunk not generated yet".
    pub fn is_empty(&self) -> bool {
        self.sector == 0 || self.count == 0
    }

    #[inline]
    pub fn byte_offset(&self) -> u64 {
        self.sector as u64 * SECTOR_BYTES
    }

    #[inline]
    pub fn byte_len(&self) -> u64 {
        self.count as u64 * SECTOR_BYTES
    }

    /// First sector after this entry.
    #[inline]
    pub fn end(&self) -> u32 {
        self.sector + self.count as u32
    }
}

/// Parsed 8 KiB header (location table + timestamp table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    locations: Vec<Location>,
    timestamps: Vec<u32>,
}

impl Header {
    /// Header of a region without any chunk.
    pub fn empty() -> Self {
        Self {
            locations: vec![Location::default(); CHUNKS_PER_REGION],
            timestamps: vec![0; CHUNKS_PER_REGION],
        }
    }

    /// Parse the raw header bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_BYTES as usize {
            bail!("Region header too short: {} bytes", bytes.len());
        }

        let mut header = Self::empty();
        for i in 0..CHUNKS_PER_REGION {
            // Each entry: 3 bytes offset + 1 byte sector count
            let entry = &bytes[i * 4..i * 4 + 4];
            header.locations[i] = Location {
                sector: u32::from_be_bytes([0, entry[0], entry[1], entry[2]]),
                count: entry[3],
            };

            let stamp = 4096 + i * 4;
            header.timestamps[i] = u32::from_be_bytes([
                bytes[stamp],
                bytes[stamp + 1],
                bytes[stamp + 2],
                bytes[stamp + 3],
            ]);
        }
        Ok(header)
    }

    /// Serialize back to the 8192 byte on-disk form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_BYTES as usize];
        for (i, location) in self.locations.iter().enumerate() {
            let entry_offset = i * 4;
            bytes[entry_offset] = ((location.sector >> 16) & 0xFF) as u8;
            bytes[entry_offset + 1] = ((location.sector >> 8) & 0xFF) as u8;
            bytes[entry_offset + 2] = (location.sector & 0xFF) as u8;
            bytes[entry_offset + 3] = location.count;
        }
        for (i, stamp) in self.timestamps.iter().enumerate() {
            let offset = 4096 + i * 4;
            bytes[offset..offset + 4].copy_from_slice(&stamp.to_be_bytes());
        }
        bytes
    }

    pub fn location(&self, index: usize) -> Location {
        self.locations[index]
    }

    pub fn timestamp(&self, index: usize) -> u32 {
        self.timestamps[index]
    }

    pub fn set(&mut self, index: usize, location: Location, timestamp: u32) {
        self.locations[index] = location;
        self.timestamps[index] = timestamp;
    }

    /// First free sector past every stored chunk (never inside the header).
    pub fn end_sector(&self) -> u32 {
        let header_sectors = (HEADER_BYTES / SECTOR_BYTES) as u32;
        self.locations
            .iter()
            .filter(|l| !l.is_empty())
            .map(Location::end)
            .max()
            .unwrap_or(header_sectors)
            .max(header_sectors)
    }
}
