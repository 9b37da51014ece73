// Anvil region container (.mca): 32x32 chunks behind an 8 KiB header.

mod compression;
pub mod header;

pub use compression::Compression;
pub use header::{Header, Location};

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};

pub const SECTOR_BYTES: u64 = 4096; // minecraft uses 4096 bytes per sector
pub const HEADER_BYTES: u64 = 8192; // header is 8192 bytes (2 sectors 8kb)

pub const CHUNKS_PER_SIDE: usize = 32;
pub const CHUNKS_PER_REGION: usize = CHUNKS_PER_SIDE * CHUNKS_PER_SIDE;

/// Largest payload a single location entry can describe (255 sectors).
pub const MAX_CHUNK_BYTES: u64 = 255 * SECTOR_BYTES;

/// Index of a chunk in the header tables. Formula: x + z * 32
#[inline]
pub fn chunk_index(local_x: u8, local_z: u8) -> usize {
    (local_x as usize & 31) + (local_z as usize & 31) * CHUNKS_PER_SIDE
}

/// Sectors needed to hold `bytes` bytes.
#[inline]
pub fn sectors_for(bytes: u64) -> u64 {
    bytes.div_ceil(SECTOR_BYTES)
}

/// File name of a region in the vanilla layout: `r.<x>.<z>.mca`.
pub fn region_file_name(region_x: i32, region_z: i32) -> String {
    format!("r.{}.{}.mca", region_x, region_z)
}

/// One region file on disk.
///
/// The file does not need to exist: reads of a missing file report every
/// chunk as absent, and the first write creates it (and its directory).
pub struct RegionFile {
    path: PathBuf,
    compression: Compression,
    header: Option<Header>,
}

impl RegionFile {
    pub fn new(path: impl Into<PathBuf>, compression: Compression) -> Self {
        Self {
            path: path.into(),
            compression,
            header: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and inflate the NBT bytes of one chunk.
    /// Returns `None` when the region has no data for that slot.
    pub fn read_chunk(&mut self, local_x: u8, local_z: u8) -> Result<Option<Vec<u8>>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to open {}", self.path.display()));
            }
        };

        let location = self.load_header(&mut file)?.location(chunk_index(local_x, local_z));
        if location.is_empty() {
            return Ok(None);
        }

        file.seek(SeekFrom::Start(location.byte_offset()))?;
        // [length:4][compression:1][compressed_nbt:N]
        let mut prefix = [0u8; 5];
        file.read_exact(&mut prefix)
            .with_context(|| format!("Truncated chunk ({}, {}) in {}", local_x, local_z, self.path.display()))?;

        let length = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as u64;
        if length == 0 {
            return Ok(None);
        }
        if length + 4 > location.byte_len() {
            bail!(
                "Chunk ({}, {}) claims {} bytes but only {} sectors are allocated",
                local_x,
                local_z,
                length,
                location.count
            );
        }

        let compression = Compression::from_byte(prefix[4])?;
        let mut payload = vec![0u8; (length - 1) as usize];
        file.read_exact(&mut payload)?;

        compression.decompress(&payload).map(Some)
    }

    /// Compress and store the NBT bytes of one chunk.
    ///
    /// The chunk keeps its slot when the new payload fits, otherwise it is
    /// appended past the last used sector. Freed sectors are not reclaimed.
    pub fn write_chunk(&mut self, local_x: u8, local_z: u8, nbt: &[u8]) -> Result<()> {
        let compressed = self.compression.compress(nbt)?;
        let length = compressed.len() as u64 + 1;
        let sectors = sectors_for(length + 4);
        if length + 4 > MAX_CHUNK_BYTES {
            bail!("Chunk ({}, {}) is too large: {} bytes", local_x, local_z, length);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;

        let mut header = self.load_header(&mut file)?.clone();
        let index = chunk_index(local_x, local_z);
        let current = header.location(index);
        let sector = if !current.is_empty() && current.count as u64 >= sectors {
            current.sector
        } else {
            header.end_sector()
        };

        let mut blob = Vec::with_capacity((sectors * SECTOR_BYTES) as usize);
        blob.extend_from_slice(&(length as u32).to_be_bytes());
        blob.push(self.compression.id());
        blob.extend_from_slice(&compressed);
        // Pad to the sector boundary
        blob.resize((sectors * SECTOR_BYTES) as usize, 0);

        file.seek(SeekFrom::Start(sector as u64 * SECTOR_BYTES))?;
        file.write_all(&blob)?;

        let location = Location {
            sector,
            count: sectors as u8,
        };
        header.set(index, location, now_secs());
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.to_bytes())?;
        file.flush()?;

        log::debug!(
            "Wrote chunk ({}, {}) to {} at sector {} ({} sectors)",
            local_x,
            local_z,
            self.path.display(),
            sector,
            sectors
        );
        self.header = Some(header);
        Ok(())
    }

    fn load_header(&mut self, file: &mut File) -> Result<&Header> {
        if self.header.is_none() {
            let len = file.metadata()?.len();
            let header = if len < HEADER_BYTES {
                // Fresh (or truncated) file: nothing stored yet
                Header::empty()
            } else {
                let mut bytes = vec![0u8; HEADER_BYTES as usize];
                file.seek(SeekFrom::Start(0))?;
                file.read_exact(&mut bytes)?;
                Header::parse(&bytes)?
            };
            self.header = Some(header);
        }
        Ok(self.header.get_or_insert_with(Header::empty))
    }
}

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_chunk_index() {
        assert_eq!(chunk_index(0, 0), 0);
        assert_eq!(chunk_index(31, 0), 31);
        assert_eq!(chunk_index(0, 1), 32);
        assert_eq!(chunk_index(31, 31), 1023);
    }

    #[test]
    fn test_sectors_for() {
        assert_eq!(sectors_for(1), 1);
        assert_eq!(sectors_for(4096), 1);
        assert_eq!(sectors_for(4097), 2);
    }

    #[test]
    fn test_region_file_name() {
        assert_eq!(region_file_name(-1, 2), "r.-1.2.mca");
    }

    #[test]
    fn test_missing_file_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let mut region = RegionFile::new(dir.path().join("r.0.0.mca"), Compression::Zlib);
        assert_eq!(region.read_chunk(3, 5).unwrap(), None);
        assert!(!region.path().exists());
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("region").join("r.0.0.mca");
        let mut region = RegionFile::new(&path, Compression::Zlib);

        region.write_chunk(3, 5, b"chunk three five").unwrap();
        region.write_chunk(0, 0, b"origin").unwrap();

        assert_eq!(region.read_chunk(3, 5).unwrap().as_deref(), Some(&b"chunk three five"[..]));
        assert_eq!(region.read_chunk(0, 0).unwrap().as_deref(), Some(&b"origin"[..]));
        assert_eq!(region.read_chunk(1, 1).unwrap(), None);

        // A fresh handle sees the same data through the on-disk header
        let mut reopened = RegionFile::new(&path, Compression::Gzip);
        assert_eq!(reopened.read_chunk(3, 5).unwrap().as_deref(), Some(&b"chunk three five"[..]));
    }

    #[test]
    fn test_rewrite_reuses_slot_when_it_fits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.0.0.mca");
        let mut region = RegionFile::new(&path, Compression::None);

        region.write_chunk(1, 0, &[1u8; 100]).unwrap();
        region.write_chunk(2, 0, &[2u8; 100]).unwrap();
        let before = fs::metadata(&path).unwrap().len();

        region.write_chunk(1, 0, &[3u8; 200]).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), before);
        assert_eq!(region.read_chunk(1, 0).unwrap(), Some(vec![3u8; 200]));

        // Growing past its sector moves the chunk to the end of the file
        region.write_chunk(1, 0, &[4u8; 5000]).unwrap();
        assert!(fs::metadata(&path).unwrap().len() > before);
        assert_eq!(region.read_chunk(1, 0).unwrap(), Some(vec![4u8; 5000]));
        assert_eq!(region.read_chunk(2, 0).unwrap(), Some(vec![2u8; 100]));
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        let dir = TempDir::new().unwrap();
        let mut region = RegionFile::new(dir.path().join("r.0.0.mca"), Compression::None);
        let huge = vec![0u8; MAX_CHUNK_BYTES as usize];
        assert!(region.write_chunk(0, 0, &huge).is_err());
    }
}
