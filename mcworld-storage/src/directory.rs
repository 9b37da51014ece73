use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use mcworld_anvil::region::{self, Compression, RegionFile};

use crate::{RegionContainer, WorldStorage};

/// Where things live inside a save folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    pub region_dir: String,
    pub player_dir: String,
    pub player_extension: String,
}

impl Default for DirectoryLayout {
    fn default() -> Self {
        Self {
            region_dir: "region".to_string(),
            player_dir: "players".to_string(),
            player_extension: "dat".to_string(),
        }
    }
}

/// Vanilla save folder: `region/r.<x>.<z>.mca` and `players/<name>.dat`.
pub struct DirectoryStorage {
    root: PathBuf,
    layout: DirectoryLayout,
    compression: Compression,
}

impl DirectoryStorage {
    pub fn new(root: impl Into<PathBuf>, layout: DirectoryLayout, compression: Compression) -> Self {
        Self {
            root: root.into(),
            layout,
            compression,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn region_path(&self, region_x: i32, region_z: i32) -> PathBuf {
        self.root
            .join(&self.layout.region_dir)
            .join(region::region_file_name(region_x, region_z))
    }

    pub fn player_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            bail!("Invalid player name {:?}", name);
        }
        Ok(self
            .root
            .join(&self.layout.player_dir)
            .join(format!("{}.{}", name, self.layout.player_extension)))
    }
}

#[async_trait]
impl WorldStorage for DirectoryStorage {
    fn open_region(&self, region_x: i32, region_z: i32) -> Arc<dyn RegionContainer> {
        let path = self.region_path(region_x, region_z);
        log::info!("Opening region ({}, {}) at {}", region_x, region_z, path.display());
        Arc::new(FileRegion {
            file: Arc::new(Mutex::new(RegionFile::new(path, self.compression))),
        })
    }

    async fn read_player(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.player_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

/// Region container over a [`RegionFile`]. File I/O is blocking, so it runs
/// on the blocking pool; the mutex serializes header updates.
struct FileRegion {
    file: Arc<Mutex<RegionFile>>,
}

#[async_trait]
impl RegionContainer for FileRegion {
    async fn read(&self, local_x: u8, local_z: u8) -> Result<Option<Vec<u8>>> {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || {
            let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
            file.read_chunk(local_x, local_z)
        })
        .await
        .context("Region read task failed")?
    }

    async fn write(&self, local_x: u8, local_z: u8, data: &[u8]) -> Result<()> {
        let file = Arc::clone(&self.file);
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
            file.write_chunk(local_x, local_z, &data)
        })
        .await
        .context("Region write task failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> DirectoryStorage {
        DirectoryStorage::new(dir.path(), DirectoryLayout::default(), Compression::Zlib)
    }

    #[test]
    fn test_paths() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        assert_eq!(storage.region_path(-1, 3), dir.path().join("region").join("r.-1.3.mca"));
        assert_eq!(storage.player_path("Notch").unwrap(), dir.path().join("players").join("Notch.dat"));
        assert!(storage.player_path("../level").is_err());
        assert!(storage.player_path("").is_err());
    }

    #[tokio::test]
    async fn test_region_write_then_read() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let region = storage.open_region(0, -1);
        assert_eq!(region.read(3, 5).await.unwrap(), None);
        region.write(3, 5, b"payload").await.unwrap();
        assert_eq!(region.read(3, 5).await.unwrap().as_deref(), Some(&b"payload"[..]));
        assert!(storage.region_path(0, -1).exists());
    }

    #[tokio::test]
    async fn test_read_player() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        assert_eq!(storage.read_player("Steve").await.unwrap(), None);

        std::fs::create_dir_all(dir.path().join("players")).unwrap();
        std::fs::write(dir.path().join("players").join("Steve.dat"), b"record").unwrap();
        assert_eq!(storage.read_player("Steve").await.unwrap(), Some(b"record".to_vec()));
    }
}
