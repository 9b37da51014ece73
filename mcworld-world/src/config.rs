use mcworld_anvil::Compression;
use mcworld_storage::DirectoryLayout;

/// Settings of a save folder opened with [`World::open`](crate::World::open).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldConfig {
    pub layout: DirectoryLayout,
    /// Scheme used when chunks are written back.
    pub compression: Compression,
}

impl WorldConfig {
    /// Defaults, overridden by `MCWORLD_REGION_DIR`, `MCWORLD_PLAYER_DIR`
    /// and `MCWORLD_COMPRESSION` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let compression = lookup("MCWORLD_COMPRESSION")
            .and_then(|v| match v.parse() {
                Ok(c) => Some(c),
                Err(e) => {
                    log::warn!("Ignoring MCWORLD_COMPRESSION: {}", e);
                    None
                }
            })
            .unwrap_or(defaults.compression);

        Self {
            layout: DirectoryLayout {
                region_dir: lookup("MCWORLD_REGION_DIR").unwrap_or(defaults.layout.region_dir),
                player_dir: lookup("MCWORLD_PLAYER_DIR").unwrap_or(defaults.layout.player_dir),
                player_extension: defaults.layout.player_extension,
            },
            compression,
        }
    }
}
