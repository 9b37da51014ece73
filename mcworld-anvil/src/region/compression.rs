use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use flate2::Compression as Level;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

/// Compression scheme byte stored in front of every chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    Gzip,
    #[default]
    Zlib,
    None,
}

impl Compression {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(Self::Gzip),
            2 => Ok(Self::Zlib),
            3 => Ok(Self::None),
            4 => bail!("LZ4 chunk compression (type 4) is not supported"),
            b if b & 0x80 != 0 => bail!("External chunk files (.mcc) are not supported"),
            b => bail!("Unknown chunk compression type {}", b),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Self::Gzip => 1,
            Self::Zlib => 2,
            Self::None => 3,
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Level::default());
                encoder.write_all(data).context("Failed to gzip chunk")?;
                encoder.finish().context("Failed to finish gzip stream")
            }
            Self::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Level::default());
                encoder.write_all(data).context("Failed to compress chunk")?;
                encoder.finish().context("Failed to finish compression")
            }
            Self::None => Ok(data.to_vec()),
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            Self::Gzip => {
                GzDecoder::new(data)
                    .read_to_end(&mut out)
                    .context("Failed to inflate gzip chunk")?;
            }
            Self::Zlib => {
                ZlibDecoder::new(data)
                    .read_to_end(&mut out)
                    .context("Failed to inflate zlib chunk")?;
            }
            Self::None => out.extend_from_slice(data),
        }
        Ok(out)
    }
}

impl FromStr for Compression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" => Ok(Self::Gzip),
            "zlib" => Ok(Self::Zlib),
            "none" | "uncompressed" => Ok(Self::None),
            other => Err(anyhow!("Unknown compression {:?} (expected gzip, zlib or none)", other)),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gzip => "gzip",
            Self::Zlib => "zlib",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_ids() {
        for scheme in [Compression::Gzip, Compression::Zlib, Compression::None] {
            assert_eq!(Compression::from_byte(scheme.id()).unwrap(), scheme);
        }
        assert!(Compression::from_byte(4).is_err());
        assert!(Compression::from_byte(0x82).is_err());
    }

    #[test]
    fn test_inflate_matches_input() {
        let data = b"Level/Sections/Blocks".repeat(50);
        for scheme in [Compression::Gzip, Compression::Zlib, Compression::None] {
            let packed = scheme.compress(&data).unwrap();
            assert_eq!(scheme.decompress(&packed).unwrap(), data);
        }
    }

    #[test]
    fn test_parse_name() {
        assert_eq!("GZIP".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert!("lz4".parse::<Compression>().is_err());
    }
}
