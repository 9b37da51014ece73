//! NBT (Named Binary Tag) codec.
//!
//! Thin layer over fastnbt's dynamic [`Value`] tree. Chunk payloads come out
//! of the region file already inflated; player files are gzip-compressed on
//! disk, so `decode` inflates gzip input transparently.

use std::io::Read;

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;

pub use fastnbt::Value;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Parse an NBT document. The root must be a compound.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    let inflated;
    let raw = if bytes.starts_with(&GZIP_MAGIC) {
        let mut out = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut out)
            .context("Failed to inflate gzip document")?;
        inflated = out;
        &inflated[..]
    } else {
        bytes
    };

    let value: Value = fastnbt::from_bytes(raw).context("NBT parse failed")?;
    if !matches!(value, Value::Compound(_)) {
        bail!("NBT root is not a compound");
    }
    Ok(value)
}

/// Serialize an NBT document (uncompressed).
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    fastnbt::to_bytes(value).context("Failed to serialize NBT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    fn sample() -> Value {
        let mut root = HashMap::new();
        root.insert("Dimension".to_string(), Value::Int(-1));
        root.insert("Pos".to_string(), Value::List(vec![Value::Double(1.5), Value::Double(64.0), Value::Double(-3.0)]));
        Value::Compound(root)
    }

    #[test]
    fn test_decode_plain() {
        let bytes = encode(&sample()).unwrap();
        assert_eq!(decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_decode_gzip() {
        let bytes = encode(&sample()).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        let gz = encoder.finish().unwrap();

        assert_eq!(decode(&gz).unwrap(), sample());
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode(&[0xde, 0xad, 0xbe, 0xef]).is_err());
        assert!(decode(&[]).is_err());
    }
}
