//! Chunk documents (legacy Anvil layout).
//!
//! A chunk is stored as one NBT compound:
//!
//! ```text
//! Level
//! ├── xPos, zPos      chunk coordinates (absolute, not relative to region)
//! └── Sections[]      up to 16 entries, sparse
//!     ├── Y           vertical slot 0..15
//!     ├── Blocks      4096 bytes, low 8 bits of the block id
//!     ├── Add         2048 bytes (nibbles), high 4 bits of the block id
//!     ├── Data        2048 bytes (nibbles)
//!     ├── SkyLight    2048 bytes (nibbles)
//!     └── BlockLight  2048 bytes (nibbles)
//! ```
//!
//! The section list is lifted into typed [`Section`] values; every other tag
//! is kept as-is so that re-encoding does not lose entities, heightmaps, etc.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, bail};
use fastnbt::{ByteArray, Value};

use crate::nbt;

/// Blocks in one 16x16x16 section.
pub const SECTION_VOLUME: usize = 4096;
/// Bytes in a nibble array (two blocks per byte).
pub const NIBBLE_BYTES: usize = SECTION_VOLUME / 2;

type Compound = HashMap<String, Value>;

/// Where the section list and position fields live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// `Level.Sections`, `Level.xPos` (pre-1.18 saves)
    Level,
    /// `sections`, `xPos` at the root
    Flat,
}

impl Layout {
    fn sections_key(self) -> &'static str {
        match self {
            Layout::Level => "Sections",
            Layout::Flat => "sections",
        }
    }
}

/// One 16x16x16 sub-volume. Any array may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section {
    pub y: i8,
    pub blocks: Option<Vec<u8>>,
    pub add: Option<Vec<u8>>,
    pub data: Option<Vec<u8>>,
    pub sky_light: Option<Vec<u8>>,
    pub block_light: Option<Vec<u8>>,
    // Tags we do not interpret, written back untouched.
    other: Compound,
}

impl Section {
    /// All-air section with every array allocated (no `Add`).
    pub fn empty(y: i8) -> Self {
        Self {
            y,
            blocks: Some(vec![0; SECTION_VOLUME]),
            add: None,
            data: Some(vec![0; NIBBLE_BYTES]),
            sky_light: Some(vec![0; NIBBLE_BYTES]),
            block_light: Some(vec![0; NIBBLE_BYTES]),
            other: Compound::new(),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        let Value::Compound(mut tags) = value else {
            bail!("Section is not a compound");
        };

        let y = match tags.remove("Y") {
            Some(Value::Byte(y)) => y,
            Some(Value::Int(y)) => i8::try_from(y).map_err(|_| anyhow!("Section Y {} out of range", y))?,
            Some(_) => bail!("Section Y has the wrong tag type"),
            None => bail!("Section without Y"),
        };

        Ok(Self {
            y,
            blocks: take_bytes(&mut tags, "Blocks")?,
            add: take_bytes(&mut tags, "Add")?,
            data: take_bytes(&mut tags, "Data")?,
            sky_light: take_bytes(&mut tags, "SkyLight")?,
            block_light: take_bytes(&mut tags, "BlockLight")?,
            other: tags,
        })
    }

    fn to_value(&self) -> Value {
        let mut tags = self.other.clone();
        tags.insert("Y".to_string(), Value::Byte(self.y));
        let arrays = [
            ("Blocks", &self.blocks),
            ("Add", &self.add),
            ("Data", &self.data),
            ("SkyLight", &self.sky_light),
            ("BlockLight", &self.block_light),
        ];
        for (key, array) in arrays {
            if let Some(bytes) = array {
                let signed = bytes.iter().map(|&b| b as i8).collect();
                tags.insert(key.to_string(), Value::ByteArray(ByteArray::new(signed)));
            }
        }
        Value::Compound(tags)
    }
}

fn take_bytes(tags: &mut Compound, key: &str) -> Result<Option<Vec<u8>>> {
    match tags.remove(key) {
        None => Ok(None),
        Some(Value::ByteArray(array)) => Ok(Some(array.iter().map(|&b| b as u8).collect())),
        Some(_) => bail!("Section {} is not a byte array", key),
    }
}

/// A decoded chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDocument {
    // Root compound with the section list removed.
    root: Compound,
    layout: Layout,
    sections: Vec<Section>,
}

impl ChunkDocument {
    /// New chunk at absolute chunk coordinates, without sections.
    pub fn new(x_pos: i32, z_pos: i32) -> Self {
        let mut level = Compound::new();
        level.insert("xPos".to_string(), Value::Int(x_pos));
        level.insert("zPos".to_string(), Value::Int(z_pos));
        let mut root = Compound::new();
        root.insert("Level".to_string(), Value::Compound(level));
        Self {
            root,
            layout: Layout::Level,
            sections: Vec::new(),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_value(nbt::decode(bytes)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Compound(mut root) = value else {
            bail!("Chunk root is not a compound");
        };

        let layout = match root.get("Level") {
            Some(Value::Compound(_)) => Layout::Level,
            Some(_) => bail!("Chunk Level is not a compound"),
            None => Layout::Flat,
        };

        let container = match layout {
            Layout::Level => match root.get_mut("Level") {
                Some(Value::Compound(level)) => level,
                _ => bail!("Chunk Level is not a compound"),
            },
            Layout::Flat => &mut root,
        };

        let sections = match container.remove(layout.sections_key()) {
            None => Vec::new(),
            Some(Value::List(list)) => list
                .into_iter()
                .map(Section::from_value)
                .collect::<Result<Vec<_>>>()
                .context("Malformed chunk section")?,
            Some(_) => bail!("Chunk {} is not a list", layout.sections_key()),
        };

        Ok(Self { root, layout, sections })
    }

    /// Rebuild the full NBT tree, sections included.
    pub fn to_value(&self) -> Value {
        let mut root = self.root.clone();
        let list = Value::List(self.sections.iter().map(Section::to_value).collect());
        match self.layout {
            Layout::Level => {
                if let Some(Value::Compound(level)) = root.get_mut("Level") {
                    level.insert(self.layout.sections_key().to_string(), list);
                }
            }
            Layout::Flat => {
                root.insert(self.layout.sections_key().to_string(), list);
            }
        }
        Value::Compound(root)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        nbt::encode(&self.to_value())
    }

    fn level(&self) -> &Compound {
        match (self.layout, self.root.get("Level")) {
            (Layout::Level, Some(Value::Compound(level))) => level,
            _ => &self.root,
        }
    }

    /// Stored chunk X (absolute).
    pub fn x_pos(&self) -> Option<i32> {
        int_tag(self.level(), "xPos")
    }

    /// Stored chunk Z (absolute).
    pub fn z_pos(&self) -> Option<i32> {
        int_tag(self.level(), "zPos")
    }

    /// Any tag next to the position fields (e.g. `LastUpdate`).
    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.level().get(key)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Section at vertical slot `y`, matched on its `Y` tag.
    pub fn section(&self, y: i32) -> Option<&Section> {
        self.sections.iter().find(|s| i32::from(s.y) == y)
    }

    pub fn section_mut(&mut self, y: i32) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| i32::from(s.y) == y)
    }

    /// Insert or replace the section with the same `Y`, keeping slot order.
    pub fn insert_section(&mut self, section: Section) {
        match self.sections.binary_search_by_key(&section.y, |s| s.y) {
            Ok(i) => self.sections[i] = section,
            Err(i) => self.sections.insert(i, section),
        }
    }
}

fn int_tag(tags: &Compound, key: &str) -> Option<i32> {
    match tags.get(key)? {
        Value::Int(v) => Some(*v),
        Value::Short(v) => Some(i32::from(*v)),
        Value::Byte(v) => Some(i32::from(*v)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_positions() {
        let doc = ChunkDocument::new(-7, 12);
        assert_eq!(doc.x_pos(), Some(-7));
        assert_eq!(doc.z_pos(), Some(12));
        assert!(doc.sections().is_empty());
    }

    #[test]
    fn test_encode_decode_keeps_arrays_and_unknown_tags() {
        let mut doc = ChunkDocument::new(3, 5);
        let mut section = Section::empty(2);
        section.blocks.as_mut().unwrap()[0] = 7;
        section.blocks.as_mut().unwrap()[4095] = 200;
        section.sky_light.as_mut().unwrap()[0] = 0x59;
        section.other.insert("Palette".to_string(), Value::Int(1));
        doc.insert_section(section);

        let decoded = ChunkDocument::decode(&doc.encode().unwrap()).unwrap();
        assert_eq!(decoded, doc);

        let section = decoded.section(2).unwrap();
        assert_eq!(section.blocks.as_ref().unwrap()[4095], 200);
        assert_eq!(section.sky_light.as_ref().unwrap()[0], 0x59);
        assert_eq!(section.add, None);
    }

    #[test]
    fn test_sections_are_matched_on_y() {
        let mut doc = ChunkDocument::new(0, 0);
        doc.insert_section(Section::empty(4));
        doc.insert_section(Section::empty(1));

        assert!(doc.section(0).is_none());
        assert_eq!(doc.section(1).map(|s| s.y), Some(1));
        assert_eq!(doc.section(4).map(|s| s.y), Some(4));
        assert_eq!(doc.sections().iter().map(|s| s.y).collect::<Vec<_>>(), vec![1, 4]);

        let mut replacement = Section::empty(4);
        replacement.blocks = None;
        doc.insert_section(replacement);
        assert_eq!(doc.sections().len(), 2);
        assert!(doc.section(4).unwrap().blocks.is_none());
    }

    #[test]
    fn test_flat_layout() {
        let mut section = Compound::new();
        section.insert("Y".to_string(), Value::Byte(0));
        section.insert("Blocks".to_string(), Value::ByteArray(ByteArray::new(vec![1; SECTION_VOLUME])));
        let mut root = Compound::new();
        root.insert("xPos".to_string(), Value::Int(9));
        root.insert("zPos".to_string(), Value::Int(-9));
        root.insert("sections".to_string(), Value::List(vec![Value::Compound(section)]));

        let doc = ChunkDocument::from_value(Value::Compound(root.clone())).unwrap();
        assert_eq!(doc.x_pos(), Some(9));
        assert_eq!(doc.z_pos(), Some(-9));
        assert_eq!(doc.section(0).unwrap().blocks.as_ref().unwrap()[17], 1);
        assert_eq!(doc.to_value(), Value::Compound(root));
    }

    #[test]
    fn test_rejects_malformed_sections() {
        let mut level = Compound::new();
        level.insert("Sections".to_string(), Value::Int(3));
        let mut root = Compound::new();
        root.insert("Level".to_string(), Value::Compound(level));
        assert!(ChunkDocument::from_value(Value::Compound(root)).is_err());

        let mut section = Compound::new();
        section.insert("Y".to_string(), Value::Byte(0));
        section.insert("Blocks".to_string(), Value::Int(0));
        let mut level = Compound::new();
        level.insert("Sections".to_string(), Value::List(vec![Value::Compound(section)]));
        let mut root = Compound::new();
        root.insert("Level".to_string(), Value::Compound(level));
        assert!(ChunkDocument::from_value(Value::Compound(root)).is_err());
    }
}
