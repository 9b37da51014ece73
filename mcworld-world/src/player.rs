use fastnbt::Value;

/// A player's save record (`players/<name>.dat`). Read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    name: String,
    document: Value,
}

impl Player {
    pub(crate) fn new(name: String, document: Value) -> Self {
        Self { name, document }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The whole decoded record.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Top-level tag of the record.
    pub fn tag(&self, key: &str) -> Option<&Value> {
        match &self.document {
            Value::Compound(tags) => tags.get(key),
            _ => None,
        }
    }

    /// `Pos` as `[x, y, z]`.
    pub fn position(&self) -> Option<[f64; 3]> {
        let Some(Value::List(pos)) = self.tag("Pos") else {
            return None;
        };
        match pos.as_slice() {
            [Value::Double(x), Value::Double(y), Value::Double(z)] => Some([*x, *y, *z]),
            _ => None,
        }
    }

    /// `Dimension` (0 overworld, -1 nether, 1 end).
    pub fn dimension(&self) -> Option<i32> {
        match self.tag("Dimension")? {
            Value::Int(d) => Some(*d),
            _ => None,
        }
    }
}
