use crate::path::{NodePath, PathSegment};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// Type name in JSON-Schema vocabulary.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "number",
            Self::String(_) => "string",
        }
    }
}

/// String-keyed mapping that remembers insertion order.
///
/// Order is only used for diagnostics and emission: two mappings with the
/// same entries in a different order compare equal.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    entries: Vec<(String, GenericNode)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced entry keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: GenericNode) -> Option<GenericNode> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&GenericNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GenericNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl FromIterator<(String, GenericNode)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, GenericNode)>>(iter: I) -> Self {
        let mut mapping = Mapping::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

/// Untyped document tree: exactly a scalar, a sequence, or a mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum GenericNode {
    Scalar(Scalar),
    Sequence(Vec<GenericNode>),
    Mapping(Mapping),
}

impl GenericNode {
    pub fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::String(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Self::Scalar(Scalar::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Self::Scalar(Scalar::Float(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }

    /// Parse JSON text into a tree. Schema files are JSON.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Ok(Self::from(value))
    }

    /// Type name in JSON-Schema vocabulary.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar(s) => s.type_name(),
            Self::Sequence(_) => "array",
            Self::Mapping(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Scalar(Scalar::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an integer or float scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Scalar(Scalar::Integer(i)) => Some(*i as f64),
            Self::Scalar(Scalar::Float(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[GenericNode]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Child under `key` when this node is a mapping.
    pub fn get(&self, key: &str) -> Option<&GenericNode> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Descend along `path`.
    pub fn at(&self, path: &NodePath) -> Option<&GenericNode> {
        let mut node = self;
        for segment in path.segments() {
            node = match segment {
                PathSegment::Key(key) => node.get(key)?,
                PathSegment::Index(index) => node.as_sequence()?.get(*index)?,
            };
        }
        Some(node)
    }
}

impl From<serde_json::Value> for GenericNode {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::null(),
            Value::Bool(b) => Self::boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::integer(i),
                None => Self::float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::string(s),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Mapping(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl Serialize for GenericNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(Scalar::Null) => serializer.serialize_unit(),
            Self::Scalar(Scalar::Bool(b)) => serializer.serialize_bool(*b),
            Self::Scalar(Scalar::Integer(i)) => serializer.serialize_i64(*i),
            Self::Scalar(Scalar::Float(f)) => serializer.serialize_f64(*f),
            Self::Scalar(Scalar::String(s)) => serializer.serialize_str(s),
            Self::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Mapping(mapping) => {
                let mut map = serializer.serialize_map(Some(mapping.len()))?;
                for (k, v) in mapping.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}
