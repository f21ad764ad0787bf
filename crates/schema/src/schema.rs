use crate::error::SchemaError;
use physim_document::{GenericNode, NodePath, Scalar};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

const SCENARIO_SCHEMA: &str = include_str!("../schemas/scenario.schema.json");

/// Primitive type names of the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl TypeName {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "null" => Self::Null,
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "string" => Self::String,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// `integer` also accepts floats with no fractional part.
    pub fn matches(&self, node: &GenericNode) -> bool {
        match (self, node) {
            (Self::Null, GenericNode::Scalar(Scalar::Null)) => true,
            (Self::Boolean, GenericNode::Scalar(Scalar::Bool(_))) => true,
            (Self::Integer, GenericNode::Scalar(Scalar::Integer(_))) => true,
            (Self::Integer, GenericNode::Scalar(Scalar::Float(f))) => f.is_finite() && f.fract() == 0.0,
            (Self::Number, GenericNode::Scalar(Scalar::Integer(_) | Scalar::Float(_))) => true,
            (Self::String, GenericNode::Scalar(Scalar::String(_))) => true,
            (Self::Array, GenericNode::Sequence(_)) => true,
            (Self::Object, GenericNode::Mapping(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy for mapping keys not listed under `properties`.
#[derive(Debug, Clone, Default)]
pub(crate) enum Additional {
    #[default]
    Allowed,
    Denied,
    Schema(Box<Schema>),
}

#[derive(Debug, Clone)]
pub(crate) struct Conditional {
    pub condition: Schema,
    pub then: Option<Schema>,
    pub otherwise: Option<Schema>,
}

/// One compiled schema node.
#[derive(Debug, Clone, Default)]
pub(crate) struct Schema {
    /// `false` schema: nothing validates.
    pub never: bool,
    pub reference: Option<String>,
    pub types: Option<Vec<TypeName>>,
    pub constant: Option<GenericNode>,
    pub enumeration: Option<Vec<GenericNode>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub items: Option<Box<Schema>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub required: Vec<String>,
    pub properties: Vec<(String, Schema)>,
    pub additional: Additional,
    pub all_of: Vec<Schema>,
    pub any_of: Vec<Schema>,
    pub conditional: Option<Box<Conditional>>,
}

impl Schema {
    pub fn property(&self, key: &str) -> Option<&Schema> {
        self.properties.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }
}

/// A compiled, read-only schema. Compile once per simulation type and share
/// it across validations.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub(crate) root: Schema,
    pub(crate) definitions: BTreeMap<String, Schema>,
}

impl SchemaDocument {
    /// Compile a schema from an already-parsed tree.
    pub fn from_node(node: &GenericNode) -> Result<Self, SchemaError> {
        let _span = tracing::debug_span!("compile_schema").entered();
        let mut compiler = Compiler::default();
        let root_path = NodePath::root();

        let mut definitions = BTreeMap::new();
        for keyword in ["definitions", "$defs"] {
            let Some(defs) = node.get(keyword) else {
                continue;
            };
            let path = root_path.key(keyword);
            let defs = defs
                .as_mapping()
                .ok_or_else(|| SchemaError::invalid(&path, "expected an object of schemas"))?;
            for (name, def) in defs.iter() {
                let schema = compiler.compile(def, &path.key(name))?;
                definitions.insert(name.to_string(), schema);
            }
        }
        let root = compiler.compile(node, &root_path)?;

        for (name, path) in &compiler.references {
            if !definitions.contains_key(name) {
                return Err(SchemaError::invalid(
                    path,
                    format!("unresolved reference to definition `{name}`"),
                ));
            }
        }
        tracing::debug!(definitions = definitions.len(), "schema compiled");
        Ok(Self { root, definitions })
    }

    /// Compile a schema from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let node = GenericNode::from_json_str(text)?;
        Self::from_node(&node)
    }

    /// The bundled schema for scenario documents.
    pub fn scenario() -> Result<Self, SchemaError> {
        Self::from_json_str(SCENARIO_SCHEMA)
    }

    pub(crate) fn definition(&self, name: &str) -> Option<&Schema> {
        self.definitions.get(name)
    }
}

#[derive(Default)]
struct Compiler {
    references: Vec<(String, NodePath)>,
}

fn number(node: &GenericNode, path: &NodePath) -> Result<f64, SchemaError> {
    node.as_f64()
        .ok_or_else(|| SchemaError::invalid(path, "expected a number"))
}

fn count(node: &GenericNode, path: &NodePath) -> Result<usize, SchemaError> {
    node.as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| SchemaError::invalid(path, "expected a non-negative integer"))
}

fn strings(node: &GenericNode, path: &NodePath) -> Result<Vec<String>, SchemaError> {
    let items = node
        .as_sequence()
        .ok_or_else(|| SchemaError::invalid(path, "expected an array of strings"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| SchemaError::invalid(&path.index(i), "expected a string"))
        })
        .collect()
}

impl Compiler {
    fn compile(&mut self, node: &GenericNode, path: &NodePath) -> Result<Schema, SchemaError> {
        if let Some(allow) = node.as_bool() {
            return Ok(Schema {
                never: !allow,
                ..Schema::default()
            });
        }
        let map = node
            .as_mapping()
            .ok_or_else(|| SchemaError::invalid(path, "a schema must be an object or a boolean"))?;

        let mut schema = Schema::default();
        for (keyword, value) in map.iter() {
            let at = path.key(keyword);
            match keyword {
                "$ref" => {
                    let target = value
                        .as_str()
                        .ok_or_else(|| SchemaError::invalid(&at, "expected a string"))?;
                    let name = target
                        .strip_prefix("#/definitions/")
                        .or_else(|| target.strip_prefix("#/$defs/"))
                        .ok_or_else(|| {
                            SchemaError::invalid(&at, format!("unsupported reference `{target}`"))
                        })?;
                    self.references.push((name.to_string(), at));
                    schema.reference = Some(name.to_string());
                }
                "type" => {
                    let names = match value.as_str() {
                        Some(name) => vec![name.to_string()],
                        None => strings(value, &at)?,
                    };
                    let types = names
                        .iter()
                        .map(|name| {
                            TypeName::parse(name).ok_or_else(|| {
                                SchemaError::invalid(&at, format!("unknown type `{name}`"))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    schema.types = Some(types);
                }
                "const" => schema.constant = Some(value.clone()),
                "enum" => {
                    let values = value
                        .as_sequence()
                        .ok_or_else(|| SchemaError::invalid(&at, "expected an array"))?;
                    schema.enumeration = Some(values.to_vec());
                }
                "minimum" => schema.minimum = Some(number(value, &at)?),
                "maximum" => schema.maximum = Some(number(value, &at)?),
                "exclusiveMinimum" => schema.exclusive_minimum = Some(number(value, &at)?),
                "exclusiveMaximum" => schema.exclusive_maximum = Some(number(value, &at)?),
                "minLength" => schema.min_length = Some(count(value, &at)?),
                "maxLength" => schema.max_length = Some(count(value, &at)?),
                "minItems" => schema.min_items = Some(count(value, &at)?),
                "maxItems" => schema.max_items = Some(count(value, &at)?),
                "pattern" => {
                    let source = value
                        .as_str()
                        .ok_or_else(|| SchemaError::invalid(&at, "expected a string"))?;
                    let regex = Regex::new(source)
                        .map_err(|e| SchemaError::invalid(&at, format!("bad pattern: {e}")))?;
                    schema.pattern = Some(regex);
                }
                "items" => schema.items = Some(Box::new(self.compile(value, &at)?)),
                "required" => schema.required = strings(value, &at)?,
                "properties" => {
                    let props = value
                        .as_mapping()
                        .ok_or_else(|| SchemaError::invalid(&at, "expected an object of schemas"))?;
                    for (name, prop) in props.iter() {
                        let compiled = self.compile(prop, &at.key(name))?;
                        schema.properties.push((name.to_string(), compiled));
                    }
                }
                "additionalProperties" => {
                    schema.additional = match value.as_bool() {
                        Some(true) => Additional::Allowed,
                        Some(false) => Additional::Denied,
                        None => Additional::Schema(Box::new(self.compile(value, &at)?)),
                    };
                }
                "allOf" | "anyOf" => {
                    let branches = value
                        .as_sequence()
                        .ok_or_else(|| SchemaError::invalid(&at, "expected an array of schemas"))?;
                    let compiled = branches
                        .iter()
                        .enumerate()
                        .map(|(i, branch)| self.compile(branch, &at.index(i)))
                        .collect::<Result<Vec<_>, _>>()?;
                    if keyword == "allOf" {
                        schema.all_of = compiled;
                    } else {
                        schema.any_of = compiled;
                    }
                }
                "if" => {
                    let condition = self.compile(value, &at)?;
                    let then = map
                        .get("then")
                        .map(|t| self.compile(t, &path.key("then")))
                        .transpose()?;
                    let otherwise = map
                        .get("else")
                        .map(|e| self.compile(e, &path.key("else")))
                        .transpose()?;
                    schema.conditional = Some(Box::new(Conditional {
                        condition,
                        then,
                        otherwise,
                    }));
                }
                // `then`/`else` are compiled with `if`; anything else is
                // annotation (`title`, `description`, `$schema`, ...).
                _ => {}
            }
        }
        Ok(schema)
    }
}
