//! Record-to-graph transformers
//!
//! A [`Transformer`] turns one mini-batch of raw collector records into
//! [`PropertyGroup`]s: a Cypher write statement plus the list of property maps
//! it is run with. Transformers are looked up by entity kind, the `type` field
//! of the file's `meta` object, through a [`TransformerRegistry`].
//!
//! Azure exports come back in a different shape than on-premises ones, split
//! into Azure, on-premises and relationship groups; see [`TransformResult`].

mod azure;
mod node;

pub use azure::AzureTransformer;
pub use node::NodeTransformer;

use crate::extract::Record;
use crate::sniff::Meta;
use houndload_common::{HoundError, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Named groups produced from one mini-batch
pub type GroupMap = BTreeMap<String, PropertyGroup>;

/// One class of graph write: a statement and the rows it is run with
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyGroup {
    /// Parameterized statement; rows are bound as `$props`
    pub statement: String,
    pub props: Vec<Value>,
}

impl PropertyGroup {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            props: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

/// Output of a transformer for one mini-batch
#[derive(Debug, Clone, PartialEq)]
pub enum TransformResult {
    Standard(GroupMap),
    /// Produced only for `azure` files
    Azure {
        azure: GroupMap,
        on_prem: GroupMap,
        relationships: GroupMap,
    },
}

impl TransformResult {
    /// Total rows across all groups
    pub fn row_count(&self) -> usize {
        let rows = |groups: &GroupMap| groups.values().map(|g| g.props.len()).sum::<usize>();
        match self {
            TransformResult::Standard(groups) => rows(groups),
            TransformResult::Azure {
                azure,
                on_prem,
                relationships,
            } => rows(azure) + rows(on_prem) + rows(relationships),
        }
    }
}

/// Converts raw records of one entity kind into property groups
pub trait Transformer: Send + Sync {
    /// Entity kind handled, matched against `meta.type`
    fn kind(&self) -> &str;

    fn transform(&self, batch: &[Record]) -> TransformResult;
}

/// Transformers by entity kind
#[derive(Default)]
pub struct TransformerRegistry {
    transformers: HashMap<String, Box<dyn Transformer>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in on-premises and Azure transformers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for transformer in NodeTransformer::defaults() {
            registry.register(transformer);
        }
        registry.register(AzureTransformer::new());
        registry
    }

    /// Add a transformer, replacing any previous one for the same kind
    pub fn register(&mut self, transformer: impl Transformer + 'static) {
        self.transformers
            .insert(transformer.kind().to_string(), Box::new(transformer));
    }

    pub fn get(&self, kind: &str) -> Option<&dyn Transformer> {
        self.transformers.get(kind).map(|t| t.as_ref())
    }

    /// Transformer for a sniffed file, or `UnknownEntityKind`
    pub fn resolve(&self, meta: &Meta) -> Result<&dyn Transformer> {
        meta.kind
            .as_deref()
            .and_then(|kind| self.get(kind))
            .ok_or_else(|| HoundError::UnknownEntityKind(meta.kind_or_unknown().to_string()))
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.transformers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// Group for `key`, created with `statement` on first use
fn group_for<'a>(
    groups: &'a mut GroupMap,
    key: String,
    statement: impl FnOnce() -> String,
) -> &'a mut PropertyGroup {
    groups
        .entry(key)
        .or_insert_with(|| PropertyGroup::new(statement()))
}

/// Keep only values a graph node property can hold: scalars and lists of
/// scalars. Nulls and nested objects are dropped.
fn graph_properties(source: Option<&Value>) -> Value {
    let mut map = Map::new();
    if let Some(Value::Object(fields)) = source {
        for (key, value) in fields {
            let storable = match value {
                Value::Null | Value::Object(_) => false,
                Value::Array(items) => items.iter().all(|item| {
                    matches!(item, Value::Bool(_) | Value::Number(_) | Value::String(_))
                }),
                _ => true,
            };
            if storable {
                map.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(map)
}

/// Labels and relationship types are spliced into Cypher text, so anything
/// coming from collector data must be a plain identifier
fn is_identifier(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
