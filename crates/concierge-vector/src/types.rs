//! Core types for documents and their metadata

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata key holding a document's ordered tag list.
pub const TAGS_KEY: &str = "tags";

/// Application-level metadata value.
///
/// Serialised untagged, so a metadata map reads and writes as a plain JSON
/// object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    StringList(Vec<String>),
}

/// Storage-safe metadata value; the backend accepts nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Application metadata as callers see it.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Metadata in the backend's scalar-only shape.
pub type StorageMetadata = BTreeMap<String, ScalarValue>;

impl MetadataValue {
    /// The scalar form of this value, or `None` for lists.
    pub fn as_scalar(&self) -> Option<ScalarValue> {
        match self {
            Self::String(s) => Some(ScalarValue::String(s.clone())),
            Self::Int(i) => Some(ScalarValue::Int(*i)),
            Self::Float(f) => Some(ScalarValue::Float(*f)),
            Self::Bool(b) => Some(ScalarValue::Bool(*b)),
            Self::StringList(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl ScalarValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Equality with integer/float cross-comparison, the way the backend
    /// compares numbers in filters.
    pub fn loosely_equals(&self, other: &ScalarValue) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            _ => self == other,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<ScalarValue> for MetadataValue {
    fn from(value: ScalarValue) -> Self {
        match value {
            ScalarValue::String(s) => Self::String(s),
            ScalarValue::Int(i) => Self::Int(i),
            ScalarValue::Float(f) => Self::Float(f),
            ScalarValue::Bool(b) => Self::Bool(b),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringList(value)
    }
}

impl From<Vec<&str>> for MetadataValue {
    fn from(value: Vec<&str>) -> Self {
        Self::StringList(value.into_iter().map(str::to_string).collect())
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// The unit of storage and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-assigned stable id, unique within a collection
    pub id: String,
    /// Text body, embedded by the backend and returned verbatim
    pub content: String,
    /// Structured attributes; `tags` is an ordered string list
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with empty metadata
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Replace the whole metadata map
    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set one metadata field
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the ordered tag list
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags.into_iter().map(Into::into).collect();
        self.metadata
            .insert(TAGS_KEY.to_string(), MetadataValue::StringList(tags));
        self
    }

    /// Tags in stored order; empty when the document has none.
    pub fn tags(&self) -> &[String] {
        match self.metadata.get(TAGS_KEY) {
            Some(MetadataValue::StringList(tags)) => tags,
            _ => &[],
        }
    }
}

/// A similarity query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document: Document,
    /// Backend distance to the query; lower is closer
    pub distance: Option<f32>,
}

impl SearchHit {
    pub fn new(document: Document, distance: Option<f32>) -> Self {
        Self { document, distance }
    }
}
