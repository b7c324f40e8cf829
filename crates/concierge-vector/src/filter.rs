//! Query filters
//!
//! Callers filter on application metadata ([`MetadataFilter`]); the backend
//! only understands constraints over scalar fields ([`Where`]). Tag
//! constraints are rewritten here because the encoded tag flags carry their
//! original position in the key, which a filter cannot know in advance.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::codec::{tag_key, tag_values};
use crate::types::{MetadataValue, ScalarValue, StorageMetadata, TAGS_KEY};

/// Default number of tag positions probed per filter candidate.
pub const DEFAULT_MAX_TAG_POSITIONS: usize = 32;

/// Backend filter expression over scalar metadata fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Where {
    Eq(String, ScalarValue),
    In(String, Vec<ScalarValue>),
    And(Vec<Where>),
    Or(Vec<Where>),
}

impl Where {
    pub fn eq(field: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    /// Chroma's `where` syntax.
    ///
    /// Logical operators with a single operand are collapsed, since the
    /// backend requires at least two.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Eq(field, value) => operator(field, "$eq", json!(value)),
            Self::In(field, values) => operator(field, "$in", json!(values)),
            Self::And(clauses) => logical("$and", clauses),
            Self::Or(clauses) => logical("$or", clauses),
        }
    }

    /// Evaluates the expression against stored metadata.
    ///
    /// A missing field never matches. An empty `And` matches everything and
    /// an empty `Or` matches nothing.
    pub fn matches(&self, metadata: &StorageMetadata) -> bool {
        match self {
            Self::Eq(field, expected) => metadata
                .get(field)
                .is_some_and(|actual| actual.loosely_equals(expected)),
            Self::In(field, candidates) => metadata
                .get(field)
                .is_some_and(|actual| candidates.iter().any(|c| actual.loosely_equals(c))),
            Self::And(clauses) => clauses.iter().all(|c| c.matches(metadata)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(metadata)),
        }
    }
}

fn operator(field: &str, op: &str, operand: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(op.to_string(), operand);
    let mut outer = Map::new();
    outer.insert(field.to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn logical(op: &str, clauses: &[Where]) -> Value {
    match clauses {
        [single] => single.to_json(),
        _ => {
            let mut outer = Map::new();
            outer.insert(
                op.to_string(),
                Value::Array(clauses.iter().map(Where::to_json).collect()),
            );
            Value::Object(outer)
        }
    }
}

/// Caller-facing filter: field name to required value.
///
/// - a scalar value requires equality;
/// - a list on an ordinary field requires membership;
/// - `tags` matches documents carrying any of the given tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter {
    fields: BTreeMap<String, MetadataValue>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal (or, for lists, be one of) `value`
    pub fn with(mut self, field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Match documents carrying this tag
    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        self.with(TAGS_KEY, MetadataValue::String(tag.into()))
    }

    /// Match documents carrying any of these tags
    pub fn with_any_tag<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags.into_iter().map(Into::into).collect();
        self.with(TAGS_KEY, MetadataValue::StringList(tags))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rewrites the filter into the backend dialect.
    ///
    /// Each tag candidate is probed at positions `0..max_tag_positions`;
    /// tags stored beyond that range cannot be matched. Returns `None` when
    /// nothing is constrained.
    pub fn to_where(&self, max_tag_positions: usize) -> Option<Where> {
        let mut clauses = Vec::with_capacity(self.fields.len());

        for (field, value) in &self.fields {
            let clause = if field == TAGS_KEY {
                tag_clause(&tag_values(value), max_tag_positions)
            } else {
                field_clause(field, value)
            };
            clauses.extend(clause);
        }

        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Where::And(clauses)),
        }
    }
}

impl From<BTreeMap<String, MetadataValue>> for MetadataFilter {
    fn from(fields: BTreeMap<String, MetadataValue>) -> Self {
        Self { fields }
    }
}

fn tag_clause(candidates: &[String], max_tag_positions: usize) -> Option<Where> {
    if candidates.is_empty() {
        return None;
    }
    let probes = candidates
        .iter()
        .flat_map(|tag| {
            (0..max_tag_positions).map(move |position| Where::eq(tag_key(position, tag), true))
        })
        .collect();
    Some(Where::Or(probes))
}

fn field_clause(field: &str, value: &MetadataValue) -> Option<Where> {
    match value {
        MetadataValue::StringList(options) => Some(Where::In(
            field.to_string(),
            options.iter().map(|o| ScalarValue::String(o.clone())).collect(),
        )),
        scalar => scalar
            .as_scalar()
            .map(|s| Where::Eq(field.to_string(), s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_for_storage;
    use crate::types::Metadata;

    fn stored(tags: Vec<&str>) -> StorageMetadata {
        let mut m = Metadata::new();
        m.insert("type".into(), "note".into());
        m.insert("tags".into(), tags.into());
        encode_for_storage(&m).unwrap()
    }

    #[test]
    fn empty_filter_has_no_constraint() {
        assert_eq!(MetadataFilter::new().to_where(8), None);
        assert_eq!(MetadataFilter::new().with_any_tag(Vec::<String>::new()).to_where(8), None);
    }

    #[test]
    fn scalar_tag_probes_every_position() {
        let w = MetadataFilter::new().with_tag("fastapi").to_where(4).unwrap();
        match &w {
            Where::Or(probes) => assert_eq!(probes.len(), 4),
            other => panic!("expected Or, got {other:?}"),
        }

        assert!(w.matches(&stored(vec!["python", "fastapi", "web"])));
        assert!(!w.matches(&stored(vec!["python", "programming"])));
    }

    #[test]
    fn tag_list_matches_any_candidate_in_any_order() {
        let w = MetadataFilter::new()
            .with_any_tag(["web", "database"])
            .to_where(DEFAULT_MAX_TAG_POSITIONS)
            .unwrap();

        assert!(w.matches(&stored(vec!["python", "fastapi", "web"])));
        assert!(w.matches(&stored(vec!["database", "ai"])));
        assert!(!w.matches(&stored(vec!["python", "programming"])));
    }

    #[test]
    fn tags_beyond_probe_range_are_not_matched() {
        let w = MetadataFilter::new().with_tag("late").to_where(2).unwrap();
        assert!(!w.matches(&stored(vec!["a", "b", "late"])));
    }

    #[test]
    fn other_fields_combine_with_and() {
        let w = MetadataFilter::new()
            .with("type", "note")
            .with_tag("ai")
            .to_where(4)
            .unwrap();
        assert!(matches!(&w, Where::And(clauses) if clauses.len() == 2));
        assert!(w.matches(&stored(vec!["database", "ai"])));

        let other_type = MetadataFilter::new()
            .with("type", "journal")
            .with_tag("ai")
            .to_where(4)
            .unwrap();
        assert!(!other_type.matches(&stored(vec!["database", "ai"])));
    }

    #[test]
    fn list_on_plain_field_is_membership() {
        let w = MetadataFilter::new()
            .with("type", vec!["journal", "note"])
            .to_where(4)
            .unwrap();
        assert_eq!(
            w,
            Where::In("type".into(), vec!["journal".into(), "note".into()])
        );
        assert!(w.matches(&stored(vec![])));
    }

    #[test]
    fn numbers_compare_across_int_and_float() {
        let mut m = StorageMetadata::new();
        m.insert("size_bytes".into(), ScalarValue::Int(10));
        assert!(Where::Eq("size_bytes".into(), ScalarValue::Float(10.0)).matches(&m));
        assert!(!Where::eq("missing", true).matches(&m));
    }

    #[test]
    fn json_uses_backend_operators() {
        let w = Where::Or(vec![Where::eq("tag_0_ai", true), Where::eq("tag_1_ai", true)]);
        assert_eq!(
            w.to_json(),
            json!({"$or": [
                {"tag_0_ai": {"$eq": true}},
                {"tag_1_ai": {"$eq": true}}
            ]})
        );

        let single = Where::And(vec![Where::eq("type", "note")]);
        assert_eq!(single.to_json(), json!({"type": {"$eq": "note"}}));

        let within = Where::In("type".into(), vec!["a".into(), "b".into()]);
        assert_eq!(within.to_json(), json!({"type": {"$in": ["a", "b"]}}));
    }

    #[test]
    fn filter_deserializes_from_plain_object() {
        let filter: MetadataFilter =
            serde_json::from_value(json!({"tags": ["python"], "type": "note"})).unwrap();
        assert_eq!(
            filter,
            MetadataFilter::new().with_any_tag(["python"]).with("type", "note")
        );
    }
}
