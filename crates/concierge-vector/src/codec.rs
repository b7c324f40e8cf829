//! Metadata codec
//!
//! The backend stores only scalar metadata values, so the ordered `tags`
//! list is flattened into one boolean field per tag, named from the tag's
//! position and value: `["python", "web"]` is stored as
//! `tag_0_python = true, tag_1_web = true`. The position keeps the original
//! order recoverable, and each tag stays individually filterable at the
//! backend's native filter layer.
//!
//! This layout is an internal storage format; callers only ever see the
//! decoded `tags` list.

use crate::error::{VectorError, VectorResult};
use crate::types::{Metadata, MetadataValue, ScalarValue, StorageMetadata, TAGS_KEY};
use tracing::warn;

const TAG_PREFIX: &str = "tag_";

/// Storage key for `tag` at position `index`.
pub fn tag_key(index: usize, tag: &str) -> String {
    format!("{TAG_PREFIX}{index}_{tag}")
}

/// Splits a storage key into `(index, tag)` if it has the tag-key shape.
///
/// The tag is everything after the second underscore, so tags containing
/// underscores or digits survive intact.
pub fn parse_tag_key(key: &str) -> Option<(usize, &str)> {
    let rest = key.strip_prefix(TAG_PREFIX)?;
    let (index, tag) = rest.split_once('_')?;
    let index = index.parse().ok()?;
    Some((index, tag))
}

/// Converts application metadata to the scalar-only storage shape.
///
/// The caller's map is left untouched. Fails when a field other than `tags`
/// holds a list, or when a float is NaN or infinite; neither survives storage.
pub fn encode_for_storage(metadata: &Metadata) -> VectorResult<StorageMetadata> {
    let mut encoded = StorageMetadata::new();

    for (key, value) in metadata {
        if key == TAGS_KEY {
            continue;
        }
        let scalar = value
            .as_scalar()
            .filter(|s| !matches!(s, ScalarValue::Float(f) if !f.is_finite()))
            .ok_or_else(|| VectorError::InvalidMetadata { key: key.clone() })?;
        encoded.insert(key.clone(), scalar);
    }

    if let Some(tags) = metadata.get(TAGS_KEY) {
        for (index, tag) in tag_values(tags).iter().enumerate() {
            let key = tag_key(index, tag);
            if let Some(previous) = encoded.insert(key.clone(), ScalarValue::Bool(true)) {
                warn!(%key, ?previous, "Metadata field replaced by tag flag");
            }
        }
    }

    Ok(encoded)
}

/// Rebuilds application metadata from its storage shape. Never fails.
///
/// Only `true` tag flags contribute to the rebuilt list; `false` flags are
/// consumed and dropped. Keys that merely look like tag keys (no numeric
/// index, or a non-boolean value) pass through as ordinary fields. A `tags`
/// key is produced only if at least one tag flag was found.
pub fn decode_from_storage(storage: &StorageMetadata) -> Metadata {
    let mut decoded = Metadata::new();
    let mut tags: Vec<(usize, &str, bool)> = Vec::new();

    for (key, value) in storage {
        match (parse_tag_key(key), value.as_bool()) {
            (Some((index, tag)), Some(flag)) => tags.push((index, tag, flag)),
            _ => {
                decoded.insert(key.clone(), MetadataValue::from(value.clone()));
            }
        }
    }

    if !tags.is_empty() {
        // Keys arrive in string order ("tag_10_x" before "tag_2_y"), so
        // order by the embedded index instead.
        tags.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        let list = tags
            .into_iter()
            .filter(|(_, _, flag)| *flag)
            .map(|(_, tag, _)| tag.to_string())
            .collect();
        decoded.insert(TAGS_KEY.to_string(), MetadataValue::StringList(list));
    }

    decoded
}

/// Tag values of a `tags` field; a lone scalar counts as a one-element list.
pub(crate) fn tag_values(value: &MetadataValue) -> Vec<String> {
    match value {
        MetadataValue::StringList(tags) => tags.clone(),
        scalar => scalar
            .as_scalar()
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: Vec<(&str, MetadataValue)>) -> Metadata {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn tags_become_positional_flags() {
        let m = metadata(vec![
            ("type", "note".into()),
            ("tags", vec!["python", "programming"].into()),
        ]);

        let encoded = encode_for_storage(&m).unwrap();

        assert_eq!(encoded.len(), 3);
        assert_eq!(encoded.get("type"), Some(&ScalarValue::from("note")));
        assert_eq!(encoded.get("tag_0_python"), Some(&ScalarValue::Bool(true)));
        assert_eq!(encoded.get("tag_1_programming"), Some(&ScalarValue::Bool(true)));
        assert!(!encoded.contains_key("tags"));
    }

    #[test]
    fn encoding_leaves_input_untouched() {
        let m = metadata(vec![("tags", vec!["a"].into())]);
        let before = m.clone();
        let _ = encode_for_storage(&m).unwrap();
        assert_eq!(m, before);
    }

    #[test]
    fn scalar_tag_is_a_single_element_list() {
        let m = metadata(vec![("tags", "fastapi".into())]);
        let encoded = encode_for_storage(&m).unwrap();
        assert_eq!(encoded.len(), 1);
        assert_eq!(encoded.get("tag_0_fastapi"), Some(&ScalarValue::Bool(true)));

        let numeric = metadata(vec![("tags", MetadataValue::Int(2024))]);
        let encoded = encode_for_storage(&numeric).unwrap();
        assert!(encoded.contains_key("tag_0_2024"));
    }

    #[test]
    fn empty_tag_list_is_dropped() {
        let m = metadata(vec![("type", "note".into()), ("tags", MetadataValue::StringList(vec![]))]);
        let encoded = encode_for_storage(&m).unwrap();
        assert_eq!(encoded.len(), 1);

        let decoded = decode_from_storage(&encoded);
        assert!(!decoded.contains_key("tags"));
    }

    #[test]
    fn list_outside_tags_is_rejected() {
        let m = metadata(vec![("aliases", vec!["x", "y"].into())]);
        let err = encode_for_storage(&m).unwrap_err();
        assert!(matches!(err, VectorError::InvalidMetadata { key } if key == "aliases"));
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let m = metadata(vec![("score", MetadataValue::Float(value))]);
            let err = encode_for_storage(&m).unwrap_err();
            assert!(matches!(err, VectorError::InvalidMetadata { key } if key == "score"));
        }

        let m = metadata(vec![("score", MetadataValue::Float(0.5))]);
        assert!(encode_for_storage(&m).is_ok());
    }

    #[test]
    fn tag_flag_wins_over_colliding_field() {
        let m = metadata(vec![
            ("tag_0_python", MetadataValue::String("caller".into())),
            ("tags", vec!["python"].into()),
        ]);

        let encoded = encode_for_storage(&m).unwrap();
        assert_eq!(encoded.get("tag_0_python"), Some(&ScalarValue::Bool(true)));
        assert_eq!(encoded.len(), 1);
    }

    #[test]
    fn round_trip_preserves_order_and_keys() {
        let tags: Vec<String> = (0..12).map(|i| format!("t{}", 11 - i)).collect();
        let m = metadata(vec![
            ("path", "notes/a.md".into()),
            ("size_bytes", MetadataValue::Int(120)),
            ("tags", MetadataValue::StringList(tags)),
        ]);

        let decoded = decode_from_storage(&encode_for_storage(&m).unwrap());
        assert_eq!(decoded, m);
    }

    #[test]
    fn tags_with_underscores_and_digits_survive() {
        let m = metadata(vec![("tags", vec!["snake_case", "2_fast", "v1_2_3"].into())]);
        let decoded = decode_from_storage(&encode_for_storage(&m).unwrap());
        assert_eq!(decoded, m);
    }

    #[test]
    fn metadata_without_tags_is_identity_both_ways() {
        let m = metadata(vec![
            ("type", "note".into()),
            ("rating", MetadataValue::Float(4.5)),
            ("draft", MetadataValue::Bool(false)),
        ]);
        let encoded = encode_for_storage(&m).unwrap();
        assert_eq!(decode_from_storage(&encoded), m);

        let storage: StorageMetadata = encoded.clone();
        let decoded = decode_from_storage(&storage);
        assert_eq!(decoded.len(), storage.len());
    }

    #[test]
    fn encoded_values_are_scalar() {
        let m = metadata(vec![("tags", vec!["a", "b", "c"].into()), ("n", MetadataValue::Int(1))]);
        let encoded = encode_for_storage(&m).unwrap();
        let json = serde_json::to_value(&encoded).unwrap();
        for value in json.as_object().unwrap().values() {
            assert!(!value.is_array() && !value.is_object());
        }
    }

    #[test]
    fn false_flags_are_dropped() {
        let mut storage = StorageMetadata::new();
        storage.insert("tag_0_keep".into(), ScalarValue::Bool(true));
        storage.insert("tag_1_gone".into(), ScalarValue::Bool(false));
        storage.insert("tag_2_also".into(), ScalarValue::Bool(true));

        let decoded = decode_from_storage(&storage);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.get("tags"), Some(&vec!["keep", "also"].into()));
    }

    #[test]
    fn malformed_tag_keys_pass_through() {
        let mut storage = StorageMetadata::new();
        storage.insert("tag_x_foo".into(), ScalarValue::Bool(true));
        storage.insert("tag_7".into(), ScalarValue::Bool(true));
        storage.insert("tag_0_label".into(), ScalarValue::from("not a flag"));
        storage.insert("tagline".into(), ScalarValue::from("hello"));

        let decoded = decode_from_storage(&storage);
        assert_eq!(decoded.len(), 4);
        assert!(!decoded.contains_key("tags"));
        assert_eq!(decoded.get("tag_x_foo"), Some(&MetadataValue::Bool(true)));
        assert_eq!(decoded.get("tag_0_label"), Some(&"not a flag".into()));
    }

    #[test]
    fn index_order_beats_key_order() {
        let mut storage = StorageMetadata::new();
        storage.insert(tag_key(10, "ten"), ScalarValue::Bool(true));
        storage.insert(tag_key(2, "two"), ScalarValue::Bool(true));
        storage.insert(tag_key(0, "zero"), ScalarValue::Bool(true));

        let decoded = decode_from_storage(&storage);
        assert_eq!(decoded.get("tags"), Some(&vec!["zero", "two", "ten"].into()));
    }

    #[test]
    fn parse_tag_key_shapes() {
        assert_eq!(parse_tag_key("tag_3_a_b"), Some((3, "a_b")));
        assert_eq!(parse_tag_key("tag_0_"), Some((0, "")));
        assert_eq!(parse_tag_key("tag_a_b"), None);
        assert_eq!(parse_tag_key("tags"), None);
        assert_eq!(parse_tag_key("tag_12"), None);
    }
}
