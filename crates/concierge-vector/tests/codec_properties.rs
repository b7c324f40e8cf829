//! Property tests for the tag encoding and filter rewrite

use concierge_vector::codec::{decode_from_storage, encode_for_storage, parse_tag_key, tag_key};
use concierge_vector::{Metadata, MetadataFilter, MetadataValue, ScalarValue};
use proptest::prelude::*;

fn tag() -> impl Strategy<Value = String> {
    "[a-z0-9_/-]{1,12}"
}

fn plain_value() -> impl Strategy<Value = MetadataValue> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,16}".prop_map(MetadataValue::String),
        any::<i64>().prop_map(MetadataValue::Int),
        (-1.0e6..1.0e6f64).prop_map(MetadataValue::Float),
        any::<bool>().prop_map(MetadataValue::Bool),
    ]
}

/// Metadata with non-tag keys that cannot collide with the tag-key shape.
fn metadata_with_tags() -> impl Strategy<Value = (Metadata, Vec<String>)> {
    (
        prop::collection::btree_map("[a-s][a-z]{0,8}", plain_value(), 0..6),
        prop::collection::vec(tag(), 1..20),
    )
        .prop_map(|(fields, tags)| {
            let mut metadata: Metadata = fields;
            metadata.insert("tags".to_string(), MetadataValue::StringList(tags.clone()));
            (metadata, tags)
        })
}

proptest! {
    #[test]
    fn encoded_metadata_round_trips((metadata, _) in metadata_with_tags()) {
        let decoded = decode_from_storage(&encode_for_storage(&metadata).unwrap());
        prop_assert_eq!(decoded, metadata);
    }

    #[test]
    fn one_flag_per_tag_position((metadata, tags) in metadata_with_tags()) {
        let encoded = encode_for_storage(&metadata).unwrap();
        let flags: Vec<_> = encoded
            .iter()
            .filter_map(|(k, v)| parse_tag_key(k).map(|(i, _)| (i, v.clone())))
            .collect();

        prop_assert_eq!(flags.len(), tags.len());
        prop_assert!(flags.iter().all(|(_, v)| *v == ScalarValue::Bool(true)));
        prop_assert!(!encoded.contains_key("tags"));
    }

    #[test]
    fn tag_keys_parse_back(index in 0usize..1000, value in tag()) {
        let key = tag_key(index, &value);
        prop_assert_eq!(parse_tag_key(&key), Some((index, value.as_str())));
    }

    #[test]
    fn every_stored_tag_is_filterable((metadata, tags) in metadata_with_tags()) {
        let stored = encode_for_storage(&metadata).unwrap();
        for tag in &tags {
            let filter = MetadataFilter::new().with_tag(tag.clone()).to_where(32).unwrap();
            prop_assert!(filter.matches(&stored));
        }
    }
}
