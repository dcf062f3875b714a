//! Key codec for the sample store namespace.
//!
//! Every key lives under `samsto:`. Object keys carry the object-type tag
//! followed by the lowercased natural name, so two object types can never
//! produce the same key. The layout is shared with external inspection
//! tooling and must not change:
//!
//! ```text
//! samsto:subject:<lower absolutePath>   subject hash
//! samsto:aspect:<lower name>            aspect hash
//! samsto:sample:<lower path|aspect>     sample hash
//! samsto:sample:index                   set of sample keys
//! samsto:aspsubmap:<lower aspect>       set of lowercased subject paths
//! samsto:subjects                       set of subject keys
//! samsto:aspects                        set of aspect keys
//! ```

use samsto_core::{ObjectType, SampleName, SAMPLE_NAME_SEPARATOR};

/// Namespace shared by every sample store key.
pub const NAMESPACE: &str = "samsto";

pub const SAMPLE_INDEX_KEY: &str = "samsto:sample:index";
pub const SUBJECT_INDEX_KEY: &str = "samsto:subjects";
pub const ASPECT_INDEX_KEY: &str = "samsto:aspects";

const ASPSUBMAP_TAG: &str = "aspsubmap";

/// Map an object type and natural name to its cache key.
pub fn to_key(object_type: ObjectType, name: &str) -> String {
    format!("{}:{}:{}", NAMESPACE, object_type.tag(), name.to_lowercase())
}

/// Key of the sample hash for a subject path and aspect name.
pub fn sample_key(subject_path: &str, aspect_name: &str) -> String {
    to_key(
        ObjectType::Sample,
        &SampleName::compose(subject_path, aspect_name),
    )
}

/// Key of the set of subjects holding a sample for `aspect_name`.
pub fn aspsubmap_key(aspect_name: &str) -> String {
    format!("{}:{}:{}", NAMESPACE, ASPSUBMAP_TAG, aspect_name.to_lowercase())
}

pub fn sample_index_key() -> &'static str {
    SAMPLE_INDEX_KEY
}

pub fn subject_index_key() -> &'static str {
    SUBJECT_INDEX_KEY
}

pub fn aspect_index_key() -> &'static str {
    ASPECT_INDEX_KEY
}

/// Index set enumerating every key of one object type.
pub fn index_key(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Subject => SUBJECT_INDEX_KEY,
        ObjectType::Aspect => ASPECT_INDEX_KEY,
        ObjectType::Sample => SAMPLE_INDEX_KEY,
    }
}

/// Prefix shared by every key in the namespace.
pub fn namespace_prefix() -> String {
    format!("{}:", NAMESPACE)
}

/// Prefix shared by the sample keys of one subject.
pub fn sample_key_prefix_for_subject(subject_path: &str) -> String {
    format!(
        "{}{}",
        to_key(ObjectType::Sample, subject_path),
        SAMPLE_NAME_SEPARATOR
    )
}

/// Decode an object key back into its type and lowercased name.
///
/// Index and `aspsubmap` keys are not object keys and decode to `None`.
pub fn parse_key(key: &str) -> Option<(ObjectType, String)> {
    let rest = key.strip_prefix(NAMESPACE)?.strip_prefix(':')?;
    let (tag, name) = rest.split_once(':')?;
    let object_type: ObjectType = tag.parse().ok()?;
    if name.is_empty() {
        return None;
    }
    if object_type == ObjectType::Sample && !name.contains(SAMPLE_NAME_SEPARATOR) {
        return None;
    }
    Some((object_type, name.to_string()))
}

/// Split a sample key into its lowercased subject path and aspect name.
pub fn split_sample_key(key: &str) -> Option<(String, String)> {
    match parse_key(key)? {
        (ObjectType::Sample, name) => {
            let parsed = SampleName::parse(&name).ok()?;
            Some((
                parsed.subject_path().to_string(),
                parsed.aspect_name().to_string(),
            ))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_bit_exact() {
        assert_eq!(to_key(ObjectType::Subject, "NA.US"), "samsto:subject:na.us");
        assert_eq!(to_key(ObjectType::Aspect, "Temp"), "samsto:aspect:temp");
        assert_eq!(sample_key("NA.US", "Temp"), "samsto:sample:na.us|temp");
        assert_eq!(aspsubmap_key("Temp"), "samsto:aspsubmap:temp");
        assert_eq!(SAMPLE_INDEX_KEY, "samsto:sample:index");
    }

    #[test]
    fn test_casing_collapses_to_one_key() {
        assert_eq!(sample_key("A", "b"), sample_key("a", "B"));
    }

    #[test]
    fn test_type_tag_prevents_collisions() {
        assert_ne!(
            to_key(ObjectType::Subject, "x"),
            to_key(ObjectType::Aspect, "x")
        );
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(
            parse_key("samsto:subject:na.us"),
            Some((ObjectType::Subject, "na.us".to_string()))
        );
        assert_eq!(parse_key(SAMPLE_INDEX_KEY), None);
        assert_eq!(parse_key(SUBJECT_INDEX_KEY), None);
        assert_eq!(parse_key("samsto:aspsubmap:temp"), None);
        assert_eq!(parse_key("other:subject:x"), None);
    }

    #[test]
    fn test_sample_key_prefix_for_subject_does_not_match_siblings() {
        let prefix = sample_key_prefix_for_subject("NA.US");
        assert!(sample_key("na.us", "temp").starts_with(&prefix));
        assert!(!sample_key("na.usa", "temp").starts_with(&prefix));
        assert!(!sample_key("na.us.ca", "temp").starts_with(&prefix));
    }

    #[test]
    fn test_split_sample_key() {
        assert_eq!(
            split_sample_key("samsto:sample:na.us|temp"),
            Some(("na.us".to_string(), "temp".to_string()))
        );
        assert_eq!(split_sample_key("samsto:subject:na.us"), None);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn object_type_strategy() -> impl Strategy<Value = ObjectType> {
        prop_oneof![Just(ObjectType::Subject), Just(ObjectType::Aspect)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: keys are case-insensitive in the natural name.
        #[test]
        fn prop_key_ignores_case(
            object_type in object_type_strategy(),
            name in "[A-Za-z0-9_.-]{1,32}",
        ) {
            prop_assert_eq!(
                to_key(object_type, &name.to_uppercase()),
                to_key(object_type, &name.to_lowercase())
            );
        }

        /// Property: decoding an object key yields its type and lowered name.
        #[test]
        fn prop_parse_inverts_to_key(
            object_type in object_type_strategy(),
            name in "[A-Za-z0-9_.-]{1,32}",
        ) {
            let decoded = parse_key(&to_key(object_type, &name));
            prop_assert_eq!(decoded, Some((object_type, name.to_lowercase())));
        }
    }
}
