//! Upsert request body.

use samsto_core::{EntityId, RelatedLink, SampleName, ValidationError};
use serde::{Deserialize, Serialize};

/// A sample reading submitted for upsert.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    /// Composite `subjectPath|aspectName`, any casing.
    pub name: String,
    #[serde(default)]
    pub value: String,
    /// Merged into the stored links by name. `None` keeps the stored links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_links: Option<Vec<RelatedLink>>,
    /// Id of the reporting user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<EntityId>,
}

impl UpsertRequest {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            related_links: None,
            provider: None,
        }
    }

    pub fn with_related_links(mut self, links: Vec<RelatedLink>) -> Self {
        self.related_links = Some(links);
        self
    }

    pub fn with_provider(mut self, provider: EntityId) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Check the request and parse its sample name.
    pub fn validate(&self) -> Result<SampleName, ValidationError> {
        let name = SampleName::parse(&self.name)?;
        for link in self.related_links.iter().flatten() {
            if link.name.trim().is_empty() {
                return Err(ValidationError::RequiredFieldMissing {
                    field: "relatedLinks.name".to_string(),
                });
            }
            if link.url.trim().is_empty() {
                return Err(ValidationError::RequiredFieldMissing {
                    field: "relatedLinks.url".to_string(),
                });
            }
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_parses_name() {
        let name = UpsertRequest::new("NA.US|Temp", "1").validate().unwrap();
        assert_eq!(name.subject_path(), "NA.US");
        assert_eq!(name.aspect_name(), "Temp");
    }

    #[test]
    fn test_missing_name() {
        let err = UpsertRequest::new("", "1").validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::RequiredFieldMissing {
                field: "name".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_names() {
        for name in ["NA.US", "NA.US|", "|Temp", "a|b|c"] {
            let err = UpsertRequest::new(name, "1").validate().unwrap_err();
            assert!(
                matches!(err, ValidationError::MalformedSampleName { .. }),
                "{name} should be malformed"
            );
        }
    }

    #[test]
    fn test_related_links_need_name_and_url() {
        let request = UpsertRequest::new("a|b", "1")
            .with_related_links(vec![RelatedLink::new("", "https://x")]);
        assert!(request.validate().is_err());

        let request =
            UpsertRequest::new("a|b", "1").with_related_links(vec![RelatedLink::new("x", " ")]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_deserializes_camel_case() {
        let provider = samsto_core::new_entity_id();
        let json = serde_json::json!({
            "name": "a|b",
            "value": "2",
            "relatedLinks": [{"name": "l", "url": "https://l"}],
            "provider": provider,
        });
        let request: UpsertRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.provider, Some(provider));
        assert_eq!(request.related_links.unwrap().len(), 1);

        let bare: UpsertRequest = serde_json::from_str(r#"{"name":"a|b"}"#).unwrap();
        assert_eq!(bare.value, "");
        assert!(bare.related_links.is_none());
    }
}
