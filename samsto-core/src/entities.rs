//! Entity types mirrored into, and stored by, the sample store.

use crate::{EntityId, ObjectType, SampleName, Status, Thresholds, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

// ============================================================================
// MIRRORED OBJECTS
// ============================================================================

/// A node of the subject hierarchy, mirrored from the relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: EntityId,
    /// Dot-separated path, case preserved for display.
    pub absolute_path: String,
    /// Last segment of the absolute path.
    pub name: String,
    pub is_published: bool,
    pub updated_at: Timestamp,
}

impl Subject {
    /// A published subject with a fresh id.
    pub fn new(absolute_path: impl Into<String>) -> Self {
        let absolute_path = absolute_path.into();
        let name = absolute_path
            .rsplit('.')
            .next()
            .unwrap_or(absolute_path.as_str())
            .to_string();
        Self {
            id: crate::new_entity_id(),
            absolute_path,
            name,
            is_published: true,
            updated_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn with_published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }
}

/// A measurable property with status thresholds, mirrored from the
/// relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aspect {
    pub id: EntityId,
    pub name: String,
    pub is_published: bool,
    #[serde(flatten)]
    pub thresholds: Thresholds,
    pub updated_at: Timestamp,
}

impl Aspect {
    /// A published aspect with a fresh id.
    pub fn new(name: impl Into<String>, thresholds: Thresholds) -> Self {
        Self {
            id: crate::new_entity_id(),
            name: name.into(),
            is_published: true,
            thresholds,
            updated_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn with_published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }
}

/// Either kind of object the mirror holds.
#[derive(Debug, Clone, PartialEq)]
pub enum MirroredObject {
    Subject(Subject),
    Aspect(Aspect),
}

impl MirroredObject {
    pub fn object_type(&self) -> ObjectType {
        match self {
            MirroredObject::Subject(_) => ObjectType::Subject,
            MirroredObject::Aspect(_) => ObjectType::Aspect,
        }
    }

    /// The natural (display-cased) name the key is derived from.
    pub fn natural_name(&self) -> &str {
        match self {
            MirroredObject::Subject(s) => &s.absolute_path,
            MirroredObject::Aspect(a) => &a.name,
        }
    }

    pub fn is_published(&self) -> bool {
        match self {
            MirroredObject::Subject(s) => s.is_published,
            MirroredObject::Aspect(a) => a.is_published,
        }
    }

    pub fn as_subject(&self) -> Option<&Subject> {
        match self {
            MirroredObject::Subject(s) => Some(s),
            MirroredObject::Aspect(_) => None,
        }
    }

    pub fn as_aspect(&self) -> Option<&Aspect> {
        match self {
            MirroredObject::Aspect(a) => Some(a),
            MirroredObject::Subject(_) => None,
        }
    }
}

impl From<Subject> for MirroredObject {
    fn from(subject: Subject) -> Self {
        MirroredObject::Subject(subject)
    }
}

impl From<Aspect> for MirroredObject {
    fn from(aspect: Aspect) -> Self {
        MirroredObject::Aspect(aspect)
    }
}

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
}

/// Denormalized view of the user who reported a sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub profile: UserProfile,
}

// ============================================================================
// SAMPLES
// ============================================================================

/// A named link attached to a sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedLink {
    pub name: String,
    pub url: String,
}

impl RelatedLink {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Merge incoming links into an existing list by name.
///
/// A link whose name already exists replaces that entry's url in place; new
/// names are appended in request order.
pub fn merge_related_links(existing: &[RelatedLink], incoming: &[RelatedLink]) -> Vec<RelatedLink> {
    let mut merged = existing.to_vec();
    for link in incoming {
        match merged.iter_mut().find(|l| l.name == link.name) {
            Some(current) => current.url = link.url.clone(),
            None => merged.push(link.clone()),
        }
    }
    merged
}

/// The latest reading of one aspect on one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Canonical-case composite name.
    pub name: String,
    pub value: String,
    pub status: Status,
    pub previous_status: Status,
    pub status_changed_at: Timestamp,
    pub subject_id: EntityId,
    pub aspect_id: EntityId,
    #[serde(default)]
    pub related_links: Vec<RelatedLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Sample {
    /// Parse this sample's own name back into its parts.
    pub fn sample_name(&self) -> Option<SampleName> {
        SampleName::parse(&self.name).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_name_is_last_segment() {
        assert_eq!(Subject::new("NA.US.CA").name, "CA");
        assert_eq!(Subject::new("Root").name, "Root");
    }

    #[test]
    fn test_merge_replaces_by_name_and_appends() {
        let existing = vec![
            RelatedLink::new("link1", "https://a"),
            RelatedLink::new("link2", "https://a"),
        ];
        let incoming = vec![
            RelatedLink::new("link2", "https://b"),
            RelatedLink::new("link3", "https://b"),
        ];
        let merged = merge_related_links(&existing, &incoming);
        assert_eq!(
            merged,
            vec![
                RelatedLink::new("link1", "https://a"),
                RelatedLink::new("link2", "https://b"),
                RelatedLink::new("link3", "https://b"),
            ]
        );
    }

    #[test]
    fn test_merge_with_empty_incoming_keeps_existing() {
        let existing = vec![RelatedLink::new("link1", "https://a")];
        assert_eq!(merge_related_links(&existing, &[]), existing);
    }

    #[test]
    fn test_mirrored_object_accessors() {
        let subject: MirroredObject = Subject::new("NA.US").with_published(false).into();
        assert_eq!(subject.object_type(), ObjectType::Subject);
        assert_eq!(subject.natural_name(), "NA.US");
        assert!(!subject.is_published());
        assert!(subject.as_aspect().is_none());

        let aspect: MirroredObject = Aspect::new("Temp", Thresholds::new()).into();
        assert_eq!(aspect.object_type(), ObjectType::Aspect);
        assert!(aspect.as_aspect().is_some());
    }

    #[test]
    fn test_sample_json_shape() {
        let now = Utc::now();
        let sample = Sample {
            name: "NA.US|Temp".to_string(),
            value: "25".to_string(),
            status: Status::Ok,
            previous_status: Status::Invalid,
            status_changed_at: now,
            subject_id: crate::new_entity_id(),
            aspect_id: crate::new_entity_id(),
            related_links: vec![],
            provider: None,
            user: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["previousStatus"], "Invalid");
        assert!(json.get("provider").is_none());
        assert_eq!(sample.sample_name().unwrap().aspect_name(), "Temp");
    }
}
