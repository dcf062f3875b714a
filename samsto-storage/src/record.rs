//! Flat field-map encoding of cache-resident records.
//!
//! Hashes hold strings only. Scalars are written in their natural textual
//! form (RFC 3339 timestamps, hyphenated UUIDs, `true`/`false`); ranges,
//! related links and the user summary are compact JSON. Decoding checks
//! every required field and reports the offending key on failure.

use crate::backend::FieldMap;
use crate::keys;
use chrono::{DateTime, Utc};
use samsto_core::{
    Aspect, ObjectType, RelatedLink, Sample, SamstoError, SamstoResult, Status, StatusRange,
    StoreError, Subject, Thresholds, Timestamp, UserSummary,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

/// A record stored as a single hash.
pub trait HashRecord: Sized {
    /// The key this record is stored under.
    fn key(&self) -> String;

    fn to_fields(&self) -> SamstoResult<FieldMap>;

    /// Decode the hash stored under `key`.
    fn from_fields(key: &str, fields: &FieldMap) -> SamstoResult<Self>;
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

struct Decoder<'a> {
    key: &'a str,
    fields: &'a FieldMap,
}

impl<'a> Decoder<'a> {
    fn new(key: &'a str, fields: &'a FieldMap) -> Self {
        Self { key, fields }
    }

    fn error(&self, reason: String) -> SamstoError {
        StoreError::Decode {
            key: self.key.to_string(),
            reason,
        }
        .into()
    }

    fn optional(&self, field: &str) -> Option<&'a str> {
        self.fields.get(field).map(String::as_str)
    }

    fn required(&self, field: &str) -> SamstoResult<&'a str> {
        self.optional(field)
            .ok_or_else(|| self.error(format!("missing field {}", field)))
    }

    fn string(&self, field: &str) -> SamstoResult<String> {
        self.required(field).map(str::to_string)
    }

    fn uuid(&self, field: &str) -> SamstoResult<Uuid> {
        let raw = self.required(field)?;
        Uuid::parse_str(raw).map_err(|e| self.error(format!("{}: {}", field, e)))
    }

    fn optional_uuid(&self, field: &str) -> SamstoResult<Option<Uuid>> {
        self.optional(field)
            .map(|raw| Uuid::parse_str(raw).map_err(|e| self.error(format!("{}: {}", field, e))))
            .transpose()
    }

    fn bool(&self, field: &str) -> SamstoResult<bool> {
        match self.required(field)? {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(self.error(format!("{}: expected true or false, got {:?}", field, other))),
        }
    }

    fn timestamp(&self, field: &str) -> SamstoResult<Timestamp> {
        let raw = self.required(field)?;
        parse_timestamp(raw).map_err(|reason| self.error(format!("{}: {}", field, reason)))
    }

    fn optional_timestamp(&self, field: &str) -> SamstoResult<Option<Timestamp>> {
        self.optional(field)
            .map(|raw| {
                parse_timestamp(raw).map_err(|reason| self.error(format!("{}: {}", field, reason)))
            })
            .transpose()
    }

    fn status(&self, field: &str) -> SamstoResult<Status> {
        let raw = self.required(field)?;
        Status::from_str(raw).map_err(|reason| self.error(format!("{}: {}", field, reason)))
    }

    fn optional_json<T: DeserializeOwned>(&self, field: &str) -> SamstoResult<Option<T>> {
        self.optional(field)
            .map(|raw| {
                serde_json::from_str(raw).map_err(|e| self.error(format!("{}: {}", field, e)))
            })
            .transpose()
    }
}

fn parse_timestamp(raw: &str) -> Result<Timestamp, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}

fn format_timestamp(t: &Timestamp) -> String {
    t.to_rfc3339()
}

fn to_json<T: Serialize>(key: &str, field: &str, value: &T) -> SamstoResult<String> {
    serde_json::to_string(value).map_err(|e| {
        StoreError::Encode {
            key: key.to_string(),
            field: field.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn put(fields: &mut FieldMap, field: &str, value: impl Into<String>) {
    fields.insert(field.to_string(), value.into());
}

// ============================================================================
// SUBJECT
// ============================================================================

impl HashRecord for Subject {
    fn key(&self) -> String {
        keys::to_key(ObjectType::Subject, &self.absolute_path)
    }

    fn to_fields(&self) -> SamstoResult<FieldMap> {
        let mut fields = FieldMap::new();
        put(&mut fields, "id", self.id.to_string());
        put(&mut fields, "absolutePath", self.absolute_path.as_str());
        put(&mut fields, "name", self.name.as_str());
        put(&mut fields, "isPublished", self.is_published.to_string());
        put(&mut fields, "updatedAt", format_timestamp(&self.updated_at));
        Ok(fields)
    }

    fn from_fields(key: &str, fields: &FieldMap) -> SamstoResult<Self> {
        let d = Decoder::new(key, fields);
        Ok(Subject {
            id: d.uuid("id")?,
            absolute_path: d.string("absolutePath")?,
            name: d.string("name")?,
            is_published: d.bool("isPublished")?,
            updated_at: d.timestamp("updatedAt")?,
        })
    }
}

// ============================================================================
// ASPECT
// ============================================================================

const RANGE_FIELDS: [(Status, &str); 4] = [
    (Status::Critical, "criticalRange"),
    (Status::Warning, "warningRange"),
    (Status::Info, "infoRange"),
    (Status::Ok, "okRange"),
];

impl HashRecord for Aspect {
    fn key(&self) -> String {
        keys::to_key(ObjectType::Aspect, &self.name)
    }

    fn to_fields(&self) -> SamstoResult<FieldMap> {
        let key = self.key();
        let mut fields = FieldMap::new();
        put(&mut fields, "id", self.id.to_string());
        put(&mut fields, "name", self.name.as_str());
        put(&mut fields, "isPublished", self.is_published.to_string());
        for (status, field) in RANGE_FIELDS {
            if let Some(range) = self.thresholds.range_for(status) {
                put(&mut fields, field, to_json(&key, field, range)?);
            }
        }
        put(&mut fields, "updatedAt", format_timestamp(&self.updated_at));
        Ok(fields)
    }

    fn from_fields(key: &str, fields: &FieldMap) -> SamstoResult<Self> {
        let d = Decoder::new(key, fields);
        let thresholds = Thresholds {
            critical: d.optional_json::<StatusRange>("criticalRange")?,
            warning: d.optional_json::<StatusRange>("warningRange")?,
            info: d.optional_json::<StatusRange>("infoRange")?,
            ok: d.optional_json::<StatusRange>("okRange")?,
        };
        Ok(Aspect {
            id: d.uuid("id")?,
            name: d.string("name")?,
            is_published: d.bool("isPublished")?,
            thresholds,
            updated_at: d.timestamp("updatedAt")?,
        })
    }
}

// ============================================================================
// SAMPLE
// ============================================================================

impl HashRecord for Sample {
    fn key(&self) -> String {
        keys::to_key(ObjectType::Sample, &self.name)
    }

    fn to_fields(&self) -> SamstoResult<FieldMap> {
        let key = self.key();
        let mut fields = FieldMap::new();
        put(&mut fields, "name", self.name.as_str());
        put(&mut fields, "value", self.value.as_str());
        put(&mut fields, "status", self.status.as_str());
        put(&mut fields, "previousStatus", self.previous_status.as_str());
        put(
            &mut fields,
            "statusChangedAt",
            format_timestamp(&self.status_changed_at),
        );
        put(&mut fields, "subjectId", self.subject_id.to_string());
        put(&mut fields, "aspectId", self.aspect_id.to_string());
        put(
            &mut fields,
            "relatedLinks",
            to_json(&key, "relatedLinks", &self.related_links)?,
        );
        if let Some(provider) = self.provider {
            put(&mut fields, "provider", provider.to_string());
        }
        if let Some(user) = &self.user {
            put(&mut fields, "user", to_json(&key, "user", user)?);
        }
        put(&mut fields, "createdAt", format_timestamp(&self.created_at));
        put(&mut fields, "updatedAt", format_timestamp(&self.updated_at));
        Ok(fields)
    }

    fn from_fields(key: &str, fields: &FieldMap) -> SamstoResult<Self> {
        let d = Decoder::new(key, fields);
        let status_changed_at = d.optional_timestamp("statusChangedAt")?;
        let created_at = d.optional_timestamp("createdAt")?;
        // Hashes written by older producers may carry none of the timestamps
        let updated_at = d
            .optional_timestamp("updatedAt")?
            .or(status_changed_at)
            .or(created_at)
            .unwrap_or_else(Utc::now);
        Ok(Sample {
            name: d.string("name")?,
            value: d.string("value")?,
            status: d.status("status")?,
            previous_status: d.status("previousStatus")?,
            status_changed_at: status_changed_at.unwrap_or(updated_at),
            subject_id: d.uuid("subjectId")?,
            aspect_id: d.uuid("aspectId")?,
            related_links: d
                .optional_json::<Vec<RelatedLink>>("relatedLinks")?
                .unwrap_or_default(),
            provider: d.optional_uuid("provider")?,
            user: d.optional_json::<UserSummary>("user")?,
            created_at: created_at.unwrap_or(updated_at),
            updated_at,
        })
    }
}
