//! Row types mapping directly to SQLite rows, kept distinct from the
//! mindmirror-types API models. Conversions into domain types live here so
//! timestamp and JSON parsing is done in one place.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use mindmirror_types::models::{Identity, MoodEntry, Provider, RoleFields, UserProfile, UserRole};
use tracing::warn;
use uuid::Uuid;

pub struct IdentityRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub provider: String,
    pub password_hash: Option<String>,
    pub token_rev: i64,
    pub created_at: String,
}

pub struct ProfileRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub doctor_code: Option<String>,
    pub linked_doctor_code: Option<String>,
    pub created_at: String,
}

pub struct MoodEntryRow {
    pub id: String,
    pub owner_id: String,
    pub mood_words: String,
    pub activities: String,
    pub notes: Option<String>,
    pub created_at: String,
}

impl IdentityRow {
    /// The provider-facing view of this identity. The password hash never
    /// leaves the DB layer.
    pub fn to_identity(&self) -> Result<Identity> {
        Ok(Identity {
            id: parse_uuid(&self.id, "identity")?,
            email: self.email.clone(),
            name: self.name.clone(),
            provider: Provider::from(self.provider.clone()),
            token_rev: self.token_rev,
        })
    }
}

impl ProfileRow {
    pub fn into_profile(self) -> Result<UserProfile> {
        let role = UserRole::parse(&self.role)
            .ok_or_else(|| anyhow!("Unknown role '{}' on profile '{}'", self.role, self.id))?;
        let role = match role {
            UserRole::Patient => RoleFields::Patient {
                linked_doctor_code: self.linked_doctor_code,
            },
            UserRole::Doctor => RoleFields::Doctor {
                doctor_code: self
                    .doctor_code
                    .ok_or_else(|| anyhow!("Doctor profile '{}' has no doctor_code", self.id))?,
            },
        };
        Ok(UserProfile {
            id: parse_uuid(&self.id, "profile")?,
            email: self.email,
            name: self.name,
            role,
            created_at: parse_timestamp(&self.created_at, "profile", &self.id),
        })
    }
}

impl MoodEntryRow {
    pub fn into_entry(self) -> Result<MoodEntry> {
        let mood_words: Vec<String> = serde_json::from_str(&self.mood_words)
            .with_context(|| format!("Corrupt mood_words on entry '{}'", self.id))?;
        let activities = serde_json::from_str(&self.activities)
            .with_context(|| format!("Corrupt activities on entry '{}'", self.id))?;
        Ok(MoodEntry {
            id: parse_uuid(&self.id, "entry")?,
            owner_id: parse_uuid(&self.owner_id, "entry owner")?,
            mood_words,
            activities,
            notes: self.notes,
            created_at: parse_timestamp(&self.created_at, "entry", &self.id),
        })
    }
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid> {
    raw.parse::<Uuid>()
        .with_context(|| format!("Corrupt {} id '{}'", what, raw))
}

/// Rows written by us carry RFC 3339; rows stamped by SQLite's
/// `datetime('now')` default are "YYYY-MM-DD HH:MM:SS" without timezone.
/// Accept both, logging anything unparseable rather than failing the read.
pub(crate) fn parse_timestamp(raw: &str, what: &str, id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {} '{}': {}", raw, what, id, e);
            DateTime::default()
        })
}
