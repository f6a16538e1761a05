use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Doctor,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "patient" => Some(Self::Patient),
            "doctor" => Some(Self::Doctor),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-specific profile fields. A patient optionally carries the code of the
/// doctor they linked to; a doctor always carries their own shareable code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleFields {
    Patient {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        linked_doctor_code: Option<String>,
    },
    Doctor {
        doctor_code: String,
    },
}

impl RoleFields {
    pub fn role(&self) -> UserRole {
        match self {
            Self::Patient { .. } => UserRole::Patient,
            Self::Doctor { .. } => UserRole::Doctor,
        }
    }

    pub fn doctor_code(&self) -> Option<&str> {
        match self {
            Self::Doctor { doctor_code } => Some(doctor_code),
            Self::Patient { .. } => None,
        }
    }

    pub fn linked_doctor_code(&self) -> Option<&str> {
        match self {
            Self::Patient { linked_doctor_code } => linked_doctor_code.as_deref(),
            Self::Doctor { .. } => None,
        }
    }
}

/// The application-level user document. Role is fixed at creation and the
/// role-specific fields travel with it, flattened into the same JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(flatten)]
    pub role: RoleFields,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn role(&self) -> UserRole {
        self.role.role()
    }
}

/// Identity provider that vouched for a sign-in. Anything outside the two
/// supported providers is carried verbatim so the session layer can reject it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Provider {
    Password,
    Google,
    Other(String),
}

impl Provider {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Password => "password",
            Self::Google => "google.com",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Provider {
    fn from(s: String) -> Self {
        match s.as_str() {
            "password" => Self::Password,
            "google.com" => Self::Google,
            _ => Self::Other(s),
        }
    }
}

impl From<Provider> for String {
    fn from(p: Provider) -> Self {
        p.as_str().to_owned()
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated identity as reported by the provider layer. This is the
/// input to session resolution; the profile document may or may not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub provider: Provider,
    pub token_rev: i64,
}

/// Reference to an activity attached to a mood entry. Catalog activities keep
/// their stable ids; ad-hoc ones are minted per entry and flagged as custom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_custom: bool,
}

/// A single mood journal entry. Immutable once written; ordering is by the
/// server-assigned creation timestamp, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub mood_words: Vec<String>,
    pub activities: Vec<ActivityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_fields_flatten_into_profile_json() {
        let profile = UserProfile {
            id: Uuid::new_v4(),
            email: "doc@example.com".into(),
            name: "Dr. Chen".into(),
            role: RoleFields::Doctor {
                doctor_code: "DR7QX2KP".into(),
            },
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["role"], "doctor");
        assert_eq!(json["doctor_code"], "DR7QX2KP");
        assert!(json.get("linked_doctor_code").is_none());
    }

    #[test]
    fn unlinked_patient_omits_doctor_code_fields() {
        let profile = UserProfile {
            id: Uuid::new_v4(),
            email: "pat@example.com".into(),
            name: "Sam".into(),
            role: RoleFields::Patient {
                linked_doctor_code: None,
            },
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["role"], "patient");
        assert!(json.get("doctor_code").is_none());
        assert!(json.get("linked_doctor_code").is_none());

        let back: UserProfile = serde_json::from_value(json).unwrap();
        assert_eq!(back.role(), UserRole::Patient);
        assert_eq!(back.role.linked_doctor_code(), None);
    }

    #[test]
    fn provider_round_trips_through_strings() {
        assert_eq!(Provider::from("password".to_string()), Provider::Password);
        assert_eq!(Provider::from("google.com".to_string()), Provider::Google);
        assert_eq!(
            Provider::from("github.com".to_string()),
            Provider::Other("github.com".into())
        );
        assert_eq!(Provider::Google.as_str(), "google.com");
    }
}
