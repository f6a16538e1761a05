use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MoodEntry, UserProfile};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user: UserProfile },

    /// A new mood entry was appended to someone's journal
    EntryCreate { entry: MoodEntry },

    /// A patient linked themselves to a doctor's code
    LinkSet {
        patient: UserProfile,
        doctor_code: String,
    },

    /// A patient cleared their doctor link
    LinkCleared {
        patient_id: Uuid,
        doctor_code: String,
    },
}

impl GatewayEvent {
    /// Returns the journal owner if this event is scoped to one patient's
    /// entry stream. Events that return `None` are routed by other rules.
    pub fn owner_id(&self) -> Option<Uuid> {
        match self {
            Self::EntryCreate { entry } => Some(entry.owner_id),
            _ => None,
        }
    }

    /// Returns the doctor code if this event concerns a doctor's roster.
    pub fn doctor_code(&self) -> Option<&str> {
        match self {
            Self::LinkSet { doctor_code, .. } => Some(doctor_code),
            Self::LinkCleared { doctor_code, .. } => Some(doctor_code),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Start receiving `EntryCreate` events for one journal. Patients may
    /// subscribe to their own; doctors to any patient currently linked to them.
    SubscribeEntries { owner_id: Uuid },

    /// Stop receiving events for one journal.
    UnsubscribeEntries { owner_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityRef, RoleFields};
    use chrono::Utc;

    #[test]
    fn entry_create_is_scoped_to_its_owner() {
        let owner = Uuid::new_v4();
        let event = GatewayEvent::EntryCreate {
            entry: MoodEntry {
                id: Uuid::new_v4(),
                owner_id: owner,
                mood_words: vec!["Content".into()],
                activities: vec![ActivityRef {
                    id: "reading".into(),
                    name: "Reading".into(),
                    is_custom: false,
                }],
                notes: None,
                created_at: Utc::now(),
            },
        };
        assert_eq!(event.owner_id(), Some(owner));
        assert_eq!(event.doctor_code(), None);
    }

    #[test]
    fn link_events_carry_the_doctor_code() {
        let patient = UserProfile {
            id: Uuid::new_v4(),
            email: "pat@example.com".into(),
            name: "Sam".into(),
            role: RoleFields::Patient {
                linked_doctor_code: Some("DR7QX2KP".into()),
            },
            created_at: Utc::now(),
        };
        let set = GatewayEvent::LinkSet {
            patient: patient.clone(),
            doctor_code: "DR7QX2KP".into(),
        };
        let cleared = GatewayEvent::LinkCleared {
            patient_id: patient.id,
            doctor_code: "DR7QX2KP".into(),
        };
        assert_eq!(set.doctor_code(), Some("DR7QX2KP"));
        assert_eq!(cleared.doctor_code(), Some("DR7QX2KP"));
        assert_eq!(set.owner_id(), None);
    }

    #[test]
    fn commands_use_the_tagged_wire_shape() {
        let cmd = GatewayCommand::SubscribeEntries {
            owner_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "SubscribeEntries");
        assert!(json["data"]["owner_id"].is_string());
    }
}
