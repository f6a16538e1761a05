use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::models::ActivityRef;

/// A predefined catalog activity. `icon` is a client-side icon token; the
/// server never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogActivity {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
}

pub static PREDEFINED_ACTIVITIES: [CatalogActivity; 8] = [
    CatalogActivity { id: "work", name: "Work", icon: "Briefcase" },
    CatalogActivity { id: "exercise", name: "Exercise", icon: "Dumbbell" },
    CatalogActivity { id: "reading", name: "Reading", icon: "BookOpen" },
    CatalogActivity { id: "socializing", name: "Socializing", icon: "Users" },
    CatalogActivity { id: "hobbies", name: "Hobbies", icon: "Coffee" },
    CatalogActivity { id: "resting", name: "Resting", icon: "Bed" },
    CatalogActivity { id: "eating", name: "Eating Well", icon: "Utensils" },
    CatalogActivity { id: "mindfulness", name: "Mindfulness", icon: "Brain" },
];

pub fn is_predefined(id: &str) -> bool {
    PREDEFINED_ACTIVITIES.iter().any(|a| a.id == id)
}

/// Mints an ad-hoc activity for a single entry. Ids are derived from the
/// entry's creation time, so they are unique per entry but never collide with
/// the catalog's stable ids.
pub fn custom_activity(name: &str, at: DateTime<Utc>) -> ActivityRef {
    ActivityRef {
        id: format!("custom-{}", at.timestamp_millis()),
        name: name.to_owned(),
        is_custom: true,
    }
}

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_SUFFIX_LEN: usize = 6;

/// Generates a shareable doctor code: "DR" followed by six characters from
/// [A-Z0-9]. Uniqueness is enforced at persistence time, not here.
pub fn generate_doctor_code() -> String {
    let mut rng = rand::rng();
    let mut code = String::with_capacity(2 + CODE_SUFFIX_LEN);
    code.push_str("DR");
    for _ in 0..CODE_SUFFIX_LEN {
        let idx = rng.random_range(0..CODE_CHARSET.len());
        code.push(CODE_CHARSET[idx] as char);
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn catalog_ids_are_unique_and_predefined() {
        let mut ids: Vec<_> = PREDEFINED_ACTIVITIES.iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), PREDEFINED_ACTIVITIES.len());
        assert!(is_predefined("mindfulness"));
        assert!(!is_predefined("custom-1700000000000"));
    }

    #[test]
    fn custom_activities_are_flagged_and_timestamped() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        let act = custom_activity("Morning Walk", at);
        assert_eq!(act.name, "Morning Walk");
        assert!(act.is_custom);
        assert_eq!(act.id, format!("custom-{}", at.timestamp_millis()));
        assert!(!is_predefined(&act.id));
    }

    #[test]
    fn doctor_codes_have_the_shareable_shape() {
        for _ in 0..50 {
            let code = generate_doctor_code();
            assert_eq!(code.len(), 8);
            assert!(code.starts_with("DR"));
            assert!(
                code[2..]
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
            );
        }
    }
}
