use crate::Database;
use crate::models::{IdentityRow, MoodEntryRow, ProfileRow};
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use mindmirror_types::models::ActivityRef;
use rusqlite::Connection;

impl Database {
    // -- Identities --

    pub fn create_identity(
        &self,
        id: &str,
        email: &str,
        name: &str,
        provider: &str,
        password_hash: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO identities (id, email, name, provider, password_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, email, name, provider, password_hash],
            )?;
            Ok(())
        })
    }

    pub fn get_identity_by_email(&self, email: &str) -> Result<Option<IdentityRow>> {
        self.with_conn(|conn| query_identity(conn, "email", email))
    }

    pub fn get_identity_by_id(&self, id: &str) -> Result<Option<IdentityRow>> {
        self.with_conn(|conn| query_identity(conn, "id", id))
    }

    pub fn update_identity_name(&self, id: &str, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE identities SET name = ?2 WHERE id = ?1",
                rusqlite::params![id, name],
            )?;
            Ok(())
        })
    }

    /// Increments the identity's token revision, invalidating every token
    /// minted against the previous value. Returns the new revision.
    pub fn bump_token_rev(&self, id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute("UPDATE identities SET token_rev = token_rev + 1 WHERE id = ?1", [id])?;
            let rev = conn.query_row(
                "SELECT token_rev FROM identities WHERE id = ?1",
                [id],
                |row| row.get(0),
            )?;
            Ok(rev)
        })
    }

    // -- Profiles --

    pub fn create_profile(
        &self,
        id: &str,
        email: &str,
        name: &str,
        role: &str,
        doctor_code: Option<&str>,
        linked_doctor_code: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, email, name, role, doctor_code, linked_doctor_code)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, email, name, role, doctor_code, linked_doctor_code],
            )?;
            Ok(())
        })
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, id))
    }

    pub fn update_profile_name(&self, id: &str, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE profiles SET name = ?2 WHERE id = ?1",
                rusqlite::params![id, name],
            )?;
            Ok(())
        })
    }

    pub fn doctor_code_exists(&self, code: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM profiles WHERE doctor_code = ?1",
                [code],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn set_linked_doctor_code(&self, patient_id: &str, code: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE profiles SET linked_doctor_code = ?2 WHERE id = ?1 AND role = 'patient'",
                rusqlite::params![patient_id, code],
            )?;
            Ok(())
        })
    }

    pub fn clear_linked_doctor_code(&self, patient_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE profiles SET linked_doctor_code = NULL WHERE id = ?1 AND role = 'patient'",
                [patient_id],
            )?;
            Ok(())
        })
    }

    /// All patients whose stored link exactly matches the given doctor code.
    pub fn get_patients_by_doctor_code(&self, code: &str) -> Result<Vec<ProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, name, role, doctor_code, linked_doctor_code, created_at
                 FROM profiles
                 WHERE role = 'patient' AND linked_doctor_code = ?1
                 ORDER BY name ASC",
            )?;

            let rows = stmt
                .query_map([code], profile_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Mood entries --

    pub fn insert_mood_entry(
        &self,
        id: &str,
        owner_id: &str,
        mood_words: &[String],
        activities: &[ActivityRef],
        notes: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let mood_words = serde_json::to_string(mood_words)?;
        let activities = serde_json::to_string(activities)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO mood_entries (id, owner_id, mood_words, activities, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id,
                    owner_id,
                    mood_words,
                    activities,
                    notes,
                    rfc3339_micros(created_at)
                ],
            )?;
            Ok(())
        })
    }

    /// One owner's journal, newest first. Timestamps are stored RFC 3339 UTC
    /// with fixed precision, so the string sort is the chronological sort.
    pub fn get_entries_for_owner(&self, owner_id: &str) -> Result<Vec<MoodEntryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, mood_words, activities, notes, created_at
                 FROM mood_entries
                 WHERE owner_id = ?1
                 ORDER BY created_at DESC",
            )?;

            let rows = stmt
                .query_map([owner_id], |row| {
                    Ok(MoodEntryRow {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        mood_words: row.get(2)?,
                        activities: row.get(3)?,
                        notes: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- OAuth states --

    pub fn insert_oauth_state(
        &self,
        state: &str,
        pkce_verifier: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO oauth_states (state, pkce_verifier, expires_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![state, pkce_verifier, rfc3339_micros(expires_at)],
            )?;
            Ok(())
        })
    }

    /// Consumes a pending OAuth state, returning its PKCE verifier if the
    /// state exists and has not expired. Each state is single-use.
    pub fn take_oauth_state(&self, state: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM oauth_states WHERE expires_at <= ?1",
                [rfc3339_micros(now)],
            )?;

            let verifier: Option<String> = conn
                .query_row(
                    "SELECT pkce_verifier FROM oauth_states WHERE state = ?1",
                    [state],
                    |row| row.get(0),
                )
                .optional()?;

            if verifier.is_some() {
                conn.execute("DELETE FROM oauth_states WHERE state = ?1", [state])?;
            }

            Ok(verifier)
        })
    }
}

fn rfc3339_micros(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_identity(conn: &Connection, column: &str, value: &str) -> Result<Option<IdentityRow>> {
    // column is one of our own literals, never caller input
    let sql = format!(
        "SELECT id, email, name, provider, password_hash, token_rev, created_at
         FROM identities WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(IdentityRow {
                id: row.get(0)?,
                email: row.get(1)?,
                name: row.get(2)?,
                provider: row.get(3)?,
                password_hash: row.get(4)?,
                token_rev: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_profile(conn: &Connection, id: &str) -> Result<Option<ProfileRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, name, role, doctor_code, linked_doctor_code, created_at
         FROM profiles WHERE id = ?1",
    )?;

    let row = stmt.query_row([id], profile_from_row).optional()?;

    Ok(row)
}

fn profile_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<ProfileRow, rusqlite::Error> {
    Ok(ProfileRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: row.get(3)?,
        doctor_code: row.get(4)?,
        linked_doctor_code: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_identity(db: &Database, email: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_identity(&id, email, "Someone", "password", Some("hash"))
            .unwrap();
        id
    }

    fn seed_doctor(db: &Database, email: &str, code: &str) -> String {
        let id = seed_identity(db, email);
        db.create_profile(&id, email, "Dr. Someone", "doctor", Some(code), None)
            .unwrap();
        id
    }

    fn seed_patient(db: &Database, email: &str, linked: Option<&str>) -> String {
        let id = seed_identity(db, email);
        db.create_profile(&id, email, "Someone", "patient", None, linked)
            .unwrap();
        id
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = test_db();
        seed_identity(&db, "sam@example.com");
        let id = Uuid::new_v4().to_string();
        let result = db.create_identity(&id, "sam@example.com", "Other", "password", Some("h"));
        assert!(result.is_err());
    }

    #[test]
    fn token_rev_starts_at_zero_and_bumps() {
        let db = test_db();
        let id = seed_identity(&db, "sam@example.com");
        let row = db.get_identity_by_id(&id).unwrap().unwrap();
        assert_eq!(row.token_rev, 0);

        assert_eq!(db.bump_token_rev(&id).unwrap(), 1);
        assert_eq!(db.bump_token_rev(&id).unwrap(), 2);
    }

    #[test]
    fn doctor_codes_are_unique_across_profiles() {
        let db = test_db();
        seed_doctor(&db, "a@example.com", "DR7QX2KP");

        let other = seed_identity(&db, "b@example.com");
        let result = db.create_profile(&other, "b@example.com", "Dr. B", "doctor", Some("DR7QX2KP"), None);
        assert!(result.is_err());
        assert!(db.doctor_code_exists("DR7QX2KP").unwrap());
        assert!(!db.doctor_code_exists("DR000000").unwrap());
    }

    #[test]
    fn linking_sets_and_clears_the_stored_code() {
        let db = test_db();
        seed_doctor(&db, "doc@example.com", "DR7QX2KP");
        let patient = seed_patient(&db, "pat@example.com", None);

        db.set_linked_doctor_code(&patient, "DR7QX2KP").unwrap();
        let row = db.get_profile(&patient).unwrap().unwrap();
        assert_eq!(row.linked_doctor_code.as_deref(), Some("DR7QX2KP"));

        db.clear_linked_doctor_code(&patient).unwrap();
        let row = db.get_profile(&patient).unwrap().unwrap();
        assert_eq!(row.linked_doctor_code, None);
    }

    #[test]
    fn patient_listing_matches_codes_exactly() {
        let db = test_db();
        seed_doctor(&db, "doc@example.com", "DR7QX2KP");
        let linked = seed_patient(&db, "linked@example.com", Some("DR7QX2KP"));
        seed_patient(&db, "other@example.com", Some("DR7QX2KQ"));
        seed_patient(&db, "unlinked@example.com", None);

        let patients = db.get_patients_by_doctor_code("DR7QX2KP").unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].id, linked);
    }

    #[test]
    fn entries_come_back_newest_first() {
        let db = test_db();
        let patient = seed_patient(&db, "pat@example.com", None);

        let words: Vec<String> = vec!["Content".into()];
        for (n, day) in [(1, 3), (2, 1), (3, 2)] {
            let at = Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap();
            db.insert_mood_entry(
                &format!("00000000-0000-0000-0000-00000000000{}", n),
                &patient,
                &words,
                &[],
                None,
                at,
            )
            .unwrap();
        }

        let rows = db.get_entries_for_owner(&patient).unwrap();
        let days: Vec<String> = rows.iter().map(|r| r.created_at.clone()).collect();
        let mut sorted = days.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(days, sorted);
        assert_eq!(rows[0].id, "00000000-0000-0000-0000-000000000001");
        assert_eq!(rows[2].id, "00000000-0000-0000-0000-000000000002");
    }

    #[test]
    fn entry_payload_round_trips_including_custom_flag() {
        let db = test_db();
        let patient = seed_patient(&db, "pat@example.com", None);
        let id = Uuid::new_v4();

        let words: Vec<String> = vec!["Happy".into(), "Hopeful".into()];
        let activities = vec![
            ActivityRef {
                id: "work".into(),
                name: "Work".into(),
                is_custom: false,
            },
            ActivityRef {
                id: "custom-1740800000000".into(),
                name: "Morning Walk".into(),
                is_custom: true,
            },
        ];
        db.insert_mood_entry(
            &id.to_string(),
            &patient,
            &words,
            &activities,
            Some("walked before work"),
            Utc::now(),
        )
        .unwrap();

        let rows = db.get_entries_for_owner(&patient).unwrap();
        let entry = rows.into_iter().next().unwrap().into_entry().unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.mood_words, words);
        assert_eq!(entry.activities, activities);
        assert!(entry.activities[1].is_custom);
        assert_eq!(entry.notes.as_deref(), Some("walked before work"));
    }

    #[test]
    fn oauth_states_are_single_use_and_expire() {
        let db = test_db();
        let now = Utc::now();

        db.insert_oauth_state("fresh", "verifier-1", now + chrono::Duration::minutes(10))
            .unwrap();
        db.insert_oauth_state("stale", "verifier-2", now - chrono::Duration::minutes(1))
            .unwrap();

        assert_eq!(
            db.take_oauth_state("fresh", now).unwrap().as_deref(),
            Some("verifier-1")
        );
        assert_eq!(db.take_oauth_state("fresh", now).unwrap(), None);
        assert_eq!(db.take_oauth_state("stale", now).unwrap(), None);
        assert_eq!(db.take_oauth_state("missing", now).unwrap(), None);
    }
}
