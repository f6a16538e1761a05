use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS identities (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            name            TEXT NOT NULL,
            provider        TEXT NOT NULL,
            password_hash   TEXT,
            token_rev       INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS profiles (
            id                  TEXT PRIMARY KEY REFERENCES identities(id),
            email               TEXT NOT NULL,
            name                TEXT NOT NULL,
            role                TEXT NOT NULL CHECK (role IN ('patient', 'doctor')),
            doctor_code         TEXT,
            linked_doctor_code  TEXT,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- A doctor's shareable code must identify exactly one doctor
        CREATE UNIQUE INDEX IF NOT EXISTS idx_profiles_doctor_code
            ON profiles(doctor_code) WHERE doctor_code IS NOT NULL;

        CREATE INDEX IF NOT EXISTS idx_profiles_linked_code
            ON profiles(linked_doctor_code) WHERE linked_doctor_code IS NOT NULL;

        CREATE TABLE IF NOT EXISTS mood_entries (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT NOT NULL REFERENCES profiles(id),
            mood_words  TEXT NOT NULL,
            activities  TEXT NOT NULL,
            notes       TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_entries_owner
            ON mood_entries(owner_id, created_at);

        CREATE TABLE IF NOT EXISTS oauth_states (
            state           TEXT PRIMARY KEY,
            pkce_verifier   TEXT NOT NULL,
            expires_at      TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
