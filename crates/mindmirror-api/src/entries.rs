use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use mindmirror_types::activities::is_predefined;
use mindmirror_types::api::{Claims, CreateEntryRequest};
use mindmirror_types::events::GatewayEvent;
use mindmirror_types::models::{ActivityRef, MoodEntry, UserRole};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::profile::load_profile;

const MAX_NOTE_CHARS: usize = 500;

/// Appends one journal entry for the calling patient. The server assigns both
/// the id and the timestamp; clients never backdate. On success the entry is
/// fanned out to every live timeline watching this owner.
pub async fn create_entry(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != UserRole::Patient {
        return Err(ApiError::Forbidden("Only patients log mood entries"));
    }

    let notes = req
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);
    validate_entry(&req.mood_words, &req.activities, notes.as_deref())?;

    let entry = MoodEntry {
        id: Uuid::new_v4(),
        owner_id: claims.sub,
        mood_words: req.mood_words,
        activities: req.activities,
        notes,
        created_at: Utc::now(),
    };

    // Insert off the async runtime, then notify subscribers.
    let db = Arc::clone(&state.db);
    let stored = entry.clone();
    blocking(
        tokio::task::spawn_blocking(move || {
            db.insert_mood_entry(
                &stored.id.to_string(),
                &stored.owner_id.to_string(),
                &stored.mood_words,
                &stored.activities,
                stored.notes.as_deref(),
                stored.created_at,
            )
        })
        .await,
    )?;

    debug!("Entry {} logged by patient {}", entry.id, entry.owner_id);
    state.dispatcher.broadcast(GatewayEvent::EntryCreate {
        entry: entry.clone(),
    });

    Ok((StatusCode::CREATED, Json(entry)))
}

/// The calling patient's own journal, newest first, filtered.
pub async fn list_my_entries(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<Vec<MoodEntry>>, ApiError> {
    list_entries_for(&state, claims.sub, &query).await.map(Json)
}

/// A linked patient's journal, readable by their doctor only. The link is
/// checked at request time, so an unlink cuts access immediately.
pub async fn list_patient_entries(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<Vec<MoodEntry>>, ApiError> {
    if claims.role != UserRole::Doctor {
        return Err(ApiError::Forbidden("Only doctors view patient journals"));
    }

    let doctor = load_profile(&state.db, claims.sub).await?;
    let code = doctor
        .role
        .doctor_code()
        .ok_or(ApiError::Forbidden("Only doctors view patient journals"))?
        .to_owned();

    let patient = load_profile(&state.db, patient_id).await?;
    if patient.role.linked_doctor_code() != Some(code.as_str()) {
        return Err(ApiError::Forbidden("This patient is not linked to you"));
    }

    list_entries_for(&state, patient_id, &query).await.map(Json)
}

async fn list_entries_for(
    state: &AppState,
    owner_id: Uuid,
    query: &EntryQuery,
) -> Result<Vec<MoodEntry>, ApiError> {
    let db = Arc::clone(&state.db);
    let owner = owner_id.to_string();
    let rows = blocking(tokio::task::spawn_blocking(move || db.get_entries_for_owner(&owner)).await)?;

    // Rows arrive newest first; filtering preserves that order.
    let filter = EntryFilter::new(query, Utc::now().date_naive());
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let entry = row.into_entry()?;
        if filter.matches(&entry) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Timeline filters. Each dimension is any-of within itself; dimensions
/// combine with AND. Days are UTC calendar days.
#[derive(Debug, Default, Deserialize)]
pub struct EntryQuery {
    /// Comma-separated mood words, matched exactly.
    pub moods: Option<String>,
    /// Comma-separated activity names, matched exactly.
    pub activities: Option<String>,
    /// Inclusive day bounds, `YYYY-MM-DD`.
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

struct EntryFilter {
    moods: Vec<String>,
    activities: Vec<String>,
    days: Option<(NaiveDate, NaiveDate)>,
}

impl EntryFilter {
    /// `today` caps an open-ended range: "from this day" means "from this day
    /// until now".
    fn new(query: &EntryQuery, today: NaiveDate) -> Self {
        let days = match (query.from, query.to) {
            (None, None) => None,
            (from, to) => Some((from.unwrap_or(NaiveDate::MIN), to.unwrap_or(today))),
        };
        Self {
            moods: split_terms(query.moods.as_deref()),
            activities: split_terms(query.activities.as_deref()),
            days,
        }
    }

    fn matches(&self, entry: &MoodEntry) -> bool {
        let mood_ok = self.moods.is_empty()
            || entry
                .mood_words
                .iter()
                .any(|word| self.moods.iter().any(|m| m == word));
        let activity_ok = self.activities.is_empty()
            || entry
                .activities
                .iter()
                .any(|act| self.activities.iter().any(|name| name == &act.name));
        let day_ok = self.days.map_or(true, |(from, to)| {
            let day = entry.created_at.date_naive();
            from <= day && day <= to
        });
        mood_ok && activity_ok && day_ok
    }
}

fn split_terms(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

/// Form rules: something must be logged, notes are capped, and activity
/// references have to be internally consistent. Mood words are free text and
/// never checked against the taxonomy.
fn validate_entry(
    mood_words: &[String],
    activities: &[ActivityRef],
    notes: Option<&str>,
) -> Result<(), ApiError> {
    if mood_words.is_empty() && activities.is_empty() && notes.is_none() {
        return Err(ApiError::Validation(
            "Log at least one feeling, activity or note".into(),
        ));
    }
    if let Some(notes) = notes {
        if notes.chars().count() > MAX_NOTE_CHARS {
            return Err(ApiError::Validation(
                "Notes cannot exceed 500 characters".into(),
            ));
        }
    }
    if mood_words.iter().any(|word| word.trim().is_empty()) {
        return Err(ApiError::Validation("Mood words cannot be empty".into()));
    }
    for activity in activities {
        if activity.name.trim().is_empty() {
            return Err(ApiError::Validation(
                "Activity names cannot be empty".into(),
            ));
        }
        if activity.is_custom {
            if activity.id.trim().is_empty() || is_predefined(&activity.id) {
                return Err(ApiError::Validation(format!(
                    "Custom activity '{}' needs its own id",
                    activity.name
                )));
            }
        } else if !is_predefined(&activity.id) {
            return Err(ApiError::Validation(format!(
                "Unknown activity id '{}'",
                activity.id
            )));
        }
    }
    Ok(())
}
