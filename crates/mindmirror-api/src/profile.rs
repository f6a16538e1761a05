use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use uuid::Uuid;

use mindmirror_db::Database;
use mindmirror_types::api::{Claims, UpdateProfileRequest};
use mindmirror_types::models::UserProfile;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

/// Loads one profile, mapping a miss to 404. Claims only carry id, name and
/// role; handlers that need the full document go through here.
pub async fn load_profile(db: &Arc<Database>, id: Uuid) -> Result<UserProfile, ApiError> {
    let handle = Arc::clone(db);
    let key = id.to_string();
    let row = blocking(tokio::task::spawn_blocking(move || handle.get_profile(&key)).await)?
        .ok_or(ApiError::NotFound("Profile"))?;
    row.into_profile().map_err(ApiError::Internal)
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserProfile>, ApiError> {
    load_profile(&state.db, claims.sub).await.map(Json)
}

/// Renames the caller. The display name lives on both the identity and the
/// profile; both copies move together.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let name = req.name.trim().to_owned();
    if name.chars().count() < 2 {
        return Err(ApiError::Validation(
            "Name must be at least 2 characters".into(),
        ));
    }

    let db = Arc::clone(&state.db);
    let key = claims.sub.to_string();
    let stored = name.clone();
    blocking(
        tokio::task::spawn_blocking(move || {
            db.update_identity_name(&key, &stored)?;
            db.update_profile_name(&key, &stored)
        })
        .await,
    )?;

    load_profile(&state.db, claims.sub).await.map(Json)
}
