use std::sync::Arc;

use axum::{Extension, Json, extract::State};

use mindmirror_types::api::Claims;
use mindmirror_types::models::{UserProfile, UserRole};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::profile::load_profile;

/// The caller's roster: every patient whose stored link names the calling
/// doctor's code, ordered by name.
pub async fn list_patients(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    if claims.role != UserRole::Doctor {
        return Err(ApiError::Forbidden("Only doctors list linked patients"));
    }

    let doctor = load_profile(&state.db, claims.sub).await?;
    let code = doctor
        .role
        .doctor_code()
        .ok_or(ApiError::Forbidden("Only doctors list linked patients"))?
        .to_owned();

    let db = Arc::clone(&state.db);
    let rows =
        blocking(tokio::task::spawn_blocking(move || db.get_patients_by_doctor_code(&code)).await)?;

    let patients = rows
        .into_iter()
        .map(|row| row.into_profile())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(patients))
}
