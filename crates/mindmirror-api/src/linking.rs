use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use tracing::info;

use mindmirror_types::api::{Claims, LinkRequest};
use mindmirror_types::events::GatewayEvent;
use mindmirror_types::models::{UserProfile, UserRole};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::profile::load_profile;

/// Writes the caller's doctor link, overwriting any previous one. The code
/// must name an existing doctor; storing an unlinkable code helps nobody.
pub async fn set_link(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<LinkRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    if claims.role != UserRole::Patient {
        return Err(ApiError::Forbidden("Only patients link to a doctor"));
    }
    let code = validate_link_code(&req.doctor_code)?;

    let db = Arc::clone(&state.db);
    let lookup = code.clone();
    let exists = blocking(tokio::task::spawn_blocking(move || db.doctor_code_exists(&lookup)).await)?;
    if !exists {
        return Err(ApiError::UnknownDoctorCode);
    }

    let db = Arc::clone(&state.db);
    let patient_id = claims.sub.to_string();
    let stored = code.clone();
    blocking(
        tokio::task::spawn_blocking(move || db.set_linked_doctor_code(&patient_id, &stored)).await,
    )?;

    let patient = load_profile(&state.db, claims.sub).await?;
    info!("Patient {} linked to doctor code {}", claims.sub, code);
    state.dispatcher.broadcast(GatewayEvent::LinkSet {
        patient: patient.clone(),
        doctor_code: code,
    });

    Ok(Json(patient))
}

/// Clears the caller's doctor link. A no-op when none exists; otherwise the
/// formerly linked doctor is told so their roster and subscriptions update.
pub async fn clear_link(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserProfile>, ApiError> {
    if claims.role != UserRole::Patient {
        return Err(ApiError::Forbidden("Only patients link to a doctor"));
    }

    let patient = load_profile(&state.db, claims.sub).await?;
    let Some(code) = patient.role.linked_doctor_code().map(str::to_owned) else {
        return Ok(Json(patient));
    };

    let db = Arc::clone(&state.db);
    let patient_id = claims.sub.to_string();
    blocking(tokio::task::spawn_blocking(move || db.clear_linked_doctor_code(&patient_id)).await)?;

    let patient = load_profile(&state.db, claims.sub).await?;
    info!("Patient {} unlinked from doctor code {}", claims.sub, code);
    state.dispatcher.broadcast(GatewayEvent::LinkCleared {
        patient_id: claims.sub,
        doctor_code: code,
    });

    Ok(Json(patient))
}

fn validate_link_code(raw: &str) -> Result<String, ApiError> {
    let code = raw.trim();
    if code.chars().count() < 3 {
        return Err(ApiError::Validation(
            "Doctor code must be at least 3 characters".into(),
        ));
    }
    Ok(code.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_codes_are_trimmed_and_need_three_chars() {
        assert_eq!(validate_link_code("  DR7QX2KP ").unwrap(), "DR7QX2KP");
        assert_eq!(validate_link_code("DRX").unwrap(), "DRX");
        assert!(validate_link_code("DR").is_err());
        assert!(validate_link_code("   ").is_err());
    }
}
