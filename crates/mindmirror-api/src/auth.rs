use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use mindmirror_db::Database;
use mindmirror_gateway::dispatcher::Dispatcher;
use mindmirror_session::{SessionOutcome, routes};
use mindmirror_types::activities::generate_doctor_code;
use mindmirror_types::api::{
    AuthResponse, Claims, DoctorCodeResponse, LoginRequest, RegisterRequest,
};
use mindmirror_types::models::{Identity, Provider, UserProfile, UserRole};

use crate::error::ApiError;
use crate::oauth::GoogleOAuth;
use crate::session::Sessions;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub sessions: Sessions,
    pub google: Option<GoogleOAuth>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    let name = req.name.trim().to_owned();
    validate_email(&email)?;
    validate_password(&req.password)?;
    validate_name(&name)?;
    let doctor_code = match req.role {
        UserRole::Doctor => Some(validate_doctor_code(req.doctor_code.as_deref())?),
        UserRole::Patient => None,
    };

    if state.db.get_identity_by_email(&email)?.is_some() {
        return Err(ApiError::EmailTaken);
    }
    if let Some(code) = &doctor_code {
        if state.db.doctor_code_exists(code)? {
            return Err(ApiError::DoctorCodeTaken);
        }
    }

    // Hash password with Argon2id
    let password_hash = hash_password(&req.password)?;
    let id = Uuid::new_v4();

    // Two sequential writes, no transaction: the identity first, then the
    // profile. Session resolution owns the recovery when the second write
    // never lands.
    state.db.create_identity(
        &id.to_string(),
        &email,
        &name,
        Provider::Password.as_str(),
        Some(&password_hash),
    )?;
    state.db.create_profile(
        &id.to_string(),
        &email,
        &name,
        req.role.as_str(),
        doctor_code.as_deref(),
        None,
    )?;

    let identity = Identity {
        id,
        email,
        name,
        provider: Provider::Password,
        token_rev: 0,
    };
    let outcome = state.sessions.resolve_action(&identity, true).await?;
    let user = resolved_user(outcome)?;

    let token = create_token(&state.jwt_secret, &identity, &user)?;
    info!("Registered {} account {} ({})", user.role(), user.name, id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            redirect: dashboard_redirect(&user),
            user,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let row = state
        .db
        .get_identity_by_email(&email)?
        .ok_or(ApiError::InvalidCredentials)?;

    // Federated accounts carry no hash; there is no password to check.
    let hash = row
        .password_hash
        .as_deref()
        .ok_or(ApiError::InvalidCredentials)?;
    verify_password(&req.password, hash)?;

    let identity = row.to_identity()?;
    let outcome = state.sessions.resolve_action(&identity, false).await?;
    let user = resolved_user(outcome)?;

    let token = create_token(&state.jwt_secret, &identity, &user)?;

    Ok(Json(AuthResponse {
        redirect: dashboard_redirect(&user),
        user,
        token,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.sign_out(claims.sub).await?;
    info!("Signed out identity {}", claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

/// Mints a suggested doctor code for the signup form. Any string six chars or
/// longer is accepted at registration; this just supplies the conventional
/// shape. Uniqueness is checked when the account is created, not here.
pub async fn suggest_doctor_code() -> Json<DoctorCodeResponse> {
    Json(DoctorCodeResponse {
        doctor_code: generate_doctor_code(),
    })
}

/// Unwraps a resolved session into its user, surfacing the resolution failure
/// when the outcome was a forced sign-out.
pub(crate) fn resolved_user(outcome: SessionOutcome) -> Result<UserProfile, ApiError> {
    match outcome.state.user() {
        Some(user) => Ok(user.clone()),
        None => Err(match outcome.reason {
            Some(err) => ApiError::Session(err),
            None => ApiError::Unauthorized,
        }),
    }
}

/// Fresh sign-ins always land on the role dashboard.
pub(crate) fn dashboard_redirect(user: &UserProfile) -> Option<String> {
    Some(routes::dashboard(user.role()).as_path().to_owned())
}

pub(crate) fn create_token(
    secret: &str,
    identity: &Identity,
    user: &UserProfile,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: identity.id,
        name: user.name.clone(),
        role: user.role(),
        provider: identity.provider.clone(),
        rev: identity.token_rev,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(token)
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<(), ApiError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored password hash unreadable: {}", e)))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::InvalidCredentials)
}

// Validation rules match the signup form exactly, so server rejections read
// like the client's own messages.

fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    });
    if !valid {
        return Err(ApiError::Validation("Invalid email address".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.chars().count() < 2 {
        return Err(ApiError::Validation(
            "Name must be at least 2 characters".into(),
        ));
    }
    Ok(())
}

fn validate_doctor_code(code: Option<&str>) -> Result<String, ApiError> {
    let code = code.map(str::trim).unwrap_or_default();
    if code.is_empty() {
        return Err(ApiError::Validation("Doctor code is required".into()));
    }
    if code.chars().count() < 6 {
        return Err(ApiError::Validation(
            "Doctor code must be at least 6 characters".into(),
        ));
    }
    Ok(code.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use mindmirror_session::{SessionError, SessionState};
    use mindmirror_types::models::RoleFields;

    #[test]
    fn email_validation_accepts_plain_addresses() {
        assert!(validate_email("sam@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.org").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("sam@nodot").is_err());
        assert!(validate_email("sam@.com").is_err());
    }

    #[test]
    fn password_and_name_minimums_match_the_form() {
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("12345").is_err());
        assert!(validate_name("Jo").is_ok());
        assert!(validate_name("J").is_err());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn doctor_codes_are_required_and_at_least_six_chars() {
        assert_eq!(validate_doctor_code(Some("DR7QX2KP")).unwrap(), "DR7QX2KP");
        assert_eq!(validate_doctor_code(Some("  DRCODE  ")).unwrap(), "DRCODE");
        assert!(validate_doctor_code(None).is_err());
        assert!(validate_doctor_code(Some("")).is_err());
        assert!(validate_doctor_code(Some("DR1")).is_err());
    }

    fn sample_identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "doc@example.com".into(),
            name: "Dr. Chen".into(),
            provider: Provider::Password,
            token_rev: 3,
        }
    }

    fn sample_doctor(id: Uuid) -> UserProfile {
        UserProfile {
            id,
            email: "doc@example.com".into(),
            name: "Dr. Chen".into(),
            role: RoleFields::Doctor {
                doctor_code: "DR7QX2KP".into(),
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tokens_carry_role_and_revision() {
        let identity = sample_identity();
        let user = sample_doctor(identity.id);
        let token = create_token("test-secret", &identity, &user).unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(decoded.claims.sub, identity.id);
        assert_eq!(decoded.claims.role, UserRole::Doctor);
        assert_eq!(decoded.claims.rev, 3);
        assert_eq!(decoded.claims.provider, Provider::Password);
    }

    #[test]
    fn resolution_failures_surface_their_reason() {
        let identity = sample_identity();
        let user = sample_doctor(identity.id);

        let ok = SessionOutcome {
            state: SessionState::ResolvedKnown(user.clone()),
            forced_sign_out: false,
            reason: None,
        };
        assert_eq!(resolved_user(ok).unwrap(), user);

        let fatal = SessionOutcome {
            state: SessionState::ResolvedAbsent,
            forced_sign_out: true,
            reason: Some(SessionError::ProfileMissing(identity.id)),
        };
        assert!(matches!(
            resolved_user(fatal),
            Err(ApiError::Session(SessionError::ProfileMissing(_)))
        ));
    }

    #[test]
    fn sign_ins_redirect_to_the_role_dashboard() {
        let user = sample_doctor(Uuid::new_v4());
        assert_eq!(
            dashboard_redirect(&user).as_deref(),
            Some("/doctor/dashboard")
        );
    }
}
