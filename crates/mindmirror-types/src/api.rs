use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ActivityRef, Provider, UserProfile, UserRole};

// -- JWT Claims --

/// JWT claims shared across mindmirror-api (REST middleware) and
/// mindmirror-gateway (WebSocket authentication). Canonical definition lives
/// here in mindmirror-types to eliminate duplication. `rev` is compared
/// against the identity's current token revision so a forced sign-out
/// invalidates previously issued tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub role: UserRole,
    pub provider: Provider,
    pub rev: i64,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: UserRole,
    #[serde(default)]
    pub doctor_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
    /// Client route the caller should land on, when resolution asks for one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

// -- Session --

/// Observable phase of session resolution, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Unresolved,
    Resolving,
    Known,
    New,
    Absent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionRequest {
    /// Client-side route the caller is currently on, used to compute the
    /// redirect target.
    #[serde(default)]
    pub route: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    /// True when resolution found the session unusable and revoked it.
    pub signed_out: bool,
}

// -- Profile --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: String,
}

// -- Mood entries --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEntryRequest {
    #[serde(default)]
    pub mood_words: Vec<String>,
    #[serde(default)]
    pub activities: Vec<ActivityRef>,
    #[serde(default)]
    pub notes: Option<String>,
}

// -- Doctor linking --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkRequest {
    pub doctor_code: String,
}

// -- Federated sign-in --

#[derive(Debug, Serialize)]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

/// Suggested doctor code for the signup form's generate affordance.
#[derive(Debug, Serialize)]
pub struct DoctorCodeResponse {
    pub doctor_code: String,
}
