use std::sync::Arc;

use async_trait::async_trait;
use axum::{Extension, Json, extract::State};
use tracing::info;
use uuid::Uuid;

use mindmirror_db::Database;
use mindmirror_session::{IdentityOps, ProfileStore, SessionOutcome, SessionService, routes};
use mindmirror_types::api::{Claims, SessionRequest, SessionResponse};
use mindmirror_types::models::UserProfile;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

/// The process-wide session service, wired to SQLite.
pub type Sessions = SessionService<SqliteProfiles, SqliteIdentities>;

/// Profile reads and writes over SQLite. Every call hops to the blocking
/// pool; rusqlite never runs on the async runtime.
pub struct SqliteProfiles {
    db: Arc<Database>,
}

impl SqliteProfiles {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileStore for SqliteProfiles {
    async fn fetch_profile(&self, id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let db = Arc::clone(&self.db);
        let key = id.to_string();
        let row = tokio::task::spawn_blocking(move || db.get_profile(&key)).await??;
        row.map(|r| r.into_profile()).transpose()
    }

    async fn create_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        let db = Arc::clone(&self.db);
        let profile = profile.clone();
        tokio::task::spawn_blocking(move || {
            db.create_profile(
                &profile.id.to_string(),
                &profile.email,
                &profile.name,
                profile.role().as_str(),
                profile.role.doctor_code(),
                profile.role.linked_doctor_code(),
            )
        })
        .await?
    }
}

/// Identity side effects over SQLite. A forced sign-out bumps the identity's
/// token revision, which the auth middleware turns into 401s for every token
/// minted before the bump.
pub struct SqliteIdentities {
    db: Arc<Database>,
}

impl SqliteIdentities {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityOps for SqliteIdentities {
    async fn force_sign_out(&self, id: Uuid) -> anyhow::Result<()> {
        let db = Arc::clone(&self.db);
        let key = id.to_string();
        let rev = tokio::task::spawn_blocking(move || db.bump_token_rev(&key)).await??;
        info!("Revoked tokens for identity {} (revision now {})", id, rev);
        Ok(())
    }
}

/// Passive session check. Clients call this on load and after any token
/// change; the response says who resolved, whether the server force-signed
/// the session out, and where the client should navigate from its current
/// route.
pub async fn check_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let db = Arc::clone(&state.db);
    let key = claims.sub.to_string();
    let identity = blocking(tokio::task::spawn_blocking(move || db.get_identity_by_id(&key)).await)?
        .ok_or(ApiError::Unauthorized)?
        .to_identity()?;

    let outcome = state.sessions.resolve_passive(&identity).await;
    Ok(Json(session_response(&outcome, req.route.as_deref())))
}

/// Builds the wire response for one resolution outcome.
fn session_response(outcome: &SessionOutcome, route: Option<&str>) -> SessionResponse {
    let user = outcome.state.user().cloned();
    let redirect = route
        .and_then(|path| routes::redirect_for(path, user.as_ref()))
        .map(|r| r.as_path().to_owned());
    SessionResponse {
        status: outcome.state.status(),
        user,
        redirect,
        signed_out: outcome.forced_sign_out,
    }
}
