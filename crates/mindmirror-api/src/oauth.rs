//! Google sign-in: the OAuth 2.0 authorization-code flow with PKCE. The
//! server builds the authorization URL, parks the CSRF state and verifier in
//! the database with a short expiry, and finishes the exchange in the
//! callback. Sign-ins land in the same session resolution as password auth,
//! which is where first-time Google users get their patient profile.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use mindmirror_types::api::{AuthResponse, AuthUrlResponse};
use mindmirror_types::models::{Identity, Provider};

use crate::auth::{AppState, create_token, dashboard_redirect, resolved_user};
use crate::error::{ApiError, blocking};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// How long a pending sign-in may sit between the authorization redirect and
/// the callback.
const STATE_TTL_MINUTES: i64 = 10;

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Google user info from the userinfo API.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    email: String,
    name: Option<String>,
}

/// Google OAuth client configuration.
pub struct GoogleOAuth {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
}

impl GoogleOAuth {
    /// Reads the client configuration from the environment. `None` when the
    /// credentials are unset, which leaves the federated routes disabled.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let (Ok(client_id), Ok(client_secret)) = (
            std::env::var("GOOGLE_CLIENT_ID"),
            std::env::var("GOOGLE_CLIENT_SECRET"),
        ) else {
            return Ok(None);
        };
        let redirect = std::env::var("GOOGLE_REDIRECT_URL")
            .unwrap_or_else(|_| "http://localhost:3000/auth/google/callback".to_owned());

        Ok(Some(Self {
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            auth_url: AuthUrl::new(GOOGLE_AUTH_URL.to_owned())?,
            token_url: TokenUrl::new(GOOGLE_TOKEN_URL.to_owned())?,
            redirect_url: RedirectUrl::new(redirect)?,
        }))
    }

    fn create_client(&self) -> ConfiguredClient {
        BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
    }
}

/// Starts the federated flow: answers with the Google authorization URL after
/// persisting the CSRF state and PKCE verifier for the callback to consume.
pub async fn google_auth_url(
    State(state): State<AppState>,
) -> Result<Json<AuthUrlResponse>, ApiError> {
    let google = state.google.as_ref().ok_or(ApiError::OAuthUnavailable)?;
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, csrf_state) = google
        .create_client()
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .set_pkce_challenge(pkce_challenge)
        .url();

    let db = Arc::clone(&state.db);
    let stored_state = csrf_state.secret().clone();
    let verifier = pkce_verifier.secret().clone();
    let expires_at = Utc::now() + Duration::minutes(STATE_TTL_MINUTES);
    blocking(
        tokio::task::spawn_blocking(move || {
            db.insert_oauth_state(&stored_state, &verifier, expires_at)
        })
        .await,
    )?;

    Ok(Json(AuthUrlResponse {
        auth_url: auth_url.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

/// Finishes the federated flow: consumes the state row, exchanges the code,
/// fetches the Google profile, maps it onto an identity and resolves the
/// session. First-timers come out of resolution with a synthesized patient
/// profile; the response is the same shape as a password sign-in.
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<AuthResponse>, ApiError> {
    let google = state.google.as_ref().ok_or(ApiError::OAuthUnavailable)?;

    // Single-use state row; a miss means a forged, replayed or expired
    // callback and the flow starts over.
    let db = Arc::clone(&state.db);
    let csrf = query.state.clone();
    let verifier =
        blocking(tokio::task::spawn_blocking(move || db.take_oauth_state(&csrf, Utc::now())).await)?
            .ok_or_else(|| ApiError::OAuthRejected("sign-in expired, please retry".to_owned()))?;

    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| ApiError::Internal(e.into()))?;

    let token_result = google
        .create_client()
        .exchange_code(AuthorizationCode::new(query.code))
        .set_pkce_verifier(PkceCodeVerifier::new(verifier))
        .request_async(&http_client)
        .await
        .map_err(|e| ApiError::OAuthRejected(format!("token exchange failed: {}", e)))?;

    let google_user: GoogleUser = http_client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(token_result.access_token().secret())
        .send()
        .await
        .map_err(|e| ApiError::OAuthRejected(format!("userinfo fetch failed: {}", e)))?
        .json()
        .await
        .map_err(|e| ApiError::OAuthRejected(format!("userinfo fetch failed: {}", e)))?;

    let identity = upsert_identity(&state, google_user).await?;
    let outcome = state.sessions.resolve_action(&identity, false).await?;
    let user = resolved_user(outcome)?;

    let token = create_token(&state.jwt_secret, &identity, &user)?;
    info!("Google sign-in for {} ({})", user.name, identity.id);

    Ok(Json(AuthResponse {
        redirect: dashboard_redirect(&user),
        user,
        token,
    }))
}

/// Finds or creates the `google.com` identity for a federated sign-in.
/// Returning users get their display name refreshed from Google; an email
/// already owned by a password account is a conflict, not a silent merge.
async fn upsert_identity(state: &AppState, google_user: GoogleUser) -> Result<Identity, ApiError> {
    let email = google_user.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::OAuthRejected(
            "Google returned no email address".to_owned(),
        ));
    }
    let name = google_user
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_owned();

    let db = Arc::clone(&state.db);
    let lookup = email.clone();
    let existing =
        blocking(tokio::task::spawn_blocking(move || db.get_identity_by_email(&lookup)).await)?;

    if let Some(row) = existing {
        let identity = row.to_identity()?;
        if identity.provider != Provider::Google {
            return Err(ApiError::EmailTaken);
        }
        if name.is_empty() || name == identity.name {
            return Ok(identity);
        }

        let db = Arc::clone(&state.db);
        let key = identity.id.to_string();
        let fresh = name.clone();
        blocking(tokio::task::spawn_blocking(move || db.update_identity_name(&key, &fresh)).await)?;
        return Ok(Identity { name, ..identity });
    }

    let id = Uuid::new_v4();
    let db = Arc::clone(&state.db);
    let create_email = email.clone();
    let create_name = name.clone();
    let key = id.to_string();
    blocking(
        tokio::task::spawn_blocking(move || {
            // Federated identities carry no password hash.
            db.create_identity(
                &key,
                &create_email,
                &create_name,
                Provider::Google.as_str(),
                None,
            )
        })
        .await,
    )?;
    info!("Created Google identity {} for {}", id, email);

    Ok(Identity {
        id,
        email,
        name,
        provider: Provider::Google,
        token_rev: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn userinfo_payload_tolerates_a_missing_name() {
        let full: GoogleUser =
            serde_json::from_str(r#"{"email":"sam@gmail.com","name":"Sam","picture":"x"}"#)
                .unwrap();
        assert_eq!(full.email, "sam@gmail.com");
        assert_eq!(full.name.as_deref(), Some("Sam"));

        let bare: GoogleUser = serde_json::from_str(r#"{"email":"sam@gmail.com"}"#).unwrap();
        assert_eq!(bare.name, None);
    }
}
