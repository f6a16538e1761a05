use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use mindmirror_types::api::Claims;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

/// Authentication layer for the protected routes. Pulls the bearer token from
/// the Authorization header, validates it, and stashes the claims for
/// handlers to extract.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or(ApiError::Unauthorized)?
        .to_owned();

    let claims = verify_token(&state, &token).await?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Decodes a token and rejects it when its revision is stale, so revoked
/// tokens die before their expiry does. Shared with the WebSocket upgrade,
/// which carries its token as a query parameter instead of a header.
pub async fn verify_token(state: &AppState, token: &str) -> Result<Claims, ApiError> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;
    let claims = decoded.claims;

    let db = Arc::clone(&state.db);
    let key = claims.sub.to_string();
    let row = blocking(tokio::task::spawn_blocking(move || db.get_identity_by_id(&key)).await)?;

    match row {
        Some(identity) if identity.token_rev == claims.rev => Ok(claims),
        _ => Err(ApiError::Unauthorized),
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use mindmirror_db::Database;
    use mindmirror_gateway::dispatcher::Dispatcher;
    use mindmirror_session::{Backoff, SessionService};
    use mindmirror_types::models::{Identity, Provider, RoleFields, UserProfile};

    use crate::auth::AppStateInner;
    use crate::session::{SqliteIdentities, SqliteProfiles};

    #[test]
    fn bearer_tokens_are_extracted_from_the_header_value() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc"), None);
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
        assert_eq!(bearer_token(""), None);
    }

    fn test_state(db: Arc<Database>, secret: &str) -> AppState {
        let sessions = SessionService::new(
            SqliteProfiles::new(Arc::clone(&db)),
            SqliteIdentities::new(Arc::clone(&db)),
            Backoff::disabled(),
        );
        Arc::new(AppStateInner {
            db,
            jwt_secret: secret.to_owned(),
            dispatcher: Dispatcher::new(),
            sessions,
            google: None,
        })
    }

    #[tokio::test]
    async fn tokens_minted_before_a_revision_bump_stop_authenticating() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let id = Uuid::new_v4();
        db.create_identity(&id.to_string(), "pat@example.com", "Sam", "password", Some("hash"))
            .unwrap();

        let identity = Identity {
            id,
            email: "pat@example.com".into(),
            name: "Sam".into(),
            provider: Provider::Password,
            token_rev: 0,
        };
        let user = UserProfile {
            id,
            email: "pat@example.com".into(),
            name: "Sam".into(),
            role: RoleFields::Patient {
                linked_doctor_code: None,
            },
            created_at: Utc::now(),
        };
        let token = crate::auth::create_token("test-secret", &identity, &user).unwrap();

        let state = test_state(Arc::clone(&db), "test-secret");
        let claims = verify_token(&state, &token).await.unwrap();
        assert_eq!(claims.sub, id);

        db.bump_token_rev(&id.to_string()).unwrap();
        let err = verify_token(&state, &token).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
