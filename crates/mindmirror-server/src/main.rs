use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use mindmirror_api::auth::{self, AppState, AppStateInner};
use mindmirror_api::error::ApiError;
use mindmirror_api::middleware::require_auth;
use mindmirror_api::{catalog, entries, linking, oauth, patients, profile, session};
use mindmirror_gateway::connection;
use mindmirror_gateway::dispatcher::Dispatcher;
use mindmirror_session::{Backoff, SessionService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mindmirror=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("MINDMIRROR_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("MINDMIRROR_DB_PATH").unwrap_or_else(|_| "mindmirror.db".into());
    let host = std::env::var("MINDMIRROR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MINDMIRROR_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(mindmirror_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let sessions = SessionService::new(
        session::SqliteProfiles::new(Arc::clone(&db)),
        session::SqliteIdentities::new(Arc::clone(&db)),
        Backoff::default(),
    );
    let google = oauth::GoogleOAuth::from_env()?;
    if google.is_none() {
        info!("GOOGLE_CLIENT_ID unset; federated sign-in disabled");
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        dispatcher,
        sessions,
        google,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/doctor-code", get(auth::suggest_doctor_code))
        .route("/auth/google", get(oauth::google_auth_url))
        .route("/auth/google/callback", get(oauth::google_callback))
        .route("/catalog", get(catalog::get_catalog))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/session", post(session::check_session))
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(profile::get_me))
        .route("/me", put(profile::update_me))
        .route("/me/entries", get(entries::list_my_entries))
        .route("/me/entries", post(entries::create_entry))
        .route("/me/link", put(linking::set_link))
        .route("/me/link", delete(linking::clear_link))
        .route("/patients", get(patients::list_patients))
        .route("/patients/{patient_id}/entries", get(entries::list_patient_entries))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("MindMirror server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
struct GatewayParams {
    token: String,
}

/// Browsers cannot set headers on a WebSocket request, so the gateway takes
/// its token as a query parameter and authenticates before upgrading.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<GatewayParams>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let claims = mindmirror_api::middleware::verify_token(&state, &params.token).await?;
    let user = profile::load_profile(&state.db, claims.sub).await?;

    let db = Arc::clone(&state.db);
    let dispatcher = state.dispatcher.clone();
    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, db, user)))
}
