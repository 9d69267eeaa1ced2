use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use holdline::admission::AdmissionConfig;
use holdline::provider::{ProviderConfig, TwilioClient};
use holdline::state::AppState;
use holdline::token::{TokenConfig, TokenIssuer};
use holdline::{api, relay, voice};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "holdline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting holdline...");

    let mut state = AppState::new();
    state.admission = AdmissionConfig::from_env();

    match ProviderConfig::from_env() {
        Some(config) => {
            tracing::info!("telephony provider configured");
            state.provider = Some(Arc::new(TwilioClient::new(config)));
        }
        None => tracing::warn!(
            "telephony provider credentials missing; SMS and outbound calls are disabled"
        ),
    }

    match TokenConfig::from_env() {
        Some(config) => state.token_issuer = Some(TokenIssuer::new(config)),
        None => tracing::warn!("token signing keys missing; /token is disabled"),
    }

    if let Ok(url) = std::env::var("PUBLIC_BASE_URL") {
        state.public_base_url = url;
    }

    if let Err(e) = tokio::fs::create_dir_all(&state.upload_dir).await {
        tracing::error!("failed to create upload dir: {}", e);
    }
    let upload_dir = state.upload_dir.clone();

    let state = Arc::new(state);

    let app = Router::new()
        // Realtime relay
        .route("/chat", get(relay::chat_handler))
        // Admission protocol webhooks
        .route("/incoming-call", post(voice::incoming_call))
        .route("/wait-for-acceptance", post(voice::wait_for_acceptance))
        .route("/accept-call", post(voice::accept_call))
        .route("/twiml", post(voice::outbound_twiml))
        // Provider plumbing
        .route("/make-call", post(api::make_call))
        .route("/send-sms", post(api::send_sms))
        .route("/fetch-received-messages", get(api::fetch_received_messages))
        .route("/get-messages", get(api::get_messages))
        .route("/token", get(api::token))
        .route("/upload", post(api::upload))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 5000));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
