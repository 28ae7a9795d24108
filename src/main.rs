use axum::{
    http::{header, HeaderValue},
    routing::{delete, get, post},
    Router,
};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hopebridge::notify::Mailer;
use hopebridge::{auth, db, routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    // Ensure critical environment variables are set
    env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    // Initialize Tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "hopebridge=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting HopeBridge application...");

    // Storage is the only fatal startup dependency.
    let db = db::connect().await?;
    let mailer = Mailer::from_env();

    let state = AppState { db, mailer };

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(
                env::var("RATE_LIMIT_PER_SECOND")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1200),
            )
            .burst_size(
                env::var("RATE_LIMIT_BURST")
                    .ok()
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(2400),
            )
            .finish()
            .expect("governor config"),
    );

    let cors = build_cors();

    // Router Setup
    let app = Router::new()
        .route("/health", get(health_check))
        // Accounts
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/verify-email", post(auth::verify_email))
        .route("/api/auth/resend-code", post(auth::resend_code))
        .route("/api/auth/password-reset", post(auth::password_reset_start))
        .route(
            "/api/auth/password-reset/verify",
            post(auth::password_reset_verify),
        )
        .route(
            "/api/auth/password-reset/confirm",
            post(auth::password_reset_confirm),
        )
        .route(
            "/api/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        // Role profiles
        .route("/api/roles", get(routes::roles::my_roles))
        .route("/api/roles/donor", post(routes::roles::become_donor))
        .route("/api/roles/recipient", post(routes::roles::become_recipient))
        .route("/api/roles/volunteer", post(routes::roles::become_volunteer))
        // Donations
        .route(
            "/api/donations",
            get(routes::donations::list_donations).post(routes::donations::create_donation),
        )
        .route("/api/donations/mine", get(routes::donations::my_donations))
        .route("/api/donations/claimed", get(routes::donations::my_claims))
        .route(
            "/api/donations/{id}/claim",
            post(routes::donations::claim_donation),
        )
        .route(
            "/api/donations/{id}/status",
            post(routes::donations::update_donation_status),
        )
        .route(
            "/api/donations/{id}",
            delete(routes::donations::delete_donation),
        )
        // Activities
        .route(
            "/api/activities",
            get(routes::activities::list_activities).post(routes::activities::create_activity),
        )
        .route(
            "/api/activities/mine",
            get(routes::activities::my_activities),
        )
        .route(
            "/api/activities/{id}/join",
            post(routes::activities::join_activity),
        )
        .route(
            "/api/activities/{id}/leave",
            post(routes::activities::leave_activity),
        )
        .route(
            "/api/activities/{id}/status",
            post(routes::activities::update_activity_status),
        )
        .route(
            "/api/activities/{id}",
            delete(routes::activities::delete_activity),
        )
        // Admin
        .route("/api/admin/dashboard", get(routes::admin::dashboard))
        .route("/api/admin/users", get(routes::admin::list_users))
        .route(
            "/api/admin/users/{id}",
            get(routes::admin::user_detail).delete(routes::admin::delete_user),
        )
        .route(
            "/api/admin/users/{id}/toggle-status",
            post(routes::admin::toggle_user_status),
        )
        .route("/api/admin/donations", get(routes::admin::list_donations))
        .route(
            "/api/admin/donations/{id}/ship",
            post(routes::admin::ship_donation),
        )
        .route(
            "/api/admin/donations/{id}",
            delete(routes::admin::delete_donation),
        )
        .route("/api/admin/activities", get(routes::admin::list_activities))
        .route(
            "/api/admin/activities/{id}",
            delete(routes::admin::delete_activity),
        )
        .route("/api/admin/logs", get(routes::admin::activity_logs))
        .route("/api/admin/export", get(routes::admin::export_data))
        // Misc
        .route("/api/contact", post(routes::contact_admin))
        .layer(cors)
        .layer(GovernorLayer {
            config: governor_config,
        })
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn build_cors() -> CorsLayer {
    let env_mode = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());
    let origins = env::var("ALLOWED_ORIGINS")
        .ok()
        .map(|v| {
            v.split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        return None;
                    }
                    match trimmed.parse::<HeaderValue>() {
                        Ok(value) => Some(value),
                        Err(_) => {
                            tracing::warn!("Ignoring invalid ALLOWED_ORIGINS entry: {}", trimmed);
                            None
                        }
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty())
        .unwrap_or_else(|| {
            if env_mode == "production" {
                panic!("ALLOWED_ORIGINS must contain at least one valid origin in production")
            }
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}

async fn health_check() -> &'static str {
    "OK"
}
