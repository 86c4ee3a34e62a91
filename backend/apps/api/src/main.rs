//! FamilyHub API Server Entry Point
//!
//! Uses `anyhow` for startup errors; request-level errors are
//! `auth::AuthError` / `kernel::error::AppError`.

mod config;

use std::sync::Arc;

use anyhow::Context;
use auth::PgAuthRepository;
use auth::application::{PruneUseCase, UserAdminUseCase};
use axum::{
    Router,
    extract::State,
    http::{self, HeaderName, Method, header},
    routing::get,
};
use kernel::error::app_error::{AppError, AppResult};
use platform::clock::{Clock, SystemClock};
use platform::csrf::CSRF_HEADER;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "familyhub=info,auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(bind_addr = %config.bind_addr, auth = ?config.auth, "Configuration loaded");

    // Database connection
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let repo = Arc::new(PgAuthRepository::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let auth_config = Arc::new(config.auth.clone());

    if let Some(admin) = &config.bootstrap_admin {
        let use_case = UserAdminUseCase::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            auth_config.clone(),
            clock.clone(),
        );
        let user = use_case
            .ensure_bootstrap_admin(&admin.email, admin.password.clone())
            .await
            .context("failed to ensure bootstrap admin")?;
        tracing::info!(user_id = %user.user_id, "Bootstrap admin ready");
    }

    // Startup cleanup: remove expired sessions and challenges
    // Errors here should not prevent server startup
    let prune = PruneUseCase::new(repo.clone(), repo.clone(), clock.clone());
    if let Err(e) = prune.execute().await {
        tracing::warn!(error = %e, "Auth cleanup failed, continuing anyway");
    }

    spawn_prune_task(prune, config.prune_interval);

    // CORS configuration
    let allowed_origins: Vec<http::HeaderValue> = config
        .frontend_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(CSRF_HEADER),
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .route("/api/health", get(health).with_state(pool.clone()))
        .nest(
            "/api/auth",
            auth::auth_router(PgAuthRepository::new(pool.clone()), config.auth.clone()),
        )
        .nest(
            "/api/admin",
            auth::admin_router(PgAuthRepository::new(pool), config.auth),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!("Listening on {}", config.bind_addr);

    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodic cleanup; the first tick fires after one full interval.
fn spawn_prune_task(
    prune: PruneUseCase<PgAuthRepository, PgAuthRepository>,
    every: std::time::Duration,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            interval.tick().await;
            if let Err(e) = prune.execute().await {
                tracing::warn!(error = %e, "Periodic auth cleanup failed");
            }
        }
    });
}

async fn health(State(pool): State<PgPool>) -> AppResult<&'static str> {
    sqlx::query("SELECT 1").execute(&pool).await?;
    Ok("ok")
}

async fn not_found() -> AppError {
    AppError::not_found("No such endpoint")
}
