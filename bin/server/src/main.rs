use recipes_server::{
    app,
    auth::{
        AppState, GoogleOAuthClient, NonceGuard, SessionManager,
        db::{PgIdentityRegistry, PgSessionStore},
        session::spawn_cleanup,
    },
    config::ServerConfig,
};
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let cookie_key = match config.session.signing_key() {
        Ok(key) => key,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let oauth_client = match GoogleOAuthClient::new(&config.oauth) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Invalid OAuth configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = match PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            return ExitCode::FAILURE;
        }
    };

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        if let Err(e) = sqlx::migrate!("./migrations").run(&db_pool).await {
            tracing::error!(error = %e, "Failed to run migrations");
            return ExitCode::FAILURE;
        }
    }

    // Expired sessions are swept once now and then periodically
    let session_store = Arc::new(PgSessionStore::new(db_pool.clone()));
    spawn_cleanup(
        session_store.clone(),
        Duration::from_secs(config.session.cleanup_interval_seconds),
    );

    let state = AppState::new(
        Arc::new(PgIdentityRegistry::new(db_pool)),
        SessionManager::new(session_store, &config.session),
        Arc::new(oauth_client),
        NonceGuard::new(config.session.secure_cookies),
        cookie_key,
    );

    let listener = match tokio::net::TcpListener::bind(&config.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, address = %config.bind_address, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("listening on http://{}", config.bind_address);

    if let Err(e) = axum::serve(listener, app::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
