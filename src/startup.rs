use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{SecureTokenGenerator, TokenGenerator};
use crate::configuration::{DatabaseSettings, RotationSettings, SessionStoreKind, Settings};
use crate::error::{AppError, ConfigError, StoreError};
use crate::logger::LoggerMiddleware;
use crate::routes::{health_check, refresh};
use crate::session::{MemorySessionStore, PgSessionStore, SessionStore};

pub const REFRESH_PATH: &str = "/_matrix/client/v3/refresh";

pub fn run(
    listener: TcpListener,
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn TokenGenerator>,
    rotation: RotationSettings,
) -> Result<Server, std::io::Error> {
    let store = web::Data::from(store);
    let generator = web::Data::from(generator);
    let rotation = web::Data::new(rotation);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(store.clone())
            .app_data(generator.clone())
            .app_data(rotation.clone())

            .route("/health_check", web::get().to(health_check))
            // All verbs reach the handler; it answers non-POST itself
            .service(web::resource(REFRESH_PATH).route(web::route().to(refresh)))
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Reject settings the service cannot run with
pub fn validate_settings(settings: &Settings) -> Result<(), AppError> {
    if settings.rotation.token_bytes < 16 {
        return Err(ConfigError::InvalidValue(format!(
            "rotation.token_bytes must be at least 16, got {}",
            settings.rotation.token_bytes
        ))
        .into());
    }
    if settings.rotation.store_timeout_ms == 0 {
        return Err(ConfigError::InvalidValue(
            "rotation.store_timeout_ms must be positive".to_string(),
        )
        .into());
    }
    Ok(())
}

/// Build the session store selected by `application.session_store`
pub async fn build_session_store(settings: &Settings) -> Result<Arc<dyn SessionStore>, AppError> {
    match settings.application.session_store {
        SessionStoreKind::Memory => {
            tracing::warn!("Using in-memory session store; sessions are lost on restart");
            Ok(Arc::new(MemorySessionStore::new()))
        }
        SessionStoreKind::Postgres => {
            let store = connect_postgres(&settings.database, &settings.rotation).await?;
            Ok(Arc::new(store))
        }
    }
}

async fn connect_postgres(
    database: &DatabaseSettings,
    rotation: &RotationSettings,
) -> Result<PgSessionStore, AppError> {
    tracing::info!(host = %database.host, database = %database.database_name, "Connecting to Postgres");

    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .connect(&database.connection_string())
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreError::Query(format!("migration failed: {}", e)))?;

    tracing::info!("Database connection pool created and migrated");
    Ok(PgSessionStore::new(pool).with_statement_timeout(rotation.store_timeout()))
}

pub fn default_token_generator(rotation: &RotationSettings) -> Arc<dyn TokenGenerator> {
    Arc::new(SecureTokenGenerator::new(rotation.token_bytes))
}
