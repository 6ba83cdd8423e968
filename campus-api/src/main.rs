use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use campus_api::{app, state::AuthSettings, AppState};
use campus_store::{
    cart_repo::StoreCartRepository, catalog_repo::StoreCourseRepository,
    enrollment_repo::StoreEnrollmentRepository, order_repo::StoreOrderRepository,
    student_repo::StoreStudentRepository, DbClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "campus_api=debug,campus_order=debug,campus_store=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = campus_store::app_config::Config::load().context("failed to load config")?;
    tracing::info!("Starting Campus API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("failed to run migrations")?;

    let pool = db.pool.clone();
    let app_state = AppState::new(
        Arc::new(StoreCourseRepository::new(pool.clone())),
        Arc::new(StoreCartRepository::new(pool.clone())),
        Arc::new(StoreOrderRepository::new(pool.clone())),
        Arc::new(StoreEnrollmentRepository::new(pool.clone())),
        Arc::new(StoreStudentRepository::new(pool)),
        AuthSettings {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        config.fulfillment.max_code_attempts,
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    axum::serve(listener, app).await.context("server exited")?;

    Ok(())
}
