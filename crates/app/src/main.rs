use std::sync::Arc;
use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "heshbon={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    if let Some(server) = settings.server {
        let db = match parse_database(&server.database).await {
            Ok(db) => db,
            Err(err) => {
                tracing::error!("failed to initialize database: {err}");
                return Ok(());
            }
        };

        let keep_days = server.audit_keep_days.unwrap_or(90);
        let janitor_db = db.clone();
        tasks.spawn(async move {
            let engine = match engine::Engine::builder().database(janitor_db).build().await {
                Ok(engine) => engine,
                Err(err) => {
                    tracing::error!("failed to build janitor engine: {err}");
                    return;
                }
            };
            let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
            loop {
                interval.tick().await;
                if let Err(err) = engine.prune_scrape_events(keep_days).await {
                    tracing::warn!("failed to prune scrape events: {err}");
                }
            }
        });

        tasks.spawn(async move {
            tracing::info!("Found server settings...");
            let engine = match engine::Engine::builder().database(db).build().await {
                Ok(engine) => engine,
                Err(err) => {
                    tracing::error!("failed to build engine from database: {err}");
                    return;
                }
            };
            let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
            let addr = format!("{}:{}", bind, server.port);
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!("failed to bind server listener: {err}");
                    return;
                }
            };
            // No scraper bridge is wired in yet; runs fail fast with a clear
            // message until one is configured.
            let scraper = Arc::new(engine::ScraperUnavailable);
            if let Err(err) = server::run_with_listener(engine, scraper, listener).await {
                tracing::error!("server failed: {err}");
            }
        });
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
