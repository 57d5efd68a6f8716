use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use std::sync::{Arc, Mutex};

use crate::{credentials, ownership, rules, scrape, settings, transactions};
use engine::{CancelFlag, Engine, Scraper};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub scraper: Arc<dyn Scraper>,
    /// Cancel handle of the run in flight, if any. One run at a time; the
    /// engine's audit guard is the actual arbiter, this is just the handle.
    pub active: Arc<Mutex<Option<CancelFlag>>>,
}

impl ServerState {
    pub fn new(engine: Engine, scraper: Arc<dyn Scraper>) -> Self {
        Self {
            engine: Arc::new(engine),
            scraper,
            active: Arc::new(Mutex::new(None)),
        }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/scrape", post(scrape::start))
        .route("/scrape/cancel", post(scrape::cancel))
        .route(
            "/scrape/events",
            get(scrape::list_events).delete(scrape::prune_events),
        )
        .route(
            "/credentials",
            get(credentials::list).post(credentials::create),
        )
        .route("/credentials/{id}", delete(credentials::remove))
        .route("/transactions", get(transactions::list))
        .route(
            "/transactions/{vendor}/{identifier}/category",
            patch(transactions::set_category),
        )
        .route(
            "/transactions/{vendor}/{identifier}",
            delete(transactions::remove),
        )
        .route("/transactions/wipe", post(transactions::wipe))
        .route("/categories/rename", post(transactions::rename_category))
        .route("/rules", get(rules::list).post(rules::create))
        .route(
            "/rules/{id}",
            patch(rules::update).delete(rules::remove),
        )
        .route("/mappings", get(rules::list_mappings).put(rules::set_mapping))
        .route("/mappings/{source}", delete(rules::remove_mapping))
        .route("/settings", get(settings::list))
        .route(
            "/settings/{key}",
            get(settings::get_one).put(settings::set_one),
        )
        .route("/ownership", get(ownership::list))
        .route(
            "/ownership/{id}",
            patch(ownership::relink).delete(ownership::remove),
        )
        .with_state(state)
}

pub async fn run(engine: Engine, scraper: Arc<dyn Scraper>) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, scraper, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    scraper: Arc<dyn Scraper>,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState::new(engine, scraper);

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    scraper: Arc<dyn Scraper>,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, scraper, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
