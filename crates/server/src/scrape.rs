//! Scrape run endpoints: start (SSE progress stream), cancel, audit log.

use std::convert::Infallible;

use api_types::scrape::{CancelResponse, ScrapeEventView, ScrapeEventsResponse, ScrapeStart};
use axum::{
    Json,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt, wrappers::UnboundedReceiverStream};

use crate::{ServerError, server::ServerState};
use engine::{CancelFlag, EngineError, ProgressReporter, ScrapeEvent, ScrapeRunCmd};

/// Start a scrape and stream its progress as server-sent events.
///
/// The run itself is detached: dropping the SSE connection stops the
/// stream, never the run. Cancellation goes through `/scrape/cancel`.
pub async fn start(
    State(state): State<ServerState>,
    Json(payload): Json<ScrapeStart>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
    let (reporter, rx) = ProgressReporter::channel();
    let cancel = CancelFlag::new();
    {
        let mut slot = state
            .active
            .lock()
            .map_err(|_| ServerError::Generic("cancel registry unavailable".to_string()))?;
        // Claim the cancel slot only when it is free; overwriting it would
        // strand the in-flight run without a cancel handle.
        if slot.is_some() {
            return Err(ServerError::Engine(EngineError::Concurrency(
                "a run started from this server is still in flight".to_string(),
            )));
        }
        *slot = Some(cancel.clone());
    }

    let cmd = ScrapeRunCmd {
        credential_id: payload.credential_id,
        start_date: payload.start_date,
        triggered_by: "api".to_string(),
        show_browser: payload.show_browser.unwrap_or(false),
        log_requests: payload.log_requests.unwrap_or(false),
        retry_count: 0,
    };

    let engine = state.engine.clone();
    let scraper = state.scraper.clone();
    let active = state.active.clone();
    tokio::spawn(async move {
        if let Err(err) = engine
            .run_scrape(scraper.as_ref(), cmd, &reporter, &cancel)
            .await
        {
            tracing::warn!("scrape run ended with error: {err}");
        }
        if let Ok(mut slot) = active.lock() {
            // Release only our own handle, in case the slot changed hands.
            if slot.as_ref().is_some_and(|flag| flag.same_run(&cancel)) {
                *slot = None;
            }
        }
    });

    let stream = UnboundedReceiverStream::new(rx).map(|message| {
        let event = Event::default().event(message.kind());
        Ok(match event.json_data(message.payload()) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!("failed to serialize progress event: {err}");
                Event::default().event("error").data("serialization failed")
            }
        })
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn cancel(
    State(state): State<ServerState>,
) -> Result<Json<CancelResponse>, ServerError> {
    let slot = state
        .active
        .lock()
        .map_err(|_| ServerError::Generic("cancel registry unavailable".to_string()))?;
    match slot.as_ref() {
        Some(flag) => {
            flag.cancel();
            Ok(Json(CancelResponse { cancelled: true }))
        }
        None => Ok(Json(CancelResponse { cancelled: false })),
    }
}

#[derive(Deserialize)]
pub struct EventsQuery {
    limit: Option<u64>,
}

pub async fn list_events(
    State(state): State<ServerState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<ScrapeEventsResponse>, ServerError> {
    let events = state
        .engine
        .list_scrape_events(query.limit.unwrap_or(50))
        .await?;
    Ok(Json(ScrapeEventsResponse {
        events: events.into_iter().map(view).collect(),
    }))
}

#[derive(Deserialize)]
pub struct PruneQuery {
    keep_days: Option<i64>,
}

pub async fn prune_events(
    State(state): State<ServerState>,
    Query(query): Query<PruneQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let removed = state
        .engine
        .prune_scrape_events(query.keep_days.unwrap_or(90))
        .await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

fn view(event: ScrapeEvent) -> ScrapeEventView {
    let report = event
        .report_json
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok());
    ScrapeEventView {
        id: event.id,
        triggered_by: event.triggered_by,
        vendor: event.vendor.as_str().to_string(),
        start_date: event.start_date,
        status: event.status.as_str().to_string(),
        message: event.message,
        report,
        duration_seconds: event.duration_seconds,
        retry_count: event.retry_count,
        created_at: event.created_at,
    }
}
