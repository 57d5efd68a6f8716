//! Progress stream for a scrape run.
//!
//! The orchestrator and the scraper callback both report through a
//! [`ProgressReporter`]; the server side drains the paired receiver into
//! an SSE stream. Percent is clamped monotonic and exactly one terminal
//! message (`error` or `complete`) is emitted per run.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::scraper::ScraperStep;

/// Pipeline phases, each owning a fixed percent range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Initialization,
    Authentication,
    DataFetching,
    Processing,
    Saving,
    Complete,
}

impl ProgressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::Authentication => "authentication",
            Self::DataFetching => "data_fetching",
            Self::Processing => "processing",
            Self::Saving => "saving",
            Self::Complete => "complete",
        }
    }

    /// Inclusive percent range the phase is allowed to report within.
    pub fn range(&self) -> (u8, u8) {
        match self {
            Self::Initialization => (0, 15),
            Self::Authentication => (15, 35),
            Self::DataFetching => (35, 60),
            Self::Processing => (60, 80),
            Self::Saving => (80, 98),
            Self::Complete => (100, 100),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub phase: ProgressPhase,
    pub percent: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Named scraper step behind this update, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Cumulative list of named scraper steps seen so far.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completed_steps: Vec<String>,
}

/// One message on the run's stream, tagged by event kind on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressMessage {
    Progress(ProgressUpdate),
    /// Raw scraper diagnostic, forwarded untranslated.
    Network(serde_json::Value),
    Error {
        message: String,
        hint: Option<String>,
    },
    Complete(serde_json::Value),
}

impl ProgressMessage {
    /// SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Network(_) => "network",
            Self::Error { .. } => "error",
            Self::Complete(_) => "complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Complete(_))
    }

    /// JSON body for the SSE data field.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Progress(update) => {
                serde_json::to_value(update).unwrap_or(serde_json::Value::Null)
            }
            Self::Network(value) => value.clone(),
            Self::Error { message, hint } => serde_json::json!({
                "message": message,
                "hint": hint,
            }),
            Self::Complete(summary) => summary.clone(),
        }
    }
}

struct ReporterState {
    highest_percent: u8,
    terminated: bool,
    completed_steps: Vec<String>,
}

/// Shared handle for emitting progress from both async orchestrator code
/// and the sync scraper callback. Send failures (receiver dropped, client
/// gone) are ignored; the run keeps going.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressMessage>,
    state: Arc<Mutex<ReporterState>>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = Self {
            tx,
            state: Arc::new(Mutex::new(ReporterState {
                highest_percent: 0,
                terminated: false,
                completed_steps: Vec::new(),
            })),
        };
        (reporter, rx)
    }

    /// Reporter whose output goes nowhere, for headless runs.
    pub fn detached() -> Self {
        Self::channel().0
    }

    pub fn progress(&self, phase: ProgressPhase, percent: u8, message: impl Into<String>) {
        self.progress_with(phase, percent, message, None);
    }

    pub fn progress_with(
        &self,
        phase: ProgressPhase,
        percent: u8,
        message: impl Into<String>,
        success: Option<bool>,
    ) {
        self.emit(phase, percent, message.into(), success, None);
    }

    fn emit(
        &self,
        phase: ProgressPhase,
        percent: u8,
        message: String,
        success: Option<bool>,
        step: Option<String>,
    ) {
        let (percent, completed_steps) = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if state.terminated {
                return;
            }
            // Never report backwards even if phases interleave.
            state.highest_percent = state.highest_percent.max(percent.min(100));
            (state.highest_percent, state.completed_steps.clone())
        };
        let _ = self.tx.send(ProgressMessage::Progress(ProgressUpdate {
            phase,
            percent,
            message,
            success,
            step,
            completed_steps,
        }));
    }

    pub fn network(&self, diagnostic: serde_json::Value) {
        if self.is_terminated() {
            return;
        }
        let _ = self.tx.send(ProgressMessage::Network(diagnostic));
    }

    pub fn error(&self, message: impl Into<String>, hint: Option<String>) {
        if self.terminate() {
            let _ = self.tx.send(ProgressMessage::Error {
                message: message.into(),
                hint,
            });
        }
    }

    pub fn complete(&self, summary: serde_json::Value) {
        if self.terminate() {
            self.progress_terminal();
            let _ = self.tx.send(ProgressMessage::Complete(summary));
        }
    }

    fn progress_terminal(&self) {
        let completed_steps = self
            .state
            .lock()
            .map(|state| state.completed_steps.clone())
            .unwrap_or_default();
        let _ = self.tx.send(ProgressMessage::Progress(ProgressUpdate {
            phase: ProgressPhase::Complete,
            percent: 100,
            message: "done".to_string(),
            success: Some(true),
            step: None,
            completed_steps,
        }));
    }

    /// Marks the stream terminated; true only for the first caller.
    fn terminate(&self) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.terminated {
            return false;
        }
        state.terminated = true;
        true
    }

    fn is_terminated(&self) -> bool {
        self.state.lock().map(|s| s.terminated).unwrap_or(true)
    }

    /// Translate a scraper step event into the run's progress scale.
    pub fn scraper_step(&self, step: ScraperStep) {
        if let Ok(mut state) = self.state.lock() {
            state.completed_steps.push(step.as_str().to_string());
        }
        let (phase, percent, message, success) = match step {
            ScraperStep::Initializing => (
                ProgressPhase::Initialization,
                10,
                "starting scraper session",
                None,
            ),
            ScraperStep::LoginStarted => {
                (ProgressPhase::Authentication, 18, "logging in", None)
            }
            ScraperStep::LoginSuccess => (
                ProgressPhase::Authentication,
                35,
                "login succeeded",
                Some(true),
            ),
            ScraperStep::LoginFailed => (
                ProgressPhase::Authentication,
                35,
                "login failed",
                Some(false),
            ),
            ScraperStep::FetchingTransactions => (
                ProgressPhase::DataFetching,
                40,
                "fetching transactions",
                None,
            ),
            ScraperStep::AccountDetailsReceived => (
                ProgressPhase::DataFetching,
                55,
                "account details received",
                None,
            ),
            ScraperStep::ProcessingAccount => {
                (ProgressPhase::Processing, 65, "processing account", None)
            }
            ScraperStep::EndScraping => {
                (ProgressPhase::Processing, 78, "scraper session finished", None)
            }
        };
        self.emit(
            phase,
            percent,
            message.to_string(),
            success,
            Some(step.as_str().to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressMessage>) -> Vec<ProgressMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }

    #[test]
    fn percent_never_decreases() {
        let (reporter, mut rx) = ProgressReporter::channel();
        reporter.progress(ProgressPhase::DataFetching, 50, "fetching");
        reporter.progress(ProgressPhase::Authentication, 20, "late auth event");
        let messages = drain(&mut rx);
        let percents: Vec<u8> = messages
            .iter()
            .filter_map(|m| match m {
                ProgressMessage::Progress(u) => Some(u.percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![50, 50]);
    }

    #[test]
    fn only_first_terminal_message_is_emitted() {
        let (reporter, mut rx) = ProgressReporter::channel();
        reporter.error("boom", None);
        reporter.complete(serde_json::json!({"savedTransactions": 1}));
        reporter.error("boom again", None);
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind(), "error");
    }

    #[test]
    fn complete_emits_hundred_percent_then_summary() {
        let (reporter, mut rx) = ProgressReporter::channel();
        reporter.progress(ProgressPhase::Saving, 90, "saving");
        reporter.complete(serde_json::json!({"savedTransactions": 3}));
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 3);
        match &messages[1] {
            ProgressMessage::Progress(update) => {
                assert_eq!(update.percent, 100);
                assert_eq!(update.phase, ProgressPhase::Complete);
            }
            other => panic!("expected progress, got {other:?}"),
        }
        assert_eq!(messages[2].kind(), "complete");
    }

    #[test]
    fn nothing_is_emitted_after_terminal() {
        let (reporter, mut rx) = ProgressReporter::channel();
        reporter.error("boom", Some("check credentials".to_string()));
        reporter.progress(ProgressPhase::Saving, 90, "late");
        reporter.network(serde_json::json!({"url": "https://x"}));
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (reporter, rx) = ProgressReporter::channel();
        drop(rx);
        reporter.progress(ProgressPhase::Initialization, 5, "still fine");
        reporter.complete(serde_json::json!({}));
    }

    #[test]
    fn completed_steps_accumulate_across_updates() {
        let (reporter, mut rx) = ProgressReporter::channel();
        reporter.scraper_step(ScraperStep::Initializing);
        reporter.scraper_step(ScraperStep::LoginStarted);
        reporter.progress(ProgressPhase::DataFetching, 40, "fetching");
        let messages = drain(&mut rx);
        let last = match messages.last() {
            Some(ProgressMessage::Progress(update)) => update,
            other => panic!("expected progress, got {other:?}"),
        };
        assert_eq!(last.completed_steps, vec!["initializing", "loginStarted"]);
    }

    #[test]
    fn login_steps_map_into_authentication_range() {
        let (reporter, mut rx) = ProgressReporter::channel();
        reporter.scraper_step(ScraperStep::LoginStarted);
        reporter.scraper_step(ScraperStep::LoginSuccess);
        let messages = drain(&mut rx);
        let (lo, hi) = ProgressPhase::Authentication.range();
        for message in &messages {
            if let ProgressMessage::Progress(update) = message {
                assert!(update.percent >= lo && update.percent <= hi);
                assert_eq!(update.phase, ProgressPhase::Authentication);
            }
        }
        match &messages[1] {
            ProgressMessage::Progress(update) => assert_eq!(update.success, Some(true)),
            other => panic!("expected progress, got {other:?}"),
        }
    }
}
