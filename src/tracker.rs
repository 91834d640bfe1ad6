/// Bundle confirmation tracking.
///
/// ```text
///            ┌──────────── every poll_interval ────────────┐
///            ▼                                             │
///   Submitted ──▶ getBundleStatuses ──entry──▶ verdict ──Pending──┘
///                      │ none / error                │
///                      ▼                             ├──▶ Confirmed
///            confirm_inflight_bundle ──▶ verdict ────┤
///                 (timeout = Pending)                └──▶ Failed
///
///   max_wait elapsed without a verdict ──▶ Unknown
/// ```
///
/// `Unknown` is not a failure: the bundle was accepted and may still have
/// landed, this client just stopped looking.
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::bundle::ConfirmationState;
use crate::config::TrackerConfig;
use crate::error::{RelayError, Result};
use crate::relay::RelayConnection;
use crate::status;

// ─── Session ────────────────────────────────────────────────────────────────

/// Bookkeeping for one bundle's polling lifecycle.
#[derive(Debug)]
pub struct TrackingSession {
    bundle_id: String,
    started: Instant,
    state: ConfirmationState,
    polls: u32,
    last_error: Option<String>,
}

impl TrackingSession {
    pub fn new(bundle_id: impl Into<String>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            started: Instant::now(),
            state: ConfirmationState::Submitted,
            polls: 0,
            last_error: None,
        }
    }

    /// Move to `next` unless a terminal state was already reached.
    pub fn advance(&mut self, next: ConfirmationState) -> &ConfirmationState {
        if self.state.is_terminal() {
            if next != self.state {
                debug!(bundle_id = %self.bundle_id, current = %self.state, ignored = %next, "state already terminal");
            }
            return &self.state;
        }
        if next != self.state {
            debug!(bundle_id = %self.bundle_id, from = %self.state, to = %next, "confirmation state changed");
        }
        self.state = next;
        &self.state
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn state(&self) -> &ConfirmationState {
        &self.state
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn note_error(&mut self, err: &RelayError) {
        self.last_error = Some(err.to_string());
    }

    fn finish(self) -> TrackingOutcome {
        TrackingOutcome {
            elapsed: self.elapsed(),
            bundle_id: self.bundle_id,
            state: self.state,
            polls: self.polls,
            last_error: self.last_error,
        }
    }
}

/// How a tracking session ended.
#[derive(Clone, Debug, Serialize)]
pub struct TrackingOutcome {
    pub bundle_id: String,
    /// `Confirmed`, `Failed` or `Unknown`.
    pub state: ConfirmationState,
    pub polls: u32,
    pub elapsed: Duration,
    /// Most recent non-fatal error seen while polling.
    pub last_error: Option<String>,
}

// ─── Active-session registry ────────────────────────────────────────────────

type ActiveSet = Arc<Mutex<HashSet<String>>>;

/// Holds a bundle id in the active set; releases it on drop.
struct ActiveSession {
    active: ActiveSet,
    bundle_id: String,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.bundle_id);
        }
    }
}

// ─── Tracker ────────────────────────────────────────────────────────────────

/// Polls the relay until a bundle is confirmed, fails, or the wait budget
/// runs out.  Cloning shares the connection and the active-session set.
#[derive(Clone)]
pub struct ConfirmationTracker {
    connection: Arc<RelayConnection>,
    config: TrackerConfig,
    active: ActiveSet,
}

impl ConfirmationTracker {
    /// Tracker using the connection's tracker settings.
    pub fn new(connection: Arc<RelayConnection>) -> Self {
        let config = connection.config().tracker.clone();
        Self::with_config(connection, config)
    }

    pub fn with_config(connection: Arc<RelayConnection>, config: TrackerConfig) -> Self {
        Self {
            connection,
            config,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn is_tracking(&self, bundle_id: &str) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(bundle_id))
            .unwrap_or(false)
    }

    pub fn active_sessions(&self) -> usize {
        self.active.lock().map(|active| active.len()).unwrap_or(0)
    }

    fn register(&self, bundle_id: &str) -> Result<ActiveSession> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| RelayError::SessionActive(bundle_id.to_string()))?;
        if !active.insert(bundle_id.to_string()) {
            return Err(RelayError::SessionActive(bundle_id.to_string()));
        }
        Ok(ActiveSession {
            active: Arc::clone(&self.active),
            bundle_id: bundle_id.to_string(),
        })
    }

    /// Track `bundle_id` to a terminal state.
    ///
    /// The first poll happens one `poll_interval` after the call.  Returns
    /// once the bundle is `Confirmed` or `Failed`, or with `Unknown` after
    /// `max_wait`.  Relay errors along the way are logged and retried on
    /// the next poll, never returned.
    ///
    /// # Errors
    /// [`RelayError::SessionActive`] if this bundle is already being tracked.
    pub async fn track(&self, bundle_id: &str) -> Result<TrackingOutcome> {
        let guard = self.register(bundle_id)?;
        Ok(self.run(guard).await)
    }

    /// Run [`track`](Self::track) on a background task.
    ///
    /// The session is registered before this returns, so a second call for
    /// the same id fails immediately.
    pub fn spawn_tracking(&self, bundle_id: &str) -> Result<JoinHandle<TrackingOutcome>> {
        let guard = self.register(bundle_id)?;
        let tracker = self.clone();
        Ok(tokio::spawn(async move { tracker.run(guard).await }))
    }

    #[instrument(skip_all, fields(bundle_id = %guard.bundle_id))]
    async fn run(&self, guard: ActiveSession) -> TrackingOutcome {
        let mut session = TrackingSession::new(guard.bundle_id.clone());
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            max_wait_ms = self.config.max_wait.as_millis() as u64,
            "tracking bundle"
        );

        let polling = self.poll_until_terminal(&mut session);
        if tokio::time::timeout(self.config.max_wait, polling).await.is_err() {
            session.advance(ConfirmationState::Unknown);
        }

        let outcome = session.finish();
        match &outcome.state {
            ConfirmationState::Confirmed { .. } => {
                info!(state = %outcome.state, polls = outcome.polls, "bundle confirmed")
            }
            ConfirmationState::Failed { .. } => {
                warn!(state = %outcome.state, polls = outcome.polls, "bundle failed")
            }
            _ => info!(
                polls = outcome.polls,
                last_error = outcome.last_error.as_deref().unwrap_or("none"),
                "wait budget exhausted; bundle outcome undetermined"
            ),
        }
        drop(guard);
        outcome
    }

    async fn poll_until_terminal(&self, session: &mut TrackingSession) {
        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            let next = self.poll_once(session).await;
            session.polls += 1;
            if session.advance(next).is_terminal() {
                return;
            }
        }
    }

    /// One poll: the detailed status first, the in-flight check only when
    /// the detailed status has nothing to say.
    async fn poll_once(&self, session: &mut TrackingSession) -> ConfirmationState {
        let engine = match self.connection.acquire().await {
            Ok(engine) => engine,
            Err(e) => {
                warn!(error = %e, "relay unavailable for status poll");
                session.note_error(&e);
                return ConfirmationState::Pending;
            }
        };
        let bundle_id = session.bundle_id().to_string();

        let primary = match engine.get_bundle_statuses(vec![bundle_id.clone()]).await {
            Ok(response) => {
                self.connection.record_success();
                status::parse_bundle_statuses(&response, &bundle_id)
            }
            Err(e) => {
                self.connection.record_failure(&e).await;
                Err(e)
            }
        };
        match primary {
            Ok(Some(entry)) => return entry.verdict(),
            Ok(None) => debug!("bundle not indexed yet, checking in-flight status"),
            Err(e) => {
                debug!(error = %e, "getBundleStatuses failed, checking in-flight status");
                session.note_error(&e);
            }
        }

        match engine
            .confirm_inflight_bundle(&bundle_id, self.config.inflight_timeout)
            .await
        {
            Ok(entry) => entry.verdict(),
            Err(e) if e.is_timeout() => {
                debug!("in-flight check timed out");
                ConfirmationState::Pending
            }
            Err(e) => {
                self.connection.record_failure(&e).await;
                debug!(error = %e, "in-flight check failed");
                session.note_error(&e);
                ConfirmationState::Pending
            }
        }
    }
}
