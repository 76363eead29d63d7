use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::TryOnApi;
use crate::config::ControllerConfig;
use crate::error::TryOnError;
use crate::timer::PollTimer;
use crate::types::{GenerationRequest, SessionSnapshot, TryOnStatus};

/// Error text recorded when the poll ceiling is reached.
pub const TIMEOUT_MESSAGE: &str = "Generation timed out. Please try again.";

const STATUS_CHECK_FAILED: &str = "Failed to check generation status";
const SESSION_NOT_FOUND: &str = "Session not found";
const GENERATION_FAILED: &str = "Generation failed. Please try again.";
const GENERATION_CANCELLED: &str = "Generation was cancelled";

/// Why the current attempt ended unsuccessfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The start call failed; no session id was assigned.
    StartFailed,
    /// A status check failed at the transport or parsing level.
    PollFailed,
    /// The status endpoint no longer knows the session.
    SessionNotFound,
    /// The server reported `failed` or `cancelled`.
    ServerReported,
    /// The poll ceiling was reached while the session was still active.
    TimedOut,
    /// A retry was requested before any generation was started.
    NoPreviousRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Read-only view of a controller's state, published after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    pub session_id: Option<String>,
    pub snapshot: Option<SessionSnapshot>,
    /// True only while the start call is outstanding.
    pub is_loading: bool,
    /// True from an accepted start until a terminal state or an explicit stop.
    pub is_generating: bool,
    pub progress_percent: u8,
    pub estimated_seconds_remaining: Option<u32>,
    /// When the current estimate was received.
    pub estimate_observed_at: Option<Instant>,
    /// Status checks completed for the current session.
    pub poll_attempts: u32,
    pub failure: Option<Failure>,
    pub last_request: Option<GenerationRequest>,
}

impl SessionView {
    pub fn error(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    pub fn status(&self) -> Option<TryOnStatus> {
        self.snapshot.as_ref().map(|s| s.status)
    }

    pub fn result_url(&self) -> Option<&str> {
        self.snapshot.as_ref().and_then(|s| s.result_url.as_deref())
    }

    /// Nothing is outstanding: no start call, no poll chain.
    pub fn is_settled(&self) -> bool {
        !self.is_loading && !self.is_generating
    }

    /// Countdown derived from the last server estimate, saturating at zero.
    pub fn estimated_remaining(&self, now: Instant) -> Option<Duration> {
        let secs = self.estimated_seconds_remaining?;
        let observed = self.estimate_observed_at?;
        Some(Duration::from_secs(secs as u64).saturating_sub(now.saturating_duration_since(observed)))
    }
}

struct ControllerState {
    view: SessionView,
    /// Bumped whenever the current poll chain is abandoned. Responses
    /// carrying an older value are dropped.
    generation: u64,
    timer: Option<PollTimer>,
}

impl ControllerState {
    /// Abandon whatever chain is running and return the new generation.
    fn invalidate(&mut self) -> u64 {
        self.generation += 1;
        self.cancel_timer();
        self.generation
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    fn finish(&mut self, failure: Option<Failure>) {
        self.cancel_timer();
        self.view.is_generating = false;
        self.view.failure = failure;
    }
}

struct Shared<A> {
    api: A,
    config: ControllerConfig,
    state: Mutex<ControllerState>,
    updates: watch::Sender<SessionView>,
}

impl<A: TryOnApi> Shared<A> {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ControllerState) {
        self.updates.send_replace(state.view.clone());
    }

    /// Schedule one status check. The task only holds a weak reference so
    /// an abandoned controller does not keep polling.
    fn schedule_poll(self: &Arc<Self>, generation: u64, session_id: String) -> PollTimer {
        let weak: Weak<Self> = Arc::downgrade(self);
        PollTimer::schedule(self.config.poll_interval, async move {
            if let Some(shared) = weak.upgrade() {
                shared.poll_once(generation, session_id).await;
            }
        })
    }

    async fn poll_once(self: Arc<Self>, generation: u64, session_id: String) {
        let result = self.api.get_status(&session_id).await;

        let mut state = self.lock();
        if state.generation != generation {
            debug!(%session_id, generation, "discarding status from an abandoned poll chain");
            return;
        }
        // This tick has fired; detach its handle so finishing cannot abort it.
        drop(state.timer.take());
        state.view.poll_attempts += 1;
        let attempt = state.view.poll_attempts;

        match result {
            Ok(snapshot) => {
                let status = snapshot.status;
                let server_error = snapshot
                    .error_message
                    .clone()
                    .filter(|m| !m.trim().is_empty());
                debug!(%session_id, attempt, %status, progress = snapshot.progress_percent, "status received");

                state.view.progress_percent = snapshot.progress_percent;
                state.view.estimated_seconds_remaining = snapshot.estimated_seconds_remaining;
                state.view.estimate_observed_at =
                    snapshot.estimated_seconds_remaining.map(|_| Instant::now());
                state.view.failure = None;
                state.view.snapshot = Some(snapshot);

                match status {
                    TryOnStatus::Completed => {
                        info!(%session_id, attempt, "generation completed");
                        state.finish(None);
                    }
                    TryOnStatus::Failed => {
                        let message = server_error.unwrap_or_else(|| GENERATION_FAILED.to_string());
                        warn!(%session_id, %message, "generation failed");
                        state.finish(Some(Failure::new(FailureKind::ServerReported, message)));
                    }
                    TryOnStatus::Cancelled => {
                        let message =
                            server_error.unwrap_or_else(|| GENERATION_CANCELLED.to_string());
                        warn!(%session_id, %message, "generation cancelled by server");
                        state.finish(Some(Failure::new(FailureKind::ServerReported, message)));
                    }
                    TryOnStatus::Pending | TryOnStatus::InProgress
                        if attempt >= self.config.max_poll_attempts =>
                    {
                        warn!(%session_id, attempt, "poll ceiling reached, giving up");
                        state.finish(Some(Failure::new(FailureKind::TimedOut, TIMEOUT_MESSAGE)));
                    }
                    TryOnStatus::Pending | TryOnStatus::InProgress => {
                        let timer = self.schedule_poll(generation, session_id);
                        state.timer = Some(timer);
                    }
                }
            }
            Err(e) => {
                warn!(%session_id, attempt, error = %e, "status check failed");
                let failure = if e.is_not_found() {
                    Failure::new(FailureKind::SessionNotFound, SESSION_NOT_FOUND)
                } else {
                    Failure::new(FailureKind::PollFailed, STATUS_CHECK_FAILED)
                };
                state.finish(Some(failure));
            }
        }

        self.publish(&state);
    }
}

impl<A> Drop for Shared<A> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
    }
}

/// Drives one try-on generation session at a time: starts the remote job,
/// polls its status one request at a time, and publishes a [`SessionView`].
///
/// Public operations never return errors; outcomes are recorded in the
/// view's [`failure`](SessionView::failure). Clones share the same session.
/// The poll chain stops when the last clone is dropped.
///
/// Must be used inside a tokio runtime.
///
/// # Example
/// ```no_run
/// use tryon_session::{GenerationRequest, SessionController, TryOnClient};
///
/// # async fn example() {
/// let controller = SessionController::new(TryOnClient::new("https://wardrobe.example.com"));
/// controller.start_generation(GenerationRequest::new("outfit-42")).await;
///
/// let view = controller.settled().await;
/// match view.result_url() {
///     Some(url) => println!("Try-on ready: {}", url),
///     None => println!("No result: {:?}", view.error()),
/// }
/// # }
/// ```
pub struct SessionController<A: TryOnApi> {
    shared: Arc<Shared<A>>,
}

impl<A: TryOnApi> Clone for SessionController<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: TryOnApi> std::fmt::Debug for SessionController<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .finish()
    }
}

impl<A: TryOnApi> SessionController<A> {
    /// Create a controller with the default [`ControllerConfig`].
    pub fn new(api: A) -> Self {
        Self::with_config(api, ControllerConfig::default())
    }

    pub fn with_config(api: A, config: ControllerConfig) -> Self {
        let (updates, _) = watch::channel(SessionView::default());
        Self {
            shared: Arc::new(Shared {
                api,
                config,
                state: Mutex::new(ControllerState {
                    view: SessionView::default(),
                    generation: 0,
                    timer: None,
                }),
                updates,
            }),
        }
    }

    /// The injected API client, for history, deletion and availability checks.
    pub fn api(&self) -> &A {
        &self.shared.api
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    /// Current state.
    pub fn state(&self) -> SessionView {
        self.shared.lock().view.clone()
    }

    /// Receive every state change. Intermediate values may be skipped.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.shared.updates.subscribe()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.shared.lock().view.last_request.clone()
    }

    /// Wait until neither a start call nor a poll chain is outstanding.
    pub async fn settled(&self) -> SessionView {
        let mut rx = self.subscribe();
        let view = match rx.wait_for(SessionView::is_settled).await {
            Ok(view) => view.clone(),
            Err(_) => self.state(),
        };
        view
    }

    /// Start a new generation, abandoning any session already in progress.
    ///
    /// Resolves once the start call settles. On success the first status
    /// check is scheduled after the poll interval. If another start begins
    /// before this one's response arrives, the response is discarded.
    pub async fn start_generation(&self, request: GenerationRequest) {
        let generation = {
            let mut state = self.shared.lock();
            let generation = state.invalidate();
            state.view = SessionView {
                is_loading: true,
                last_request: Some(request.clone()),
                ..SessionView::default()
            };
            self.shared.publish(&state);
            generation
        };

        info!(outfit_id = %request.outfit_id, generation, "starting try-on generation");
        let result = self.shared.api.start(&request).await;

        let mut state = self.shared.lock();
        if state.generation != generation {
            debug!(generation, "discarding start response for a superseded request");
            return;
        }
        state.view.is_loading = false;

        match result {
            Ok(start) => {
                info!(session_id = %start.session_id, status = %start.status, "generation accepted");
                state.view.is_generating = true;
                state.view.poll_attempts = 0;
                state.view.session_id = Some(start.session_id.clone());
                state.view.snapshot = Some(SessionSnapshot {
                    session_id: start.session_id.clone(),
                    status: start.status,
                    progress_percent: 0,
                    result_url: None,
                    description: None,
                    error_message: None,
                    created_at: None,
                    completed_at: None,
                    estimated_seconds_remaining: None,
                });
                state.cancel_timer();
                state.timer = Some(self.shared.schedule_poll(generation, start.session_id));
            }
            Err(e) => {
                warn!(outfit_id = %request.outfit_id, error = %e, "failed to start generation");
                state.view.is_generating = false;
                state.view.failure = Some(Failure::new(
                    FailureKind::StartFailed,
                    format!("Failed to start generation: {}", e),
                ));
            }
        }

        self.shared.publish(&state);
    }

    /// Start again with the most recently submitted request.
    pub async fn retry_generation(&self) {
        let request = self.last_request();
        match request {
            Some(request) => self.start_generation(request).await,
            None => {
                let mut state = self.shared.lock();
                state.view.failure = Some(Failure::new(
                    FailureKind::NoPreviousRequest,
                    TryOnError::NoPreviousRequest.to_string(),
                ));
                self.shared.publish(&state);
            }
        }
    }

    /// Cancel any scheduled status check and stop generating.
    ///
    /// Responses still in flight are discarded when they arrive. Safe to
    /// call repeatedly or with no active session.
    pub fn stop_polling(&self) {
        let mut state = self.shared.lock();
        let generation = state.invalidate();
        state.view.is_generating = false;
        state.view.is_loading = false;
        debug!(generation, "polling stopped");
        self.shared.publish(&state);
    }

    /// Stop polling and forget everything, including the retry request.
    pub fn reset_state(&self) {
        let mut state = self.shared.lock();
        state.invalidate();
        state.view = SessionView::default();
        self.shared.publish(&state);
    }
}
