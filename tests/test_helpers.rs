use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tryon_session::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(GenerationRequest),
    Status(String),
    List(Option<u32>),
    Delete(String),
    Availability,
}

struct FakeState {
    calls: Vec<Call>,
    start_results: VecDeque<Result<StartResponse>>,
    status_results: VecDeque<Result<SessionSnapshot>>,
    default_status: TryOnStatus,
    start_latency: Duration,
    status_latency: Duration,
    in_flight: u32,
    max_in_flight: u32,
    sessions_started: u32,
}

/// Scripted in-memory [`TryOnApi`]. Status results are consumed in the
/// order requests are issued; once the script runs out every check
/// returns `default_status`.
#[derive(Clone)]
pub struct FakeApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                calls: Vec::new(),
                start_results: VecDeque::new(),
                status_results: VecDeque::new(),
                default_status: TryOnStatus::InProgress,
                start_latency: Duration::ZERO,
                status_latency: Duration::ZERO,
                in_flight: 0,
                max_in_flight: 0,
                sessions_started: 0,
            })),
        }
    }

    pub fn with_start_latency(self, latency: Duration) -> Self {
        self.state.lock().unwrap().start_latency = latency;
        self
    }

    pub fn with_status_latency(self, latency: Duration) -> Self {
        self.state.lock().unwrap().status_latency = latency;
        self
    }

    /// Queue a successful start that assigns `session_id`.
    pub fn accept(&self, session_id: &str) {
        self.push_start(Ok(StartResponse {
            session_id: session_id.to_string(),
            status: TryOnStatus::Pending,
            message: "Try-on image generation started".to_string(),
            poll_url: None,
        }));
    }

    pub fn push_start(&self, result: Result<StartResponse>) {
        self.state.lock().unwrap().start_results.push_back(result);
    }

    pub fn push_status(&self, result: Result<SessionSnapshot>) {
        self.state.lock().unwrap().status_results.push_back(result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn start_requests(&self) -> Vec<GenerationRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Start(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn status_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Status(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn max_in_flight(&self) -> u32 {
        self.state.lock().unwrap().max_in_flight
    }
}

pub fn snapshot(session_id: &str, status: TryOnStatus, progress: u8) -> SessionSnapshot {
    SessionSnapshot {
        session_id: session_id.to_string(),
        status,
        progress_percent: progress,
        result_url: (status == TryOnStatus::Completed)
            .then(|| format!("https://cdn.example.com/{}.png", session_id)),
        description: None,
        error_message: None,
        created_at: None,
        completed_at: None,
        estimated_seconds_remaining: None,
    }
}

impl TryOnApi for FakeApi {
    async fn start(&self, request: &GenerationRequest) -> Result<StartResponse> {
        let (latency, result) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Start(request.clone()));
            state.sessions_started += 1;
            let fallback = format!("session-{}", state.sessions_started);
            let result = state.start_results.pop_front().unwrap_or_else(|| {
                Ok(StartResponse {
                    session_id: fallback,
                    status: TryOnStatus::Pending,
                    message: String::new(),
                    poll_url: None,
                })
            });
            (state.start_latency, result)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        result
    }

    async fn get_status(&self, session_id: &str) -> Result<SessionSnapshot> {
        let (latency, result) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Status(session_id.to_string()));
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            let default_status = state.default_status;
            let result = state
                .status_results
                .pop_front()
                .unwrap_or_else(|| Ok(snapshot(session_id, default_status, 50)));
            (state.status_latency, result)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.state.lock().unwrap().in_flight -= 1;
        result
    }

    async fn list_sessions(&self, limit: Option<u32>) -> Result<SessionHistory> {
        self.state.lock().unwrap().calls.push(Call::List(limit));
        Ok(SessionHistory {
            sessions: Vec::new(),
            total: 0,
        })
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(Call::Delete(session_id.to_string()));
        Ok(())
    }

    async fn check_service_availability(&self) -> Result<ServiceAvailability> {
        self.state.lock().unwrap().calls.push(Call::Availability);
        Ok(ServiceAvailability {
            available: true,
            ..ServiceAvailability::default()
        })
    }
}
