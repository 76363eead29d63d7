use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a server-side generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TryOnStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TryOnStatus {
    /// Whether the server will not move this session any further.
    pub fn is_terminal(self) -> bool {
        match self {
            TryOnStatus::Pending | TryOnStatus::InProgress => false,
            TryOnStatus::Completed | TryOnStatus::Failed | TryOnStatus::Cancelled => true,
        }
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TryOnStatus::Pending => "pending",
            TryOnStatus::InProgress => "in_progress",
            TryOnStatus::Completed => "completed",
            TryOnStatus::Failed => "failed",
            TryOnStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TryOnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional hints that steer the generated try-on image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryOnContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occasion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
}

/// Parameters for one try-on generation job.
///
/// # Example
/// ```
/// use tryon_session::GenerationRequest;
///
/// let request = GenerationRequest::new("outfit-42")
///     .occasion("wedding")
///     .weather("sunny")
///     .analyze_compatibility(true);
/// assert!(request.generate_description);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub outfit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<TryOnContext>,
    pub generate_description: bool,
    pub analyze_compatibility: bool,
}

impl GenerationRequest {
    pub fn new(outfit_id: impl Into<String>) -> Self {
        Self {
            outfit_id: outfit_id.into(),
            user_context: None,
            generate_description: true,
            analyze_compatibility: false,
        }
    }

    pub fn occasion(mut self, occasion: impl Into<String>) -> Self {
        self.context_mut().occasion = Some(occasion.into());
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.context_mut().style = Some(style.into());
        self
    }

    pub fn weather(mut self, weather: impl Into<String>) -> Self {
        self.context_mut().weather = Some(weather.into());
        self
    }

    pub fn generate_description(mut self, enabled: bool) -> Self {
        self.generate_description = enabled;
        self
    }

    pub fn analyze_compatibility(mut self, enabled: bool) -> Self {
        self.analyze_compatibility = enabled;
        self
    }

    fn context_mut(&mut self) -> &mut TryOnContext {
        self.user_context.get_or_insert_with(TryOnContext::default)
    }
}

/// Acknowledgement returned when a generation job is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: String,
    pub status: TryOnStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_url: Option<String>,
}

/// Latest server-observed state of a generation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: TryOnStatus,
    pub progress_percent: u8,
    /// Only present when `status` is `Completed`.
    pub result_url: Option<String>,
    pub description: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_seconds_remaining: Option<u32>,
}

/// One page of the caller's session history.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHistory {
    pub sessions: Vec<SessionSnapshot>,
    pub total: u32,
}

/// 24 hour usage counters reported by the availability endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_tokens: u64,
    pub average_duration: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub requests_per_minute: u32,
    pub tokens_per_minute: u32,
}

/// Advisory result of the service availability check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceAvailability {
    pub available: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, rename = "usage_stats_24h")]
    pub usage_stats: Option<UsageStats>,
    #[serde(default)]
    pub rate_limits: Option<RateLimits>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Status body exactly as the server sends it.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusPayload {
    session_id: String,
    status: TryOnStatus,
    #[serde(default)]
    progress_percentage: i64,
    #[serde(default)]
    generated_image_url: Option<String>,
    #[serde(default)]
    ai_description: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    completed_at: Option<String>,
    #[serde(default)]
    estimated_completion_time: Option<i64>,
}

impl StatusPayload {
    /// Convert to a [`SessionSnapshot`], dropping fields that contradict the status.
    pub(crate) fn into_snapshot(self) -> SessionSnapshot {
        let status = self.status;
        let (result_url, description, error_message) = match status {
            TryOnStatus::Completed => (self.generated_image_url, self.ai_description, None),
            TryOnStatus::Failed | TryOnStatus::Cancelled => (None, None, self.error_message),
            TryOnStatus::Pending | TryOnStatus::InProgress => {
                (None, self.ai_description, self.error_message)
            }
        };
        let estimated_seconds_remaining = if status.is_terminal() {
            None
        } else {
            self.estimated_completion_time
                .map(|s| s.clamp(0, u32::MAX as i64) as u32)
        };

        SessionSnapshot {
            session_id: self.session_id,
            status,
            progress_percent: self.progress_percentage.clamp(0, 100) as u8,
            result_url,
            description,
            error_message,
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
            completed_at: self.completed_at.as_deref().and_then(parse_timestamp),
            estimated_seconds_remaining,
        }
    }
}

/// Parse an ISO-8601 timestamp with an offset, or a naive one taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
