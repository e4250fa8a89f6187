use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Default page size for the agent run list.
pub const DEFAULT_RUN_PAGE_SIZE: u32 = 20;

// ── Identifiers ───────────────────────────────────────────────────────────────

/// An identifier in the form the backend sent it.
///
/// Numeric ids stay numeric so they serialize back unchanged in request bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        RecordId::Number(n.into())
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

/// Accept either a JSON number or string id and normalise it to a `String`.
fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// Token usage arrives either as a bare number or as an object carrying a
/// `total_tokens` / `total` field.
fn token_usage_from_any<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::Object(map)) => map
            .get("total_tokens")
            .or_else(|| map.get("total"))
            .and_then(Value::as_u64),
        _ => None,
    })
}

// ── Health / Stats ────────────────────────────────────────────────────────────

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.to_lowercase().as_str(), "ok" | "healthy" | "up")
    }
}

/// Aggregate counters for the current period.
///
/// The backend owns the field set; the dashboard treats it as an opaque bag
/// and only renders the numeric entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stats(pub BTreeMap<String, Value>);

impl Stats {
    /// Numeric fields in key order, as `(name, value)`.
    pub fn numeric_fields(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|n| (k.as_str(), n)))
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Audit log / approvals ─────────────────────────────────────────────────────

/// Lifecycle status of an automation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    Failed,
    #[serde(other)]
    Other,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "pending",
            AuditStatus::Approved => "approved",
            AuditStatus::Rejected => "rejected",
            AuditStatus::Executed => "executed",
            AuditStatus::Failed => "failed",
            AuditStatus::Other => "other",
        }
    }
}

/// A single recorded automation decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: RecordId,
    pub status: AuditStatus,
    #[serde(default)]
    pub rule_name: Option<String>,
    #[serde(default)]
    pub action_type: Option<String>,
    /// Odoo model the decision applies to (e.g. `sale.order`).
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub record_id: Option<Value>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl AuditLogEntry {
    pub fn is_pending(&self) -> bool {
        self.status == AuditStatus::Pending
    }

    /// Short human label: rule name, then action type, then the model.
    pub fn label(&self) -> &str {
        self.rule_name
            .as_deref()
            .or(self.action_type.as_deref())
            .or(self.model.as_deref())
            .unwrap_or("-")
    }
}

/// Query for `GET /api/audit-logs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    pub limit: u32,
    pub status: Option<AuditStatus>,
}

impl AuditLogQuery {
    pub fn recent(limit: u32) -> Self {
        Self {
            limit,
            status: None,
        }
    }

    pub fn pending(limit: u32) -> Self {
        Self {
            limit,
            status: Some(AuditStatus::Pending),
        }
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut q = vec![("limit", self.limit.to_string())];
        if let Some(status) = self.status {
            q.push(("status", status.as_str().to_string()));
        }
        q
    }
}

/// Body of `POST /api/approve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub audit_log_id: RecordId,
    pub approved: bool,
    pub approved_by: String,
}

/// Whatever the backend returns for a mutating call. An empty body is `Null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionAck(pub Value);

// ── Rules ─────────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

/// An automation rule definition. Read-only on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "trigger_event")]
    pub trigger: Option<String>,
    #[serde(default, alias = "action_type")]
    pub action: Option<String>,
    #[serde(default = "default_true", alias = "is_active")]
    pub enabled: bool,
    #[serde(default)]
    pub requires_approval: bool,
}

// ── Agent runs ────────────────────────────────────────────────────────────────

/// Execution status of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Suspended,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// The statuses a user can filter on, in display order.
    pub const FILTERABLE: [RunStatus; 6] = [
        RunStatus::Pending,
        RunStatus::Running,
        RunStatus::Suspended,
        RunStatus::Completed,
        RunStatus::Failed,
        RunStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Suspended => "suspended",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary form of an agent run, as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub agent_type: String,
    pub status: RunStatus,
    #[serde(default)]
    pub trigger_type: Option<String>,
    #[serde(default)]
    pub total_steps: u32,
    #[serde(default, deserialize_with = "token_usage_from_any")]
    pub token_usage: Option<u64>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Step status within an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    #[serde(other)]
    Unknown,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::Unknown => "unknown",
        }
    }
}

/// One ordered step of an agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    #[serde(alias = "index")]
    pub step_index: u32,
    #[serde(alias = "name")]
    pub step_name: String,
    pub status: StepStatus,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Full agent run with its steps, as returned by `GET /api/agents/runs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunDetail {
    #[serde(flatten)]
    pub run: AgentRun,
    #[serde(default)]
    pub steps: Vec<AgentStep>,
}

impl AgentRunDetail {
    /// Steps sorted by `step_index`; the backend does not guarantee order.
    pub fn ordered_steps(&self) -> Vec<&AgentStep> {
        let mut steps: Vec<&AgentStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.step_index);
        steps
    }
}

/// Response of `GET /api/agents/types`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentTypes {
    #[serde(default)]
    pub agent_types: Vec<String>,
}

/// Filter for the agent run list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFilter {
    pub agent_type: Option<String>,
    pub status: Option<RunStatus>,
    pub limit: u32,
}

impl Default for RunFilter {
    fn default() -> Self {
        Self {
            agent_type: None,
            status: None,
            limit: DEFAULT_RUN_PAGE_SIZE,
        }
    }
}

impl RunFilter {
    /// Query parameters in wire order; unset filters are omitted.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut q = Vec::with_capacity(3);
        if let Some(t) = &self.agent_type {
            q.push(("agent_type", t.clone()));
        }
        if let Some(s) = self.status {
            q.push(("status", s.as_str().to_string()));
        }
        q.push(("limit", self.limit.to_string()));
        q
    }
}

/// Runs counted per status, for the summary strip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatusCounts(pub BTreeMap<RunStatus, usize>);

impl RunStatusCounts {
    pub fn from_runs<'a>(runs: impl IntoIterator<Item = &'a AgentRun>) -> Self {
        let mut counts = BTreeMap::new();
        for run in runs {
            *counts.entry(run.status).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn get(&self, status: RunStatus) -> usize {
        self.0.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

// ── Realtime ──────────────────────────────────────────────────────────────────

/// A tagged push notification from the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl RealtimeMessage {
    pub fn event_kind(&self) -> Option<RealtimeEventKind> {
        RealtimeEventKind::parse(&self.kind)
    }
}

/// Realtime event types that make the dashboard refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealtimeEventKind {
    AutomationCompleted,
    ApprovalNeeded,
    ForecastUpdated,
    AgentCompleted,
    Alert,
}

impl RealtimeEventKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "automation_completed" => Some(Self::AutomationCompleted),
            "approval_needed" => Some(Self::ApprovalNeeded),
            "forecast_updated" => Some(Self::ForecastUpdated),
            "agent_completed" => Some(Self::AgentCompleted),
            "alert" => Some(Self::Alert),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutomationCompleted => "automation_completed",
            Self::ApprovalNeeded => "approval_needed",
            Self::ForecastUpdated => "forecast_updated",
            Self::AgentCompleted => "agent_completed",
            Self::Alert => "alert",
        }
    }
}

// ── Role ──────────────────────────────────────────────────────────────────────

/// Dashboard role; selects the realtime channel and the overview title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub const DEFAULT: &'static str = "overview";

    /// Roles offered when cycling in the UI.
    pub const KNOWN: [&'static str; 6] = [
        "overview",
        "sales",
        "purchase",
        "inventory",
        "accounting",
        "hr",
    ];

    /// Build a role from user input; blank input falls back to the default.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into().trim().to_lowercase();
        if name.is_empty() {
            Self::default()
        } else {
            Self(name)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The next known role, wrapping around. Unknown roles go back to the
    /// first known one.
    pub fn next(&self) -> Self {
        let pos = Self::KNOWN.iter().position(|r| *r == self.0);
        let next = match pos {
            Some(i) => Self::KNOWN[(i + 1) % Self::KNOWN.len()],
            None => Self::KNOWN[0],
        };
        Self(next.to_string())
    }
}

impl Default for Role {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
