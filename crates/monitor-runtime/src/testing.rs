//! Scripted in-memory backend shared by the runtime tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use monitor_core::models::{
    ActionAck, AgentRun, AgentRunDetail, ApprovalRequest, AuditLogEntry, AuditLogQuery,
    AuditStatus, HealthStatus, RecordId, Rule, RunFilter, RunStatus, Stats,
};
use monitor_core::{MonitorError, Result};
use monitor_data::AutomationBackend;
use serde_json::{json, Value};

pub(crate) fn audit_entry(id: &str, status: AuditStatus) -> AuditLogEntry {
    AuditLogEntry {
        id: RecordId::from(id),
        status,
        rule_name: Some(format!("rule-{id}")),
        action_type: None,
        model: Some("sale.order".to_string()),
        record_id: None,
        confidence: None,
        approved_by: None,
        created_at: None,
        updated_at: None,
        payload: Value::Null,
    }
}

pub(crate) fn run(id: &str, agent_type: &str, status: RunStatus) -> AgentRun {
    AgentRun {
        id: id.to_string(),
        agent_type: agent_type.to_string(),
        status,
        trigger_type: None,
        total_steps: 0,
        token_usage: None,
        started_at: None,
        completed_at: None,
        error: None,
    }
}

/// Every read returns whatever is currently scripted; `None` simulates a
/// failed request. Approvals mutate the pending list like the real backend.
pub(crate) struct ScriptedBackend {
    pub stats: Mutex<Option<Stats>>,
    pub audit_logs: Mutex<Option<Vec<AuditLogEntry>>>,
    pub pending: Mutex<Option<Vec<AuditLogEntry>>>,
    pub rules: Mutex<Option<Vec<Rule>>>,
    pub agent_types: Mutex<Option<Vec<String>>>,
    /// Runs keyed by the requested agent type filter.
    pub runs: Mutex<HashMap<Option<String>, Vec<AgentRun>>>,
    pub run_delays: Mutex<HashMap<Option<String>, Duration>>,
    pub details: Mutex<HashMap<String, AgentRunDetail>>,
    pub reject_approvals: Mutex<bool>,
    pub fetch_delay: Mutex<Duration>,

    pub stats_calls: AtomicUsize,
    pub approve_calls: AtomicUsize,
    pub run_queries: Mutex<Vec<RunFilter>>,
    pub audit_queries: Mutex<Vec<AuditLogQuery>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            stats: Mutex::new(Some(
                serde_json::from_value(json!({ "total_automations": 3 })).unwrap_or_default(),
            )),
            audit_logs: Mutex::new(Some(vec![])),
            pending: Mutex::new(Some(vec![])),
            rules: Mutex::new(Some(vec![])),
            agent_types: Mutex::new(Some(vec!["forecast".to_string(), "reconcile".to_string()])),
            runs: Mutex::default(),
            run_delays: Mutex::default(),
            details: Mutex::default(),
            reject_approvals: Mutex::new(false),
            fetch_delay: Mutex::new(Duration::ZERO),
            stats_calls: AtomicUsize::new(0),
            approve_calls: AtomicUsize::new(0),
            run_queries: Mutex::default(),
            audit_queries: Mutex::default(),
        }
    }
}

impl ScriptedBackend {
    pub fn with_pending(entries: Vec<AuditLogEntry>) -> Self {
        let backend = Self::default();
        *backend.pending.lock().unwrap() = Some(entries);
        backend
    }

    pub fn cycles(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AutomationBackend for ScriptedBackend {
    async fn health(&self) -> Option<HealthStatus> {
        self.delay().await;
        Some(HealthStatus {
            status: "ok".to_string(),
        })
    }

    async fn stats(&self) -> Option<Stats> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.stats.lock().unwrap().clone()
    }

    async fn audit_logs(&self, query: &AuditLogQuery) -> Option<Vec<AuditLogEntry>> {
        self.audit_queries.lock().unwrap().push(query.clone());
        self.delay().await;
        if query.status == Some(AuditStatus::Pending) {
            self.pending.lock().unwrap().clone()
        } else {
            self.audit_logs.lock().unwrap().clone()
        }
    }

    async fn rules(&self) -> Option<Vec<Rule>> {
        self.delay().await;
        self.rules.lock().unwrap().clone()
    }

    async fn approve(&self, request: &ApprovalRequest) -> Result<ActionAck> {
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        if *self.reject_approvals.lock().unwrap() {
            return Err(MonitorError::Action {
                path: "/api/approve".to_string(),
                message: "HTTP 409".to_string(),
            });
        }
        if let Some(pending) = self.pending.lock().unwrap().as_mut() {
            pending.retain(|e| e.id != request.audit_log_id);
        }
        Ok(ActionAck(json!({ "status": "ok" })))
    }

    async fn agent_types(&self) -> Option<Vec<String>> {
        self.agent_types.lock().unwrap().clone()
    }

    async fn agent_runs(&self, filter: &RunFilter) -> Option<Vec<AgentRun>> {
        self.run_queries.lock().unwrap().push(filter.clone());
        let delay = self
            .run_delays
            .lock()
            .unwrap()
            .get(&filter.agent_type)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let runs = self
            .runs
            .lock()
            .unwrap()
            .get(&filter.agent_type)
            .cloned()
            .unwrap_or_default();
        Some(
            runs.into_iter()
                .filter(|r| filter.status.map_or(true, |s| r.status == s))
                .take(filter.limit as usize)
                .collect(),
        )
    }

    async fn agent_run(&self, id: &str) -> Option<AgentRunDetail> {
        self.details.lock().unwrap().get(id).cloned()
    }
}
