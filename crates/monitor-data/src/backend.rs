//! Typed view of the automation backend.
//!
//! The runtime only talks to [`AutomationBackend`]; [`ApiClient`] is the
//! production implementation, tests plug in scripted ones.

use async_trait::async_trait;
use monitor_core::models::{
    ActionAck, AgentRun, AgentRunDetail, AgentTypes, ApprovalRequest, AuditLogEntry,
    AuditLogQuery, HealthStatus, Rule, RunFilter, Stats,
};
use monitor_core::Result;
use tracing::warn;

use crate::client::ApiClient;

/// REST paths exposed by the backend.
pub mod endpoints {
    pub const HEALTH: &str = "/health";
    pub const STATS: &str = "/api/stats";
    pub const AUDIT_LOGS: &str = "/api/audit-logs";
    pub const RULES: &str = "/api/rules";
    pub const APPROVE: &str = "/api/approve";
    pub const AGENT_TYPES: &str = "/api/agents/types";
    pub const AGENT_RUNS: &str = "/api/agents/runs";
}

/// Read and action surface of the automation backend.
///
/// Read methods never fail: `None` means "no update" and callers keep what
/// they had. [`approve`](AutomationBackend::approve) reports failure.
#[async_trait]
pub trait AutomationBackend: Send + Sync + 'static {
    async fn health(&self) -> Option<HealthStatus>;

    async fn stats(&self) -> Option<Stats>;

    async fn audit_logs(&self, query: &AuditLogQuery) -> Option<Vec<AuditLogEntry>>;

    async fn rules(&self) -> Option<Vec<Rule>>;

    async fn approve(&self, request: &ApprovalRequest) -> Result<ActionAck>;

    async fn agent_types(&self) -> Option<Vec<String>>;

    async fn agent_runs(&self, filter: &RunFilter) -> Option<Vec<AgentRun>>;

    async fn agent_run(&self, id: &str) -> Option<AgentRunDetail>;
}

#[async_trait]
impl AutomationBackend for ApiClient {
    async fn health(&self) -> Option<HealthStatus> {
        self.fetch_safe(endpoints::HEALTH, &[]).await
    }

    async fn stats(&self) -> Option<Stats> {
        self.fetch_safe(endpoints::STATS, &[]).await
    }

    async fn audit_logs(&self, query: &AuditLogQuery) -> Option<Vec<AuditLogEntry>> {
        self.fetch_safe(endpoints::AUDIT_LOGS, &query.to_query()).await
    }

    async fn rules(&self) -> Option<Vec<Rule>> {
        self.fetch_safe(endpoints::RULES, &[]).await
    }

    async fn approve(&self, request: &ApprovalRequest) -> Result<ActionAck> {
        self.post_action(endpoints::APPROVE, request).await
    }

    async fn agent_types(&self) -> Option<Vec<String>> {
        self.fetch_safe::<AgentTypes>(endpoints::AGENT_TYPES, &[])
            .await
            .map(|t| t.agent_types)
    }

    async fn agent_runs(&self, filter: &RunFilter) -> Option<Vec<AgentRun>> {
        self.fetch_safe(endpoints::AGENT_RUNS, &filter.to_query()).await
    }

    async fn agent_run(&self, id: &str) -> Option<AgentRunDetail> {
        match self.resource_url(endpoints::AGENT_RUNS, id) {
            Ok(url) => self.fetch_safe_url(url).await,
            Err(e) => {
                warn!(error = %e, run_id = id, "cannot build run detail url");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, RawQuery};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use monitor_core::models::{AuditStatus, RunStatus};
    use monitor_core::MonitorError;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    async fn serve(router: Router) -> ApiClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        ApiClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_typed_reads() {
        let client = serve(
            Router::new()
                .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
                .route(
                    "/api/stats",
                    get(|| async { Json(json!({"automations_today": 12, "pending_approvals": 2})) }),
                )
                .route(
                    "/api/rules",
                    get(|| async { Json(json!([{"id": 1, "name": "Auto invoice", "is_active": true}])) }),
                )
                .route(
                    "/api/agents/types",
                    get(|| async { Json(json!({"agent_types": ["forecast", "reconcile"]})) }),
                ),
        )
        .await;

        assert!(client.health().await.unwrap().is_healthy());
        assert_eq!(client.stats().await.unwrap().get("automations_today"), Some(12.0));
        let rules = client.rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "Auto invoice");
        assert_eq!(
            client.agent_types().await.unwrap(),
            vec!["forecast".to_string(), "reconcile".to_string()]
        );
    }

    #[tokio::test]
    async fn test_audit_logs_pending_query() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let recorder = seen.clone();
        let client = serve(Router::new().route(
            "/api/audit-logs",
            get(move |RawQuery(q): RawQuery| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push(q.unwrap_or_default());
                    Json(json!([{"id": 8, "status": "pending", "rule_name": "Big discount"}]))
                }
            }),
        ))
        .await;

        let entries = client.audit_logs(&AuditLogQuery::pending(25)).await.unwrap();
        assert_eq!(entries[0].status, AuditStatus::Pending);
        assert_eq!(seen.lock().unwrap().as_slice(), ["limit=25&status=pending"]);
    }

    #[tokio::test]
    async fn test_agent_runs_filter_query() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let recorder = seen.clone();
        let client = serve(Router::new().route(
            "/api/agents/runs",
            get(move |RawQuery(q): RawQuery| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push(q.unwrap_or_default());
                    Json(json!([{"id": "r1", "agent_type": "forecast", "status": "failed"}]))
                }
            }),
        ))
        .await;

        let filter = RunFilter {
            agent_type: Some("forecast".to_string()),
            status: Some(RunStatus::Failed),
            limit: 20,
        };
        let runs = client.agent_runs(&filter).await.unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            ["agent_type=forecast&status=failed&limit=20"]
        );
    }

    #[tokio::test]
    async fn test_agent_run_detail_by_id() {
        let client = serve(Router::new().route(
            "/api/agents/runs/{id}",
            get(|Path(id): Path<String>| async move {
                Json(json!({
                    "id": id,
                    "agent_type": "forecast",
                    "status": "completed",
                    "steps": [{"step_index": 0, "step_name": "load", "status": "completed"}]
                }))
            }),
        ))
        .await;

        let detail = client.agent_run("run-42").await.unwrap();
        assert_eq!(detail.run.id, "run-42");
        assert_eq!(detail.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_detail_is_none() {
        let client = serve(Router::new()).await;
        assert!(client.agent_run("nope").await.is_none());
        assert!(client.stats().await.is_none());
    }

    #[tokio::test]
    async fn test_approve_posts_request_body() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let recorder = seen.clone();
        let client = serve(Router::new().route(
            "/api/approve",
            post(move |Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    *recorder.lock().unwrap() = Some(body);
                    Json(json!({"status": "approved"}))
                }
            }),
        ))
        .await;

        let entry: AuditLogEntry =
            serde_json::from_value(json!({"id": 8, "status": "pending"})).unwrap();
        let request = ApprovalRequest {
            audit_log_id: entry.id,
            approved: false,
            approved_by: "alice".to_string(),
        };
        client.approve(&request).await.unwrap();
        assert_eq!(
            seen.lock().unwrap().clone(),
            Some(json!({"audit_log_id": 8, "approved": false, "approved_by": "alice"}))
        );
    }

    #[tokio::test]
    async fn test_approve_rejected_by_backend() {
        let client = serve(Router::new().route(
            "/api/approve",
            post(|| async { StatusCode::UNPROCESSABLE_ENTITY }),
        ))
        .await;
        let request = ApprovalRequest {
            audit_log_id: "8".into(),
            approved: true,
            approved_by: "alice".to_string(),
        };
        assert!(matches!(
            client.approve(&request).await,
            Err(MonitorError::Action { .. })
        ));
    }
}
