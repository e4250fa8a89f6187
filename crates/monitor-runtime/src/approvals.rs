//! Approve / reject decisions on pending audit entries.
//!
//! A decision is a single `POST /api/approve` followed by a refresh request,
//! whether the POST succeeded or not. Nothing is updated locally: an entry
//! leaves the queue only when the next fetch no longer reports it pending.

use std::sync::Arc;

use monitor_core::models::{ActionAck, ApprovalRequest, RecordId};
use monitor_core::Result;
use monitor_data::AutomationBackend;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::synchronizer::{RefreshHandle, RefreshReason};

/// Result of a submitted decision, reported back to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    pub audit_log_id: RecordId,
    pub approved: bool,
    /// `Err` carries a message suitable for a status line.
    pub result: std::result::Result<(), String>,
}

impl DecisionOutcome {
    pub fn verb(&self) -> &'static str {
        if self.approved {
            "approve"
        } else {
            "reject"
        }
    }
}

/// Submit one decision and then ask for a refetch.
pub async fn submit_decision<B: AutomationBackend + ?Sized>(
    backend: &B,
    refresh: &RefreshHandle,
    audit_log_id: &RecordId,
    approved: bool,
    approved_by: &str,
) -> Result<ActionAck> {
    let request = ApprovalRequest {
        audit_log_id: audit_log_id.clone(),
        approved,
        approved_by: approved_by.to_string(),
    };

    info!(%audit_log_id, approved, approved_by, "submitting approval decision");
    let result = backend.approve(&request).await;
    if let Err(e) = &result {
        warn!(%audit_log_id, error = %e, "approval decision failed");
    }

    refresh.request(RefreshReason::ApprovalAction);
    result
}

/// Run [`submit_decision`] in the background and report the outcome on `outcomes`.
pub fn spawn_decision<B: AutomationBackend>(
    backend: Arc<B>,
    refresh: RefreshHandle,
    audit_log_id: RecordId,
    approved: bool,
    approved_by: String,
    outcomes: mpsc::Sender<DecisionOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = submit_decision(backend.as_ref(), &refresh, &audit_log_id, approved, &approved_by)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string());
        let outcome = DecisionOutcome {
            audit_log_id,
            approved,
            result,
        };
        // The UI may already be gone.
        let _ = outcomes.send(outcome).await;
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
