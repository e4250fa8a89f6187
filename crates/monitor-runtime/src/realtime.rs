//! Per-role realtime push channel.
//!
//! [`RealtimeChannel::connect`] spawns a task that keeps a websocket open to
//! `{ws_base}/ws/{role}`, reconnecting with capped exponential backoff. The
//! latest message and connection flag are published through a `watch`
//! channel; [`spawn_refresh_watcher`] turns qualifying messages into refresh
//! requests for the synchronizer.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use monitor_core::models::{RealtimeEventKind, RealtimeMessage, Role};
use monitor_core::{MonitorError, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::synchronizer::{RefreshHandle, RefreshReason};

// ── Status ────────────────────────────────────────────────────────────────────

/// What the UI and the refresh watcher observe about the channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealtimeStatus {
    /// Most recent well-formed message.
    pub last_message: Option<RealtimeMessage>,
    pub is_connected: bool,
    /// Well-formed messages received since the channel was created.
    pub frames_received: u64,
    /// Messages whose type should trigger a refetch.
    pub refresh_triggers: u64,
    pub last_trigger: Option<RealtimeEventKind>,
    /// Kinds of the most recent triggers, oldest first, at most
    /// [`TRIGGER_HISTORY`] entries.
    pub recent_triggers: VecDeque<RealtimeEventKind>,
    /// Failed attempts since the last successful connect.
    pub reconnect_attempts: u32,
}

/// How many trigger kinds [`RealtimeStatus`] remembers.
pub const TRIGGER_HISTORY: usize = 64;

impl RealtimeStatus {
    pub fn record_trigger(&mut self, kind: RealtimeEventKind) {
        self.refresh_triggers += 1;
        self.last_trigger = Some(kind);
        if self.recent_triggers.len() == TRIGGER_HISTORY {
            self.recent_triggers.pop_front();
        }
        self.recent_triggers.push_back(kind);
    }

    /// Kinds of the last `missed` triggers, oldest first.
    ///
    /// Triggers older than the history are labelled with the oldest kind
    /// still on record.
    pub fn trigger_kinds(&self, missed: usize) -> Vec<RealtimeEventKind> {
        let known = missed.min(self.recent_triggers.len());
        let start = self.recent_triggers.len() - known;
        let mut kinds = Vec::with_capacity(missed);
        if let Some(&oldest) = self.recent_triggers.get(start) {
            kinds.extend(std::iter::repeat(oldest).take(missed - known));
        }
        kinds.extend(self.recent_triggers.iter().skip(start).copied());
        kinds
    }
}

// ── Backoff ───────────────────────────────────────────────────────────────────

/// Exponential reconnect delay: `base`, `2 * base`, `4 * base`, ... capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(1u32 << exp).min(self.max)
    }
}

// ── Channel ───────────────────────────────────────────────────────────────────

pub struct RealtimeChannel;

impl RealtimeChannel {
    /// `{ws_base}/ws/{role}`.
    pub fn channel_url(ws_base: &str, role: &Role) -> String {
        format!("{}/ws/{}", ws_base.trim_end_matches('/'), role)
    }

    /// Open the channel for `role`. With no role nothing is connected and the
    /// status stays at its default.
    pub fn connect(ws_base: &str, role: Option<Role>) -> RealtimeHandle {
        Self::connect_with_policy(ws_base, role, ReconnectPolicy::default())
    }

    pub fn connect_with_policy(
        ws_base: &str,
        role: Option<Role>,
        policy: ReconnectPolicy,
    ) -> RealtimeHandle {
        let (tx, rx) = watch::channel(RealtimeStatus::default());

        let Some(role) = role else {
            return RealtimeHandle {
                role: None,
                status: rx,
                task: None,
                idle: Some(tx),
            };
        };

        let url = Self::channel_url(ws_base, &role);
        info!(%url, "opening realtime channel");
        let task = tokio::spawn(connection_loop(url, tx, policy));

        RealtimeHandle {
            role: Some(role),
            status: rx,
            task: Some(task),
            idle: None,
        }
    }
}

/// Owner of a realtime connection. Dropping it closes the socket.
pub struct RealtimeHandle {
    role: Option<Role>,
    status: watch::Receiver<RealtimeStatus>,
    task: Option<JoinHandle<()>>,
    // Keeps subscribers pending instead of erroring when nothing is connected.
    idle: Option<watch::Sender<RealtimeStatus>>,
}

impl RealtimeHandle {
    pub fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<RealtimeStatus> {
        self.status.clone()
    }

    pub fn status(&self) -> RealtimeStatus {
        self.status.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected
    }

    /// Stop the connection task; the status keeps its last value.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(role = ?self.role, "realtime channel closed");
        }
        self.idle = None;
    }
}

impl Drop for RealtimeHandle {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Connection task ───────────────────────────────────────────────────────────

async fn connection_loop(url: String, tx: watch::Sender<RealtimeStatus>, policy: ReconnectPolicy) {
    let mut attempt = 0u32;
    loop {
        match run_connection(&url, &tx, &mut attempt).await {
            Ok(()) => info!(%url, "realtime channel closed by server"),
            Err(e) => warn!(%url, error = %e, "realtime channel error"),
        }

        tx.send_modify(|s| s.is_connected = false);
        if tx.is_closed() {
            break;
        }

        attempt = attempt.saturating_add(1);
        tx.send_modify(|s| s.reconnect_attempts = attempt);
        let delay = policy.delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting realtime channel");
        tokio::time::sleep(delay).await;
    }
}

async fn run_connection(
    url: &str,
    tx: &watch::Sender<RealtimeStatus>,
    attempt: &mut u32,
) -> Result<()> {
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| MonitorError::Realtime(format!("connect failed: {e}")))?;

    *attempt = 0;
    tx.send_modify(|s| {
        s.is_connected = true;
        s.reconnect_attempts = 0;
    });
    info!(%url, "realtime channel connected");

    let (mut write, mut read) = ws_stream.split();

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => match parse_frame(text.as_str()) {
                Some(message) => {
                    let trigger = message.event_kind();
                    debug!(kind = %message.kind, "realtime message");
                    tx.send_modify(|s| {
                        s.frames_received += 1;
                        if let Some(kind) = trigger {
                            s.record_trigger(kind);
                        }
                        s.last_message = Some(message);
                    });
                }
                None => debug!("ignoring malformed realtime frame"),
            },
            Ok(Message::Ping(data)) => {
                write
                    .send(Message::Pong(data))
                    .await
                    .map_err(|e| MonitorError::Realtime(format!("pong failed: {e}")))?;
            }
            Ok(Message::Close(_)) => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(MonitorError::Realtime(e.to_string())),
        }
    }
    Ok(())
}

/// Parse a text frame; anything that is not a JSON object with a `type` is dropped.
fn parse_frame(text: &str) -> Option<RealtimeMessage> {
    serde_json::from_str(text).ok()
}

// ── Refresh watcher ───────────────────────────────────────────────────────────

/// Request one refresh for every qualifying message observed on `status`,
/// labelled with that message's kind.
///
/// Triggers already counted when the watcher is created are not replayed.
/// The task ends when the channel's sender is gone.
pub fn spawn_refresh_watcher(
    mut status: watch::Receiver<RealtimeStatus>,
    refresh: RefreshHandle,
) -> JoinHandle<()> {
    let mut seen = status.borrow().refresh_triggers;
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let kinds = {
                let s = status.borrow_and_update();
                let missed = usize::try_from(s.refresh_triggers.saturating_sub(seen))
                    .unwrap_or(usize::MAX);
                seen = s.refresh_triggers;
                s.trigger_kinds(missed)
            };
            for kind in kinds {
                if !refresh.request(RefreshReason::Realtime(kind)) {
                    return;
                }
            }
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
