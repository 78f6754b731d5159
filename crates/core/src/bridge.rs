//! HTTP client for the local command bridge.
//!
//! The bridge exposes `POST /exec` taking `{"command": "..."}` and answering
//! `{"output"?: "...", "error"?: "..."}`, plus `GET /status` for liveness.
//! Every call resolves to an [`ExecutionResult`]; nothing here returns an
//! error to the caller.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const DEFAULT_BRIDGE_ENDPOINT: &str = "http://localhost:8080";
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const NO_OUTPUT: &str = "SYSTEM: NO_OUTPUT";
const EMPTY_COMMAND: &str = "ERROR: EMPTY_COMMAND";

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    endpoint: String,
    exec_timeout: Duration,
    status_timeout: Duration,
    poll_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_ENDPOINT)
    }
}

impl BridgeConfig {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn exec_timeout(&self) -> Duration {
        self.exec_timeout
    }

    pub fn status_timeout(&self) -> Duration {
        self.status_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Whether the last health poll reached the bridge. Written only by the poll.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityState(Arc<AtomicBool>);

impl ConnectivityState {
    pub fn is_reachable(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Stores the new value and returns the previous one.
    fn set(&self, reachable: bool) -> bool {
        self.0.swap(reachable, Ordering::SeqCst)
    }
}

/// How a command failed to produce a normal result. The display text is what
/// the operator and the model see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FaultKind {
    #[error("ERROR: BRIDGE_SIGNAL_LOST. Ensure 'sudO bridge' is active.")]
    BridgeUnreachable,
    #[error("CRITICAL: NETWORK_PROTOCOL_FAULT")]
    HttpFault(u16),
    #[error("CRITICAL: EXECUTION_TIMEOUT")]
    Timeout,
    #[error("CRITICAL: NETWORK_PROTOCOL_FAULT")]
    TransportFault,
    #[error("command reported an error")]
    CommandFault,
}

impl FaultKind {
    /// Short code shown in operator feedback.
    pub fn code(&self) -> &'static str {
        match self {
            FaultKind::BridgeUnreachable => "TERMUX_LINK_OFFLINE",
            FaultKind::Timeout => "EXECUTION_TIMEOUT",
            FaultKind::HttpFault(_) | FaultKind::TransportFault => "NETWORK_PROTOCOL_FAULT",
            FaultKind::CommandFault => "COMMAND_FAULT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    command: String,
    output: String,
    is_error: bool,
    fault: Option<FaultKind>,
}

impl ExecutionResult {
    pub fn from_fault(command: &str, fault: FaultKind) -> Self {
        Self {
            command: command.to_string(),
            output: fault.to_string(),
            is_error: true,
            fault: Some(fault),
        }
    }

    fn from_reply(command: &str, reply: ExecReply) -> Self {
        let output = reply.output.filter(|s| !s.is_empty());
        let error = reply.error.filter(|s| !s.is_empty());
        let is_error = error.is_some();
        Self {
            command: command.to_string(),
            output: output.or(error).unwrap_or_else(|| NO_OUTPUT.to_string()),
            is_error,
            fault: is_error.then_some(FaultKind::CommandFault),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn fault(&self) -> Option<FaultKind> {
        self.fault
    }
}

#[derive(Debug, serde::Deserialize)]
struct ExecReply {
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Anything that can run a shell command on the bridge's host.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Whether a command issued now would reach the bridge.
    fn is_reachable(&self) -> bool;

    async fn execute(&self, command: &str) -> ExecutionResult;
}

pub struct BridgeClient {
    http: reqwest::Client,
    config: BridgeConfig,
    connectivity: ConnectivityState,
}

impl BridgeClient {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            connectivity: ConnectivityState::default(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity.clone()
    }

    async fn post_exec(&self, command: &str) -> ExecutionResult {
        let url = format!("{}/exec", self.config.endpoint());
        let response = self
            .http
            .post(&url)
            .timeout(self.config.exec_timeout())
            .json(&serde_json::json!({ "command": command }))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return ExecutionResult::from_fault(command, transport_fault(&e)),
        };
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("bridge answered {} for `{}`", status, command);
            return ExecutionResult::from_fault(command, FaultKind::HttpFault(status.as_u16()));
        }

        match response.json::<ExecReply>().await {
            Ok(reply) => ExecutionResult::from_reply(command, reply),
            Err(e) => ExecutionResult::from_fault(command, transport_fault(&e)),
        }
    }

    /// Probes `GET /status` and records the outcome. Any 2xx is reachable.
    pub async fn poll_health(&self) -> bool {
        let url = format!("{}/status", self.config.endpoint());
        let reachable = match self
            .http
            .get(&url)
            .timeout(self.config.status_timeout())
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::trace!("bridge status check failed: {}", e);
                false
            }
        };

        let previous = self.connectivity.set(reachable);
        if previous != reachable {
            tracing::info!(
                "command bridge at {} is {}",
                self.config.endpoint(),
                if reachable { "online" } else { "offline" }
            );
        }
        reachable
    }

    /// Polls immediately, then on every interval, until the task is aborted.
    pub fn spawn_health_monitor(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.poll_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.poll_health().await;
            }
        })
    }
}

fn transport_fault(e: &reqwest::Error) -> FaultKind {
    if e.is_timeout() {
        tracing::warn!("bridge call timed out: {}", e);
        FaultKind::Timeout
    } else {
        tracing::warn!("bridge call failed: {}", e);
        FaultKind::TransportFault
    }
}

#[async_trait]
impl CommandExecutor for BridgeClient {
    fn is_reachable(&self) -> bool {
        self.connectivity.is_reachable()
    }

    async fn execute(&self, command: &str) -> ExecutionResult {
        if command.trim().is_empty() {
            return ExecutionResult {
                command: command.to_string(),
                output: EMPTY_COMMAND.to_string(),
                is_error: true,
                fault: Some(FaultKind::CommandFault),
            };
        }
        if !self.connectivity.is_reachable() {
            tracing::debug!("bridge offline, not sending `{}`", command);
            return ExecutionResult::from_fault(command, FaultKind::BridgeUnreachable);
        }
        tracing::debug!("executing `{}` on bridge", command);
        self.post_exec(command).await
    }
}
