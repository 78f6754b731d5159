//! The assistant's local state and the system tasks the model can trigger.
//!
//! `AssistantConsole` is both the [`SystemTaskHandler`] behind
//! `executeMobileTask` and the [`CommandExecutor`] behind
//! `executeTermuxCommand`: it forwards shell commands to the bridge and keeps
//! the terminal history and activity log up to date.

use crate::bridge::{CommandExecutor, ExecutionResult, FaultKind};
use crate::dispatcher::SystemTaskHandler;
use crate::feedback::FeedbackCenter;
use crate::tools::COMMAND_SUCCESS;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const ACTIVITY_TICK: Duration = Duration::from_secs(3);
const SHELL_LOG_LIMIT: usize = 30;
const TICKER_LOG_LIMIT: usize = 15;
const EXEC_PREVIEW_CHARS: usize = 15;

const ACTIVITY_PHRASES: [&str; 6] = [
    "KERNEL_OVERRIDE: ACTIVE",
    "TRACING_REMOTE_HOST...",
    "DECRYPTING_PACKETS...",
    "NYNOAH_CORE: PROTECTED",
    "BUFFER_OVERFLOW_MITIGATED",
    "ACCESS_GRANTED: 0x00",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Conversation,
    Chat,
    ImageGen,
    ImageAnalysis,
    Maps,
    Termux,
    Hacking,
    Settings,
}

impl AppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::Conversation => "CONVERSATION",
            AppMode::Chat => "CHAT",
            AppMode::ImageGen => "IMAGE_GEN",
            AppMode::ImageAnalysis => "IMAGE_ANALYSIS",
            AppMode::Maps => "MAPS",
            AppMode::Termux => "TERMUX",
            AppMode::Hacking => "HACKING",
            AppMode::Settings => "SETTINGS",
        }
    }
}

impl std::fmt::Display for AppMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode: {0}")]
pub struct UnknownMode(String);

impl FromStr for AppMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CONVERSATION" => Ok(AppMode::Conversation),
            "CHAT" => Ok(AppMode::Chat),
            "IMAGE_GEN" => Ok(AppMode::ImageGen),
            "IMAGE_ANALYSIS" => Ok(AppMode::ImageAnalysis),
            "MAPS" => Ok(AppMode::Maps),
            "TERMUX" => Ok(AppMode::Termux),
            "HACKING" => Ok(AppMode::Hacking),
            "SETTINGS" => Ok(AppMode::Settings),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    pub content: String,
    /// Set for location broadcasts, with the title they were shared under.
    pub location: Option<(Location, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalEntry {
    pub cmd: String,
    pub out: String,
    pub err: bool,
}

struct ConsoleState {
    mode: AppMode,
    thinking: bool,
    persistent: bool,
    conversation: Vec<ConversationEntry>,
    terminal: Vec<TerminalEntry>,
    /// Newest first.
    activity: VecDeque<String>,
    processing: bool,
    location: Option<Location>,
    ticker: usize,
}

pub struct AssistantConsole {
    state: Mutex<ConsoleState>,
    shell: Arc<dyn CommandExecutor>,
    feedback: FeedbackCenter,
}

impl AssistantConsole {
    pub fn new(shell: Arc<dyn CommandExecutor>, feedback: FeedbackCenter) -> Self {
        Self {
            state: Mutex::new(ConsoleState {
                mode: AppMode::Conversation,
                thinking: false,
                persistent: false,
                conversation: Vec::new(),
                terminal: Vec::new(),
                activity: VecDeque::new(),
                processing: false,
                location: None,
                ticker: 0,
            }),
            shell,
            feedback,
        }
    }

    // Never held across an await.
    fn state(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> AppMode {
        self.state().mode
    }

    pub fn set_mode(&self, mode: AppMode) {
        self.state().mode = mode;
    }

    pub fn thinking(&self) -> bool {
        self.state().thinking
    }

    pub fn persistent(&self) -> bool {
        self.state().persistent
    }

    pub fn is_processing(&self) -> bool {
        self.state().processing
    }

    pub fn set_location(&self, location: Option<Location>) {
        self.state().location = location;
    }

    pub fn record_message(&self, content: &str) {
        self.state().conversation.push(ConversationEntry {
            content: content.to_string(),
            location: None,
        });
    }

    pub fn conversation(&self) -> Vec<ConversationEntry> {
        self.state().conversation.clone()
    }

    pub fn terminal_history(&self) -> Vec<TerminalEntry> {
        self.state().terminal.clone()
    }

    pub fn activity_log(&self) -> Vec<String> {
        self.state().activity.iter().cloned().collect()
    }

    /// Adds the next status phrase while in HACKING mode and idle.
    pub fn tick_activity(&self) -> Option<String> {
        let mut state = self.state();
        if state.mode != AppMode::Hacking || state.processing {
            return None;
        }
        let phrase = ACTIVITY_PHRASES[state.ticker % ACTIVITY_PHRASES.len()].to_string();
        state.ticker += 1;
        state.activity.push_front(phrase.clone());
        state.activity.truncate(TICKER_LOG_LIMIT);
        Some(phrase)
    }

    pub fn spawn_activity_ticker(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ACTIVITY_TICK);
            // The first tick completes immediately; the log starts one period later.
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Some(phrase) = self.tick_activity() {
                    tracing::trace!("activity: {}", phrase);
                }
            }
        })
    }

    fn record_terminal(&self, result: &ExecutionResult) {
        self.state().terminal.push(TerminalEntry {
            cmd: result.command().to_string(),
            out: result.output().to_string(),
            err: result.is_error(),
        });
    }

    fn share_location(&self, parameter: Option<String>) -> String {
        let mut state = self.state();
        let Some(location) = state.location else {
            drop(state);
            self.feedback.error("LOC_SIGNAL_MISSING");
            return "ERROR: NO_COORDINATES".to_string();
        };
        let title = parameter.unwrap_or_else(|| "Shared Location".to_string());
        state.conversation.push(ConversationEntry {
            content: format!(
                "LOCATION_BROADCAST: {:.4}, {:.4}",
                location.lat, location.lng
            ),
            location: Some((location, title)),
        });
        drop(state);
        self.feedback.info("LOC_LOGGED_TO_CHRONICLE");
        "SUCCESS: LOGGED_TO_INTERFACE".to_string()
    }

    async fn perform(&self, task: &str, parameter: Option<String>) -> anyhow::Result<String> {
        match task {
            "SWITCH_MODE" => {
                match parameter.as_deref().map(AppMode::from_str) {
                    Some(Ok(mode)) => {
                        self.set_mode(mode);
                        self.feedback.info(format!("MODE_SWITCH: {mode}"));
                    }
                    other => tracing::debug!("ignoring mode switch: {:?}", other),
                }
            }
            "TOGGLE_THINKING" => {
                let thinking = {
                    let mut state = self.state();
                    state.thinking = !state.thinking;
                    state.thinking
                };
                let level = if thinking { "EXPANDED" } else { "STANDARD" };
                self.feedback.info(format!("LOGIC_ENGINE: {level}"));
            }
            "TOGGLE_PERSISTENCE" => {
                let persistent = {
                    let mut state = self.state();
                    state.persistent = !state.persistent;
                    state.persistent
                };
                if persistent {
                    self.feedback.info("PERSISTENCE_ACTIVE");
                } else {
                    self.feedback.warning("PERSISTENCE_DEACTIVATED");
                }
            }
            "CLEAR_CONVERSATION" => {
                {
                    let mut state = self.state();
                    state.conversation.clear();
                    state.terminal.clear();
                }
                self.feedback.info("BUFFER_CLEARED");
            }
            "OPEN_CAMERA" => {
                self.set_mode(AppMode::ImageAnalysis);
                self.feedback.info("OPTIC_INITIALIZED");
            }
            "SHARE_LOCATION" => return Ok(self.share_location(parameter)),
            "INSTALL_TOOL" => {
                let package =
                    parameter.ok_or_else(|| anyhow::anyhow!("INSTALL_TOOL needs a package name"))?;
                self.feedback.info(format!("INSTALLING: {package}"));
                let command = format!("pkg install {package} -y");
                return Ok(self.execute(&command).await.output().to_string());
            }
            "RUN_EXPLOIT" => {
                let module =
                    parameter.ok_or_else(|| anyhow::anyhow!("RUN_EXPLOIT needs a module name"))?;
                self.feedback.info(format!("EXECUTING_EXPLOIT: {module}"));
                self.set_mode(AppMode::Hacking);
                let command = format!("msfconsole -x \"use exploit/{module}; run\"");
                return Ok(self.execute(&command).await.output().to_string());
            }
            _ => self.feedback.warning("INVALID_TASK_REQUEST"),
        }
        Ok(COMMAND_SUCCESS.to_string())
    }
}

#[async_trait]
impl SystemTaskHandler for AssistantConsole {
    async fn run_task(&self, task: &str, parameter: Option<String>) -> anyhow::Result<String> {
        tracing::info!("system task {} ({:?})", task, parameter);
        self.perform(task, parameter).await.inspect_err(|e| {
            tracing::warn!("system task {} failed: {:#}", task, e);
            self.feedback.error("TASK_EXECUTION_FAULT");
        })
    }
}

#[async_trait]
impl CommandExecutor for AssistantConsole {
    fn is_reachable(&self) -> bool {
        self.shell.is_reachable()
    }

    async fn execute(&self, command: &str) -> ExecutionResult {
        if command.trim().is_empty() {
            return self.shell.execute(command).await;
        }
        if !self.shell.is_reachable() {
            let result = ExecutionResult::from_fault(command, FaultKind::BridgeUnreachable);
            self.record_terminal(&result);
            self.feedback.error(FaultKind::BridgeUnreachable.code());
            return result;
        }

        let preview: String = command.chars().take(EXEC_PREVIEW_CHARS).collect();
        self.feedback.info(format!("EXEC: {preview}..."));
        self.state().processing = true;
        let result = self.shell.execute(command).await;
        self.state().processing = false;

        self.record_terminal(&result);
        match result.fault() {
            Some(fault) if fault != FaultKind::CommandFault => self.feedback.error(fault.code()),
            _ => {
                let mut state = self.state();
                if state.mode == AppMode::Hacking {
                    state.activity.push_front(format!("SHELL: {command}"));
                    state.activity.truncate(SHELL_LOG_LIMIT);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockCommandExecutor;
    use mockall::predicate::eq;

    fn online_shell() -> MockCommandExecutor {
        let mut shell = MockCommandExecutor::new();
        shell.expect_is_reachable().return_const(true);
        shell
    }

    fn console(shell: MockCommandExecutor) -> (Arc<AssistantConsole>, FeedbackCenter) {
        let feedback = FeedbackCenter::new();
        let console = Arc::new(AssistantConsole::new(Arc::new(shell), feedback.clone()));
        (console, feedback)
    }

    fn last_feedback(feedback: &FeedbackCenter) -> String {
        feedback
            .current()
            .map(|f| f.message().to_string())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_clear_conversation_wipes_history() {
        // Arrange
        let mut shell = online_shell();
        shell
            .expect_execute()
            .returning(|command| ExecutionResult::from_fault(command, FaultKind::Timeout));
        let (console, feedback) = console(shell);
        console.record_message("hello");
        console.execute("uname -a").await;
        assert_eq!(console.terminal_history().len(), 1);

        // Act
        let result = console.run_task("CLEAR_CONVERSATION", None).await.unwrap();

        // Assert
        assert_eq!(result, "COMMAND_SUCCESS");
        assert!(console.conversation().is_empty());
        assert!(console.terminal_history().is_empty());
        assert_eq!(last_feedback(&feedback), "BUFFER_CLEARED");
    }

    #[tokio::test]
    async fn test_switch_mode_accepts_only_known_modes() {
        let (console, feedback) = console(MockCommandExecutor::new());

        console
            .run_task("SWITCH_MODE", Some("termux".to_string()))
            .await
            .unwrap();
        assert_eq!(console.mode(), AppMode::Termux);
        assert_eq!(last_feedback(&feedback), "MODE_SWITCH: TERMUX");

        let result = console
            .run_task("SWITCH_MODE", Some("WARP_DRIVE".to_string()))
            .await
            .unwrap();
        assert_eq!(result, "COMMAND_SUCCESS");
        assert_eq!(console.mode(), AppMode::Termux);
    }

    #[tokio::test]
    async fn test_toggles_report_new_state() {
        let (console, feedback) = console(MockCommandExecutor::new());

        console.run_task("TOGGLE_THINKING", None).await.unwrap();
        assert!(console.thinking());
        assert_eq!(last_feedback(&feedback), "LOGIC_ENGINE: EXPANDED");

        console.run_task("TOGGLE_PERSISTENCE", None).await.unwrap();
        assert!(console.persistent());
        assert_eq!(last_feedback(&feedback), "PERSISTENCE_ACTIVE");

        console.run_task("TOGGLE_PERSISTENCE", None).await.unwrap();
        assert_eq!(last_feedback(&feedback), "PERSISTENCE_DEACTIVATED");

        console.run_task("OPEN_CAMERA", None).await.unwrap();
        assert_eq!(console.mode(), AppMode::ImageAnalysis);
    }

    #[tokio::test]
    async fn test_share_location_needs_a_fix() {
        let (console, feedback) = console(MockCommandExecutor::new());

        let missing = console.run_task("SHARE_LOCATION", None).await.unwrap();
        assert_eq!(missing, "ERROR: NO_COORDINATES");
        assert_eq!(last_feedback(&feedback), "LOC_SIGNAL_MISSING");

        console.set_location(Some(Location {
            lat: 48.85837,
            lng: 2.294481,
        }));
        let shared = console
            .run_task("SHARE_LOCATION", Some("Ops".to_string()))
            .await
            .unwrap();

        assert_eq!(shared, "SUCCESS: LOGGED_TO_INTERFACE");
        let entry = console.conversation().pop().unwrap();
        assert_eq!(entry.content, "LOCATION_BROADCAST: 48.8584, 2.2945");
        assert_eq!(entry.location.unwrap().1, "Ops");
    }

    #[tokio::test]
    async fn test_install_tool_runs_package_manager() {
        // Arrange
        let mut shell = online_shell();
        shell
            .expect_execute()
            .with(eq("pkg install nmap -y"))
            .times(1)
            .returning(|command| ExecutionResult::from_fault(command, FaultKind::Timeout));
        let (console, feedback) = console(shell);

        // Act
        let result = console
            .run_task("INSTALL_TOOL", Some("nmap".to_string()))
            .await
            .unwrap();

        // Assert
        assert_eq!(result, "CRITICAL: EXECUTION_TIMEOUT");
        assert_eq!(last_feedback(&feedback), "EXECUTION_TIMEOUT");
        assert!(console.terminal_history()[0].err);
        assert!(!console.is_processing());
    }

    #[tokio::test]
    async fn test_run_exploit_switches_to_hacking() {
        let mut shell = online_shell();
        shell
            .expect_execute()
            .with(eq("msfconsole -x \"use exploit/multi/handler; run\""))
            .times(1)
            .returning(|command| ExecutionResult::from_fault(command, FaultKind::CommandFault));
        let (console, _) = console(shell);

        console
            .run_task("RUN_EXPLOIT", Some("multi/handler".to_string()))
            .await
            .unwrap();

        assert_eq!(console.mode(), AppMode::Hacking);
        assert_eq!(
            console.activity_log(),
            vec!["SHELL: msfconsole -x \"use exploit/multi/handler; run\"".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_parameter_is_a_task_fault() {
        let (console, feedback) = console(MockCommandExecutor::new());

        let result = console.run_task("INSTALL_TOOL", None).await;

        assert!(result.is_err());
        assert_eq!(last_feedback(&feedback), "TASK_EXECUTION_FAULT");
    }

    #[tokio::test]
    async fn test_unknown_task_warns_but_succeeds() {
        let (console, feedback) = console(MockCommandExecutor::new());

        let result = console.run_task("SELF_DESTRUCT", None).await.unwrap();

        assert_eq!(result, "COMMAND_SUCCESS");
        let shown = feedback.current().unwrap();
        assert_eq!(shown.message(), "INVALID_TASK_REQUEST");
        assert_eq!(shown.kind(), crate::feedback::FeedbackKind::Warning);
    }

    #[tokio::test]
    async fn test_offline_command_is_logged_without_calling_bridge() {
        let mut shell = MockCommandExecutor::new();
        shell.expect_is_reachable().return_const(false);
        shell.expect_execute().times(0);
        let (console, feedback) = console(shell);

        let result = console.execute("ls").await;

        assert_eq!(result.fault(), Some(FaultKind::BridgeUnreachable));
        assert_eq!(last_feedback(&feedback), "TERMUX_LINK_OFFLINE");
        assert_eq!(
            console.terminal_history(),
            vec![TerminalEntry {
                cmd: "ls".to_string(),
                out: "ERROR: BRIDGE_SIGNAL_LOST. Ensure 'sudO bridge' is active.".to_string(),
                err: true,
            }]
        );
    }

    #[test]
    fn test_ticker_cycles_only_in_hacking_mode() {
        let (console, _) = console(MockCommandExecutor::new());
        assert_eq!(console.tick_activity(), None);

        console.set_mode(AppMode::Hacking);
        for _ in 0..20 {
            console.tick_activity();
        }

        let log = console.activity_log();
        assert_eq!(log.len(), 15);
        // 20 ticks: the newest is phrase index 19 % 6 = 1.
        assert_eq!(log[0], "TRACING_REMOTE_HOST...");
    }

    #[test]
    fn test_mode_names_round_trip() {
        for name in ["CONVERSATION", "IMAGE_GEN", "HACKING", "SETTINGS"] {
            assert_eq!(AppMode::from_str(name).unwrap().as_str(), name);
        }
        assert!(AppMode::from_str("ROOT").is_err());
    }
}
