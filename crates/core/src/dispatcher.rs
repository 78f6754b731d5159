use crate::bridge::CommandExecutor;
use crate::error::DispatchFault;
use crate::tools::{COMMAND_FAILURE, MOBILE_TASK_TOOL, TERMUX_COMMAND_TOOL};
use async_trait::async_trait;
use gemini_live_types::{FunctionCall, FunctionResponse};
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

/// Runs the named device-level tasks (`SWITCH_MODE`, `CLEAR_CONVERSATION`, ...).
/// Returns the text the model receives as the tool result.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SystemTaskHandler: Send + Sync {
    async fn run_task(&self, task: &str, parameter: Option<String>) -> anyhow::Result<String>;
}

/// Routes tool calls to their handlers and always answers.
#[derive(Clone)]
pub struct ToolDispatcher {
    system: Arc<dyn SystemTaskHandler>,
    shell: Arc<dyn CommandExecutor>,
}

impl ToolDispatcher {
    pub fn new(system: Arc<dyn SystemTaskHandler>, shell: Arc<dyn CommandExecutor>) -> Self {
        Self { system, shell }
    }

    /// Produces exactly one response for `call`, carrying its id and name.
    /// Faults of any kind, including a panicking handler, become
    /// `COMMAND_FAILURE`.
    pub async fn dispatch(&self, call: &FunctionCall) -> FunctionResponse {
        tracing::info!("tool call {} ({})", call.name(), call.id());
        let result = match self.spawn_handler(call) {
            Ok(handle) => match handle.await {
                Ok(Ok(result)) => result,
                Ok(Err(fault)) => {
                    tracing::warn!("tool call {} failed: {}", call.id(), fault);
                    COMMAND_FAILURE.to_string()
                }
                Err(e) => {
                    let fault = DispatchFault::Aborted(e.to_string());
                    tracing::error!("tool call {} failed: {}", call.id(), fault);
                    COMMAND_FAILURE.to_string()
                }
            },
            Err(fault) => {
                tracing::warn!("tool call {} rejected: {}", call.id(), fault);
                COMMAND_FAILURE.to_string()
            }
        };
        FunctionResponse::new(call.id(), call.name(), result)
    }

    fn spawn_handler(
        &self,
        call: &FunctionCall,
    ) -> Result<tokio::task::JoinHandle<Result<String, DispatchFault>>, DispatchFault> {
        match call.name() {
            MOBILE_TASK_TOOL => {
                let task = required_arg(call, "task")?;
                let parameter = call.str_arg("parameter").map(str::to_string);
                let system = self.system.clone();
                Ok(tokio::spawn(async move {
                    system
                        .run_task(&task, parameter)
                        .await
                        .map_err(DispatchFault::Handler)
                }))
            }
            TERMUX_COMMAND_TOOL => {
                let command = required_arg(call, "command")?;
                if let Some(description) = call.str_arg("description") {
                    tracing::debug!("command purpose: {}", description);
                }
                let shell = self.shell.clone();
                Ok(tokio::spawn(async move {
                    Ok(shell.execute(&command).await.output().to_string())
                }))
            }
            other => Err(DispatchFault::UnsupportedTool(other.to_string())),
        }
    }
}

fn required_arg(call: &FunctionCall, argument: &str) -> Result<String, DispatchFault> {
    call.str_arg(argument)
        .map(str::to_string)
        .ok_or_else(|| DispatchFault::InvalidArguments {
            tool: call.name().to_string(),
            argument: argument.to_string(),
        })
}
