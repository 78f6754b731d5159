use crate::session::SessionState;

/// The microphone could not be opened (denied, missing or busy).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("microphone unavailable: {0}")]
pub struct PermissionFault(pub String);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a session is already {0:?}")]
    AlreadyRunning(SessionState),
    #[error(transparent)]
    Permission(#[from] PermissionFault),
    #[error("duplex channel setup failed: {0:#}")]
    Channel(anyhow::Error),
    #[error("session start was cancelled")]
    Cancelled,
    #[error("session engine is no longer running")]
    EngineGone,
}

/// Why a tool call could not be served by its handler.
#[derive(Debug, thiserror::Error)]
pub enum DispatchFault {
    #[error("unsupported tool: {0}")]
    UnsupportedTool(String),
    #[error("tool {tool} is missing required argument `{argument}`")]
    InvalidArguments { tool: String, argument: String },
    #[error("handler failed: {0:#}")]
    Handler(anyhow::Error),
    #[error("handler task aborted: {0}")]
    Aborted(String),
}
