pub mod bridge;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod feedback;
pub mod live_api;
pub mod playback;
pub mod session;
pub mod stats;
pub mod tools;

// re-export the pieces a runtime needs to assemble a session
pub use bridge::{BridgeClient, BridgeConfig, CommandExecutor, ExecutionResult, FaultKind};
pub use console::{AppMode, AssistantConsole};
pub use dispatcher::{SystemTaskHandler, ToolDispatcher};
pub use error::{DispatchFault, PermissionFault, SessionError};
pub use feedback::{Feedback, FeedbackCenter, FeedbackKind};
pub use live_api::{CaptureStream, LiveConnector, LiveLink, MediaTracks, Microphone};
pub use playback::{OutputDevice, PlaybackScheduler, SourceId};
pub use session::{LiveSession, SessionHandle, SessionState, Transcript};
pub use stats::Stats;
