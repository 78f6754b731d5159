pub mod client;
pub mod server;

pub use client::{ClientMessage, RealtimeInput, ToolResponse};
pub use server::{
    GoAway, LiveServerContent, ModelTurn, ServerMessage, ServerPart, ToolCall,
    ToolCallCancellation, Transcription, UsageMetadata,
};

/// Events surfaced by a live connection to its consumer.
///
/// `Message` wraps every decoded frame except `setupComplete`, which is
/// promoted to `Open` because it marks the moment the channel is usable.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Open,
    Message(Box<ServerMessage>),
    Error { message: String },
    Close { reason: Option<String> },
}

impl ServerEvent {
    /// Classifies a decoded frame.
    pub fn from_message(message: ServerMessage) -> Self {
        if message.setup_complete.is_some() {
            ServerEvent::Open
        } else {
            ServerEvent::Message(Box::new(message))
        }
    }
}
