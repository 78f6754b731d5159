//now people using the types library can use these types
pub mod audio;
pub mod events;
pub mod setup;
pub mod tools;

//re-export types for easier access
pub use audio::{Base64EncodedAudioBytes, Blob};
pub use events::{ClientMessage, ServerEvent, ServerMessage};
pub use setup::Setup;
pub use tools::{FunctionCall, FunctionResponse, Tool};
