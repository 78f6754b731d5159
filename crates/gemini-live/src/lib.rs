mod client;

pub use client::config::{Config, ConfigBuilder};
pub use client::{Client, ClientTx, ServerRx, connect_with_config};
pub use gemini_live_types as types;
