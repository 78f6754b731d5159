pub mod config;
pub mod devices;
pub mod gemini_adapter;
pub mod prompt_loader;
