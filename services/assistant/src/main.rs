use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::sync::Arc;
use sudo_assistant::config::{CAPTURE_QUEUE, CHANNEL_CAPACITY, Config};
use sudo_assistant::devices::{CpalMicrophone, CpalOutput};
use sudo_assistant::gemini_adapter::GeminiConnector;
use sudo_assistant::prompt_loader;
use sudo_core::bridge::{BridgeClient, BridgeConfig, CommandExecutor};
use sudo_core::console::AssistantConsole;
use sudo_core::dispatcher::ToolDispatcher;
use sudo_core::feedback::FeedbackCenter;
use sudo_core::playback::PlaybackScheduler;
use sudo_core::session::{LiveSession, SessionState};
use sudo_core::tools::live_setup;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Voice-driven mobile assistant with a Termux command bridge")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a live voice session (default)
    Live,
    /// Run a single shell command through the command bridge
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Check whether the command bridge is reachable
    Status,
    /// List the available audio devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 4. Initialize the Command Bridge ---
    let bridge = Arc::new(BridgeClient::new(
        BridgeConfig::new(&config.bridge_endpoint).with_exec_timeout(config.exec_timeout),
    ));

    match args.command.unwrap_or(Command::Live) {
        Command::Live => run_live(config, bridge).await,
        Command::Exec { command } => run_exec(&bridge, &command.join(" ")).await,
        Command::Status => {
            let reachable = bridge.poll_health().await;
            println!(
                "{}: {}",
                bridge.config().endpoint(),
                if reachable { "ONLINE" } else { "OFFLINE" }
            );
            Ok(())
        }
        Command::Devices => {
            println!("{}", sudo_native_utils::device::get_available_inputs()?);
            println!("{}", sudo_native_utils::device::get_available_outputs()?);
            Ok(())
        }
    }
}

async fn run_exec(bridge: &BridgeClient, command: &str) -> Result<()> {
    bridge.poll_health().await;
    let result = bridge.execute(command).await;
    println!("{}", result.output());
    match result.fault() {
        Some(fault) => anyhow::bail!("command failed: {}", fault.code()),
        None if result.is_error() => anyhow::bail!("command reported an error"),
        None => Ok(()),
    }
}

async fn run_live(config: Config, bridge: Arc<BridgeClient>) -> Result<()> {
    let api_key = config
        .require_api_key()
        .context("A live session needs an API key")?;
    tracing::info!("Configuration loaded successfully. Starting live assistant...");

    // --- 5. Load Prompts ---
    let prompts = prompt_loader::load_prompts(&config.prompts_dir).unwrap_or_else(|e| {
        tracing::warn!("No prompt overrides loaded: {:#}", e);
        HashMap::new()
    });
    let instruction = prompt_loader::system_instruction(&prompts);
    tracing::info!("Loaded {} prompts.", prompts.len());

    // --- 6. Background Monitors ---
    bridge.poll_health().await;
    let health_monitor = bridge.clone().spawn_health_monitor();

    let feedback = FeedbackCenter::new();
    let console = Arc::new(AssistantConsole::new(bridge.clone(), feedback.clone()));
    let activity_ticker = console.clone().spawn_activity_ticker();

    // --- 7. Assemble the Session ---
    let output_device = config.output_device.clone();
    let scheduler = PlaybackScheduler::new(move || CpalOutput::open(output_device.clone()));
    let microphone = Arc::new(CpalMicrophone::new(config.input_device.clone(), CAPTURE_QUEUE));
    let setup = live_setup(&config.live_model, &instruction);
    let connector = Arc::new(GeminiConnector::new(api_key, CHANNEL_CAPACITY));
    let dispatcher = ToolDispatcher::new(console.clone(), console.clone());

    let (session, handle) =
        LiveSession::new(connector, microphone, dispatcher, scheduler, feedback, setup);
    let engine = tokio::spawn(session.run());

    // --- 8. Run Until Ctrl-C or the Remote Side Closes ---
    let started = tokio::select! {
        started = handle.start() => {
            started.context("Failed to start live session")?;
            true
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C while connecting, shutting down...");
            false
        }
    };
    if started {
        tracing::info!("Live session connecting. Press Ctrl-C to stop.");
    }

    let mut state = handle.subscribe_state();
    let mut transcript = handle.subscribe_transcript();
    while started {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down...");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() || *state.borrow_and_update() == SessionState::Idle {
                    tracing::info!("Live session ended.");
                    break;
                }
            }
            changed = transcript.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = transcript.borrow_and_update().clone();
                if !current.user.is_empty() || !current.assistant.is_empty() {
                    tracing::debug!("User: {:?} | sudO: {:?}", current.user, current.assistant);
                }
            }
        }
    }

    // --- 9. Shutdown ---
    handle.stop().await;
    let stats = handle.stats();
    drop(handle);
    if let Err(e) = engine.await {
        tracing::error!("Session engine task failed: {}", e);
    }
    health_monitor.abort();
    activity_ticker.abort();

    tracing::info!("Session stats: {}", serde_json::to_string(&stats)?);
    tracing::info!(
        "Commands run this session: {}",
        console.terminal_history().len()
    );
    Ok(())
}
