//! The live voice session engine.
//!
//! One task owns all session state and serialises three inputs: commands
//! from [`SessionHandle`], events from the duplex link, and internal events
//! from helper tasks (answered tool calls, transcript timers). Inbound frames
//! are classified by [`classify`] and each kind has its own handler.

use crate::dispatcher::ToolDispatcher;
use crate::error::SessionError;
use crate::feedback::FeedbackCenter;
use crate::live_api::{LiveConnector, LiveLink, MediaTracks, Microphone};
use crate::playback::{OutputDevice, PlaybackScheduler};
use crate::stats::Stats;
use gemini_live_types::audio::OUTPUT_SAMPLE_RATE;
use gemini_live_types::{Blob, ClientMessage, FunctionCall, FunctionResponse, ServerEvent, ServerMessage, Setup};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use sudo_native_utils::audio::{decode_inbound, encode_outbound};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};

/// How long captions stay up after the model finishes a turn.
pub const TRANSCRIPT_HOLD: Duration = Duration::from_secs(4);
const COMMAND_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closing,
    Error,
}

/// Live captions of the current exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub user: String,
    pub assistant: String,
}

/// The kinds of content a server frame can carry, in handling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    ToolCall,
    Audio,
    Transcript,
    TurnComplete,
    Interrupted,
    Usage,
    GoAway,
    ToolCallCancellation,
}

/// Lists what `message` carries. One frame may hold several kinds.
pub fn classify(message: &ServerMessage) -> Vec<MessageKind> {
    let mut kinds = Vec::new();
    if message.tool_call.is_some() {
        kinds.push(MessageKind::ToolCall);
    }
    if let Some(content) = &message.server_content {
        let has_audio = content.model_turn.as_ref().is_some_and(|turn| {
            turn.parts
                .iter()
                .any(|part| part.inline_data.as_ref().is_some_and(Blob::is_audio))
        });
        if has_audio {
            kinds.push(MessageKind::Audio);
        }
        if content.input_transcription.is_some() || content.output_transcription.is_some() {
            kinds.push(MessageKind::Transcript);
        }
        if content.is_turn_complete() {
            kinds.push(MessageKind::TurnComplete);
        }
        if content.is_interrupted() {
            kinds.push(MessageKind::Interrupted);
        }
    }
    if message.usage_metadata.is_some() {
        kinds.push(MessageKind::Usage);
    }
    if message.go_away.is_some() {
        kinds.push(MessageKind::GoAway);
    }
    if message.tool_call_cancellation.is_some() {
        kinds.push(MessageKind::ToolCallCancellation);
    }
    kinds
}

enum Command {
    Start(oneshot::Sender<Result<(), SessionError>>),
    Stop(oneshot::Sender<()>),
}

enum Internal {
    ToolAnswered(FunctionResponse),
    ClearTranscript,
    Connected {
        attempt: u64,
        result: anyhow::Result<LiveLink>,
    },
}

/// A `start` whose handshake is still in flight. The caller is answered
/// when the handshake settles or the session is stopped.
struct PendingStart {
    attempt: u64,
    connect: tokio::task::JoinHandle<()>,
    reply: oneshot::Sender<Result<(), SessionError>>,
}

/// Microphone state of a running session. Frames wait in `frames` until the
/// channel opens; after that the tap task owns them.
struct Capture {
    frames: Option<mpsc::Receiver<Vec<f32>>>,
    tap: Option<tokio::task::JoinHandle<()>>,
    tracks: Box<dyn MediaTracks>,
}

/// Cloneable control surface of a running [`LiveSession`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
    transcript: watch::Receiver<Transcript>,
    stats: watch::Receiver<Stats>,
}

impl SessionHandle {
    /// Opens the microphone and the duplex channel. Returns once the channel
    /// is connected; the session turns `Active` when the model accepts setup.
    /// A `stop` issued meanwhile makes this fail with `Cancelled`.
    pub async fn start(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Start(reply_tx))
            .await
            .map_err(|_| SessionError::EngineGone)?;
        reply_rx.await.map_err(|_| SessionError::EngineGone)?
    }

    /// Tears the session down. Safe to call in any state, any number of times.
    pub async fn stop(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::Stop(reply_tx)).await.is_ok() {
            let _ = reply_rx.await;
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript.borrow().clone()
    }

    pub fn subscribe_transcript(&self) -> watch::Receiver<Transcript> {
        self.transcript.clone()
    }

    pub fn stats(&self) -> Stats {
        *self.stats.borrow()
    }
}

pub struct LiveSession<D: OutputDevice> {
    connector: Arc<dyn LiveConnector>,
    microphone: Arc<dyn Microphone>,
    dispatcher: ToolDispatcher,
    scheduler: PlaybackScheduler<D>,
    feedback: FeedbackCenter,
    setup: Setup,

    commands: mpsc::Receiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    state_tx: watch::Sender<SessionState>,
    transcript_tx: watch::Sender<Transcript>,
    stats_tx: watch::Sender<Stats>,

    link: Option<LiveLink>,
    capture: Option<Capture>,
    pending_calls: HashSet<String>,
    pending_start: Option<PendingStart>,
    attempts: u64,
}

impl<D: OutputDevice + 'static> LiveSession<D> {
    pub fn new(
        connector: Arc<dyn LiveConnector>,
        microphone: Arc<dyn Microphone>,
        dispatcher: ToolDispatcher,
        scheduler: PlaybackScheduler<D>,
        feedback: FeedbackCenter,
        setup: Setup,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionState::Idle);
        let (transcript_tx, transcript) = watch::channel(Transcript::default());
        let (stats_tx, stats) = watch::channel(Stats::new());

        let session = Self {
            connector,
            microphone,
            dispatcher,
            scheduler,
            feedback,
            setup,
            commands,
            internal_tx,
            internal_rx,
            state_tx,
            transcript_tx,
            stats_tx,
            link: None,
            capture: None,
            pending_calls: HashSet::new(),
            pending_start: None,
            attempts: 0,
        };
        let handle = SessionHandle {
            commands: commands_tx,
            state,
            transcript,
            stats,
        };
        (session, handle)
    }

    /// Runs until every [`SessionHandle`] is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = next_link_event(&mut self.link) => {
                    self.handle_event(event).await;
                }
                Some(internal) = self.internal_rx.recv() => {
                    self.handle_internal(internal).await;
                }
            }
        }
        self.teardown();
        tracing::debug!("session engine stopped");
    }

    fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::info!("session state {:?} -> {:?}", previous, state);
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(reply) => match self.start().await {
                Ok(connect) => {
                    self.pending_start = Some(PendingStart {
                        attempt: self.attempts,
                        connect,
                        reply,
                    });
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Stop(reply) => {
                self.stop();
                let _ = reply.send(());
            }
        }
    }

    /// Opens the microphone and spawns the handshake. The engine keeps
    /// serving commands while it runs, so `stop` can cut it short.
    async fn start(&mut self) -> Result<tokio::task::JoinHandle<()>, SessionError> {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(SessionError::AlreadyRunning(state));
        }
        self.stats_tx.send_replace(Stats::new());

        if let Err(e) = self.scheduler.warm_up() {
            tracing::error!("failed to initialise audio output: {:#}", e);
            self.feedback.error("AUDIO_INIT_FAULT");
        }

        let stream = match self.microphone.open().await {
            Ok(stream) => stream,
            Err(fault) => {
                self.feedback.error("MIC_ACCESS_DENIED");
                return Err(fault.into());
            }
        };
        let (frames, tracks) = stream.into_parts();
        self.capture = Some(Capture {
            frames: Some(frames),
            tap: None,
            tracks,
        });

        self.set_state(SessionState::Connecting);
        self.attempts += 1;
        let attempt = self.attempts;
        let connector = self.connector.clone();
        let setup = self.setup.clone();
        let internal_tx = self.internal_tx.clone();
        Ok(tokio::spawn(async move {
            let result = connector.connect(setup).await;
            let _ = internal_tx.send(Internal::Connected { attempt, result });
        }))
    }

    fn on_connected(&mut self, attempt: u64, result: anyhow::Result<LiveLink>) {
        let pending = self
            .pending_start
            .take_if(|pending| pending.attempt == attempt);
        let Some(pending) = pending else {
            // The start this belonged to was stopped before the handshake settled.
            match result {
                Ok(link) => link.close(),
                Err(e) => tracing::debug!("ignoring failed handshake {}: {:#}", attempt, e),
            }
            return;
        };
        match result {
            Ok(link) => {
                self.link = Some(link);
                let _ = pending.reply.send(Ok(()));
            }
            Err(e) => {
                tracing::error!("failed to open live channel: {:#}", e);
                self.teardown();
                let _ = pending.reply.send(Err(SessionError::Channel(e)));
            }
        }
    }

    fn stop(&mut self) {
        match self.state() {
            SessionState::Connecting | SessionState::Active => {
                self.set_state(SessionState::Closing);
                self.teardown();
            }
            SessionState::Idle | SessionState::Closing | SessionState::Error => {
                tracing::debug!("stop requested while {:?}", self.state());
            }
        }
    }

    /// Releases the microphone and the channel and returns to `Idle`.
    /// Idempotent.
    fn teardown(&mut self) {
        if let Some(pending) = self.pending_start.take() {
            pending.connect.abort();
            let _ = pending.reply.send(Err(SessionError::Cancelled));
        }
        if let Some(mut capture) = self.capture.take() {
            if let Some(tap) = capture.tap.take() {
                tap.abort();
            }
            capture.tracks.stop();
        }
        if let Some(link) = self.link.take() {
            link.close();
        }
        if !self.pending_calls.is_empty() {
            tracing::debug!(
                "dropping {} unanswered tool calls",
                self.pending_calls.len()
            );
            self.pending_calls.clear();
        }
        self.transcript_tx.send_replace(Transcript::default());
        self.set_state(SessionState::Idle);
    }

    async fn handle_event(&mut self, event: Option<ServerEvent>) {
        match event {
            Some(ServerEvent::Open) => self.on_open(),
            Some(ServerEvent::Message(message)) => self.on_message(*message),
            Some(ServerEvent::Error { message }) => {
                tracing::error!("live channel error: {}", message);
                self.feedback.error("NEURAL_LINK_FAULT");
                self.set_state(SessionState::Error);
                self.teardown();
            }
            Some(ServerEvent::Close { reason }) => {
                tracing::info!("live channel closed: {:?}", reason);
                self.teardown();
            }
            None => {
                tracing::info!("live channel ended");
                self.teardown();
            }
        }
    }

    fn on_open(&mut self) {
        if self.state() != SessionState::Connecting {
            tracing::debug!("ignoring open while {:?}", self.state());
            return;
        }
        let Some(outbound) = self.link.as_ref().map(LiveLink::outbound) else {
            return;
        };
        if let Some(capture) = self.capture.as_mut() {
            if let Some(mut frames) = capture.frames.take() {
                let mut stale = 0;
                while frames.try_recv().is_ok() {
                    stale += 1;
                }
                if stale > 0 {
                    tracing::debug!("discarded {} frames captured before open", stale);
                }
                capture.tap = Some(tokio::spawn(capture_tap(frames, outbound)));
            }
        }
        self.set_state(SessionState::Active);
    }

    fn on_message(&mut self, message: ServerMessage) {
        for kind in classify(&message) {
            match kind {
                MessageKind::ToolCall => self.on_tool_call(&message),
                MessageKind::Audio => self.on_audio(&message),
                MessageKind::Transcript => self.on_transcript(&message),
                MessageKind::TurnComplete => self.on_turn_complete(),
                MessageKind::Interrupted => self.scheduler.interrupt(),
                MessageKind::Usage => self.on_usage(&message),
                MessageKind::GoAway => {
                    let time_left = message.go_away.as_ref().and_then(|g| g.time_left.clone());
                    tracing::warn!("live channel closing soon, time left: {:?}", time_left);
                }
                MessageKind::ToolCallCancellation => {
                    if let Some(cancellation) = &message.tool_call_cancellation {
                        tracing::info!(
                            "model cancelled tool calls {:?}; they run to completion",
                            cancellation.ids
                        );
                    }
                }
            }
        }
    }

    fn on_tool_call(&mut self, message: &ServerMessage) {
        let Some(tool_call) = &message.tool_call else {
            return;
        };
        for call in &tool_call.function_calls {
            self.spawn_tool_call(call.clone());
        }
    }

    fn spawn_tool_call(&mut self, call: FunctionCall) {
        self.pending_calls.insert(call.id().to_string());
        let dispatcher = self.dispatcher.clone();
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let response = dispatcher.dispatch(&call).await;
            let _ = internal_tx.send(Internal::ToolAnswered(response));
        });
    }

    fn on_audio(&mut self, message: &ServerMessage) {
        let parts = message
            .server_content
            .iter()
            .filter_map(|content| content.model_turn.as_ref())
            .flat_map(|turn| turn.parts.iter())
            .filter_map(|part| part.inline_data.as_ref())
            .filter(|blob| blob.is_audio());
        for blob in parts {
            match decode_inbound(blob.data(), OUTPUT_SAMPLE_RATE, 1) {
                Ok(buffer) => {
                    if let Err(e) = self.scheduler.enqueue(buffer) {
                        tracing::error!("failed to schedule audio: {:#}", e);
                        self.feedback.error("AUDIO_INIT_FAULT");
                    }
                }
                Err(fault) => {
                    tracing::debug!("dropping undecodable audio chunk: {}", fault);
                }
            }
        }
    }

    fn on_transcript(&mut self, message: &ServerMessage) {
        let Some(content) = &message.server_content else {
            return;
        };
        self.transcript_tx.send_modify(|transcript| {
            if let Some(output) = &content.output_transcription {
                transcript.assistant.push_str(&output.text);
            }
            if let Some(input) = &content.input_transcription {
                transcript.user.push_str(&input.text);
            }
        });
    }

    // Clears unconditionally, even if a new turn started in the meantime.
    fn on_turn_complete(&self) {
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(TRANSCRIPT_HOLD).await;
            let _ = internal_tx.send(Internal::ClearTranscript);
        });
    }

    fn on_usage(&mut self, message: &ServerMessage) {
        if let Some(usage) = &message.usage_metadata {
            self.stats_tx.send_modify(|stats| stats.update_usage(usage));
            tracing::debug!("usage: {:?}", usage);
        }
    }

    async fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::ToolAnswered(response) => {
                let pending = self.pending_calls.remove(response.id());
                let outbound = self.link.as_ref().map(LiveLink::outbound);
                match outbound {
                    Some(outbound) if pending => {
                        tracing::info!("tool response {} -> {}", response.id(), response.result());
                        if let Err(e) = outbound.send(ClientMessage::tool_response(response)).await
                        {
                            tracing::warn!("failed to send tool response: {}", e);
                        }
                    }
                    _ => tracing::debug!("dropping late tool response {}", response.id()),
                }
            }
            Internal::ClearTranscript => {
                self.transcript_tx.send_replace(Transcript::default());
            }
            Internal::Connected { attempt, result } => self.on_connected(attempt, result),
        }
    }
}

async fn next_link_event(link: &mut Option<LiveLink>) -> Option<ServerEvent> {
    match link {
        Some(link) => link.next_event().await,
        None => std::future::pending().await,
    }
}

/// Encodes captured frames and offers them to the outbound queue. A full
/// queue drops the frame rather than stalling capture.
async fn capture_tap(mut frames: mpsc::Receiver<Vec<f32>>, outbound: mpsc::Sender<ClientMessage>) {
    while let Some(frame) = frames.recv().await {
        let chunk = encode_outbound(&frame);
        if chunk.is_empty() {
            continue;
        }
        match outbound.try_send(ClientMessage::audio(Blob::pcm16(chunk))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::warn!("outbound queue full, dropping audio frame"),
            Err(TrySendError::Closed(_)) => break,
        }
    }
    tracing::debug!("capture tap finished");
}
