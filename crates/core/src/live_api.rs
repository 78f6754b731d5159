use crate::error::PermissionFault;
use async_trait::async_trait;
use gemini_live_types::{ClientMessage, ServerEvent, Setup};
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

type Closer = Box<dyn FnOnce() + Send>;

/// An open duplex channel: a queue towards the model and a stream of events
/// from it. Closing (or dropping) the link releases the connection.
pub struct LiveLink {
    outbound: mpsc::Sender<ClientMessage>,
    events: mpsc::Receiver<ServerEvent>,
    closer: Option<Closer>,
}

impl LiveLink {
    pub fn new(outbound: mpsc::Sender<ClientMessage>, events: mpsc::Receiver<ServerEvent>) -> Self {
        Self {
            outbound,
            events,
            closer: None,
        }
    }

    /// Runs `closer` once when the link is closed or dropped.
    pub fn with_closer(mut self, closer: impl FnOnce() + Send + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }

    pub fn outbound(&self) -> mpsc::Sender<ClientMessage> {
        self.outbound.clone()
    }

    /// `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.events.close();
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl Drop for LiveLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Opens duplex channels to the live model.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Connects and sends `setup` as the first frame. The returned link
    /// yields `ServerEvent::Open` once the model accepted the setup.
    async fn connect(&self, setup: Setup) -> anyhow::Result<LiveLink>;
}

/// The hardware side of an open microphone.
pub trait MediaTracks: Send {
    /// Releases the device. Must tolerate repeated calls.
    fn stop(&mut self);
}

/// 16 kHz mono frames from an open microphone, plus the tracks to stop it.
pub struct CaptureStream {
    frames: mpsc::Receiver<Vec<f32>>,
    tracks: Box<dyn MediaTracks>,
}

impl CaptureStream {
    pub fn new(frames: mpsc::Receiver<Vec<f32>>, tracks: Box<dyn MediaTracks>) -> Self {
        Self { frames, tracks }
    }

    pub fn into_parts(self) -> (mpsc::Receiver<Vec<f32>>, Box<dyn MediaTracks>) {
        (self.frames, self.tracks)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Microphone: Send + Sync {
    async fn open(&self) -> Result<CaptureStream, PermissionFault>;
}
