//! Adapters from the session's device seams to the cpal streams in
//! `sudo_native_utils`.

use anyhow::Result;
use async_trait::async_trait;
use sudo_core::error::PermissionFault;
use sudo_core::live_api::{CaptureStream, MediaTracks, Microphone};
use sudo_core::playback::{OutputDevice, SourceId};
use sudo_native_utils::audio::PlayableBuffer;
use sudo_native_utils::capture::AudioCapture;
use sudo_native_utils::output::AudioOutput;
use tokio::sync::mpsc;

/// Opens the configured input device for each session.
pub struct CpalMicrophone {
    device_name: Option<String>,
    queue: usize,
}

impl CpalMicrophone {
    pub fn new(device_name: Option<String>, queue: usize) -> Self {
        Self { device_name, queue }
    }
}

struct CaptureTracks(AudioCapture);

impl MediaTracks for CaptureTracks {
    fn stop(&mut self) {
        self.0.stop();
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn open(&self) -> Result<CaptureStream, PermissionFault> {
        let (frames_tx, frames_rx) = mpsc::channel(self.queue);
        let device_name = self.device_name.clone();
        // Opening blocks until the capture thread reports the stream is live.
        let capture = tokio::task::spawn_blocking(move || AudioCapture::start(device_name, frames_tx))
            .await
            .map_err(|e| PermissionFault(e.to_string()))?
            .map_err(|e| {
                tracing::error!("Failed to open microphone: {:#}", e);
                PermissionFault(format!("{e:#}"))
            })?;
        Ok(CaptureStream::new(frames_rx, Box::new(CaptureTracks(capture))))
    }
}

/// The output device as the playback scheduler sees it.
pub struct CpalOutput(AudioOutput);

impl CpalOutput {
    pub fn open(device_name: Option<String>) -> Result<Self> {
        AudioOutput::open(device_name).map(Self)
    }
}

impl OutputDevice for CpalOutput {
    fn current_time(&self) -> f64 {
        self.0.now_secs()
    }

    fn is_suspended(&self) -> bool {
        self.0.is_suspended()
    }

    fn resume(&mut self) -> Result<()> {
        self.0.resume()
    }

    fn start_source(&mut self, buffer: PlayableBuffer, when: f64) -> Result<SourceId> {
        self.0.play_at(buffer, when)
    }

    fn stop_source(&mut self, id: SourceId) {
        if !self.0.stop(id) {
            tracing::trace!("source {} already finished", id);
        }
    }
}
