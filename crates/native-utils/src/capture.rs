use crate::audio::{LIVE_INPUT_SAMPLE_RATE, create_resampler, downmix_to_mono};
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use rubato::{FastFixedIn, Resampler};
use std::sync::mpsc;

/// Samples per frame handed to the consumer, at 16 kHz mono.
pub const CAPTURE_FRAME_SIZE: usize = 4096;
const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Turns device-rate interleaved input into fixed-size 16 kHz mono frames.
pub struct FrameAssembler {
    channels: usize,
    resampler: Option<FastFixedIn<f32>>,
    pending: Vec<f32>,
    frame: Vec<f32>,
}

impl FrameAssembler {
    pub fn new(device_rate: u32, channels: u16) -> Result<Self> {
        let resampler = if device_rate == LIVE_INPUT_SAMPLE_RATE {
            None
        } else {
            Some(create_resampler(
                device_rate as f64,
                LIVE_INPUT_SAMPLE_RATE as f64,
                RESAMPLER_CHUNK_SIZE,
            )?)
        };
        Ok(Self {
            channels: channels.max(1) as usize,
            resampler,
            pending: Vec::with_capacity(RESAMPLER_CHUNK_SIZE * 2),
            frame: Vec::with_capacity(CAPTURE_FRAME_SIZE * 2),
        })
    }

    /// Feeds one callback's worth of input and returns every completed frame.
    pub fn push(&mut self, data: &[f32]) -> Vec<Vec<f32>> {
        let mono = downmix_to_mono(data, self.channels);
        match self.resampler.as_mut() {
            None => self.frame.extend_from_slice(&mono),
            Some(resampler) => {
                self.pending.extend_from_slice(&mono);
                loop {
                    let needed = resampler.input_frames_next();
                    if self.pending.len() < needed {
                        break;
                    }
                    let chunk: Vec<f32> = self.pending.drain(..needed).collect();
                    match resampler.process(&[chunk.as_slice()], None) {
                        Ok(out) => {
                            if let Some(channel) = out.first() {
                                self.frame.extend_from_slice(channel);
                            }
                        }
                        Err(e) => tracing::warn!("Failed to resample input audio: {}", e),
                    }
                }
            }
        }

        let mut frames = Vec::new();
        while self.frame.len() >= CAPTURE_FRAME_SIZE {
            frames.push(self.frame.drain(..CAPTURE_FRAME_SIZE).collect());
        }
        frames
    }
}

/// A running microphone stream. Stopping (or dropping) it releases the device.
pub struct AudioCapture {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl AudioCapture {
    /// Opens the named input device (or the default one). Completed frames are
    /// offered to `frames` without waiting; a full channel drops the frame.
    pub fn start(
        device_name: Option<String>,
        frames: tokio::sync::mpsc::Sender<Vec<f32>>,
    ) -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream = match build_stream(device_name, frames) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Blocks until stop is requested or the handle is dropped.
                let _ = stop_rx.recv();
                if let Err(e) = stream.pause() {
                    tracing::debug!("Failed to pause input stream: {}", e);
                }
                tracing::debug!("audio capture thread finished");
            })
            .context("Failed to spawn audio capture thread")?;

        ready_rx
            .recv()
            .context("Audio capture thread exited during setup")??;

        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Stops the stream and waits for the device to be released. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("audio capture thread panicked");
            }
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_stream(
    device_name: Option<String>,
    frames: tokio::sync::mpsc::Sender<Vec<f32>>,
) -> Result<cpal::Stream> {
    let input = crate::device::get_or_default_input(device_name)
        .context("Failed to get audio input device")?;
    tracing::info!("Using input device: {:?}", input.name()?);

    let default_config = input
        .default_input_config()
        .context("Failed to get default input config")?;
    let config = cpal::StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    tracing::info!("Input stream config: {:?}", &config);

    let mut assembler = FrameAssembler::new(config.sample_rate.0, config.channels)?;
    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        for frame in assembler.push(data) {
            if let Err(e) = frames.try_send(frame) {
                tracing::warn!("Failed to send captured frame: {:?}", e);
            }
        }
    };

    let stream = input.build_input_stream(
        &config,
        input_data_fn,
        move |err| tracing::error!("An error occurred on input stream: {}", err),
        None,
    )?;
    stream.play()?;
    Ok(stream)
}
