use crate::audio::{PlayableBuffer, resample_mono};
use crate::mixer::{Timeline, VoiceId};
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};

enum OutputCommand {
    Pause(mpsc::Sender<Result<()>>),
    Resume(mpsc::Sender<Result<()>>),
    Close,
}

/// A playback stream on a dedicated thread, driven by a shared [`Timeline`].
///
/// `cpal::Stream` is not `Send`, so the stream lives on its own thread and is
/// controlled through a command channel.
pub struct AudioOutput {
    timeline: Arc<Mutex<Timeline>>,
    suspended: Arc<AtomicBool>,
    commands: mpsc::Sender<OutputCommand>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl AudioOutput {
    /// Opens the named output device (or the default one) and starts playing.
    pub fn open(device_name: Option<String>) -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<Arc<Mutex<Timeline>>>>();
        let (commands, command_rx) = mpsc::channel::<OutputCommand>();
        let suspended = Arc::new(AtomicBool::new(false));

        let thread_suspended = suspended.clone();
        let thread = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let (stream, timeline) = match build_stream(device_name) {
                    Ok(built) => built,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(timeline));

                while let Ok(command) = command_rx.recv() {
                    match command {
                        OutputCommand::Pause(reply) => {
                            let result = stream.pause().context("Failed to pause output stream");
                            if result.is_ok() {
                                thread_suspended.store(true, Ordering::SeqCst);
                            }
                            let _ = reply.send(result);
                        }
                        OutputCommand::Resume(reply) => {
                            let result = stream.play().context("Failed to resume output stream");
                            if result.is_ok() {
                                thread_suspended.store(false, Ordering::SeqCst);
                            }
                            let _ = reply.send(result);
                        }
                        OutputCommand::Close => break,
                    }
                }
                tracing::debug!("audio output thread finished");
            })
            .context("Failed to spawn audio output thread")?;

        let timeline = ready_rx
            .recv()
            .context("Audio output thread exited during setup")??;

        Ok(Self {
            timeline,
            suspended,
            commands,
            thread: Some(thread),
        })
    }

    fn timeline(&self) -> Result<std::sync::MutexGuard<'_, Timeline>> {
        self.timeline
            .lock()
            .map_err(|_| anyhow::anyhow!("output timeline lock poisoned"))
    }

    /// Seconds of audio the device has consumed.
    pub fn now_secs(&self) -> f64 {
        self.timeline().map(|t| t.now_secs()).unwrap_or_default()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn suspend(&self) -> Result<()> {
        self.request(OutputCommand::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.request(OutputCommand::Resume)
    }

    fn request(&self, command: fn(mpsc::Sender<Result<()>>) -> OutputCommand) -> Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .send(command(reply_tx))
            .map_err(|_| anyhow::anyhow!("audio output thread is gone"))?;
        reply_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("audio output thread did not answer"))?
    }

    /// Schedules a buffer to start at `when` seconds on the device clock.
    pub fn play_at(&self, buffer: PlayableBuffer, when: f64) -> Result<VoiceId> {
        let source_rate = buffer.sample_rate();
        let device_rate = self.timeline()?.sample_rate();
        let mono = buffer.into_mono();
        let samples = resample_mono(&mono, source_rate, device_rate)?;
        Ok(self.timeline()?.schedule(samples, when))
    }

    pub fn stop(&self, id: VoiceId) -> bool {
        self.timeline().map(|mut t| t.cancel(id)).unwrap_or(false)
    }

    pub fn stop_all(&self) {
        if let Ok(mut timeline) = self.timeline() {
            timeline.cancel_all();
        }
    }

    pub fn close(&mut self) {
        let _ = self.commands.send(OutputCommand::Close);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("audio output thread panicked");
            }
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.close();
    }
}

fn build_stream(device_name: Option<String>) -> Result<(cpal::Stream, Arc<Mutex<Timeline>>)> {
    let output = crate::device::get_or_default_output(device_name)
        .context("Failed to get audio output device")?;
    tracing::info!("Using output device: {:?}", output.name()?);

    let default_config = output
        .default_output_config()
        .context("Failed to get default output config")?;
    let config = cpal::StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    tracing::info!("Output stream config: {:?}", &config);

    let timeline = Arc::new(Mutex::new(Timeline::new(
        config.sample_rate.0,
        config.channels,
    )));
    let render_timeline = timeline.clone();
    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        match render_timeline.lock() {
            Ok(mut timeline) => timeline.render(data),
            Err(_) => data.fill(0.0),
        }
    };

    let stream = output.build_output_stream(
        &config,
        output_data_fn,
        move |err| tracing::error!("An error occurred on output stream: {}", err),
        None,
    )?;
    stream.play()?;
    Ok((stream, timeline))
}
