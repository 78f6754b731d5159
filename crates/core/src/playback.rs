use anyhow::Result;
use sudo_native_utils::audio::PlayableBuffer;

pub type SourceId = u64;

/// A clocked audio sink that can start buffers at absolute times.
pub trait OutputDevice: Send {
    /// Device time in seconds.
    fn current_time(&self) -> f64;

    fn is_suspended(&self) -> bool;

    fn resume(&mut self) -> Result<()>;

    /// Starts `buffer` at device time `when`.
    fn start_source(&mut self, buffer: PlayableBuffer, when: f64) -> Result<SourceId>;

    fn stop_source(&mut self, id: SourceId);
}

/// A buffer handed to the device, as recorded by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSource {
    pub id: SourceId,
    /// Arrival order of the buffer, starting at 1.
    pub sequence: u64,
    pub start: f64,
    pub duration: f64,
}

impl ScheduledSource {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

pub type DeviceOpener<D> = Box<dyn FnMut() -> Result<D> + Send>;

/// Gapless, in-order playback of inbound audio with barge-in support.
///
/// The cursor and the set of playing sources are owned here and nowhere
/// else: each buffer starts at `max(cursor, device now)` and pushes the
/// cursor forward by its duration, so buffers never overlap.
pub struct PlaybackScheduler<D: OutputDevice> {
    open: DeviceOpener<D>,
    device: Option<D>,
    next_start_time: f64,
    active: Vec<ScheduledSource>,
    sequence: u64,
}

impl<D: OutputDevice> PlaybackScheduler<D> {
    /// The device is opened lazily, on the first `warm_up` or `enqueue`.
    pub fn new(open: impl FnMut() -> Result<D> + Send + 'static) -> Self {
        Self {
            open: Box::new(open),
            device: None,
            next_start_time: 0.0,
            active: Vec::new(),
            sequence: 0,
        }
    }

    fn ensure_device(&mut self) -> Result<&mut D> {
        let device = match self.device.take() {
            Some(device) => device,
            None => {
                let device = (self.open)()?;
                tracing::debug!("output device opened");
                device
            }
        };
        let device = self.device.insert(device);
        if device.is_suspended() {
            device.resume()?;
        }
        Ok(device)
    }

    /// Acquires (and resumes) the output device ahead of the first buffer.
    pub fn warm_up(&mut self) -> Result<()> {
        self.ensure_device().map(|_| ())
    }

    pub fn enqueue(&mut self, buffer: PlayableBuffer) -> Result<ScheduledSource> {
        let duration = buffer.duration();
        let now = self.ensure_device()?.current_time();
        self.active.retain(|source| source.end() > now);

        let start = self.next_start_time.max(now);
        let id = match self.device.as_mut() {
            Some(device) => device.start_source(buffer, start)?,
            None => return Err(anyhow::anyhow!("output device is not open")),
        };

        self.sequence += 1;
        self.next_start_time = start + duration;
        let source = ScheduledSource {
            id,
            sequence: self.sequence,
            start,
            duration,
        };
        tracing::trace!(
            "scheduled chunk #{} at {:.3}s for {:.3}s",
            source.sequence,
            start,
            duration
        );
        self.active.push(source);
        Ok(source)
    }

    /// Stops everything that is playing or queued and rewinds the cursor to
    /// the device's present.
    pub fn interrupt(&mut self) {
        match self.device.as_mut() {
            Some(device) => {
                for source in self.active.drain(..) {
                    device.stop_source(source.id);
                }
                self.next_start_time = device.current_time();
            }
            None => {
                self.active.clear();
                self.next_start_time = 0.0;
            }
        }
        tracing::debug!("playback interrupted");
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use sudo_native_utils::audio::LIVE_OUTPUT_SAMPLE_RATE;

    #[derive(Default)]
    pub(crate) struct FakeDeviceState {
        pub now: f64,
        pub suspended: bool,
        pub opened: usize,
        pub resumed: usize,
        pub started: Vec<(SourceId, f64)>,
        pub stopped: Vec<SourceId>,
    }

    /// A device with a hand-driven clock that records what it was asked to do.
    pub(crate) struct FakeDevice {
        state: Arc<Mutex<FakeDeviceState>>,
    }

    impl OutputDevice for FakeDevice {
        fn current_time(&self) -> f64 {
            self.state.lock().unwrap().now
        }

        fn is_suspended(&self) -> bool {
            self.state.lock().unwrap().suspended
        }

        fn resume(&mut self) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.suspended = false;
            state.resumed += 1;
            Ok(())
        }

        fn start_source(&mut self, _buffer: PlayableBuffer, when: f64) -> Result<SourceId> {
            let mut state = self.state.lock().unwrap();
            let id = state.started.len() as SourceId + 1;
            state.started.push((id, when));
            Ok(id)
        }

        fn stop_source(&mut self, id: SourceId) {
            self.state.lock().unwrap().stopped.push(id);
        }
    }

    pub(crate) fn fake_scheduler() -> (PlaybackScheduler<FakeDevice>, Arc<Mutex<FakeDeviceState>>) {
        let state = Arc::new(Mutex::new(FakeDeviceState {
            suspended: true,
            ..Default::default()
        }));
        let shared = state.clone();
        let scheduler = PlaybackScheduler::new(move || {
            shared.lock().unwrap().opened += 1;
            Ok(FakeDevice {
                state: shared.clone(),
            })
        });
        (scheduler, state)
    }

    pub(crate) fn half_second() -> PlayableBuffer {
        PlayableBuffer::new(vec![0.0; 12000], LIVE_OUTPUT_SAMPLE_RATE, 1)
    }

    #[test]
    fn test_back_to_back_buffers_do_not_overlap() {
        // Arrange
        let (mut scheduler, state) = fake_scheduler();

        // Act
        let first = scheduler.enqueue(half_second()).unwrap();
        let second = scheduler.enqueue(half_second()).unwrap();
        state.lock().unwrap().now = 0.2;
        let third = scheduler
            .enqueue(PlayableBuffer::new(vec![0.0; 2400], LIVE_OUTPUT_SAMPLE_RATE, 1))
            .unwrap();

        // Assert
        assert_eq!(first.start, 0.0);
        assert!(second.start >= first.end());
        assert!((second.start - 0.5).abs() < 1e-9);
        assert!(third.start >= second.end());
        assert_eq!(
            [first.sequence, second.sequence, third.sequence],
            [1, 2, 3]
        );
        assert_eq!(scheduler.active_len(), 3);
    }

    #[test]
    fn test_late_buffer_starts_at_device_now() {
        let (mut scheduler, state) = fake_scheduler();
        scheduler.enqueue(half_second()).unwrap();

        state.lock().unwrap().now = 2.0;
        let late = scheduler.enqueue(half_second()).unwrap();

        assert_eq!(late.start, 2.0);
        // The first buffer finished at 0.5s and is pruned.
        assert_eq!(scheduler.active_len(), 1);
    }

    #[test]
    fn test_interrupt_stops_all_and_resets_cursor() {
        // Arrange
        let (mut scheduler, state) = fake_scheduler();
        let a = scheduler.enqueue(half_second()).unwrap();
        let b = scheduler.enqueue(half_second()).unwrap();
        state.lock().unwrap().now = 0.1;

        // Act
        scheduler.interrupt();
        let c = scheduler.enqueue(half_second()).unwrap();

        // Assert
        assert_eq!(state.lock().unwrap().stopped, vec![a.id, b.id]);
        assert_eq!(c.start, 0.1);
        assert!(c.start < b.end());
        assert_eq!(scheduler.active_len(), 1);
    }

    #[test]
    fn test_interrupt_when_idle_is_a_no_op() {
        let (mut scheduler, state) = fake_scheduler();

        scheduler.interrupt();

        assert_eq!(scheduler.active_len(), 0);
        assert_eq!(scheduler.next_start_time(), 0.0);
        assert_eq!(state.lock().unwrap().opened, 0);
    }

    #[test]
    fn test_device_opened_once_and_resumed_when_suspended() {
        let (mut scheduler, state) = fake_scheduler();

        scheduler.warm_up().unwrap();
        scheduler.warm_up().unwrap();
        scheduler.enqueue(half_second()).unwrap();

        let state = state.lock().unwrap();
        assert_eq!(state.opened, 1);
        assert_eq!(state.resumed, 1);
    }

    #[test]
    fn test_open_failure_is_reported_and_retried() {
        let mut attempts = 0;
        let mut scheduler = PlaybackScheduler::<FakeDevice>::new(move || {
            attempts += 1;
            Err(anyhow::anyhow!("no output device (attempt {attempts})"))
        });

        assert!(scheduler.warm_up().is_err());
        let err = scheduler.enqueue(half_second()).unwrap_err();

        assert!(err.to_string().contains("attempt 2"));
        assert_eq!(scheduler.active_len(), 0);
    }
}
