//! Sample-accurate mixing of mono voices onto a running frame clock.
//!
//! The output callback owns the clock: every call to [`Timeline::render`]
//! advances it by the number of frames written, so the clock stands still
//! while the stream is paused.

pub type VoiceId = u64;

struct Voice {
    id: VoiceId,
    start_frame: u64,
    samples: Vec<f32>,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

pub struct Timeline {
    sample_rate: u32,
    channels: u16,
    frame_clock: u64,
    voices: Vec<Voice>,
    next_id: VoiceId,
}

impl Timeline {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            frame_clock: 0,
            voices: Vec::new(),
            next_id: 1,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Seconds rendered since the timeline was created.
    pub fn now_secs(&self) -> f64 {
        self.frame_clock as f64 / self.sample_rate as f64
    }

    /// Schedules mono samples (at the timeline rate) to start at `start_secs`.
    /// A start time in the past begins at the next rendered frame.
    pub fn schedule(&mut self, samples: Vec<f32>, start_secs: f64) -> VoiceId {
        let requested = (start_secs.max(0.0) * self.sample_rate as f64).round() as u64;
        let id = self.next_id;
        self.next_id += 1;
        self.voices.push(Voice {
            id,
            start_frame: requested.max(self.frame_clock),
            samples,
        });
        id
    }

    /// Removes a voice. Returns false when it already finished or never existed.
    pub fn cancel(&mut self, id: VoiceId) -> bool {
        let before = self.voices.len();
        self.voices.retain(|v| v.id != id);
        self.voices.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.voices.clear();
    }

    pub fn is_playing(&self, id: VoiceId) -> bool {
        self.voices.iter().any(|v| v.id == id)
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Fills an interleaved output buffer and advances the clock.
    pub fn render(&mut self, out: &mut [f32]) {
        let channels = self.channels as usize;
        let frames = out.len() / channels;
        out.fill(0.0);

        let window_start = self.frame_clock;
        let window_end = window_start + frames as u64;
        for voice in &self.voices {
            let from = voice.start_frame.max(window_start);
            let to = voice.end_frame().min(window_end);
            for frame in from..to {
                let sample = voice.samples[(frame - voice.start_frame) as usize];
                let offset = (frame - window_start) as usize * channels;
                for slot in &mut out[offset..offset + channels] {
                    *slot += sample;
                }
            }
        }
        for slot in out.iter_mut() {
            *slot = slot.clamp(-1.0, 1.0);
        }

        self.frame_clock = window_end;
        self.voices.retain(|v| v.end_frame() > window_end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_starts_on_its_frame() {
        let mut timeline = Timeline::new(10, 1);
        timeline.schedule(vec![0.5, 0.5], 0.3);

        let mut out = vec![1.0; 6];
        timeline.render(&mut out);

        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.5, 0.5, 0.0]);
        assert!((timeline.now_secs() - 0.6).abs() < 1e-9);
        assert_eq!(timeline.active_voices(), 0);
    }

    #[test]
    fn test_back_to_back_voices_span_render_calls() {
        let mut timeline = Timeline::new(10, 1);
        let first = timeline.schedule(vec![0.1; 3], 0.0);
        timeline.schedule(vec![0.2; 3], 0.3);

        let mut out = vec![0.0; 4];
        timeline.render(&mut out);
        assert_eq!(out, vec![0.1, 0.1, 0.1, 0.2]);
        assert!(!timeline.is_playing(first));

        timeline.render(&mut out);
        assert_eq!(out, vec![0.2, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_fans_mono_out_to_every_channel() {
        let mut timeline = Timeline::new(10, 2);
        timeline.schedule(vec![0.25], 0.0);

        let mut out = vec![0.0; 4];
        timeline.render(&mut out);

        assert_eq!(out, vec![0.25, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_past_start_plays_immediately() {
        let mut timeline = Timeline::new(10, 1);
        let mut out = vec![0.0; 5];
        timeline.render(&mut out);

        timeline.schedule(vec![0.3], 0.1);
        timeline.render(&mut out);

        assert_eq!(out[0], 0.3);
    }

    #[test]
    fn test_cancel_silences_voice() {
        let mut timeline = Timeline::new(10, 1);
        let id = timeline.schedule(vec![0.4; 10], 0.0);

        assert!(timeline.cancel(id));
        assert!(!timeline.cancel(id));

        let mut out = vec![0.0; 4];
        timeline.render(&mut out);
        assert_eq!(out, vec![0.0; 4]);
    }
}
