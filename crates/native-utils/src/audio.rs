use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Sample rate the live API expects for microphone audio.
pub const LIVE_INPUT_SAMPLE_RATE: u32 = 16000;
/// Sample rate of the synthesized audio the live API streams back.
pub const LIVE_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Width in bytes of one PCM16 sample on the wire.
const SAMPLE_WIDTH: usize = 2;
const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Base64 text carrying little-endian PCM16 samples.
pub type TransportChunk = String;

/// Why an inbound chunk could not be turned into playable audio.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeFault {
    #[error("chunk is not valid base64: {0}")]
    Encoding(String),
    #[error("chunk of {len} bytes is not a whole number of 16-bit samples")]
    PartialSample { len: usize },
    #[error("{samples} samples do not split into {channels}-channel frames")]
    PartialFrame { samples: usize, channels: u16 },
}

/// Decoded audio, interleaved when `channels > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl PlayableBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn into_mono(self) -> Vec<f32> {
        downmix_to_mono(&self.samples, self.channels as usize)
    }
}

/// Encodes float PCM in [-1, 1] as base64 PCM16 for the transport.
pub fn encode_outbound(samples: &[f32]) -> TransportChunk {
    if samples.is_empty() {
        return TransportChunk::new();
    }
    base64::engine::general_purpose::STANDARD.encode(to_pcm16_bytes(samples))
}

/// Decodes a base64 PCM16 chunk into a playable buffer.
pub fn decode_inbound(
    chunk: &str,
    sample_rate: u32,
    channels: u16,
) -> Result<PlayableBuffer, DecodeFault> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(chunk)
        .map_err(|e| DecodeFault::Encoding(e.to_string()))?;
    if bytes.len() % SAMPLE_WIDTH != 0 {
        return Err(DecodeFault::PartialSample { len: bytes.len() });
    }
    let samples = bytes.len() / SAMPLE_WIDTH;
    if channels == 0 || samples % channels as usize != 0 {
        return Err(DecodeFault::PartialFrame { samples, channels });
    }
    let pcm = bytes
        .chunks_exact(SAMPLE_WIDTH)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect();
    Ok(PlayableBuffer::new(pcm, sample_rate, channels))
}

/// Averages interleaved frames down to one channel.
pub fn downmix_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels > 1 {
        data.chunks(channels)
            .map(|c| c.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        data.to_vec()
    }
}

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits a slice of audio samples into fixed-size chunks.
/// If the last chunk is smaller than `chunk_size`, it is padded with zeros.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Resamples a complete mono buffer. The zero padding of the last chunk is
/// trimmed so the result keeps the input's duration.
pub fn resample_mono(samples: &[f32], in_rate: u32, out_rate: u32) -> anyhow::Result<Vec<f32>> {
    if in_rate == out_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let mut resampler = create_resampler(in_rate as f64, out_rate as f64, RESAMPLE_CHUNK_SIZE)?;
    let expected = (samples.len() as f64 * out_rate as f64 / in_rate as f64).round() as usize;

    let mut resampled = Vec::with_capacity(expected + RESAMPLE_CHUNK_SIZE);
    for chunk in split_for_chunks(samples, RESAMPLE_CHUNK_SIZE) {
        let out = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = out.first() {
            resampled.extend_from_slice(channel);
        }
    }
    resampled.resize(expected, 0.0);
    Ok(resampled)
}

/// Little-endian PCM16 bytes of float samples, clamped to [-1, 1].
fn to_pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| {
            let v = (sample.clamp(-1.0, 1.0) * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32)
                as i16;
            v.to_le_bytes()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_empty_is_empty_chunk() {
        assert_eq!(encode_outbound(&[]), "");
    }

    #[test]
    fn test_encode_clamps_and_is_little_endian() {
        let chunk = encode_outbound(&[0.0, 2.0, -2.0, 0.5]);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(chunk)
            .unwrap();

        assert_eq!(bytes, vec![0x00, 0x00, 0xff, 0x7f, 0x00, 0x80, 0x00, 0x40]);
    }

    #[test]
    fn test_decode_scales_back_to_float_range() {
        // -32768, 0, 16384 as PCM16 LE
        let chunk = base64::engine::general_purpose::STANDARD.encode([0x00u8, 0x80, 0x00, 0x00, 0x00, 0x40]);

        let buffer = decode_inbound(&chunk, LIVE_OUTPUT_SAMPLE_RATE, 1).unwrap();

        assert_eq!(buffer.samples(), &[-1.0, 0.0, 0.5]);
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.sample_rate(), 24000);
    }

    #[test]
    fn test_decode_rejects_odd_byte_length() {
        let chunk = base64::engine::general_purpose::STANDARD.encode([0x00u8, 0x80, 0x00]);

        let fault = decode_inbound(&chunk, LIVE_OUTPUT_SAMPLE_RATE, 1).unwrap_err();

        assert_eq!(fault, DecodeFault::PartialSample { len: 3 });
    }

    #[test]
    fn test_decode_rejects_partial_frames_and_bad_base64() {
        let chunk = base64::engine::general_purpose::STANDARD.encode([0u8; 6]);
        assert_eq!(
            decode_inbound(&chunk, LIVE_OUTPUT_SAMPLE_RATE, 2).unwrap_err(),
            DecodeFault::PartialFrame {
                samples: 3,
                channels: 2
            }
        );
        assert!(matches!(
            decode_inbound("***", LIVE_OUTPUT_SAMPLE_RATE, 1),
            Err(DecodeFault::Encoding(_))
        ));
    }

    #[test]
    fn test_duration_of_half_second() {
        let buffer = PlayableBuffer::new(vec![0.0; 12000], LIVE_OUTPUT_SAMPLE_RATE, 1);
        assert!((buffer.duration() - 0.5).abs() < f64::EPSILON);

        let stereo = PlayableBuffer::new(vec![0.0; 24000], LIVE_OUTPUT_SAMPLE_RATE, 2);
        assert!((stereo.duration() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_downmix_averages_frames() {
        assert_eq!(downmix_to_mono(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix_to_mono(&[0.25], 1), vec![0.25]);
    }

    #[test]
    fn test_resample_keeps_duration() {
        let samples = vec![0.1; 24000];

        let resampled = resample_mono(&samples, 24000, 48000).unwrap();
        assert_eq!(resampled.len(), 48000);

        let same = resample_mono(&samples, 24000, 24000).unwrap();
        assert_eq!(same.len(), 24000);
    }
}
