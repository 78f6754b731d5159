/// Audio data encoded as base64
pub type Base64EncodedAudioBytes = String;

/// Sample rate of the PCM16 audio the live API accepts from the client.
pub const INPUT_SAMPLE_RATE: u32 = 16000;
/// Sample rate of the PCM16 audio the live API streams back.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;
/// MIME tag attached to every outbound audio chunk.
pub const INPUT_AUDIO_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Inline binary payload (`inlineData` / `mediaChunks[]`).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    mime_type: String,
    data: Base64EncodedAudioBytes,
}

impl Blob {
    pub fn new(mime_type: &str, data: Base64EncodedAudioBytes) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data,
        }
    }

    /// A 16 kHz PCM chunk ready to be streamed to the model.
    pub fn pcm16(data: Base64EncodedAudioBytes) -> Self {
        Self::new(INPUT_AUDIO_MIME_TYPE, data)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }
}
