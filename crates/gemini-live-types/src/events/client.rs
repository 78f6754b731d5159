use crate::audio::Blob;
use crate::setup::Setup;
use crate::tools::FunctionResponse;

/// Frames the client sends on the duplex channel.
///
/// Serialized externally tagged, e.g. `{"setup": {...}}`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    pub fn audio(chunk: Blob) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput::new(chunk))
    }

    pub fn tool_response(response: FunctionResponse) -> Self {
        ClientMessage::ToolResponse(ToolResponse::new(vec![response]))
    }
}

/// `realtimeInput` frame
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    media_chunks: Vec<Blob>,
}

impl RealtimeInput {
    pub fn new(chunk: Blob) -> Self {
        Self {
            media_chunks: vec![chunk],
        }
    }

    pub fn media_chunks(&self) -> &[Blob] {
        &self.media_chunks
    }
}

/// `toolResponse` frame
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    function_responses: Vec<FunctionResponse>,
}

impl ToolResponse {
    pub fn new(function_responses: Vec<FunctionResponse>) -> Self {
        Self { function_responses }
    }

    pub fn function_responses(&self) -> &[FunctionResponse] {
        &self.function_responses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::Setup;
    use crate::tools::{FunctionDeclaration, Tool};
    use serde_json::json;

    #[test]
    fn test_setup_frame_shape() {
        let setup = Setup::new("gemini-live")
            .with_system_instruction("be brief")
            .with_tool(Tool::new(vec![FunctionDeclaration::new(
                "ping",
                json!({"type": "OBJECT", "properties": {}}),
            )]))
            .with_transcription_enable()
            .build();

        let value = serde_json::to_value(ClientMessage::Setup(setup)).unwrap();

        assert_eq!(value["setup"]["model"], "models/gemini-live");
        assert_eq!(
            value["setup"]["generationConfig"]["responseModalities"],
            json!(["AUDIO"])
        );
        assert_eq!(
            value["setup"]["systemInstruction"]["parts"][0]["text"],
            "be brief"
        );
        assert_eq!(
            value["setup"]["tools"][0]["functionDeclarations"][0]["name"],
            "ping"
        );
        assert_eq!(value["setup"]["inputAudioTranscription"], json!({}));
        assert_eq!(value["setup"]["outputAudioTranscription"], json!({}));
    }

    #[test]
    fn test_realtime_input_and_tool_response_shape() {
        let audio = serde_json::to_value(ClientMessage::audio(Blob::pcm16("AAA=".into()))).unwrap();
        assert_eq!(
            audio,
            json!({"realtimeInput": {"mediaChunks": [{"mimeType": "audio/pcm;rate=16000", "data": "AAA="}]}})
        );

        let response = serde_json::to_value(ClientMessage::tool_response(FunctionResponse::new(
            "call-1",
            "executeMobileTask",
            "COMMAND_SUCCESS".to_string(),
        )))
        .unwrap();
        assert_eq!(
            response,
            json!({"toolResponse": {"functionResponses": [
                {"id": "call-1", "name": "executeMobileTask", "response": {"result": "COMMAND_SUCCESS"}}
            ]}})
        );
    }
}
