//! Tool declarations and fixed prompts offered to the live model.

use gemini_live_types::setup::Modality;
use gemini_live_types::tools::FunctionDeclaration;
use gemini_live_types::{Setup, Tool};
use serde_json::json;

pub const LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";

pub const MOBILE_TASK_TOOL: &str = "executeMobileTask";
pub const TERMUX_COMMAND_TOOL: &str = "executeTermuxCommand";

pub const COMMAND_SUCCESS: &str = "COMMAND_SUCCESS";
pub const COMMAND_FAILURE: &str = "COMMAND_FAILURE";

pub const SYSTEM_INSTRUCTION: &str = "You are sudO, an executive AI for mobile. You were created by NYNOAH, a visionary developer. You have functional hacking capabilities via Termux. You can install tools like Metasploit, Nmap, etc. using INSTALL_TOOL. You can execute exploits using RUN_EXPLOIT. Keep your tone executive and technical. Speak with pride about your capabilities. If Termux is offline, explain that the user needs to start the sudO bridge.";

pub fn mobile_task_declaration() -> FunctionDeclaration {
    FunctionDeclaration::new(
        MOBILE_TASK_TOOL,
        json!({
            "type": "OBJECT",
            "description": "Execute a mobile system task based on user voice command.",
            "properties": {
                "task": {
                    "type": "STRING",
                    "description": "The type of task to perform. Values: \"SWITCH_MODE\", \"TOGGLE_THINKING\", \"CLEAR_CONVERSATION\", \"OPEN_CAMERA\", \"TOGGLE_PERSISTENCE\", \"SHARE_LOCATION\", \"INSTALL_TOOL\", \"RUN_EXPLOIT\""
                },
                "parameter": {
                    "type": "STRING",
                    "description": "Context for the task (e.g., target mode name for SWITCH_MODE, contact name for SHARE_LOCATION, or tool name for INSTALL_TOOL like \"metasploit\", \"nmap\")"
                }
            },
            "required": ["task"]
        }),
    )
}

pub fn termux_command_declaration() -> FunctionDeclaration {
    FunctionDeclaration::new(
        TERMUX_COMMAND_TOOL,
        json!({
            "type": "OBJECT",
            "description": "Execute a shell command inside the Termux environment.",
            "properties": {
                "command": {
                    "type": "STRING",
                    "description": "The full shell command to run (e.g., \"pkg update\", \"ls -la\", \"python script.py\")."
                },
                "description": {
                    "type": "STRING",
                    "description": "A brief explanation of what this command will do."
                }
            },
            "required": ["command"]
        }),
    )
}

/// Both declarations, grouped the way the setup frame expects them.
pub fn tool_declarations() -> Tool {
    Tool::new(vec![mobile_task_declaration(), termux_command_declaration()])
}

/// The setup frame of a voice session: audio replies, both tools, and
/// transcription in both directions.
pub fn live_setup(model: &str, instruction: &str) -> Setup {
    Setup::new(model)
        .with_response_modalities(vec![Modality::Audio])
        .with_system_instruction(instruction)
        .with_tool(tool_declarations())
        .with_transcription_enable()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declarations_serialize_with_required_fields() {
        let tool = serde_json::to_value(tool_declarations()).unwrap();
        let declarations = tool["functionDeclarations"].as_array().unwrap();

        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0]["name"], "executeMobileTask");
        assert_eq!(declarations[0]["parameters"]["required"], json!(["task"]));
        assert_eq!(declarations[1]["name"], "executeTermuxCommand");
        assert_eq!(declarations[1]["parameters"]["required"], json!(["command"]));
        assert_eq!(
            declarations[1]["parameters"]["properties"]["description"]["type"],
            "STRING"
        );
    }

    #[test]
    fn test_live_setup_frame_shape() {
        let setup = serde_json::to_value(live_setup(LIVE_MODEL, SYSTEM_INSTRUCTION)).unwrap();

        assert_eq!(
            setup["model"],
            "models/gemini-2.5-flash-native-audio-preview-12-2025"
        );
        assert_eq!(setup["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            setup["systemInstruction"]["parts"][0]["text"],
            SYSTEM_INSTRUCTION
        );
        assert_eq!(setup["tools"][0]["functionDeclarations"].as_array().unwrap().len(), 2);
        assert_eq!(setup["inputAudioTranscription"], json!({}));
        assert_eq!(setup["outputAudioTranscription"], json!({}));
    }
}
