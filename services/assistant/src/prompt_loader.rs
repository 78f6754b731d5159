use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use sudo_core::tools::SYSTEM_INSTRUCTION;

/// Key of the prompt that replaces the built-in system instruction.
pub const LIVE_SESSION_PROMPT: &str = "live_session";

/// Reads every `*.md` file in `dir_path`, keyed by file stem.
pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let key = path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Could not get file stem for prompt file")?
            .to_string();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;
        prompts.insert(key, content);
    }

    Ok(prompts)
}

/// The live session's system instruction: the `live_session` prompt when it
/// exists and is not blank, the built-in one otherwise.
pub fn system_instruction(prompts: &HashMap<String, String>) -> String {
    prompts
        .get(LIVE_SESSION_PROMPT)
        .map(|prompt| prompt.trim())
        .filter(|prompt| !prompt.is_empty())
        .unwrap_or(SYSTEM_INSTRUCTION)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_prompts_reads_markdown_only() -> Result<()> {
        // Arrange
        let dir = tempdir()?;
        let dir_path = dir.path();
        let mut live = File::create(dir_path.join("live_session.md"))?;
        writeln!(live, "You are a terse shell assistant.")?;
        let mut notes = File::create(dir_path.join("notes.txt"))?;
        writeln!(notes, "not a prompt")?;
        std::fs::create_dir(dir_path.join("drafts.md"))?;

        // Act
        let prompts = load_prompts(dir_path)?;

        // Assert
        assert_eq!(prompts.len(), 1, "Should only load .md files");
        assert_eq!(
            prompts.get("live_session").map(String::as_str),
            Some("You are a terse shell assistant.\n")
        );
        Ok(())
    }

    #[test]
    fn test_load_prompts_from_nonexistent_dir() {
        let result = load_prompts(Path::new("nonexistent_dir_for_testing_prompts"));

        assert!(result.is_err());
    }

    #[test]
    fn test_system_instruction_override_and_fallback() {
        let mut prompts = HashMap::new();
        assert_eq!(system_instruction(&prompts), SYSTEM_INSTRUCTION);

        prompts.insert(LIVE_SESSION_PROMPT.to_string(), "   \n".to_string());
        assert_eq!(system_instruction(&prompts), SYSTEM_INSTRUCTION);

        prompts.insert(LIVE_SESSION_PROMPT.to_string(), "Be brief.\n".to_string());
        assert_eq!(system_instruction(&prompts), "Be brief.");
    }
}
