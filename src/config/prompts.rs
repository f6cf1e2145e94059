//! Prompt templates for Lectern.
//!
//! The describe prompt can be customized by placing a `describe.toml` file in the
//! custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    /// Instruction sent with every segment.
    pub describe: DescribePrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for segment description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescribePrompts {
    pub instruction: String,
}

impl Default for DescribePrompts {
    fn default() -> Self {
        Self {
            instruction: r#"You are watching a {{segment_seconds}} second excerpt of a recorded lecture.
Describe what is said and shown, in order, as a list of time ranges.

Write every entry on its own line in exactly this form:
[hh:mm:ss to hh:mm:ss] description

Times are relative to the start of this excerpt, which begins at 00:00:00.
Use two digits for hours, minutes and seconds."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let describe_path = custom_path.join("describe.toml");
            if describe_path.exists() {
                let content = std::fs::read_to_string(&describe_path)?;
                prompts.describe = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render the describe instruction for a given segment length.
    /// Config variables are applied first; `segment_seconds` always wins.
    pub fn describe_instruction(&self, segment_seconds: u32) -> String {
        let mut vars = self.variables.clone();
        vars.insert("segment_seconds".to_string(), segment_seconds.to_string());
        Self::render(&self.describe.instruction, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        assert_eq!(Prompts::render(template, &vars), "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_describe_instruction_mentions_marker_format() {
        let prompts = Prompts::default();
        let instruction = prompts.describe_instruction(120);
        assert!(instruction.contains("120 second excerpt"));
        assert!(instruction.contains("[hh:mm:ss to hh:mm:ss]"));
        assert!(!instruction.contains("{{"));
    }

    #[test]
    fn test_custom_describe_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("describe.toml"),
            "instruction = \"Course {{course}}: describe {{segment_seconds}}s\"\n",
        )
        .unwrap();

        let mut vars = HashMap::new();
        vars.insert("course".to_string(), "CS101".to_string());
        let prompts = Prompts::load(dir.path().to_str(), Some(&vars)).unwrap();

        assert_eq!(prompts.describe_instruction(60), "Course CS101: describe 60s");
    }
}
