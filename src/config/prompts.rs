//! Prompt templates for script synthesis and insights generation.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub script: ScriptPrompts,
    pub insights: InsightsPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for script synthesis (narration and dialogue).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptPrompts {
    pub narration_system: String,
    pub narration_user: String,
    pub dialogue_system: String,
    pub dialogue_user: String,
}

impl Default for ScriptPrompts {
    fn default() -> Self {
        Self {
            narration_system: r#"You are a narration writer. Rewrite the given source text as a single flowing narration script suitable for a text-to-speech engine. Stay grounded in the source; do not invent facts. Keep length appropriate for the requested expressiveness."#.to_string(),

            narration_user: r#"Source text:
{{source_text}}

Style: {{style}}
Accent: {{accent}}
Expressiveness: {{expressiveness}}

Write the narration script now. Output only the script text, no headers or commentary."#.to_string(),

            dialogue_system: r#"You are a podcast script writer. Convert the given source text into a two-speaker dialogue between exactly two speakers labeled "Speaker 1" and "Speaker 2". The speakers should alternate naturally, react to each other, and occasionally interrupt, while remaining strictly grounded in the source material. Every line MUST begin with "Speaker 1:" or "Speaker 2:" followed by the spoken text."#.to_string(),

            dialogue_user: r#"Source text:
{{source_text}}

Style: {{style}}
Accent: {{accent}}
Expressiveness: {{expressiveness}}

Write the two-speaker dialogue now, one line per turn, each line starting with "Speaker 1:" or "Speaker 2:". Output only the dialogue, no headers or commentary."#.to_string(),
        }
    }
}

/// Prompts for insights and cross-document insights generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsPrompts {
    pub insights_system: String,
    pub insights_user: String,
    pub cross_insights_system: String,
    pub cross_insights_user: String,
}

impl Default for InsightsPrompts {
    fn default() -> Self {
        Self {
            insights_system: r#"You are a research assistant that produces grounded insights from a document collection. Answer using only the provided excerpts. Cite every claim with [filename p.N]."#.to_string(),

            insights_user: r#"Subject:
{{subject}}

Relevant excerpts:
{{chunks}}

Produce a concise set of insights about the subject, each citing its source excerpt."#.to_string(),

            cross_insights_system: r#"You are a research assistant that compares claims across multiple documents. Identify agreements (claims multiple documents support) and contradictions (claims documents disagree on). Cite every claim with [filename p.N]."#.to_string(),

            cross_insights_user: r#"Documents under comparison:
{{filenames}}

Relevant excerpts per document:
{{chunks}}

Focus: {{focus}}

Respond in exactly this format, with one bullet per claim:

Agreements:
- <claim> [filename p.N] [filename p.N]

Contradictions:
- <claim> [filename p.N] [filename p.N]

Every bullet must cite at least one excerpt. Write "None." under a header with nothing to report."#.to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let script_path = custom_path.join("script.toml");
            if script_path.exists() {
                let content = std::fs::read_to_string(&script_path)?;
                prompts.script = toml::from_str(&content)?;
            }

            let insights_path = custom_path.join("insights.toml");
            if insights_path.exists() {
                let content = std::fs::read_to_string(&insights_path)?;
                prompts.insights = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.script.dialogue_system.is_empty());
        assert!(!prompts.insights.insights_system.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = std::collections::HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }
}
