//! Prompt templates for vidquiz.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub describe: DescribePrompts,
    pub quiz: QuizPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Default instruction sent with the video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescribePrompts {
    pub default_prompt: String,
}

impl Default for DescribePrompts {
    fn default() -> Self {
        Self {
            default_prompt: r#"**Objective:** Analyze the provided video content and generate a structured summary.

**Based *only* on the provided video, please provide the following:**

1.  **Main Topics Covered:**
    * Identify and list the primary subjects or themes discussed throughout the video. Use a concise bulleted list.

2.  **Detailed Summary:**
    * Write a comprehensive summary that accurately captures the main arguments, information flow, key concepts, and conclusions presented in the video.
    * Structure the summary logically (e.g., following the video's progression or grouping related ideas).
    * Ensure the summary is detailed enough to give someone who hasn't seen the video a thorough understanding of its content.

3.  **Key Takeaways / Highlights:**
    * Extract the most significant points, essential facts, core messages, findings, or actionable advice presented.
    * List these as clear, concise bullet points, focusing on the essential highlights.

4.  **Relevant Online Resources:**
    * Include any specific URLs or resource names explicitly mentioned in the video.
    * If few or no resources are mentioned, suggest 3-5 relevant, high-quality external resources related to the topic.
    * Briefly describe the content and relevance of each resource.

**Instructions:**
* Use clear headings for each of the four sections requested above.
* Derive all summaries and key points *directly* from the video. Do not add external information to the summary or key points."#
                .to_string(),
        }
    }
}

/// Prompts for quiz generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizPrompts {
    pub system: String,
    pub user: String,
    /// Sent back when a response could not be parsed.
    pub repair: String,
}

impl Default for QuizPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a quiz author. You write clear multiple-choice questions that test understanding of a source text.

Rules:
- Use only information from the source text. Ignore external references mentioned within it.
- Frame questions naturally. Never write "According to the text..." or similar source attributions.
- Every question has exactly four options: one correct answer and three plausible distractors.
- Respond with a single JSON object and nothing else."#
                .to_string(),

            user: r#"Based *only* on the following text extracted from the video description:

--- START VIDEO DESCRIPTION TEXT ---
{{description}}
--- END VIDEO DESCRIPTION TEXT ---

Generate between {{min_questions}} and {{max_questions}} multiple-choice quiz questions.

Focus on specific details: key facts, concepts, definitions, processes, steps, arguments, or terminology.

Respond with JSON in exactly this shape:
{
  "questions": [
    {
      "question": "What is the primary subject of the video?",
      "options": ["Subject A", "Subject B", "Subject C", "Subject D"],
      "correct_option_index": 2
    }
  ]
}

"correct_option_index" is the zero-based index (0-3) of the single correct option. Do not prefix options with letters."#
                .to_string(),

            repair: r#"Your previous response could not be used: {{error}}

Reply again with only the JSON object described above, containing between {{min_questions}} and {{max_questions}} questions, each with exactly four options and one correct_option_index from 0 to 3."#
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

            let quiz_path = custom_path.join("quiz.toml");
            if quiz_path.exists() {
                let content = std::fs::read_to_string(&quiz_path)?;
                prompts.quiz = toml::from_str(&content)?;
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

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
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
        assert!(!prompts.describe.default_prompt.is_empty());
        assert!(prompts.quiz.user.contains("{{description}}"));
        assert!(prompts.quiz.repair.contains("{{error}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_custom_variables_are_overridden_by_call_site() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("audience".to_string(), "students".to_string());
        prompts.variables.insert("level".to_string(), "basic".to_string());

        let mut vars = HashMap::new();
        vars.insert("level".to_string(), "advanced".to_string());

        let result = prompts.render_with_custom("{{audience}} at {{level}} level", &vars);
        assert_eq!(result, "students at advanced level");
    }

    #[test]
    fn test_load_custom_quiz_prompts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("quiz.toml"),
            "system = \"custom system\"\nuser = \"{{description}}\"\nrepair = \"{{error}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.quiz.system, "custom system");
        assert!(!prompts.describe.default_prompt.is_empty());
    }
}
