//! Quiz generation with bounded correction rounds.

use super::{parse_quiz, CountRange, Quiz};
use crate::completion::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::config::{Prompts, QuizSettings};
use crate::error::{Result, VidquizError};
use crate::retry::{with_retry, RetryPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Turns a description into a validated quiz.
pub struct QuizGenerator {
    provider: Arc<dyn CompletionProvider>,
    prompts: Prompts,
    temperature: f32,
    max_repairs: u32,
    retry: RetryPolicy,
}

impl QuizGenerator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        prompts: Prompts,
        settings: &QuizSettings,
    ) -> Self {
        Self {
            provider,
            prompts,
            temperature: settings.temperature,
            max_repairs: settings.max_parse_repairs,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    fn render(&self, template: &str, range: CountRange, extra: Option<(&str, &str)>) -> String {
        let mut vars = HashMap::new();
        vars.insert("min_questions".to_string(), range.min.to_string());
        vars.insert("max_questions".to_string(), range.max.to_string());
        if let Some((key, value)) = extra {
            vars.insert(key.to_string(), value.to_string());
        }
        self.prompts.render_with_custom(template, &vars)
    }

    /// Generate between `range.min` and `range.max` questions about `description`.
    ///
    /// A response that does not parse or validate is sent back with the error
    /// up to `max_parse_repairs` times before `Parse` is returned.
    #[instrument(skip(self, description), fields(model = self.provider.model_id(), range = %range))]
    pub async fn generate(&self, description: &str, range: CountRange) -> Result<Quiz> {
        if description.trim().is_empty() {
            return Err(VidquizError::InvalidInput(
                "cannot generate a quiz from an empty description".to_string(),
            ));
        }

        let mut request = CompletionRequest {
            system: self.render(&self.prompts.quiz.system, range, None),
            messages: vec![ChatMessage::user(self.render(
                &self.prompts.quiz.user,
                range,
                Some(("description", description.trim())),
            ))],
            temperature: self.temperature,
            json_mode: true,
        };

        let mut round = 0;
        loop {
            let provider = &self.provider;
            let current = &request;
            let response = with_retry(&self.retry, "Quiz generation", move |_| async move {
                provider.complete(current).await
            })
            .await?;

            let outcome = parse_quiz(&response).and_then(|quiz| quiz.validate(range).map(|_| quiz));
            match outcome {
                Ok(quiz) => {
                    info!("Generated {} questions", quiz.len());
                    return Ok(quiz);
                }
                Err(e) if round < self.max_repairs => {
                    round += 1;
                    warn!(
                        "Quiz response rejected ({}), asking for a correction ({}/{})",
                        e, round, self.max_repairs
                    );
                    let reason = e.to_string();
                    request.messages.push(ChatMessage::assistant(response));
                    request.messages.push(ChatMessage::user(self.render(
                        &self.prompts.quiz.repair,
                        range,
                        Some(("error", reason.as_str())),
                    )));
                }
                Err(e) => {
                    return Err(VidquizError::Parse(format!(
                        "{} (after {} correction attempts)",
                        e.to_string().trim_start_matches("Could not parse quiz response: "),
                        round
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned responses and records every request.
    pub(crate) struct ScriptedProvider {
        responses: Mutex<Vec<String>>,
        pub(crate) requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(responses: Vec<String>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| VidquizError::upstream("Scripted", "no more responses"))
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    pub(crate) fn quiz_json(count: usize) -> String {
        let questions: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "question": format!("Question {}?", i + 1),
                    "options": ["w", "x", "y", "z"],
                    "correct_option_index": i % 4,
                })
            })
            .collect();
        serde_json::json!({ "questions": questions }).to_string()
    }

    fn generator(provider: Arc<ScriptedProvider>, max_repairs: u32) -> QuizGenerator {
        let settings = QuizSettings {
            max_parse_repairs: max_repairs,
            ..Default::default()
        };
        QuizGenerator::new(provider, Prompts::default(), &settings)
            .with_retry_policy(RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_generates_within_range() {
        let provider = Arc::new(ScriptedProvider::new(vec![quiz_json(12)]));
        let quiz = generator(provider.clone(), 2)
            .generate("Rust ownership explained.", CountRange::new(10, 20).unwrap())
            .await
            .unwrap();

        assert_eq!(quiz.len(), 12);
        assert!(quiz.questions.iter().all(|q| q.correct_option_index <= 3));

        let requests = provider.requests.lock().unwrap();
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.contains("--- START VIDEO DESCRIPTION TEXT ---\nRust ownership explained."));
        assert!(prompt.contains("between 10 and 20"));
        assert!(requests[0].json_mode);
    }

    #[tokio::test]
    async fn test_malformed_response_is_repaired() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "Sure! Here are some questions.".to_string(),
            quiz_json(3),
        ]));
        let quiz = generator(provider.clone(), 2)
            .generate("text", CountRange::new(2, 4).unwrap())
            .await
            .unwrap();

        assert_eq!(quiz.len(), 3);
        assert_eq!(provider.calls(), 2);

        let requests = provider.requests.lock().unwrap();
        let second = &requests[1];
        assert_eq!(second.messages.len(), 3);
        assert!(second.messages[2].content.contains("could not be used"));
    }

    #[tokio::test]
    async fn test_wrong_count_triggers_repair() {
        let provider = Arc::new(ScriptedProvider::new(vec![quiz_json(25), quiz_json(15)]));
        let quiz = generator(provider.clone(), 1)
            .generate("text", CountRange::new(10, 20).unwrap())
            .await
            .unwrap();
        assert_eq!(quiz.len(), 15);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_repairs() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "nope".to_string(),
            "still nope".to_string(),
            "never".to_string(),
        ]));
        let result = generator(provider.clone(), 2)
            .generate("text", CountRange::new(1, 5).unwrap())
            .await;

        assert!(matches!(result, Err(VidquizError::Parse(_))));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_description_makes_no_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let result = generator(provider.clone(), 2)
            .generate("   ", CountRange::new(1, 5).unwrap())
            .await;

        assert!(matches!(result, Err(VidquizError::InvalidInput(_))));
        assert_eq!(provider.calls(), 0);
    }
}
