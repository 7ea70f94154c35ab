//! Parsing of model responses into quizzes.
//!
//! The JSON shape requested in the prompt is tried first. Responses in the
//! numbered markdown format (options `A.`-`D.`, correct one marked with ✅)
//! are accepted as a fallback.

use super::{Quiz, QuizQuestion, OPTION_LABELS};
use crate::error::{Result, VidquizError};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

const CORRECT_MARKS: [&str; 3] = ["✅", "✔️", "✔"];

/// Parse a response into a quiz. Count bounds are not checked here.
pub fn parse_quiz(response: &str) -> Result<Quiz> {
    let text = response.trim();
    if text.is_empty() {
        return Err(VidquizError::Parse("response is empty".to_string()));
    }

    match parse_json(text) {
        Ok(quiz) => Ok(quiz),
        Err(json_err) => {
            debug!("JSON parse failed ({}), trying markdown format", json_err);
            parse_markdown(text).map_err(|md_err| {
                VidquizError::Parse(format!(
                    "not valid quiz JSON ({}) nor the markdown quiz format ({})",
                    json_err, md_err
                ))
            })
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonQuiz {
    Wrapped { questions: Vec<JsonQuestion> },
    Bare(Vec<JsonQuestion>),
}

#[derive(Deserialize)]
struct JsonQuestion {
    #[serde(alias = "text", alias = "prompt")]
    question: String,
    #[serde(alias = "choices")]
    options: Vec<String>,
    #[serde(default, alias = "correct_index", alias = "answer_index")]
    correct_option_index: Option<i64>,
    #[serde(default, alias = "answer", alias = "correct_option")]
    correct_answer: Option<String>,
}

fn parse_json(text: &str) -> std::result::Result<Quiz, String> {
    let body = json_body(text).ok_or_else(|| "no JSON object found".to_string())?;
    let parsed: JsonQuiz = serde_json::from_str(body).map_err(|e| e.to_string())?;
    let raw = match parsed {
        JsonQuiz::Wrapped { questions } => questions,
        JsonQuiz::Bare(questions) => questions,
    };
    if raw.is_empty() {
        return Err("no questions in response".to_string());
    }

    raw.into_iter()
        .enumerate()
        .map(|(i, q)| convert_json_question(i + 1, q))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(|questions| Quiz { questions })
}

fn convert_json_question(
    number: usize,
    q: JsonQuestion,
) -> std::result::Result<QuizQuestion, String> {
    let options: Vec<String> = q.options.iter().map(|o| strip_label(o)).collect();
    let options: [String; 4] = options.try_into().map_err(|v: Vec<String>| {
        format!("question {} has {} options, expected 4", number, v.len())
    })?;

    let index = match (q.correct_option_index, q.correct_answer.as_deref()) {
        (Some(i), _) => usize::try_from(i)
            .ok()
            .filter(|i| *i < 4)
            .ok_or_else(|| format!("question {} has correct_option_index {}", number, i))?,
        (None, Some(answer)) => answer_index(answer, &options)
            .ok_or_else(|| format!("question {} has unrecognized answer '{}'", number, answer))?,
        (None, None) => return Err(format!("question {} has no correct answer", number)),
    };

    Ok(QuizQuestion {
        question: q.question.trim().to_string(),
        options,
        correct_option_index: index,
    })
}

/// Resolve an answer given as a letter or as the option text.
fn answer_index(answer: &str, options: &[String; 4]) -> Option<usize> {
    let answer = answer.trim();
    let mut chars = answer.chars();
    if let (Some(c), rest) = (chars.next(), chars.as_str()) {
        let rest = rest.trim_start_matches(['.', ')', ':']).trim();
        if let Some(i) = OPTION_LABELS.iter().position(|l| l.eq_ignore_ascii_case(&c)) {
            if rest.is_empty() || strip_label(answer) == options[i] {
                return Some(i);
            }
        }
    }
    let stripped = strip_label(answer);
    options.iter().position(|o| o.eq_ignore_ascii_case(&stripped))
}

/// Locate the JSON payload, skipping code fences and surrounding prose.
fn json_body(text: &str) -> Option<&str> {
    let text = match text.find("```") {
        Some(start) => {
            let after = &text[start + 3..];
            let after = after.strip_prefix("json").unwrap_or(after);
            match after.find("```") {
                Some(end) => &after[..end],
                None => after,
            }
        }
        None => text,
    };

    let start = text.find(['{', '['])?;
    let end = text.rfind(['}', ']'])?;
    (end > start).then(|| &text[start..=end])
}

/// Remove a leading `A.`, `B)` or `(C)` label from an option.
fn strip_label(option: &str) -> String {
    let trimmed = option.trim();
    let without_paren = trimmed.strip_prefix('(').unwrap_or(trimmed);
    let mut chars = without_paren.chars();
    if let (Some(c), Some(sep)) = (chars.next(), chars.next()) {
        let labelled = OPTION_LABELS.iter().any(|l| l.eq_ignore_ascii_case(&c));
        if labelled && matches!(sep, '.' | ')' | ':') {
            let rest = chars.as_str().trim();
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    trimmed.to_string()
}

struct Draft {
    question: String,
    options: Vec<(String, bool)>,
}

fn parse_markdown(text: &str) -> std::result::Result<Quiz, String> {
    let question_re = Regex::new(r"^\s*(?:#+\s*)?(?:\*\*)?(?:Q(?:uestion)?\s*)?\d+[.):]\s*(.+)$")
        .map_err(|e| e.to_string())?;
    let option_re =
        Regex::new(r"^\s*(?:[-*]\s*)?\(?([A-Da-d])[.):]\s*(.+)$").map_err(|e| e.to_string())?;

    let mut drafts: Vec<Draft> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = option_re.captures(line) {
            let Some(current) = drafts.last_mut() else {
                continue;
            };
            let raw = caps[2].trim();
            let correct = CORRECT_MARKS.iter().any(|m| raw.contains(m));
            let mut option = raw.to_string();
            for mark in CORRECT_MARKS {
                option = option.replace(mark, "");
            }
            current.options.push((clean_markup(&option), correct));
        } else if let Some(caps) = question_re.captures(line) {
            drafts.push(Draft {
                question: clean_markup(&caps[1]),
                options: Vec::new(),
            });
        }
    }

    if drafts.is_empty() {
        return Err("no numbered questions found".to_string());
    }

    drafts
        .into_iter()
        .enumerate()
        .map(|(i, d)| {
            let number = i + 1;
            let correct: Vec<usize> = d
                .options
                .iter()
                .enumerate()
                .filter(|(_, (_, c))| *c)
                .map(|(j, _)| j)
                .collect();
            if correct.len() != 1 {
                return Err(format!(
                    "question {} has {} options marked correct, expected 1",
                    number,
                    correct.len()
                ));
            }
            let options: Vec<String> = d.options.into_iter().map(|(o, _)| o).collect();
            let options: [String; 4] = options.try_into().map_err(|v: Vec<String>| {
                format!("question {} has {} options, expected 4", number, v.len())
            })?;
            Ok(QuizQuestion {
                question: d.question,
                options,
                correct_option_index: correct[0],
            })
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(|questions| Quiz { questions })
}

fn clean_markup(s: &str) -> String {
    s.replace("**", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_wrapped_json() {
        let quiz = parse_quiz(
            r#"{"questions":[{"question":"What does the borrow checker enforce?",
                "options":["Aliasing rules","Code style","Naming","Formatting"],
                "correct_option_index":0}]}"#,
        )
        .unwrap();

        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz.questions[0].correct_option(), "Aliasing rules");
    }

    #[test]
    fn test_parses_fenced_bare_array_with_labels() {
        let response = "Here is your quiz:\n```json\n[{\"question\":\"Q?\",\"options\":[\"A. one\",\"B. two\",\"C. three\",\"D. four\"],\"correct_answer\":\"C\"}]\n```";
        let quiz = parse_quiz(response).unwrap();

        assert_eq!(quiz.questions[0].options[0], "one");
        assert_eq!(quiz.questions[0].correct_option_index, 2);
    }

    #[test]
    fn test_answer_as_option_text() {
        let quiz = parse_quiz(
            r#"{"questions":[{"question":"Q?","options":["red","green","blue","black"],"answer":"Blue"}]}"#,
        )
        .unwrap();
        assert_eq!(quiz.questions[0].correct_option_index, 2);
    }

    #[test]
    fn test_rejects_three_options() {
        let err = parse_quiz(
            r#"{"questions":[{"question":"Q?","options":["a","b","c"],"correct_option_index":0}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, VidquizError::Parse(_)));
        assert!(err.to_string().contains("3 options"));
    }

    #[test]
    fn test_rejects_index_out_of_range() {
        let err = parse_quiz(
            r#"{"questions":[{"question":"Q?","options":["a","b","c","d"],"correct_option_index":4}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, VidquizError::Parse(_)));
    }

    #[test]
    fn test_parses_markdown_format() {
        let response = "\
1. What is the primary subject of the video?
   A. Subject A
   B. Subject B
   C. Subject C ✅
   D. Subject D

2. **Which keyword moves ownership?**
   A. ref
   B. move ✅
   C. mut
   D. static
";
        let quiz = parse_quiz(response).unwrap();
        assert_eq!(quiz.len(), 2);
        assert_eq!(quiz.questions[0].correct_option_index, 2);
        assert_eq!(quiz.questions[0].options[2], "Subject C");
        assert_eq!(quiz.questions[1].question, "Which keyword moves ownership?");
        assert_eq!(quiz.questions[1].correct_option(), "move");
    }

    #[test]
    fn test_markdown_without_mark_is_rejected() {
        let response = "1. Q?\n   A. a\n   B. b\n   C. c\n   D. d\n";
        let err = parse_quiz(response).unwrap_err();
        assert!(err.to_string().contains("0 options marked correct"));
    }

    #[test]
    fn test_prose_is_rejected() {
        assert!(matches!(
            parse_quiz("I cannot write a quiz about this video."),
            Err(VidquizError::Parse(_))
        ));
    }

    #[test]
    fn test_rendered_markdown_parses_back() {
        let quiz = parse_quiz(
            r#"{"questions":[{"question":"Q?","options":["a","b","c","d"],"correct_option_index":3}]}"#,
        )
        .unwrap();
        assert_eq!(parse_quiz(&quiz.render_markdown()).unwrap(), quiz);
    }
}
