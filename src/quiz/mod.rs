//! Multiple-choice quizzes: model, rendering, parsing and generation.

mod generator;
mod parse;

pub use generator::QuizGenerator;
pub use parse::parse_quiz;

use crate::error::{Result, VidquizError};
use serde::{Deserialize, Serialize};

/// Option labels in display order.
pub const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// One question with four options and exactly one correct answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: [String; 4],
    /// Zero-based index into `options`.
    pub correct_option_index: usize,
}

impl QuizQuestion {
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_option_index.min(3)]
    }

    pub fn correct_label(&self) -> char {
        OPTION_LABELS[self.correct_option_index.min(3)]
    }

    fn validate(&self, number: usize) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(VidquizError::Parse(format!("question {} has no text", number)));
        }
        if let Some(i) = self.options.iter().position(|o| o.trim().is_empty()) {
            return Err(VidquizError::Parse(format!(
                "question {} has an empty option {}",
                number, OPTION_LABELS[i]
            )));
        }
        if self.correct_option_index > 3 {
            return Err(VidquizError::Parse(format!(
                "question {} has correct_option_index {} outside 0-3",
                number, self.correct_option_index
            )));
        }
        Ok(())
    }
}

/// Inclusive bounds on the number of questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountRange {
    pub min: usize,
    pub max: usize,
}

impl CountRange {
    pub fn new(min: usize, max: usize) -> Result<Self> {
        if min == 0 || min > max {
            return Err(VidquizError::InvalidInput(format!(
                "invalid question count range [{}, {}]",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, n: usize) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

impl std::fmt::Display for CountRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// A generated quiz.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Check every question and the total count.
    pub fn validate(&self, range: CountRange) -> Result<()> {
        for (i, q) in self.questions.iter().enumerate() {
            q.validate(i + 1)?;
        }
        if !range.contains(self.questions.len()) {
            return Err(VidquizError::Parse(format!(
                "expected {} questions, got {}",
                range,
                self.questions.len()
            )));
        }
        Ok(())
    }

    /// Markdown with numbered questions, lettered options and the answer marked.
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        for (i, q) in self.questions.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, q.question.trim()));
            for (j, option) in q.options.iter().enumerate() {
                let mark = if j == q.correct_option_index { " ✅" } else { "" };
                out.push_str(&format!("   {}. {}{}\n", OPTION_LABELS[j], option.trim(), mark));
            }
            out.push('\n');
        }
        out
    }
}
