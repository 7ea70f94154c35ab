//! CLI output formatting utilities.

use crate::quiz::{Quiz, OPTION_LABELS};
use crate::vector_store::AnalysisRecord;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a quiz with the correct answers highlighted.
    pub fn quiz(quiz: &Quiz) {
        for (i, q) in quiz.questions.iter().enumerate() {
            let number = style(format!("{}.", i + 1)).cyan().bold();
            println!("\n{} {}", number, style(&q.question).bold());
            for (j, option) in q.options.iter().enumerate() {
                if j == q.correct_option_index {
                    println!("   {}. {} {}", OPTION_LABELS[j], style(option).green(), "✅");
                } else {
                    println!("   {}. {}", OPTION_LABELS[j], option);
                }
            }
        }
        println!();
    }

    /// Print one search hit.
    pub fn search_result(record: &AnalysisRecord, distance: f32) {
        println!(
            "\n{} {} ({}, distance: {:.3})",
            style(">>").green(),
            style(&record.video_reference).bold(),
            style(&record.id).dim(),
            distance
        );
        println!("   {}", content_preview(&record.description, 200));
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Render an error for the terminal.
///
/// The detailed form appends each cause in the chain, skipping a cause whose
/// text its parent already includes.
pub fn error_message(err: &anyhow::Error, detailed: bool) -> String {
    let mut message = err.to_string();
    if !detailed {
        return message;
    }

    let mut parent = message.clone();
    for cause in err.chain().skip(1) {
        let text = cause.to_string();
        if !parent.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        parent = text;
    }
    message
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("short\ntext", 20), "short text");
        assert_eq!(content_preview("ååååå", 3), "ååå...");
    }

    #[test]
    fn test_error_message_skips_repeated_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such table");
        let err = anyhow::Error::from(crate::VidquizError::Io(io)).context("Search failed");

        assert_eq!(error_message(&err, false), "Search failed");
        assert_eq!(
            error_message(&err, true),
            "Search failed: IO error: no such table"
        );
    }
}
