//! Run command - describe a video, store it and generate a quiz.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Credentials, Settings};
use crate::media::AnalysisRequest;
use crate::pipeline::{Pipeline, PipelineOutcome, QuizSource, RunOptions};
use anyhow::{bail, Context, Result};
use console::style;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Run the pipeline once.
pub async fn run_pipeline(
    video: Option<PathBuf>,
    prompt: Option<String>,
    quiz_source: QuizSource,
    save: Option<PathBuf>,
    no_cache: bool,
    settings: Settings,
) -> Result<()> {
    let credentials = Credentials::from_env();
    preflight::check(Operation::Run, &settings, &credentials)?;

    let pipeline = Pipeline::new(settings, &credentials)?;

    let stdin = io::stdin();
    let video = match video {
        Some(path) => path,
        None => ask_video_path(&mut stdin.lock())?,
    };
    let prompt = match prompt {
        Some(p) => p,
        None => ask_prompt(&mut stdin.lock(), &pipeline.prompts().describe.default_prompt)?,
    };

    let request = AnalysisRequest::new(video, prompt);
    let options = RunOptions {
        quiz_source,
        use_cache: !no_cache,
    };

    let outcome = pipeline.run(&request, &options).await?;
    print_outcome(&outcome);

    if let Some(dir) = save {
        let (analysis, quiz) = save_markdown(&dir, &outcome)?;
        Output::success(&format!("Saved {}", analysis.display()));
        Output::success(&format!("Saved {}", quiz.display()));
    }

    Ok(())
}

fn print_outcome(outcome: &PipelineOutcome) {
    Output::header(&format!("Video Analysis: {}", outcome.video.file_name));
    if outcome.description_cached {
        Output::info("(cached description)");
    }
    println!("\n{}\n", outcome.description);

    Output::kv("Record id", &outcome.record_id);
    if outcome.quiz_record_ids.len() > 1 {
        Output::kv("Quiz sources", &outcome.quiz_record_ids.join(", "));
    }

    Output::header(&format!("Quiz ({} questions)", outcome.quiz.len()));
    if outcome.quiz_cached {
        Output::info("(cached quiz)");
    }
    Output::quiz(&outcome.quiz);
}

/// Write `video_analysis_<stem>.md` and `quiz_<stem>.md` into `dir`.
fn save_markdown(dir: &Path, outcome: &PipelineOutcome) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let analysis_path = dir.join(format!("video_analysis_{}.md", outcome.video.stem));
    let analysis = format!(
        "# Video Analysis: {}\n\n{}\n",
        outcome.video.file_name, outcome.description
    );
    std::fs::write(&analysis_path, analysis)
        .with_context(|| format!("Failed to write {}", analysis_path.display()))?;

    let quiz_path = dir.join(format!("quiz_{}.md", outcome.video.stem));
    let quiz = format!(
        "# Quiz: {}\n\n{}",
        outcome.video.file_name,
        outcome.quiz.render_markdown()
    );
    std::fs::write(&quiz_path, quiz)
        .with_context(|| format!("Failed to write {}", quiz_path.display()))?;

    Ok((analysis_path, quiz_path))
}

/// Ask for a video path until an existing file is given.
fn ask_video_path<R: BufRead>(input: &mut R) -> Result<PathBuf> {
    loop {
        print!("{} ", style("Enter the path to the video file:").cyan());
        io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("No video path given");
        }

        let raw = line.trim().trim_matches(|c| c == '"' || c == '\'');
        if raw.is_empty() {
            continue;
        }

        let path = Settings::expand_path(raw);
        if path.is_file() {
            return Ok(path);
        }
        Output::warning(&format!("File not found: {}. Please try again.", path.display()));
    }
}

/// Ask for the instruction; an empty answer selects `default_prompt`.
fn ask_prompt<R: BufRead>(input: &mut R, default_prompt: &str) -> Result<String> {
    print!(
        "{} {} ",
        style("Enter your prompt for the video analysis").cyan(),
        style("(Enter for the default summary):").dim()
    );
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let line = line.trim();

    if line.is_empty() {
        Output::info("Using the default structured-summary prompt.");
        Ok(default_prompt.to_string())
    } else {
        Ok(line.to_string())
    }
}
