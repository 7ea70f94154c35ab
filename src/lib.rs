//! vidquiz - Video descriptions and quizzes
//!
//! A CLI tool that asks a multimodal model to describe a video, stores the
//! description with its embedding in a vector store, and turns the
//! description into a multiple-choice quiz.
//!
//! # Architecture
//!
//! - `config` - Settings, credentials and prompt templates
//! - `media` - Video validation and loading
//! - `describer` - Multimodal description (Gemini)
//! - `embedding` - Embedding generation
//! - `vector_store` - Record persistence and similarity search
//! - `knowledge` - Embed-and-store facade over a vector store
//! - `completion` - Chat completions (Groq)
//! - `quiz` - Quiz model, parsing and generation
//! - `pipeline` - Run coordination with deadlines and state tracking
//!
//! # Example
//!
//! ```rust,no_run
//! use vidquiz::config::{Credentials, Settings};
//! use vidquiz::media::AnalysisRequest;
//! use vidquiz::pipeline::{Pipeline, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(settings, &Credentials::from_env())?;
//!
//!     let request = AnalysisRequest::new("lecture.mp4", "Summarize the key points");
//!     let outcome = pipeline.run(&request, &RunOptions::default()).await?;
//!     println!("{} questions, record {}", outcome.quiz.len(), outcome.record_id);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod completion;
pub mod config;
pub mod describer;
pub mod embedding;
pub mod error;
pub mod http;
pub mod knowledge;
pub mod media;
pub mod openai;
pub mod pipeline;
pub mod quiz;
pub mod retry;
pub mod vector_store;

pub use error::{Result, VidquizError};
