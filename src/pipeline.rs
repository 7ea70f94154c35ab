//! Pipeline for vidquiz.
//!
//! Runs validate, describe, store and quiz for one video, strictly in order.

use crate::cache::ResponseCache;
use crate::cli::Output;
use crate::completion::{CompletionProvider, GroqProvider};
use crate::config::{Credentials, Prompts, Settings};
use crate::describer::{GeminiDescriber, MediaDescriber};
use crate::embedding::{Embedder, GeminiEmbedder};
use crate::error::{ErrorKind, Result, VidquizError};
use crate::knowledge::KnowledgeBase;
use crate::media::{AnalysisRequest, VideoInput};
use crate::quiz::{CountRange, Quiz, QuizGenerator};
use crate::retry::{with_retry, RetryPolicy};
use crate::vector_store::{DefaultConnector, StoreConnector};
use indicatif::ProgressBar;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Number of stored records quizzed on in similarity mode.
const SIMILAR_RECORDS: usize = 3;

/// Pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Describe,
    Store,
    Quiz,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Describe => "describe",
            Stage::Store => "store",
            Stage::Quiz => "quiz",
        };
        write!(f, "{}", name)
    }
}

/// Progress through one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Described,
    Stored,
    QuizGenerated,
    Done,
    Failed(Stage),
}

/// A failed run, naming the step that failed.
#[derive(Error, Debug)]
///
/// The message already carries the cause, so the cause is not exposed as a
/// source a second time.
#[error("Pipeline failed at {stage} step: {error}")]
pub struct PipelineError {
    pub stage: Stage,
    pub error: VidquizError,
}

impl PipelineError {
    pub fn new(stage: Stage, error: VidquizError) -> Self {
        Self { stage, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::Failed(self.stage)
    }
}

/// Text the quiz is generated from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum QuizSource {
    /// The description that was just stored.
    #[default]
    Direct,
    /// The stored records nearest to that description.
    Similarity,
}

/// Per-run switches.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub quiz_source: QuizSource,
    /// Allow the response cache when caching is enabled in settings.
    pub use_cache: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            quiz_source: QuizSource::Direct,
            use_cache: true,
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub video: VideoSummary,
    pub record_id: String,
    pub description: String,
    pub quiz: Quiz,
    /// Records the quiz was generated from.
    pub quiz_record_ids: Vec<String>,
    pub description_cached: bool,
    pub quiz_cached: bool,
    /// States passed through, ending in `Done`.
    pub states: Vec<PipelineState>,
}

#[derive(Debug, Clone)]
pub struct VideoSummary {
    pub file_name: String,
    pub stem: String,
    pub size_mb: f64,
}

/// The describe, store and quiz pipeline.
pub struct Pipeline {
    settings: Settings,
    prompts: Prompts,
    describer: Arc<dyn MediaDescriber>,
    embedder: Arc<dyn Embedder>,
    connector: Arc<dyn StoreConnector>,
    generator: QuizGenerator,
    retry: RetryPolicy,
    show_progress: bool,
}

impl Pipeline {
    /// Create a pipeline backed by Gemini, Groq and the configured store.
    pub fn new(settings: Settings, credentials: &Credentials) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let gemini_key = credentials.gemini()?;
        let describer = Arc::new(GeminiDescriber::new(&settings.api, gemini_key)?);
        let embedder = Arc::new(GeminiEmbedder::new(&settings.api, gemini_key)?);
        let completion = Arc::new(GroqProvider::new(&settings.api, credentials.groq()?)?);
        let connector = Arc::new(DefaultConnector {
            timeout: settings.api.request_timeout(),
        });

        info!(
            "Using {} for descriptions, {} for quizzes",
            settings.api.gemini_model, settings.api.groq_model
        );

        Ok(Self::with_components(
            settings, prompts, describer, embedder, completion, connector,
        ))
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        describer: Arc<dyn MediaDescriber>,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn CompletionProvider>,
        connector: Arc<dyn StoreConnector>,
    ) -> Self {
        let retry = RetryPolicy::from_settings(&settings.app);
        let generator = QuizGenerator::new(completion, prompts.clone(), &settings.quiz)
            .with_retry_policy(retry);
        let show_progress = settings.performance.enable_progress_tracking;

        Self {
            settings,
            prompts,
            describer,
            embedder,
            connector,
            generator,
            retry,
            show_progress,
        }
    }

    /// Override the retry policy for every outbound call.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self.generator = self.generator.with_retry_policy(retry);
        self
    }

    /// Show spinners while steps run.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    fn cache(&self, options: &RunOptions) -> Option<ResponseCache> {
        (self.settings.performance.enable_caching && options.use_cache).then(|| {
            ResponseCache::new(
                self.settings.cache_dir(),
                std::time::Duration::from_secs(self.settings.app.cache_ttl_seconds),
            )
        })
    }

    fn spinner(&self, msg: &str) -> Option<ProgressBar> {
        self.show_progress.then(|| Output::spinner(msg))
    }

    /// Run the pipeline once.
    ///
    /// Each step is bounded by the session deadline. The store is closed on
    /// every exit path once opened.
    #[instrument(skip(self, request, options), fields(video = %request.video_path.display()))]
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        options: &RunOptions,
    ) -> std::result::Result<PipelineOutcome, PipelineError> {
        if self.settings.performance.enable_background_processing {
            warn!("Background processing is not supported; steps run sequentially");
        }

        let deadline = Instant::now() + self.settings.app.session_timeout();
        let cache = self.cache(options);
        let mut states = vec![PipelineState::Start];

        // Validate
        let video = within(deadline, Stage::Validate, async {
            request.validate_prompt()?;
            VideoInput::load(&request.video_path, &self.settings.app).await
        })
        .await?;
        info!("Validated {} ({:.1} MB)", video.file_name, video.size_mb());

        // Describe
        let spinner = self.spinner(&format!(
            "Analyzing {} with {}...",
            video.file_name,
            self.describer.model_id()
        ));
        let described = self
            .describe(&video, &request.prompt, cache.as_ref(), deadline)
            .await;
        finish(spinner);
        let (description, description_cached) =
            described.map_err(|e| PipelineError::new(Stage::Describe, e))?;
        states.push(PipelineState::Described);

        // Store
        let spinner = self.spinner("Saving description to the knowledge store...");
        let opened = within(deadline, Stage::Store, self.open_knowledge_base()).await;
        let kb = match opened {
            Ok(kb) => kb,
            Err(e) => {
                finish(spinner);
                return Err(e);
            }
        };

        let result = self
            .store_and_quiz(
                &kb,
                &video,
                &description,
                options,
                cache.as_ref(),
                deadline,
                spinner,
                &mut states,
            )
            .await;

        if let Err(e) = kb.close().await {
            warn!("Failed to close knowledge store: {}", e);
        }

        let (record_id, quiz, quiz_record_ids, quiz_cached) = result?;
        states.push(PipelineState::Done);

        Ok(PipelineOutcome {
            video: VideoSummary {
                file_name: video.file_name.clone(),
                stem: video.stem(),
                size_mb: video.size_mb(),
            },
            record_id,
            description,
            quiz,
            quiz_record_ids,
            description_cached,
            quiz_cached,
            states,
        })
    }

    async fn open_knowledge_base(&self) -> Result<KnowledgeBase> {
        let store = self.connector.connect(&self.settings.store).await?;
        let kb = KnowledgeBase::new(self.embedder.clone(), store, self.retry)
            .with_metric(self.settings.store.distance_metric)
            .with_unique_descriptions(self.settings.store.unique_descriptions);
        if let Err(e) = kb.prepare_index().await {
            let _ = kb.close().await;
            return Err(e);
        }
        Ok(kb)
    }

    #[allow(clippy::too_many_arguments)]
    async fn store_and_quiz(
        &self,
        kb: &KnowledgeBase,
        video: &VideoInput,
        description: &str,
        options: &RunOptions,
        cache: Option<&ResponseCache>,
        deadline: Instant,
        spinner: Option<ProgressBar>,
        states: &mut Vec<PipelineState>,
    ) -> std::result::Result<(String, Quiz, Vec<String>, bool), PipelineError> {
        let reference = video.path.display().to_string();
        let stored = within(deadline, Stage::Store, kb.store(description, &reference)).await;
        finish(spinner);
        let record_id = stored?;
        states.push(PipelineState::Stored);

        let spinner = self.spinner(&format!(
            "Generating quiz with {}...",
            self.generator.model_id()
        ));
        let generated = within(
            deadline,
            Stage::Quiz,
            self.quiz(kb, &record_id, description, options.quiz_source, cache),
        )
        .await;
        finish(spinner);
        let (quiz, quiz_record_ids, quiz_cached) = generated?;
        states.push(PipelineState::QuizGenerated);

        Ok((record_id, quiz, quiz_record_ids, quiz_cached))
    }

    /// Describe the video, retrying transient failures and too-short answers.
    ///
    /// The video is prepared once; only the describe call is retried. Whatever
    /// was uploaded is released on success and on failure.
    async fn describe(
        &self,
        video: &VideoInput,
        prompt: &str,
        cache: Option<&ResponseCache>,
        deadline: Instant,
    ) -> Result<(String, bool)> {
        let key = ResponseCache::key(&[
            &video.sha256,
            prompt,
            self.describer.model_id(),
            "description",
        ]);
        if let Some(cache) = cache {
            if let Some(text) = cache.get::<String>(&key).await {
                info!("Using cached description for {}", video.file_name);
                return Ok((text, true));
            }
        }

        let describer = &self.describer;
        let prepared = by_deadline(
            deadline,
            Stage::Describe,
            with_retry(&self.retry, "Video upload", |_| describer.prepare(video)),
        )
        .await?;

        let min_chars = self.settings.api.min_description_chars;
        let media = &prepared;
        let described = by_deadline(
            deadline,
            Stage::Describe,
            with_retry(&self.retry, "Video description", move |_| async move {
                let text = describer.describe(media, prompt).await?;
                let chars = text.trim().chars().count();
                if chars < min_chars {
                    return Err(VidquizError::transient(
                        describer.model_id(),
                        format!("insufficient content ({} chars, need {})", chars, min_chars),
                    ));
                }
                Ok(text.trim().to_string())
            }),
        )
        .await;

        if let Err(e) = describer.release(&prepared).await {
            warn!("Failed to release {}: {}", prepared.file_name, e);
        }
        let text = described?;

        if let Some(cache) = cache {
            if let Err(e) = cache.put(&key, &text).await {
                warn!("Failed to cache description: {}", e);
            }
        }
        Ok((text, false))
    }

    /// Generate the quiz from the selected source text.
    async fn quiz(
        &self,
        kb: &KnowledgeBase,
        record_id: &str,
        description: &str,
        source: QuizSource,
        cache: Option<&ResponseCache>,
    ) -> Result<(Quiz, Vec<String>, bool)> {
        let limits = &self.settings.quiz;
        let range = CountRange::new(limits.min_questions, limits.max_questions)?;

        match source {
            QuizSource::Direct => {
                let key = ResponseCache::key(&[
                    description,
                    self.generator.model_id(),
                    &range.to_string(),
                    "quiz",
                ]);
                if let Some(cache) = cache {
                    if let Some(quiz) = cache.get::<Quiz>(&key).await {
                        if quiz.validate(range).is_ok() {
                            info!("Using cached quiz");
                            return Ok((quiz, vec![record_id.to_string()], true));
                        }
                    }
                }

                let quiz = self.generator.generate(description, range).await?;
                if let Some(cache) = cache {
                    if let Err(e) = cache.put(&key, &quiz).await {
                        warn!("Failed to cache quiz: {}", e);
                    }
                }
                Ok((quiz, vec![record_id.to_string()], false))
            }
            QuizSource::Similarity => {
                let record = kb.get(record_id).await?.ok_or_else(|| {
                    VidquizError::VectorStore(format!("record {} missing after insert", record_id))
                })?;
                let hits = kb.nearest(&record.embedding, SIMILAR_RECORDS).await?;
                let ids: Vec<String> = hits.iter().map(|h| h.record.id.clone()).collect();
                let text = hits
                    .iter()
                    .map(|h| h.record.description.trim())
                    .collect::<Vec<_>>()
                    .join("\n\n---\n\n");
                info!("Generating quiz from {} similar records", ids.len());

                let quiz = self.generator.generate(&text, range).await?;
                Ok((quiz, ids, false))
            }
        }
    }
}

/// Await `step`, failing it with `Timeout` once the session deadline passes.
async fn by_deadline<T, F>(deadline: Instant, stage: Stage, step: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout_at(deadline, step)
        .await
        .unwrap_or_else(|_| {
            Err(VidquizError::Timeout(format!(
                "session deadline reached during the {} step",
                stage
            )))
        })
}

/// Like [`by_deadline`], tagging a failure with its stage.
async fn within<T, F>(
    deadline: Instant,
    stage: Stage,
    step: F,
) -> std::result::Result<T, PipelineError>
where
    F: Future<Output = Result<T>>,
{
    by_deadline(deadline, stage, step)
        .await
        .map_err(|e| PipelineError::new(stage, e))
}

fn finish(spinner: Option<ProgressBar>) {
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_stage() {
        let err = PipelineError::new(Stage::Store, VidquizError::VectorStore("down".into()));
        assert_eq!(
            err.to_string(),
            "Pipeline failed at store step: Vector store error: down"
        );
        assert_eq!(err.kind(), ErrorKind::Store);
        assert_eq!(err.state(), PipelineState::Failed(Stage::Store));
    }

    #[tokio::test]
    async fn test_deadline_fails_step_with_timeout() {
        let deadline = Instant::now();
        let result: std::result::Result<(), _> = within(deadline, Stage::Describe, async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.stage, Stage::Describe);
        assert!(matches!(err.error, VidquizError::Timeout(_)));
    }

    #[test]
    fn test_detailed_error_names_cause_once() {
        let err = PipelineError::new(
            Stage::Store,
            VidquizError::StoreConnection {
                host: "localhost".into(),
                port: 27017,
                message: "refused".into(),
            },
        );
        let detailed = format!("{:#}", anyhow::Error::from(err));
        assert!(detailed.starts_with("Pipeline failed at store step: Cannot connect"));
        assert_eq!(detailed.matches("localhost:27017").count(), 1);
    }
}
