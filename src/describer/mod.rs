//! Video description through hosted multimodal models.

mod gemini;

pub use gemini::GeminiDescriber;

use crate::error::Result;
use crate::media::VideoInput;
use async_trait::async_trait;
use base64::Engine;

/// How the service gets at the video bytes.
#[derive(Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Base64 payload sent with every request.
    Inline { data: String },
    /// A file already held by the service.
    Uploaded { name: String, uri: String },
}

/// A video made ready for one or more describe calls.
#[derive(Clone)]
pub struct PreparedVideo {
    pub file_name: String,
    pub mime_type: String,
    pub source: MediaSource,
}

impl PreparedVideo {
    /// Carry the video inline as base64.
    pub fn inline(video: &VideoInput) -> Self {
        Self {
            file_name: video.file_name.clone(),
            mime_type: video.mime_type.to_string(),
            source: MediaSource::Inline {
                data: base64::engine::general_purpose::STANDARD.encode(&video.bytes),
            },
        }
    }
}

impl std::fmt::Debug for PreparedVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            MediaSource::Inline { data } => format!("inline ({} bytes)", data.len()),
            MediaSource::Uploaded { name, .. } => name.clone(),
        };
        f.debug_struct("PreparedVideo")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("source", &source)
            .finish()
    }
}

/// Trait for services that turn a video and an instruction into text.
///
/// A run calls `prepare` once, `describe` as often as retries demand, then
/// `release` whether or not a description came back.
#[async_trait]
pub trait MediaDescriber: Send + Sync {
    /// Make the video available to the service.
    async fn prepare(&self, video: &VideoInput) -> Result<PreparedVideo> {
        Ok(PreparedVideo::inline(video))
    }

    /// Describe the prepared video following `prompt`.
    async fn describe(&self, video: &PreparedVideo, prompt: &str) -> Result<String>;

    /// Remove anything `prepare` left on the service.
    async fn release(&self, _video: &PreparedVideo) -> Result<()> {
        Ok(())
    }

    /// Identifier used in logs and cache keys.
    fn model_id(&self) -> &str;
}
