//! Gemini `generateContent` describer with inline and Files API uploads.

use super::{MediaDescriber, MediaSource, PreparedVideo};
use crate::config::ApiSettings;
use crate::error::{Result, VidquizError};
use crate::http::{check_status, create_http_client, transport_error};
use crate::media::VideoInput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const SERVICE: &str = "Gemini";

/// Largest base64 payload sent inline.
///
/// The service caps a whole inline request at 20 MB; the rest is headroom for
/// the prompt and the JSON framing.
pub const INLINE_DATA_LIMIT: usize = 19_000_000;

fn base64_len(size: usize) -> usize {
    size.div_ceil(3) * 4
}

/// Whether a video of `size` bytes can be sent inline once encoded.
pub fn fits_inline(size: usize) -> bool {
    base64_len(size) <= INLINE_DATA_LIMIT
}

/// Describer backed by the Gemini API.
pub struct GeminiDescriber {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    upload_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl GeminiDescriber {
    pub fn new(api: &ApiSettings, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: create_http_client(api.request_timeout())?,
            api_key: api_key.to_string(),
            model: api.gemini_model.clone(),
            base_url: api.gemini_base_url.trim_end_matches('/').to_string(),
            upload_url: api.gemini_upload_url.clone(),
            poll_interval: Duration::from_secs(2),
            max_polls: (api.request_timeout / 2).max(1) as u32,
        })
    }

    /// Override how often an uploaded file is polled for readiness.
    pub fn with_poll_interval(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    /// Upload through the resumable Files API and wait until the file is usable.
    #[instrument(skip(self, video), fields(file = %video.file_name, size = video.bytes.len()))]
    async fn upload(&self, video: &VideoInput) -> Result<PreparedVideo> {
        info!("Uploading {:.1} MB to the Gemini Files API", video.size_mb());

        let start = self
            .client
            .post(&self.upload_url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", video.bytes.len())
            .header("X-Goog-Upload-Header-Content-Type", video.mime_type)
            .json(&serde_json::json!({ "file": { "display_name": video.file_name } }))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        let start = check_status(SERVICE, start).await?;

        let session_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| VidquizError::upstream(SERVICE, "upload session URL missing"))?;

        let finish = self
            .client
            .post(&session_url)
            .header("X-Goog-Upload-Offset", 0)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(video.bytes.clone())
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        let uploaded: FileEnvelope = check_status(SERVICE, finish)
            .await?
            .json()
            .await
            .map_err(|e| {
                VidquizError::upstream(SERVICE, format!("invalid upload response: {}", e))
            })?;

        let name = uploaded.file.name.clone();
        let file = match self.wait_until_active(uploaded.file).await {
            Ok(file) => file,
            Err(e) => {
                if let Err(cleanup) = self.delete_file(&name).await {
                    warn!("Failed to delete {} after a failed upload: {}", name, cleanup);
                }
                return Err(e);
            }
        };

        Ok(PreparedVideo {
            file_name: video.file_name.clone(),
            mime_type: file.mime_type.unwrap_or_else(|| video.mime_type.to_string()),
            source: MediaSource::Uploaded {
                name: file.name,
                uri: file.uri,
            },
        })
    }

    async fn wait_until_active(&self, mut file: UploadedFile) -> Result<UploadedFile> {
        for _ in 0..self.max_polls {
            match file.state.as_deref() {
                Some("ACTIVE") | None => return Ok(file),
                Some("FAILED") => {
                    return Err(VidquizError::upstream(
                        SERVICE,
                        format!("processing of {} failed", file.name),
                    ))
                }
                Some(state) => debug!("File {} is {}", file.name, state),
            }

            tokio::time::sleep(self.poll_interval).await;

            let url = format!("{}/{}", self.base_url, file.name);
            let response = self
                .client
                .get(&url)
                .header("x-goog-api-key", &self.api_key)
                .send()
                .await
                .map_err(|e| transport_error(SERVICE, e))?;
            file = check_status(SERVICE, response)
                .await?
                .json()
                .await
                .map_err(|e| {
                    VidquizError::upstream(SERVICE, format!("invalid file status: {}", e))
                })?;
        }

        Err(VidquizError::transient(
            SERVICE,
            format!("file {} did not become active in time", file.name),
        ))
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let url = format!("{}/{}", self.base_url, name);
        let response = self
            .client
            .delete(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        check_status(SERVICE, response).await?;
        debug!("Deleted uploaded file {}", name);
        Ok(())
    }
}

#[async_trait]
impl MediaDescriber for GeminiDescriber {
    async fn prepare(&self, video: &VideoInput) -> Result<PreparedVideo> {
        if fits_inline(video.bytes.len()) {
            Ok(PreparedVideo::inline(video))
        } else {
            self.upload(video).await
        }
    }

    #[instrument(skip(self, video, prompt), fields(model = %self.model, file = %video.file_name))]
    async fn describe(&self, video: &PreparedVideo, prompt: &str) -> Result<String> {
        let media = match &video.source {
            MediaSource::Inline { data } => Part::InlineData {
                inline_data: Blob {
                    mime_type: video.mime_type.clone(),
                    data: data.clone(),
                },
            },
            MediaSource::Uploaded { uri, .. } => Part::FileData {
                file_data: FileData {
                    mime_type: video.mime_type.clone(),
                    file_uri: uri.clone(),
                },
            },
        };

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    media,
                    Part::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let body: GenerateContentResponse = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| VidquizError::upstream(SERVICE, format!("malformed response: {}", e)))?;

        let text = body.into_text()?;
        debug!("Received description of {} chars", text.len());
        Ok(text)
    }

    async fn release(&self, video: &PreparedVideo) -> Result<()> {
        match &video.source {
            MediaSource::Uploaded { name, .. } => self.delete_file(name).await,
            MediaSource::Inline { .. } => Ok(()),
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Gemini API types

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Deserialize)]
struct FileEnvelope {
    file: UploadedFile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    name: String,
    uri: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(VidquizError::upstream(
                SERVICE,
                format!("content blocked by safety filters: {}", reason),
            ));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| VidquizError::transient(SERVICE, "no candidates returned"))?;

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(VidquizError::transient(SERVICE, "empty description returned"));
        }
        Ok(text)
    }
}
