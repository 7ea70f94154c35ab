//! Local video input: validation, loading and hashing.

use crate::config::AppSettings;
use crate::error::{Result, VidquizError};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One pipeline request: a local video and the instruction sent with it.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub video_path: PathBuf,
    pub prompt: String,
}

impl AnalysisRequest {
    pub fn new(video_path: impl Into<PathBuf>, prompt: impl Into<String>) -> Self {
        Self {
            video_path: video_path.into(),
            prompt: prompt.into(),
        }
    }

    /// Reject an empty or whitespace-only prompt.
    pub fn validate_prompt(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(VidquizError::EmptyPrompt);
        }
        Ok(())
    }
}

/// A validated video loaded into memory.
#[derive(Clone)]
pub struct VideoInput {
    pub path: PathBuf,
    pub file_name: String,
    /// Lower-case extension without the dot.
    pub extension: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of the file content.
    pub sha256: String,
}

impl std::fmt::Debug for VideoInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoInput")
            .field("path", &self.path)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .field("sha256", &self.sha256)
            .finish()
    }
}

/// Result of checking a file without reading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCheck {
    pub extension: String,
    pub size_bytes: u64,
}

impl VideoInput {
    /// Validate path, extension and size against the configured limits.
    ///
    /// Performs no reads beyond file metadata.
    pub fn check(path: &Path, app: &AppSettings) -> Result<VideoCheck> {
        if !path.is_file() {
            return Err(VidquizError::FileNotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if !app.is_supported_format(&extension) {
            return Err(VidquizError::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    extension
                },
                supported: app.supported_formats.join(", "),
            });
        }

        let size_bytes = std::fs::metadata(path)?.len();
        if size_bytes > app.max_file_size_bytes() {
            return Err(VidquizError::FileTooLarge {
                size_mb: size_bytes as f64 / (1024.0 * 1024.0),
                max_mb: app.max_file_size_mb,
            });
        }
        if size_bytes == 0 {
            return Err(VidquizError::EmptyFile(path.to_path_buf()));
        }

        Ok(VideoCheck {
            extension,
            size_bytes,
        })
    }

    /// Validate and read the video.
    pub async fn load(path: &Path, app: &AppSettings) -> Result<Self> {
        let check = Self::check(path, app)?;
        let bytes = tokio::fs::read(path).await?;

        if bytes.is_empty() {
            return Err(VidquizError::EmptyFile(path.to_path_buf()));
        }

        let sha256 = format!("{:x}", Sha256::digest(&bytes));
        debug!("Loaded {} ({} bytes, sha256 {})", path.display(), bytes.len(), sha256);

        Ok(Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("video")
                .to_string(),
            mime_type: mime_type_for(&check.extension),
            extension: check.extension,
            bytes,
            sha256,
        })
    }

    /// File name without extension, used for exported file names.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("video")
            .to_string()
    }

    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / (1024.0 * 1024.0)
    }
}

/// MIME type for a video extension.
pub fn mime_type_for(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "flv" => "video/x-flv",
        "mpeg" | "mpg" => "video/mpeg",
        "wmv" => "video/x-ms-wmv",
        "3gp" => "video/3gpp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0u8; len]).unwrap();
        path
    }

    fn one_mb_limit() -> AppSettings {
        AppSettings {
            max_file_size_mb: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_file() {
        let result = VideoInput::check(Path::new("missing.mp4"), &AppSettings::default());
        assert!(matches!(result, Err(VidquizError::FileNotFound(_))));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "clip.gif", 10);
        let result = VideoInput::check(&path, &AppSettings::default());
        assert!(matches!(result, Err(VidquizError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_uppercase_extension_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "CLIP.MP4", 10);
        let check = VideoInput::check(&path, &AppSettings::default()).unwrap();
        assert_eq!(check.extension, "mp4");
    }

    #[test]
    fn test_size_exactly_at_limit_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "exact.mp4", 1024 * 1024);
        let check = VideoInput::check(&path, &one_mb_limit()).unwrap();
        assert_eq!(check.size_bytes, 1_048_576);
    }

    #[test]
    fn test_one_byte_over_limit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "over.mp4", 1024 * 1024 + 1);
        let result = VideoInput::check(&path, &one_mb_limit());
        assert!(matches!(result, Err(VidquizError::FileTooLarge { max_mb: 1, .. })));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "empty.webm", 0);
        let result = VideoInput::check(&path, &AppSettings::default());
        assert!(matches!(result, Err(VidquizError::EmptyFile(_))));
    }

    #[tokio::test]
    async fn test_load_hashes_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "lecture.mov", 64);
        let video = VideoInput::load(&path, &AppSettings::default()).await.unwrap();

        assert_eq!(video.mime_type, "video/quicktime");
        assert_eq!(video.bytes.len(), 64);
        assert_eq!(video.sha256.len(), 64);
        assert_eq!(video.stem(), "lecture");
    }

    #[test]
    fn test_prompt_validation() {
        assert!(AnalysisRequest::new("a.mp4", "Summarize").validate_prompt().is_ok());
        assert!(matches!(
            AnalysisRequest::new("a.mp4", "   ").validate_prompt(),
            Err(VidquizError::EmptyPrompt)
        ));
    }
}
