//! API credentials read once from the environment.

use crate::error::{Result, VidquizError};

/// Environment variable holding the Gemini key (description and embeddings).
pub const GEMINI_KEY_VAR: &str = "GEMINI_API_KEY";
/// Accepted fallback for the Gemini key.
pub const GOOGLE_KEY_VAR: &str = "GOOGLE_API_KEY";
/// Environment variable holding the Groq key (quiz generation).
pub const GROQ_KEY_VAR: &str = "GROQ_API_KEY";

/// Credentials for the hosted services.
#[derive(Clone, Default)]
pub struct Credentials {
    pub gemini_api_key: Option<String>,
    pub groq_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &self.gemini_api_key.as_deref().map(mask))
            .field("groq_api_key", &self.groq_api_key.as_deref().map(mask))
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        let non_empty = |var: &str| std::env::var(var).ok().filter(|v| !v.trim().is_empty());
        Self {
            gemini_api_key: non_empty(GEMINI_KEY_VAR).or_else(|| non_empty(GOOGLE_KEY_VAR)),
            groq_api_key: non_empty(GROQ_KEY_VAR),
        }
    }

    /// The Gemini key, or an auth error with a remediation hint.
    pub fn gemini(&self) -> Result<&str> {
        self.gemini_api_key.as_deref().ok_or_else(|| {
            VidquizError::Auth(format!(
                "{} not set. Get a key from Google AI Studio and run: export {}='AIza...'",
                GEMINI_KEY_VAR, GEMINI_KEY_VAR
            ))
        })
    }

    /// The Groq key, or an auth error with a remediation hint.
    pub fn groq(&self) -> Result<&str> {
        self.groq_api_key.as_deref().ok_or_else(|| {
            VidquizError::Auth(format!(
                "{} not set. Get a key from the Groq console and run: export {}='gsk_...'",
                GROQ_KEY_VAR, GROQ_KEY_VAR
            ))
        })
    }
}

/// Format check for a Gemini key: `AI` prefix, at least 30 characters.
pub fn validate_gemini_key(key: &str) -> Result<()> {
    if !key.starts_with("AI") || key.len() < 30 {
        return Err(VidquizError::Auth(format!(
            "Invalid Gemini API key format in {} (expected 'AIza...', at least 30 characters)",
            GEMINI_KEY_VAR
        )));
    }
    Ok(())
}

/// Format check for a Groq key: `gsk_` prefix, at least 40 characters.
pub fn validate_groq_key(key: &str) -> Result<()> {
    if !key.starts_with("gsk_") || key.len() < 40 {
        return Err(VidquizError::Auth(format!(
            "Invalid Groq API key format in {} (expected 'gsk_...', at least 40 characters)",
            GROQ_KEY_VAR
        )));
    }
    Ok(())
}

/// Mask a secret for display.
pub fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 10 {
        return "****".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
