//! Pre-flight checks before expensive operations.
//!
//! Validates that required credentials are present (and well-formed when
//! `security.validate_api_keys` is on) before any network call is made.

use crate::config::credentials::{validate_gemini_key, validate_groq_key};
use crate::config::{Credentials, Settings};
use crate::error::Result;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// The full pipeline needs both credentials.
    Run,
    /// Search embeds the query, so it needs the Gemini key.
    Search,
    /// Point lookups only touch the store.
    Show,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings, credentials: &Credentials) -> Result<()> {
    let validate = settings.security.validate_api_keys;

    match operation {
        Operation::Run => {
            check_gemini(credentials, validate)?;
            let groq = credentials.groq()?;
            if validate {
                validate_groq_key(groq)?;
            }
        }
        Operation::Search => {
            check_gemini(credentials, validate)?;
        }
        Operation::Show => {}
    }
    Ok(())
}

fn check_gemini(credentials: &Credentials, validate: bool) -> Result<()> {
    let key = credentials.gemini()?;
    if validate {
        validate_gemini_key(key)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VidquizError;

    fn credentials(gemini: Option<&str>, groq: Option<&str>) -> Credentials {
        Credentials {
            gemini_api_key: gemini.map(str::to_string),
            groq_api_key: groq.map(str::to_string),
        }
    }

    const GEMINI: &str = "AIzaSyA1234567890abcdefghijklmnopqrs";
    const GROQ: &str = "gsk_1234567890abcdefghijklmnopqrstuvwxyzABCD";

    #[test]
    fn test_show_has_no_requirements() {
        assert!(check(Operation::Show, &Settings::default(), &credentials(None, None)).is_ok());
    }

    #[test]
    fn test_run_requires_both_keys() {
        let settings = Settings::default();
        assert!(check(Operation::Run, &settings, &credentials(Some(GEMINI), Some(GROQ))).is_ok());
        assert!(matches!(
            check(Operation::Run, &settings, &credentials(Some(GEMINI), None)),
            Err(VidquizError::Auth(_))
        ));
    }

    #[test]
    fn test_malformed_key_rejected_only_when_validating() {
        let mut settings = Settings::default();
        let creds = credentials(Some("not-a-key"), Some(GROQ));
        assert!(matches!(
            check(Operation::Search, &settings, &creds),
            Err(VidquizError::Auth(_))
        ));

        settings.security.validate_api_keys = false;
        assert!(check(Operation::Search, &settings, &creds).is_ok());
    }
}
