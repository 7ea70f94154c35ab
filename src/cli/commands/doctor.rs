//! Doctor command - verify credentials, store connectivity and configuration.

use crate::cli::Output;
use crate::config::credentials::{
    mask, validate_gemini_key, validate_groq_key, GEMINI_KEY_VAR, GROQ_KEY_VAR,
};
use crate::config::{Credentials, Settings};
use crate::vector_store::{open_store, StoreLocation};
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, checks: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in checks {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub async fn run_doctor(config_path: Option<&Path>, settings: &Settings) -> anyhow::Result<()> {
    Output::header("vidquiz doctor");
    println!();

    let credentials = Credentials::from_env();
    let mut checks = Vec::new();

    let api_checks = check_credentials(&credentials, settings.security.validate_api_keys);
    print_section("API Credentials", &api_checks);
    checks.extend(api_checks);

    let store_checks = vec![check_store(settings).await];
    print_section("Knowledge Store", &store_checks);
    checks.extend(store_checks);

    let default_path = Settings::default_config_path();
    let local_checks = vec![
        check_data_dir(&settings.data_dir()),
        check_config_file(config_path.unwrap_or(&default_path)),
    ];
    print_section("Local Files", &local_checks);
    checks.extend(local_checks);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        anyhow::bail!("{} check(s) failed", errors);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed.");
    }

    Ok(())
}

fn check_credentials(credentials: &Credentials, validate: bool) -> Vec<CheckResult> {
    vec![
        check_key(
            GEMINI_KEY_VAR,
            credentials.gemini_api_key.as_deref(),
            validate,
            validate_gemini_key,
            "Get a key from Google AI Studio and export GEMINI_API_KEY",
        ),
        check_key(
            GROQ_KEY_VAR,
            credentials.groq_api_key.as_deref(),
            validate,
            validate_groq_key,
            "Get a key from the Groq console and export GROQ_API_KEY",
        ),
    ]
}

fn check_key(
    name: &str,
    key: Option<&str>,
    validate: bool,
    validator: fn(&str) -> crate::Result<()>,
    hint: &str,
) -> CheckResult {
    let Some(key) = key else {
        return CheckResult::error(name, "not set", hint);
    };

    match validator(key) {
        Err(e) if validate => CheckResult::error(name, &format!("{} ({})", e, mask(key)), hint),
        _ => CheckResult::ok(name, &format!("configured ({})", mask(key))),
    }
}

async fn check_store(settings: &Settings) -> CheckResult {
    let name = "Vector store";
    let hint = "Check store.connection_string or set VIDQUIZ_CONNECTION_STRING";

    if let Err(e) = StoreLocation::parse(&settings.store.connection_string) {
        return CheckResult::error(name, &e.to_string(), hint);
    }

    let store = match open_store(&settings.store, settings.api.request_timeout()).await {
        Ok(store) => store,
        Err(e) => return CheckResult::error(name, &e.to_string(), hint),
    };

    let backend = store.backend();
    let count = store.count().await;
    let _ = store.close().await;

    match count {
        Ok(n) if backend == "memory" => CheckResult::warning(
            name,
            &format!("{} ({} records)", backend, n),
            "The in-memory store is emptied when the process exits",
        ),
        Ok(n) => CheckResult::ok(name, &format!("{} reachable ({} records)", backend, n)),
        Err(e) => CheckResult::error(name, &e.to_string(), hint),
    }
}

fn check_data_dir(data_dir: &Path) -> CheckResult {
    if data_dir.is_dir() {
        CheckResult::ok("Data directory", &data_dir.display().to_string())
    } else {
        CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        )
    }
}

fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &config_path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: vidquiz config init",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_missing_and_malformed_keys() {
        let creds = Credentials {
            gemini_api_key: None,
            groq_api_key: Some("not-a-groq-key-but-long-enough-to-mask".to_string()),
        };

        let checks = check_credentials(&creds, true);
        assert_eq!(checks[0].status, CheckStatus::Error);
        assert_eq!(checks[0].message, "not set");
        assert_eq!(checks[1].status, CheckStatus::Error);
        assert!(!checks[1].message.contains("not-a-groq-key-but"));

        let checks = check_credentials(&creds, false);
        assert_eq!(checks[1].status, CheckStatus::Ok);
    }

    #[tokio::test]
    async fn test_store_check_on_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.store.connection_string =
            format!("sqlite://{}", dir.path().join("kb.db").display());

        let result = check_store(&settings).await;
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.message.contains("0 records"));

        settings.store.connection_string = "redis://localhost".to_string();
        assert_eq!(check_store(&settings).await.status, CheckStatus::Error);
    }
}
