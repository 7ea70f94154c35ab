//! vidquiz CLI entry point.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vidquiz::cli::{commands, error_message, Cli, Commands, Output};
use vidquiz::config::{LoggingSettings, Settings};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load_from(cli.config.as_ref()) {
        Ok(settings) => settings,
        Err(e) => {
            Output::error(&e.to_string());
            std::process::exit(1);
        }
    };

    let _guard = init_logging(cli.verbose, &settings.logging);
    let detailed = settings.logging.enable_detailed_errors;

    if let Err(e) = run(cli, settings).await {
        Output::error(&error_message(&e, detailed));
        std::process::exit(1);
    }
}

/// Initialize logging. `RUST_LOG` wins over `-v` and the configured level.
fn init_logging(verbose: u8, logging: &LoggingSettings) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => logging.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vidquiz={}", level));

    let (file_layer, guard) = if logging.log_file_path.is_empty() {
        (None, None)
    } else {
        let path = Settings::expand_path(&logging.log_file_path);
        let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "vidquiz.log".into());
        let _ = std::fs::create_dir_all(&dir);

        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    guard
}

async fn run(cli: Cli, settings: Settings) -> Result<()> {
    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;

    match cli.command {
        Commands::Run {
            video,
            prompt,
            quiz_source,
            save,
            no_cache,
        } => {
            commands::run_pipeline(video, prompt, quiz_source, save, no_cache, settings).await?;
        }

        Commands::Search { query, top_k } => {
            commands::run_search(&query, top_k, settings).await?;
        }

        Commands::Show { record_id } => {
            commands::run_show(&record_id, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(cli.config.as_deref(), &settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, cli.config.as_ref(), settings)?;
        }
    }

    Ok(())
}
