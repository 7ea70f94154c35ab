//! Show command - print one stored record.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Credentials, Settings};
use crate::vector_store::open_store;
use anyhow::{bail, Result};

/// Run the show command.
pub async fn run_show(record_id: &str, settings: Settings) -> Result<()> {
    preflight::check(Operation::Show, &settings, &Credentials::from_env())?;

    let store = open_store(&settings.store, settings.api.request_timeout()).await?;
    let record = store.get(record_id).await;
    store.close().await?;

    let Some(record) = record? else {
        bail!("No record with id {}", record_id);
    };

    Output::header(&format!("Record {}", record.id));
    Output::kv("Video", &record.video_reference);
    Output::kv("Created", &record.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    Output::kv("Embedding", &format!("{} dimensions", record.embedding.len()));
    println!("\n{}", record.description);

    Ok(())
}
