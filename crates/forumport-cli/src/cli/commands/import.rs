//! Import command.

use std::sync::Arc;

use console::style;
use tokio::sync::mpsc;

use forumport::{PostFilter, Settings};
use forumport_import::{ImportContext, ImportEvent, ImportRunner};

use super::helpers::{connect_source, open_target};
use crate::cli::progress::{print_summary, spawn_progress};

/// Run the import pipeline against the configured source and target.
pub async fn cmd_import(
    settings: &Settings,
    filter: PostFilter,
    only: &[String],
    batch_size: Option<usize>,
) -> anyhow::Result<()> {
    // Validate stage names before touching either database.
    let runner = ImportRunner::new().only(only)?;
    let batch_size = batch_size.unwrap_or(settings.batch_size);
    if batch_size == 0 {
        anyhow::bail!("--batch-size must be at least 1");
    }

    let target = Arc::new(open_target(settings)?);
    tracing::debug!("Target database: {}", settings.database_path().display());
    println!("{} Connecting to PunBB database...", style("→").cyan());
    let source = connect_source(settings).await?;

    if !filter.is_empty() {
        println!("{} Post filter: {:?}", style("!").yellow(), filter);
    }
    println!(
        "{} Running stages: {}",
        style("→").cyan(),
        runner.stage_names().join(", ")
    );

    let (event_tx, event_rx) = mpsc::channel::<ImportEvent>(100);
    let event_handler = spawn_progress(event_rx);

    let mut ctx = ImportContext::new(source, target, settings.rules.clone())
        .with_batch_size(batch_size as u64)
        .with_filter(filter)
        .with_events(event_tx);

    let result = runner.run(&mut ctx).await;

    // Dropping the context closes the channel and ends the display task.
    drop(ctx);
    let _ = event_handler.await;

    match result {
        Ok(report) => {
            print_summary(&report);
            Ok(())
        }
        Err(e) => {
            println!("{} Import aborted: {}", style("✗").red(), e);
            println!("  The run can be restarted; imported records will be skipped.");
            Err(e.into())
        }
    }
}
