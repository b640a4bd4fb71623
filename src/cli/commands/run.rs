//! `run` command

use std::path::Path;

use ravendb_ingest::ingest::{IngestError, MemorySink, RavenDbSource, Recipe, sink};
use tracing::warn;

/// Handle the `run` command
pub async fn handle_run(config: &Path, dry_run: bool) -> anyhow::Result<()> {
    let recipe = Recipe::load(config).map_err(IngestError::from)?;

    let source = RavenDbSource::connect(recipe.source.config.clone())?;

    let cancel = source.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling ingestion");
            cancel.cancel();
        }
    });

    eprintln!("Ingesting from {}", recipe.source.config.connect_uri);
    if dry_run {
        eprintln!("  Dry run: records are not written");
    }

    let report = if dry_run {
        source.run(&mut MemorySink::new()).await?
    } else {
        let mut sink = sink::from_spec(&recipe.sink);
        source.run(sink.as_mut()).await?
    };

    report.print_summary();
    if !report.is_success() {
        anyhow::bail!("Ingestion finished with {} failures", report.failures.len());
    }
    Ok(())
}
