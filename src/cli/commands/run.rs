//! Run command - the long-running relay.

use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::watcher::Orchestrator;

/// Baseline every source, then relay new reports until Ctrl-C.
pub async fn run(settings: Settings, no_baseline: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut orchestrator = Orchestrator::builder()
        .settings(settings)
        .cancel_token(cancel.clone())
        .build()?;

    for source in orchestrator.sources() {
        crate::log_event!(
            source.id(),
            "watching",
            "{} -> {}",
            source.dir().display(),
            source.route_description()
        );
    }

    if no_baseline {
        tracing::warn!("[relay] baseline disabled, files already present will be relayed");
    } else {
        let skipped = orchestrator.baseline().await;
        crate::log_event!("relay", "baseline", "{skipped} existing files skipped");
    }

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                crate::log_event!("relay", "shutdown requested");
                cancel.cancel();
            }
            Err(e) => tracing::error!("[relay] cannot listen for Ctrl-C: {e}"),
        }
    });

    orchestrator.run().await;
    Ok(())
}
