use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::app::Result;
use crate::cli::HarvestArgs;
use crate::config::Config;
use crate::discovery::load_targets;
use crate::domain::{CollectionLog, RunOutcome, TargetStatus};
use crate::session::SessionManager;
use crate::store::{JsonStore, Store};
use crate::worker::Coordinator;

/// Run a full collection and return the outcome for the process exit code.
pub async fn harvest(args: &HarvestArgs, mut config: Config) -> Result<RunOutcome> {
    args.apply(&mut config);

    let targets = load_targets(&args.input)?;
    if targets.is_empty() {
        println!("No targets to harvest");
        return Ok(RunOutcome::Clean);
    }

    let store = Arc::new(JsonStore::open(&args.output_dir)?);
    let factory = Arc::new(SessionManager::new(config.browser.clone()));

    // Ctrl-c raises the stop flag; in-flight targets finish, nothing new
    // is dispatched, and the run log records the abort.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight targets");
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    let coordinator = Coordinator::new(factory, store, config);
    let (result, log) = coordinator.run(targets, stop).await?;

    print_summary(&log);
    if !result.is_empty() {
        println!("Artifacts written to {}", args.output_dir.display());
    }
    Ok(log.outcome())
}

/// Print the targets a discovery file would yield, without harvesting.
pub fn targets(input: &Path) -> Result<()> {
    let targets = load_targets(input)?;
    if targets.is_empty() {
        println!("No targets");
        return Ok(());
    }

    for (index, target) in targets.iter().enumerate() {
        let count = target
            .known_review_count
            .map(|n| format!("{} reviews", n))
            .unwrap_or_else(|| "review count unknown".to_string());
        println!("{:4}  {}  {} ({})", index, target.id, target.name, count);
    }
    println!("\n{} targets", targets.len());
    Ok(())
}

/// Summarize a previous run from its artifacts and log.
pub fn report(output_dir: &Path) -> Result<()> {
    let store = JsonStore::open(output_dir)?;

    let ids = store.list_result_ids()?;
    if ids.is_empty() {
        println!("No artifacts in {}", output_dir.display());
        return Ok(());
    }

    let mut reviews = 0;
    let mut partial = 0;
    let mut failed = 0;
    for id in &ids {
        let Some(result) = store.read_result(id)? else {
            continue;
        };
        reviews += result.reviews.len();
        match result.status {
            TargetStatus::PartialTimeout => partial += 1,
            TargetStatus::Failed => failed += 1,
            TargetStatus::Complete => {}
        }
        println!(
            "{}  {}  {} reviews{}",
            result.target_id,
            result.target_name,
            result.reviews.len(),
            match result.status {
                TargetStatus::Complete => "",
                TargetStatus::PartialTimeout => "  (partial)",
                TargetStatus::Failed => "  (failed)",
            }
        );
    }

    println!(
        "\n{} targets, {} reviews ({} partial, {} failed)",
        ids.len(),
        reviews,
        partial,
        failed
    );

    if let Some(log) = store.read_log()? {
        print_summary(&log);
    }
    Ok(())
}

fn print_summary(log: &CollectionLog) {
    println!(
        "\nRun started {}: {} attempted, {} succeeded, {} failed, {} skipped",
        log.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        log.targets_attempted,
        log.targets_succeeded,
        log.targets_failed,
        log.targets_skipped
    );
    let rate = if log.elapsed_secs > 0 {
        log.reviews_collected as f64 / log.elapsed_secs as f64
    } else {
        log.reviews_collected as f64
    };
    println!(
        "{} reviews in {}s ({:.1} reviews/sec)",
        log.reviews_collected, log.elapsed_secs, rate
    );
    for failure in &log.failed_targets {
        eprintln!("  failed: {} ({})", failure.id, failure.kind);
    }
    if log.aborted {
        println!("Run was interrupted; re-run with the same output dir to resume");
    }
}
