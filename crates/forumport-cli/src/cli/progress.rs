//! Progress display for an import run.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use forumport_import::{ImportEvent, ImportReport, ImportStats};

fn stage_bar(stage: &str, total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb.set_message(stage.to_string());
    pb
}

fn counts(stats: &ImportStats) -> String {
    let mut line = format!(
        "{} created, {} skipped, {} failed",
        stats.created, stats.skipped, stats.failed
    );
    if stats.orphaned > 0 {
        line.push_str(&format!(", {} orphaned", stats.orphaned));
    }
    line
}

/// Drive one progress bar per stage from the runner's events. The task ends
/// when every sender is dropped.
pub fn spawn_progress(mut events: mpsc::Receiver<ImportEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut bar: Option<ProgressBar> = None;

        while let Some(event) = events.recv().await {
            match event {
                ImportEvent::StageStarted { stage, total } => {
                    if let Some(pb) = bar.take() {
                        pb.finish_and_clear();
                    }
                    bar = Some(stage_bar(stage, total));
                }
                ImportEvent::PageDone {
                    stage,
                    offset,
                    records,
                    stats,
                } => {
                    if let Some(ref pb) = bar {
                        pb.inc(records as u64);
                        if stats.failed > 0 {
                            pb.println(format!(
                                "  {} {} page at {}: {} failed",
                                style("✗").red(),
                                stage,
                                offset,
                                stats.failed
                            ));
                        }
                    }
                }
                ImportEvent::PageSkipped { records, .. } => {
                    if let Some(ref pb) = bar {
                        pb.inc(records as u64);
                    }
                }
                ImportEvent::StageFinished { stage, stats } => {
                    if let Some(pb) = bar.take() {
                        pb.finish_and_clear();
                    }
                    println!("{} {}: {}", style("✓").green(), stage, counts(&stats));
                }
            }
        }

        if let Some(pb) = bar {
            pb.finish_and_clear();
        }
    })
}

/// Print per-stage totals after a run.
pub fn print_summary(report: &ImportReport) {
    println!("\n{}", style("Import Summary").bold());
    println!("{}", "-".repeat(60));
    println!(
        "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Stage", "Scanned", "Created", "Skipped", "Failed", "Orphaned"
    );
    for (stage, stats) in &report.stages {
        println!(
            "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8}",
            stage, stats.scanned, stats.created, stats.skipped, stats.failed, stats.orphaned
        );
    }

    let total = report.total();
    println!("{}", "-".repeat(60));
    println!(
        "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Total", total.scanned, total.created, total.skipped, total.failed, total.orphaned
    );

    if total.failed > 0 || total.orphaned > 0 {
        println!(
            "\n{} Some records were not imported; see the log for details",
            style("!").yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_mentions_orphans_only_when_present() {
        let stats = ImportStats {
            scanned: 5,
            created: 3,
            skipped: 1,
            failed: 1,
            orphaned: 0,
        };
        assert_eq!(counts(&stats), "3 created, 1 skipped, 1 failed");

        let orphaned = ImportStats {
            orphaned: 2,
            ..stats
        };
        assert!(counts(&orphaned).ends_with(", 2 orphaned"));
    }

    #[tokio::test]
    async fn test_progress_task_ends_with_channel() {
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_progress(rx);
        tx.send(ImportEvent::StageStarted {
            stage: "users",
            total: 2,
        })
        .await
        .unwrap();
        tx.send(ImportEvent::PageSkipped {
            stage: "users",
            offset: 0,
            records: 2,
        })
        .await
        .unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
