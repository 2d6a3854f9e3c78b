//! Status command.

use console::style;

use forumport::{EntityKind, Settings, TargetStore};

use super::helpers::open_target;

/// Print how many entities of each kind have been imported.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let target = open_target(settings)?;

    println!("\n{}", style("Import Status").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Target:", settings.database_path().display());
    println!(
        "{:<20} {}",
        "Source:",
        if settings.source_url.is_some() {
            "configured"
        } else {
            "not configured"
        }
    );
    println!();

    for kind in EntityKind::ALL {
        let count = target.count_imported(kind).await?;
        println!("{:<20} {}", format!("{}:", kind), count);
    }

    Ok(())
}
