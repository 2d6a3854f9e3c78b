//! Initialize command.

use console::style;

use forumport::target::DieselTarget;
use forumport::Settings;

/// Create the data directory and the target tables.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let existed = settings.database_exists();
    println!("{} Creating target schema...", style("→").cyan());
    let target = DieselTarget::from_url(&settings.database_url());
    target.init_schema().await?;

    if existed {
        println!(
            "{} Target database {} was already present, schema is up to date",
            style("!").yellow(),
            settings.database_path().display()
        );
    } else {
        println!(
            "{} Initialized forumport in {}",
            style("✓").green(),
            settings.database_path().display()
        );
    }

    Ok(())
}
