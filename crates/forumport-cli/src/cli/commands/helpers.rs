//! Store setup shared by commands.

use std::sync::Arc;

use forumport::target::DieselTarget;
use forumport::{Settings, SourceStore};

/// Connect to the legacy PunBB database named by the settings.
#[cfg(feature = "postgres")]
pub async fn connect_source(settings: &Settings) -> anyhow::Result<Arc<dyn SourceStore>> {
    use forumport::source::PunbbSource;

    let Some(ref url) = settings.source_url else {
        anyhow::bail!(
            "No source database configured. Set PUNBB_DATABASE_URL or `source_url` in the config file."
        );
    };
    let source = PunbbSource::connect(
        url,
        &settings.table_prefix,
        settings.locale_column.as_deref(),
    )
    .await?;
    Ok(Arc::new(source))
}

#[cfg(not(feature = "postgres"))]
pub async fn connect_source(_settings: &Settings) -> anyhow::Result<Arc<dyn SourceStore>> {
    anyhow::bail!("forumport was built without PostgreSQL support")
}

/// Open the target database, refusing to create one implicitly.
pub fn open_target(settings: &Settings) -> anyhow::Result<DieselTarget> {
    if !settings.database_exists() {
        anyhow::bail!(
            "Target database {} does not exist. Run `forumport init` first.",
            settings.database_path().display()
        );
    }
    Ok(DieselTarget::from_url(&settings.database_url()))
}
