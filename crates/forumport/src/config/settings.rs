//! Resolved runtime settings.

use std::fs;
use std::path::PathBuf;

use super::{MigrationRules, DEFAULT_DATABASE_FILENAME};

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Target database filename, relative to `data_dir`.
    pub database_filename: String,
    /// Explicit target database path (overrides data_dir/database_filename).
    /// Set via FORUMPORT_DATABASE or the `database` field in config files.
    pub database_url: Option<String>,
    /// Connection URL of the legacy PunBB database.
    /// Set via PUNBB_DATABASE_URL or the `source_url` field in config files.
    pub source_url: Option<String>,
    /// Table name prefix of the PunBB installation.
    pub table_prefix: String,
    /// Column on the forums table holding a locale, if the board has one.
    pub locale_column: Option<String>,
    /// Records fetched per page.
    pub batch_size: usize,
    pub rules: MigrationRules,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: data dir -> home dir -> current dir
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("forumport");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            source_url: None,
            table_prefix: "punbb_".to_string(),
            locale_column: None,
            batch_size: 500,
            rules: MigrationRules::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Get the target database URL, constructing it from the path if not set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Get the full path to the target database.
    pub fn database_path(&self) -> PathBuf {
        match self.database_url {
            Some(ref url) => PathBuf::from(url.strip_prefix("sqlite:").unwrap_or(url)),
            None => self.data_dir.join(&self.database_filename),
        }
    }

    /// Check if the target database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        if let Some(parent) = self.database_path().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_from_data_dir() {
        let settings = Settings::with_data_dir(PathBuf::from("/tmp/fp"));
        assert_eq!(settings.database_url(), "sqlite:/tmp/fp/forumport.db");
        assert_eq!(settings.database_path(), PathBuf::from("/tmp/fp/forumport.db"));
    }

    #[test]
    fn test_explicit_database_url() {
        let settings = Settings {
            database_url: Some("sqlite:/srv/target.db".to_string()),
            ..Settings::with_data_dir(PathBuf::from("/tmp/fp"))
        };
        assert_eq!(settings.database_path(), PathBuf::from("/srv/target.db"));
        assert_eq!(settings.database_url(), "sqlite:/srv/target.db");
    }
}
