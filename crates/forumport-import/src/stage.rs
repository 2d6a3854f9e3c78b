//! The unit the runner drives: one entity kind, processed page by page.

use async_trait::async_trait;

use forumport::EntityKind;

use crate::{ImportContext, ImportError, ImportStats};

/// Outcome of one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageResult {
    /// Records read for this page.
    pub records: usize,
    pub stats: ImportStats,
    pub has_more: bool,
}

impl PageResult {
    /// Result for a page of `records` records with a full-page check.
    pub fn new(records: usize, batch_size: u64, stats: ImportStats) -> Self {
        Self {
            records,
            stats,
            has_more: records as u64 >= batch_size,
        }
    }

    /// A stage that reads everything at once.
    pub fn last(records: usize, stats: ImportStats) -> Self {
        Self {
            records,
            stats,
            has_more: false,
        }
    }
}

#[async_trait]
pub trait MigrationStage: Send + Sync {
    /// Name used for `--only` selection and progress display.
    fn name(&self) -> &'static str;

    /// Identity kind whose mappings mark a page as done.
    fn kind(&self) -> EntityKind;

    /// Checks against the source, run before anything is written.
    async fn prepare(&self, _ctx: &ImportContext) -> Result<(), ImportError> {
        Ok(())
    }

    /// Number of records, for progress reporting.
    async fn total(&self, ctx: &ImportContext) -> Result<u64, ImportError>;

    /// Source ids of the page at `offset`, used to skip pages that are fully
    /// imported. `None` disables the check.
    async fn page_ids(
        &self,
        _ctx: &ImportContext,
        _offset: u64,
    ) -> Result<Option<Vec<i64>>, ImportError> {
        Ok(None)
    }

    async fn process_page(
        &self,
        ctx: &mut ImportContext,
        offset: u64,
    ) -> Result<PageResult, ImportError>;

    /// Runs once after the last page.
    async fn finish(&self, _ctx: &mut ImportContext) -> Result<ImportStats, ImportError> {
        Ok(ImportStats::default())
    }
}
