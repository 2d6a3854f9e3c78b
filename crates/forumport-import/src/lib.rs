//! Staged import of a PunBB board into the target forum.
//!
//! Each entity kind is a [`MigrationStage`]. The [`ImportRunner`] drives the
//! stages in dependency order, page by page, skipping pages whose records
//! are all mapped already. Everything a stage needs travels in an explicit
//! [`ImportContext`].

mod context;
mod deferred;
mod runner;
mod stage;
pub mod stages;

pub use context::ImportContext;
pub use deferred::{DeferredAction, DeferredQueue};
pub use runner::{ImportReport, ImportRunner};
pub use stage::{MigrationStage, PageResult};

use thiserror::Error;

use forumport::{IdentityError, SourceError, TargetError};

/// Errors that stop an import run.
///
/// Per-record problems (an orphaned reply, a ban with no matching user) are
/// counted in [`ImportStats`] instead.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("migration rules do not fit the source: {0}")]
    InvalidRules(String),
}

/// Statistics collected during import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Records read from the source.
    pub scanned: usize,
    /// Entities created in the target.
    pub created: usize,
    /// Already present (mapped before, deduplicated, or a skipped page).
    pub skipped: usize,
    /// Records the target rejected, or that could not be applied.
    pub failed: usize,
    /// Replies whose topic could not be resolved.
    pub orphaned: usize,
}

impl ImportStats {
    /// Merge stats from another instance.
    pub fn merge(&mut self, other: &ImportStats) {
        self.scanned += other.scanned;
        self.created += other.created;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.orphaned += other.orphaned;
    }
}

/// Progress notifications for a UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    StageStarted { stage: &'static str, total: u64 },
    /// A page was processed.
    PageDone {
        stage: &'static str,
        offset: u64,
        records: usize,
        stats: ImportStats,
    },
    /// Every record of a page was already mapped.
    PageSkipped {
        stage: &'static str,
        offset: u64,
        records: usize,
    },
    StageFinished {
        stage: &'static str,
        stats: ImportStats,
    },
}
