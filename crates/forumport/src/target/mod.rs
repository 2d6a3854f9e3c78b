//! Target platform persistence.
//!
//! The importer only talks to the target through [`TargetStore`]. Identity
//! mappings are stored by the target itself as import metadata, next to the
//! entities they describe.

mod memory;
pub mod pool;
mod records;
mod sqlite;
mod util;

pub use memory::MemoryTarget;
pub use pool::{DbError, SqlitePool};
pub use sqlite::DieselTarget;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    CreateOutcome, EntityKind, PermalinkTarget, PostLocation, StaffAction, TargetDescriptor,
    TargetUser,
};

/// Errors from the target store. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("target unavailable: {0}")]
    Unavailable(String),
}

/// Persistence and import API of the target platform.
///
/// Methods returning `Err` signal controller-level failures. Per-record
/// problems inside [`batch_create`](TargetStore::batch_create) are reported
/// as [`CreateOutcome::Failed`] instead.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Create entities, deduplicating by forced id (users, posts) or natural
    /// key (group name, category name under the same parent). Returns one
    /// outcome per descriptor, in order.
    async fn batch_create(
        &self,
        descriptors: Vec<TargetDescriptor>,
    ) -> Result<Vec<CreateOutcome>, TargetError>;

    /// Look up the recorded target id for a source id.
    async fn lookup_import_id(
        &self,
        kind: EntityKind,
        source_id: i64,
    ) -> Result<Option<i64>, TargetError>;

    /// Record an identity mapping. Overwrites are the caller's responsibility
    /// to prevent.
    async fn record_import_id(
        &self,
        kind: EntityKind,
        source_id: i64,
        target_id: i64,
    ) -> Result<(), TargetError>;

    /// Whether every source id already has a mapping.
    async fn exists(&self, kind: EntityKind, source_ids: &[i64]) -> Result<bool, TargetError>;

    /// Number of recorded mappings for a kind.
    async fn count_imported(&self, kind: EntityKind) -> Result<u64, TargetError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<TargetUser>, TargetError>;

    async fn suspend_user(
        &self,
        user_id: i64,
        suspended_at: DateTime<Utc>,
        suspended_till: DateTime<Utc>,
    ) -> Result<(), TargetError>;

    async fn log_staff_action(&self, action: &StaffAction) -> Result<(), TargetError>;

    /// Whether an `action` entry targeting this user is already logged.
    async fn staff_action_logged(
        &self,
        target_user_id: i64,
        action: &str,
    ) -> Result<bool, TargetError>;

    /// Add a user to a group. Returns false if already a member.
    async fn add_group_member(&self, group_id: i64, user_id: i64) -> Result<bool, TargetError>;

    /// Grant full access on a category to a group.
    async fn grant_category_permission(
        &self,
        category_id: i64,
        group_id: i64,
    ) -> Result<(), TargetError>;

    async fn post_location(&self, post_id: i64) -> Result<Option<PostLocation>, TargetError>;

    async fn permalink_exists(&self, url: &str) -> Result<bool, TargetError>;

    async fn create_permalink(&self, url: &str, target: PermalinkTarget)
        -> Result<(), TargetError>;
}
