//! One stage per entity kind, in the order the runner executes them.

mod bans;
mod categories;
mod documents;
mod groups;
mod posts;
mod redirects;
mod users;

pub use bans::BanStage;
pub use categories::CategoryStage;
pub use documents::DocumentRef;
pub use groups::GroupStage;
pub use posts::{guest_line, PostStage};
pub use redirects::RedirectStage;
pub use users::{normalize_username, UserStage};

use forumport::models::CreateOutcome;
use forumport::EntityKind;

use crate::{ImportContext, ImportError, ImportStats};

/// Count a create outcome. Returns the target id of a created or
/// deduplicated entity.
pub(crate) fn count_outcome(
    kind: EntityKind,
    source_id: i64,
    outcome: &CreateOutcome,
    stats: &mut ImportStats,
) -> Option<i64> {
    match outcome {
        CreateOutcome::Created { .. } => stats.created += 1,
        CreateOutcome::Existing { target_id } => {
            tracing::debug!("{} {} already exists as {}", kind, source_id, target_id);
            stats.skipped += 1;
        }
        CreateOutcome::Failed { reason } => {
            tracing::warn!("Failed to create {} {}: {}", kind, source_id, reason);
            stats.failed += 1;
        }
    }
    outcome.target_id()
}

/// Count a create outcome and map the entity if it now exists.
///
/// The mapping marks the entity as done, so callers with follow-up writes
/// use [`count_outcome`] and record the mapping last.
pub(crate) async fn apply_outcome(
    ctx: &mut ImportContext,
    kind: EntityKind,
    source_id: i64,
    outcome: &CreateOutcome,
    stats: &mut ImportStats,
) -> Result<Option<i64>, ImportError> {
    let target_id = count_outcome(kind, source_id, outcome, stats);
    if let Some(target_id) = target_id {
        ctx.ids.record(kind, source_id, target_id).await?;
    }
    Ok(target_id)
}
