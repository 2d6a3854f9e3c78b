//! Actions that wait for their owning entity to exist in the target.

use std::collections::BTreeMap;

use forumport::EntityKind;

use crate::{ImportContext, ImportError};

/// Work to do once an entity has a target id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Add a user to every virtual group matching their legacy group, and
    /// to the staff group when `staff` is set.
    JoinGroups { legacy_group_id: i64, staff: bool },
}

/// Pending actions keyed by owner.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    pending: BTreeMap<(EntityKind, i64), Vec<DeferredAction>>,
}

impl DeferredQueue {
    pub fn push(&mut self, kind: EntityKind, source_id: i64, action: DeferredAction) {
        self.pending
            .entry((kind, source_id))
            .or_default()
            .push(action);
    }

    /// Remove and return the actions waiting on an entity.
    pub fn take(&mut self, kind: EntityKind, source_id: i64) -> Vec<DeferredAction> {
        self.pending.remove(&(kind, source_id)).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl DeferredAction {
    /// Apply the action to the created entity.
    pub async fn run(&self, ctx: &mut ImportContext, target_id: i64) -> Result<(), ImportError> {
        match *self {
            DeferredAction::JoinGroups {
                legacy_group_id,
                staff,
            } => {
                for group_source_id in ctx.rules.groups_for(legacy_group_id, staff) {
                    let Some(group_id) = ctx.ids.resolve(EntityKind::Group, group_source_id).await?
                    else {
                        tracing::warn!(
                            "Group {} is not imported, cannot add user {}",
                            group_source_id,
                            target_id
                        );
                        continue;
                    };
                    if ctx.target().add_group_member(group_id, target_id).await? {
                        tracing::debug!("Added user {} to group {}", target_id, group_id);
                    }
                }
                Ok(())
            }
        }
    }
}

/// Drain and run the actions waiting on `source_id`, now created as `target_id`.
pub async fn run_pending(
    ctx: &mut ImportContext,
    kind: EntityKind,
    source_id: i64,
    target_id: i64,
) -> Result<usize, ImportError> {
    let actions = ctx.deferred.take(kind, source_id);
    for action in &actions {
        action.run(ctx, target_id).await?;
    }
    Ok(actions.len())
}
