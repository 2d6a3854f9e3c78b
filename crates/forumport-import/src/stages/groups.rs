//! Virtual groups from configuration.

use async_trait::async_trait;

use forumport::models::{GroupDescriptor, TargetDescriptor};
use forumport::EntityKind;

use super::apply_outcome;
use crate::{ImportContext, ImportError, ImportStats, MigrationStage, PageResult};

/// Creates the configured virtual groups. Their configured ids serve as
/// source ids.
pub struct GroupStage;

#[async_trait]
impl MigrationStage for GroupStage {
    fn name(&self) -> &'static str {
        "groups"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Group
    }

    async fn total(&self, ctx: &ImportContext) -> Result<u64, ImportError> {
        Ok(ctx.rules.virtual_groups.len() as u64)
    }

    async fn page_ids(
        &self,
        ctx: &ImportContext,
        offset: u64,
    ) -> Result<Option<Vec<i64>>, ImportError> {
        if offset > 0 {
            return Ok(Some(Vec::new()));
        }
        Ok(Some(ctx.rules.virtual_groups.iter().map(|g| g.id).collect()))
    }

    async fn process_page(
        &self,
        ctx: &mut ImportContext,
        _offset: u64,
    ) -> Result<PageResult, ImportError> {
        let groups = ctx.rules.virtual_groups.clone();
        let mut stats = ImportStats {
            scanned: groups.len(),
            ..ImportStats::default()
        };

        let mut pending = Vec::new();
        for group in &groups {
            if ctx.ids.resolve(EntityKind::Group, group.id).await?.is_some() {
                stats.skipped += 1;
                continue;
            }
            pending.push(GroupDescriptor {
                source_id: group.id,
                name: group.name.clone(),
            });
        }

        if !pending.is_empty() {
            let ids: Vec<i64> = pending.iter().map(|g| g.source_id).collect();
            let descriptors = pending.into_iter().map(TargetDescriptor::Group).collect();
            let outcomes = ctx.target().batch_create(descriptors).await?;
            for (source_id, outcome) in ids.into_iter().zip(&outcomes) {
                apply_outcome(ctx, EntityKind::Group, source_id, outcome, &mut stats).await?;
            }
        }

        Ok(PageResult::last(groups.len(), stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use forumport::source::MemorySource;
    use forumport::target::MemoryTarget;
    use forumport::{MigrationRules, VirtualGroup};

    fn rules() -> MigrationRules {
        MigrationRules {
            virtual_groups: vec![
                VirtualGroup {
                    id: 100,
                    name: "association".to_string(),
                    legacy_group_ids: vec![5],
                },
                VirtualGroup {
                    id: 101,
                    name: "staff".to_string(),
                    legacy_group_ids: vec![],
                },
            ],
            ..MigrationRules::default()
        }
    }

    #[tokio::test]
    async fn test_groups_created_once() {
        let target = Arc::new(MemoryTarget::new());
        let mut ctx = ImportContext::new(Arc::new(MemorySource::new()), target.clone(), rules());

        let first = GroupStage.process_page(&mut ctx, 0).await.unwrap();
        assert_eq!(first.stats.created, 2);
        assert!(!first.has_more);

        let second = GroupStage.process_page(&mut ctx, 0).await.unwrap();
        assert_eq!(second.stats.created, 0);
        assert_eq!(second.stats.skipped, 2);

        let staff = target.group_id("staff").await.unwrap();
        assert_eq!(
            ctx.ids.resolve(EntityKind::Group, 101).await.unwrap(),
            Some(staff)
        );
    }
}
