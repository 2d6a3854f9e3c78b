//! Categories and forums. Forums become child categories.

use async_trait::async_trait;

use forumport::models::{CategoryDescriptor, SourceCategory, SourceForum, TargetDescriptor};
use forumport::{EntityKind, MigrationRules};

use super::apply_outcome;
use crate::{ImportContext, ImportError, ImportStats, MigrationStage, PageResult};

fn category_descriptor(category: &SourceCategory, rules: &MigrationRules) -> CategoryDescriptor {
    CategoryDescriptor {
        kind: EntityKind::Category,
        source_id: category.id,
        name: category.name.clone(),
        description: None,
        position: category.position,
        parent_id: None,
        read_restricted: rules.is_category_restricted(category.id),
        suppress_from_homepage: false,
    }
}

/// A forum inherits the restriction of its legacy category.
fn forum_descriptor(forum: &SourceForum, parent_id: i64, rules: &MigrationRules) -> CategoryDescriptor {
    CategoryDescriptor {
        kind: EntityKind::Forum,
        source_id: forum.id,
        name: forum.name.clone(),
        description: forum.description.clone(),
        position: forum.position,
        parent_id: Some(parent_id),
        read_restricted: rules.is_forum_restricted(forum.id)
            || rules.is_category_restricted(forum.category_id),
        suppress_from_homepage: rules.homepage_suppressed_forum_id == Some(forum.id),
    }
}

async fn create_all(
    ctx: &mut ImportContext,
    pending: Vec<CategoryDescriptor>,
    stats: &mut ImportStats,
) -> Result<(), ImportError> {
    if pending.is_empty() {
        return Ok(());
    }
    let keys: Vec<(EntityKind, i64)> = pending.iter().map(|c| (c.kind, c.source_id)).collect();
    let descriptors = pending.into_iter().map(TargetDescriptor::Category).collect();
    let outcomes = ctx.target().batch_create(descriptors).await?;
    for ((kind, source_id), outcome) in keys.into_iter().zip(&outcomes) {
        apply_outcome(ctx, kind, source_id, outcome, stats).await?;
    }
    Ok(())
}

/// Top-level categories first, then forums under them. Restricted
/// categories are opened to the restricted-access group at the end.
pub struct CategoryStage;

#[async_trait]
impl MigrationStage for CategoryStage {
    fn name(&self) -> &'static str {
        "categories"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Category
    }

    async fn total(&self, ctx: &ImportContext) -> Result<u64, ImportError> {
        let categories = ctx.source.count(EntityKind::Category, &ctx.filter).await?;
        let forums = ctx.source.count(EntityKind::Forum, &ctx.filter).await?;
        Ok(categories + forums)
    }

    async fn process_page(
        &self,
        ctx: &mut ImportContext,
        _offset: u64,
    ) -> Result<PageResult, ImportError> {
        let categories = ctx.source.categories().await?;
        let forums = ctx.source.forums().await?;
        let mut stats = ImportStats {
            scanned: categories.len() + forums.len(),
            ..ImportStats::default()
        };

        let mut pending = Vec::new();
        for category in &categories {
            if ctx.ids.resolve(EntityKind::Category, category.id).await?.is_some() {
                stats.skipped += 1;
                continue;
            }
            pending.push(category_descriptor(category, &ctx.rules));
        }
        create_all(ctx, pending, &mut stats).await?;

        let mut pending = Vec::new();
        for forum in &forums {
            if ctx.ids.resolve(EntityKind::Forum, forum.id).await?.is_some() {
                stats.skipped += 1;
                continue;
            }
            let Some(parent_id) = ctx.ids.resolve(EntityKind::Category, forum.category_id).await?
            else {
                tracing::warn!(
                    "Category {} of forum {} is not imported, skipping",
                    forum.category_id,
                    forum.id
                );
                stats.failed += 1;
                continue;
            };
            pending.push(forum_descriptor(forum, parent_id, &ctx.rules));
        }
        create_all(ctx, pending, &mut stats).await?;

        Ok(PageResult::last(categories.len() + forums.len(), stats))
    }

    async fn finish(&self, ctx: &mut ImportContext) -> Result<ImportStats, ImportError> {
        let Some(group_source_id) = ctx.rules.restricted_access_group_id else {
            return Ok(ImportStats::default());
        };
        let Some(group_id) = ctx.ids.resolve(EntityKind::Group, group_source_id).await? else {
            tracing::warn!(
                "Restricted access group {} is not imported, no permissions granted",
                group_source_id
            );
            return Ok(ImportStats::default());
        };

        let mut restricted: Vec<(EntityKind, i64)> = ctx
            .rules
            .restricted_category_ids
            .iter()
            .map(|&id| (EntityKind::Category, id))
            .collect();
        for forum in ctx.source.forums().await? {
            if ctx.rules.is_forum_restricted(forum.id)
                || ctx.rules.is_category_restricted(forum.category_id)
            {
                restricted.push((EntityKind::Forum, forum.id));
            }
        }

        for (kind, source_id) in restricted {
            if let Some(category_id) = ctx.ids.resolve(kind, source_id).await? {
                ctx.target()
                    .grant_category_permission(category_id, group_id)
                    .await?;
                tracing::debug!("Granted group {} access to category {}", group_id, category_id);
            }
        }
        Ok(ImportStats::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use forumport::source::MemorySource;
    use forumport::target::MemoryTarget;
    use forumport::VirtualGroup;

    use crate::stages::GroupStage;

    fn source() -> MemorySource {
        MemorySource::new()
            .with_categories(vec![
                SourceCategory {
                    id: 1,
                    name: "Mountains".to_string(),
                    position: 0,
                },
                SourceCategory {
                    id: 2,
                    name: "Association".to_string(),
                    position: 1,
                },
            ])
            .with_forums(vec![
                SourceForum {
                    id: 10,
                    name: "Alps".to_string(),
                    description: Some("Routes and conditions".to_string()),
                    position: 0,
                    category_id: 1,
                    locale: Some("fr".to_string()),
                },
                SourceForum {
                    id: 11,
                    name: "Board".to_string(),
                    description: None,
                    position: 0,
                    category_id: 2,
                    locale: None,
                },
                SourceForum {
                    id: 12,
                    name: "Lost".to_string(),
                    description: None,
                    position: 0,
                    category_id: 99,
                    locale: None,
                },
            ])
    }

    #[tokio::test]
    async fn test_forums_under_categories_with_flags() {
        let rules = MigrationRules {
            virtual_groups: vec![VirtualGroup {
                id: 300,
                name: "board".to_string(),
                legacy_group_ids: vec![],
            }],
            restricted_category_ids: vec![2],
            restricted_access_group_id: Some(300),
            homepage_suppressed_forum_id: Some(10),
            ..MigrationRules::default()
        };
        let target = Arc::new(MemoryTarget::new());
        let mut ctx = ImportContext::new(Arc::new(source()), target.clone(), rules);

        GroupStage.process_page(&mut ctx, 0).await.unwrap();
        let page = CategoryStage.process_page(&mut ctx, 0).await.unwrap();
        assert_eq!(page.stats.created, 4);
        assert_eq!(page.stats.failed, 1);
        CategoryStage.finish(&mut ctx).await.unwrap();

        let mountains = ctx.ids.resolve(EntityKind::Category, 1).await.unwrap().unwrap();
        let association = ctx.ids.resolve(EntityKind::Category, 2).await.unwrap().unwrap();
        let alps = ctx.ids.resolve(EntityKind::Forum, 10).await.unwrap().unwrap();
        let board = ctx.ids.resolve(EntityKind::Forum, 11).await.unwrap().unwrap();

        let categories = target.categories().await;
        let find = |id: i64| categories.iter().find(|c| c.id == id).unwrap().clone();
        assert_eq!(find(alps).parent_id, Some(mountains));
        assert!(find(alps).suppress_from_homepage);
        assert!(!find(alps).read_restricted);
        assert!(find(association).read_restricted);
        assert!(find(board).read_restricted);

        let group = target.group_id("board").await.unwrap();
        let mut grants = target.category_permissions().await;
        grants.sort();
        let mut expected = vec![(association, group), (board, group)];
        expected.sort();
        assert_eq!(grants, expected);
    }

    #[tokio::test]
    async fn test_rerun_creates_nothing() {
        let target = Arc::new(MemoryTarget::new());
        let mut ctx = ImportContext::new(
            Arc::new(source()),
            target.clone(),
            MigrationRules::default(),
        );
        CategoryStage.process_page(&mut ctx, 0).await.unwrap();
        let again = CategoryStage.process_page(&mut ctx, 0).await.unwrap();
        assert_eq!(again.stats.created, 0);
        assert_eq!(again.stats.skipped, 4);
        assert_eq!(target.entity_counts().await.categories, 4);
    }
}
