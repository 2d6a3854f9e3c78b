//! Permalinks from legacy PunBB URLs to imported entities.

use async_trait::async_trait;

use forumport::models::PermalinkTarget;
use forumport::EntityKind;

use crate::{ImportContext, ImportError, ImportStats, MigrationStage, PageResult};

/// Creates `viewforum.php?id=`, `viewtopic.php?id=` and `viewtopic.php?pid=`
/// permalinks. Forums go with the first page; topics and posts are paged
/// side by side.
pub struct RedirectStage;

async fn create_redirect(
    ctx: &ImportContext,
    url: String,
    target: Option<PermalinkTarget>,
    stats: &mut ImportStats,
) -> Result<(), ImportError> {
    stats.scanned += 1;
    let Some(target) = target else {
        tracing::debug!("No imported entity for {}", url);
        stats.skipped += 1;
        return Ok(());
    };
    if ctx.target().permalink_exists(&url).await? {
        stats.skipped += 1;
        return Ok(());
    }
    match ctx.target().create_permalink(&url, target).await {
        Ok(()) => stats.created += 1,
        Err(e) => {
            tracing::warn!("Failed to create permalink {}: {}", url, e);
            stats.failed += 1;
        }
    }
    Ok(())
}

#[async_trait]
impl MigrationStage for RedirectStage {
    fn name(&self) -> &'static str {
        "redirects"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Redirect
    }

    async fn total(&self, ctx: &ImportContext) -> Result<u64, ImportError> {
        let filter = ctx.filter;
        let forums = ctx.source.count(EntityKind::Forum, &filter).await?;
        let topics = ctx.source.count(EntityKind::Topic, &filter).await?;
        let posts = ctx.source.count(EntityKind::Post, &filter).await?;
        Ok(forums + topics + posts)
    }

    async fn process_page(
        &self,
        ctx: &mut ImportContext,
        offset: u64,
    ) -> Result<PageResult, ImportError> {
        let base = ctx.rules.redirect_base();
        let filter = ctx.filter;
        let mut stats = ImportStats::default();
        let mut records = 0;

        if offset == 0 {
            let forums = ctx.source.forums().await?;
            records += forums.len();
            for forum in forums {
                let target = ctx
                    .ids
                    .resolve(EntityKind::Forum, forum.id)
                    .await?
                    .map(PermalinkTarget::Category);
                let url = format!("{}viewforum.php?id={}", base, forum.id);
                create_redirect(ctx, url, target, &mut stats).await?;
            }
        }

        let topics = ctx.source.topics(offset, ctx.batch_size).await?;
        records += topics.len();
        for topic in &topics {
            let target = match ctx.ids.resolve(EntityKind::Topic, topic.first_post_id).await? {
                Some(post_id) => ctx
                    .ids
                    .resolve_post_location(post_id)
                    .await?
                    .map(|l| PermalinkTarget::Topic(l.topic_id)),
                None => None,
            };
            let url = format!("{}viewtopic.php?id={}", base, topic.id);
            create_redirect(ctx, url, target, &mut stats).await?;
        }

        let post_ids = ctx.source.post_ids(offset, ctx.batch_size, &filter).await?;
        records += post_ids.len();
        for &post_id in &post_ids {
            let target = ctx
                .ids
                .resolve(EntityKind::Post, post_id)
                .await?
                .map(PermalinkTarget::Post);
            let url = format!("{}viewtopic.php?pid={}", base, post_id);
            create_redirect(ctx, url, target, &mut stats).await?;
        }

        let has_more = topics.len() as u64 >= ctx.batch_size
            || post_ids.len() as u64 >= ctx.batch_size;
        Ok(PageResult {
            records,
            stats,
            has_more,
        })
    }
}
