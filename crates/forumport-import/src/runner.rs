//! Import runner that drives the stages in dependency order.

use crate::stages::{
    BanStage, CategoryStage, GroupStage, PostStage, RedirectStage, UserStage,
};
use crate::{ImportContext, ImportError, ImportEvent, ImportStats, MigrationStage};

/// Per-stage statistics of a run.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub stages: Vec<(&'static str, ImportStats)>,
}

impl ImportReport {
    pub fn total(&self) -> ImportStats {
        let mut total = ImportStats::default();
        for (_, stats) in &self.stages {
            total.merge(stats);
        }
        total
    }

    pub fn stage(&self, name: &str) -> Option<&ImportStats> {
        self.stages
            .iter()
            .find(|(stage, _)| *stage == name)
            .map(|(_, stats)| stats)
    }
}

/// Runs stages strictly in sequence, each page after the previous one.
pub struct ImportRunner {
    stages: Vec<Box<dyn MigrationStage>>,
}

impl Default for ImportRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportRunner {
    /// Stage names in execution order.
    pub const STAGES: [&'static str; 6] =
        ["groups", "users", "categories", "posts", "bans", "redirects"];

    /// Runner with every stage: groups, users, categories, posts, bans, redirects.
    pub fn new() -> Self {
        Self {
            stages: vec![
                Box::new(GroupStage),
                Box::new(UserStage),
                Box::new(CategoryStage),
                Box::new(PostStage),
                Box::new(BanStage),
                Box::new(RedirectStage),
            ],
        }
    }

    /// Keep only the named stages. Execution order stays fixed whatever
    /// order the names come in.
    pub fn only<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, ImportError> {
        if names.is_empty() {
            return Ok(self);
        }
        for name in names {
            let name = name.as_ref();
            if !Self::STAGES.contains(&name) {
                return Err(ImportError::UnknownStage(name.to_string()));
            }
        }
        self.stages
            .retain(|stage| names.iter().any(|n| n.as_ref() == stage.name()));
        Ok(self)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, ctx: &mut ImportContext) -> Result<ImportReport, ImportError> {
        let mut report = ImportReport::default();
        for stage in &self.stages {
            let stats = self.run_stage(stage.as_ref(), ctx).await?;
            report.stages.push((stage.name(), stats));
        }
        Ok(report)
    }

    async fn run_stage(
        &self,
        stage: &dyn MigrationStage,
        ctx: &mut ImportContext,
    ) -> Result<ImportStats, ImportError> {
        let name = stage.name();
        stage.prepare(ctx).await?;
        let total = stage.total(ctx).await?;
        tracing::info!("Importing {} ({} records)", name, total);
        ctx.emit(ImportEvent::StageStarted { stage: name, total })
            .await;

        let mut stats = ImportStats::default();
        let mut offset = 0u64;

        loop {
            if let Some(ids) = stage.page_ids(ctx, offset).await? {
                if ids.is_empty() {
                    break;
                }
                if ctx.ids.exists_all(stage.kind(), &ids).await? {
                    tracing::debug!("{}: page at {} already imported", name, offset);
                    stats.scanned += ids.len();
                    stats.skipped += ids.len();
                    ctx.emit(ImportEvent::PageSkipped {
                        stage: name,
                        offset,
                        records: ids.len(),
                    })
                    .await;

                    if (ids.len() as u64) < ctx.batch_size {
                        break;
                    }
                    offset += ctx.batch_size;
                    continue;
                }
            }

            let page = stage.process_page(ctx, offset).await?;
            stats.merge(&page.stats);
            ctx.emit(ImportEvent::PageDone {
                stage: name,
                offset,
                records: page.records,
                stats: page.stats,
            })
            .await;

            if !page.has_more {
                break;
            }
            offset += ctx.batch_size;
        }

        let tail = stage.finish(ctx).await?;
        stats.merge(&tail);

        tracing::info!(
            "{}: {} created, {} skipped, {} failed, {} orphaned",
            name,
            stats.created,
            stats.skipped,
            stats.failed,
            stats.orphaned
        );
        ctx.emit(ImportEvent::StageFinished { stage: name, stats })
            .await;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_keeps_fixed_order() {
        let runner = ImportRunner::new().only(&["posts", "users"]).unwrap();
        assert_eq!(runner.stage_names(), vec!["users", "posts"]);
    }

    #[test]
    fn test_only_empty_keeps_all() {
        let runner = ImportRunner::new().only::<&str>(&[]).unwrap();
        assert_eq!(runner.stage_names(), ImportRunner::STAGES.to_vec());
    }

    #[test]
    fn test_only_rejects_unknown_stage() {
        assert!(matches!(
            ImportRunner::new().only(&["topics"]),
            Err(ImportError::UnknownStage(name)) if name == "topics"
        ));
    }
}
