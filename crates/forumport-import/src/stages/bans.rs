//! Legacy bans become long suspensions.

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};

use forumport::models::{SourceBan, StaffAction};
use forumport::{EntityKind, TargetError};

use crate::{ImportContext, ImportError, ImportStats, MigrationStage, PageResult};

/// Reason recorded in the staff action log.
pub const BAN_REASON: &str = "banned during initial import";

const SUSPENSION_YEARS: u32 = 200;

fn suspended_till(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_months(Months::new(SUSPENSION_YEARS * 12))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

async fn log_suspension(ctx: &ImportContext, user_id: i64) -> Result<(), TargetError> {
    ctx.target()
        .log_staff_action(&StaffAction::system_suspension(user_id, BAN_REASON))
        .await
}

/// Apply one ban. Lookup errors abort the run; everything else is counted.
async fn apply_ban(
    ctx: &ImportContext,
    ban: &SourceBan,
    stats: &mut ImportStats,
) -> Result<(), ImportError> {
    let Some(email) = ban.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
        tracing::warn!("Ban {} has no email", ban.id);
        stats.failed += 1;
        return Ok(());
    };

    let Some(user) = ctx.target().find_user_by_email(email).await? else {
        tracing::warn!("Not found: {}", email);
        stats.failed += 1;
        return Ok(());
    };

    let now = Utc::now();
    let saved = if user.suspended_till.is_some_and(|till| till > now) {
        // Suspended by an earlier run, possibly one that failed to log it.
        if ctx
            .target()
            .staff_action_logged(user.id, StaffAction::SUSPEND_USER)
            .await?
        {
            stats.skipped += 1;
            return Ok(());
        }
        log_suspension(ctx, user.id).await
    } else {
        match ctx
            .target()
            .suspend_user(user.id, now, suspended_till(now))
            .await
        {
            Ok(()) => log_suspension(ctx, user.id).await,
            Err(e) => Err(e),
        }
    };

    match saved {
        Ok(()) => stats.created += 1,
        Err(e) => {
            tracing::warn!("Failed to suspend user {}. {}", user.username, e);
            stats.failed += 1;
        }
    }
    Ok(())
}

/// Suspends target users matched to legacy bans by email.
pub struct BanStage;

#[async_trait]
impl MigrationStage for BanStage {
    fn name(&self) -> &'static str {
        "bans"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Ban
    }

    async fn total(&self, ctx: &ImportContext) -> Result<u64, ImportError> {
        Ok(ctx.source.count(EntityKind::Ban, &ctx.filter).await?)
    }

    async fn process_page(
        &self,
        ctx: &mut ImportContext,
        offset: u64,
    ) -> Result<PageResult, ImportError> {
        let bans = ctx.source.bans(offset, ctx.batch_size).await?;
        let mut stats = ImportStats {
            scanned: bans.len(),
            ..ImportStats::default()
        };

        for ban in &bans {
            apply_ban(ctx, ban, &mut stats).await?;
        }

        Ok(PageResult::new(bans.len(), ctx.batch_size, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use forumport::models::{SourceUser, SYSTEM_USER_ID};
    use forumport::source::MemorySource;
    use forumport::target::MemoryTarget;
    use forumport::MigrationRules;

    use crate::stages::UserStage;

    fn user(id: i64, email: &str) -> SourceUser {
        SourceUser {
            id,
            username: format!("user{}", id),
            name: None,
            email: Some(email.to_string()),
            website: None,
            location: None,
            registered: None,
            registration_ip: None,
            last_visit: None,
            group_id: 5,
        }
    }

    fn ban(id: i64, email: Option<&str>) -> SourceBan {
        SourceBan {
            id,
            username: None,
            email: email.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_bans() {
        let source = MemorySource::new()
            .with_users(vec![
                user(2, "troll@example.org"),
                user(3, "spam@example.org"),
                user(4, "nice@example.org"),
            ])
            .with_bans(vec![
                ban(1, Some("troll@example.org")),
                ban(2, Some("ghost@example.org")),
                ban(3, None),
                ban(4, Some("spam@example.org")),
            ]);
        let target = Arc::new(MemoryTarget::new());
        target.fail_suspension(3).await;
        let mut ctx = ImportContext::new(
            Arc::new(source),
            target.clone(),
            MigrationRules::default(),
        );

        UserStage.process_page(&mut ctx, 0).await.unwrap();
        let page = BanStage.process_page(&mut ctx, 0).await.unwrap();
        assert_eq!(page.stats.created, 1);
        assert_eq!(page.stats.failed, 3);

        let troll = target.user(2).await.unwrap();
        let till = troll.suspended_till.unwrap();
        assert!(till > Utc::now() + chrono::Duration::days(365 * 199));
        assert!(target.user(4).await.unwrap().suspended_till.is_none());

        let actions = target.staff_actions().await;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].acting_user_id, SYSTEM_USER_ID);
        assert_eq!(actions[0].target_user_id, 2);
        assert_eq!(actions[0].details, BAN_REASON);

        // Already suspended users are left alone on a re-run.
        let again = BanStage.process_page(&mut ctx, 0).await.unwrap();
        assert_eq!(again.stats.created, 0);
        assert_eq!(again.stats.skipped, 1);
        assert_eq!(target.staff_actions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_staff_log_is_retried() {
        let source = MemorySource::new()
            .with_users(vec![user(2, "troll@example.org")])
            .with_bans(vec![ban(1, Some("troll@example.org"))]);
        let target = Arc::new(MemoryTarget::new());
        target.fail_staff_log_once(2).await;
        let mut ctx = ImportContext::new(
            Arc::new(source),
            target.clone(),
            MigrationRules::default(),
        );

        UserStage.process_page(&mut ctx, 0).await.unwrap();
        let page = BanStage.process_page(&mut ctx, 0).await.unwrap();
        assert_eq!(page.stats.failed, 1);
        assert!(target.user(2).await.unwrap().suspended_till.is_some());
        assert!(target.staff_actions().await.is_empty());

        let again = BanStage.process_page(&mut ctx, 0).await.unwrap();
        assert_eq!(again.stats.created, 1);
        let actions = target.staff_actions().await;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].target_user_id, 2);
        assert_eq!(actions[0].action, StaffAction::SUSPEND_USER);

        let third = BanStage.process_page(&mut ctx, 0).await.unwrap();
        assert_eq!(third.stats.skipped, 1);
        assert_eq!(target.staff_actions().await.len(), 1);
    }
}
