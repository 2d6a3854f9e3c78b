//! Users, with group membership applied once each user exists.

use async_trait::async_trait;

use forumport::models::{SourceUser, TargetDescriptor, UserDescriptor};
use forumport::{EntityKind, MigrationRules};

use super::count_outcome;
use crate::deferred::run_pending;
use crate::{DeferredAction, ImportContext, ImportError, ImportStats, MigrationStage, PageResult};

const SEPARATOR: char = '_';

/// Fit a legacy login to the target's username rules.
///
/// Runs of characters other than ASCII letters and digits collapse to a
/// single `_`, the result is cut to `max_length` and never ends in `_`.
/// Logins with nothing usable left become `user{source_id}`.
pub fn normalize_username(raw: &str, max_length: usize, source_id: i64) -> String {
    let mut name = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c);
        } else if !name.ends_with(SEPARATOR) {
            name.push(SEPARATOR);
        }
    }

    name.truncate(max_length);
    let name = name.trim_end_matches(SEPARATOR);
    if name.is_empty() {
        let mut fallback = format!("user{}", source_id);
        fallback.truncate(max_length);
        return fallback;
    }
    name.to_string()
}

fn descriptor(user: &SourceUser, rules: &MigrationRules) -> UserDescriptor {
    UserDescriptor {
        forced_id: user.id,
        username: normalize_username(&user.username, rules.username_max_length, user.id),
        username_max_length: rules.username_max_length,
        name: user.name.clone().filter(|n| !n.trim().is_empty()),
        email: user.email.clone().filter(|e| !e.trim().is_empty()),
        website: user.website.clone().filter(|w| !w.trim().is_empty()),
        location: user.location.clone().filter(|l| !l.trim().is_empty()),
        registration_ip: user.registration_ip.clone(),
        created_at: user.registered,
        last_seen_at: user.last_visit,
        admin: rules.is_admin(user.group_id),
        moderator: rules.is_moderator(user.group_id),
    }
}

pub struct UserStage;

#[async_trait]
impl MigrationStage for UserStage {
    fn name(&self) -> &'static str {
        "users"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::User
    }

    async fn total(&self, ctx: &ImportContext) -> Result<u64, ImportError> {
        Ok(ctx.source.count(EntityKind::User, &ctx.filter).await?)
    }

    async fn page_ids(
        &self,
        ctx: &ImportContext,
        offset: u64,
    ) -> Result<Option<Vec<i64>>, ImportError> {
        let users = ctx.source.users(offset, ctx.batch_size).await?;
        Ok(Some(users.iter().map(|u| u.id).collect()))
    }

    async fn process_page(
        &self,
        ctx: &mut ImportContext,
        offset: u64,
    ) -> Result<PageResult, ImportError> {
        let users = ctx.source.users(offset, ctx.batch_size).await?;
        let mut stats = ImportStats {
            scanned: users.len(),
            ..ImportStats::default()
        };

        let mut pending = Vec::new();
        for user in &users {
            if ctx.ids.resolve(EntityKind::User, user.id).await?.is_some() {
                stats.skipped += 1;
                continue;
            }

            let mapped = descriptor(user, &ctx.rules);
            ctx.deferred.push(
                EntityKind::User,
                user.id,
                DeferredAction::JoinGroups {
                    legacy_group_id: user.group_id,
                    staff: mapped.admin || mapped.moderator,
                },
            );
            pending.push(mapped);
        }

        if !pending.is_empty() {
            let ids: Vec<i64> = pending.iter().map(|u| u.forced_id).collect();
            let descriptors = pending.into_iter().map(TargetDescriptor::User).collect();
            let outcomes = ctx.target().batch_create(descriptors).await?;

            for (source_id, outcome) in ids.into_iter().zip(&outcomes) {
                match count_outcome(EntityKind::User, source_id, outcome, &mut stats) {
                    Some(target_id) => {
                        // Mapped only after the joins, so a failed join is retried.
                        run_pending(ctx, EntityKind::User, source_id, target_id).await?;
                        ctx.ids.record(EntityKind::User, source_id, target_id).await?;
                    }
                    None => {
                        ctx.deferred.take(EntityKind::User, source_id);
                    }
                }
            }
        }

        Ok(PageResult::new(users.len(), ctx.batch_size, stats))
    }
}
