//! Diesel-backed target store over SQLite.
//!
//! Uses diesel-async's `SyncConnectionWrapper` to keep an async interface
//! over the synchronous SQLite driver.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::{AsyncConnection, RunQueryDsl, SimpleAsyncConnection};

use super::pool::{SqliteConn, SqlitePool};
use super::records::{
    NewCategory, NewGroup, NewImportId, NewPermalink, NewPost, NewStaffAction, NewTopic, NewUser,
    PostLocationRecord, UserRecord,
};
use super::util::{format_datetime, parse_datetime_opt, suffixed_username};
use super::{TargetError, TargetStore};
use crate::models::{
    CategoryDescriptor, CreateOutcome, EntityKind, GroupDescriptor, PermalinkTarget,
    PostDescriptor, PostLocation, StaffAction, TargetDescriptor, TargetUser, TopicPlacement,
    UserDescriptor,
};
use crate::schema::{
    categories, category_groups, group_users, groups, import_ids, permalinks, posts,
    staff_action_logs, topics, users,
};
use crate::with_conn;

/// Full access, as granted to the restricted-category group.
const PERMISSION_FULL: i32 = 1;

/// SQLite has a limit on bound parameters per statement.
const ID_CHUNK: usize = 500;

const SQLITE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        username TEXT NOT NULL UNIQUE COLLATE NOCASE,
        name TEXT,
        email TEXT COLLATE NOCASE,
        website TEXT,
        location TEXT,
        registration_ip TEXT,
        admin INTEGER NOT NULL DEFAULT 0,
        moderator INTEGER NOT NULL DEFAULT 0,
        created_at TEXT,
        last_seen_at TEXT,
        suspended_at TEXT,
        suspended_till TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

    CREATE TABLE IF NOT EXISTS groups (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS group_users (
        group_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        PRIMARY KEY (group_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        position INTEGER NOT NULL DEFAULT 0,
        parent_category_id INTEGER REFERENCES categories(id),
        read_restricted INTEGER NOT NULL DEFAULT 0,
        suppress_from_homepage INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS category_groups (
        category_id INTEGER NOT NULL,
        group_id INTEGER NOT NULL,
        permission_type INTEGER NOT NULL,
        PRIMARY KEY (category_id, group_id)
    );

    CREATE TABLE IF NOT EXISTS topics (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        category_id INTEGER NOT NULL REFERENCES categories(id),
        user_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        highest_post_number INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY,
        topic_id INTEGER NOT NULL REFERENCES topics(id),
        post_number INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        raw TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (topic_id, post_number)
    );

    CREATE TABLE IF NOT EXISTS permalinks (
        url TEXT PRIMARY KEY,
        category_id INTEGER,
        topic_id INTEGER,
        post_id INTEGER,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS staff_action_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        acting_user_id INTEGER NOT NULL,
        target_user_id INTEGER NOT NULL,
        action TEXT NOT NULL,
        details TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS import_ids (
        kind TEXT NOT NULL,
        source_id INTEGER NOT NULL,
        target_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (kind, source_id)
    );

    INSERT OR IGNORE INTO users (id, username, admin, moderator)
        VALUES (-1, 'system', 1, 1);
"#;

fn flag(value: bool) -> i32 {
    i32::from(value)
}

/// Diesel-based [`TargetStore`].
#[derive(Clone, Debug)]
pub struct DieselTarget {
    pool: SqlitePool,
}

impl DieselTarget {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a target database from a `sqlite:` URL or plain path.
    pub fn from_url(database_url: &str) -> Self {
        Self::new(SqlitePool::new(database_url))
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(SqlitePool::from_path(path))
    }

    /// Create the target tables if they don't exist.
    pub async fn init_schema(&self) -> Result<(), TargetError> {
        with_conn!(self.pool, conn, {
            conn.batch_execute(SQLITE_SCHEMA).await?;
            Ok(())
        })
    }

    async fn create_group(
        conn: &mut SqliteConn,
        group: &GroupDescriptor,
    ) -> Result<CreateOutcome, DieselError> {
        let existing: Option<i64> = groups::table
            .filter(groups::name.eq(&group.name))
            .select(groups::id)
            .first(conn)
            .await
            .optional()?;
        if let Some(id) = existing {
            return Ok(CreateOutcome::Existing { target_id: id });
        }

        let max: Option<i64> = groups::table
            .select(diesel::dsl::max(groups::id))
            .first(conn)
            .await?;
        let id = max.unwrap_or(0) + 1;

        diesel::insert_into(groups::table)
            .values(NewGroup {
                id,
                name: &group.name,
            })
            .execute(conn)
            .await?;
        Ok(CreateOutcome::Created { target_id: id })
    }

    async fn create_user(
        conn: &mut SqliteConn,
        user: &UserDescriptor,
    ) -> Result<CreateOutcome, DieselError> {
        let existing: Option<i64> = users::table
            .find(user.forced_id)
            .select(users::id)
            .first(conn)
            .await
            .optional()?;
        if existing.is_some() {
            return Ok(CreateOutcome::Existing {
                target_id: user.forced_id,
            });
        }

        let mut username = user.username.clone();
        let mut attempt = 1;
        loop {
            let taken: i64 = users::table
                .filter(users::username.eq(&username))
                .count()
                .get_result(conn)
                .await?;
            if taken == 0 {
                break;
            }
            attempt += 1;
            username = suffixed_username(&user.username, attempt, user.username_max_length);
        }

        let created_at = user.created_at.map(format_datetime);
        let last_seen_at = user.last_seen_at.map(format_datetime);

        diesel::insert_into(users::table)
            .values(NewUser {
                id: user.forced_id,
                username: &username,
                name: user.name.as_deref(),
                email: user.email.as_deref(),
                website: user.website.as_deref(),
                location: user.location.as_deref(),
                registration_ip: user.registration_ip.as_deref(),
                admin: flag(user.admin),
                moderator: flag(user.moderator),
                created_at: created_at.as_deref(),
                last_seen_at: last_seen_at.as_deref(),
            })
            .execute(conn)
            .await?;
        Ok(CreateOutcome::Created {
            target_id: user.forced_id,
        })
    }

    async fn create_category(
        conn: &mut SqliteConn,
        category: &CategoryDescriptor,
    ) -> Result<CreateOutcome, DieselError> {
        if let Some(parent) = category.parent_id {
            let found: Option<i64> = categories::table
                .find(parent)
                .select(categories::id)
                .first(conn)
                .await
                .optional()?;
            if found.is_none() {
                return Ok(CreateOutcome::Failed {
                    reason: format!("parent category {} does not exist", parent),
                });
            }
        }

        let same_name: Vec<(i64, Option<i64>)> = categories::table
            .filter(categories::name.eq(&category.name))
            .select((categories::id, categories::parent_category_id))
            .load(conn)
            .await?;
        if let Some((id, _)) = same_name
            .into_iter()
            .find(|(_, parent)| *parent == category.parent_id)
        {
            return Ok(CreateOutcome::Existing { target_id: id });
        }

        let max: Option<i64> = categories::table
            .select(diesel::dsl::max(categories::id))
            .first(conn)
            .await?;
        let id = max.unwrap_or(0) + 1;

        diesel::insert_into(categories::table)
            .values(NewCategory {
                id,
                name: &category.name,
                description: category.description.as_deref(),
                position: category.position,
                parent_category_id: category.parent_id,
                read_restricted: flag(category.read_restricted),
                suppress_from_homepage: flag(category.suppress_from_homepage),
            })
            .execute(conn)
            .await?;
        Ok(CreateOutcome::Created { target_id: id })
    }

    /// Create a post and, for a new topic, its topic row. The topic update
    /// and the post insert commit together.
    async fn create_post(
        conn: &mut SqliteConn,
        post: &PostDescriptor,
    ) -> Result<CreateOutcome, DieselError> {
        conn.transaction(|conn| Box::pin(async move { Self::insert_post(conn, post).await }))
            .await
    }

    async fn insert_post(
        conn: &mut SqliteConn,
        post: &PostDescriptor,
    ) -> Result<CreateOutcome, DieselError> {
        let existing: Option<i64> = posts::table
            .find(post.forced_id)
            .select(posts::id)
            .first(conn)
            .await
            .optional()?;
        if existing.is_some() {
            return Ok(CreateOutcome::Existing {
                target_id: post.forced_id,
            });
        }

        let author: Option<i64> = users::table
            .find(post.user_id)
            .select(users::id)
            .first(conn)
            .await
            .optional()?;
        if author.is_none() {
            return Ok(CreateOutcome::Failed {
                reason: format!("user {} does not exist", post.user_id),
            });
        }

        let created_at = format_datetime(post.created_at);

        let (topic_id, post_number) = match &post.placement {
            TopicPlacement::New { title, category_id } => {
                let category: Option<i64> = categories::table
                    .find(*category_id)
                    .select(categories::id)
                    .first(conn)
                    .await
                    .optional()?;
                if category.is_none() {
                    return Ok(CreateOutcome::Failed {
                        reason: format!("category {} does not exist", category_id),
                    });
                }

                let max: Option<i64> = topics::table
                    .select(diesel::dsl::max(topics::id))
                    .first(conn)
                    .await?;
                let topic_id = max.unwrap_or(0) + 1;

                diesel::insert_into(topics::table)
                    .values(NewTopic {
                        id: topic_id,
                        title,
                        category_id: *category_id,
                        user_id: post.user_id,
                        created_at: &created_at,
                        highest_post_number: 1,
                    })
                    .execute(conn)
                    .await?;
                (topic_id, 1)
            }
            TopicPlacement::Reply { topic_id } => {
                let highest: Option<i32> = topics::table
                    .find(*topic_id)
                    .select(topics::highest_post_number)
                    .first(conn)
                    .await
                    .optional()?;
                let Some(highest) = highest else {
                    return Ok(CreateOutcome::Failed {
                        reason: format!("topic {} does not exist", topic_id),
                    });
                };

                let next = highest + 1;
                diesel::update(topics::table.find(*topic_id))
                    .set(topics::highest_post_number.eq(next))
                    .execute(conn)
                    .await?;
                (*topic_id, next)
            }
        };

        diesel::insert_into(posts::table)
            .values(NewPost {
                id: post.forced_id,
                topic_id,
                post_number,
                user_id: post.user_id,
                raw: &post.raw,
                created_at: &created_at,
            })
            .execute(conn)
            .await?;
        Ok(CreateOutcome::Created {
            target_id: post.forced_id,
        })
    }
}

#[async_trait]
impl TargetStore for DieselTarget {
    async fn batch_create(
        &self,
        descriptors: Vec<TargetDescriptor>,
    ) -> Result<Vec<CreateOutcome>, TargetError> {
        with_conn!(self.pool, conn, {
            let mut outcomes = Vec::with_capacity(descriptors.len());
            for descriptor in &descriptors {
                let result = match descriptor {
                    TargetDescriptor::Group(g) => Self::create_group(&mut conn, g).await,
                    TargetDescriptor::User(u) => Self::create_user(&mut conn, u).await,
                    TargetDescriptor::Category(c) => Self::create_category(&mut conn, c).await,
                    TargetDescriptor::Post(p) => Self::create_post(&mut conn, p).await,
                };
                let outcome = match result {
                    Ok(outcome) => outcome,
                    // Constraint violations belong to the record, not the run.
                    Err(DieselError::DatabaseError(_, info)) => CreateOutcome::Failed {
                        reason: info.message().to_string(),
                    },
                    Err(e) => return Err(e.into()),
                };
                outcomes.push(outcome);
            }
            Ok(outcomes)
        })
    }

    async fn lookup_import_id(
        &self,
        kind: EntityKind,
        source_id: i64,
    ) -> Result<Option<i64>, TargetError> {
        with_conn!(self.pool, conn, {
            let target_id = import_ids::table
                .filter(import_ids::kind.eq(kind.as_str()))
                .filter(import_ids::source_id.eq(source_id))
                .select(import_ids::target_id)
                .first::<i64>(&mut conn)
                .await
                .optional()?;
            Ok(target_id)
        })
    }

    async fn record_import_id(
        &self,
        kind: EntityKind,
        source_id: i64,
        target_id: i64,
    ) -> Result<(), TargetError> {
        let created_at = format_datetime(Utc::now());
        with_conn!(self.pool, conn, {
            diesel::insert_into(import_ids::table)
                .values(NewImportId {
                    kind: kind.as_str(),
                    source_id,
                    target_id,
                    created_at: &created_at,
                })
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    async fn exists(&self, kind: EntityKind, source_ids: &[i64]) -> Result<bool, TargetError> {
        let unique: Vec<i64> = source_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        with_conn!(self.pool, conn, {
            for chunk in unique.chunks(ID_CHUNK) {
                let found: i64 = import_ids::table
                    .filter(import_ids::kind.eq(kind.as_str()))
                    .filter(import_ids::source_id.eq_any(chunk.to_vec()))
                    .count()
                    .get_result(&mut conn)
                    .await?;
                if found as usize != chunk.len() {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }

    async fn count_imported(&self, kind: EntityKind) -> Result<u64, TargetError> {
        with_conn!(self.pool, conn, {
            let count: i64 = import_ids::table
                .filter(import_ids::kind.eq(kind.as_str()))
                .count()
                .get_result(&mut conn)
                .await?;
            Ok(count as u64)
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<TargetUser>, TargetError> {
        with_conn!(self.pool, conn, {
            let record = users::table
                .filter(users::email.eq(email))
                .select(UserRecord::as_select())
                .first(&mut conn)
                .await
                .optional()?;
            Ok(record.map(|r| TargetUser {
                id: r.id,
                username: r.username,
                email: r.email,
                suspended_till: parse_datetime_opt(r.suspended_till),
            }))
        })
    }

    async fn suspend_user(
        &self,
        user_id: i64,
        suspended_at: DateTime<Utc>,
        suspended_till: DateTime<Utc>,
    ) -> Result<(), TargetError> {
        let at = format_datetime(suspended_at);
        let till = format_datetime(suspended_till);
        let rows = with_conn!(self.pool, conn, {
            diesel::update(users::table.find(user_id))
                .set((
                    users::suspended_at.eq(Some(at.as_str())),
                    users::suspended_till.eq(Some(till.as_str())),
                ))
                .execute(&mut conn)
                .await?
        });
        if rows == 0 {
            return Err(TargetError::Unavailable(format!(
                "user {} does not exist",
                user_id
            )));
        }
        Ok(())
    }

    async fn log_staff_action(&self, action: &StaffAction) -> Result<(), TargetError> {
        let created_at = format_datetime(action.created_at);
        with_conn!(self.pool, conn, {
            diesel::insert_into(staff_action_logs::table)
                .values(NewStaffAction {
                    acting_user_id: action.acting_user_id,
                    target_user_id: action.target_user_id,
                    action: &action.action,
                    details: &action.details,
                    created_at: &created_at,
                })
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    async fn staff_action_logged(
        &self,
        target_user_id: i64,
        action: &str,
    ) -> Result<bool, TargetError> {
        with_conn!(self.pool, conn, {
            let count: i64 = staff_action_logs::table
                .filter(staff_action_logs::target_user_id.eq(target_user_id))
                .filter(staff_action_logs::action.eq(action))
                .count()
                .get_result(&mut conn)
                .await?;
            Ok(count > 0)
        })
    }

    async fn add_group_member(&self, group_id: i64, user_id: i64) -> Result<bool, TargetError> {
        with_conn!(self.pool, conn, {
            let rows = diesel::insert_or_ignore_into(group_users::table)
                .values((
                    group_users::group_id.eq(group_id),
                    group_users::user_id.eq(user_id),
                ))
                .execute(&mut conn)
                .await?;
            Ok(rows > 0)
        })
    }

    async fn grant_category_permission(
        &self,
        category_id: i64,
        group_id: i64,
    ) -> Result<(), TargetError> {
        with_conn!(self.pool, conn, {
            diesel::insert_or_ignore_into(category_groups::table)
                .values((
                    category_groups::category_id.eq(category_id),
                    category_groups::group_id.eq(group_id),
                    category_groups::permission_type.eq(PERMISSION_FULL),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    async fn post_location(&self, post_id: i64) -> Result<Option<PostLocation>, TargetError> {
        with_conn!(self.pool, conn, {
            let record = posts::table
                .find(post_id)
                .select(PostLocationRecord::as_select())
                .first(&mut conn)
                .await
                .optional()?;
            Ok(record.map(|r| PostLocation {
                post_id: r.id,
                topic_id: r.topic_id,
                post_number: r.post_number,
            }))
        })
    }

    async fn permalink_exists(&self, url: &str) -> Result<bool, TargetError> {
        with_conn!(self.pool, conn, {
            let count: i64 = permalinks::table
                .filter(permalinks::url.eq(url))
                .count()
                .get_result(&mut conn)
                .await?;
            Ok(count > 0)
        })
    }

    async fn create_permalink(
        &self,
        url: &str,
        target: PermalinkTarget,
    ) -> Result<(), TargetError> {
        let (category_id, topic_id, post_id) = match target {
            PermalinkTarget::Category(id) => (Some(id), None, None),
            PermalinkTarget::Topic(id) => (None, Some(id), None),
            PermalinkTarget::Post(id) => (None, None, Some(id)),
        };
        let created_at = format_datetime(Utc::now());
        with_conn!(self.pool, conn, {
            diesel::insert_into(permalinks::table)
                .values(NewPermalink {
                    url,
                    category_id,
                    topic_id,
                    post_id,
                    created_at: &created_at,
                })
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }
}
