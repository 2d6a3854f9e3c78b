//! PunBB source store over PostgreSQL.
//!
//! Only compiled when the `postgres` feature is enabled.

use std::error::Error;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::types::{FromSql, ToSql};
use tokio_postgres::{Client, NoTls, Row};

use super::{PostFilter, SourceError, SourceStore};
use crate::models::{
    EntityKind, SourceBan, SourceCategory, SourceForum, SourcePost, SourceTopic, SourceUser,
};

/// PunBB reserves user id 1 for the guest account.
const GUEST_ACCOUNT_ID: i64 = 1;

/// Convert a tokio-postgres error, keeping the server's message.
///
/// tokio_postgres::Error's Display impl just shows "db error" for database
/// errors, so dig into the source for the real message.
fn pg_error(e: tokio_postgres::Error) -> SourceError {
    let message = if let Some(db_err) = e.as_db_error() {
        format!(
            "{}: {}{}",
            db_err.severity(),
            db_err.message(),
            db_err
                .detail()
                .map(|d| format!(" DETAIL: {}", d))
                .unwrap_or_default(),
        )
    } else {
        let mut msg = e.to_string();
        let mut source = e.source();
        while let Some(src) = source {
            msg = format!("{}: {}", msg, src);
            source = src.source();
        }
        msg
    };
    SourceError::Query(message)
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize, what: &'static str) -> Result<T, SourceError> {
    row.try_get(idx).map_err(|e| SourceError::Decode {
        what,
        message: e.to_string(),
    })
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.filter(|s| *s > 0)
        .and_then(|s| DateTime::from_timestamp(s, 0))
}

fn is_identifier(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Read-only PunBB database.
pub struct PunbbSource {
    client: Client,
    prefix: String,
    locale_column: Option<String>,
}

impl PunbbSource {
    /// Connect and spawn the connection task.
    ///
    /// `prefix` is the PunBB table prefix (usually `punbb_`). `locale_column`
    /// names an optional column of the forums table holding a locale.
    pub async fn connect(
        url: &str,
        prefix: &str,
        locale_column: Option<&str>,
    ) -> Result<Self, SourceError> {
        if !is_identifier(prefix) {
            return Err(SourceError::Query(format!(
                "invalid table prefix {:?}",
                prefix
            )));
        }
        if let Some(column) = locale_column {
            if column.is_empty() || !is_identifier(column) {
                return Err(SourceError::Query(format!(
                    "invalid locale column {:?}",
                    column
                )));
            }
        }

        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(pg_error)?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PunBB connection error: {}", e);
            }
        });

        Ok(Self {
            client,
            prefix: prefix.to_string(),
            locale_column: locale_column.map(str::to_string),
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn locale_expr(&self) -> String {
        match self.locale_column {
            Some(ref column) => format!("f.{}::text", column),
            None => "NULL::text".to_string(),
        }
    }

    /// WHERE clause for a post filter, with parameters numbered from `first`.
    fn post_conditions<'a>(
        filter: &'a PostFilter,
        first: usize,
    ) -> (String, Vec<&'a (dyn ToSql + Sync)>) {
        let mut clauses = Vec::new();
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(ref topic_id) = filter.topic_id {
            params.push(topic_id);
            clauses.push(format!("t.id = ${}::bigint", first + params.len() - 1));
        }
        if let Some(ref min) = filter.min_first_post_id {
            params.push(min);
            clauses.push(format!(
                "t.first_post_id >= ${}::bigint",
                first + params.len() - 1
            ));
        }
        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        (sql, params)
    }

    async fn count_query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, SourceError> {
        let row = self.client.query_one(sql, params).await.map_err(pg_error)?;
        let count: i64 = get(&row, 0, "count")?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl SourceStore for PunbbSource {
    async fn count(&self, kind: EntityKind, filter: &PostFilter) -> Result<u64, SourceError> {
        match kind {
            EntityKind::User => {
                let sql = format!(
                    "SELECT COUNT(*) FROM {} WHERE id > $1::bigint",
                    self.table("users")
                );
                self.count_query(&sql, &[&GUEST_ACCOUNT_ID]).await
            }
            EntityKind::Category => {
                let sql = format!("SELECT COUNT(*) FROM {}", self.table("categories"));
                self.count_query(&sql, &[]).await
            }
            EntityKind::Forum => {
                let sql = format!("SELECT COUNT(*) FROM {}", self.table("forums"));
                self.count_query(&sql, &[]).await
            }
            EntityKind::Post => {
                let (conditions, params) = Self::post_conditions(filter, 1);
                let sql = format!(
                    "SELECT COUNT(*) FROM {} p JOIN {} t ON p.topic_id = t.id {}",
                    self.table("posts"),
                    self.table("topics"),
                    conditions
                );
                self.count_query(&sql, &params).await
            }
            EntityKind::Topic => {
                let sql = format!("SELECT COUNT(*) FROM {}", self.table("topics"));
                self.count_query(&sql, &[]).await
            }
            EntityKind::Ban => {
                let sql = format!("SELECT COUNT(*) FROM {}", self.table("bans"));
                self.count_query(&sql, &[]).await
            }
            other => Err(SourceError::Unsupported(other)),
        }
    }

    async fn users(&self, offset: u64, limit: u64) -> Result<Vec<SourceUser>, SourceError> {
        let sql = format!(
            "SELECT id::bigint, username, realname, email, url, location,
                    registered::bigint, registration_ip, last_visit::bigint, group_id::bigint
             FROM {}
             WHERE id > $1::bigint
             ORDER BY id ASC
             LIMIT $2 OFFSET $3",
            self.table("users")
        );
        let (limit, offset) = (limit as i64, offset as i64);
        let rows = self
            .client
            .query(&sql, &[&GUEST_ACCOUNT_ID, &limit, &offset])
            .await
            .map_err(pg_error)?;

        rows.iter()
            .map(|row| {
                Ok(SourceUser {
                    id: get(row, 0, "user id")?,
                    username: get(row, 1, "username")?,
                    name: get(row, 2, "realname")?,
                    email: get(row, 3, "email")?,
                    website: get(row, 4, "url")?,
                    location: get(row, 5, "location")?,
                    registered: timestamp(get(row, 6, "registered")?),
                    registration_ip: get(row, 7, "registration_ip")?,
                    last_visit: timestamp(get(row, 8, "last_visit")?),
                    group_id: get(row, 9, "group_id")?,
                })
            })
            .collect()
    }

    async fn categories(&self) -> Result<Vec<SourceCategory>, SourceError> {
        let sql = format!(
            "SELECT id::bigint, cat_name, disp_position::int
             FROM {}
             ORDER BY id ASC",
            self.table("categories")
        );
        let rows = self.client.query(&sql, &[]).await.map_err(pg_error)?;

        rows.iter()
            .map(|row| {
                Ok(SourceCategory {
                    id: get(row, 0, "category id")?,
                    name: get(row, 1, "cat_name")?,
                    position: get(row, 2, "disp_position")?,
                })
            })
            .collect()
    }

    async fn forums(&self) -> Result<Vec<SourceForum>, SourceError> {
        let sql = format!(
            "SELECT f.id::bigint, f.forum_name, f.forum_desc, f.disp_position::int,
                    f.cat_id::bigint, {}
             FROM {} f
             ORDER BY f.id ASC",
            self.locale_expr(),
            self.table("forums")
        );
        let rows = self.client.query(&sql, &[]).await.map_err(pg_error)?;

        rows.iter()
            .map(|row| {
                Ok(SourceForum {
                    id: get(row, 0, "forum id")?,
                    name: get(row, 1, "forum_name")?,
                    description: get(row, 2, "forum_desc")?,
                    position: get(row, 3, "disp_position")?,
                    category_id: get(row, 4, "cat_id")?,
                    locale: get(row, 5, "locale")?,
                })
            })
            .collect()
    }

    async fn post_ids(
        &self,
        offset: u64,
        limit: u64,
        filter: &PostFilter,
    ) -> Result<Vec<i64>, SourceError> {
        let (limit, offset) = (limit as i64, offset as i64);
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&limit, &offset];
        let (conditions, filter_params) = Self::post_conditions(filter, 3);
        params.extend(filter_params);

        let sql = format!(
            "SELECT p.id::bigint
             FROM {} p JOIN {} t ON p.topic_id = t.id
             {}
             ORDER BY p.posted ASC, p.id ASC
             LIMIT $1 OFFSET $2",
            self.table("posts"),
            self.table("topics"),
            conditions
        );
        let rows = self.client.query(&sql, &params).await.map_err(pg_error)?;
        rows.iter().map(|row| get(row, 0, "post id")).collect()
    }

    async fn posts(
        &self,
        offset: u64,
        limit: u64,
        filter: &PostFilter,
    ) -> Result<Vec<SourcePost>, SourceError> {
        let (limit, offset) = (limit as i64, offset as i64);
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&limit, &offset];
        let (conditions, filter_params) = Self::post_conditions(filter, 3);
        params.extend(filter_params);

        let sql = format!(
            "SELECT p.id::bigint, p.poster, COALESCE(p.poster_id, {guest})::bigint,
                    t.id::bigint, t.forum_id::bigint, t.subject, t.first_post_id::bigint,
                    p.message, p.posted::bigint, {locale}
             FROM {posts} p
             JOIN {topics} t ON p.topic_id = t.id
             LEFT JOIN {forums} f ON f.id = t.forum_id
             {conditions}
             ORDER BY p.posted ASC, p.id ASC
             LIMIT $1 OFFSET $2",
            guest = GUEST_ACCOUNT_ID,
            locale = self.locale_expr(),
            posts = self.table("posts"),
            topics = self.table("topics"),
            forums = self.table("forums"),
            conditions = conditions,
        );
        let rows = self.client.query(&sql, &params).await.map_err(pg_error)?;

        rows.iter()
            .map(|row| {
                let posted: i64 = get(row, 8, "posted")?;
                Ok(SourcePost {
                    id: get(row, 0, "post id")?,
                    poster: get(row, 1, "poster")?,
                    poster_id: get(row, 2, "poster_id")?,
                    topic_id: get(row, 3, "topic id")?,
                    forum_id: get(row, 4, "forum_id")?,
                    subject: get(row, 5, "subject")?,
                    first_post_id: get(row, 6, "first_post_id")?,
                    message: get(row, 7, "message")?,
                    posted: DateTime::from_timestamp(posted, 0).ok_or_else(|| {
                        SourceError::Decode {
                            what: "posted",
                            message: format!("timestamp {} out of range", posted),
                        }
                    })?,
                    locale: get(row, 9, "locale")?,
                })
            })
            .collect()
    }

    async fn topics(&self, offset: u64, limit: u64) -> Result<Vec<SourceTopic>, SourceError> {
        let sql = format!(
            "SELECT id::bigint, first_post_id::bigint, forum_id::bigint, subject
             FROM {}
             ORDER BY id ASC
             LIMIT $1 OFFSET $2",
            self.table("topics")
        );
        let (limit, offset) = (limit as i64, offset as i64);
        let rows = self
            .client
            .query(&sql, &[&limit, &offset])
            .await
            .map_err(pg_error)?;

        rows.iter()
            .map(|row| {
                Ok(SourceTopic {
                    id: get(row, 0, "topic id")?,
                    first_post_id: get(row, 1, "first_post_id")?,
                    forum_id: get(row, 2, "forum_id")?,
                    subject: get(row, 3, "subject")?,
                })
            })
            .collect()
    }

    async fn bans(&self, offset: u64, limit: u64) -> Result<Vec<SourceBan>, SourceError> {
        let sql = format!(
            "SELECT id::bigint, username, email
             FROM {}
             ORDER BY id ASC
             LIMIT $1 OFFSET $2",
            self.table("bans")
        );
        let (limit, offset) = (limit as i64, offset as i64);
        let rows = self
            .client
            .query(&sql, &[&limit, &offset])
            .await
            .map_err(pg_error)?;

        rows.iter()
            .map(|row| {
                Ok(SourceBan {
                    id: get(row, 0, "ban id")?,
                    username: get(row, 1, "username")?,
                    email: get(row, 2, "email")?,
                })
            })
            .collect()
    }

    async fn post_message(&self, id: i64) -> Result<Option<String>, SourceError> {
        let sql = format!(
            "SELECT message FROM {} WHERE id = $1::bigint",
            self.table("posts")
        );
        let row = self
            .client
            .query_opt(&sql, &[&id])
            .await
            .map_err(pg_error)?;
        row.map(|r| get(&r, 0, "message")).transpose()
    }

    async fn max_post_id(&self) -> Result<Option<i64>, SourceError> {
        let sql = format!("SELECT MAX(id)::bigint FROM {}", self.table("posts"));
        let row = self.client.query_one(&sql, &[]).await.map_err(pg_error)?;
        get(&row, 0, "max post id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_conditions_numbering() {
        let filter = PostFilter {
            topic_id: Some(4),
            min_first_post_id: Some(10),
        };
        let (sql, params) = PunbbSource::post_conditions(&filter, 3);
        assert_eq!(
            sql,
            "WHERE t.id = $3::bigint AND t.first_post_id >= $4::bigint"
        );
        assert_eq!(params.len(), 2);

        let default_filter = PostFilter::default();
        let (sql, params) = PunbbSource::post_conditions(&default_filter, 1);
        assert!(sql.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn test_timestamp_ignores_unset() {
        assert_eq!(timestamp(None), None);
        assert_eq!(timestamp(Some(0)), None);
        assert!(timestamp(Some(1_100_000_000)).is_some());
    }

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("punbb_"));
        assert!(!is_identifier("punbb; DROP"));
    }
}
