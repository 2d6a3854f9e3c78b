//! Read-only access to the legacy PunBB database.

mod memory;
#[cfg(feature = "postgres")]
mod punbb;

pub use memory::MemorySource;
#[cfg(feature = "postgres")]
pub use punbb::PunbbSource;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    EntityKind, SourceBan, SourceCategory, SourceForum, SourcePost, SourceTopic, SourceUser,
};

/// Errors from the source store. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source query failed: {0}")]
    Query(String),

    #[error("cannot decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    #[error("source store has no {0} table")]
    Unsupported(EntityKind),
}

/// Scope of a post import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Only posts of this topic.
    pub topic_id: Option<i64>,
    /// Only topics whose first post id is at least this.
    pub min_first_post_id: Option<i64>,
}

impl PostFilter {
    pub fn is_empty(&self) -> bool {
        self.topic_id.is_none() && self.min_first_post_id.is_none()
    }

    pub fn matches(&self, post: &SourcePost) -> bool {
        self.topic_id.map_or(true, |t| post.topic_id == t)
            && self
                .min_first_post_id
                .map_or(true, |m| post.first_post_id >= m)
    }
}

/// Paginated, order-stable queries over the legacy store.
///
/// Users, topics and bans are ordered by id. Posts are ordered by
/// `(posted, id)` so that quoted posts are loaded before their quoters.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Number of records of a kind. `filter` applies to posts only.
    async fn count(&self, kind: EntityKind, filter: &PostFilter) -> Result<u64, SourceError>;

    async fn users(&self, offset: u64, limit: u64) -> Result<Vec<SourceUser>, SourceError>;

    async fn categories(&self) -> Result<Vec<SourceCategory>, SourceError>;

    async fn forums(&self) -> Result<Vec<SourceForum>, SourceError>;

    /// Ids of one page of posts, in import order.
    async fn post_ids(
        &self,
        offset: u64,
        limit: u64,
        filter: &PostFilter,
    ) -> Result<Vec<i64>, SourceError>;

    async fn posts(
        &self,
        offset: u64,
        limit: u64,
        filter: &PostFilter,
    ) -> Result<Vec<SourcePost>, SourceError>;

    async fn topics(&self, offset: u64, limit: u64) -> Result<Vec<SourceTopic>, SourceError>;

    async fn bans(&self, offset: u64, limit: u64) -> Result<Vec<SourceBan>, SourceError>;

    /// Raw message of a single post.
    async fn post_message(&self, id: i64) -> Result<Option<String>, SourceError>;

    /// Highest post id on the board, ignoring any filter.
    async fn max_post_id(&self) -> Result<Option<i64>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(id: i64, topic_id: i64, first_post_id: i64) -> SourcePost {
        SourcePost {
            id,
            poster: "alice".to_string(),
            poster_id: 2,
            topic_id,
            forum_id: 1,
            subject: "Hello".to_string(),
            first_post_id,
            message: String::new(),
            posted: Utc::now(),
            locale: None,
        }
    }

    #[test]
    fn test_post_filter() {
        let all = PostFilter::default();
        assert!(all.is_empty());
        assert!(all.matches(&post(1, 1, 1)));

        let topic = PostFilter {
            topic_id: Some(3),
            ..Default::default()
        };
        assert!(topic.matches(&post(9, 3, 8)));
        assert!(!topic.matches(&post(9, 4, 8)));

        let min = PostFilter {
            min_first_post_id: Some(100),
            ..Default::default()
        };
        assert!(min.matches(&post(150, 2, 100)));
        assert!(!min.matches(&post(150, 2, 99)));
    }
}
