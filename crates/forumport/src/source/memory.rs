//! In-memory source store for tests and fixtures.

use async_trait::async_trait;

use super::{PostFilter, SourceError, SourceStore};
use crate::models::{
    EntityKind, SourceBan, SourceCategory, SourceForum, SourcePost, SourceTopic, SourceUser,
};

/// A legacy board held in memory. Rows are sorted into import order on
/// construction, the same order the database source returns.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    users: Vec<SourceUser>,
    categories: Vec<SourceCategory>,
    forums: Vec<SourceForum>,
    posts: Vec<SourcePost>,
    bans: Vec<SourceBan>,
}

fn page<T: Clone>(items: &[T], offset: u64, limit: u64) -> Vec<T> {
    items
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(mut self, mut users: Vec<SourceUser>) -> Self {
        users.sort_by_key(|u| u.id);
        self.users = users;
        self
    }

    pub fn with_categories(mut self, mut categories: Vec<SourceCategory>) -> Self {
        categories.sort_by_key(|c| c.id);
        self.categories = categories;
        self
    }

    pub fn with_forums(mut self, mut forums: Vec<SourceForum>) -> Self {
        forums.sort_by_key(|f| f.id);
        self.forums = forums;
        self
    }

    /// Posts get their forum's locale attached, as the database join does.
    pub fn with_posts(mut self, mut posts: Vec<SourcePost>) -> Self {
        for post in &mut posts {
            if post.locale.is_none() {
                post.locale = self
                    .forums
                    .iter()
                    .find(|f| f.id == post.forum_id)
                    .and_then(|f| f.locale.clone());
            }
        }
        posts.sort_by_key(|p| (p.posted, p.id));
        self.posts = posts;
        self
    }

    pub fn with_bans(mut self, mut bans: Vec<SourceBan>) -> Self {
        bans.sort_by_key(|b| b.id);
        self.bans = bans;
        self
    }

    fn filtered_posts(&self, filter: &PostFilter) -> Vec<SourcePost> {
        self.posts
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect()
    }

    fn topic_rows(&self) -> Vec<SourceTopic> {
        let mut topics: Vec<SourceTopic> = self
            .posts
            .iter()
            .filter(|p| p.is_first_post())
            .map(|p| SourceTopic {
                id: p.topic_id,
                first_post_id: p.first_post_id,
                forum_id: p.forum_id,
                subject: p.subject.clone(),
            })
            .collect();
        topics.sort_by_key(|t| t.id);
        topics
    }
}

#[async_trait]
impl SourceStore for MemorySource {
    async fn count(&self, kind: EntityKind, filter: &PostFilter) -> Result<u64, SourceError> {
        let count = match kind {
            EntityKind::User => self.users.len(),
            EntityKind::Category => self.categories.len(),
            EntityKind::Forum => self.forums.len(),
            EntityKind::Post => self.filtered_posts(filter).len(),
            EntityKind::Topic => self.topic_rows().len(),
            EntityKind::Ban => self.bans.len(),
            other => return Err(SourceError::Unsupported(other)),
        };
        Ok(count as u64)
    }

    async fn users(&self, offset: u64, limit: u64) -> Result<Vec<SourceUser>, SourceError> {
        Ok(page(&self.users, offset, limit))
    }

    async fn categories(&self) -> Result<Vec<SourceCategory>, SourceError> {
        Ok(self.categories.clone())
    }

    async fn forums(&self) -> Result<Vec<SourceForum>, SourceError> {
        Ok(self.forums.clone())
    }

    async fn post_ids(
        &self,
        offset: u64,
        limit: u64,
        filter: &PostFilter,
    ) -> Result<Vec<i64>, SourceError> {
        Ok(page(&self.filtered_posts(filter), offset, limit)
            .into_iter()
            .map(|p| p.id)
            .collect())
    }

    async fn posts(
        &self,
        offset: u64,
        limit: u64,
        filter: &PostFilter,
    ) -> Result<Vec<SourcePost>, SourceError> {
        Ok(page(&self.filtered_posts(filter), offset, limit))
    }

    async fn topics(&self, offset: u64, limit: u64) -> Result<Vec<SourceTopic>, SourceError> {
        Ok(page(&self.topic_rows(), offset, limit))
    }

    async fn bans(&self, offset: u64, limit: u64) -> Result<Vec<SourceBan>, SourceError> {
        Ok(page(&self.bans, offset, limit))
    }

    async fn post_message(&self, id: i64) -> Result<Option<String>, SourceError> {
        Ok(self
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.message.clone()))
    }

    async fn max_post_id(&self) -> Result<Option<i64>, SourceError> {
        Ok(self.posts.iter().map(|p| p.id).max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn post(id: i64, posted: i64) -> SourcePost {
        SourcePost {
            id,
            poster: "bob".to_string(),
            poster_id: 2,
            topic_id: 1,
            forum_id: 1,
            subject: "Route beta".to_string(),
            first_post_id: 1,
            message: format!("message {}", id),
            posted: DateTime::from_timestamp(posted, 0).unwrap(),
            locale: None,
        }
    }

    #[tokio::test]
    async fn test_posts_ordered_by_posted_then_id() {
        let source = MemorySource::new()
            .with_forums(vec![SourceForum {
                id: 1,
                name: "Alps".to_string(),
                description: None,
                position: 0,
                category_id: 1,
                locale: Some("fr".to_string()),
            }])
            .with_posts(vec![post(3, 100), post(1, 50), post(2, 100)]);

        let filter = PostFilter::default();
        assert_eq!(source.post_ids(0, 10, &filter).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(source.post_ids(1, 1, &filter).await.unwrap(), vec![2]);

        let posts = source.posts(0, 1, &filter).await.unwrap();
        assert_eq!(posts[0].locale.as_deref(), Some("fr"));
        assert_eq!(source.count(EntityKind::Topic, &filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_max_post_id() {
        assert_eq!(MemorySource::new().max_post_id().await.unwrap(), None);
        let source = MemorySource::new().with_posts(vec![post(3, 100), post(9, 50), post(2, 100)]);
        assert_eq!(source.max_post_id().await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn test_unsupported_count() {
        let source = MemorySource::new();
        assert!(matches!(
            source
                .count(EntityKind::Redirect, &PostFilter::default())
                .await,
            Err(SourceError::Unsupported(EntityKind::Redirect))
        ));
    }
}
