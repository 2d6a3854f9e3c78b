//! In-memory target store.
//!
//! Holds the whole target model behind a single lock. Used by tests and dry
//! runs; state is not persisted.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::util::suffixed_username;
use super::{TargetError, TargetStore};
use crate::models::{
    CategoryDescriptor, CreateOutcome, EntityKind, GroupDescriptor, PermalinkTarget,
    PostDescriptor, PostLocation, StaffAction, TargetDescriptor, TargetUser, TopicPlacement,
    UserDescriptor, SYSTEM_USER_ID,
};

/// A stored user.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryUser {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub admin: bool,
    pub moderator: bool,
    pub suspended_at: Option<DateTime<Utc>>,
    pub suspended_till: Option<DateTime<Utc>>,
}

/// A stored category.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryCategory {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub position: i32,
    pub read_restricted: bool,
    pub suppress_from_homepage: bool,
}

/// A stored topic.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTopic {
    pub id: i64,
    pub title: String,
    pub category_id: i64,
    pub highest_post_number: i32,
}

/// A stored post.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPost {
    pub id: i64,
    pub topic_id: i64,
    pub post_number: i32,
    pub user_id: i64,
    pub raw: String,
}

/// Entity totals, for idempotence checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub users: usize,
    pub groups: usize,
    pub categories: usize,
    pub topics: usize,
    pub posts: usize,
    pub permalinks: usize,
    pub group_memberships: usize,
}

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<i64, MemoryUser>,
    groups: BTreeMap<i64, String>,
    group_users: BTreeSet<(i64, i64)>,
    categories: BTreeMap<i64, MemoryCategory>,
    category_groups: BTreeSet<(i64, i64)>,
    topics: BTreeMap<i64, MemoryTopic>,
    posts: BTreeMap<i64, MemoryPost>,
    permalinks: BTreeMap<String, PermalinkTarget>,
    staff_actions: Vec<StaffAction>,
    import_ids: HashMap<(EntityKind, i64), i64>,
    failing_posts: HashSet<i64>,
    failing_suspensions: HashSet<i64>,
    failing_permalinks: HashSet<String>,
    failing_group_joins: HashSet<i64>,
    failing_staff_logs: HashSet<i64>,
    offline: bool,
}

impl State {
    fn check_online(&self) -> Result<(), TargetError> {
        if self.offline {
            Err(TargetError::Unavailable("memory target is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn create_group(&mut self, group: GroupDescriptor) -> CreateOutcome {
        if let Some((&id, _)) = self.groups.iter().find(|(_, name)| **name == group.name) {
            return CreateOutcome::Existing { target_id: id };
        }
        let id = self.groups.keys().next_back().copied().unwrap_or(0) + 1;
        self.groups.insert(id, group.name);
        CreateOutcome::Created { target_id: id }
    }

    fn create_user(&mut self, user: UserDescriptor) -> CreateOutcome {
        if self.users.contains_key(&user.forced_id) {
            return CreateOutcome::Existing {
                target_id: user.forced_id,
            };
        }

        let mut username = user.username.clone();
        let mut attempt = 1;
        while self
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&username))
        {
            attempt += 1;
            username = suffixed_username(&user.username, attempt, user.username_max_length);
        }

        self.users.insert(
            user.forced_id,
            MemoryUser {
                id: user.forced_id,
                username,
                email: user.email,
                admin: user.admin,
                moderator: user.moderator,
                suspended_at: None,
                suspended_till: None,
            },
        );
        CreateOutcome::Created {
            target_id: user.forced_id,
        }
    }

    fn create_category(&mut self, category: CategoryDescriptor) -> CreateOutcome {
        if let Some(parent) = category.parent_id {
            if !self.categories.contains_key(&parent) {
                return CreateOutcome::Failed {
                    reason: format!("parent category {} does not exist", parent),
                };
            }
        }
        if let Some(existing) = self
            .categories
            .values()
            .find(|c| c.name == category.name && c.parent_id == category.parent_id)
        {
            return CreateOutcome::Existing {
                target_id: existing.id,
            };
        }

        let id = self.categories.keys().next_back().copied().unwrap_or(0) + 1;
        self.categories.insert(
            id,
            MemoryCategory {
                id,
                name: category.name,
                parent_id: category.parent_id,
                position: category.position,
                read_restricted: category.read_restricted,
                suppress_from_homepage: category.suppress_from_homepage,
            },
        );
        CreateOutcome::Created { target_id: id }
    }

    fn create_post(&mut self, post: PostDescriptor) -> CreateOutcome {
        if self.posts.contains_key(&post.forced_id) {
            return CreateOutcome::Existing {
                target_id: post.forced_id,
            };
        }
        if self.failing_posts.contains(&post.forced_id) {
            return CreateOutcome::Failed {
                reason: format!("post {} rejected", post.forced_id),
            };
        }
        if !self.users.contains_key(&post.user_id) {
            return CreateOutcome::Failed {
                reason: format!("user {} does not exist", post.user_id),
            };
        }

        let (topic_id, post_number) = match post.placement {
            TopicPlacement::New { title, category_id } => {
                if !self.categories.contains_key(&category_id) {
                    return CreateOutcome::Failed {
                        reason: format!("category {} does not exist", category_id),
                    };
                }
                let topic_id = self.topics.keys().next_back().copied().unwrap_or(0) + 1;
                self.topics.insert(
                    topic_id,
                    MemoryTopic {
                        id: topic_id,
                        title,
                        category_id,
                        highest_post_number: 1,
                    },
                );
                (topic_id, 1)
            }
            TopicPlacement::Reply { topic_id } => match self.topics.get_mut(&topic_id) {
                Some(topic) => {
                    topic.highest_post_number += 1;
                    (topic_id, topic.highest_post_number)
                }
                None => {
                    return CreateOutcome::Failed {
                        reason: format!("topic {} does not exist", topic_id),
                    }
                }
            },
        };

        self.posts.insert(
            post.forced_id,
            MemoryPost {
                id: post.forced_id,
                topic_id,
                post_number,
                user_id: post.user_id,
                raw: post.raw,
            },
        );
        CreateOutcome::Created {
            target_id: post.forced_id,
        }
    }
}

/// In-memory [`TargetStore`] with inspection helpers and failure injection.
#[derive(Debug)]
pub struct MemoryTarget {
    state: RwLock<State>,
}

impl Default for MemoryTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTarget {
    /// Create an empty target holding only the system user.
    pub fn new() -> Self {
        let mut state = State::default();
        state.users.insert(
            SYSTEM_USER_ID,
            MemoryUser {
                id: SYSTEM_USER_ID,
                username: "system".to_string(),
                email: None,
                admin: true,
                moderator: true,
                suspended_at: None,
                suspended_till: None,
            },
        );
        Self {
            state: RwLock::new(state),
        }
    }

    /// Make creation of this post id fail.
    pub async fn fail_post(&self, post_id: i64) {
        self.state.write().await.failing_posts.insert(post_id);
    }

    /// Make suspending this user fail.
    pub async fn fail_suspension(&self, user_id: i64) {
        self.state.write().await.failing_suspensions.insert(user_id);
    }

    /// Make creating this permalink fail.
    pub async fn fail_permalink(&self, url: &str) {
        self.state
            .write()
            .await
            .failing_permalinks
            .insert(url.to_string());
    }

    /// Make the next group join of this user fail.
    pub async fn fail_group_join_once(&self, user_id: i64) {
        self.state.write().await.failing_group_joins.insert(user_id);
    }

    /// Make the next staff log entry targeting this user fail.
    pub async fn fail_staff_log_once(&self, user_id: i64) {
        self.state.write().await.failing_staff_logs.insert(user_id);
    }

    /// Toggle whole-store unavailability.
    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.offline = offline;
    }

    pub async fn entity_counts(&self) -> EntityCounts {
        let state = self.state.read().await;
        EntityCounts {
            // The system user is not imported.
            users: state.users.len() - 1,
            groups: state.groups.len(),
            categories: state.categories.len(),
            topics: state.topics.len(),
            posts: state.posts.len(),
            permalinks: state.permalinks.len(),
            group_memberships: state.group_users.len(),
        }
    }

    pub async fn user(&self, id: i64) -> Option<MemoryUser> {
        self.state.read().await.users.get(&id).cloned()
    }

    pub async fn post(&self, id: i64) -> Option<MemoryPost> {
        self.state.read().await.posts.get(&id).cloned()
    }

    pub async fn topic(&self, id: i64) -> Option<MemoryTopic> {
        self.state.read().await.topics.get(&id).cloned()
    }

    /// Posts of a topic ordered by post number.
    pub async fn topic_posts(&self, topic_id: i64) -> Vec<MemoryPost> {
        let state = self.state.read().await;
        let mut posts: Vec<MemoryPost> = state
            .posts
            .values()
            .filter(|p| p.topic_id == topic_id)
            .cloned()
            .collect();
        posts.sort_by_key(|p| p.post_number);
        posts
    }

    pub async fn categories(&self) -> Vec<MemoryCategory> {
        self.state.read().await.categories.values().cloned().collect()
    }

    pub async fn group_id(&self, name: &str) -> Option<i64> {
        let state = self.state.read().await;
        state
            .groups
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    pub async fn group_members(&self, group_id: i64) -> Vec<i64> {
        let state = self.state.read().await;
        state
            .group_users
            .iter()
            .filter(|(g, _)| *g == group_id)
            .map(|(_, u)| *u)
            .collect()
    }

    /// (category, group) permission grants.
    pub async fn category_permissions(&self) -> Vec<(i64, i64)> {
        self.state
            .read()
            .await
            .category_groups
            .iter()
            .copied()
            .collect()
    }

    pub async fn permalink(&self, url: &str) -> Option<PermalinkTarget> {
        self.state.read().await.permalinks.get(url).copied()
    }

    pub async fn staff_actions(&self) -> Vec<StaffAction> {
        self.state.read().await.staff_actions.clone()
    }
}

#[async_trait]
impl TargetStore for MemoryTarget {
    async fn batch_create(
        &self,
        descriptors: Vec<TargetDescriptor>,
    ) -> Result<Vec<CreateOutcome>, TargetError> {
        let mut state = self.state.write().await;
        state.check_online()?;

        Ok(descriptors
            .into_iter()
            .map(|descriptor| match descriptor {
                TargetDescriptor::Group(g) => state.create_group(g),
                TargetDescriptor::User(u) => state.create_user(u),
                TargetDescriptor::Category(c) => state.create_category(c),
                TargetDescriptor::Post(p) => state.create_post(p),
            })
            .collect())
    }

    async fn lookup_import_id(
        &self,
        kind: EntityKind,
        source_id: i64,
    ) -> Result<Option<i64>, TargetError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state.import_ids.get(&(kind, source_id)).copied())
    }

    async fn record_import_id(
        &self,
        kind: EntityKind,
        source_id: i64,
        target_id: i64,
    ) -> Result<(), TargetError> {
        let mut state = self.state.write().await;
        state.check_online()?;
        state.import_ids.insert((kind, source_id), target_id);
        Ok(())
    }

    async fn exists(&self, kind: EntityKind, source_ids: &[i64]) -> Result<bool, TargetError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(source_ids
            .iter()
            .all(|id| state.import_ids.contains_key(&(kind, *id))))
    }

    async fn count_imported(&self, kind: EntityKind) -> Result<u64, TargetError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state.import_ids.keys().filter(|(k, _)| *k == kind).count() as u64)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<TargetUser>, TargetError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state
            .users
            .values()
            .find(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .map(|u| TargetUser {
                id: u.id,
                username: u.username.clone(),
                email: u.email.clone(),
                suspended_till: u.suspended_till,
            }))
    }

    async fn suspend_user(
        &self,
        user_id: i64,
        suspended_at: DateTime<Utc>,
        suspended_till: DateTime<Utc>,
    ) -> Result<(), TargetError> {
        let mut state = self.state.write().await;
        state.check_online()?;
        if state.failing_suspensions.contains(&user_id) {
            return Err(TargetError::Unavailable(format!(
                "cannot save user {}",
                user_id
            )));
        }
        match state.users.get_mut(&user_id) {
            Some(user) => {
                user.suspended_at = Some(suspended_at);
                user.suspended_till = Some(suspended_till);
                Ok(())
            }
            None => Err(TargetError::Unavailable(format!(
                "user {} does not exist",
                user_id
            ))),
        }
    }

    async fn log_staff_action(&self, action: &StaffAction) -> Result<(), TargetError> {
        let mut state = self.state.write().await;
        state.check_online()?;
        if state.failing_staff_logs.remove(&action.target_user_id) {
            return Err(TargetError::Unavailable(format!(
                "cannot log {} for user {}",
                action.action, action.target_user_id
            )));
        }
        state.staff_actions.push(action.clone());
        Ok(())
    }

    async fn staff_action_logged(
        &self,
        target_user_id: i64,
        action: &str,
    ) -> Result<bool, TargetError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state
            .staff_actions
            .iter()
            .any(|a| a.target_user_id == target_user_id && a.action == action))
    }

    async fn add_group_member(&self, group_id: i64, user_id: i64) -> Result<bool, TargetError> {
        let mut state = self.state.write().await;
        state.check_online()?;
        if state.failing_group_joins.remove(&user_id) {
            return Err(TargetError::Unavailable(format!(
                "cannot add user {} to group {}",
                user_id, group_id
            )));
        }
        Ok(state.group_users.insert((group_id, user_id)))
    }

    async fn grant_category_permission(
        &self,
        category_id: i64,
        group_id: i64,
    ) -> Result<(), TargetError> {
        let mut state = self.state.write().await;
        state.check_online()?;
        state.category_groups.insert((category_id, group_id));
        Ok(())
    }

    async fn post_location(&self, post_id: i64) -> Result<Option<PostLocation>, TargetError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state.posts.get(&post_id).map(|p| PostLocation {
            post_id: p.id,
            topic_id: p.topic_id,
            post_number: p.post_number,
        }))
    }

    async fn permalink_exists(&self, url: &str) -> Result<bool, TargetError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state.permalinks.contains_key(url))
    }

    async fn create_permalink(
        &self,
        url: &str,
        target: PermalinkTarget,
    ) -> Result<(), TargetError> {
        let mut state = self.state.write().await;
        state.check_online()?;
        if state.failing_permalinks.contains(url) {
            return Err(TargetError::Unavailable(format!(
                "cannot save permalink {}",
                url
            )));
        }
        state.permalinks.insert(url.to_string(), target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, username: &str) -> TargetDescriptor {
        TargetDescriptor::User(UserDescriptor {
            forced_id: id,
            username: username.to_string(),
            username_max_length: 15,
            name: None,
            email: Some(format!("{}@example.com", username)),
            website: None,
            location: None,
            registration_ip: None,
            created_at: None,
            last_seen_at: None,
            admin: false,
            moderator: false,
        })
    }

    fn category(source_id: i64, name: &str, parent_id: Option<i64>) -> TargetDescriptor {
        TargetDescriptor::Category(CategoryDescriptor {
            kind: EntityKind::Category,
            source_id,
            name: name.to_string(),
            description: None,
            position: 0,
            parent_id,
            read_restricted: false,
            suppress_from_homepage: false,
        })
    }

    fn post(id: i64, placement: TopicPlacement) -> TargetDescriptor {
        TargetDescriptor::Post(PostDescriptor {
            forced_id: id,
            user_id: SYSTEM_USER_ID,
            raw: format!("post {}", id),
            created_at: Utc::now(),
            placement,
        })
    }

    #[tokio::test]
    async fn test_users_dedupe_by_forced_id() {
        let target = MemoryTarget::new();
        let outcomes = target
            .batch_create(vec![user(5, "alice"), user(5, "alice")])
            .await
            .unwrap();
        assert_eq!(outcomes[0], CreateOutcome::Created { target_id: 5 });
        assert_eq!(outcomes[1], CreateOutcome::Existing { target_id: 5 });
        assert_eq!(target.entity_counts().await.users, 1);
    }

    #[tokio::test]
    async fn test_username_collision_gets_suffix() {
        let target = MemoryTarget::new();
        target
            .batch_create(vec![user(1, "bob"), user(2, "Bob")])
            .await
            .unwrap();
        assert_eq!(target.user(2).await.unwrap().username, "Bob2");
    }

    #[tokio::test]
    async fn test_suffixed_username_stays_within_max_length() {
        let target = MemoryTarget::new();
        target
            .batch_create(vec![user(1, "abcdefghijklmno"), user(2, "abcdefghijklmno")])
            .await
            .unwrap();
        assert_eq!(target.user(1).await.unwrap().username, "abcdefghijklmno");
        let second = target.user(2).await.unwrap().username;
        assert_eq!(second, "abcdefghijklmn2");
        assert!(second.len() <= 15);
    }

    #[tokio::test]
    async fn test_posts_number_within_topic() {
        let target = MemoryTarget::new();
        target
            .batch_create(vec![category(1, "General", None)])
            .await
            .unwrap();

        let outcomes = target
            .batch_create(vec![
                post(
                    10,
                    TopicPlacement::New {
                        title: "Hello".to_string(),
                        category_id: 1,
                    },
                ),
                post(11, TopicPlacement::Reply { topic_id: 1 }),
                post(12, TopicPlacement::Reply { topic_id: 99 }),
            ])
            .await
            .unwrap();

        assert!(matches!(outcomes[2], CreateOutcome::Failed { .. }));
        let location = target.post_location(11).await.unwrap().unwrap();
        assert_eq!(location.topic_id, 1);
        assert_eq!(location.post_number, 2);
    }

    #[tokio::test]
    async fn test_category_requires_parent() {
        let target = MemoryTarget::new();
        let outcomes = target
            .batch_create(vec![category(2, "Child", Some(7))])
            .await
            .unwrap();
        assert!(matches!(outcomes[0], CreateOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_import_ids() {
        let target = MemoryTarget::new();
        target
            .record_import_id(EntityKind::Post, 3, 3)
            .await
            .unwrap();
        assert!(target.exists(EntityKind::Post, &[3]).await.unwrap());
        assert!(!target.exists(EntityKind::Post, &[3, 4]).await.unwrap());
        assert!(!target.exists(EntityKind::User, &[3]).await.unwrap());
        assert_eq!(target.count_imported(EntityKind::Post).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_offline_target_errors() {
        let target = MemoryTarget::new();
        target.set_offline(true).await;
        assert!(matches!(
            target.lookup_import_id(EntityKind::User, 1).await,
            Err(TargetError::Unavailable(_))
        ));
    }
}
