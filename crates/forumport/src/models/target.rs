//! Descriptors handed to the target store and the values it returns.

use chrono::{DateTime, Utc};

use super::EntityKind;

/// Built-in system account that owns staff actions.
pub const SYSTEM_USER_ID: i64 = -1;

/// Author of posts whose legacy poster was never imported.
/// Shares the system account, as the target platform does for anonymous content.
pub const GUEST_USER_ID: i64 = SYSTEM_USER_ID;

/// A virtual group to create.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDescriptor {
    pub source_id: i64,
    pub name: String,
}

/// A user ready for creation, with the legacy id forced as primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct UserDescriptor {
    pub forced_id: i64,
    pub username: String,
    /// Longest username the target accepts, collision suffix included.
    pub username_max_length: usize,
    pub name: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub registration_ip: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub admin: bool,
    pub moderator: bool,
}

/// A category ready for creation. Legacy categories and forums share one
/// target table, so the mapping kind travels with the descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDescriptor {
    pub kind: EntityKind,
    pub source_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
    pub parent_id: Option<i64>,
    pub read_restricted: bool,
    pub suppress_from_homepage: bool,
}

/// Where a post lands.
#[derive(Debug, Clone, PartialEq)]
pub enum TopicPlacement {
    /// Open a new topic with this post as its first post.
    New { title: String, category_id: i64 },
    /// Append to an existing topic.
    Reply { topic_id: i64 },
}

/// A post ready for creation.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDescriptor {
    /// Target primary key; also the identity-mapping key for this post.
    pub forced_id: i64,
    pub user_id: i64,
    pub raw: String,
    pub created_at: DateTime<Utc>,
    pub placement: TopicPlacement,
}

/// Any entity the target can batch-create.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetDescriptor {
    Group(GroupDescriptor),
    User(UserDescriptor),
    Category(CategoryDescriptor),
    Post(PostDescriptor),
}

impl TargetDescriptor {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Group(_) => EntityKind::Group,
            Self::User(_) => EntityKind::User,
            Self::Category(c) => c.kind,
            Self::Post(_) => EntityKind::Post,
        }
    }

    /// Source id the created entity is mapped under.
    pub fn source_id(&self) -> i64 {
        match self {
            Self::Group(g) => g.source_id,
            Self::User(u) => u.forced_id,
            Self::Category(c) => c.source_id,
            Self::Post(p) => p.forced_id,
        }
    }
}

/// Per-record result of a batch create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { target_id: i64 },
    /// The target already held this entity (same forced id or natural key).
    Existing { target_id: i64 },
    Failed { reason: String },
}

impl CreateOutcome {
    pub fn target_id(&self) -> Option<i64> {
        match self {
            Self::Created { target_id } | Self::Existing { target_id } => Some(*target_id),
            Self::Failed { .. } => None,
        }
    }
}

/// Position of a created post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostLocation {
    pub post_id: i64,
    pub topic_id: i64,
    pub post_number: i32,
}

/// A user as seen by ban processing.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetUser {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub suspended_till: Option<DateTime<Utc>>,
}

/// What a legacy URL redirects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermalinkTarget {
    Category(i64),
    Topic(i64),
    Post(i64),
}

/// An entry for the staff action log.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffAction {
    pub acting_user_id: i64,
    pub target_user_id: i64,
    pub action: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl StaffAction {
    pub const SUSPEND_USER: &'static str = "suspend_user";

    /// Suspension logged under the system account.
    pub fn system_suspension(target_user_id: i64, reason: &str) -> Self {
        Self {
            acting_user_id: SYSTEM_USER_ID,
            target_user_id,
            action: Self::SUSPEND_USER.to_string(),
            details: reason.to_string(),
            created_at: Utc::now(),
        }
    }
}
