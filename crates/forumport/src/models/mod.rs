//! Domain models shared by the source store, target store and importer.

mod source;
mod target;

pub use source::{SourceBan, SourceCategory, SourceForum, SourcePost, SourceTopic, SourceUser};
pub use target::{
    CategoryDescriptor, CreateOutcome, GroupDescriptor, PermalinkTarget, PostDescriptor,
    PostLocation, StaffAction, TargetDescriptor, TargetUser, TopicPlacement, UserDescriptor,
    GUEST_USER_ID, SYSTEM_USER_ID,
};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of entity tracked by the identity mapping.
///
/// `Topic` is keyed by the legacy first-post id of a topic and maps to the
/// target id of the topic's true first post, which is synthetic for
/// document-comment topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Group,
    User,
    Category,
    Forum,
    Post,
    Topic,
    Ban,
    Redirect,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Group,
        EntityKind::User,
        EntityKind::Category,
        EntityKind::Forum,
        EntityKind::Post,
        EntityKind::Topic,
        EntityKind::Ban,
        EntityKind::Redirect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::User => "user",
            Self::Category => "category",
            Self::Forum => "forum",
            Self::Post => "post",
            Self::Topic => "topic",
            Self::Ban => "ban",
            Self::Redirect => "redirect",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "group" => Some(Self::Group),
            "user" => Some(Self::User),
            "category" => Some(Self::Category),
            "forum" => Some(Self::Forum),
            "post" => Some(Self::Post),
            "topic" => Some(Self::Topic),
            "ban" => Some(Self::Ban),
            "redirect" => Some(Self::Redirect),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::from_str("POST"), Some(EntityKind::Post));
        assert_eq!(EntityKind::from_str("thread"), None);
    }
}
