//! Rows read from the legacy PunBB database.

use chrono::{DateTime, Utc};

/// A registered PunBB user.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUser {
    pub id: i64,
    pub username: String,
    /// Display name (`realname` in PunBB).
    pub name: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub registered: Option<DateTime<Utc>>,
    pub registration_ip: Option<String>,
    pub last_visit: Option<DateTime<Utc>>,
    pub group_id: i64,
}

/// A top-level PunBB category.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCategory {
    pub id: i64,
    pub name: String,
    pub position: i32,
}

/// A PunBB forum, imported as a child category.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceForum {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
    pub category_id: i64,
    /// Locale of the forum's audience, when the board tracks one.
    pub locale: Option<String>,
}

/// A PunBB post joined with its topic.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePost {
    pub id: i64,
    /// Name the post was made under; the only author info for guest posts.
    pub poster: String,
    pub poster_id: i64,
    pub topic_id: i64,
    pub forum_id: i64,
    pub subject: String,
    pub first_post_id: i64,
    pub message: String,
    pub posted: DateTime<Utc>,
    /// Locale of the owning forum.
    pub locale: Option<String>,
}

impl SourcePost {
    /// Whether this post opens its topic.
    pub fn is_first_post(&self) -> bool {
        self.id == self.first_post_id
    }

    /// Subject truncated for log lines.
    pub fn short_subject(&self) -> String {
        self.subject.chars().take(40).collect()
    }
}

/// A PunBB topic, used for redirects.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTopic {
    pub id: i64,
    pub first_post_id: i64,
    pub forum_id: i64,
    pub subject: String,
}

/// A PunBB ban entry. Bans are keyed on email, not on user id.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBan {
    pub id: i64,
    pub username: Option<String>,
    pub email: Option<String>,
}
