//! Business rules for mapping legacy data onto the target model.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// A target group with no legacy equivalent, aggregating legacy group ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualGroup {
    /// Stable id, used as the group's source id in the identity mapping.
    pub id: i64,
    pub name: String,
    /// Legacy PunBB group ids whose members join this group.
    #[serde(default)]
    pub legacy_group_ids: Vec<i64>,
}

/// Mapping rules applied by the import stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationRules {
    /// Maximum username length on the target platform.
    pub username_max_length: usize,
    /// Legacy group ids whose members become admins.
    pub admin_group_ids: Vec<i64>,
    /// Legacy group ids whose members become moderators.
    pub moderator_group_ids: Vec<i64>,
    pub virtual_groups: Vec<VirtualGroup>,
    /// Virtual group every admin and moderator joins.
    pub staff_group_id: Option<i64>,
    /// Legacy category ids imported as read-restricted.
    pub restricted_category_ids: Vec<i64>,
    /// Legacy forum ids imported as read-restricted.
    pub restricted_forum_ids: Vec<i64>,
    /// Virtual group granted access to every restricted category.
    pub restricted_access_group_id: Option<i64>,
    /// Legacy forum hidden from the homepage.
    pub homepage_suppressed_forum_id: Option<i64>,
    /// Legacy forum holding comment threads about external documents.
    pub document_comments_forum_id: Option<i64>,
    /// Added to a post id to derive its synthetic document-link post id.
    pub synthetic_post_id_offset: i64,
    pub document_base_url: String,
    /// URL segment for document types with no known mapping.
    pub default_document_segment: String,
    /// Label for spoiler blocks without a title.
    pub spoiler_label: String,
    /// Path prefix of legacy forum URLs, without a leading slash.
    pub redirect_prefix: String,
}

impl Default for MigrationRules {
    fn default() -> Self {
        Self {
            username_max_length: 15,
            admin_group_ids: vec![1],
            moderator_group_ids: vec![4],
            virtual_groups: Vec::new(),
            staff_group_id: None,
            restricted_category_ids: Vec::new(),
            restricted_forum_ids: Vec::new(),
            restricted_access_group_id: None,
            homepage_suppressed_forum_id: None,
            document_comments_forum_id: None,
            synthetic_post_id_offset: 10_000_000,
            document_base_url: "https://www.camptocamp.org".to_string(),
            default_document_segment: "documents".to_string(),
            spoiler_label: "Spoiler".to_string(),
            redirect_prefix: String::new(),
        }
    }
}

impl MigrationRules {
    pub fn is_admin(&self, legacy_group_id: i64) -> bool {
        self.admin_group_ids.contains(&legacy_group_id)
    }

    pub fn is_moderator(&self, legacy_group_id: i64) -> bool {
        self.moderator_group_ids.contains(&legacy_group_id)
    }

    /// Virtual group ids a user joins, given their legacy group and staff flag.
    pub fn groups_for(&self, legacy_group_id: i64, staff: bool) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .virtual_groups
            .iter()
            .filter(|g| g.legacy_group_ids.contains(&legacy_group_id))
            .map(|g| g.id)
            .collect();

        if staff {
            if let Some(staff_id) = self.staff_group_id {
                if !ids.contains(&staff_id) {
                    ids.push(staff_id);
                }
            }
        }

        ids
    }

    pub fn is_category_restricted(&self, category_id: i64) -> bool {
        self.restricted_category_ids.contains(&category_id)
    }

    pub fn is_forum_restricted(&self, forum_id: i64) -> bool {
        self.restricted_forum_ids.contains(&forum_id)
    }

    pub fn is_document_comments(&self, forum_id: i64) -> bool {
        self.document_comments_forum_id == Some(forum_id)
    }

    pub fn synthetic_post_id(&self, post_id: i64) -> i64 {
        self.synthetic_post_id_offset + post_id
    }

    /// Redirect prefix normalized to either empty or `path/`.
    pub fn redirect_base(&self) -> String {
        let trimmed = self.redirect_prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        }
    }

    /// Check cross-references between rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username_max_length == 0 {
            return Err(ConfigError::Invalid(
                "username_max_length must be at least 1".to_string(),
            ));
        }
        if self.synthetic_post_id_offset <= 0 {
            return Err(ConfigError::Invalid(
                "synthetic_post_id_offset must be positive".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for group in &self.virtual_groups {
            if !seen.insert(group.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate virtual group id {}",
                    group.id
                )));
            }
        }

        for (field, id) in [
            ("staff_group_id", self.staff_group_id),
            ("restricted_access_group_id", self.restricted_access_group_id),
        ] {
            if let Some(id) = id {
                if !seen.contains(&id) {
                    return Err(ConfigError::Invalid(format!(
                        "{} {} does not name a virtual group",
                        field, id
                    )));
                }
            }
        }

        url::Url::parse(&self.document_base_url).map_err(|e| {
            ConfigError::Invalid(format!(
                "document_base_url {:?} is not a URL: {}",
                self.document_base_url, e
            ))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules_with_groups() -> MigrationRules {
        MigrationRules {
            virtual_groups: vec![
                VirtualGroup {
                    id: 1,
                    name: "staff".to_string(),
                    legacy_group_ids: vec![],
                },
                VirtualGroup {
                    id: 2,
                    name: "guides".to_string(),
                    legacy_group_ids: vec![5, 6],
                },
                VirtualGroup {
                    id: 3,
                    name: "association".to_string(),
                    legacy_group_ids: vec![6],
                },
            ],
            staff_group_id: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_groups_for_many_to_many() {
        let rules = rules_with_groups();
        assert_eq!(rules.groups_for(6, false), vec![2, 3]);
        assert_eq!(rules.groups_for(5, false), vec![2]);
        assert!(rules.groups_for(9, false).is_empty());
    }

    #[test]
    fn test_staff_always_joins_staff_group() {
        let rules = rules_with_groups();
        assert_eq!(rules.groups_for(4, true), vec![1]);
        assert_eq!(rules.groups_for(5, true), vec![2, 1]);
    }

    #[test]
    fn test_redirect_base() {
        let mut rules = MigrationRules::default();
        assert_eq!(rules.redirect_base(), "");
        rules.redirect_prefix = "/forums/".to_string();
        assert_eq!(rules.redirect_base(), "forums/");
    }

    #[test]
    fn test_validate_rejects_unknown_staff_group() {
        let mut rules = rules_with_groups();
        assert!(rules.validate().is_ok());

        rules.staff_group_id = Some(42);
        assert!(matches!(rules.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_groups() {
        let mut rules = rules_with_groups();
        rules.virtual_groups.push(VirtualGroup {
            id: 2,
            name: "again".to_string(),
            legacy_group_ids: vec![],
        });
        assert!(rules.validate().is_err());
    }
}
