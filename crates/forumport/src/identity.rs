//! Identity resolution between legacy ids and target ids.
//!
//! The mapping itself lives in the target store. The resolver adds a
//! per-run cache and enforces that a mapping, once recorded, never changes.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::models::{EntityKind, PostLocation};
use crate::target::{TargetError, TargetStore};

#[derive(Debug, Error)]
pub enum IdentityError {
    /// A source id was about to be re-mapped. Signals corrupted import
    /// metadata; the run must stop.
    #[error("{kind} {source_id} is already mapped to {existing}, refusing to map it to {attempted}")]
    Conflict {
        kind: EntityKind,
        source_id: i64,
        existing: i64,
        attempted: i64,
    },

    #[error(transparent)]
    Store(#[from] TargetError),
}

/// Cached view over the target's identity mappings.
pub struct IdentityResolver {
    store: Arc<dyn TargetStore>,
    ids: HashMap<(EntityKind, i64), i64>,
    locations: HashMap<i64, PostLocation>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn TargetStore>) -> Self {
        Self {
            store,
            ids: HashMap::new(),
            locations: HashMap::new(),
        }
    }

    /// Target id for a source id, if imported.
    pub async fn resolve(
        &mut self,
        kind: EntityKind,
        source_id: i64,
    ) -> Result<Option<i64>, IdentityError> {
        if let Some(&target_id) = self.ids.get(&(kind, source_id)) {
            return Ok(Some(target_id));
        }

        let found = self.store.lookup_import_id(kind, source_id).await?;
        if let Some(target_id) = found {
            self.ids.insert((kind, source_id), target_id);
        }
        Ok(found)
    }

    /// Record a new mapping. Recording the same pair twice is a no-op;
    /// recording a different target id is a [`IdentityError::Conflict`].
    pub async fn record(
        &mut self,
        kind: EntityKind,
        source_id: i64,
        target_id: i64,
    ) -> Result<(), IdentityError> {
        match self.resolve(kind, source_id).await? {
            Some(existing) if existing == target_id => Ok(()),
            Some(existing) => Err(IdentityError::Conflict {
                kind,
                source_id,
                existing,
                attempted: target_id,
            }),
            None => {
                self.store
                    .record_import_id(kind, source_id, target_id)
                    .await?;
                self.ids.insert((kind, source_id), target_id);
                Ok(())
            }
        }
    }

    /// Whether every id is already mapped. Only ids missing from the cache
    /// reach the store.
    pub async fn exists_all(
        &mut self,
        kind: EntityKind,
        source_ids: &[i64],
    ) -> Result<bool, IdentityError> {
        let missing: Vec<i64> = source_ids
            .iter()
            .copied()
            .filter(|id| !self.ids.contains_key(&(kind, *id)))
            .collect();

        if missing.is_empty() {
            return Ok(true);
        }
        Ok(self.store.exists(kind, &missing).await?)
    }

    /// Topic and post number of a created post.
    pub async fn resolve_post_location(
        &mut self,
        post_id: i64,
    ) -> Result<Option<PostLocation>, IdentityError> {
        if let Some(&location) = self.locations.get(&post_id) {
            return Ok(Some(location));
        }

        let found = self.store.post_location(post_id).await?;
        if let Some(location) = found {
            self.locations.insert(post_id, location);
        }
        Ok(found)
    }

    /// Location of the post a legacy post id was imported as.
    pub async fn resolve_post(
        &mut self,
        source_post_id: i64,
    ) -> Result<Option<PostLocation>, IdentityError> {
        match self.resolve(EntityKind::Post, source_post_id).await? {
            Some(post_id) => self.resolve_post_location(post_id).await,
            None => Ok(None),
        }
    }

    /// Number of cached mappings.
    pub fn cached(&self) -> usize {
        self.ids.len()
    }

    pub fn store(&self) -> &Arc<dyn TargetStore> {
        &self.store
    }
}
