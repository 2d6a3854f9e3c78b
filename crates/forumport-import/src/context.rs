//! State shared by every stage of a run.

use std::sync::Arc;

use tokio::sync::mpsc;

use forumport::{IdentityResolver, MigrationRules, PostFilter, Rewriter, SourceStore, TargetStore};

use crate::{DeferredQueue, ImportEvent};

/// Everything a stage reads or updates during a run.
pub struct ImportContext {
    pub source: Arc<dyn SourceStore>,
    pub ids: IdentityResolver,
    pub rules: MigrationRules,
    pub rewriter: Rewriter,
    pub batch_size: u64,
    /// Restricts which posts are imported.
    pub filter: PostFilter,
    pub deferred: DeferredQueue,
    events: Option<mpsc::Sender<ImportEvent>>,
}

impl ImportContext {
    pub fn new(
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        rules: MigrationRules,
    ) -> Self {
        let rewriter = Rewriter::new(rules.spoiler_label.clone());
        Self {
            source,
            ids: IdentityResolver::new(target),
            rules,
            rewriter,
            batch_size: 500,
            filter: PostFilter::default(),
            deferred: DeferredQueue::default(),
            events: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_filter(mut self, filter: PostFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Send progress events to this channel.
    pub fn with_events(mut self, events: mpsc::Sender<ImportEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn target(&self) -> &Arc<dyn TargetStore> {
        self.ids.store()
    }

    /// Emit a progress event. A closed receiver is ignored.
    pub async fn emit(&self, event: ImportEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event).await;
        }
    }
}
