//! Topics and posts.
//!
//! Topics have no row of their own in the target: a topic is created along
//! with its first post. Posts are therefore created one at a time, in
//! `(posted, id)` order, so that every reply and every quote can resolve
//! against posts created earlier in the same page.

use std::collections::HashMap;

use async_trait::async_trait;

use forumport::models::{
    CreateOutcome, PostDescriptor, SourcePost, TargetDescriptor, TopicPlacement, GUEST_USER_ID,
};
use forumport::rewrite::decode_entities;
use forumport::{EntityKind, QuoteTarget};

use super::{count_outcome, DocumentRef};
use crate::{ImportContext, ImportError, ImportStats, MigrationStage, PageResult};

/// Attribution line for posts whose author was not imported, in the
/// language of the forum.
pub fn guest_line(locale: Option<&str>, poster: &str) -> String {
    let language = locale
        .and_then(|l| l.split(['_', '-']).next())
        .map(|l| l.to_ascii_lowercase());

    match language.as_deref() {
        Some("fr") => format!("Message posté en tant qu'invité par _{}_ :", poster),
        Some("it") => format!("Messaggio inviato come ospite da _{}_:", poster),
        Some("de") => format!("Als Gast geschrieben von _{}_:", poster),
        Some("es") => format!("Publicado como invitado por _{}_:", poster),
        Some("ca") => format!("Publicat com a convidat per _{}_:", poster),
        Some("eu") => format!("_{}_ erabiltzaileak gonbidatu gisa argitaratua:", poster),
        _ => format!("Posted as guest by _{}_:", poster),
    }
}

/// Rewrite a post body, resolving quotes against posts imported so far.
async fn body(ctx: &mut ImportContext, post: &SourcePost) -> Result<String, ImportError> {
    let prepared = ctx.rewriter.prepare(&post.message);

    let mut quoted: HashMap<i64, QuoteTarget> = HashMap::new();
    for reference in ctx.rewriter.quote_references(post.id, &prepared) {
        if quoted.contains_key(&reference.quoted_source_id) {
            continue;
        }
        match ctx.ids.resolve_post(reference.quoted_source_id).await {
            Ok(Some(location)) => {
                quoted.insert(
                    reference.quoted_source_id,
                    QuoteTarget {
                        post_id: location.post_id,
                        post_number: location.post_number,
                        topic_id: location.topic_id,
                    },
                );
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(
                "Cannot resolve post {} quoted by {}: {}",
                reference.quoted_source_id,
                post.id,
                e
            ),
        }
    }

    Ok(ctx.rewriter.finish(prepared, &quoted))
}

async fn create_post(
    ctx: &ImportContext,
    descriptor: PostDescriptor,
) -> Result<CreateOutcome, ImportError> {
    let mut outcomes = ctx
        .target()
        .batch_create(vec![TargetDescriptor::Post(descriptor)])
        .await?;
    Ok(outcomes.pop().unwrap_or_else(|| CreateOutcome::Failed {
        reason: "target returned no outcome".to_string(),
    }))
}

/// Open the topic of a document-comments thread with a generated post
/// linking the document. Returns the topic id, or `None` if it failed.
/// The caller counts the failure against the original post.
async fn open_document_topic(
    ctx: &mut ImportContext,
    post: &SourcePost,
    document: &DocumentRef,
    title: String,
    category_id: i64,
    stats: &mut ImportStats,
) -> Result<Option<i64>, ImportError> {
    let Some(url) = document.url(&ctx.rules) else {
        tracing::warn!(
            "Cannot build document URL from {}",
            ctx.rules.document_base_url
        );
        return Ok(None);
    };

    let synthetic_id = ctx.rules.synthetic_post_id(post.id);
    let descriptor = PostDescriptor {
        forced_id: synthetic_id,
        user_id: GUEST_USER_ID,
        raw: url.to_string(),
        created_at: post.posted,
        placement: TopicPlacement::New { title, category_id },
    };

    let post_id = match create_post(ctx, descriptor).await? {
        CreateOutcome::Created { target_id } => {
            stats.created += 1;
            target_id
        }
        CreateOutcome::Existing { target_id } => target_id,
        CreateOutcome::Failed { reason } => {
            tracing::warn!(
                "Failed to create document post {} for {}: {}",
                synthetic_id,
                post.id,
                reason
            );
            return Ok(None);
        }
    };

    ctx.ids
        .record(EntityKind::Topic, post.first_post_id, post_id)
        .await?;
    let location = ctx.ids.resolve_post_location(post_id).await?;
    Ok(location.map(|l| l.topic_id))
}

/// Topic a post belongs to, via the mapping of its topic's first post.
async fn topic_of(ctx: &mut ImportContext, first_post_id: i64) -> Result<Option<i64>, ImportError> {
    let Some(post_id) = ctx.ids.resolve(EntityKind::Topic, first_post_id).await? else {
        return Ok(None);
    };
    Ok(ctx
        .ids
        .resolve_post_location(post_id)
        .await?
        .map(|l| l.topic_id))
}

async fn import_post(
    ctx: &mut ImportContext,
    post: &SourcePost,
    stats: &mut ImportStats,
) -> Result<(), ImportError> {
    if let Some(post_id) = ctx.ids.resolve(EntityKind::Post, post.id).await? {
        // A first post mapped by a run that stopped before its topic was.
        if post.is_first_post()
            && ctx.ids.resolve(EntityKind::Topic, post.first_post_id).await?.is_none()
        {
            tracing::debug!("Restoring topic mapping of post {}", post.id);
            ctx.ids
                .record(EntityKind::Topic, post.first_post_id, post_id)
                .await?;
        }
        stats.skipped += 1;
        return Ok(());
    }

    let author = ctx.ids.resolve(EntityKind::User, post.poster_id).await?;
    let mut raw = body(ctx, post).await?;
    let user_id = match author {
        Some(user_id) => user_id,
        None => {
            raw = format!("{}\n{}", guest_line(post.locale.as_deref(), &post.poster), raw);
            GUEST_USER_ID
        }
    };

    let mut opens_topic = false;
    let placement = if post.is_first_post() {
        let Some(category_id) = ctx.ids.resolve(EntityKind::Forum, post.forum_id).await? else {
            tracing::warn!(
                "Forum {} is not imported. Skipping {}: {}",
                post.forum_id,
                post.id,
                post.short_subject()
            );
            stats.failed += 1;
            return Ok(());
        };
        let title = decode_entities(&post.subject);

        let document = if ctx.rules.is_document_comments(post.forum_id) {
            let document = DocumentRef::parse(&title);
            if document.is_none() {
                tracing::warn!(
                    "Cannot decode document title '{}' of topic {}, importing as a normal topic",
                    title,
                    post.topic_id
                );
            }
            document
        } else {
            None
        };

        match document {
            Some(document) => {
                // A re-run may find the generated post already in place.
                let existing = topic_of(ctx, post.first_post_id).await?;
                let topic_id = match existing {
                    Some(topic_id) => Some(topic_id),
                    None => {
                        open_document_topic(ctx, post, &document, title, category_id, stats)
                            .await?
                    }
                };
                match topic_id {
                    Some(topic_id) => TopicPlacement::Reply { topic_id },
                    None => {
                        stats.failed += 1;
                        return Ok(());
                    }
                }
            }
            None => {
                opens_topic = true;
                TopicPlacement::New { title, category_id }
            }
        }
    } else {
        match topic_of(ctx, post.first_post_id).await? {
            Some(topic_id) => TopicPlacement::Reply { topic_id },
            None => {
                tracing::warn!(
                    "Parent post {} doesn't exist. Skipping {}: {}",
                    post.first_post_id,
                    post.id,
                    post.short_subject()
                );
                stats.orphaned += 1;
                return Ok(());
            }
        }
    };

    let descriptor = PostDescriptor {
        forced_id: post.id,
        user_id,
        raw,
        created_at: post.posted,
        placement,
    };
    let outcome = create_post(ctx, descriptor).await?;
    if let Some(post_id) = count_outcome(EntityKind::Post, post.id, &outcome, stats) {
        // The post mapping is written last: it is what marks the post done.
        if opens_topic {
            ctx.ids
                .record(EntityKind::Topic, post.first_post_id, post_id)
                .await?;
        }
        ctx.ids.record(EntityKind::Post, post.id, post_id).await?;
    }
    Ok(())
}

pub struct PostStage;

#[async_trait]
impl MigrationStage for PostStage {
    fn name(&self) -> &'static str {
        "posts"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Post
    }

    /// Generated document posts must not collide with legacy post ids.
    async fn prepare(&self, ctx: &ImportContext) -> Result<(), ImportError> {
        if ctx.rules.document_comments_forum_id.is_none() {
            return Ok(());
        }
        let offset = ctx.rules.synthetic_post_id_offset;
        match ctx.source.max_post_id().await? {
            Some(max_id) if offset <= max_id => Err(ImportError::InvalidRules(format!(
                "synthetic_post_id_offset {} must exceed the highest post id {}",
                offset, max_id
            ))),
            _ => Ok(()),
        }
    }

    async fn total(&self, ctx: &ImportContext) -> Result<u64, ImportError> {
        Ok(ctx.source.count(EntityKind::Post, &ctx.filter).await?)
    }

    async fn page_ids(
        &self,
        ctx: &ImportContext,
        offset: u64,
    ) -> Result<Option<Vec<i64>>, ImportError> {
        Ok(Some(
            ctx.source
                .post_ids(offset, ctx.batch_size, &ctx.filter)
                .await?,
        ))
    }

    async fn process_page(
        &self,
        ctx: &mut ImportContext,
        offset: u64,
    ) -> Result<PageResult, ImportError> {
        let filter = ctx.filter;
        let posts = ctx.source.posts(offset, ctx.batch_size, &filter).await?;
        let mut stats = ImportStats {
            scanned: posts.len(),
            ..ImportStats::default()
        };

        for post in &posts {
            import_post(ctx, post, &mut stats).await?;
        }

        Ok(PageResult::new(posts.len(), ctx.batch_size, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_line_localized() {
        assert_eq!(guest_line(None, "Yeti"), "Posted as guest by _Yeti_:");
        assert_eq!(
            guest_line(Some("fr"), "Yeti"),
            "Message posté en tant qu'invité par _Yeti_ :"
        );
        assert_eq!(
            guest_line(Some("de_CH"), "Yeti"),
            "Als Gast geschrieben von _Yeti_:"
        );
        assert_eq!(guest_line(Some("ES"), "Yeti"), "Publicado como invitado por _Yeti_:");
        assert_eq!(guest_line(Some("zz"), "Yeti"), "Posted as guest by _Yeti_:");
        for locale in ["it", "ca", "eu"] {
            assert!(guest_line(Some(locale), "Yeti").contains("_Yeti_"));
        }
    }
}
