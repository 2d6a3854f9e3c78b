//! Full pipeline runs against in-memory and SQLite targets.

use std::sync::Arc;

use chrono::DateTime;
use tokio::sync::mpsc;

use forumport::models::{
    PermalinkTarget, PostDescriptor, SourceBan, SourceCategory, SourceForum, SourcePost,
    SourceUser, TargetDescriptor, TopicPlacement, GUEST_USER_ID,
};
use forumport::source::MemorySource;
use forumport::target::{DieselTarget, MemoryTarget};
use forumport::{EntityKind, IdentityError, MigrationRules, PostFilter, TargetStore};
use forumport_import::{ImportContext, ImportError, ImportEvent, ImportRunner};

const ALPS: i64 = 10;
const DOCUMENTS: i64 = 20;

fn user(id: i64, username: &str, group_id: i64) -> SourceUser {
    SourceUser {
        id,
        username: username.to_string(),
        name: None,
        email: Some(format!("{}@example.org", username)),
        website: None,
        location: None,
        registered: None,
        registration_ip: None,
        last_visit: None,
        group_id,
    }
}

fn forum(id: i64, name: &str, locale: &str) -> SourceForum {
    SourceForum {
        id,
        name: name.to_string(),
        description: None,
        position: 0,
        category_id: 1,
        locale: Some(locale.to_string()),
    }
}

#[allow(clippy::too_many_arguments)]
fn post(
    id: i64,
    topic_id: i64,
    first_post_id: i64,
    forum_id: i64,
    poster_id: i64,
    poster: &str,
    subject: &str,
    message: &str,
) -> SourcePost {
    SourcePost {
        id,
        poster: poster.to_string(),
        poster_id,
        topic_id,
        forum_id,
        subject: subject.to_string(),
        first_post_id,
        message: message.to_string(),
        posted: DateTime::from_timestamp(1_000 + id, 0).unwrap(),
        locale: None,
    }
}

/// Two topics in a French forum and a document-comments forum, one guest
/// post, one forward quote and one orphaned reply.
fn board() -> MemorySource {
    MemorySource::new()
        .with_users(vec![user(2, "alice", 4), user(3, "bob", 5)])
        .with_categories(vec![SourceCategory {
            id: 1,
            name: "Mountains".to_string(),
            position: 0,
        }])
        .with_forums(vec![
            forum(ALPS, "Alps", "fr"),
            forum(DOCUMENTS, "Document comments", "en"),
        ])
        .with_posts(vec![
            post(100, 1, 100, ALPS, 2, "alice", "Mont Blanc &amp; co", "Conditions?"),
            post(101, 1, 100, ALPS, 3, "bob", "Mont Blanc &amp; co", "[quote=alice|100]Conditions?[/quote]\nGood."),
            post(102, 1, 100, ALPS, 1, "Yeti", "Mont Blanc &amp; co", "[quote=alice|103]later[/quote]"),
            post(103, 1, 100, ALPS, 2, "alice", "Mont Blanc &amp; co", "Thanks <!-- s:) --><img src=\"smile.gif\" /><!-- s:) -->"),
            post(200, 2, 200, DOCUMENTS, 3, "bob", "123_fr_r", "Nice route"),
            post(201, 2, 200, DOCUMENTS, 2, "alice", "123_fr_r", "+ 1"),
            post(300, 3, 299, ALPS, 3, "bob", "Lost topic", "anyone?"),
        ])
        .with_bans(vec![SourceBan {
            id: 1,
            username: Some("bob".to_string()),
            email: Some("bob@example.org".to_string()),
        }])
}

fn rules() -> MigrationRules {
    MigrationRules {
        document_comments_forum_id: Some(DOCUMENTS),
        redirect_prefix: "/forums/".to_string(),
        ..MigrationRules::default()
    }
}

fn context(target: Arc<dyn TargetStore>) -> ImportContext {
    ImportContext::new(Arc::new(board()), target, rules())
}

#[tokio::test]
async fn test_full_import() {
    let target = Arc::new(MemoryTarget::new());
    let mut ctx = context(target.clone());

    let report = ImportRunner::new().run(&mut ctx).await.unwrap();
    let posts = report.stage("posts").unwrap();
    assert_eq!(posts.orphaned, 1);
    assert_eq!(posts.failed, 0);
    // Six legacy posts plus the generated document post.
    assert_eq!(posts.created, 7);

    let counts = target.entity_counts().await;
    assert_eq!(counts.users, 2);
    assert_eq!(counts.categories, 3);
    assert_eq!(counts.topics, 2);
    assert_eq!(counts.posts, 7);

    let first = target.post(100).await.unwrap();
    let topic = target.topic(first.topic_id).await.unwrap();
    assert_eq!(topic.title, "Mont Blanc & co");
    assert_eq!(first.post_number, 1);

    let smiley = target.post(103).await.unwrap();
    assert_eq!(smiley.raw, "Thanks :)");
    assert_eq!(smiley.post_number, 4);

    assert!(target.post(300).await.is_none());
}

#[tokio::test]
async fn test_quote_resolves_only_earlier_posts() {
    let target = Arc::new(MemoryTarget::new());
    ImportRunner::new().run(&mut context(target.clone())).await.unwrap();

    let topic_id = target.post(100).await.unwrap().topic_id;
    let quoting = target.post(101).await.unwrap();
    assert!(quoting.raw.starts_with(&format!(
        "[quote=\"alice, id: 100, post:1, topic:{}\"]",
        topic_id
    )));

    // 103 was created after 102, so the marker stays as written.
    let forward = target.post(102).await.unwrap();
    assert!(forward.raw.contains("[quote=alice|103]"));
}

#[tokio::test]
async fn test_guest_attribution() {
    let target = Arc::new(MemoryTarget::new());
    ImportRunner::new().run(&mut context(target.clone())).await.unwrap();

    let guest = target.post(102).await.unwrap();
    assert_eq!(guest.user_id, GUEST_USER_ID);
    assert!(guest
        .raw
        .starts_with("Message posté en tant qu'invité par _Yeti_ :\n"));
}

#[tokio::test]
async fn test_document_topic_gets_generated_first_post() {
    let target = Arc::new(MemoryTarget::new());
    let mut ctx = context(target.clone());
    ImportRunner::new().run(&mut ctx).await.unwrap();

    let original = target.post(200).await.unwrap();
    let posts = target.topic_posts(original.topic_id).await;
    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![10_000_200, 200, 201]);

    let generated = &posts[0];
    assert_eq!(generated.user_id, GUEST_USER_ID);
    assert_eq!(generated.raw, "https://www.camptocamp.org/routes/123/fr");
    assert_eq!(posts[2].raw, "+1");

    assert_eq!(
        ctx.ids.resolve(EntityKind::Topic, 200).await.unwrap(),
        Some(10_000_200)
    );
}

#[tokio::test]
async fn test_second_run_creates_nothing() {
    let target = Arc::new(MemoryTarget::new());
    ImportRunner::new().run(&mut context(target.clone())).await.unwrap();
    let once = target.entity_counts().await;

    let report = ImportRunner::new()
        .run(&mut context(target.clone()))
        .await
        .unwrap();
    assert_eq!(report.total().created, 0);
    assert_eq!(target.entity_counts().await, once);
    assert_eq!(target.staff_actions().await.len(), 1);
}

#[tokio::test]
async fn test_imported_pages_are_skipped() {
    let target = Arc::new(MemoryTarget::new());
    ImportRunner::new()
        .run(&mut context(target.clone()).with_batch_size(2))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::channel(1000);
    let mut ctx = context(target.clone())
        .with_batch_size(2)
        .with_events(tx);
    ImportRunner::new()
        .only(&["users", "posts"])
        .unwrap()
        .run(&mut ctx)
        .await
        .unwrap();
    drop(ctx);

    let mut skipped_pages = Vec::new();
    let mut processed_pages = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            ImportEvent::PageSkipped { stage, offset, .. } => skipped_pages.push((stage, offset)),
            ImportEvent::PageDone { stage, offset, .. } => processed_pages.push((stage, offset)),
            _ => {}
        }
    }

    assert_eq!(
        skipped_pages,
        vec![("users", 0), ("posts", 0), ("posts", 2), ("posts", 4)]
    );
    // The page holding the orphaned reply is never fully mapped.
    assert_eq!(processed_pages, vec![("posts", 6)]);
}

#[tokio::test]
async fn test_remapping_is_fatal() {
    let target = Arc::new(MemoryTarget::new());
    target
        .record_import_id(EntityKind::Topic, 100, 555)
        .await
        .unwrap();

    let err = ImportRunner::new()
        .run(&mut context(target.clone()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ImportError::Identity(IdentityError::Conflict {
            kind: EntityKind::Topic,
            source_id: 100,
            existing: 555,
            attempted: 100,
        })
    ));
}

#[tokio::test]
async fn test_resume_after_post_mapped_without_topic() {
    let target = Arc::new(MemoryTarget::new());
    let mut ctx = context(target.clone());
    ImportRunner::new()
        .only(&["groups", "users", "categories"])
        .unwrap()
        .run(&mut ctx)
        .await
        .unwrap();

    // A run that stopped between the post mapping and the topic mapping.
    let alps = ctx.ids.resolve(EntityKind::Forum, ALPS).await.unwrap().unwrap();
    target
        .batch_create(vec![TargetDescriptor::Post(PostDescriptor {
            forced_id: 100,
            user_id: 2,
            raw: "Conditions?".to_string(),
            created_at: DateTime::from_timestamp(1_100, 0).unwrap(),
            placement: TopicPlacement::New {
                title: "Mont Blanc & co".to_string(),
                category_id: alps,
            },
        })])
        .await
        .unwrap();
    target
        .record_import_id(EntityKind::Post, 100, 100)
        .await
        .unwrap();

    let report = ImportRunner::new()
        .only(&["posts"])
        .unwrap()
        .run(&mut context(target.clone()))
        .await
        .unwrap();
    let posts = report.stage("posts").unwrap();
    // Only the reply whose topic never existed is orphaned.
    assert_eq!(posts.orphaned, 1);
    assert_eq!(posts.failed, 0);

    let topic_id = target.post(100).await.unwrap().topic_id;
    for id in [101, 102, 103] {
        assert_eq!(target.post(id).await.unwrap().topic_id, topic_id);
    }
    assert_eq!(
        target.lookup_import_id(EntityKind::Topic, 100).await.unwrap(),
        Some(100)
    );
}

#[tokio::test]
async fn test_synthetic_offset_below_max_post_id_is_rejected() {
    let target = Arc::new(MemoryTarget::new());
    let mut ctx = ImportContext::new(
        Arc::new(board()),
        target.clone(),
        MigrationRules {
            synthetic_post_id_offset: 150,
            ..rules()
        },
    );

    let err = ImportRunner::new()
        .only(&["posts"])
        .unwrap()
        .run(&mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::InvalidRules(_)));
    assert_eq!(target.entity_counts().await.posts, 0);
}

#[tokio::test]
async fn test_redirects() {
    let target = Arc::new(MemoryTarget::new());
    let mut ctx = context(target.clone());
    ImportRunner::new().run(&mut ctx).await.unwrap();

    let alps = ctx.ids.resolve(EntityKind::Forum, ALPS).await.unwrap().unwrap();
    let topic_id = target.post(100).await.unwrap().topic_id;
    assert_eq!(
        target.permalink("forums/viewforum.php?id=10").await,
        Some(PermalinkTarget::Category(alps))
    );
    assert_eq!(
        target.permalink("forums/viewtopic.php?id=1").await,
        Some(PermalinkTarget::Topic(topic_id))
    );
    assert_eq!(
        target.permalink("forums/viewtopic.php?pid=101").await,
        Some(PermalinkTarget::Post(101))
    );
    // Orphaned post: nothing to point at.
    assert_eq!(target.permalink("forums/viewtopic.php?pid=300").await, None);

    let created = target.entity_counts().await.permalinks;
    let again = ImportRunner::new()
        .only(&["redirects"])
        .unwrap()
        .run(&mut context(target.clone()))
        .await
        .unwrap();
    let stats = again.stage("redirects").unwrap();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.skipped, stats.scanned);
    assert_eq!(target.entity_counts().await.permalinks, created);
}

#[tokio::test]
async fn test_redirect_failure_is_counted() {
    let target = Arc::new(MemoryTarget::new());
    target.fail_permalink("forums/viewtopic.php?pid=103").await;

    let report = ImportRunner::new()
        .run(&mut context(target.clone()))
        .await
        .unwrap();
    assert_eq!(report.stage("redirects").unwrap().failed, 1);
    assert!(target
        .permalink("forums/viewtopic.php?pid=101")
        .await
        .is_some());
}

#[tokio::test]
async fn test_failed_post_does_not_stop_the_page() {
    let target = Arc::new(MemoryTarget::new());
    target.fail_post(101).await;

    let report = ImportRunner::new()
        .run(&mut context(target.clone()))
        .await
        .unwrap();
    let posts = report.stage("posts").unwrap();
    assert_eq!(posts.failed, 1);
    assert!(target.post(102).await.is_some());
    assert!(target.post(103).await.is_some());
}

#[tokio::test]
async fn test_bans_suspend_matching_users() {
    let target = Arc::new(MemoryTarget::new());
    ImportRunner::new().run(&mut context(target.clone())).await.unwrap();

    assert!(target.user(3).await.unwrap().suspended_till.is_some());
    assert!(target.user(2).await.unwrap().suspended_till.is_none());
}

#[tokio::test]
async fn test_topic_filter() {
    let target = Arc::new(MemoryTarget::new());
    let mut ctx = context(target.clone()).with_filter(PostFilter {
        topic_id: Some(2),
        ..PostFilter::default()
    });
    ImportRunner::new().run(&mut ctx).await.unwrap();

    assert!(target.post(100).await.is_none());
    assert!(target.post(200).await.is_some());
    assert!(target.post(201).await.is_some());
}

#[tokio::test]
async fn test_unreachable_target_aborts() {
    let target = Arc::new(MemoryTarget::new());
    target.set_offline(true).await;

    let err = ImportRunner::new()
        .run(&mut context(target.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Identity(IdentityError::Store(_))));
}

#[tokio::test]
async fn test_sqlite_target() {
    let dir = tempfile::tempdir().unwrap();
    let target = Arc::new(DieselTarget::from_path(&dir.path().join("forum.db")));
    target.init_schema().await.unwrap();

    let report = ImportRunner::new()
        .run(&mut context(target.clone()))
        .await
        .unwrap();
    assert_eq!(report.stage("posts").unwrap().created, 7);
    assert_eq!(target.count_imported(EntityKind::Post).await.unwrap(), 6);
    assert_eq!(target.count_imported(EntityKind::Topic).await.unwrap(), 2);

    let quoting = target.post_location(101).await.unwrap().unwrap();
    assert_eq!(quoting.post_number, 2);

    let again = ImportRunner::new()
        .run(&mut context(target.clone()))
        .await
        .unwrap();
    assert_eq!(again.total().created, 0);
    assert!(target
        .permalink_exists("forums/viewtopic.php?id=2")
        .await
        .unwrap());
}
