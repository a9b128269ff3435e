use forumdb_core::{NewComment, NewPost};

use super::*;

fn dump_post(reddit_id: &str, score: i32, comments: &[&str]) -> DumpPost {
    DumpPost {
        post: NewPost {
            score: Some(score),
            ..NewPost::new(reddit_id, format!("Post {reddit_id}"))
        },
        comments: comments.iter().map(|c| NewComment::new(*c)).collect(),
    }
}

fn dump(posts: Vec<DumpPost>) -> CollectionDump {
    CollectionDump {
        community: None,
        posts,
    }
}

#[test]
fn prepare_posts_merges_repeated_posts() {
    let prepared = prepare_posts(vec![
        dump_post("abc123", 10, &["c1", "c2"]),
        dump_post("def456", 1, &[]),
        dump_post("abc123", 42, &["c2", "c3"]),
    ]);

    assert_eq!(prepared.posts.len(), 2);
    assert_eq!(prepared.posts[0].post.reddit_id, "abc123");
    assert_eq!(prepared.posts[0].post.score, Some(42));
    let ids: Vec<&str> = prepared.posts[0]
        .comments
        .iter()
        .map(|c| c.reddit_id.as_str())
        .collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
    assert_eq!(prepared.skipped_posts, 0);
    assert_eq!(prepared.skipped_comments, 0);
}

#[test]
fn prepare_posts_drops_invalid_records() {
    let mut bad_post = dump_post("bad", 1, &["x1", "x2"]);
    bad_post.post.title = "   ".to_string();
    let mut good = dump_post("good", 1, &["ok"]);
    good.comments.push(NewComment::new("c".repeat(21)));

    let prepared = prepare_posts(vec![bad_post, good]);

    assert_eq!(prepared.posts.len(), 1);
    assert_eq!(prepared.posts[0].comments.len(), 1);
    assert_eq!(prepared.skipped_posts, 1);
    assert_eq!(prepared.skipped_comments, 3);
}

#[test]
fn prepare_posts_keeps_valid_listing_when_repeat_is_invalid() {
    let mut broken_repeat = dump_post("abc123", 99, &["c9"]);
    broken_repeat.post.title = String::new();

    let prepared = prepare_posts(vec![dump_post("abc123", 10, &["c1", "c2"]), broken_repeat]);

    assert_eq!(prepared.posts.len(), 1);
    assert_eq!(prepared.posts[0].post.score, Some(10));
    assert_eq!(prepared.posts[0].comments.len(), 2);
    assert_eq!(prepared.skipped_posts, 1);
    assert_eq!(prepared.skipped_comments, 1);
}

#[test]
fn prepare_posts_counts_every_invalid_listing() {
    let prepared = prepare_posts(vec![
        dump_post("", 1, &["a"]),
        dump_post("", 2, &["b", "c"]),
        dump_post("ok", 3, &[]),
    ]);

    assert_eq!(prepared.posts.len(), 1);
    assert_eq!(prepared.skipped_posts, 2);
    assert_eq!(prepared.skipped_comments, 3);
}

#[test]
fn prepare_posts_rewrites_fullname_parents() {
    let mut post = dump_post("abc123", 1, &[]);
    post.comments = vec![
        NewComment {
            parent_reddit_id: Some("t3_abc123".to_string()),
            ..NewComment::new("c1")
        },
        NewComment {
            parent_reddit_id: Some("t1_c1".to_string()),
            depth: 1,
            ..NewComment::new("c2")
        },
    ];

    let prepared = prepare_posts(vec![post]);

    let parents: Vec<Option<&str>> = prepared.posts[0]
        .comments
        .iter()
        .map(|c| c.parent_reddit_id.as_deref())
        .collect();
    assert_eq!(parents, vec![None, Some("c1")]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_dump_writes_a_completed_run(pool: sqlx::PgPool) {
    let summary = ingest_dump(
        &pool,
        2,
        "r/GoLang",
        dump(vec![
            dump_post("abc123", 10, &["c1", "c1"]),
            dump_post("def456", 5, &["c2"]),
            dump_post("abc123", 42, &[]),
        ]),
        false,
    )
    .await
    .expect("ingest_dump should succeed");

    assert_eq!(summary.community, "golang");
    assert_eq!(summary.posts, 2);
    assert_eq!(summary.comments, 2);

    let run = forumdb_db::get_collection_run(&pool, summary.run_id)
        .await
        .expect("run should exist");
    assert_eq!(run.status, "completed");
    assert_eq!(run.posts_collected, 2);
    assert_eq!(run.comments_collected, 2);

    let post = forumdb_db::get_post_by_reddit_id(&pool, summary.run_id, "abc123")
        .await
        .expect("lookup failed")
        .expect("abc123 should be stored");
    assert_eq!(post.score, Some(42));
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_dump_refuses_second_running_run_without_force(pool: sqlx::PgPool) {
    let (community, _) =
        forumdb_db::upsert_community(&pool, &forumdb_core::NewCommunity::new("golang"))
            .await
            .expect("community insert failed");
    let open = forumdb_db::begin_run(&pool, community.id)
        .await
        .expect("begin_run failed");

    let err = ingest_dump(&pool, 1, "golang", dump(vec![]), false)
        .await
        .expect_err("expected refusal while a run is open");
    let msg = format!("{err}");
    assert!(msg.contains("in progress"), "got: {msg}");

    let summary = ingest_dump(&pool, 1, "golang", dump(vec![dump_post("a1", 1, &[])]), true)
        .await
        .expect("forced ingest should succeed");
    assert_ne!(summary.run_id, open.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_dump_rejects_dump_from_another_community(pool: sqlx::PgPool) {
    let mut foreign = dump(vec![dump_post("a1", 1, &[])]);
    foreign.community = Some(forumdb_core::NewCommunity::new("rust"));

    let err = ingest_dump(&pool, 1, "golang", foreign, false)
        .await
        .expect_err("mismatched community should fail");
    let msg = format!("{err}");
    assert!(msg.contains("'rust'"), "got: {msg}");

    assert!(forumdb_db::get_community_by_name(&pool, "golang")
        .await
        .expect("lookup failed")
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_dump_marks_run_failed_on_write_error(pool: sqlx::PgPool) {
    // Postgres rejects NUL bytes in text columns; validation lets them through.
    let mut poisoned = dump_post("bad1", 1, &[]);
    poisoned.post.title = "broken\u{0}title".to_string();

    let err = ingest_dump(
        &pool,
        1,
        "golang",
        dump(vec![dump_post("a1", 1, &["c1"]), poisoned]),
        false,
    )
    .await
    .expect_err("a rejected write should fail the ingest");

    let community = forumdb_db::get_community_by_name(&pool, "golang")
        .await
        .expect("lookup failed")
        .expect("community is created before the run");
    let run = forumdb_db::get_latest_collection_run(&pool, community.id)
        .await
        .expect("lookup failed")
        .expect("the run should exist");
    assert_eq!(run.status, "failed");
    assert!(run.completed_at.is_some());
    assert_eq!(run.error_message, Some(format!("{err:#}")));

    let post = forumdb_db::get_post_by_reddit_id(&pool, run.id, "bad1")
        .await
        .expect("lookup failed");
    assert!(post.is_none(), "the rejected post is not stored");
}
