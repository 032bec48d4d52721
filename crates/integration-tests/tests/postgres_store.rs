//! Postgres-backed post engine.
//!
//! Each test starts its own Postgres container. When `FORUM_TEST_DATABASE_URL`
//! is set that database is used instead; every test works in its own forum
//! and thread there, so runs can share it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domains::{DomainError, NewPost, Post, PostId, PostUpdate, Thread};
use integration_tests::{walk_pages, Forum};
use proptest::prelude::*;
use proptest::strategy::ValueTree;
use proptest::test_runner::TestRunner;
use services::{PostService, PostServiceConfig, RawPageParams};
use storage_adapters::PostgresStore;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

const DATABASE_URL_VAR: &str = "FORUM_TEST_DATABASE_URL";
const AUTHOR: &str = "j.sparrow";

struct Fixture {
    store: Arc<PostgresStore>,
    service: Arc<PostService>,
    thread: Thread,
    // Dropping the handle stops the container.
    _node: Option<ContainerAsync<Postgres>>,
}

impl Fixture {
    async fn start(name: &str) -> anyhow::Result<Self> {
        let (url, node) = match std::env::var(DATABASE_URL_VAR) {
            Ok(url) => (url, None),
            Err(_) => {
                let node = Postgres::default().start().await?;
                let url = format!(
                    "postgres://postgres:postgres@{}:{}/postgres",
                    node.get_host().await?,
                    node.get_host_port_ipv4(5432).await?
                );
                (url, Some(node))
            }
        };

        let store = Arc::new(PostgresStore::connect(&url, 8, Duration::from_secs(10)).await?);
        store.migrate().await?;

        let slug = format!("{name}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
        store.create_user(AUTHOR).await?;
        store.create_forum(&slug, "Tests", AUTHOR).await?;
        let thread = store.create_thread(Some(slug.as_str()), &slug, AUTHOR, name).await?;

        let service = Arc::new(PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            PostServiceConfig::default(),
        ));
        Ok(Self {
            store,
            service,
            thread,
            _node: node,
        })
    }

    fn thread_key(&self) -> String {
        self.thread.id.to_string()
    }

    async fn create(&self, batch: Vec<NewPost>) -> domains::Result<Vec<PostId>> {
        let created = self.service.create_posts(&self.thread_key(), batch).await?;
        Ok(created.iter().map(|post| post.id).collect())
    }

    async fn page(&self, params: RawPageParams) -> anyhow::Result<Vec<PostId>> {
        let page = self
            .service
            .get_sorted_posts(&self.thread_key(), &params)
            .await?;
        Ok(page.posts.iter().map(|post| post.id).collect())
    }

    /// Root A with child B, root C with child D.
    async fn abcd(&self) -> anyhow::Result<[PostId; 4]> {
        let a = self.create(vec![NewPost::root(AUTHOR, "A")]).await?[0];
        let b = self.create(vec![NewPost::reply(AUTHOR, "B", a)]).await?[0];
        let c = self.create(vec![NewPost::root(AUTHOR, "C")]).await?[0];
        let d = self.create(vec![NewPost::reply(AUTHOR, "D", c)]).await?[0];
        Ok([a, b, c, d])
    }

    async fn everything(&self, sort: &str) -> anyhow::Result<Vec<Post>> {
        let page = self
            .service
            .get_sorted_posts(&self.thread_key(), &RawPageParams::new(sort).limit(10_000))
            .await?;
        Ok(page.posts)
    }
}

fn messages(pages: Vec<Vec<Post>>) -> Vec<Vec<String>> {
    pages
        .into_iter()
        .map(|page| page.into_iter().map(|post| post.message).collect())
        .collect()
}

#[tokio::test]
async fn sort_modes_follow_reply_forest() -> anyhow::Result<()> {
    let fx = Fixture::start("sort-modes").await?;
    let [a, b, c, d] = fx.abcd().await?;

    assert_eq!(fx.page(RawPageParams::new("flat").limit(10)).await?, vec![a, b, c, d]);
    assert_eq!(
        fx.page(RawPageParams::new("flat").limit(10).desc(true)).await?,
        vec![d, c, b, a]
    );
    assert_eq!(fx.page(RawPageParams::new("tree").limit(10)).await?, vec![a, b, c, d]);
    assert_eq!(
        fx.page(RawPageParams::new("tree").limit(10).desc(true)).await?,
        vec![d, c, b, a]
    );
    assert_eq!(fx.page(RawPageParams::new("parent_tree").limit(1)).await?, vec![a, b]);
    assert_eq!(
        fx.page(RawPageParams::new("parent_tree").limit(1).since(a)).await?,
        vec![c, d]
    );
    assert_eq!(
        fx.page(RawPageParams::new("parent_tree").limit(5).desc(true)).await?,
        vec![c, d, a, b]
    );
    Ok(())
}

#[tokio::test]
async fn cursors_continue_where_the_last_page_ended() -> anyhow::Result<()> {
    let fx = Fixture::start("cursors").await?;
    let [a, b, c, d] = fx.abcd().await?;

    assert_eq!(fx.page(RawPageParams::new("tree").limit(2).since(b)).await?, vec![c, d]);
    assert_eq!(
        fx.page(RawPageParams::new("tree").limit(2).since(c).desc(true)).await?,
        vec![b, a]
    );
    assert_eq!(fx.page(RawPageParams::new("flat").limit(2).since(b)).await?, vec![c, d]);
    assert!(fx
        .page(RawPageParams::new("tree").limit(2).since(i64::MAX))
        .await?
        .is_empty());
    assert!(fx.page(RawPageParams::new("tree").limit(0)).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_batch_leaves_no_posts() -> anyhow::Result<()> {
    let fx = Fixture::start("atomic-batch").await?;
    let a = fx.create(vec![NewPost::root(AUTHOR, "A")]).await?[0];

    let err = fx
        .create(vec![
            NewPost::reply(AUTHOR, "ok", a),
            NewPost::reply(AUTHOR, "dangling", i64::MAX),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)), "{err}");

    let err = fx
        .create(vec![NewPost::root("nobody-by-that-name", "who?")])
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)), "{err}");

    assert_eq!(fx.page(RawPageParams::new("flat").limit(10)).await?, vec![a]);
    Ok(())
}

#[tokio::test]
async fn message_update_and_details() -> anyhow::Result<()> {
    let fx = Fixture::start("message-update").await?;
    let a = fx.create(vec![NewPost::root(AUTHOR, "A")]).await?[0];

    let same = fx.service.update_post(a, PostUpdate { message: "A".into() }).await?;
    assert!(!same.is_edited);

    let changed = fx
        .service
        .update_post(a, PostUpdate { message: "A2".into() })
        .await?;
    assert!(changed.is_edited);
    assert_eq!(changed.message, "A2");

    let details = fx.service.get_post_details(a, "user,forum,thread").await?;
    assert_eq!(details.post.path.as_slice(), &[a]);
    assert_eq!(details.author.map(|user| user.nickname).as_deref(), Some(AUTHOR));
    assert_eq!(details.forum.map(|forum| forum.slug), Some(fx.thread.forum.clone()));
    assert_eq!(details.thread.map(|thread| thread.id), Some(fx.thread.id));
    assert!(fx.store.pool().size() > 0);
    Ok(())
}

#[tokio::test]
async fn pages_match_memory_store_on_random_forest() -> anyhow::Result<()> {
    let fx = Fixture::start("parity").await?;
    let memory = Forum::new();

    let mut runner = TestRunner::deterministic();
    let shape = prop::collection::vec(prop::option::weighted(0.7, any::<usize>()), 60)
        .new_tree(&mut runner)
        .map_err(|reason| anyhow::anyhow!("generating forest shape: {reason:?}"))?
        .current();

    // Same forest in both stores, one post per batch, matched by message.
    let mut pg_ids: Vec<PostId> = Vec::with_capacity(shape.len());
    let mut memory_ids: Vec<PostId> = Vec::with_capacity(shape.len());
    for (n, choice) in shape.iter().enumerate() {
        let parent = match choice {
            Some(pick) if n > 0 => Some(pick % n),
            _ => None,
        };
        let message = format!("post {n}");
        let new = match parent {
            Some(i) => NewPost::reply(AUTHOR, message.as_str(), pg_ids[i]),
            None => NewPost::root(AUTHOR, message.as_str()),
        };
        pg_ids.push(fx.create(vec![new]).await?[0]);
        memory_ids.push(memory.post(parent.map(|i| memory_ids[i]), &message).await);
    }

    for sort in ["flat", "tree", "parent_tree"] {
        for desc in [false, true] {
            for limit in [1, 3, 7] {
                let pg = walk_pages(&fx.service, &fx.thread_key(), sort, desc, limit).await?;
                let mem =
                    walk_pages(&memory.service, &memory.thread_key(), sort, desc, limit).await?;
                assert_eq!(
                    messages(pg),
                    messages(mem),
                    "{sort} desc={desc} limit={limit}"
                );
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn concurrent_batches_on_one_thread_keep_forest_valid() -> anyhow::Result<()> {
    let fx = Fixture::start("concurrent").await?;
    let root = fx.create(vec![NewPost::root(AUTHOR, "root")]).await?[0];

    let mut handles = Vec::new();
    for n in 0..16 {
        let service = fx.service.clone();
        let thread = fx.thread_key();
        handles.push(tokio::spawn(async move {
            service
                .create_posts(
                    &thread,
                    vec![
                        NewPost::reply(AUTHOR, format!("reply {n}"), root),
                        NewPost::root(AUTHOR, format!("root {n}")),
                    ],
                )
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let posts = fx.everything("flat").await?;
    assert_eq!(posts.len(), 33);

    let by_id: HashMap<PostId, &Post> = posts.iter().map(|post| (post.id, post)).collect();
    let paths: HashSet<_> = posts.iter().map(|post| post.path.clone()).collect();
    assert_eq!(paths.len(), posts.len());
    for post in &posts {
        match post.parent {
            None => assert_eq!(post.path.as_slice(), &[post.id]),
            Some(parent) => assert_eq!(post.path, by_id[&parent].path.child(post.id)),
        }
    }

    let mut sorted: Vec<_> = posts.iter().map(|post| post.path.clone()).collect();
    sorted.sort();
    let tree: Vec<_> = fx.everything("tree").await?.into_iter().map(|post| post.path).collect();
    assert_eq!(tree, sorted);

    let first_root = fx.page(RawPageParams::new("parent_tree").limit(1)).await?;
    assert_eq!(first_root.len(), 17);
    assert_eq!(first_root[0], root);
    Ok(())
}
