//! Shared fixtures for the integration tests: an in-memory forum with a few
//! users, one thread, and helpers that walk every page of a sort mode.

use std::sync::Arc;

use domains::{NewPost, Post, PostId, Result, Thread};
use services::{PostService, PostServiceConfig, RawPageParams};
use storage_adapters::MemoryStore;

pub const AUTHORS: [&str; 3] = ["j.sparrow", "h.barbossa", "w.turner"];
pub const FORUM_SLUG: &str = "pirates";
pub const THREAD_SLUG: &str = "black-pearl";

pub struct Forum {
    pub store: Arc<MemoryStore>,
    pub service: PostService,
    pub thread: Thread,
}

impl Forum {
    pub fn new() -> Self {
        Self::with_default_limit(PostServiceConfig::default().default_limit)
    }

    pub fn with_default_limit(default_limit: u32) -> Self {
        let store = Arc::new(MemoryStore::new());
        for author in AUTHORS {
            store.add_user(author);
        }
        store.add_forum(FORUM_SLUG, "Pirates", AUTHORS[0]);
        let thread = store.add_thread(Some(THREAD_SLUG), FORUM_SLUG, AUTHORS[0], "The Black Pearl");
        let service = PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            PostServiceConfig { default_limit },
        );
        Self {
            store,
            service,
            thread,
        }
    }

    /// Thread id as the transport layer would pass it.
    pub fn thread_key(&self) -> String {
        self.thread.id.to_string()
    }

    pub async fn create(&self, batch: Vec<NewPost>) -> Result<Vec<Post>> {
        self.service.create_posts(&self.thread_key(), batch).await
    }

    /// Creates one post and returns its id.
    pub async fn post(&self, parent: Option<PostId>, message: &str) -> PostId {
        let new = match parent {
            Some(parent) => NewPost::reply(AUTHORS[1], message, parent),
            None => NewPost::root(AUTHORS[0], message),
        };
        let created = self.create(vec![new]).await.expect("create post");
        created[0].id
    }

    /// Root A(1) with child B(2), root C(3) with child D(4).
    pub async fn abcd(&self) -> [PostId; 4] {
        let a = self.post(None, "A").await;
        let b = self.post(Some(a), "B").await;
        let c = self.post(None, "C").await;
        let d = self.post(Some(c), "D").await;
        [a, b, c, d]
    }

    pub async fn page(&self, params: &RawPageParams) -> Result<Vec<PostId>> {
        let page = self.service.get_sorted_posts(&self.thread_key(), params).await?;
        Ok(ids(&page.posts))
    }

    /// Follows `next_cursor` until an empty page, returning every page.
    pub async fn walk(&self, sort: &str, desc: bool, limit: u32) -> Result<Vec<Vec<PostId>>> {
        let pages = walk_pages(&self.service, &self.thread_key(), sort, desc, limit).await?;
        Ok(pages.iter().map(|page| ids(page)).collect())
    }

    /// Every post of the thread in one page.
    pub async fn everything(&self, sort: &str, desc: bool) -> Result<Vec<PostId>> {
        self.page(&RawPageParams::new(sort).desc(desc).limit(u32::MAX)).await
    }
}

impl Default for Forum {
    fn default() -> Self {
        Self::new()
    }
}

/// Pages through `thread` with `service`, following `next_cursor` until an
/// empty page.
pub async fn walk_pages(
    service: &PostService,
    thread: &str,
    sort: &str,
    desc: bool,
    limit: u32,
) -> Result<Vec<Vec<Post>>> {
    let mut params = RawPageParams::new(sort).desc(desc).limit(limit);
    let mut pages = Vec::new();
    loop {
        let page = service.get_sorted_posts(thread, &params).await?;
        let Some(cursor) = page.next_cursor else {
            return Ok(pages);
        };
        pages.push(page.posts);
        params = params.since(cursor);
    }
}

pub fn ids(posts: &[Post]) -> Vec<PostId> {
    posts.iter().map(|post| post.id).collect()
}
