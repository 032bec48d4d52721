//! # PostService
//!
//! Coordinates the thread lookup, the sort selector, the cursor codec and the
//! post store. Holds no state of its own beyond the shared repositories.
//! Users and forums are only read, to decorate post lookups.

use std::sync::Arc;

use domains::{
    DomainError, ForumRepository, NewPost, Post, PostDetails, PostId, PostPage, PostRepository,
    PostUpdate, Related, Result, Thread, ThreadRef, ThreadRepository, UserRepository,
};
use tracing::{debug, info, instrument, warn};

use crate::cursor;
use crate::sort_selector::{RawPageParams, SortSelector};

#[derive(Debug, Clone, Copy)]
pub struct PostServiceConfig {
    /// Page size used when the request has no `limit`
    pub default_limit: u32,
}

impl Default for PostServiceConfig {
    fn default() -> Self {
        Self { default_limit: 1 }
    }
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    threads: Arc<dyn ThreadRepository>,
    users: Arc<dyn UserRepository>,
    forums: Arc<dyn ForumRepository>,
    selector: SortSelector,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        threads: Arc<dyn ThreadRepository>,
        users: Arc<dyn UserRepository>,
        forums: Arc<dyn ForumRepository>,
        config: PostServiceConfig,
    ) -> Self {
        Self {
            posts,
            threads,
            users,
            forums,
            selector: SortSelector::new(config.default_limit),
        }
    }

    /// Returns the next page of a thread's posts in the requested order.
    ///
    /// Parameters are validated before the thread is touched, so a malformed
    /// `limit` is reported as `Invalid` even for an unknown thread.
    #[instrument(skip(self, params), fields(sort = ?params.sort))]
    pub async fn get_sorted_posts(&self, thread: &str, params: &RawPageParams) -> Result<PostPage> {
        let query = self.selector.select(params)?;

        let (thread_id, known_to_exist) = match ThreadRef::parse(thread) {
            ThreadRef::Id(id) => (id, false),
            slug @ ThreadRef::Slug(_) => (self.resolve(&slug).await?.id, true),
        };

        debug!(thread_id, mode = %query.mode(), ?query, "fetching post page");
        let posts = self.posts.fetch_page(thread_id, &query).await?;

        // An empty page is ambiguous: the store does not know whether the thread exists.
        if posts.is_empty() && !known_to_exist && !self.threads.exists(thread_id).await? {
            return Err(DomainError::not_found(format!("thread {thread_id}")));
        }

        let next_cursor = cursor::encode(query.mode(), &posts);
        Ok(PostPage { posts, next_cursor })
    }

    /// Creates a batch of posts in one thread. All or nothing.
    #[instrument(skip(self, batch), fields(batch_len = batch.len()))]
    pub async fn create_posts(&self, thread: &str, batch: Vec<NewPost>) -> Result<Vec<Post>> {
        let thread = self.resolve(&ThreadRef::parse(thread)).await?;

        if batch.is_empty() {
            return Ok(Vec::new());
        }
        batch.iter().try_for_each(NewPost::validate)?;

        match self.posts.create_posts(&thread, batch).await {
            Ok(created) => {
                info!(thread_id = thread.id, created = created.len(), "posts created");
                Ok(created)
            }
            Err(err) => {
                warn!(thread_id = thread.id, error = %err, "post batch rejected");
                Err(err)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get_post(&self, id: PostId) -> Result<Post> {
        self.posts
            .get_post(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("post {id}")))
    }

    /// Returns a post with the entities named in `related` (comma separated
    /// `user`, `forum`, `thread`) attached.
    ///
    /// The list is parsed before any lookup. A named entity that does not
    /// exist fails the whole request with `NotFound`.
    #[instrument(skip(self))]
    pub async fn get_post_details(&self, id: PostId, related: &str) -> Result<PostDetails> {
        let related = Related::parse_list(related)?;
        let mut details = PostDetails::new(self.get_post(id).await?);

        for entity in related {
            match entity {
                Related::User => {
                    let nickname = &details.post.author;
                    let user = self.users.get_by_nickname(nickname).await?;
                    let user =
                        user.ok_or_else(|| DomainError::not_found(format!("user '{nickname}'")))?;
                    details.author = Some(user);
                }
                Related::Forum => {
                    let slug = &details.post.forum_slug;
                    let forum = self.forums.get_by_slug(slug).await?;
                    let forum =
                        forum.ok_or_else(|| DomainError::not_found(format!("forum '{slug}'")))?;
                    details.forum = Some(forum);
                }
                Related::Thread => {
                    let thread = self.resolve(&ThreadRef::Id(details.post.thread_id)).await?;
                    details.thread = Some(thread);
                }
            }
        }
        debug!(post_id = id, "post details resolved");

        Ok(details)
    }

    #[instrument(skip(self, update))]
    pub async fn update_post(&self, id: PostId, update: PostUpdate) -> Result<Post> {
        self.posts
            .update_message(id, &update.message)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("post {id}")))
    }

    pub async fn get_thread(&self, thread: &str) -> Result<Thread> {
        self.resolve(&ThreadRef::parse(thread)).await
    }

    async fn resolve(&self, thread: &ThreadRef) -> Result<Thread> {
        let found = match thread {
            ThreadRef::Id(id) => self.threads.get_by_id(*id).await?,
            ThreadRef::Slug(slug) => self.threads.get_by_slug(slug).await?,
        };
        found.ok_or_else(|| DomainError::not_found(thread.to_string()))
    }
}
