//! # Ports
//!
//! Any storage adapter must implement these traits to back the post services.

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{Forum, NewPost, Post, PostId, Thread, ThreadId, User};
use crate::paging::PageQuery;

/// Persistence contract for posts and the ordered page queries over them.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Inserts a batch into `thread` atomically, assigning ids and paths.
    ///
    /// Fails with `NotFound` when the thread or an author is missing and with
    /// `Conflict` when a parent is not already stored in the thread. On any
    /// failure nothing from the batch is persisted.
    async fn create_posts(&self, thread: &Thread, batch: Vec<NewPost>) -> Result<Vec<Post>>;

    async fn get_post(&self, id: PostId) -> Result<Option<Post>>;

    /// Replaces the message when `message` is non-empty. Flags the post as
    /// edited only if the text actually changes. `None` if the post is missing.
    async fn update_message(&self, id: PostId, message: &str) -> Result<Option<Post>>;

    /// Returns one ordered page of the thread's posts.
    ///
    /// An empty result does not say whether the thread exists.
    async fn fetch_page(&self, thread_id: ThreadId, query: &PageQuery) -> Result<Vec<Post>>;
}

/// Read access to threads, which are created and edited elsewhere.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    async fn get_by_id(&self, id: ThreadId) -> Result<Option<Thread>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Thread>>;
    async fn exists(&self, id: ThreadId) -> Result<bool>;
}

/// Read access to user profiles, owned by the user service.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_nickname(&self, nickname: &str) -> Result<Option<User>>;
}

/// Read access to forums, owned by the forum service.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ForumRepository: Send + Sync {
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Forum>>;
}
