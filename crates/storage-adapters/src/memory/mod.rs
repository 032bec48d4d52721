//! # MemoryStore
//!
//! In-process implementation of `PostRepository` and `ThreadRepository`.
//!
//! Each thread's posts live behind their own `DashMap` entry. A batch insert
//! holds that entry for its whole duration, so writers on one thread are
//! serialised and readers never see half a batch, while other threads are
//! unaffected.
//!
//! # Lock order
//! `posts` may be held while touching `post_threads`, never the reverse.
//! Lookups through `post_threads` and `thread_slugs` copy the id out before
//! reading `posts` or `threads`.

mod forest;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use domains::{
    DomainError, Forum, ForumRepository, NewPost, PageQuery, PageShape, PathAssigner, Post,
    PostId, PostPath, PostRepository, Result, Thread, ThreadId, ThreadRepository, User,
    UserRepository,
};
use tracing::debug;

use forest::ThreadForest;

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    forums: DashMap<String, Forum>,
    threads: DashMap<ThreadId, Thread>,
    /// Lowercased slug to thread id
    thread_slugs: DashMap<String, ThreadId>,
    posts: DashMap<ThreadId, ThreadForest>,
    post_threads: DashMap<PostId, ThreadId>,
    next_thread_id: AtomicI32,
    next_post_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an author with an otherwise blank profile. Users are managed
    /// elsewhere; the store mostly needs to know which nicknames exist.
    pub fn add_user(&self, nickname: impl Into<String>) {
        let nickname = nickname.into();
        self.users.insert(
            nickname.clone(),
            User {
                email: format!("{nickname}@forum.local"),
                fullname: nickname.clone(),
                about: String::new(),
                nickname,
            },
        );
    }

    pub fn add_forum(&self, slug: &str, title: &str, owner: &str) -> Forum {
        let forum = Forum {
            slug: slug.to_string(),
            title: title.to_string(),
            user: owner.to_string(),
        };
        self.forums.insert(forum.slug.clone(), forum.clone());
        forum
    }

    /// Creates a thread and returns it with its assigned id.
    pub fn add_thread(&self, slug: Option<&str>, forum: &str, author: &str, title: &str) -> Thread {
        let thread = Thread {
            id: self.next_thread_id.fetch_add(1, Ordering::SeqCst) + 1,
            slug: slug.map(str::to_string),
            forum: forum.to_string(),
            author: author.to_string(),
            title: title.to_string(),
            message: String::new(),
            votes: 0,
            created: Utc::now(),
        };
        if let Some(slug) = &thread.slug {
            self.thread_slugs.insert(slug.to_lowercase(), thread.id);
        }
        self.threads.insert(thread.id, thread.clone());
        thread
    }

    /// Full data wipe. Id sequences keep counting.
    pub fn clear(&self) {
        self.posts.clear();
        self.post_threads.clear();
        self.thread_slugs.clear();
        self.threads.clear();
        self.forums.clear();
        self.users.clear();
    }

    fn thread_of(&self, post: PostId) -> Option<ThreadId> {
        self.post_threads.get(&post).map(|entry| *entry.value())
    }

    fn path_of(&self, post: PostId) -> Option<PostPath> {
        let thread_id = self.thread_of(post)?;
        self.posts.get(&thread_id)?.path_of(post).cloned()
    }

    fn reserve_ids(&self, count: usize) -> Vec<PostId> {
        (0..count)
            .map(|_| self.next_post_id.fetch_add(1, Ordering::SeqCst) + 1)
            .collect()
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn create_posts(&self, thread: &Thread, batch: Vec<NewPost>) -> Result<Vec<Post>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        if !self.threads.contains_key(&thread.id) {
            return Err(DomainError::not_found(format!("thread {}", thread.id)));
        }
        if let Some(unknown) = batch.iter().find(|post| !self.users.contains_key(&post.author)) {
            return Err(DomainError::not_found(format!("author '{}'", unknown.author)));
        }

        let mut forest = self.posts.entry(thread.id).or_default();

        let parents: HashMap<PostId, PostPath> = PathAssigner::required_parents(&batch)
            .into_iter()
            .filter_map(|id| forest.path_of(id).map(|path| (id, path.clone())))
            .collect();
        let ids = self.reserve_ids(batch.len());
        let created = PathAssigner::new(&parents).assign(thread, batch, &ids, Utc::now())?;

        for post in &created {
            forest.insert(post.clone());
            self.post_threads.insert(post.id, post.thread_id);
        }
        debug!(thread_id = thread.id, count = created.len(), "stored post batch");

        Ok(created)
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        let Some(thread_id) = self.thread_of(id) else {
            return Ok(None);
        };
        Ok(self
            .posts
            .get(&thread_id)
            .and_then(|forest| forest.get(id).cloned()))
    }

    async fn update_message(&self, id: PostId, message: &str) -> Result<Option<Post>> {
        let Some(thread_id) = self.thread_of(id) else {
            return Ok(None);
        };
        let Some(mut forest) = self.posts.get_mut(&thread_id) else {
            return Ok(None);
        };
        let Some(post) = forest.get_mut(id) else {
            return Ok(None);
        };

        if !message.is_empty() && message != post.message {
            post.message = message.to_string();
            post.is_edited = true;
        }
        Ok(Some(post.clone()))
    }

    async fn fetch_page(&self, thread_id: ThreadId, query: &PageQuery) -> Result<Vec<Post>> {
        let limit = query.limit as usize;

        // Resolved before the thread's entry is read; see the lock order above.
        let tree_after = match query.shape {
            PageShape::Tree { after_post: Some(id) } => match self.path_of(id) {
                Some(path) => Some(path),
                // Nothing compares against a missing path.
                None => return Ok(Vec::new()),
            },
            _ => None,
        };

        let Some(forest) = self.posts.get(&thread_id) else {
            return Ok(Vec::new());
        };

        Ok(match query.shape {
            PageShape::Flat { after_id } => forest.flat(after_id, query.direction, limit),
            PageShape::Tree { .. } => forest.tree(tree_after.as_ref(), query.direction, limit),
            PageShape::ParentTree { after_root } => {
                forest.parent_tree(after_root, query.direction, limit)
            }
        })
    }
}

#[async_trait]
impl ThreadRepository for MemoryStore {
    async fn get_by_id(&self, id: ThreadId) -> Result<Option<Thread>> {
        Ok(self.threads.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Thread>> {
        let Some(id) = self.thread_slugs.get(&slug.to_lowercase()).map(|entry| *entry.value())
        else {
            return Ok(None);
        };
        Ok(self.threads.get(&id).map(|entry| entry.value().clone()))
    }

    async fn exists(&self, id: ThreadId) -> Result<bool> {
        Ok(self.threads.contains_key(&id))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_by_nickname(&self, nickname: &str) -> Result<Option<User>> {
        Ok(self.users.get(nickname).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl ForumRepository for MemoryStore {
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Forum>> {
        Ok(self.forums.get(slug).map(|entry| entry.value().clone()))
    }
}
