//! # PostgresStore
//!
//! This module implements the data mapping between the Postgres relational
//! model and the `domains` models. Reply paths are stored as `BIGINT[]`,
//! whose built-in ordering is the same lexicographic order as `PostPath`.

mod statements;

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use domains::{
    DomainError, Forum, ForumRepository, NewPost, PageQuery, PathAssigner, Post, PostId, PostPath,
    PostRepository, Result, Thread, ThreadId, ThreadRepository, User, UserRepository,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::debug;

const FOREIGN_KEY_VIOLATION: &str = "23503";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .context("connecting to postgres")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .context("running migrations")?;
        Ok(())
    }

    // Users, forums and threads belong to other services. These inserts exist
    // so seeding and tests can build the rows posts reference.

    pub async fn create_user(&self, nickname: &str) -> Result<()> {
        sqlx::query("INSERT INTO users (nickname) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(nickname)
            .execute(&self.pool)
            .await
            .context("inserting user")?;
        Ok(())
    }

    pub async fn create_forum(&self, slug: &str, title: &str, owner: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO forums (slug, title, owner_nickname) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(slug)
        .bind(title)
        .bind(owner)
        .execute(&self.pool)
        .await
        .context("inserting forum")?;
        Ok(())
    }

    pub async fn create_thread(
        &self,
        slug: Option<&str>,
        forum: &str,
        author: &str,
        title: &str,
    ) -> Result<Thread> {
        let row = sqlx::query(&format!(
            "INSERT INTO threads (slug, forum_slug, author_nickname, title) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            statements::THREAD_COLUMNS
        ))
        .bind(slug)
        .bind(forum)
        .bind(author)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .context("inserting thread")?;

        Ok(thread_from_row(&row).context("decoding thread row")?)
    }

    /// Full data wipe, ids restart from 1.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("TRUNCATE posts, threads, forums, users RESTART IDENTITY CASCADE")
            .execute(&self.pool)
            .await
            .context("truncating tables")?;
        Ok(())
    }
}

#[async_trait]
impl PostRepository for PostgresStore {
    /// Inserts the whole batch in one transaction.
    ///
    /// # Developer Note
    /// The thread row is locked first, which serialises batches on the same
    /// thread and pins the set of parents the assigner sees. Every early
    /// return drops `tx`, and sqlx rolls back a dropped transaction.
    async fn create_posts(&self, thread: &Thread, batch: Vec<NewPost>) -> Result<Vec<Post>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("beginning post batch transaction")?;

        // 1. Lock the thread
        let locked: Option<ThreadId> = sqlx::query_scalar(statements::LOCK_THREAD)
            .bind(thread.id)
            .fetch_optional(&mut *tx)
            .await
            .context("locking thread")?;
        if locked.is_none() {
            return Err(DomainError::not_found(format!("thread {}", thread.id)));
        }

        // 2. Load the paths of every referenced parent that lives in this thread
        let wanted = PathAssigner::required_parents(&batch);
        let mut parents = HashMap::with_capacity(wanted.len());
        if !wanted.is_empty() {
            let rows = sqlx::query(statements::SELECT_PARENT_PATHS)
                .bind(thread.id)
                .bind(&wanted)
                .fetch_all(&mut *tx)
                .await
                .context("loading parent paths")?;
            for row in rows {
                let id: PostId = row.try_get("id").context("decoding parent id")?;
                let path: Vec<PostId> = row.try_get("path").context("decoding parent path")?;
                parents.insert(id, PostPath::try_from(path)?);
            }
        }

        // 3. Reserve ids and assign paths
        let mut ids: Vec<PostId> = sqlx::query_scalar(statements::RESERVE_POST_IDS)
            .bind(batch.len() as i32)
            .fetch_all(&mut *tx)
            .await
            .context("reserving post ids")?;
        ids.sort_unstable();
        let posts = PathAssigner::new(&parents).assign(thread, batch, &ids, Utc::now())?;

        // 4. Insert
        {
            let mut insert = QueryBuilder::<Postgres>::new(statements::INSERT_POSTS);
            insert.push_values(&posts, |mut row, post| {
                row.push_bind(post.id)
                    .push_bind(post.thread_id)
                    .push_bind(&post.forum_slug)
                    .push_bind(&post.author)
                    .push_bind(post.parent)
                    .push_bind(&post.message)
                    .push_bind(post.created)
                    .push_bind(post.is_edited)
                    .push_bind(post.path.as_slice());
            });
            insert
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|err| insert_error(err, thread))?;
        }

        tx.commit().await.context("committing post batch")?;
        debug!(thread_id = thread.id, count = posts.len(), "stored post batch");

        Ok(posts)
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        let row = sqlx::query(&statements::select_post())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("fetching post {id}"))?;

        row.as_ref()
            .map(post_from_row)
            .transpose()
            .context("decoding post row")
            .map_err(DomainError::from)
    }

    async fn update_message(&self, id: PostId, message: &str) -> Result<Option<Post>> {
        let row = sqlx::query(&statements::update_post_message())
            .bind(id)
            .bind(message)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("updating post {id}"))?;

        row.as_ref()
            .map(post_from_row)
            .transpose()
            .context("decoding post row")
            .map_err(DomainError::from)
    }

    async fn fetch_page(&self, thread_id: ThreadId, query: &PageQuery) -> Result<Vec<Post>> {
        let mut statement = statements::page_query(thread_id, query);
        debug!(thread_id, sql = statement.sql(), "fetching post page");

        let rows = statement
            .build()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("fetching {} page of thread {thread_id}", query.mode()))?;

        rows.iter()
            .map(post_from_row)
            .collect::<anyhow::Result<Vec<_>>>()
            .context("decoding post rows")
            .map_err(DomainError::from)
    }
}

#[async_trait]
impl ThreadRepository for PostgresStore {
    async fn get_by_id(&self, id: ThreadId) -> Result<Option<Thread>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM threads WHERE id = $1",
            statements::THREAD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("fetching thread {id}"))?;

        row.as_ref()
            .map(thread_from_row)
            .transpose()
            .context("decoding thread row")
            .map_err(DomainError::from)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Thread>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM threads WHERE lower(slug) = lower($1)",
            statements::THREAD_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("fetching thread '{slug}'"))?;

        row.as_ref()
            .map(thread_from_row)
            .transpose()
            .context("decoding thread row")
            .map_err(DomainError::from)
    }

    async fn exists(&self, id: ThreadId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM threads WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("checking thread {id}"))?;
        Ok(exists)
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    async fn get_by_nickname(&self, nickname: &str) -> Result<Option<User>> {
        let row = sqlx::query(statements::SELECT_USER)
            .bind(nickname)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("fetching user '{nickname}'"))?;

        row.as_ref()
            .map(|row| -> anyhow::Result<User> {
                Ok(User {
                    nickname: row.try_get("nickname")?,
                    fullname: row.try_get("fullname")?,
                    about: row.try_get("about")?,
                    email: row.try_get("email")?,
                })
            })
            .transpose()
            .context("decoding user row")
            .map_err(DomainError::from)
    }
}

#[async_trait]
impl ForumRepository for PostgresStore {
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Forum>> {
        let row = sqlx::query(statements::SELECT_FORUM)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("fetching forum '{slug}'"))?;

        row.as_ref()
            .map(|row| -> anyhow::Result<Forum> {
                Ok(Forum {
                    slug: row.try_get("slug")?,
                    title: row.try_get("title")?,
                    user: row.try_get("owner_nickname")?,
                })
            })
            .transpose()
            .context("decoding forum row")
            .map_err(DomainError::from)
    }
}

/// A foreign key failure on insert means the author (or the thread, deleted
/// under us) is missing.
fn insert_error(err: sqlx::Error, thread: &Thread) -> DomainError {
    let is_missing_reference = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == FOREIGN_KEY_VIOLATION);

    if is_missing_reference {
        return DomainError::not_found(format!("author or thread {}", thread.id));
    }
    DomainError::Internal(anyhow::Error::new(err).context("inserting post batch"))
}

fn post_from_row(row: &PgRow) -> anyhow::Result<Post> {
    let path: Vec<PostId> = row.try_get("path")?;
    Ok(Post {
        id: row.try_get("id")?,
        thread_id: row.try_get("thread_id")?,
        forum_slug: row.try_get("forum_slug")?,
        author: row.try_get("author_nickname")?,
        parent: row.try_get("parent")?,
        message: row.try_get("message")?,
        created: row.try_get("created")?,
        is_edited: row.try_get("is_edited")?,
        path: PostPath::try_from(path)?,
    })
}

fn thread_from_row(row: &PgRow) -> anyhow::Result<Thread> {
    Ok(Thread {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        forum: row.try_get("forum_slug")?,
        author: row.try_get("author_nickname")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        votes: row.try_get("votes")?,
        created: row.try_get("created")?,
    })
}
