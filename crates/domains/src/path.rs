//! # Materialized reply paths
//!
//! Every post stores the ids of its ancestors, root first and itself last.
//! Comparing two paths lexicographically (a prefix sorts before any path that
//! extends it) yields the preorder depth-first order of the thread's forest,
//! so tree linearization and tree cursors become plain range comparisons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::errors::{DomainError, Result};
use crate::models::{NewPost, Post, PostId, Thread};

/// Immutable, non-empty ancestor chain of a post.
///
/// `Ord` is the derived `Vec` ordering, which is exactly the lexicographic
/// order Postgres uses for `BIGINT[]` comparisons.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<PostId>", into = "Vec<PostId>")]
pub struct PostPath(Vec<PostId>);

impl PostPath {
    /// Path of a post that starts a new reply tree.
    pub fn root(id: PostId) -> Self {
        Self(vec![id])
    }

    /// Path of a direct reply to the post owning `self`.
    pub fn child(&self, id: PostId) -> Self {
        let mut ids = Vec::with_capacity(self.0.len() + 1);
        ids.extend_from_slice(&self.0);
        ids.push(id);
        Self(ids)
    }

    pub fn root_id(&self) -> PostId {
        self.0[0]
    }

    /// Id of the post owning this path.
    pub fn leaf_id(&self) -> PostId {
        self.0[self.0.len() - 1]
    }

    /// Path of the direct parent, `None` for a root.
    pub fn parent(&self) -> Option<PostPath> {
        match self.0.len() {
            1 => None,
            n => Some(Self(self.0[..n - 1].to_vec())),
        }
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_ancestor_of(&self, other: &PostPath) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }

    pub fn as_slice(&self) -> &[PostId] {
        &self.0
    }
}

impl TryFrom<Vec<PostId>> for PostPath {
    type Error = DomainError;

    fn try_from(ids: Vec<PostId>) -> Result<Self> {
        if ids.is_empty() {
            return Err(DomainError::invalid("post path must contain at least one id"));
        }
        Ok(Self(ids))
    }
}

impl From<PostPath> for Vec<PostId> {
    fn from(path: PostPath) -> Self {
        path.0
    }
}

/// Places a batch of new posts into a thread's reply forest.
///
/// The assigner only knows the parents the store loaded for it, all taken
/// from the target thread inside the batch transaction. A parent that is
/// missing from that set (deleted, in another thread, or part of the same
/// batch) rejects the whole batch.
pub struct PathAssigner<'a> {
    parents: &'a HashMap<PostId, PostPath>,
}

impl<'a> PathAssigner<'a> {
    pub fn new(parents: &'a HashMap<PostId, PostPath>) -> Self {
        Self { parents }
    }

    /// Distinct parent ids the store has to look up before assigning paths.
    pub fn required_parents(batch: &[NewPost]) -> Vec<PostId> {
        batch
            .iter()
            .filter_map(NewPost::parent_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Builds the persisted posts for `batch`, pairing each with the id the
    /// store reserved for it. `ids` must be in batch order.
    pub fn assign(
        &self,
        thread: &Thread,
        batch: Vec<NewPost>,
        ids: &[PostId],
        created: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        if ids.len() != batch.len() {
            return Err(DomainError::Internal(anyhow::anyhow!(
                "reserved {} ids for a batch of {} posts",
                ids.len(),
                batch.len()
            )));
        }

        batch
            .into_iter()
            .zip(ids.iter().copied())
            .map(|(new_post, id)| {
                let parent = new_post.parent_id();
                let path = match parent {
                    None => PostPath::root(id),
                    Some(parent_id) => self
                        .parents
                        .get(&parent_id)
                        .ok_or_else(|| {
                            DomainError::conflict(format!(
                                "parent post {parent_id} does not exist in thread {}",
                                thread.id
                            ))
                        })?
                        .child(id),
                };

                Ok(Post {
                    id,
                    thread_id: thread.id,
                    forum_slug: thread.forum.clone(),
                    author: new_post.author,
                    parent,
                    message: new_post.message,
                    created,
                    is_edited: false,
                    path,
                })
            })
            .collect()
    }
}
