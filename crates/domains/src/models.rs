//! # Domain Models
//!
//! Posts and the thread metadata the post engine needs. Users and forums are
//! owned by other services and only appear here as nickname/slug strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{DomainError, Result};
use crate::path::PostPath;

/// Post identifiers are assigned from one global, increasing sequence.
pub type PostId = i64;
pub type ThreadId = i32;

/// A forum topic. Owns the forest of posts replying to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Slug of the owning forum, copied onto every post of the thread
    pub forum: String,
    pub author: String,
    pub title: String,
    pub message: String,
    pub votes: i32,
    pub created: DateTime<Utc>,
}

/// The fundamental unit of conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    #[serde(rename = "thread")]
    pub thread_id: ThreadId,
    #[serde(rename = "forum")]
    pub forum_slug: String,
    /// Author nickname
    pub author: String,
    /// `None` for a root post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<PostId>,
    pub message: String,
    /// Shared by every post inserted in the same batch
    pub created: DateTime<Utc>,
    pub is_edited: bool,
    pub path: PostPath,
}

impl Post {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Id of the root post of the reply tree this post belongs to.
    pub fn root_id(&self) -> PostId {
        self.path.root_id()
    }
}

/// A post as submitted by a client, before the store assigns id and path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub author: String,
    pub message: String,
    /// Zero or absent starts a new reply tree
    #[serde(default)]
    pub parent: Option<PostId>,
}

impl NewPost {
    pub fn root(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            message: message.into(),
            parent: None,
        }
    }

    pub fn reply(author: impl Into<String>, message: impl Into<String>, parent: PostId) -> Self {
        Self {
            author: author.into(),
            message: message.into(),
            parent: Some(parent),
        }
    }

    /// The referenced parent, with the wire value `0` folded into `None`.
    pub fn parent_id(&self) -> Option<PostId> {
        self.parent.filter(|id| *id != 0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.message.is_empty() {
            return Err(DomainError::invalid("post message must not be empty"));
        }
        Ok(())
    }
}

/// Message edit request. An empty message leaves the post untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUpdate {
    #[serde(default)]
    pub message: String,
}

/// How a caller names a thread: numeric id or slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadRef {
    Id(ThreadId),
    Slug(String),
}

impl ThreadRef {
    /// Anything that parses as a thread id is an id; everything else is a slug.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<ThreadId>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Slug(raw.to_string()),
        }
    }
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "thread {id}"),
            Self::Slug(slug) => write!(f, "thread '{slug}'"),
        }
    }
}

/// Forum member as the post engine sees it. Profiles are edited elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub nickname: String,
    pub fullname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub about: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forum {
    pub slug: String,
    pub title: String,
    /// Nickname of the owner
    pub user: String,
}

/// Entity that can be attached to a post lookup through `related`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Related {
    User,
    Forum,
    Thread,
}

impl Related {
    /// Parses a comma separated `related` list. Empty input selects nothing;
    /// an unknown name rejects the whole list.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        raw.split(',').map(Self::from_name).collect()
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "user" => Ok(Self::User),
            "forum" => Ok(Self::Forum),
            "thread" => Ok(Self::Thread),
            other => Err(DomainError::invalid(format!("unknown related entity '{other}'"))),
        }
    }
}

/// A post together with whichever related entities the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostDetails {
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forum: Option<Forum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
}

impl PostDetails {
    pub fn new(post: Post) -> Self {
        Self {
            post,
            author: None,
            forum: None,
            thread: None,
        }
    }
}
