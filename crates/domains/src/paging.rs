//! # Paging
//!
//! Query shapes understood by every `PostRepository`.

use serde::Serialize;
use std::fmt;
use std::ops::Bound;

use crate::models::{Post, PostId};

/// The three linearizations of a thread's reply forest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Insertion order (by id)
    #[default]
    Flat,
    /// Preorder depth-first over the whole forest (by path)
    Tree,
    /// Like `Tree`, but pages count root posts and carry whole subtrees
    ParentTree,
}

impl SortMode {
    /// Unknown names fall back to `Flat` rather than failing.
    pub fn from_name(name: &str) -> Self {
        match name {
            "tree" => Self::Tree,
            "parent_tree" => Self::ParentTree,
            _ => Self::Flat,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Tree => "tree",
            Self::ParentTree => "parent_tree",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn from_desc(desc: bool) -> Self {
        if desc {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    pub fn is_desc(self) -> bool {
        self == Self::Desc
    }

    /// `ORDER BY` keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Comparison selecting keys that come after a cursor in this direction.
    pub fn after_operator(self) -> &'static str {
        match self {
            Self::Asc => ">",
            Self::Desc => "<",
        }
    }

    /// Range bounds for keys strictly after `cursor` in this direction.
    pub fn after<K>(self, cursor: Option<K>) -> (Bound<K>, Bound<K>) {
        match (self, cursor) {
            (_, None) => (Bound::Unbounded, Bound::Unbounded),
            (Self::Asc, Some(key)) => (Bound::Excluded(key), Bound::Unbounded),
            (Self::Desc, Some(key)) => (Bound::Unbounded, Bound::Excluded(key)),
        }
    }
}

/// Sort mode together with the decoded keyset bound for that mode.
///
/// Each variant carries the cursor in the unit its mode paginates by, so a
/// flat id can never be compared against a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageShape {
    /// Posts with id strictly after `after_id`
    Flat { after_id: Option<PostId> },
    /// Posts whose path strictly follows the path of post `after_post`
    Tree { after_post: Option<PostId> },
    /// Root posts with id strictly after `after_root`, each with its subtree
    ParentTree { after_root: Option<PostId> },
}

impl PageShape {
    pub fn mode(&self) -> SortMode {
        match self {
            Self::Flat { .. } => SortMode::Flat,
            Self::Tree { .. } => SortMode::Tree,
            Self::ParentTree { .. } => SortMode::ParentTree,
        }
    }
}

/// A fully validated page request, minus the thread it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub shape: PageShape,
    pub direction: Direction,
    /// Posts for `Flat`/`Tree`, root trees for `ParentTree`. Zero yields an empty page.
    pub limit: u32,
}

impl PageQuery {
    pub fn mode(&self) -> SortMode {
        self.shape.mode()
    }
}

/// One page of posts plus the `since` value that fetches the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub next_cursor: Option<PostId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sort_falls_back_to_flat() {
        assert_eq!(SortMode::from_name("tree"), SortMode::Tree);
        assert_eq!(SortMode::from_name("parent_tree"), SortMode::ParentTree);
        assert_eq!(SortMode::from_name("flat"), SortMode::Flat);
        assert_eq!(SortMode::from_name("TREE"), SortMode::Flat);
        assert_eq!(SortMode::from_name(""), SortMode::Flat);
    }

    #[test]
    fn direction_operators() {
        assert_eq!(Direction::Asc.after_operator(), ">");
        assert_eq!(Direction::Desc.after_operator(), "<");
        assert_eq!(Direction::from_desc(true).keyword(), "DESC");
    }

    #[test]
    fn after_bounds_follow_direction() {
        assert_eq!(
            Direction::Asc.after(Some(5)),
            (Bound::Excluded(5), Bound::Unbounded)
        );
        assert_eq!(
            Direction::Desc.after(Some(5)),
            (Bound::Unbounded, Bound::Excluded(5))
        );
        assert_eq!(
            Direction::Desc.after::<i64>(None),
            (Bound::Unbounded, Bound::Unbounded)
        );
    }
}
