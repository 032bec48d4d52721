//! # Cursor codec
//!
//! The external cursor is the decimal id passed back as `since`. What that id
//! means depends on the sort mode: the last post seen for `flat` and `tree`,
//! the last root whose subtree was emitted for `parent_tree`.

use domains::{DomainError, PageShape, Post, PostId, Result, SortMode};

/// Turns the raw `since` value into the keyset bound for `mode`.
///
/// An absent or empty value starts from the beginning of the order. The id is
/// not checked for existence; the store compares against it literally.
pub fn decode(mode: SortMode, since: Option<&str>) -> Result<PageShape> {
    let cursor = match since {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<PostId>().map_err(|_| {
            DomainError::invalid(format!("since must be a post id, got '{raw}'"))
        })?),
    };

    Ok(match mode {
        SortMode::Flat => PageShape::Flat { after_id: cursor },
        SortMode::Tree => PageShape::Tree { after_post: cursor },
        SortMode::ParentTree => PageShape::ParentTree { after_root: cursor },
    })
}

/// The `since` value that continues after `page`, or `None` for an empty page.
pub fn encode(mode: SortMode, page: &[Post]) -> Option<PostId> {
    let last = page.last()?;
    Some(match mode {
        SortMode::Flat | SortMode::Tree => last.id,
        SortMode::ParentTree => last.root_id(),
    })
}
