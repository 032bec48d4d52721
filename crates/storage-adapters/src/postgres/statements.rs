//! SQL for the post store.
//!
//! Page statements are assembled from an exhaustive match over the page
//! shape; direction only swaps the comparison operator and `ORDER BY`
//! keyword, so adding a sort mode fails to compile until it has a statement.

use domains::{PageQuery, PageShape, ThreadId};
use sqlx::{Postgres, QueryBuilder};

pub(crate) const POST_COLUMNS: &str = "p.id, p.thread_id, p.forum_slug, p.author_nickname, \
     p.parent, p.message, p.created, p.is_edited, p.path";

pub(crate) const THREAD_COLUMNS: &str =
    "id, slug, forum_slug, author_nickname, title, message, votes, created";

pub(crate) const SELECT_USER: &str =
    "SELECT nickname, fullname, about, email FROM users WHERE nickname = $1";

pub(crate) const SELECT_FORUM: &str =
    "SELECT slug, title, owner_nickname FROM forums WHERE slug = $1";

pub(crate) const LOCK_THREAD: &str = "SELECT id FROM threads WHERE id = $1 FOR NO KEY UPDATE";

pub(crate) const SELECT_PARENT_PATHS: &str =
    "SELECT id, path FROM posts WHERE thread_id = $1 AND id = ANY($2)";

pub(crate) const RESERVE_POST_IDS: &str =
    "SELECT nextval(pg_get_serial_sequence('posts', 'id')) FROM generate_series(1, $1)";

pub(crate) const INSERT_POSTS: &str = "INSERT INTO posts \
     (id, thread_id, forum_slug, author_nickname, parent, message, created, is_edited, path) ";

pub(crate) fn select_post() -> String {
    format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1")
}

/// An empty message keeps the old one; `is_edited` flips only on a real change.
pub(crate) fn update_post_message() -> String {
    format!(
        "UPDATE posts AS p \
         SET message = COALESCE(NULLIF($2, ''), p.message), \
             is_edited = p.is_edited OR (NULLIF($2, '') IS NOT NULL AND $2 <> p.message) \
         WHERE p.id = $1 \
         RETURNING {POST_COLUMNS}"
    )
}

/// Builds the keyset query for one page of a thread's posts.
pub(crate) fn page_query(thread_id: ThreadId, query: &PageQuery) -> QueryBuilder<'static, Postgres> {
    let order = query.direction.keyword();
    let after = query.direction.after_operator();
    let limit = i64::from(query.limit);

    let mut qb = QueryBuilder::new("");
    match query.shape {
        PageShape::Flat { after_id } => {
            qb.push(format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.thread_id = "))
                .push_bind(thread_id);
            if let Some(id) = after_id {
                qb.push(format!(" AND p.id {after} ")).push_bind(id);
            }
            qb.push(format!(" ORDER BY p.id {order} LIMIT ")).push_bind(limit);
        }
        PageShape::Tree { after_post } => {
            qb.push(format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.thread_id = "))
                .push_bind(thread_id);
            if let Some(id) = after_post {
                // A missing cursor post makes the subquery NULL and the page empty.
                qb.push(format!(
                    " AND p.path {after} (SELECT c.path FROM posts c WHERE c.id = "
                ))
                .push_bind(id)
                .push(")");
            }
            qb.push(format!(" ORDER BY p.path {order} LIMIT ")).push_bind(limit);
        }
        PageShape::ParentTree { after_root } => {
            qb.push("WITH roots AS (SELECT r.id FROM posts r WHERE r.thread_id = ")
                .push_bind(thread_id)
                .push(" AND r.parent IS NULL");
            if let Some(id) = after_root {
                qb.push(format!(" AND r.id {after} ")).push_bind(id);
            }
            qb.push(format!(" ORDER BY r.id {order} LIMIT "))
                .push_bind(limit)
                .push(format!(
                    ") SELECT {POST_COLUMNS} FROM posts p JOIN roots ON p.path[1] = roots.id \
                     WHERE p.thread_id = "
                ))
                .push_bind(thread_id)
                .push(format!(" ORDER BY p.path[1] {order}, p.path ASC"));
        }
    }
    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::Direction;

    fn sql(shape: PageShape, direction: Direction) -> String {
        let query = PageQuery {
            shape,
            direction,
            limit: 10,
        };
        page_query(1, &query).sql().to_string()
    }

    #[test]
    fn flat_without_cursor() {
        assert_eq!(
            sql(PageShape::Flat { after_id: None }, Direction::Asc),
            format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.thread_id = $1 ORDER BY p.id ASC LIMIT $2")
        );
    }

    #[test]
    fn flat_desc_with_cursor() {
        assert_eq!(
            sql(PageShape::Flat { after_id: Some(4) }, Direction::Desc),
            format!(
                "SELECT {POST_COLUMNS} FROM posts p WHERE p.thread_id = $1 AND p.id < $2 \
                 ORDER BY p.id DESC LIMIT $3"
            )
        );
    }

    #[test]
    fn tree_cursor_compares_paths() {
        assert_eq!(
            sql(PageShape::Tree { after_post: Some(4) }, Direction::Asc),
            format!(
                "SELECT {POST_COLUMNS} FROM posts p WHERE p.thread_id = $1 \
                 AND p.path > (SELECT c.path FROM posts c WHERE c.id = $2) \
                 ORDER BY p.path ASC LIMIT $3"
            )
        );
    }

    #[test]
    fn parent_tree_limits_roots_and_keeps_subtrees_ascending() {
        let statement = sql(PageShape::ParentTree { after_root: Some(7) }, Direction::Desc);
        assert!(statement.starts_with(
            "WITH roots AS (SELECT r.id FROM posts r WHERE r.thread_id = $1 \
             AND r.parent IS NULL AND r.id < $2 ORDER BY r.id DESC LIMIT $3)"
        ));
        assert!(statement.contains("JOIN roots ON p.path[1] = roots.id WHERE p.thread_id = $4"));
        assert!(statement.ends_with("ORDER BY p.path[1] DESC, p.path ASC"));
    }

    #[test]
    fn update_statement_guards_edited_flag() {
        let statement = update_post_message();
        assert!(statement.contains("COALESCE(NULLIF($2, ''), p.message)"));
        assert!(statement.contains("$2 <> p.message"));
    }
}
