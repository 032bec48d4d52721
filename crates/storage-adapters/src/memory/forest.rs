//! Per-thread post index.
//!
//! Posts are kept twice: by id (flat order) and by path (tree order). Both are
//! `BTreeMap`s so every sort mode is a keyset range scan in one direction.

use std::collections::{BTreeMap, BTreeSet};

use domains::{Direction, Post, PostId, PostPath};

#[derive(Debug, Default)]
pub(crate) struct ThreadForest {
    by_id: BTreeMap<PostId, Post>,
    by_path: BTreeMap<PostPath, PostId>,
    roots: BTreeSet<PostId>,
}

impl ThreadForest {
    pub(crate) fn insert(&mut self, post: Post) {
        if post.is_root() {
            self.roots.insert(post.id);
        }
        self.by_path.insert(post.path.clone(), post.id);
        self.by_id.insert(post.id, post);
    }

    pub(crate) fn get(&self, id: PostId) -> Option<&Post> {
        self.by_id.get(&id)
    }

    /// Paths never change after insert, so only the post body is exposed.
    pub(crate) fn get_mut(&mut self, id: PostId) -> Option<&mut Post> {
        self.by_id.get_mut(&id)
    }

    pub(crate) fn path_of(&self, id: PostId) -> Option<&PostPath> {
        self.by_id.get(&id).map(|post| &post.path)
    }

    pub(crate) fn flat(&self, after: Option<PostId>, direction: Direction, limit: usize) -> Vec<Post> {
        directed(self.by_id.range(direction.after(after)), direction)
            .take(limit)
            .map(|(_, post)| post.clone())
            .collect()
    }

    pub(crate) fn tree(
        &self,
        after: Option<&PostPath>,
        direction: Direction,
        limit: usize,
    ) -> Vec<Post> {
        directed(self.by_path.range(direction.after(after.cloned())), direction)
            .take(limit)
            .filter_map(|(_, id)| self.by_id.get(id).cloned())
            .collect()
    }

    /// `limit` counts roots; each root brings its whole subtree in path order.
    pub(crate) fn parent_tree(
        &self,
        after_root: Option<PostId>,
        direction: Direction,
        limit: usize,
    ) -> Vec<Post> {
        directed(self.roots.range(direction.after(after_root)), direction)
            .take(limit)
            .flat_map(|root| self.subtree(*root))
            .collect()
    }

    fn subtree(&self, root: PostId) -> impl Iterator<Item = Post> + '_ {
        self.by_path
            .range(PostPath::root(root)..)
            .take_while(move |(path, _)| path.root_id() == root)
            .filter_map(|(_, id)| self.by_id.get(id).cloned())
    }
}

fn directed<'a, T: 'a>(
    iter: impl DoubleEndedIterator<Item = T> + 'a,
    direction: Direction,
) -> Box<dyn Iterator<Item = T> + 'a> {
    match direction {
        Direction::Asc => Box::new(iter),
        Direction::Desc => Box::new(iter.rev()),
    }
}
