//! A nested mapping that groups values under variable-length key paths.
//!
//! [`KeyPathStore`] is the structure used to cluster CMIP5 files by
//! variable, table, model, experiment and ensemble, but nothing in it is
//! specific to that use. Each level maps a [`Key`] to a [`Node`], which is
//! either another store (a branch) or a value (a leaf). Keys keep their
//! insertion order at every level.
//!
//! ```
//! use cmip5_rs::nested::{Key, KeyPathStore, Subset};
//!
//! let mut store = KeyPathStore::new();
//! store.set(["a", "b"], "foo").unwrap();
//! store.set(["a", "c"], "bar").unwrap();
//! store.set([1, 2, 3, 4], "baz").unwrap();
//!
//! assert_eq!(store.size(), 3);
//! assert_eq!(store.depth(), 4);
//! assert_eq!(store.get_leaf(["a", "b"]).unwrap(), &"foo");
//!
//! let subset = Subset::new().allow(0, ["a"]);
//! let under_a: Vec<_> = store.walk(&subset).collect();
//! assert_eq!(under_a.len(), 2);
//! assert_eq!(under_a[0].0, vec![Key::from("a"), Key::from("b")]);
//! ```
use std::{collections::BTreeMap, fmt::Display};

use indexmap::{map, IndexMap, IndexSet};
use serde::{ser::SerializeMap, Serialize};

use crate::error::NestedError;

/// A single key in a key path.
///
/// Strings and integers may be mixed freely within one store. The two are
/// never considered equal, so `Key::from("1") != Key::from(1)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Str(String),
    Int(i64),
}

impl Key {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            Key::Int(_) => None,
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Str(s) => write!(f, "{s}"),
            Key::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&Key> for Key {
    fn from(value: &Key) -> Self {
        value.clone()
    }
}

/// One entry in a [`KeyPathStore`]: either a nested store or a leaf value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node<V> {
    Branch(KeyPathStore<V>),
    Leaf(V),
}

impl<V> Node<V> {
    pub fn as_leaf(&self) -> Option<&V> {
        match self {
            Node::Leaf(v) => Some(v),
            Node::Branch(_) => None,
        }
    }

    pub fn as_branch(&self) -> Option<&KeyPathStore<V>> {
        match self {
            Node::Branch(s) => Some(s),
            Node::Leaf(_) => None,
        }
    }

    /// Turn this node into a branch if it is not one already, discarding any
    /// leaf value it held, and return the branch.
    fn make_branch(&mut self) -> &mut KeyPathStore<V> {
        if let Node::Leaf(_) = self {
            *self = Node::Branch(KeyPathStore::new());
        }

        match self {
            Node::Branch(s) => s,
            Node::Leaf(_) => unreachable!("node was converted to a branch above"),
        }
    }
}

/// A filter restricting which keys [`KeyPathStore::walk`] visits at one level.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Visit only keys that are both present in the node and in this set.
    AllowList(IndexSet<Key>),

    /// Visit the keys in this list, but only if the node holds *all* of them.
    /// A node missing any of the keys is not traversed at all: the walk stops
    /// at that node rather than visiting the keys it does have.
    RequireAll(Vec<Key>),
}

impl Filter {
    fn admits(&self, key: &Key) -> bool {
        match self {
            Filter::AllowList(keys) => keys.contains(key),
            Filter::RequireAll(keys) => keys.contains(key),
        }
    }

    fn blocks<V>(&self, store: &KeyPathStore<V>) -> bool {
        match self {
            Filter::AllowList(_) => false,
            Filter::RequireAll(keys) => !keys.iter().all(|k| store.entries.contains_key(k)),
        }
    }
}

/// Per-level filters for [`KeyPathStore::walk`] and [`KeyPathStore::copy`].
///
/// Levels are 0-based; a level with no filter is not restricted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subset(BTreeMap<usize, Filter>);

static NO_SUBSET: Subset = Subset::new();

impl Subset {
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Restrict `level` to the given keys (see [`Filter::AllowList`]).
    pub fn allow<I, K>(mut self, level: usize, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let keys = keys.into_iter().map(Into::<Key>::into).collect();
        self.0.insert(level, Filter::AllowList(keys));
        self
    }

    /// Require every node at `level` to hold all of the given keys (see
    /// [`Filter::RequireAll`]).
    pub fn require_all<I, K>(mut self, level: usize, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let keys = keys.into_iter().map(Into::<Key>::into).collect();
        self.0.insert(level, Filter::RequireAll(keys));
        self
    }

    pub fn with_filter(mut self, level: usize, filter: Filter) -> Self {
        self.0.insert(level, filter);
        self
    }

    pub fn get(&self, level: usize) -> Option<&Filter> {
        self.0.get(&level)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn blocks<V>(&self, level: usize, store: &KeyPathStore<V>) -> bool {
        self.get(level).is_some_and(|f| f.blocks(store))
    }
}

/// A nested mapping from key paths to values.
///
/// Intermediate levels are created on demand by [`KeyPathStore::obtain`] and
/// [`KeyPathStore::set`]; leaves are only ever created by an explicit `set`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPathStore<V> {
    entries: IndexMap<Key, Node<V>>,
}

impl<V> Default for KeyPathStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyPathStore<V> {
    pub fn new() -> Self {
        Self { entries: IndexMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The keys at the root level, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    /// Return the store reached by following `path`, creating an empty store
    /// for every key along the way that does not exist yet.
    ///
    /// A leaf found along the path is replaced by an empty store, since the
    /// path must continue through it. An empty path returns `self`.
    pub fn obtain<I, K>(&mut self, path: I) -> &mut KeyPathStore<V>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let mut store = self;
        for key in path {
            store = store
                .entries
                .entry(key.into())
                .or_insert_with(|| Node::Branch(KeyPathStore::new()))
                .make_branch();
        }
        store
    }

    /// Assign `value` as a leaf at `path`, creating intermediate levels as
    /// needed. Anything already at `path` (leaf or subtree) is replaced.
    pub fn set<I, K>(&mut self, path: I, value: V) -> Result<(), NestedError>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.insert_node(path, Node::Leaf(value))
    }

    /// Like [`KeyPathStore::set`], but assign an arbitrary node, e.g. to
    /// graft a whole subtree at `path`.
    pub fn insert_node<I, K>(&mut self, path: I, node: Node<V>) -> Result<(), NestedError>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let mut path: Vec<Key> = path.into_iter().map(Into::<Key>::into).collect();
        let last = path.pop().ok_or(NestedError::InvalidKeyPath)?;
        self.obtain(path).entries.insert(last, node);
        Ok(())
    }

    /// Return the node at `path` without creating anything.
    ///
    /// Fails with [`NestedError::NotFound`] naming the first key of the path
    /// that could not be followed.
    pub fn get<I, K>(&self, path: I) -> Result<&Node<V>, NestedError>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let mut keys = path.into_iter().map(Into::<Key>::into).peekable();
        let mut store = self;
        while let Some(key) = keys.next() {
            let node = store
                .entries
                .get(&key)
                .ok_or_else(|| NestedError::NotFound { key: key.clone() })?;

            match (keys.peek(), node) {
                (None, _) => return Ok(node),
                (Some(_), Node::Branch(s)) => store = s,
                (Some(next), Node::Leaf(_)) => {
                    return Err(NestedError::NotFound { key: next.clone() })
                }
            }
        }

        Err(NestedError::InvalidKeyPath)
    }

    /// Mutable version of [`KeyPathStore::get`].
    pub fn get_mut<I, K>(&mut self, path: I) -> Result<&mut Node<V>, NestedError>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let mut keys = path.into_iter().map(Into::<Key>::into).peekable();
        let mut store = self;
        while let Some(key) = keys.next() {
            let node = store
                .entries
                .get_mut(&key)
                .ok_or_else(|| NestedError::NotFound { key: key.clone() })?;

            match keys.peek() {
                None => return Ok(node),
                Some(next) => match node {
                    Node::Branch(s) => store = s,
                    Node::Leaf(_) => return Err(NestedError::NotFound { key: next.clone() }),
                },
            }
        }

        Err(NestedError::InvalidKeyPath)
    }

    /// Return the leaf value at `path`, failing if the path is missing or
    /// ends on a branch.
    pub fn get_leaf<I, K>(&self, path: I) -> Result<&V, NestedError>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let path: Vec<Key> = path.into_iter().map(Into::<Key>::into).collect();
        match self.get(path.iter())? {
            Node::Leaf(v) => Ok(v),
            Node::Branch(_) => Err(NestedError::NotALeaf { path }),
        }
    }

    /// Mutable version of [`KeyPathStore::get_leaf`].
    pub fn get_leaf_mut<I, K>(&mut self, path: I) -> Result<&mut V, NestedError>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let path: Vec<Key> = path.into_iter().map(Into::<Key>::into).collect();
        match self.get_mut(path.iter())? {
            Node::Leaf(v) => Ok(v),
            Node::Branch(_) => Err(NestedError::NotALeaf { path }),
        }
    }

    pub fn contains<I, K>(&self, path: I) -> bool
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.get(path).is_ok()
    }

    /// Return the distinct keys found at nesting depth `level` (0 is the
    /// root), in first-seen order. Empty if nothing reaches that depth.
    pub fn keylevel(&self, level: usize) -> IndexSet<Key> {
        let mut keys = IndexSet::new();
        self.collect_keylevel(level, &mut keys);
        keys
    }

    fn collect_keylevel(&self, level: usize, keys: &mut IndexSet<Key>) {
        if level == 0 {
            keys.extend(self.entries.keys().cloned());
            return;
        }

        for node in self.entries.values() {
            if let Node::Branch(s) = node {
                s.collect_keylevel(level - 1, keys);
            }
        }
    }

    /// One past the deepest populated level, i.e. the first level for which
    /// [`KeyPathStore::keylevel`] is empty.
    pub fn depth(&self) -> usize {
        let mut level = 0;
        while !self.keylevel(level).is_empty() {
            level += 1;
        }
        level
    }

    /// The total number of leaves in the store.
    pub fn size(&self) -> usize {
        self.iter().count()
    }

    /// Iterate over every leaf as `(key path, value)`, depth first in
    /// insertion order.
    pub fn iter(&self) -> Walk<'_, V> {
        self.walk(&NO_SUBSET)
    }

    /// Iterate over the leaves selected by `subset` as `(key path, value)`,
    /// depth first in insertion order. Each call starts a fresh traversal.
    pub fn walk<'a>(&'a self, subset: &'a Subset) -> Walk<'a, V> {
        let stack = if subset.blocks(0, self) {
            vec![]
        } else {
            vec![self.entries.iter()]
        };
        Walk { subset, stack, path: vec![] }
    }

    /// Return a new store holding clones of the leaves selected by `subset`
    /// at their original key paths.
    pub fn copy(&self, subset: &Subset) -> KeyPathStore<V>
    where
        V: Clone,
    {
        let mut out = KeyPathStore::new();
        for (path, value) in self.walk(subset) {
            out.set_unchecked(path, value.clone());
        }
        out
    }

    /// Assign every leaf of `other` into `self` at the same key path.
    /// Conflicts are resolved in favor of `other`.
    pub fn merge(&mut self, other: KeyPathStore<V>) {
        for (path, value) in other {
            self.set_unchecked(path, value);
        }
    }

    // Paths produced by a walk are never empty, so this cannot fail.
    fn set_unchecked(&mut self, mut path: Vec<Key>, value: V) {
        if let Some(last) = path.pop() {
            self.obtain(path).entries.insert(last, Node::Leaf(value));
        }
    }

    fn drain_into(self, prefix: &mut Vec<Key>, out: &mut Vec<(Vec<Key>, V)>) {
        for (key, node) in self.entries {
            prefix.push(key);
            match node {
                Node::Leaf(v) => out.push((prefix.clone(), v)),
                Node::Branch(s) => s.drain_into(prefix, out),
            }
            prefix.pop();
        }
    }
}

/// Iterator returned by [`KeyPathStore::walk`] and [`KeyPathStore::iter`].
pub struct Walk<'a, V> {
    subset: &'a Subset,
    stack: Vec<map::Iter<'a, Key, Node<V>>>,
    path: Vec<Key>,
}

impl<'a, V> Iterator for Walk<'a, V> {
    type Item = (Vec<Key>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let level = self.stack.len().checked_sub(1)?;
            let Some((key, node)) = self.stack[level].next() else {
                self.stack.pop();
                self.path.pop();
                continue;
            };

            if self.subset.get(level).is_some_and(|f| !f.admits(key)) {
                continue;
            }

            match node {
                Node::Leaf(value) => {
                    let mut path = self.path.clone();
                    path.push(key.clone());
                    return Some((path, value));
                }
                Node::Branch(store) => {
                    if !self.subset.blocks(level + 1, store) {
                        self.path.push(key.clone());
                        self.stack.push(store.entries.iter());
                    }
                }
            }
        }
    }
}

impl<V> IntoIterator for KeyPathStore<V> {
    type Item = (Vec<Key>, V);
    type IntoIter = std::vec::IntoIter<(Vec<Key>, V)>;

    fn into_iter(self) -> Self::IntoIter {
        let mut out = vec![];
        self.drain_into(&mut vec![], &mut out);
        out.into_iter()
    }
}

impl<'a, V> IntoIterator for &'a KeyPathStore<V> {
    type Item = (Vec<Key>, &'a V);
    type IntoIter = Walk<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V> Extend<(Vec<Key>, V)> for KeyPathStore<V> {
    fn extend<T: IntoIterator<Item = (Vec<Key>, V)>>(&mut self, iter: T) {
        for (path, value) in iter {
            self.set_unchecked(path, value);
        }
    }
}

impl<V> FromIterator<(Vec<Key>, V)> for KeyPathStore<V> {
    fn from_iter<T: IntoIterator<Item = (Vec<Key>, V)>>(iter: T) -> Self {
        let mut store = KeyPathStore::new();
        store.extend(iter);
        store
    }
}

impl<V: Serialize> Serialize for KeyPathStore<V> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in self.entries.iter() {
            map.serialize_entry(&key.to_string(), node)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn path<K: Into<Key>, I: IntoIterator<Item = K>>(keys: I) -> Vec<Key> {
        keys.into_iter().map(Into::<Key>::into).collect()
    }

    #[fixture]
    fn example_store() -> KeyPathStore<&'static str> {
        let mut store = KeyPathStore::new();
        store.set(["a", "b"], "foo").unwrap();
        store.set(["a", "c"], "bar").unwrap();
        store.set([1, 2, 3, 4], "baz").unwrap();
        store
    }

    #[rstest]
    fn test_example_scenario(example_store: KeyPathStore<&'static str>) {
        assert_eq!(example_store.size(), 3);
        assert_eq!(example_store.depth(), 4);

        let level1 = example_store.keylevel(1);
        let expected: IndexSet<Key> = [Key::from("b"), Key::from("c"), Key::from(2)].into_iter().collect();
        assert_eq!(level1, expected);

        assert_eq!(example_store.get_leaf(["a", "b"]).unwrap(), &"foo");
        let err = example_store.get(["z"]).unwrap_err();
        assert!(matches!(err, NestedError::NotFound { key } if key == Key::from("z")));
    }

    #[rstest]
    #[case(vec![Key::from("x")])]
    #[case(vec![Key::from("x"), Key::from(7), Key::from("y")])]
    #[case(vec![Key::from(0), Key::from(0), Key::from(0), Key::from(0), Key::from(0)])]
    fn test_set_get_round_trip(#[case] keys: Vec<Key>) {
        let mut store = KeyPathStore::new();
        store.set(keys.clone(), 42).unwrap();
        assert_eq!(store.get_leaf(keys).unwrap(), &42);
    }

    #[test]
    fn test_set_empty_path() {
        let mut store: KeyPathStore<i32> = KeyPathStore::new();
        let err = store.set(Vec::<Key>::new(), 1).unwrap_err();
        assert!(matches!(err, NestedError::InvalidKeyPath));
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_does_not_create() {
        let mut store = KeyPathStore::new();
        store.set(["a", "b"], 1).unwrap();
        let err = store.get(["a", "x", "y"]).unwrap_err();
        assert!(matches!(err, NestedError::NotFound { key } if key == Key::from("x")));
        assert_eq!(store.keylevel(1).len(), 1);
    }

    #[test]
    fn test_get_through_leaf() {
        let mut store = KeyPathStore::new();
        store.set(["a", "b"], 1).unwrap();
        let err = store.get(["a", "b", "c"]).unwrap_err();
        assert!(matches!(err, NestedError::NotFound { key } if key == Key::from("c")));
    }

    #[test]
    fn test_get_leaf_on_branch() {
        let mut store = KeyPathStore::new();
        store.set(["a", "b"], 1).unwrap();
        let err = store.get_leaf(["a"]).unwrap_err();
        assert!(matches!(err, NestedError::NotALeaf { .. }));
    }

    #[test]
    fn test_obtain_keeps_branches_separate() {
        let mut store = KeyPathStore::new();
        store.obtain(["a", "b", "c"]).set(["leaf"], 1).unwrap();
        store.obtain(["a", "b", "d"]).set(["leaf"], 2).unwrap();

        assert_eq!(store.get_leaf(["a", "b", "c", "leaf"]).unwrap(), &1);
        assert_eq!(store.get_leaf(["a", "b", "d", "leaf"]).unwrap(), &2);
        assert_eq!(store.size(), 2);
    }

    #[test]
    fn test_obtain_creates_empty_levels() {
        let mut store: KeyPathStore<i32> = KeyPathStore::new();
        store.obtain(["a", "b"]);
        assert!(store.contains(["a", "b"]));
        assert_eq!(store.size(), 0);
        assert_eq!(store.depth(), 2);
    }

    #[test]
    fn test_overwrite_does_not_double_count() {
        let mut store = KeyPathStore::new();
        store.set(["a", "b"], 1).unwrap();
        store.set(["a", "b"], 2).unwrap();
        store.set(["a", "c"], 3).unwrap();
        assert_eq!(store.size(), 2);
        assert_eq!(store.get_leaf(["a", "b"]).unwrap(), &2);
    }

    #[test]
    fn test_set_replaces_subtree() {
        let mut store = KeyPathStore::new();
        store.set(["a", "b", "c"], 1).unwrap();
        store.set(["a", "b"], 2).unwrap();
        assert_eq!(store.size(), 1);
        assert_eq!(store.depth(), 2);
    }

    #[test]
    fn test_obtain_through_leaf_replaces_it() {
        let mut store = KeyPathStore::new();
        store.set(["a"], 1).unwrap();
        store.set(["z"], 2).unwrap();
        assert_eq!(store.size(), 2);

        let inner = store.obtain(["a", "b"]);
        assert!(inner.is_empty());

        assert!(store.get(["a"]).unwrap().as_branch().is_some());
        assert!(store.contains(["a", "b"]));
        assert_eq!(store.size(), 1);
        let err = store.get_leaf(["a"]).unwrap_err();
        assert!(matches!(err, NestedError::NotALeaf { .. }));
    }

    #[test]
    fn test_merge_longer_path_through_leaf() {
        let mut left = KeyPathStore::new();
        left.set(["a"], 1).unwrap();
        left.set(["z"], 2).unwrap();

        let mut right = KeyPathStore::new();
        right.set(["a", "b"], 10).unwrap();

        left.merge(right);
        assert_eq!(left.size(), 2);
        assert_eq!(left.get_leaf(["a", "b"]).unwrap(), &10);
        let err = left.get_leaf(["a"]).unwrap_err();
        assert!(matches!(err, NestedError::NotALeaf { .. }));
    }

    #[rstest]
    fn test_keylevel_root(example_store: KeyPathStore<&'static str>) {
        let expected: IndexSet<Key> = [Key::from("a"), Key::from(1)].into_iter().collect();
        assert_eq!(example_store.keylevel(0), expected);
        assert!(example_store.keylevel(10).is_empty());
    }

    #[rstest]
    fn test_walk_all(example_store: KeyPathStore<&'static str>) {
        let leaves: Vec<_> = example_store.iter().collect();
        assert_eq!(
            leaves,
            vec![
                (path(["a", "b"]), &"foo"),
                (path(["a", "c"]), &"bar"),
                (path([1, 2, 3, 4]), &"baz"),
            ]
        );

        // A second traversal starts over
        assert_eq!(example_store.iter().count(), 3);
    }

    #[rstest]
    fn test_walk_allow_list(example_store: KeyPathStore<&'static str>) {
        let subset = Subset::new().allow(0, ["a"]);
        let values: Vec<_> = example_store.walk(&subset).map(|(_, v)| *v).collect();
        assert_eq!(values, vec!["foo", "bar"]);

        let subset = Subset::new().allow(1, ["c", "q"]);
        let values: Vec<_> = example_store.walk(&subset).map(|(_, v)| *v).collect();
        assert_eq!(values, vec!["bar"]);
    }

    #[test]
    fn test_walk_require_all() {
        let mut store = KeyPathStore::new();
        store.set(["x", "leaf"], 1).unwrap();
        store.set(["w", "leaf"], 2).unwrap();

        let subset = Subset::new().require_all(0, ["x", "y"]);
        assert_eq!(store.walk(&subset).count(), 0);

        let subset = Subset::new().require_all(0, ["x", "w"]);
        assert_eq!(store.walk(&subset).count(), 2);

        let subset = Subset::new().require_all(0, ["x"]);
        let values: Vec<_> = store.walk(&subset).map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1]);
    }

    #[test]
    fn test_walk_require_all_per_branch() {
        // Each ensemble level node is tested separately; only the model with
        // both members contributes.
        let mut store = KeyPathStore::new();
        store.set(["m1", "r1"], 1).unwrap();
        store.set(["m1", "r2"], 2).unwrap();
        store.set(["m2", "r1"], 3).unwrap();

        let subset = Subset::new().require_all(1, ["r1", "r2"]);
        let values: Vec<_> = store.walk(&subset).map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_copy_is_independent() {
        let mut store = KeyPathStore::new();
        store.set(["a", "b"], vec![1, 2]).unwrap();
        store.set(["c", "d"], vec![3]).unwrap();

        let mut copied = store.copy(&Subset::new().allow(0, ["a"]));
        assert_eq!(copied.size(), 1);
        copied.get_leaf_mut(["a", "b"]).unwrap().push(99);

        assert_eq!(store.get_leaf(["a", "b"]).unwrap(), &vec![1, 2]);
        assert_eq!(copied.get_leaf(["a", "b"]).unwrap(), &vec![1, 2, 99]);
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut left = KeyPathStore::new();
        left.set(["a", "b"], 1).unwrap();
        left.set(["a", "c"], 2).unwrap();

        let mut right = KeyPathStore::new();
        right.set(["a", "b"], 10).unwrap();
        right.set(["d"], 20).unwrap();

        left.merge(right);
        assert_eq!(left.size(), 3);
        assert_eq!(left.get_leaf(["a", "b"]).unwrap(), &10);
        assert_eq!(left.get_leaf(["a", "c"]).unwrap(), &2);
        assert_eq!(left.get_leaf(["d"]).unwrap(), &20);
    }

    #[rstest]
    fn test_collect_round_trip(example_store: KeyPathStore<&'static str>) {
        let rebuilt: KeyPathStore<_> = example_store.clone().into_iter().collect();
        assert_eq!(rebuilt, example_store);
    }

    #[rstest]
    fn test_serialize(example_store: KeyPathStore<&'static str>) {
        let json = serde_json::to_value(&example_store).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"a": {"b": "foo", "c": "bar"}, "1": {"2": {"3": {"4": "baz"}}}})
        );
    }
}
