//! Byte-keyed compressed trie with ternary (less/equal/greater) search.
//!
//! # Introduction
//!
//! A [`Trie`] is built once from keys given in strictly ascending order and then
//! queried with [`Trie::search`], which reports the values of the nearest key
//! below, the exact key, and the nearest key above a query in one descent.
//!
//! Construction creates one node per key byte. [`Trie::squash`] then collapses
//! every chain of single-branch nodes into one edge that consumes several key
//! bytes at once. The skipped bytes are not stored, so after squashing the trie
//! works as an index: inserted keys are always answered exactly, while a query
//! diverging inside a collapsed edge is answered as if it followed that edge.
//!
//! # Range tries
//!
//! [`Trie::new_range`] stores both boundaries of a set of ascending, disjoint
//! ranges. After [`Trie::remove_end_leaves`] only range starts can match exactly,
//! so the `lt`/`eq` result of a query names the range that may contain it.
//!
//! # Examples
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use slimidx::Trie;
//!
//! let keys = ["abc", "abd", "b"];
//! let mut trie = Trie::new(&keys, vec![1, 2, 3])?;
//! trie.squash();
//!
//! let r = trie.search("abd");
//! assert_eq!((r.lt, r.eq, r.gt), (Some(&1), Some(&2), Some(&3)));
//!
//! let r = trie.search("a");
//! assert_eq!((r.lt, r.eq, r.gt), (None, None, Some(&1)));
//! # Ok(())
//! # }
//! ```
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::BuildError;

/// Identifier selecting a child of a trie node.
///
/// [`Branch::EndOfKey`] sorts before every byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Branch {
    /// The key ends at this node.
    EndOfKey,
    /// The next key byte.
    Byte(u8),
}

impl Branch {
    /// Returns the branch taken by `key` at byte position `i`.
    #[inline(always)]
    fn of(key: &[u8], i: usize) -> Self {
        key.get(i).map_or(Self::EndOfKey, |&b| Self::Byte(b))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

#[derive(Debug, Clone)]
struct Node<V> {
    // Ascending; `children[i]` is reached through `branches[i]`.
    branches: Vec<Branch>,
    children: Vec<NodeId>,
    step: u32,
    value: Option<V>,
    is_start_leaf: bool,
    is_end_leaf: bool,
}

impl<V> Node<V> {
    fn inner() -> Self {
        Self {
            branches: vec![],
            children: vec![],
            step: 1,
            value: None,
            is_start_leaf: false,
            is_end_leaf: false,
        }
    }

    fn leaf(value: V, is_start_leaf: bool, is_end_leaf: bool) -> Self {
        Self {
            branches: vec![],
            children: vec![],
            step: 1,
            value: Some(value),
            is_start_leaf,
            is_end_leaf,
        }
    }

    fn child(&self, br: Branch) -> Option<NodeId> {
        self.branches
            .binary_search(&br)
            .ok()
            .map(|i| self.children[i])
    }

    /// Returns the children behind the nearest branch smaller than `br`
    /// and the nearest branch greater than `br`, or equal to it if `br` is absent.
    fn neighbors(&self, br: Branch) -> (Option<NodeId>, Option<NodeId>) {
        let pos = self.branches.partition_point(|&b| b < br);
        let lt = pos.checked_sub(1).map(|i| self.children[i]);
        let gt = match self.branches.get(pos) {
            Some(&b) if b == br => self.children.get(pos + 1).copied(),
            Some(_) => Some(self.children[pos]),
            None => None,
        };
        (lt, gt)
    }

    fn attach(&mut self, br: Branch, child: NodeId) {
        debug_assert!(self.branches.last().map_or(true, |&last| last < br));
        self.branches.push(br);
        self.children.push(child);
    }

    fn detach_at(&mut self, i: usize) {
        self.branches.remove(i);
        self.children.remove(i);
    }
}

/// Outcome of inserting one key.
enum Slot<V> {
    Created,
    /// The key already ends in `leaf`; the rejected value is handed back.
    Occupied { leaf: NodeId, value: V },
}

/// Values of the neighbors of a query key, returned by [`Trie::search()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult<'a, V> {
    /// Value of the nearest key smaller than the query.
    pub lt: Option<&'a V>,
    /// Value of the query key itself.
    pub eq: Option<&'a V>,
    /// Value of the nearest key greater than the query.
    pub gt: Option<&'a V>,
}

/// Byte-keyed compressed trie with ternary search.
///
/// Nodes live in an arena and refer to their children by index; every node
/// has exactly one parent. Values are stored in leaves hanging off
/// [`Branch::EndOfKey`].
#[derive(Debug, Clone)]
pub struct Trie<V> {
    nodes: Vec<Node<V>>,
}

impl<V> Default for Trie<V> {
    fn default() -> Self {
        Self {
            nodes: vec![Node::inner()],
        }
    }
}

impl<V> Trie<V> {
    /// Builds a trie mapping each of `keys` to the value at the same position.
    ///
    /// # Arguments
    ///
    ///  - `keys`: Strictly ascending keys, compared bytewise.
    ///  - `values`: Values, positionally paired with `keys`.
    ///
    /// # Errors
    ///
    /// An error with kind [`BuildError`] is returned if
    ///
    ///  - `keys` and `values` differ in length ([`BuildError::KeyValueLengthMismatch`]),
    ///  - a key is inserted twice ([`BuildError::DuplicateKey`]), or
    ///  - a key does not sort after every earlier key, including the case where it
    ///    is a prefix of an earlier key ([`BuildError::KeyOutOfOrder`]).
    ///
    /// Errors other than the length mismatch carry the offending key as context.
    ///
    /// # Complexity
    ///
    /// Linear in the total length of keys.
    pub fn new<K>(keys: &[K], values: Vec<V>) -> Result<Self>
    where
        K: AsRef<[u8]>,
    {
        if keys.len() != values.len() {
            return Err(BuildError::KeyValueLengthMismatch.into());
        }
        let mut trie = Self::default();
        let mut prev: Option<&[u8]> = None;
        for (key, value) in keys.iter().zip(values) {
            let key = key.as_ref();
            match prev.map(|prev| key.cmp(prev)) {
                Some(Ordering::Less) => {
                    return Err(BuildError::KeyOutOfOrder).with_context(|| key_context(key))
                }
                Some(Ordering::Equal) => {
                    return Err(BuildError::DuplicateKey).with_context(|| key_context(key))
                }
                _ => {}
            }
            prev = Some(key);
            match trie.add_kv(key, value, false, false) {
                Ok(Slot::Created) => {}
                Ok(Slot::Occupied { .. }) => {
                    return Err(BuildError::DuplicateKey).with_context(|| key_context(key))
                }
                Err(e) => return Err(e).with_context(|| key_context(key)),
            }
        }
        Ok(trie)
    }

    /// Inserts one key, creating a node per unmatched byte and a leaf for `value`.
    ///
    /// Nothing is modified when an error is returned.
    fn add_kv(
        &mut self,
        key: &[u8],
        value: V,
        is_start_leaf: bool,
        is_end_leaf: bool,
    ) -> Result<Slot<V>, BuildError> {
        let mut node = ROOT;
        let mut j = 0;
        while let Some(child) = self.node(node).child(Branch::of(key, j)) {
            if j == key.len() {
                return Ok(Slot::Occupied { leaf: child, value });
            }
            node = child;
            j += 1;
        }

        let br = Branch::of(key, j);
        if let Some(&last) = self.node(node).branches.last() {
            // Also rejects a key ending where a longer key already continues.
            if last > br {
                return Err(BuildError::KeyOutOfOrder);
            }
        }

        for &b in &key[j..] {
            let id = self.push(Node::inner());
            self.node_mut(node).attach(Branch::Byte(b), id);
            node = id;
        }
        let leaf = self.push(Node::leaf(value, is_start_leaf, is_end_leaf));
        self.node_mut(node).attach(Branch::EndOfKey, leaf);
        Ok(Slot::Created)
    }

    #[inline(always)]
    fn node(&self, id: NodeId) -> &Node<V> {
        &self.nodes[id.0]
    }

    #[inline(always)]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<V> {
        &mut self.nodes[id.0]
    }

    fn push(&mut self, node: Node<V>) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Collapses every node with a single non-[`Branch::EndOfKey`] branch into its child.
    ///
    /// The child inherits the collapsed node's step, so one edge then consumes
    /// several key bytes. Search results for inserted keys are unchanged.
    pub fn squash(&mut self) {
        let before = self.nodes.len();
        self.squash_at(ROOT);
        self.compact();
        debug!(before, after = self.nodes.len(), "squashed trie");
    }

    fn squash_at(&mut self, root: NodeId) {
        // Reversed pre-order visits every subtree before its parent.
        for id in self.preorder(root).into_iter().rev() {
            for i in 0..self.node(id).children.len() {
                let child = self.node(id).children[i];
                let c = self.node(child);
                if c.branches.len() == 1 && c.branches[0] != Branch::EndOfKey {
                    let grandchild = c.children[0];
                    let step = c.step;
                    self.node_mut(grandchild).step += step;
                    self.node_mut(id).children[i] = grandchild;
                }
            }
        }
    }

    fn preorder(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.node(id).children.iter().rev());
        }
        order
    }

    /// Searches `key`, returning the values of its nearest smaller key,
    /// itself, and its nearest greater key.
    ///
    /// Absent neighbors are reported as [`None`].
    ///
    /// # Complexity
    ///
    /// $`O(m \lg \sigma)`$ for a key of length $`m`$ and at most $`\sigma = 257`$ branches per node.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use slimidx::Trie;
    ///
    /// let keys: Vec<[u8; 1]> = (1..=6).map(|i| [i * 10]).collect();
    /// let trie = Trie::new(&keys, (1..=6).map(|i| i * 10).collect())?;
    ///
    /// let r = trie.search([25]);
    /// assert_eq!((r.lt, r.eq, r.gt), (Some(&20), None, Some(&30)));
    /// let r = trie.search([10]);
    /// assert_eq!(r.eq, Some(&10));
    /// let r = trie.search([5]);
    /// assert_eq!((r.lt, r.gt), (None, Some(&10)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn search<K>(&self, key: K) -> SearchResult<'_, V>
    where
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        let mut lt = None;
        let mut gt = None;
        let mut node = ROOT;
        let mut i = 0;

        let eq = loop {
            let br = Branch::of(key, i);
            let (l, r) = self.node(node).neighbors(br);
            if l.is_some() {
                lt = l;
            }
            if r.is_some() {
                gt = r;
            }

            let Some(child) = self.node(node).child(br) else {
                break None;
            };
            if br == Branch::EndOfKey {
                break Some(child);
            }
            i += self.node(child).step as usize;
            if i > key.len() {
                // The key ends inside this edge, so every key below it is greater.
                gt = Some(child);
                break None;
            }
            node = child;
        };

        SearchResult {
            lt: lt.and_then(|id| self.node(self.rightmost(id)).value.as_ref()),
            eq: eq.and_then(|id| self.node(id).value.as_ref()),
            gt: gt.and_then(|id| self.node(self.leftmost(id)).value.as_ref()),
        }
    }

    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(&child) = self.node(id).children.first() {
            id = child;
        }
        id
    }

    fn rightmost(&self, mut id: NodeId) -> NodeId {
        while let Some(&child) = self.node(id).children.last() {
            id = child;
        }
        id
    }

    /// Removes every leaf marking only a range end, then every node left without branches.
    ///
    /// Afterwards a query equal to an end boundary matches exactly only if
    /// that key also starts a range.
    pub fn remove_end_leaves(&mut self) {
        let before = self.nodes.len();
        self.remove_end_leaves_at(ROOT);
        self.compact();
        debug!(before, after = self.nodes.len(), "removed end leaves");
    }

    fn remove_end_leaves_at(&mut self, root: NodeId) {
        for id in self.preorder(root).into_iter().rev() {
            if let Some(leaf) = self.node(id).child(Branch::EndOfKey) {
                let leaf = self.node(leaf);
                if leaf.is_end_leaf && !leaf.is_start_leaf {
                    // The sentinel always sorts first.
                    self.node_mut(id).detach_at(0);
                }
            }

            // Inner nodes emptied below are dropped; leaves never have branches.
            let mut i = 0;
            while i < self.node(id).children.len() {
                let child = self.node(id).children[i];
                let c = self.node(child);
                if c.branches.is_empty() && c.value.is_none() {
                    self.node_mut(id).detach_at(i);
                } else {
                    i += 1;
                }
            }
        }
    }

    /// Drops unreachable nodes and renumbers the rest breadth-first.
    fn compact(&mut self) {
        let mut old: Vec<Option<Node<V>>> = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(Some)
            .collect();
        let mut nodes = Vec::with_capacity(old.len());
        let mut queue = VecDeque::from([ROOT]);
        let mut next = 1;

        while let Some(id) = queue.pop_front() {
            let mut node = old[id.0]
                .take()
                .expect("every trie node has a single parent");
            for child in &mut node.children {
                queue.push_back(*child);
                *child = NodeId(next);
                next += 1;
            }
            nodes.push(node);
        }
        self.nodes = nodes;
    }

    /// Gets the number of nodes, leaves included.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Checks if the trie holds no key.
    pub fn is_empty(&self) -> bool {
        self.node(ROOT).branches.is_empty()
    }

    /// Renders the trie as text, one line per leaf.
    ///
    /// Each node is shown as its incoming branch (a 3-digit byte, or `$` for the
    /// end of a key) followed by its number of branches. Children continue the
    /// line of their first sibling and are indented below it for the others.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use slimidx::Trie;
    ///
    /// let trie = Trie::new(&["ab", "ac"], vec![0, 1])?;
    /// assert_eq!(
    ///     trie.to_strings(),
    ///     vec![
    ///         "097(2):098(1):  $(0):",
    ///         "       099(1):  $(0):",
    ///     ]
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub fn to_strings(&self) -> Vec<String> {
        let mut lines = vec![];
        let mut line = String::new();
        let mut stack = vec![];
        self.push_labeled_children(&mut stack, ROOT, 0);

        while let Some((id, br, indent)) = stack.pop() {
            if line.is_empty() {
                line = " ".repeat(indent);
            }
            let node = self.node(id);
            match br {
                Branch::EndOfKey => line.push_str(&format!("  $({}):", node.branches.len())),
                Branch::Byte(b) => line.push_str(&format!("{:03}({}):", b, node.branches.len())),
            }
            if node.children.is_empty() {
                lines.push(std::mem::take(&mut line));
            } else {
                self.push_labeled_children(&mut stack, id, line.len());
            }
        }
        lines
    }

    fn push_labeled_children(
        &self,
        stack: &mut Vec<(NodeId, Branch, usize)>,
        id: NodeId,
        indent: usize,
    ) {
        let node = self.node(id);
        for (&br, &child) in node.branches.iter().zip(&node.children).rev() {
            stack.push((child, br, indent));
        }
    }
}

impl<V> Trie<V>
where
    V: Clone,
{
    /// Builds a trie over the boundaries of ascending, disjoint ranges.
    ///
    /// Range `i` spans `starts[i]..=ends[i]` and maps to `values[i]`; its start
    /// and end keys are inserted as leaves flagged as a start and an end.
    /// A key shared by an end and a start, e.g. `ends[i] == starts[i + 1]` or
    /// `starts[i] == ends[i]`, becomes a single leaf carrying both flags and the
    /// value of the range it starts.
    ///
    /// # Errors
    ///
    /// An error with kind [`BuildError`] is returned if `starts` and `ends` differ
    /// in length ([`BuildError::RangeLengthMismatch`]), and otherwise under the
    /// same conditions as [`Trie::new()`], taking boundaries in the order
    /// `starts[0], ends[0], starts[1], ...`.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use slimidx::Trie;
    ///
    /// let mut trie = Trie::new_range(&["a", "c"], &["b", "d"], vec![1, 2])?;
    /// trie.remove_end_leaves();
    ///
    /// assert_eq!(trie.search("a").eq, Some(&1));
    /// assert_eq!(trie.search("b").eq, None);
    /// // "bb" may only belong to the range starting at "a".
    /// assert_eq!(trie.search("bb").lt, Some(&1));
    /// # Ok(())
    /// # }
    /// ```
    pub fn new_range<K>(starts: &[K], ends: &[K], values: Vec<V>) -> Result<Self>
    where
        K: AsRef<[u8]>,
    {
        if starts.len() != ends.len() {
            return Err(BuildError::RangeLengthMismatch.into());
        }
        if starts.len() != values.len() {
            return Err(BuildError::KeyValueLengthMismatch.into());
        }
        let mut trie = Self::default();
        let mut prev = None;
        for ((start, end), value) in starts.iter().zip(ends).zip(values) {
            trie.add_boundary(&mut prev, start.as_ref(), value.clone(), true)?;
            trie.add_boundary(&mut prev, end.as_ref(), value, false)?;
        }
        Ok(trie)
    }

    /// Inserts one boundary; an equal `prev` is merged or rejected as a duplicate.
    fn add_boundary<'k>(
        &mut self,
        prev: &mut Option<&'k [u8]>,
        key: &'k [u8],
        value: V,
        is_start: bool,
    ) -> Result<()> {
        if prev.map_or(false, |prev| key < prev) {
            return Err(BuildError::KeyOutOfOrder).with_context(|| key_context(key));
        }
        *prev = Some(key);

        let slot = self
            .add_kv(key, value, is_start, !is_start)
            .with_context(|| key_context(key))?;
        if let Slot::Occupied { leaf, value } = slot {
            let leaf = self.node_mut(leaf);
            if is_start && !leaf.is_start_leaf {
                leaf.is_start_leaf = true;
                leaf.value = Some(value);
            } else if !is_start && !leaf.is_end_leaf {
                leaf.is_end_leaf = true;
            } else {
                return Err(BuildError::DuplicateKey).with_context(|| key_context(key));
            }
        }
        Ok(())
    }
}

impl<V> fmt::Display for Trie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.to_strings() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn key_context(key: &[u8]) -> String {
    format!("key: {}", String::from_utf8_lossy(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::ops::Bound;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    fn gen_random_keys(len: usize, seed: u64) -> BTreeMap<Vec<u8>, usize> {
        let mut rng = ChaChaRng::seed_from_u64(seed);
        let mut keys = BTreeMap::new();
        while keys.len() < len {
            let n = rng.gen_range(0..6);
            // A narrow alphabet yields shared prefixes and prefix keys.
            let key: Vec<u8> = (0..n).map(|_| rng.gen_range(b'a'..b'e')).collect();
            let next = keys.len();
            keys.entry(key).or_insert(next);
        }
        keys
    }

    fn build(map: &BTreeMap<Vec<u8>, usize>) -> Trie<usize> {
        let keys: Vec<&Vec<u8>> = map.keys().collect();
        Trie::new(&keys, map.values().copied().collect()).unwrap()
    }

    fn expected<'a>(map: &'a BTreeMap<Vec<u8>, usize>, key: &[u8]) -> SearchResult<'a, usize> {
        SearchResult {
            lt: map
                .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key)))
                .next_back()
                .map(|(_, v)| v),
            eq: map.get(key),
            gt: map
                .range::<[u8], _>((Bound::Excluded(key), Bound::Unbounded))
                .next()
                .map(|(_, v)| v),
        }
    }

    fn build_int_keys() -> Trie<u8> {
        let keys: Vec<[u8; 1]> = [10, 20, 30, 40, 50, 60].iter().map(|&i| [i]).collect();
        Trie::new(&keys, vec![10, 20, 30, 40, 50, 60]).unwrap()
    }

    #[test]
    fn test_search_int_keys() {
        let mut trie = build_int_keys();
        for _ in 0..2 {
            let r = trie.search([25]);
            assert_eq!((r.lt, r.eq, r.gt), (Some(&20), None, Some(&30)));
            let r = trie.search([10]);
            assert_eq!((r.lt, r.eq, r.gt), (None, Some(&10), Some(&20)));
            let r = trie.search([5]);
            assert_eq!((r.lt, r.eq, r.gt), (None, None, Some(&10)));
            let r = trie.search([60]);
            assert_eq!((r.lt, r.eq, r.gt), (Some(&50), Some(&60), None));
            let r = trie.search([61]);
            assert_eq!((r.lt, r.eq, r.gt), (Some(&60), None, None));
            let r = trie.search(b"");
            assert_eq!((r.lt, r.eq, r.gt), (None, None, Some(&10)));
            trie.squash();
        }
    }

    #[test]
    fn test_prefix_keys() {
        let trie = Trie::new(&["", "a", "ab", "abc", "b"], vec![0, 1, 2, 3, 4]).unwrap();
        let r = trie.search("ab");
        assert_eq!((r.lt, r.eq, r.gt), (Some(&1), Some(&2), Some(&3)));
        let r = trie.search("");
        assert_eq!((r.lt, r.eq, r.gt), (None, Some(&0), Some(&1)));
        let r = trie.search("abb");
        assert_eq!((r.lt, r.eq, r.gt), (Some(&2), None, Some(&3)));
        let r = trie.search("abcd");
        assert_eq!((r.lt, r.eq, r.gt), (Some(&3), None, Some(&4)));
    }

    #[test]
    fn test_empty() {
        let trie = Trie::<u32>::new::<&str>(&[], vec![]).unwrap();
        assert!(trie.is_empty());
        assert_eq!(trie.num_nodes(), 1);
        let r = trie.search("x");
        assert_eq!((r.lt, r.eq, r.gt), (None, None, None));
        assert!(trie.to_strings().is_empty());
    }

    #[test]
    fn test_out_of_order() {
        let e = Trie::new(&["b", "a"], vec![1, 2]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::KeyOutOfOrder));

        let e = Trie::new(&["ab", "b", "aa"], vec![1, 2, 3]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::KeyOutOfOrder));
        assert_eq!(e.to_string(), "key: aa");
    }

    #[test]
    fn test_out_of_order_below_older_branch() {
        // "ac" only meets "a" on its path, yet sorts before "b".
        let e = Trie::new(&["a", "b", "ac"], vec![1, 2, 3]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::KeyOutOfOrder));
        assert_eq!(e.to_string(), "key: ac");

        let e = Trie::new_range(&["a", "ac"], &["b", "ad"], vec![1, 2]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::KeyOutOfOrder));
        assert_eq!(e.to_string(), "key: ac");

        let e = Trie::new_range(&["a", "a"], &["b", "c"], vec![1, 2]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::KeyOutOfOrder));
        assert_eq!(e.to_string(), "key: a");
    }

    #[test]
    fn test_prefix_after_longer_key() {
        let e = Trie::new(&["abc", "ab"], vec![1, 2]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::KeyOutOfOrder));
        let e = Trie::new(&["a", ""], vec![1, 2]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::KeyOutOfOrder));
    }

    #[test]
    fn test_duplicate() {
        let e = Trie::new(&["a", "b", "b"], vec![1, 2, 3]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::DuplicateKey));
        assert_eq!(e.to_string(), "key: b");
        assert_eq!(
            format!("{e:#}"),
            "key: b: keys can not be duplicate".to_string()
        );
    }

    #[test]
    fn test_length_mismatch() {
        let e = Trie::new(&["a", "b"], vec![1]).unwrap_err();
        assert_eq!(
            e.downcast_ref::<BuildError>(),
            Some(&BuildError::KeyValueLengthMismatch)
        );
        let e = Trie::new_range(&["a"], &["b", "c"], vec![1]).unwrap_err();
        assert_eq!(
            e.downcast_ref::<BuildError>(),
            Some(&BuildError::RangeLengthMismatch)
        );
        let e = Trie::new_range(&["a"], &["b"], vec![1, 2]).unwrap_err();
        assert_eq!(
            e.downcast_ref::<BuildError>(),
            Some(&BuildError::KeyValueLengthMismatch)
        );
    }

    #[test]
    fn test_random_against_map() {
        for seed in 0..20 {
            let map = gen_random_keys(200, seed);
            let trie = build(&map);
            let mut rng = ChaChaRng::seed_from_u64(seed + 1000);
            for _ in 0..500 {
                let n = rng.gen_range(0..7);
                let probe: Vec<u8> = (0..n).map(|_| rng.gen_range(b'a'..b'f')).collect();
                assert_eq!(trie.search(&probe), expected(&map, &probe), "{probe:?}");
            }
        }
    }

    #[test]
    fn test_squash_keeps_results_of_keys() {
        for seed in 0..20 {
            let map = gen_random_keys(200, seed);
            let mut trie = build(&map);
            let before: Vec<_> = map
                .keys()
                .map(|k| trie.search(k))
                .map(|r| (r.lt.copied(), r.eq.copied(), r.gt.copied()))
                .collect();
            let num_nodes = trie.num_nodes();
            trie.squash();
            assert!(trie.num_nodes() <= num_nodes);
            for (key, b) in map.keys().zip(before) {
                let r = trie.search(key);
                assert_eq!((r.lt.copied(), r.eq.copied(), r.gt.copied()), b);
                assert_eq!(r, expected(&map, key));
            }
        }
    }

    #[test]
    fn test_squash_steps() {
        let mut trie = Trie::new(&["abc", "abd"], vec![1, 2]).unwrap();
        assert_eq!(trie.num_nodes(), 7);
        trie.squash();
        assert_eq!(trie.num_nodes(), 6);
        assert_eq!(
            trie.to_strings(),
            vec!["097(2):099(1):  $(0):", "       100(1):  $(0):"]
        );

        // Shorter than the collapsed edge: everything below it is greater.
        let r = trie.search("a");
        assert_eq!((r.lt, r.eq, r.gt), (None, None, Some(&1)));
        // Collapsed bytes are not compared.
        assert_eq!(trie.search("axd").eq, Some(&2));

        // Idempotent.
        let lines = trie.to_strings();
        trie.squash();
        assert_eq!(trie.to_strings(), lines);
    }

    #[test]
    fn test_squash_keeps_end_of_key_chains() {
        let mut trie = Trie::new(&["a", "abcd"], vec![1, 2]).unwrap();
        trie.squash();
        assert_eq!(trie.search("a").eq, Some(&1));
        assert_eq!(trie.search("abcd").eq, Some(&2));
        assert_eq!(trie.search("abc").eq, None);
        assert_eq!(trie.search("abc").gt, Some(&2));
    }

    #[test]
    fn test_range_merges_shared_boundaries() {
        let mut trie =
            Trie::new_range(&["a", "b", "d"], &["b", "c", "d"], vec![1, 2, 3]).unwrap();
        let r = trie.search("b");
        assert_eq!(r.eq, Some(&2));
        trie.remove_end_leaves();
        assert_eq!(trie.search("a").eq, Some(&1));
        assert_eq!(trie.search("b").eq, Some(&2));
        assert_eq!(trie.search("c").eq, None);
        assert_eq!(trie.search("c").lt, Some(&2));
        assert_eq!(trie.search("d").eq, Some(&3));
    }

    #[test]
    fn test_range_duplicate_boundaries() {
        let e = Trie::new_range(&["a", "a"], &["a", "c"], vec![1, 2]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::DuplicateKey));
        assert_eq!(e.to_string(), "key: a");

        let trie = Trie::new_range(&["a", "b"], &["a", "b"], vec![1, 2]).unwrap();
        assert_eq!(trie.search("a").eq, Some(&1));
        assert_eq!(trie.search("b").eq, Some(&2));

        let e = Trie::new_range(&["a", "c"], &["c", "c"], vec![1, 2]).unwrap_err();
        assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::DuplicateKey));
        assert_eq!(e.to_string(), "key: c");
    }

    #[test]
    fn test_remove_end_leaves_prunes_nodes() {
        let mut trie = Trie::new_range(&["ab"], &["ac"], vec![7]).unwrap();
        assert_eq!(trie.num_nodes(), 6);
        trie.remove_end_leaves();
        assert_eq!(trie.num_nodes(), 4);
        assert_eq!(trie.search("ac").eq, None);
        assert_eq!(trie.search("ac").lt, Some(&7));
        assert_eq!(trie.search("ab").eq, Some(&7));

        let mut trie = Trie::new_range(&[""], &["z"], vec![7]).unwrap();
        trie.remove_end_leaves();
        trie.squash();
        assert_eq!(trie.num_nodes(), 2);
        assert_eq!(trie.search("m").lt, Some(&7));
    }

    #[test]
    fn test_long_key() {
        let key = vec![b'x'; 300_000];
        let mut trie = Trie::new(&[&key], vec![1u8]).unwrap();
        assert_eq!(trie.num_nodes(), key.len() + 2);
        assert_eq!(trie.to_strings().len(), 1);

        trie.squash();
        assert_eq!(trie.num_nodes(), 3);
        assert_eq!(trie.search(&key).eq, Some(&1));
        assert_eq!(trie.search(&key[..10]).gt, Some(&1));
        assert_eq!(trie.to_strings(), vec!["120(1):  $(0):"]);
    }

    #[test]
    fn test_long_range_boundaries() {
        let mut start = vec![b'x'; 200_000];
        let mut end = start.clone();
        start.push(b'a');
        end.push(b'b');

        let mut trie = Trie::new_range(&[&start], &[&end], vec![7]).unwrap();
        trie.remove_end_leaves();
        assert_eq!(trie.search(&start).eq, Some(&7));
        assert_eq!(trie.search(&end).eq, None);
        assert_eq!(trie.search(&end).lt, Some(&7));
        assert_eq!(trie.num_nodes(), start.len() + 2);
    }

    #[test]
    fn test_display() {
        let trie = Trie::new(&["a"], vec![()]).unwrap();
        assert_eq!(trie.to_string(), "097(1):  $(0):\n");
    }
}
