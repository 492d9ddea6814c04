//! Letter-prefix grouping for large browse lists.
//!
//! A flat sorted list is partitioned recursively into a tree of prefix
//! groups so a constrained display never shows thousands of siblings.
//! The tree is an arena of nodes addressed by index with explicit child
//! lists; group nodes are synthetic navigable entries, not stored rows.

/// Sort key for items whose comparison field is empty.
const EMPTY_KEY: &str = "_";

/// Lists at most this small are never subdivided.
const MIN_GROUP_SIZE: usize = 8;

/// One node of a catalog tree: either a synthetic prefix group or a leaf
/// wrapping an input item.
#[derive(Debug)]
pub struct CatalogNode<T> {
    /// Display label; `prefix + "..."` for groups, empty for leaves.
    pub label: String,
    /// Virtual path of a group node (`tag + prefix`), empty for leaves.
    pub pathname: String,
    pub children: Vec<usize>,
    pub item: Option<T>,
}

/// Arena tree produced by [`group_items`]. Node 0 is the root.
#[derive(Debug)]
pub struct CatalogTree<T> {
    nodes: Vec<CatalogNode<T>>,
}

impl<T> CatalogTree<T> {
    pub const ROOT: usize = 0;

    pub fn node(&self, index: usize) -> &CatalogNode<T> {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Leaf items in depth-first (display) order.
    pub fn leaves(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_leaves(Self::ROOT, &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, index: usize, out: &mut Vec<&'a T>) {
        let node = &self.nodes[index];
        if let Some(item) = &node.item {
            out.push(item);
        }
        for &child in &node.children {
            self.collect_leaves(child, out);
        }
    }

    fn add_group(&mut self, parent: usize, prefix: &str, tag: &str) -> usize {
        let index = self.nodes.len();
        self.nodes.push(CatalogNode {
            label: format!("{prefix}..."),
            pathname: format!("{tag}{prefix}"),
            children: Vec::new(),
            item: None,
        });
        self.nodes[parent].children.push(index);
        index
    }

    fn add_leaf(&mut self, parent: usize, item: T) {
        let index = self.nodes.len();
        self.nodes.push(CatalogNode {
            label: String::new(),
            pathname: String::new(),
            children: Vec::new(),
            item: Some(item),
        });
        self.nodes[parent].children.push(index);
    }
}

/// Group a list of items into a letter-prefix tree.
///
/// Items are sorted by the case-folded value of `extract` (empty values
/// sort under `"_"`), then partitioned: a range is attached flat when
/// subdividing would not meaningfully reduce the branching factor, and
/// split into contiguous equal-prefix runs otherwise. Every input item
/// becomes exactly one leaf, in sorted order.
pub fn group_items<T, F>(items: Vec<T>, group_prefix_tag: &str, extract: F) -> CatalogTree<T>
where
    F: Fn(&T) -> Option<&str>,
{
    let mut slots: Vec<(String, Option<T>)> = items
        .into_iter()
        .map(|item| {
            let key = match extract(&item) {
                Some(field) if !field.is_empty() => field.to_uppercase(),
                _ => EMPTY_KEY.to_string(),
            };
            (key, Some(item))
        })
        .collect();
    slots.sort_by(|a, b| a.0.cmp(&b.0));

    let mut tree = CatalogTree {
        nodes: vec![CatalogNode {
            label: String::new(),
            pathname: String::new(),
            children: Vec::new(),
            item: None,
        }],
    };
    let end = slots.len();
    add_grouped(&mut tree, CatalogTree::<T>::ROOT, &mut slots, 0, end, group_prefix_tag, 1);
    tree
}

fn first_letters(key: &str, level: usize) -> String {
    key.chars().take(level).collect()
}

fn add_grouped<T>(
    tree: &mut CatalogTree<T>,
    parent: usize,
    slots: &mut [(String, Option<T>)],
    start: usize,
    end: usize,
    tag: &str,
    level: usize,
) {
    let item_count = end - start;
    if item_count == 0 {
        return;
    }
    // Nested levels get an intermediate group labeled by the shorter
    // shared prefix; level 1 attaches directly under the caller's parent.
    let mut parent = parent;
    if level > 1 && item_count > 1 {
        let base = first_letters(&slots[start].0, level - 1);
        parent = tree.add_group(parent, &base, tag);
    }

    // Count the contiguous runs of equal level-length prefixes. The list
    // is sorted, so equal prefixes are adjacent.
    let mut bucket_count = 0usize;
    let mut last_prefix: Option<String> = None;
    for slot in slots[start..end].iter() {
        let prefix = first_letters(&slot.0, level);
        if last_prefix.as_deref() != Some(prefix.as_str()) {
            bucket_count += 1;
            last_prefix = Some(prefix);
        }
    }

    // A run of identical full keys can never split further; without this
    // the single-bucket case below would recurse forever.
    let exhausted = bucket_count == 1 && slots[start].0.chars().count() <= level;

    if item_count <= bucket_count * 11 / 10 || item_count < MIN_GROUP_SIZE || exhausted {
        for slot in slots[start..end].iter_mut() {
            if let Some(item) = slot.1.take() {
                tree.add_leaf(parent, item);
            }
        }
        return;
    }

    let mut i = start;
    while i < end {
        let prefix = first_letters(&slots[i].0, level);
        let mut j = i + 1;
        while j < end && first_letters(&slots[j].0, level) == prefix {
            j += 1;
        }
        add_grouped(tree, parent, slots, i, j, tag, level + 1);
        i = j;
    }
}
