//! Read-only views of the tree for debugging and tests.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::common::{CorruptionKind, Error, PageId, Result};
use crate::storage::page::PageType;

use super::node::Node;
use super::tree::BPlusTree;

/// Decoded contents of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub page_id: PageId,
    pub page_type: PageType,
    pub parent: PageId,
    pub next: PageId,
    pub prev: PageId,
    pub keys: Vec<i32>,
    /// Leaf values, parallel to `keys`.
    pub values: Vec<i32>,
    /// Internal children, one more than `keys`.
    pub children: Vec<PageId>,
}

impl NodeSummary {
    pub fn is_leaf(&self) -> bool {
        self.page_type == PageType::Leaf
    }
}

fn id(page_id: PageId) -> String {
    if page_id.is_valid() {
        page_id.0.to_string()
    } else {
        "-".to_string()
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for NodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_leaf() { "leaf" } else { "internal" };
        writeln!(f, "page: {}", self.page_id.0)?;
        writeln!(f, "type: {kind}")?;
        writeln!(f, "key_count: {}", self.keys.len())?;
        writeln!(f, "parent: {}", id(self.parent))?;
        writeln!(f, "next: {}", id(self.next))?;
        writeln!(f, "prev: {}", id(self.prev))?;
        writeln!(f, "keys: {}", join(&self.keys))?;
        if self.is_leaf() {
            writeln!(f, "values: {}", join(&self.values))
        } else {
            let children: Vec<u32> = self.children.iter().map(|c| c.0).collect();
            writeln!(f, "children: {}", join(&children))
        }
    }
}

impl BPlusTree {
    /// Decode a single node.
    pub fn summarize(&self, page_id: PageId) -> Result<NodeSummary> {
        let guard = self.buffer_pool().fetch_page_read(page_id)?;
        let node = Node::open(&*guard)?;

        let (keys, values, children) = if node.is_leaf() {
            let (keys, values): (Vec<i32>, Vec<i32>) = node.leaf_entries()?.into_iter().unzip();
            (keys, values, Vec::new())
        } else {
            (node.keys()?, Vec::new(), node.children()?)
        };

        Ok(NodeSummary {
            page_id,
            page_type: node.page_type(),
            parent: node.parent(),
            next: node.next(),
            prev: node.prev(),
            keys,
            values,
            children,
        })
    }

    /// Breadth-first listing of every node, one `Vec` per level, root first.
    pub fn levels(&self) -> Result<Vec<Vec<NodeSummary>>> {
        let mut levels = Vec::new();
        let mut seen = HashSet::new();
        let mut frontier = vec![self.root_page_id()];

        while !frontier.is_empty() {
            let mut level = Vec::with_capacity(frontier.len());
            let mut next_frontier = Vec::new();
            for page_id in frontier {
                if !seen.insert(page_id) {
                    return Err(Error::corruption(page_id.0, CorruptionKind::SiblingCycle));
                }
                let summary = self.summarize(page_id)?;
                next_frontier.extend(summary.children.iter().copied());
                level.push(summary);
            }
            levels.push(level);
            frontier = next_frontier;
        }
        Ok(levels)
    }

    /// One line per level listing each node's keys.
    ///
    /// ```text
    /// Level 0: [20]
    /// Level 1: [5 10 15] [20 25]
    /// ```
    pub fn describe(&self) -> Result<String> {
        let mut out = String::new();
        for (depth, level) in self.levels()?.iter().enumerate() {
            let nodes: Vec<String> = level
                .iter()
                .map(|node| format!("[{}]", join(&node.keys)))
                .collect();
            out.push_str(&format!("Level {depth}: {}\n", nodes.join(" ")));
        }
        Ok(out)
    }

    /// Leaf page ids in sibling order starting at the first leaf.
    pub fn leaf_chain(&self) -> Result<Vec<PageId>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut page_id = self.first_leaf_page_id();

        while page_id.is_valid() {
            if !seen.insert(page_id) {
                return Err(Error::corruption(page_id.0, CorruptionKind::SiblingCycle));
            }
            chain.push(page_id);
            let guard = self.buffer_pool().fetch_page_read(page_id)?;
            page_id = Node::open(&*guard)?.next();
        }
        Ok(chain)
    }

    /// Number of levels; 1 for a tree that is a single leaf.
    pub fn height(&self) -> Result<usize> {
        let mut height = 1;
        let mut page_id = self.root_page_id();
        loop {
            let guard = self.buffer_pool().fetch_page_read(page_id)?;
            let node = Node::open(&*guard)?;
            if node.is_leaf() {
                return Ok(height);
            }
            page_id = node.first_child();
            height += 1;
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> Result<usize> {
        let mut total = 0;
        for page_id in self.leaf_chain()? {
            let guard = self.buffer_pool().fetch_page_read(page_id)?;
            total += Node::open(&*guard)?.len()?;
        }
        Ok(total)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Write `page_<id>.txt` for every reachable node into `dir`.
    ///
    /// Returns the number of files written.
    pub fn dump_pages<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut written = 0;
        for summary in self.levels()?.into_iter().flatten() {
            let path = dir.join(format!("page_{}.txt", summary.page_id.0));
            fs::write(&path, summary.to_string())?;
            written += 1;
        }

        debug!(dir = %dir.display(), written, "dumped pages");
        Ok(written)
    }
}
