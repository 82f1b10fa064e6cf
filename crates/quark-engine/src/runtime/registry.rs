//! Namespace tree of published modules
//!
//! Names are split on `/` into interned segments: the package first, then the
//! module path. A node can carry exports and children at once, so `app/ui` and
//! `app/ui/button` coexist. Looking up a node without exports falls back to
//! its `index` child.

use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::exports::Exports;

const INDEX: &str = "index";

#[derive(Debug, Default)]
struct Node {
    exports: Option<Arc<Exports>>,
    children: BTreeMap<Arc<str>, Node>,
}

/// Owned namespace tree, keyed by interned path segments
#[derive(Debug, Default)]
pub struct Registry {
    root: Node,
    segments: FxHashSet<Arc<str>>,
    defined: usize,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Exports published under `name`, falling back to `name/index`
    pub fn get(&self, name: &str) -> Option<Arc<Exports>> {
        let node = self.node(name)?;
        node.exports
            .clone()
            .or_else(|| node.children.get(INDEX).and_then(|index| index.exports.clone()))
    }

    /// Exports published under exactly `name`
    pub fn get_exact(&self, name: &str) -> Option<Arc<Exports>> {
        self.node(name)?.exports.clone()
    }

    /// Whether `name` resolves (with the `index` fallback)
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Publish `exports` under `name`, returning what was there before
    pub fn insert(&mut self, name: &str, exports: Arc<Exports>) -> Option<Arc<Exports>> {
        let keys: Vec<Arc<str>> = split(name).map(|segment| self.intern(segment)).collect();

        let mut node = &mut self.root;
        for key in keys {
            node = node.children.entry(key).or_default();
        }

        let previous = node.exports.replace(exports);
        if previous.is_none() {
            self.defined += 1;
        }
        previous
    }

    /// Every published name, depth-first in segment order
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.defined);
        collect(&self.root, &mut Vec::new(), &mut names);
        names
    }

    /// Number of published modules
    pub fn len(&self) -> usize {
        self.defined
    }

    /// Whether nothing has been published
    pub fn is_empty(&self) -> bool {
        self.defined == 0
    }

    fn node(&self, name: &str) -> Option<&Node> {
        split(name).try_fold(&self.root, |node, segment| node.children.get(segment))
    }

    fn intern(&mut self, segment: &str) -> Arc<str> {
        if let Some(existing) = self.segments.get(segment) {
            return existing.clone();
        }
        let interned: Arc<str> = Arc::from(segment);
        self.segments.insert(interned.clone());
        interned
    }
}

fn split(name: &str) -> impl Iterator<Item = &str> {
    name.split('/').filter(|s| !s.is_empty())
}

fn collect<'a>(node: &'a Node, path: &mut Vec<&'a str>, out: &mut Vec<String>) {
    if node.exports.is_some() {
        out.push(path.join("/"));
    }
    for (segment, child) in &node.children {
        path.push(segment);
        collect(child, path, out);
        path.pop();
    }
}
