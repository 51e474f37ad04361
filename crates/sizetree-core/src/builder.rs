//! Incremental size tree builder on top of petgraph::StableDiGraph

use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use tracing::trace;

use crate::model::*;
use crate::path::{boundary, dirname, short_name_index};

/// Derives the grouping idPath of a file record.
pub type PathFn = Box<dyn Fn(&FileEntry) -> String + Send + Sync>;

/// Decides whether a candidate symbol node is attached to the tree.
pub type FilterFn = Box<dyn Fn(&TreeNode) -> bool + Send + Sync>;

/// Aggregates file records into a tree of directories, components, files and symbols.
///
/// Containment is a parent → child edge. Every size and stats update goes
/// through [`TreeBuilder::attach_to_parent`], so container totals are always
/// in sync after each [`TreeBuilder::add_file_entry`].
pub struct TreeBuilder {
    inner: StableDiGraph<TreeNode, ()>,
    root: NodeId,
    /// Directory and component nodes by idPath. Non-owning index into `inner`.
    parents: HashMap<String, NodeId>,
    get_path: PathFn,
    filter_test: FilterFn,
    sep: char,
    ingested_bytes: f64,
}

impl std::fmt::Debug for TreeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeBuilder")
            .field("node_count", &self.inner.node_count())
            .field("sep", &self.sep)
            .field("ingested_bytes", &self.ingested_bytes)
            .finish()
    }
}

fn to_index(id: NodeId) -> NodeIndex {
    NodeIndex::new(id.0 as usize)
}

fn to_id(idx: NodeIndex) -> NodeId {
    NodeId(idx.index() as u64)
}

impl TreeBuilder {
    /// Create a builder using `/` as the grouping separator.
    pub fn new(get_path: PathFn, filter_test: FilterFn) -> Self {
        let mut inner = StableDiGraph::new();
        let root_node = TreeNode::container(PATH_SEP.to_string(), 0, ContainerKind::Directory);
        let root = to_id(inner.add_node(root_node));
        let parents = HashMap::from([(PATH_SEP.to_string(), root)]);
        TreeBuilder {
            inner,
            root,
            parents,
            get_path,
            filter_test,
            sep: PATH_SEP,
            ingested_bytes: 0.0,
        }
    }

    /// Use a custom grouping separator. The root is renamed to match.
    pub fn with_separator(mut self, sep: char) -> Self {
        let root_path = sep.to_string();
        self.parents.clear();
        self.parents.insert(root_path.clone(), self.root);
        self.inner[to_index(self.root)].id_path = root_path;
        self.sep = sep;
        self
    }

    pub fn separator(&self) -> char {
        self.sep
    }

    /// Sum of absolute symbol sizes seen so far, filtered or not.
    pub fn ingested_bytes(&self) -> f64 {
        self.ingested_bytes
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// The root of the tree. Aggregation is already up to date.
    pub fn build(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.inner.node_weight(to_index(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner
            .neighbors_directed(to_index(id), Direction::Incoming)
            .next()
            .map(to_id)
    }

    /// Children in attachment order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut children: Vec<NodeId> = self
            .inner
            .neighbors_directed(to_index(id), Direction::Outgoing)
            .map(to_id)
            .collect();
        // petgraph walks the newest edge first.
        children.reverse();
        children
    }

    /// Add one file record: its surviving symbols, the file node and any missing ancestors.
    pub fn add_file_entry(&mut self, entry: &FileEntry) {
        let id_path = (self.get_path)(entry);
        self.ingested_bytes += entry.symbols.iter().map(|s| s.size.abs()).sum::<f64>();

        let symbol_name_index = id_path.len() + 1;
        let accepted: Vec<TreeNode> = entry
            .symbols
            .iter()
            .map(|symbol| {
                TreeNode::symbol(
                    format!("{}:{}", id_path, symbol.name),
                    symbol_name_index,
                    symbol.symbol_type,
                    symbol.size,
                    symbol.count(),
                )
            })
            .filter(|node| (self.filter_test)(node))
            .collect();

        // Files without surviving symbols never reach the tree.
        if accepted.is_empty() {
            trace!("Dropping {} ({} symbols filtered)", id_path, entry.symbols.len());
            return;
        }

        let file_short_name = short_name_index(&id_path, self.sep);
        let file = self.add_node(TreeNode::container(id_path, file_short_name, ContainerKind::File));
        for symbol in accepted {
            let symbol = self.add_node(symbol);
            self.attach_to_parent(symbol, file);
        }

        let mut orphan = file;
        while orphan != self.root && self.parent(orphan).is_none() {
            orphan = self.get_or_make_parent(orphan);
        }
    }

    /// Find the cached container that `child` belongs in, creating it if needed, and attach.
    fn get_or_make_parent(&mut self, child: NodeId) -> NodeId {
        let child_path = self.inner[to_index(child)].id_path.clone();
        let parent_path = dirname(&child_path, self.sep);

        let parent = if parent_path.is_empty() {
            self.root
        } else if let Some(&cached) = self.parents.get(parent_path) {
            cached
        } else {
            let kind = if self.sep != PATH_SEP && boundary(&child_path, self.sep) == Some(self.sep) {
                ContainerKind::Component
            } else {
                ContainerKind::Directory
            };
            let short_name = short_name_index(parent_path, self.sep);
            let created = self.add_node(TreeNode::container(parent_path.to_string(), short_name, kind));
            self.parents.insert(parent_path.to_string(), created);
            created
        };

        self.attach_to_parent(child, parent);
        parent
    }

    fn add_node(&mut self, node: TreeNode) -> NodeId {
        to_id(self.inner.add_node(node))
    }

    /// Link `node` under `parent` and fold its size and stats into every ancestor.
    ///
    /// `node` may already carry a whole aggregated subtree; the walk climbs
    /// through every established generation up to the root.
    pub fn attach_to_parent(&mut self, node: NodeId, parent: NodeId) {
        debug_assert!(self.parent(node).is_none(), "node attached twice");
        self.inner.add_edge(to_index(parent), to_index(node), ());

        let (size, stats) = {
            let node = &self.inner[to_index(node)];
            (node.size, node.child_stats.clone())
        };
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            self.inner[to_index(current)].absorb(size, &stats);
            ancestor = self.parent(current);
        }
    }

    /// Look a node up by idPath, walking down from the root one segment at a time.
    pub fn find(&self, id_path: &str) -> Option<NodeId> {
        if id_path == self.inner[to_index(self.root)].id_path {
            return Some(self.root);
        }
        if id_path.is_empty() {
            return None;
        }

        let (container_path, has_symbol) = match id_path.find(':') {
            Some(split) => (&id_path[..split], true),
            None => (id_path, false),
        };

        let mut chain = Vec::new();
        let mut current = container_path;
        while !current.is_empty() {
            chain.push(current);
            current = dirname(current, self.sep);
        }

        let mut node = self.root;
        for segment in chain.into_iter().rev() {
            node = self.child_with_path(node, segment)?;
        }
        if has_symbol {
            node = self.child_with_path(node, id_path)?;
        }
        Some(node)
    }

    fn child_with_path(&self, parent: NodeId, id_path: &str) -> Option<NodeId> {
        self.children(parent)
            .into_iter()
            .find(|child| self.inner[to_index(*child)].id_path == id_path)
    }
}
