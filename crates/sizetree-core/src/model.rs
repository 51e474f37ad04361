//! Core data structures for the size tree

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

/// Separator used by source paths.
pub const PATH_SEP: char = '/';

/// Separator used between a component name and a source path when grouping by component.
pub const COMPONENT_SEP: char = '>';

/// Stand-in name for entries with no source path or no component.
pub const NO_NAME: &str = "(No path)";

/// Symbol type tag of dex methods.
pub const DEX_METHOD_TYPE: char = 'm';

/// Separates the class from the method inside a dex method name (`Class#method`).
pub const DEX_CLASS_SEP: char = '#';

/// Stable identifier of a node inside a builder's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct NodeId(pub u64);

/// Discriminates what kind of aggregate a container node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Directory,
    Component,
    File,
    JavaClass,
}

impl ContainerKind {
    /// Single-letter tag used on the wire.
    pub fn tag(self) -> char {
        match self {
            ContainerKind::Directory => 'D',
            ContainerKind::Component => 'C',
            ContainerKind::File => 'F',
            ContainerKind::JavaClass => 'J',
        }
    }
}

/// Display type of a node.
///
/// Containers carry the symbol tag that currently dominates their
/// descendants; leaves carry their own symbol tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Container {
        kind: ContainerKind,
        dominant: Option<char>,
    },
    Symbol(char),
}

impl NodeType {
    pub fn container(kind: ContainerKind) -> Self {
        NodeType::Container { kind, dominant: None }
    }

    /// Wire tag: `"Dt"`, `"F"`, `"t"`, ...
    pub fn tag(&self) -> String {
        match self {
            NodeType::Container { kind, dominant } => {
                let mut tag = String::with_capacity(2);
                tag.push(kind.tag());
                if let Some(dominant) = dominant {
                    tag.push(*dominant);
                }
                tag
            }
            NodeType::Symbol(tag) => tag.to_string(),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, NodeType::Container { .. })
    }

    pub fn container_kind(&self) -> Option<ContainerKind> {
        match self {
            NodeType::Container { kind, .. } => Some(*kind),
            NodeType::Symbol(_) => None,
        }
    }

    pub fn symbol_type(&self) -> Option<char> {
        match self {
            NodeType::Symbol(tag) => Some(*tag),
            NodeType::Container { .. } => None,
        }
    }

    pub fn dominant(&self) -> Option<char> {
        match self {
            NodeType::Container { dominant, .. } => *dominant,
            NodeType::Symbol(_) => None,
        }
    }

    /// Re-evaluate the dominant tag of a container against its stats.
    ///
    /// The current leader keeps its place on ties; another tag takes over only
    /// when its absolute size is strictly larger.
    pub fn update_dominant(&mut self, stats: &ChildStats) {
        let NodeType::Container { dominant, .. } = self else {
            return;
        };
        let mut leader_size = dominant
            .and_then(|tag| stats.get(tag))
            .map_or(0.0, |stat| stat.size.abs());
        for (tag, stat) in stats.iter() {
            let size = stat.size.abs();
            if size > leader_size {
                *dominant = Some(tag);
                leader_size = size;
            }
        }
    }
}

impl Serialize for NodeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.tag())
    }
}

/// Aggregated size and count for one symbol type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct Stat {
    pub size: f64,
    pub count: i64,
}

/// Per-type statistics over all leaf descendants of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(transparent)]
pub struct ChildStats(BTreeMap<char, Stat>);

impl ChildStats {
    pub fn new() -> Self {
        ChildStats(BTreeMap::new())
    }

    pub fn single(tag: char, size: f64, count: i64) -> Self {
        ChildStats(BTreeMap::from([(tag, Stat { size, count })]))
    }

    pub fn get(&self, tag: char) -> Option<&Stat> {
        self.0.get(&tag)
    }

    pub fn contains(&self, tag: char) -> bool {
        self.0.contains_key(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, &Stat)> {
        self.0.iter().map(|(tag, stat)| (*tag, stat))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add every entry of `other` into `self`.
    pub fn merge(&mut self, other: &ChildStats) {
        for (tag, stat) in other.iter() {
            let entry = self.0.entry(tag).or_default();
            entry.size += stat.size;
            entry.count += stat.count;
        }
    }

    pub fn total_size(&self) -> f64 {
        self.0.values().map(|stat| stat.size).sum()
    }
}

/// A single node of the size tree. Containment lives in the builder's graph.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id_path: String,
    /// Byte offset into `id_path` where the display name begins.
    pub short_name_index: usize,
    pub node_type: NodeType,
    pub size: f64,
    pub child_stats: ChildStats,
}

impl TreeNode {
    pub fn container(id_path: String, short_name_index: usize, kind: ContainerKind) -> Self {
        TreeNode {
            id_path,
            short_name_index,
            node_type: NodeType::container(kind),
            size: 0.0,
            child_stats: ChildStats::new(),
        }
    }

    pub fn symbol(id_path: String, short_name_index: usize, tag: char, size: f64, count: i64) -> Self {
        TreeNode {
            id_path,
            short_name_index,
            node_type: NodeType::Symbol(tag),
            size,
            child_stats: ChildStats::single(tag, size, count),
        }
    }

    pub fn short_name(&self) -> &str {
        self.id_path.get(self.short_name_index..).unwrap_or("")
    }

    /// Fold a newly attached descendant's size and stats into this node.
    pub fn absorb(&mut self, size: f64, stats: &ChildStats) {
        self.size += size;
        self.child_stats.merge(stats);
        self.node_type.update_dominant(&self.child_stats);
    }
}

/// Session metadata carried by the first record of a size report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Meta {
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub diff_mode: bool,
}

impl Meta {
    pub fn component(&self, index: Option<i64>) -> Option<&str> {
        let index = usize::try_from(index?).ok()?;
        self.components.get(index).map(String::as_str).filter(|name| !name.is_empty())
    }
}

/// One source file and the symbols attributed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "p", default)]
    pub source_path: String,
    #[serde(rename = "c", default)]
    pub component_index: Option<i64>,
    #[serde(rename = "s", default)]
    pub symbols: Vec<SymbolEntry>,
}

/// One symbol of a file record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "b")]
    pub size: f64,
    #[serde(rename = "t")]
    pub symbol_type: char,
    /// Repeat count; negative for removed symbols in diff mode.
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl SymbolEntry {
    /// Effective repeat count. Missing or zero counts mean a single symbol.
    pub fn count(&self) -> i64 {
        match self.count {
            Some(count) if count != 0 => count,
            _ => 1,
        }
    }
}
