//! Depth-limited, detached copies of the tree for consumers

use std::collections::HashMap;

use serde::Serialize;

use crate::builder::TreeBuilder;
use crate::model::*;

/// Levels of children included by default when formatting a node.
pub const DEFAULT_DEPTH: usize = 1;

/// A serializable snapshot of a node and a bounded number of its descendants.
///
/// `children` is `None` when the node has children that were not loaded,
/// and an empty list when the node has no children at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedNode {
    pub id_path: String,
    pub short_name_index: usize,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub size: f64,
    pub child_stats: ChildStats,
    pub children: Option<Vec<FormattedNode>>,
    /// Always `null`: formatted copies are detached from the tree.
    pub parent: (),
}

impl FormattedNode {
    fn from_node(node: &TreeNode, children: Option<Vec<FormattedNode>>) -> Self {
        FormattedNode {
            id_path: node.id_path.clone(),
            short_name_index: node.short_name_index,
            node_type: node.node_type,
            size: node.size,
            child_stats: node.child_stats.clone(),
            children,
            parent: (),
        }
    }

    fn container(id_path: String, short_name_index: usize, kind: ContainerKind) -> Self {
        FormattedNode::from_node(&TreeNode::container(id_path, short_name_index, kind), Some(Vec::new()))
    }

    pub fn short_name(&self) -> &str {
        self.id_path.get(self.short_name_index..).unwrap_or("")
    }

    /// Loaded children, or an empty slice when none are loaded.
    pub fn loaded_children(&self) -> &[FormattedNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Same aggregation rule as the builder, applied to a detached copy.
    fn attach(&mut self, child: FormattedNode) {
        self.size += child.size;
        self.child_stats.merge(&child.child_stats);
        self.node_type.update_dominant(&self.child_stats);
        self.children.get_or_insert_with(Vec::new).push(child);
    }

    /// Regroup `Class#method` dex symbols of a file under synthetic class containers.
    fn join_dex_method_classes(&mut self) {
        if self.node_type.container_kind() != Some(ContainerKind::File)
            || !self.child_stats.contains(DEX_METHOD_TYPE)
        {
            return;
        }
        let Some(children) = self.children.take() else {
            return;
        };

        let mut classes: Vec<FormattedNode> = Vec::new();
        let mut class_slots: HashMap<String, usize> = HashMap::new();
        let mut joined = Vec::with_capacity(children.len());
        for child in children {
            let split = child
                .id_path
                .rfind(DEX_CLASS_SEP)
                .filter(|split| *split > child.short_name_index);
            match (child.node_type, split) {
                (NodeType::Symbol(DEX_METHOD_TYPE), Some(split)) => {
                    let class_path = &child.id_path[..split];
                    let slot = match class_slots.get(class_path) {
                        Some(slot) => *slot,
                        None => {
                            classes.push(FormattedNode::container(
                                class_path.to_string(),
                                child.short_name_index,
                                ContainerKind::JavaClass,
                            ));
                            class_slots.insert(class_path.to_string(), classes.len() - 1);
                            classes.len() - 1
                        }
                    };
                    let method = FormattedNode {
                        short_name_index: split + DEX_CLASS_SEP.len_utf8(),
                        ..child
                    };
                    classes[slot].attach(method);
                }
                _ => joined.push(child),
            }
        }

        for class in &mut classes {
            if let Some(methods) = class.children.as_mut() {
                sort_by_size(methods);
            }
        }
        joined.extend(classes);
        sort_by_size(&mut joined);
        self.children = Some(joined);
    }
}

fn sort_by_size(nodes: &mut [FormattedNode]) {
    nodes.sort_by(|a, b| b.size.abs().total_cmp(&a.size.abs()));
}

impl TreeBuilder {
    /// Detached copy of `id` with up to `depth` levels of children.
    ///
    /// A node with exactly one child always includes it, whatever the
    /// remaining depth, so single-child chains arrive expanded.
    pub fn format_node(&self, id: NodeId, depth: usize) -> Option<FormattedNode> {
        let node = self.node(id)?;
        let child_ids = self.children(id);

        let children = if child_ids.is_empty() {
            Some(Vec::new())
        } else if depth > 0 || child_ids.len() == 1 {
            let mut children: Vec<FormattedNode> = child_ids
                .into_iter()
                .filter_map(|child| self.format_node(child, depth.saturating_sub(1)))
                .collect();
            sort_by_size(&mut children);
            Some(children)
        } else {
            None
        };

        let mut formatted = FormattedNode::from_node(node, children);
        formatted.join_dex_method_classes();
        Some(formatted)
    }

    /// Find `id_path` and format it.
    pub fn format_path(&self, id_path: &str, depth: usize) -> Option<FormattedNode> {
        self.format_node(self.find(id_path)?, depth)
    }
}
