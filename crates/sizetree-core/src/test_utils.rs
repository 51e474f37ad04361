//! Test utilities for sizetree-core

use crate::*;

/// Meta record with a single component named `A`.
pub fn sample_meta() -> Meta {
    Meta {
        components: vec!["A".to_string()],
        total: 300.0,
        diff_mode: false,
    }
}

pub fn symbol(name: &str, size: f64, symbol_type: char) -> SymbolEntry {
    SymbolEntry {
        name: name.to_string(),
        size,
        symbol_type,
        count: None,
    }
}

pub fn file(path: &str, component: i64, symbols: Vec<SymbolEntry>) -> FileEntry {
    FileEntry {
        source_path: path.to_string(),
        component_index: Some(component),
        symbols,
    }
}

/// `a/b.cc` with a 100 byte symbol and `a/c.cc` with a 200 byte symbol.
pub fn basic_files() -> Vec<FileEntry> {
    vec![
        file("a/b.cc", 0, vec![symbol("foo", 100.0, 't')]),
        file("a/c.cc", 0, vec![symbol("bar", 200.0, 't')]),
    ]
}

/// Builder for `query`, configured exactly like a load session would be.
pub fn builder_for(query: &str, meta: &Meta) -> TreeBuilder {
    let options = parse_options(query, &SymbolTypes::default());
    TreeBuilder::new(options.group_by.path_fn(meta), options.filter.into_filter_fn())
        .with_separator(options.group_by.separator())
}

pub fn build(query: &str, meta: &Meta, files: &[FileEntry]) -> TreeBuilder {
    let mut builder = builder_for(query, meta);
    for entry in files {
        builder.add_file_entry(entry);
    }
    builder
}

/// Accept every symbol.
pub fn unfiltered() -> TreeBuilder {
    TreeBuilder::new(
        GroupBy::SourcePath.path_fn(&Meta::default()),
        Box::new(|_| true),
    )
}

/// Every node reachable from the root, parents before children.
pub fn all_nodes(builder: &TreeBuilder) -> Vec<NodeId> {
    let mut nodes = vec![builder.build()];
    let mut next = 0;
    while next < nodes.len() {
        nodes.extend(builder.children(nodes[next]));
        next += 1;
    }
    nodes
}

/// Assert the sum invariant and the absence of empty containers over the whole tree.
pub fn assert_consistent(builder: &TreeBuilder) {
    for id in all_nodes(builder) {
        let node = builder.node(id).unwrap();
        let children = builder.children(id);
        if node.node_type.is_container() {
            if id != builder.build() {
                assert!(!children.is_empty(), "empty container {}", node.id_path);
            }
            let sum: f64 = children.iter().map(|c| builder.node(*c).unwrap().size).sum();
            assert!((node.size - sum).abs() < 1e-9, "size mismatch at {}", node.id_path);
        }
        for child in children {
            assert_eq!(builder.parent(child), Some(id));
        }
    }
}
