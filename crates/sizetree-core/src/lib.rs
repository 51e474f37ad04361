//! Size tree model, incremental builder and symbol filters

pub mod model;
pub mod path;
pub mod builder;
pub mod format;
pub mod options;


#[cfg(test)]
pub mod test_utils;

pub use model::{NodeId, ContainerKind, NodeType, Stat, ChildStats, TreeNode, Meta, FileEntry, SymbolEntry};
pub use model::{PATH_SEP, COMPONENT_SEP, NO_NAME, DEX_METHOD_TYPE, DEX_CLASS_SEP};
pub use path::{basename, dirname};
pub use builder::{TreeBuilder, PathFn, FilterFn};
pub use format::{FormattedNode, DEFAULT_DEPTH};
pub use options::{BuildOptions, GroupBy, SymbolFilter, SymbolTypes, parse_options};
