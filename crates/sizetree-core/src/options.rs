//! Query-string options: grouping strategy and symbol filter

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::builder::{FilterFn, PathFn};
use crate::model::*;

/// Every symbol type tag the size reports know about.
pub const KNOWN_SYMBOL_TYPES: &str = "bdrtv*xmpPo";

/// Hidden unless explicitly requested (`.bss`).
pub const DEFAULT_EXCLUDED_TYPE: char = 'b';

/// Repeatable query key selecting symbol types.
pub const TYPE_KEY: &str = "type";

/// The set of known symbol type tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SymbolTypes(BTreeSet<char>);

impl SymbolTypes {
    pub fn contains(&self, tag: char) -> bool {
        self.0.contains(&tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn is_covered_by(&self, selected: &BTreeSet<char>) -> bool {
        self.0.is_subset(selected)
    }
}

impl Default for SymbolTypes {
    fn default() -> Self {
        SymbolTypes::from(KNOWN_SYMBOL_TYPES)
    }
}

impl From<&str> for SymbolTypes {
    fn from(tags: &str) -> Self {
        SymbolTypes(tags.chars().filter(|c| !c.is_whitespace()).collect())
    }
}

impl From<String> for SymbolTypes {
    fn from(tags: String) -> Self {
        SymbolTypes::from(tags.as_str())
    }
}

impl From<SymbolTypes> for String {
    fn from(types: SymbolTypes) -> Self {
        types.0.into_iter().collect()
    }
}

/// How file records are arranged into containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    SourcePath,
    Component,
}

impl GroupBy {
    fn from_param(value: &str) -> Self {
        match value {
            "source_path" => GroupBy::SourcePath,
            "component" => GroupBy::Component,
            other => {
                warn!("Unknown group_by value {:?}, grouping by source path", other);
                GroupBy::SourcePath
            }
        }
    }

    pub fn separator(self) -> char {
        match self {
            GroupBy::SourcePath => PATH_SEP,
            GroupBy::Component => COMPONENT_SEP,
        }
    }

    /// The idPath function for this grouping, bound to the session's components.
    pub fn path_fn(self, meta: &Meta) -> PathFn {
        match self {
            GroupBy::SourcePath => Box::new(|entry: &FileEntry| source_path_or_sentinel(entry).to_string()),
            GroupBy::Component => {
                let meta = meta.clone();
                Box::new(move |entry: &FileEntry| {
                    let component = meta.component(entry.component_index).unwrap_or(NO_NAME);
                    format!("{}{}{}", component, COMPONENT_SEP, source_path_or_sentinel(entry))
                })
            }
        }
    }
}

fn source_path_or_sentinel(entry: &FileEntry) -> &str {
    if entry.source_path.is_empty() {
        NO_NAME
    } else {
        &entry.source_path
    }
}

/// Conjunction of the per-symbol tests requested by the options.
#[derive(Debug, Clone, Default)]
pub struct SymbolFilter {
    min_size: f64,
    types: Option<BTreeSet<char>>,
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl SymbolFilter {
    pub fn test(&self, node: &TreeNode) -> bool {
        if self.min_size > 0.0 && node.size.abs() < self.min_size {
            return false;
        }
        if let (Some(types), Some(tag)) = (&self.types, node.node_type.symbol_type()) {
            if !types.contains(&tag) {
                return false;
            }
        }
        if let Some(include) = &self.include {
            if !include.is_match(&node.id_path) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(&node.id_path) {
                return false;
            }
        }
        true
    }

    pub fn into_filter_fn(self) -> FilterFn {
        Box::new(move |node: &TreeNode| self.test(node))
    }
}

/// Parsed form of a load request's options.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub group_by: GroupBy,
    pub method_count: bool,
    pub filter: SymbolFilter,
}

/// Parse a `key=value&...` options string. Bad values fall back to defaults.
pub fn parse_options(query: &str, known: &SymbolTypes) -> BuildOptions {
    let query = query.strip_prefix('?').unwrap_or(query);

    let mut group_by = None;
    let mut method_count = false;
    let mut min_size = None;
    let mut include = None;
    let mut exclude = None;
    let mut requested = BTreeSet::new();

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "group_by" if group_by.is_none() => group_by = Some(GroupBy::from_param(&value)),
            "method_count" => method_count = true,
            "min_size" if min_size.is_none() => min_size = Some(parse_size(&value)),
            "include" if include.is_none() => include = Some(compile_pattern("include", &value)),
            "exclude" if exclude.is_none() => exclude = Some(compile_pattern("exclude", &value)),
            TYPE_KEY => requested.extend(value.chars()),
            _ => {}
        }
    }

    let types: BTreeSet<char> = if method_count {
        BTreeSet::from([DEX_METHOD_TYPE])
    } else if !requested.is_empty() {
        requested
    } else {
        known.0.iter().copied().filter(|tag| *tag != DEFAULT_EXCLUDED_TYPE).collect()
    };

    BuildOptions {
        group_by: group_by.unwrap_or_default(),
        method_count,
        filter: SymbolFilter {
            min_size: min_size.unwrap_or(0.0),
            types: (!known.is_covered_by(&types)).then_some(types),
            include: include.flatten(),
            exclude: exclude.flatten(),
        },
    }
}

fn parse_size(value: &str) -> f64 {
    let value = value.trim();
    if value.is_empty() {
        return 0.0;
    }
    match value.parse::<f64>() {
        Ok(size) if size.is_finite() => size,
        _ => {
            warn!("Ignoring invalid min_size {:?}", value);
            0.0
        }
    }
}

fn compile_pattern(key: &str, pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        return None;
    }
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Ignoring invalid {} pattern {:?}: {}", key, pattern, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(id_path: &str, tag: char, size: f64) -> TreeNode {
        TreeNode::symbol(id_path.to_string(), 0, tag, size, 1)
    }

    #[test]
    fn test_defaults() {
        let options = parse_options("", &SymbolTypes::default());
        assert_eq!(options.group_by, GroupBy::SourcePath);
        assert!(!options.method_count);
        assert!(options.filter.test(&symbol("a/b.cc:f", 't', 1.0)));
        // .bss is hidden unless asked for
        assert!(!options.filter.test(&symbol("a/b.cc:g", 'b', 1.0)));
    }

    #[test]
    fn test_min_size_is_inclusive_and_absolute() {
        let options = parse_options("min_size=100", &SymbolTypes::default());
        assert!(!options.filter.test(&symbol("a:x", 't', 50.0)));
        assert!(options.filter.test(&symbol("a:x", 't', 100.0)));
        assert!(options.filter.test(&symbol("a:x", 't', -150.0)));
    }

    #[test]
    fn test_invalid_min_size_falls_back_to_zero() {
        let options = parse_options("min_size=lots", &SymbolTypes::default());
        assert!(options.filter.test(&symbol("a:x", 't', 0.5)));
    }

    #[test]
    fn test_include_and_exclude() {
        let options = parse_options("include=%5Efoo%2F&exclude=bar", &SymbolTypes::default());
        assert!(options.filter.test(&symbol("foo/a.cc:f", 't', 1.0)));
        assert!(!options.filter.test(&symbol("baz/a.cc:f", 't', 1.0)));
        assert!(!options.filter.test(&symbol("foo/bar.cc:f", 't', 1.0)));
    }

    #[test]
    fn test_invalid_pattern_is_ignored() {
        let options = parse_options("include=(", &SymbolTypes::default());
        assert!(options.filter.test(&symbol("anything:f", 't', 1.0)));
    }

    #[test]
    fn test_explicit_types() {
        let options = parse_options("type=t&type=b", &SymbolTypes::default());
        assert!(options.filter.test(&symbol("a:f", 't', 1.0)));
        assert!(options.filter.test(&symbol("a:f", 'b', 1.0)));
        assert!(!options.filter.test(&symbol("a:f", 'r', 1.0)));
    }

    #[test]
    fn test_method_count_mode_forces_dex_methods() {
        let options = parse_options("method_count&type=t", &SymbolTypes::default());
        assert!(options.method_count);
        assert!(options.filter.test(&symbol("a:Foo#bar", DEX_METHOD_TYPE, 1.0)));
        assert!(!options.filter.test(&symbol("a:f", 't', 1.0)));
    }

    #[test]
    fn test_all_known_types_disable_type_test() {
        let options = parse_options(&format!("type={}", "bdrtv*xmpPo".replace('*', "%2A")), &SymbolTypes::default());
        assert!(options.filter.types.is_none());
    }

    #[test]
    fn test_group_by_component() {
        let options = parse_options("?group_by=component", &SymbolTypes::default());
        assert_eq!(options.group_by, GroupBy::Component);
        assert_eq!(options.group_by.separator(), COMPONENT_SEP);

        let meta = Meta {
            components: vec!["Blink".to_string()],
            total: 0.0,
            diff_mode: false,
        };
        let path_fn = options.group_by.path_fn(&meta);
        let entry = FileEntry {
            source_path: "third_party/blink/a.cc".to_string(),
            component_index: Some(0),
            symbols: vec![],
        };
        assert_eq!(path_fn(&entry), "Blink>third_party/blink/a.cc");

        let orphan = FileEntry {
            source_path: String::new(),
            component_index: Some(7),
            symbols: vec![],
        };
        assert_eq!(path_fn(&orphan), "(No path)>(No path)");
    }

    #[test]
    fn test_symbol_types_round_trip_through_config_string() {
        let types: SymbolTypes = serde_json::from_str("\"tdr\"").unwrap();
        assert!(types.contains('t'));
        assert_eq!(types.len(), 3);
        assert_eq!(serde_json::to_string(&types).unwrap(), "\"drt\"");
    }
}
