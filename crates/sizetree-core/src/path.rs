//! Path helpers aware of both the path separator and a grouping separator

use crate::model::PATH_SEP;

/// Position and byte length of the last `/` or `sep` in `path`, whichever comes later.
pub fn last_separator(path: &str, sep: char) -> Option<(usize, usize)> {
    path.rfind([PATH_SEP, sep])
        .and_then(|index| path[index..].chars().next().map(|c| (index, c.len_utf8())))
}

/// Byte offset where the last segment of `path` begins.
pub fn short_name_index(path: &str, sep: char) -> usize {
    last_separator(path, sep).map_or(0, |(index, len)| index + len)
}

/// The last segment of `path`.
pub fn basename(path: &str, sep: char) -> &str {
    &path[short_name_index(path, sep)..]
}

/// Everything before the last segment boundary, or `""` for top-level paths.
pub fn dirname(path: &str, sep: char) -> &str {
    last_separator(path, sep).map_or("", |(index, _)| &path[..index])
}

/// The separator character that ends `dirname(path, sep)`, if any.
pub fn boundary(path: &str, sep: char) -> Option<char> {
    last_separator(path, sep).and_then(|(index, _)| path[index..].chars().next())
}
