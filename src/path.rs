// Match paths are resolved into segments of the form `{uri}local` (or just
// `local` without a namespace) so that they can be compared with the
// parser's own path, which is built the same way from the document.

use ahash::HashMap;

use crate::error::Error;
use crate::namespace::split_clark;

/// What a path is resolved against.
pub(crate) struct PathContext<'c> {
    /// Prefixes registered on the parser.
    pub(crate) prefixes: &'c HashMap<String, String>,
    /// Namespace of the node the cursor is on, used by `:local`.
    pub(crate) current_namespace: Option<&'c str>,
    /// Innermost default namespace on the parser's path, used by `local`.
    pub(crate) default_namespace: Option<&'c str>,
}

impl PathContext<'_> {
    fn namespace_for_prefix(&self, prefix: &str) -> Result<Option<String>, Error> {
        if prefix.is_empty() {
            return Ok(self.current_namespace.map(str::to_string));
        }
        match self.prefixes.get(prefix) {
            Some(uri) if uri.is_empty() => Ok(None),
            Some(uri) => Ok(Some(uri.clone())),
            None => Err(Error::UndeclaredPrefix(prefix.to_string())),
        }
    }
}

/// A path segment for an element in the given namespace.
pub(crate) fn segment(namespace: Option<&str>, local: &str) -> String {
    match namespace {
        Some(uri) if !uri.is_empty() => format!("{{{}}}{}", uri, local),
        _ => local.to_string(),
    }
}

/// The registry key of a sequence of segments.
pub(crate) fn key<S: AsRef<str>>(segments: &[S]) -> String {
    let mut key = String::new();
    for segment in segments {
        key.push_str(segment.as_ref());
        key.push('>');
    }
    key
}

// split on the delimiter, except inside `{...}`
fn split(path: &str, delimiter: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_uri = false;
    let mut start = 0;
    for (index, c) in path.char_indices() {
        match c {
            '{' => in_uri = true,
            '}' => in_uri = false,
            c if c == delimiter && !in_uri => {
                parts.push(&path[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&path[start..]);
    parts.into_iter().filter(|part| !part.is_empty()).collect()
}

/// Resolve a path into segments. An empty path resolves to no segments.
pub(crate) fn parse_path(
    path: &str,
    delimiter: char,
    context: &PathContext,
) -> Result<Vec<String>, Error> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let parts = split(path, delimiter);
    if parts.is_empty() {
        return Err(Error::invalid_input(format!("invalid path \"{}\"", path)));
    }
    parts
        .into_iter()
        .map(|part| {
            if let Some((uri, local)) = split_clark(part) {
                return Ok(segment(Some(uri), local));
            }
            if let Some((prefix, local)) = part.split_once(':') {
                let namespace = context.namespace_for_prefix(prefix)?;
                return Ok(segment(namespace.as_deref(), local));
            }
            Ok(segment(context.default_namespace, part))
        })
        .collect()
}

/// Resolve an attribute name into namespace and local name. Unlike element
/// paths a plain name has no namespace.
pub(crate) fn parse_attribute_name(
    name: &str,
    context: &PathContext,
) -> Result<(Option<String>, String), Error> {
    if let Some((uri, local)) = split_clark(name) {
        let namespace = (!uri.is_empty()).then(|| uri.to_string());
        return Ok((namespace, local.to_string()));
    }
    if let Some((prefix, local)) = name.split_once(':') {
        return Ok((context.namespace_for_prefix(prefix)?, local.to_string()));
    }
    Ok((None, name.to_string()))
}
