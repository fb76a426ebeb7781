// The builder needs to know, for every open element, which prefixes are
// bound to which namespace URIs, so that `{uri}local` names can reuse an
// existing prefix or get a freshly generated one. This is a stack of scopes,
// one per open element, searched innermost first.

use crate::error::Error;
use crate::prefix::PrefixGenerator;

pub(crate) const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

type Scope = Vec<(String, String)>;

/// A name resolved against the namespace scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedName {
    pub(crate) prefix: Option<String>,
    pub(crate) local: String,
    /// Set when the prefix was freshly allocated and must be declared.
    pub(crate) declare: Option<String>,
}

impl ResolvedName {
    fn plain(local: &str) -> Self {
        Self {
            prefix: None,
            local: local.to_string(),
            declare: None,
        }
    }

    pub(crate) fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }
}

/// Prefixes starting with `xml` are reserved and never need a declaration.
pub(crate) fn is_reserved_prefix(prefix: &str) -> bool {
    prefix
        .get(..3)
        .map_or(false, |start| start.eq_ignore_ascii_case("xml"))
}

/// Split `{uri}local` into its parts. An empty URI yields no namespace.
pub(crate) fn split_clark(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix('{')?;
    let end = rest.find('}')?;
    Some((&rest[..end], &rest[end + 1..]))
}

#[derive(Debug, Default)]
pub(crate) struct NamespaceScopes {
    scopes: Vec<Scope>,
}

impl NamespaceScopes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub(crate) fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Bind a prefix in the innermost scope, replacing an earlier binding
    /// of the same prefix in that scope.
    pub(crate) fn bind(&mut self, prefix: &str, uri: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(entry) = scope.iter_mut().find(|(p, _)| p == prefix) {
                entry.1 = uri.to_string();
            } else {
                scope.push((prefix.to_string(), uri.to_string()));
            }
        }
    }

    /// The URI a prefix is bound to in the visible scopes.
    pub(crate) fn namespace_by_prefix(&self, prefix: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// The prefix a URI is visibly bound to. A prefix that an inner scope
    /// rebinds to another URI is not visible anymore.
    pub(crate) fn prefix_by_namespace(&self, uri: &str, allow_empty: bool) -> Option<&str> {
        let mut shadowed: Vec<&str> = Vec::new();
        for scope in self.scopes.iter().rev() {
            for (prefix, bound) in scope.iter().rev() {
                if shadowed.contains(&prefix.as_str()) {
                    continue;
                }
                if bound == uri && (allow_empty || !prefix.is_empty()) {
                    return Some(prefix.as_str());
                }
                shadowed.push(prefix);
            }
        }
        None
    }

    fn is_used(&self, prefix: &str) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.iter().any(|(p, _)| p == prefix))
    }

    /// Resolve an element name.
    pub(crate) fn resolve_element(&mut self, name: &str) -> Result<ResolvedName, Error> {
        self.resolve(name, true)
    }

    /// Resolve an attribute name. Attributes can't be in a namespace
    /// without a prefix, so the default namespace is never used for them.
    pub(crate) fn resolve_attribute(&mut self, name: &str) -> Result<ResolvedName, Error> {
        self.resolve(name, false)
    }

    fn resolve(&mut self, name: &str, allow_empty: bool) -> Result<ResolvedName, Error> {
        if let Some((uri, local)) = split_clark(name) {
            if uri.is_empty() {
                return Ok(ResolvedName::plain(local));
            }
            if let Some(prefix) = self.prefix_by_namespace(uri, allow_empty) {
                let prefix = (!prefix.is_empty()).then(|| prefix.to_string());
                return Ok(ResolvedName {
                    prefix,
                    local: local.to_string(),
                    declare: None,
                });
            }
            let prefix = PrefixGenerator::new()
                .find(|candidate| !self.is_used(candidate))
                .ok_or_else(|| Error::illegal_state("no namespace prefix available"))?;
            self.bind(&prefix, uri);
            return Ok(ResolvedName {
                prefix: Some(prefix),
                local: local.to_string(),
                declare: Some(uri.to_string()),
            });
        }
        if let Some((prefix, local)) = name.split_once(':') {
            if !is_reserved_prefix(prefix) && self.namespace_by_prefix(prefix).is_none() {
                return Err(Error::UndeclaredPrefix(prefix.to_string()));
            }
            return Ok(ResolvedName {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
                declare: None,
            });
        }
        Ok(ResolvedName::plain(name))
    }
}
