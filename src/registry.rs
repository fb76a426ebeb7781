// Callbacks are stored by the key of the absolute path they match. For
// every depth of the parser's current path the registry computes, and
// caches, the callbacks that are active there, together with the
// recursive callbacks in scope for deeper levels. The cache is only ever
// invalidated through `invalidate`.

use std::collections::BTreeMap;
use std::rc::Rc;

use ahash::HashMap;
use log::debug;

use crate::callbacks::ParserCallback;
use crate::path::key;

#[derive(Clone)]
pub(crate) struct Entry<'a> {
    // registration order
    seq: u64,
    // depth of the parser when the callback was added
    level: usize,
    pub(crate) callback: Rc<dyn ParserCallback<'a> + 'a>,
}

#[derive(Clone)]
struct RecursiveEntry<'a> {
    // key of the node below which the callback matches
    anchor: String,
    // segment a descendant must have, `None` for any
    tail: Option<String>,
    entry: Entry<'a>,
}

struct Level<'a> {
    active: Rc<[Entry<'a>]>,
    scope: Rc<[RecursiveEntry<'a>]>,
}

#[derive(Default)]
pub(crate) struct Registry<'a> {
    direct: BTreeMap<String, Vec<Entry<'a>>>,
    recursive: Vec<RecursiveEntry<'a>>,
    root: Vec<Entry<'a>>,
    levels: Vec<Level<'a>>,
    subtree_cache: HashMap<String, bool>,
    seq: u64,
}

impl<'a> Registry<'a> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, level: usize, callback: Rc<dyn ParserCallback<'a> + 'a>) -> Entry<'a> {
        self.seq += 1;
        Entry {
            seq: self.seq,
            level,
            callback,
        }
    }

    /// Add a callback relative to the given path.
    pub(crate) fn register(&mut self, base: &[String], callback: Rc<dyn ParserCallback<'a> + 'a>) {
        let depth = base.len();
        let mut full: Vec<String> = base.to_vec();
        full.extend(
            callback
                .path()
                .iter()
                .filter(|segment| !segment.is_empty())
                .cloned(),
        );
        let recursive = callback.recursive();
        let entry = self.entry(depth, callback);

        if recursive {
            match full.len().checked_sub(1).filter(|last| *last >= depth) {
                Some(last) => {
                    let anchor = key(&full[..last]);
                    debug!("recursive callback below {} for {}", anchor, full[last]);
                    self.recursive.push(RecursiveEntry {
                        anchor,
                        tail: Some(full[last].clone()),
                        entry,
                    });
                }
                None => {
                    let anchor = key(&full);
                    debug!("recursive callback at and below {}", anchor);
                    self.direct
                        .entry(anchor.clone())
                        .or_default()
                        .push(entry.clone());
                    self.recursive.push(RecursiveEntry {
                        anchor,
                        tail: None,
                        entry,
                    });
                }
            }
        } else {
            let key = key(&full);
            debug!("callback for {} at depth {}", key, depth);
            self.direct.entry(key).or_default().push(entry);
        }
        self.invalidate(depth);
        self.subtree_cache.clear();
    }

    /// Add a callback for the root element.
    pub(crate) fn register_root(&mut self, callback: Rc<dyn ParserCallback<'a> + 'a>) {
        let entry = self.entry(0, callback);
        debug!("root callback");
        self.root.push(entry);
        self.invalidate(0);
        self.subtree_cache.clear();
    }

    /// Drop cached active callbacks for `depth` and deeper.
    pub(crate) fn invalidate(&mut self, depth: usize) {
        self.levels.truncate(depth);
    }

    /// Remove callbacks that were added below `depth`.
    pub(crate) fn prune(&mut self, depth: usize) {
        let before = self.len();
        self.direct.retain(|_, entries| {
            entries.retain(|entry| entry.level <= depth);
            !entries.is_empty()
        });
        self.recursive.retain(|recursive| recursive.entry.level <= depth);
        self.root.retain(|entry| entry.level <= depth);
        let removed = before - self.len();
        if removed > 0 {
            debug!("pruned {} callbacks above depth {}", removed, depth);
            self.invalidate(depth + 1);
            self.subtree_cache.clear();
        }
    }

    fn len(&self) -> usize {
        self.direct.values().map(Vec::len).sum::<usize>() + self.recursive.len() + self.root.len()
    }

    fn ensure(&mut self, depth: usize, path: &[String]) {
        while self.levels.len() <= depth {
            let d = self.levels.len();
            let key = key(&path[..d]);
            let mut active: Vec<Entry<'a>> = self.direct.get(&key).cloned().unwrap_or_default();
            let mut scope: Vec<RecursiveEntry<'a>> = Vec::new();
            if d >= 1 {
                if d == 1 {
                    active.extend(self.root.iter().cloned());
                }
                let segment = &path[d - 1];
                let parent = &self.levels[d - 1].scope;
                active.extend(
                    parent
                        .iter()
                        .filter(|recursive| {
                            recursive.tail.as_ref().map_or(true, |tail| tail == segment)
                        })
                        .map(|recursive| recursive.entry.clone()),
                );
                scope.extend(parent.iter().cloned());
            }
            scope.extend(
                self.recursive
                    .iter()
                    .filter(|recursive| recursive.anchor == key)
                    .cloned(),
            );
            active.sort_by_key(|entry| entry.seq);
            self.levels.push(Level {
                active: active.into(),
                scope: scope.into(),
            });
        }
    }

    /// The callbacks active for the node at `depth` of `path`, in
    /// registration order.
    pub(crate) fn active(&mut self, depth: usize, path: &[String]) -> Rc<[Entry<'a>]> {
        self.ensure(depth, path);
        Rc::clone(&self.levels[depth].active)
    }

    /// Whether any callback could match a descendant of the node at
    /// `depth` of `path`.
    pub(crate) fn has_subtree(&mut self, depth: usize, path: &[String]) -> bool {
        let key = key(&path[..depth]);
        if let Some(found) = self.subtree_cache.get(&key) {
            return *found;
        }
        self.ensure(depth, path);
        let found = self
            .direct
            .range(key.clone()..)
            .next()
            .map_or(false, |(k, _)| k.starts_with(&key))
            || self
                .recursive
                .iter()
                .any(|recursive| recursive.anchor.starts_with(&key))
            || !self.levels[depth].scope.is_empty();
        self.subtree_cache.insert(key, found);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::ElementStartCallback;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    fn callback<'a>(segments: &[&str]) -> Rc<dyn ParserCallback<'a> + 'a> {
        Rc::new(ElementStartCallback::new(path(segments), |_| Ok(())))
    }

    fn recursive<'a>(segments: &[&str]) -> Rc<dyn ParserCallback<'a> + 'a> {
        Rc::new(ElementStartCallback::recursive(path(segments), |_| Ok(())))
    }

    #[test]
    fn test_direct_match() {
        let mut registry = Registry::new();
        registry.register(&[], callback(&["a", "b"]));
        let a_b = path(&["a", "b"]);
        let a_c_b = path(&["a", "c", "b"]);
        assert_eq!(registry.active(2, &a_b).len(), 1);
        registry.invalidate(1);
        assert_eq!(registry.active(3, &a_c_b).len(), 0);
    }

    #[test]
    fn test_recursive_match() {
        let mut registry = Registry::new();
        registry.register(&[], recursive(&["a", "b"]));
        let a_b = path(&["a", "b"]);
        assert_eq!(registry.active(2, &a_b).len(), 1);
        registry.invalidate(1);
        let a_c_b = path(&["a", "c", "b"]);
        assert_eq!(registry.active(2, &a_c_b).len(), 0);
        assert_eq!(registry.active(3, &a_c_b).len(), 1);
        registry.invalidate(1);
        let x_b = path(&["x", "b"]);
        assert_eq!(registry.active(2, &x_b).len(), 0);
    }

    #[test]
    fn test_registration_order() {
        let mut registry = Registry::new();
        let first = recursive(&["a", "b"]);
        let second = callback(&["a", "b"]);
        registry.register(&[], Rc::clone(&first));
        registry.register(&[], Rc::clone(&second));
        let active = registry.active(2, &path(&["a", "b"]));
        assert!(Rc::ptr_eq(&active[0].callback, &first));
        assert!(Rc::ptr_eq(&active[1].callback, &second));
    }

    #[test]
    fn test_root_callbacks() {
        let mut registry = Registry::new();
        registry.register_root(callback(&[]));
        assert_eq!(registry.active(1, &path(&["anything"])).len(), 1);
        assert_eq!(registry.active(0, &path(&["anything"])).len(), 0);
    }

    #[test]
    fn test_has_subtree() {
        let mut registry = Registry::new();
        registry.register(&[], callback(&["a", "b", "c"]));
        let a_b = path(&["a", "b"]);
        assert!(registry.has_subtree(2, &a_b));
        let a_x = path(&["a", "x"]);
        registry.invalidate(1);
        assert!(!registry.has_subtree(2, &a_x));
    }

    #[test]
    fn test_has_subtree_with_recursive_in_scope() {
        let mut registry = Registry::new();
        registry.register(&[], recursive(&["a", "b"]));
        let a_x = path(&["a", "x"]);
        assert!(registry.has_subtree(2, &a_x));
        registry.invalidate(1);
        let z_x = path(&["z", "x"]);
        assert!(!registry.has_subtree(2, &z_x));
    }

    #[test]
    fn test_prune() {
        let mut registry = Registry::new();
        let a = path(&["a"]);
        registry.register(&a, callback(&["b"]));
        let a_b = path(&["a", "b"]);
        assert_eq!(registry.active(2, &a_b).len(), 1);
        registry.invalidate(1);
        registry.prune(0);
        assert_eq!(registry.active(2, &a_b).len(), 0);
    }
}
