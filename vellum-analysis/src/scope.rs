//! Scoped lookup tables with parent-chain fallback.
//!
//! A child manuscript sees everything its parent sees plus its own
//! additions; lookups chase the chain instead of copying entries down.
//! Mutation happens only while a scope is under construction; once
//! frozen into an `Arc` and handed to children, a scope never changes.
//! Children are re-derived on every rescan of their parent, so the
//! snapshot a child holds is never stale.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug)]
pub struct Scope<T> {
    own: HashMap<String, Arc<T>>,
    parent: Option<Arc<Scope<T>>>,
}

impl<T> Scope<T> {
    pub fn root() -> Self {
        Self {
            own: HashMap::new(),
            parent: None,
        }
    }

    pub fn child_of(parent: &Arc<Scope<T>>) -> Self {
        Self {
            own: HashMap::new(),
            parent: Some(parent.clone()),
        }
    }

    /// Chain lookup: own entries shadow the parent's.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        if let Some(found) = self.own.get(name) {
            return Some(found.clone());
        }
        self.parent.as_ref()?.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.own.contains_key(name)
            || self
                .parent
                .as_ref()
                .map(|parent| parent.contains(name))
                .unwrap_or(false)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Arc<T>) {
        self.own.insert(name.into(), value);
    }

    /// All visible entries, inner definitions shadowing outer ones,
    /// ordered by name.
    pub fn flatten(&self) -> BTreeMap<String, Arc<T>> {
        let mut out = match &self.parent {
            Some(parent) => parent.flatten(),
            None => BTreeMap::new(),
        };
        for (name, value) in &self.own {
            out.insert(name.clone(), value.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_sees_parent_entries() {
        let mut parent = Scope::root();
        parent.insert("alpha", Arc::new(1));
        let parent = Arc::new(parent);
        let child = Scope::child_of(&parent);
        assert_eq!(child.get("alpha").as_deref(), Some(&1));
    }

    #[test]
    fn child_shadows_without_mutating_parent() {
        let mut parent = Scope::root();
        parent.insert("x", Arc::new(1));
        let parent = Arc::new(parent);
        let mut child = Scope::child_of(&parent);
        child.insert("x", Arc::new(2));
        assert_eq!(child.get("x").as_deref(), Some(&2));
        assert_eq!(parent.get("x").as_deref(), Some(&1));
    }

    #[test]
    fn flatten_orders_and_shadows() {
        let mut parent = Scope::root();
        parent.insert("b", Arc::new(1));
        parent.insert("a", Arc::new(1));
        let parent = Arc::new(parent);
        let mut child = Scope::child_of(&parent);
        child.insert("b", Arc::new(2));
        let flat = child.flatten();
        let names: Vec<_> = flat.keys().cloned().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(flat["b"].as_ref(), &2);
    }
}
