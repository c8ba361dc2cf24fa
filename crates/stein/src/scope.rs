use std::{cell::RefCell, fmt, rc::Rc};

use fxhash::FxHashMap;

use crate::value::Value;

struct Frame {
    bindings: RefCell<FxHashMap<Box<str>, Value>>,
    superscope: Option<Scope>,
}

/// A lexical environment. Scopes form a singly linked chain that ends at the
/// session's root scope; cloning a `Scope` clones the handle, not the bindings.
#[derive(Clone)]
pub struct Scope(Rc<Frame>);

impl Scope {
    /// Creates a scope with no superscope.
    pub fn new() -> Self {
        Scope(Rc::new(Frame {
            bindings: RefCell::new(FxHashMap::default()),
            superscope: None,
        }))
    }

    /// Creates an empty scope enclosed by `self`.
    pub fn child(&self) -> Self {
        Scope(Rc::new(Frame {
            bindings: RefCell::new(FxHashMap::default()),
            superscope: Some(self.clone()),
        }))
    }

    pub fn superscope(&self) -> Option<&Scope> {
        self.0.superscope.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.0.superscope.is_none()
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Looks `name` up innermost to outermost.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.0.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            scope = current.superscope();
        }
        None
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.0.bindings.borrow().contains_key(name)
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.0.bindings.borrow().get(name).cloned()
    }

    /// Binds `name` in this scope, shadowing any outer binding.
    pub fn define(&self, name: &str, value: Value) {
        self.0.bindings.borrow_mut().insert(name.into(), value);
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.0.bindings.borrow_mut().remove(name)
    }

    /// Mutates the nearest existing binding of `name`, or creates it in this
    /// scope when no enclosing scope binds it.
    pub fn assign(&self, name: &str, value: Value) {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(slot) = current.0.bindings.borrow_mut().get_mut(name) {
                *slot = value;
                return;
            }
            scope = current.superscope();
        }
        self.define(name, value);
    }

    pub fn names(&self) -> Vec<Box<str>> {
        let mut names: Vec<_> = self.0.bindings.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drops every binding of this scope. Closures stored here usually capture
    /// the scope itself, so this is what breaks those reference cycles.
    pub fn clear(&self) {
        let bindings = std::mem::take(&mut *self.0.bindings.borrow_mut());
        drop(bindings);
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("names", &self.names())
            .field("root", &self.is_root())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_the_chain() {
        let root = Scope::new();
        root.define("x", Value::Int(1));
        let inner = root.child().child();
        assert_eq!(inner.lookup("x"), Some(Value::Int(1)));
        assert_eq!(inner.lookup("y"), None);
    }

    #[test]
    fn test_innermost_binding_wins() {
        let root = Scope::new();
        root.define("x", Value::Int(1));
        let inner = root.child();
        inner.define("x", Value::Int(2));
        assert_eq!(inner.lookup("x"), Some(Value::Int(2)));
        assert_eq!(root.lookup("x"), Some(Value::Int(1)));
    }

    #[test]
    fn test_assign_mutates_outer_binding() {
        let root = Scope::new();
        root.define("counter", Value::Int(0));
        let inner = root.child();
        inner.assign("counter", Value::Int(5));
        assert!(!inner.contains_local("counter"));
        assert_eq!(root.lookup("counter"), Some(Value::Int(5)));
    }

    #[test]
    fn test_assign_creates_unbound_name_locally() {
        let root = Scope::new();
        let inner = root.child();
        inner.assign("fresh", Value::TRUE);
        assert!(inner.contains_local("fresh"));
        assert_eq!(root.lookup("fresh"), None);
    }

    #[test]
    fn test_clear() {
        let root = Scope::new();
        root.define("a", Value::Int(1));
        root.clear();
        assert!(root.names().is_empty());
    }
}
