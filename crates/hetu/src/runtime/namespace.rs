//! Namespace: a scope holding name → declaration-record bindings plus an
//! optional lexical-parent enclosure (spec §3 "Namespace").
//!
//! Grounded in the teacher's "namespace is a map plus optional enclosing
//! scope" shape (`namespace.rs`), but replacing the teacher's flat
//! heap-indexed array (its VM needs GC-style reuse) with a parent-pointer
//! `Rc<RefCell<..>>` chain, per spec §9's own Design Notes ("Closures &
//! namespaces → reference-counted tree"): Hetu's function values need an
//! independent lexical snapshot per closure rather than one shared stack of
//! numbered slots.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::HType;
use crate::errors::{ErrorKind, HResult, HetuError};
use crate::value::Value;

/// A single entry in a namespace: declared type, current value, and the
/// mutability/initialization flags spec §3 requires ("Invariants").
#[derive(Debug, Clone)]
pub struct Binding {
    pub declared_type: HType,
    pub value: Value,
    pub mutable: bool,
    pub initialized: bool,
}

impl Binding {
    pub fn new(value: Value, declared_type: HType, mutable: bool) -> Self {
        Self { declared_type, value, mutable, initialized: true }
    }
}

#[derive(Debug)]
struct NamespaceData {
    entries: IndexMap<Rc<str>, Binding>,
    enclosing: Option<Namespace>,
    qualified_name: Rc<str>,
}

/// Cheap-to-clone handle to a namespace. Namespaces form a tree: each one
/// holds a strong reference to its lexical parent, so a function's captured
/// declaration context keeps its whole enclosing chain alive (spec §3
/// "Lifecycles", §9 "reference-counted tree").
#[derive(Debug, Clone)]
pub struct Namespace(Rc<RefCell<NamespaceData>>);

impl Namespace {
    pub fn root(qualified_name: impl Into<Rc<str>>) -> Self {
        Self(Rc::new(RefCell::new(NamespaceData {
            entries: IndexMap::new(),
            enclosing: None,
            qualified_name: qualified_name.into(),
        })))
    }

    pub fn child(enclosing: &Namespace, qualified_name: impl Into<Rc<str>>) -> Self {
        Self(Rc::new(RefCell::new(NamespaceData {
            entries: IndexMap::new(),
            enclosing: Some(enclosing.clone()),
            qualified_name: qualified_name.into(),
        })))
    }

    pub fn qualified_name(&self) -> Rc<str> {
        Rc::clone(&self.0.borrow().qualified_name)
    }

    pub fn enclosing(&self) -> Option<Namespace> {
        self.0.borrow().enclosing.clone()
    }

    pub fn ptr_eq(&self, other: &Namespace) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Declares a new entry in this namespace's own map (no lexical walk).
    /// Used for parameters, `this`/`super`, var declarations, and function
    /// bindings.
    pub fn define(&self, name: Rc<str>, binding: Binding) {
        self.0.borrow_mut().entries.insert(name, binding);
    }

    /// Walks `distance` enclosing hops outward, then looks the name up in
    /// that ancestor's own map only (the resolver-computed fast path, spec
    /// §4.5 "Symbol").
    fn ancestor(&self, distance: u32) -> Option<Namespace> {
        let mut current = self.clone();
        for _ in 0..distance {
            let next = current.enclosing()?;
            current = next;
        }
        Some(current)
    }

    pub fn get_at(&self, distance: u32, name: &str) -> Option<Value> {
        let ns = self.ancestor(distance)?;
        let data = ns.0.borrow();
        data.entries.get(name).map(|b| b.value.clone())
    }

    pub fn assign_at(&self, distance: u32, name: &str, value: Value, span_err: impl Fn() -> HetuError) -> HResult<()> {
        let ns = self.ancestor(distance).ok_or_else(span_err)?;
        let mut data = ns.0.borrow_mut();
        let Some(binding) = data.entries.get_mut(name) else {
            return Err(span_err());
        };
        if !binding.mutable && binding.initialized {
            return Err(HetuError::new(
                ErrorKind::ImmutableWrite,
                ns.qualified_name(),
                0,
                0,
                format!("cannot assign to immutable variable `{name}`"),
            ));
        }
        binding.value = value;
        binding.initialized = true;
        Ok(())
    }

    /// Full dynamic walk from this namespace up to the root. Used whenever
    /// the resolver recorded no distance for a use-site (spec §4.4: "If not
    /// found, do nothing — the evaluator will look globally"); since an
    /// unresolved name cannot live in any block scope, this walk always
    /// lands on (or fails at) the root namespace in practice, but walking
    /// the whole chain keeps behavior correct even for names the resolver
    /// never saw (e.g. externally defined globals registered after parse).
    pub fn get_dynamic(&self, name: &str) -> Option<Value> {
        let mut current = self.clone();
        loop {
            if let Some(binding) = current.0.borrow().entries.get(name) {
                return Some(binding.value.clone());
            }
            current = current.enclosing()?;
        }
    }

    pub fn assign_dynamic(&self, name: &str, value: Value) -> HResult<()> {
        let mut current = self.clone();
        loop {
            let found = {
                let data = current.0.borrow();
                data.entries.contains_key(name)
            };
            if found {
                let mut data = current.0.borrow_mut();
                let binding = data.entries.get_mut(name).expect("checked above");
                if !binding.mutable && binding.initialized {
                    return Err(HetuError::new(
                        ErrorKind::ImmutableWrite,
                        current.qualified_name(),
                        0,
                        0,
                        format!("cannot assign to immutable variable `{name}`"),
                    ));
                }
                binding.value = value;
                binding.initialized = true;
                return Ok(());
            }
            match current.enclosing() {
                Some(next) => current = next,
                None => {
                    return Err(HetuError::new(
                        ErrorKind::UndefinedIdentifier,
                        current.qualified_name(),
                        0,
                        0,
                        format!("undefined identifier `{name}`"),
                    ));
                }
            }
        }
    }

    /// Own-map lookup only, no walk — used for member access (`fetch`).
    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.0.borrow().entries.get(name).map(|b| b.value.clone())
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.borrow().entries.contains_key(name)
    }

    /// Own-map assignment only, no walk — used for member assignment
    /// (`assign`). Fails if the entry doesn't already exist; callers that
    /// want "assign-or-declare" should `define` instead.
    pub fn set_own(&self, name: &str, value: Value) -> HResult<()> {
        let mut data = self.0.borrow_mut();
        let Some(binding) = data.entries.get_mut(name) else {
            return Err(HetuError::new(
                ErrorKind::GetOnNonObject,
                Rc::clone(&data.qualified_name),
                0,
                0,
                format!("no such member `{name}`"),
            ));
        };
        if !binding.mutable && binding.initialized {
            return Err(HetuError::new(
                ErrorKind::ImmutableWrite,
                Rc::clone(&data.qualified_name),
                0,
                0,
                format!("cannot assign to immutable member `{name}`"),
            ));
        }
        binding.value = value;
        binding.initialized = true;
        Ok(())
    }

    /// Iterates this namespace's own entries in insertion order (used for
    /// e.g. `dir`-style introspection and instance-variable population).
    pub fn own_names(&self) -> Vec<Rc<str>> {
        self.0.borrow().entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestor_walk_finds_outer_binding() {
        let root = Namespace::root("root");
        root.define(Rc::from("x"), Binding::new(Value::Number(1.0), HType::any(), true));
        let child = Namespace::child(&root, "child");
        assert_eq!(child.get_at(1, "x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn dynamic_walk_finds_global_without_distance() {
        let root = Namespace::root("root");
        root.define(Rc::from("g"), Binding::new(Value::Bool(true), HType::any(), true));
        let child = Namespace::child(&root, "child");
        let grandchild = Namespace::child(&child, "grandchild");
        assert_eq!(grandchild.get_dynamic("g"), Some(Value::Bool(true)));
    }

    #[test]
    fn immutable_rebind_fails() {
        let root = Namespace::root("root");
        root.define(Rc::from("x"), Binding::new(Value::Number(1.0), HType::any(), false));
        let err = root.assign_dynamic("x", Value::Number(2.0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ImmutableWrite);
    }
}
