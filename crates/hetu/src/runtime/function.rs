//! `HetuFunction`: a `FuncDecl` plus the captured declaration context that
//! gives closures their lexical scope (spec §3 "HT_Function").

use std::rc::Rc;

use crate::ast::FuncDecl;
use crate::extern_bridge::NativeFn;
use crate::runtime::namespace::Namespace;

/// A callable value. Either a user-defined function/method (`decl` carries
/// its body) or a native extern binding (`native` is set, `decl.body` is
/// `None`) — spec §4.6 "a `fun`/method declared `external`... dispatches to
/// the native callback at call time."
#[derive(Clone)]
pub struct HetuFunction {
    pub decl: Rc<FuncDecl>,
    /// The namespace in effect when this function value was created: for a
    /// plain closure, the enclosing lexical scope at declaration (spec §3
    /// "HT_Function... captured declaration context"); for a method, the
    /// class's static namespace (instance methods additionally get `this`
    /// bound per-call via the receiver's own namespace, spec §4.5 "Function
    /// call").
    pub captured: Namespace,
    pub native: Option<NativeFn>,
}

impl HetuFunction {
    pub fn new(decl: Rc<FuncDecl>, captured: Namespace) -> Self {
        Self { decl, captured, native: None }
    }

    pub fn native(decl: Rc<FuncDecl>, captured: Namespace, native: NativeFn) -> Self {
        Self { decl, captured, native: Some(native) }
    }

    pub fn is_method(&self) -> bool {
        self.decl.owning_class.is_some()
    }
}

impl std::fmt::Debug for HetuFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HetuFunction")
            .field("name", &self.decl.name)
            .field("kind", &self.decl.kind)
            .field("native", &self.native.is_some())
            .finish()
    }
}
