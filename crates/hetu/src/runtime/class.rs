//! `HetuClass`: a namespace of static members/methods plus the ordered,
//! not-yet-initialized instance-variable declarations inherited from an
//! optional superclass (spec §3 "HT_Class").

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{Expr, HType};
use crate::extern_bridge::{ExternalNamespace, NativeFn};
use crate::runtime::function::HetuFunction;
use crate::runtime::namespace::Namespace;

/// One instance-variable declaration, inherited or own (spec §3: "a separate
/// list of instance-variable *declarations* (not yet initialized)").
#[derive(Debug, Clone)]
pub struct InstanceVarDecl {
    pub name: Rc<str>,
    pub declared_type: HType,
    pub initializer: Option<Expr>,
    pub mutable: bool,
}

pub struct HetuClass {
    pub name: Rc<str>,
    pub superclass: Option<Rc<HetuClass>>,
    /// Static members and methods (spec §3: "HT_Class is a namespace whose
    /// entries are static members and methods").
    pub statics: Namespace,
    /// Own + inherited instance variable declarations, in declaration order
    /// (superclass entries first, spec §4.7 "superclass instance-variable
    /// declarations copied in").
    pub instance_vars: Vec<InstanceVarDecl>,
    /// Instance methods keyed by their dispatch name. Getters/setters are
    /// stored under their `__get__`/`__set__`-prefixed synthesized name
    /// (spec §4.1 reserved prefixes); plain methods and the constructor
    /// under their own/synthesized name.
    pub instance_methods: IndexMap<Rc<str>, Rc<HetuFunction>>,
    /// Native method table for the built-in literal-wrapper classes (spec
    /// §3 "Literal wrappers"), e.g. `List.length`. Empty for ordinary
    /// script-defined classes.
    pub native_methods: IndexMap<Rc<str>, NativeFn>,
    pub is_external: bool,
    pub external_namespace: RefCell<Option<Rc<dyn ExternalNamespace>>>,
}

impl HetuClass {
    pub fn new(name: Rc<str>, superclass: Option<Rc<HetuClass>>, statics: Namespace) -> Self {
        let instance_vars = superclass.as_ref().map(|s| s.instance_vars.clone()).unwrap_or_default();
        Self {
            name,
            superclass,
            statics,
            instance_vars,
            instance_methods: IndexMap::new(),
            native_methods: IndexMap::new(),
            is_external: false,
            external_namespace: RefCell::new(None),
        }
    }

    /// Looks up an instance method by name, walking the superclass chain
    /// (dynamic dispatch falls back to the superclass's method if the
    /// receiver's own class doesn't override it, spec §4.5 "MemberGet...
    /// first checks its own namespace then walks up to the class, then to
    /// any superclass").
    pub fn find_instance_method(&self, name: &str) -> Option<Rc<HetuFunction>> {
        if let Some(f) = self.instance_methods.get(name) {
            return Some(Rc::clone(f));
        }
        self.superclass.as_ref().and_then(|s| s.find_instance_method(name))
    }

    pub fn find_native_method(&self, name: &str) -> Option<NativeFn> {
        if let Some(f) = self.native_methods.get(name) {
            return Some(Rc::clone(f));
        }
        self.superclass.as_ref().and_then(|s| s.find_native_method(name))
    }

    pub fn constructor(&self) -> Option<Rc<HetuFunction>> {
        self.instance_methods.get(crate::lexicon::CONSTRUCTOR_NAME).cloned()
    }
}

impl std::fmt::Debug for HetuClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HetuClass").field("name", &self.name).finish()
    }
}
