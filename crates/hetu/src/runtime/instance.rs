//! `HetuInstance`: a namespace enclosed by its class, produced by
//! construction (spec §3, §4.7).

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::class::HetuClass;
use crate::runtime::namespace::Namespace;
use crate::value::Value;

pub struct HetuInstance {
    pub class: Rc<HetuClass>,
    /// Instance variables, enclosed by the class's static namespace (spec
    /// §3: "itself a namespace whose enclosure is the class").
    pub namespace: Namespace,
    /// Set only for a *wrapper* instance (spec §3 "Literal wrappers"): the
    /// underlying primitive value the wrapper gives method access to. The
    /// wrapper shell is transient — mutating a wrapped `List`/`Map` mutates
    /// the underlying value because `Value::List`/`Value::Map` carry
    /// `Rc<RefCell<..>>` data, not a copy.
    pub wrapped: RefCell<Option<Value>>,
    /// Set only for an instance of an `external class` (spec §4.6): the
    /// host-returned opaque handle, routed through the bound
    /// `ExternalNamespace`'s `instanceFetch`/`instanceAssign`.
    pub external_handle: RefCell<Option<Rc<dyn Any>>>,
}

impl HetuInstance {
    pub fn new(class: Rc<HetuClass>, namespace: Namespace) -> Self {
        Self { class, namespace, wrapped: RefCell::new(None), external_handle: RefCell::new(None) }
    }

    pub fn wrapping(class: Rc<HetuClass>, namespace: Namespace, value: Value) -> Self {
        Self { class, namespace, wrapped: RefCell::new(Some(value)), external_handle: RefCell::new(None) }
    }

    pub fn is_instance_of(&self, class_name: &str) -> bool {
        self.class.name.as_ref() == class_name
    }
}

impl std::fmt::Debug for HetuInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HetuInstance").field("class", &self.class.name).finish()
    }
}
