//! Host-callable function table and external-namespace dispatch (spec
//! §4.6).
//!
//! Grounded in the teacher's `object.rs` host/Rust boundary value type — a
//! public-facing `Object` enum built for a specific (Python) host binding.
//! Hetu targets "any Rust host", so the equivalent boundary surface here is
//! narrower: a native-function signature plus the four-operation
//! `ExternalNamespace` trait spec §4.6 names directly, rather than a
//! Python-object-shaped value type.

use std::any::Any;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::errors::HResult;
use crate::value::Value;

/// The native function signature from spec §6: `(receiver_or_null,
/// positional_args, named_args) → value`.
pub type NativeFn = Rc<dyn Fn(Option<Value>, &[Value], &IndexMap<Rc<str>, Value>) -> HResult<Value>>;

/// Host-provided object backing an `external class` declaration (spec
/// §4.6). A script instance of the class carries the host-returned handle
/// from `construct`; subsequent member access on that instance routes
/// through `instance_fetch`/`instance_assign`. Static members on the
/// `external class` value itself route through `fetch`/`assign`.
pub trait ExternalNamespace {
    fn fetch(&self, name: &str) -> HResult<Value>;
    fn assign(&self, name: &str, value: Value) -> HResult<()>;
    fn instance_fetch(&self, handle: &Rc<dyn Any>, name: &str) -> HResult<Value>;
    fn instance_assign(&self, handle: &Rc<dyn Any>, name: &str, value: Value) -> HResult<()>;
    /// Produces a fresh host-side handle for `Person()`-style construction.
    /// Not part of spec §4.6's four named operations, but required to give
    /// `Call` on an external class value something to wrap (spec §8
    /// scenario f).
    fn construct(&self, positional: &[Value], named: &IndexMap<Rc<str>, Value>) -> HResult<Rc<dyn Any>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// A minimal external namespace backing spec §8 scenario (f): a
    /// `Person` with one `name` field defaulted to `"default name"` and a
    /// `greeting` method.
    pub struct PersonNamespace {
        pub printed: RefCell<Vec<String>>,
    }

    struct PersonHandle {
        name: RefCell<String>,
    }

    impl ExternalNamespace for PersonNamespace {
        fn fetch(&self, name: &str) -> HResult<Value> {
            panic!("no static members on Person: {name}")
        }

        fn assign(&self, name: &str, _value: Value) -> HResult<()> {
            panic!("no static members on Person: {name}")
        }

        fn instance_fetch(&self, handle: &Rc<dyn Any>, name: &str) -> HResult<Value> {
            let person = handle.downcast_ref::<PersonHandle>().expect("Person handle");
            match name {
                "name" => Ok(Value::String(Rc::from(person.name.borrow().as_str()))),
                "greeting" => {
                    self.printed.borrow_mut().push(format!("Hi! I'm {}", person.name.borrow()));
                    Ok(Value::Null)
                }
                other => panic!("unknown Person member {other}"),
            }
        }

        fn instance_assign(&self, handle: &Rc<dyn Any>, name: &str, value: Value) -> HResult<()> {
            let person = handle.downcast_ref::<PersonHandle>().expect("Person handle");
            match name {
                "name" => {
                    if let Value::String(s) = value {
                        *person.name.borrow_mut() = s.to_string();
                    }
                    Ok(())
                }
                other => panic!("unknown Person member {other}"),
            }
        }

        fn construct(&self, _positional: &[Value], _named: &IndexMap<Rc<str>, Value>) -> HResult<Rc<dyn Any>> {
            Ok(Rc::new(PersonHandle { name: RefCell::new("default name".to_string()) }))
        }
    }

    #[test]
    fn person_namespace_round_trips_name_and_greets() {
        let ns = PersonNamespace { printed: RefCell::new(Vec::new()) };
        let handle = ns.construct(&[], &IndexMap::new()).unwrap();
        ns.instance_assign(&handle, "name", Value::String(Rc::from("Alice"))).unwrap();
        ns.instance_fetch(&handle, "greeting").unwrap();
        assert_eq!(ns.printed.borrow().as_slice(), ["Hi! I'm Alice"]);
    }
}
