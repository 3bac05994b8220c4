//! Literal wrapper classes: `num`, `bool`, `String`, `List`, `Map` (spec §3
//! "Literal wrappers", §6 "Value model"). Constructed once per interpreter
//! and installed into the root namespace at startup; each carries the
//! native method table backing member access on bare primitives
//! (`List.length`, `String.length`, …) — spec §1 treats the *rest* of the
//! standard library as out-of-scope extern-registration shape, but these
//! five are core value-model responsibilities, not stdlib.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::extern_bridge::NativeFn;
use crate::runtime::class::HetuClass;
use crate::runtime::namespace::{Binding, Namespace};
use crate::value::Value;

pub struct BuiltinClasses {
    pub num: Rc<HetuClass>,
    pub bool_: Rc<HetuClass>,
    pub string: Rc<HetuClass>,
    pub list: Rc<HetuClass>,
    pub map: Rc<HetuClass>,
    pub object: Rc<HetuClass>,
}

fn native(f: impl Fn(Option<Value>, &[Value], &IndexMap<Rc<str>, Value>) -> crate::errors::HResult<Value> + 'static) -> NativeFn {
    Rc::new(f)
}

/// Registers the five literal-wrapper classes plus the root `Object` class
/// into `globals`, returning handles used by the evaluator to wrap
/// primitives and dispatch their member access.
pub fn install(globals: &Namespace) -> BuiltinClasses {
    let object = Rc::new(HetuClass::new(Rc::from("Object"), None, Namespace::child(globals, "Object")));
    globals.define(Rc::from("Object"), Binding::new(Value::Class(Rc::clone(&object)), crate::ast::HType::any(), false));

    let num = Rc::new(class_with_methods(globals, "num", None, []));
    let bool_ = Rc::new(class_with_methods(globals, "bool", None, []));

    let string = Rc::new(class_with_methods(
        globals,
        "String",
        None,
        [
            ("length", native(|recv, _a, _n| {
                let Some(Value::String(s)) = recv else { return Ok(Value::Number(0.0)) };
                Ok(Value::Number(s.chars().count() as f64))
            }) as NativeFn),
            ("toUpperCase", native(|recv, _a, _n| {
                let Some(Value::String(s)) = recv else { return Ok(Value::Null) };
                Ok(Value::String(Rc::from(s.to_uppercase())))
            })),
            ("toLowerCase", native(|recv, _a, _n| {
                let Some(Value::String(s)) = recv else { return Ok(Value::Null) };
                Ok(Value::String(Rc::from(s.to_lowercase())))
            })),
            ("trim", native(|recv, _a, _n| {
                let Some(Value::String(s)) = recv else { return Ok(Value::Null) };
                Ok(Value::String(Rc::from(s.trim())))
            })),
        ],
    ));

    let list = Rc::new(class_with_methods(
        globals,
        "List",
        None,
        [
            ("length", native(|recv, _a, _n| {
                let Some(Value::List(items)) = recv else { return Ok(Value::Number(0.0)) };
                Ok(Value::Number(items.borrow().len() as f64))
            }) as NativeFn),
            ("isEmpty", native(|recv, _a, _n| {
                let Some(Value::List(items)) = recv else { return Ok(Value::Bool(true)) };
                Ok(Value::Bool(items.borrow().is_empty()))
            })),
            ("push", native(|recv, args, _n| {
                let Some(Value::List(items)) = recv else { return Ok(Value::Null) };
                if let Some(v) = args.first() {
                    items.borrow_mut().push(v.clone());
                }
                Ok(Value::Null)
            })),
            ("pop", native(|recv, _a, _n| {
                let Some(Value::List(items)) = recv else { return Ok(Value::Null) };
                Ok(items.borrow_mut().pop().unwrap_or(Value::Null))
            })),
        ],
    ));

    let map = Rc::new(class_with_methods(
        globals,
        "Map",
        None,
        [
            ("length", native(|recv, _a, _n| {
                let Some(Value::Map(entries)) = recv else { return Ok(Value::Number(0.0)) };
                Ok(Value::Number(entries.borrow().len() as f64))
            }) as NativeFn),
            ("keys", native(|recv, _a, _n| {
                let Some(Value::Map(entries)) = recv else { return Ok(Value::List(Rc::new(std::cell::RefCell::new(Vec::new())))) };
                let keys: Vec<Value> = entries.borrow().keys().cloned().collect();
                Ok(Value::List(Rc::new(std::cell::RefCell::new(keys))))
            })),
            ("values", native(|recv, _a, _n| {
                let Some(Value::Map(entries)) = recv else { return Ok(Value::List(Rc::new(std::cell::RefCell::new(Vec::new())))) };
                let values: Vec<Value> = entries.borrow().values().cloned().collect();
                Ok(Value::List(Rc::new(std::cell::RefCell::new(values))))
            })),
            ("has", native(|recv, args, _n| {
                let Some(Value::Map(entries)) = recv else { return Ok(Value::Bool(false)) };
                let Some(key) = args.first() else { return Ok(Value::Bool(false)) };
                Ok(Value::Bool(entries.borrow().contains_key(key)))
            })),
            ("get", native(|recv, args, _n| {
                let Some(Value::Map(entries)) = recv else { return Ok(Value::Null) };
                let Some(key) = args.first() else { return Ok(Value::Null) };
                Ok(entries.borrow().get(key).cloned().unwrap_or(Value::Null))
            })),
            ("set", native(|recv, args, _n| {
                let Some(Value::Map(entries)) = recv else { return Ok(Value::Null) };
                if let (Some(key), Some(value)) = (args.first(), args.get(1)) {
                    entries.borrow_mut().insert(key.clone(), value.clone());
                }
                Ok(Value::Null)
            })),
        ],
    ));

    // Bound under their source names too (spec §3 "reserved types": `num`,
    // `bool`, `String`, `List`, `Map`, `Object`), so `x is num` and similar
    // wrapper-class references resolve like any other class value.
    globals.define(Rc::from("num"), Binding::new(Value::Class(Rc::clone(&num)), crate::ast::HType::any(), false));
    globals.define(Rc::from("bool"), Binding::new(Value::Class(Rc::clone(&bool_)), crate::ast::HType::any(), false));
    globals.define(Rc::from("String"), Binding::new(Value::Class(Rc::clone(&string)), crate::ast::HType::any(), false));
    globals.define(Rc::from("List"), Binding::new(Value::Class(Rc::clone(&list)), crate::ast::HType::any(), false));
    globals.define(Rc::from("Map"), Binding::new(Value::Class(Rc::clone(&map)), crate::ast::HType::any(), false));

    BuiltinClasses { num, bool_, string, list, map, object }
}

fn class_with_methods<const N: usize>(
    globals: &Namespace,
    name: &str,
    superclass: Option<Rc<HetuClass>>,
    methods: [(&str, NativeFn); N],
) -> HetuClass {
    let statics = Namespace::child(globals, name);
    let mut class = HetuClass::new(Rc::from(name), superclass, statics);
    for (method_name, f) in methods {
        class.native_methods.insert(Rc::from(method_name), f);
    }
    class
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn list_length_native_method_counts_items() {
        let globals = Namespace::root("globals");
        let builtins = install(&globals);
        let list_value = Value::List(Rc::new(RefCell::new(vec![Value::Number(1.0), Value::Number(2.0)])));
        let f = builtins.list.find_native_method("length").unwrap();
        let result = f(Some(list_value), &[], &IndexMap::new()).unwrap();
        assert_eq!(result, Value::Number(2.0));
    }
}
