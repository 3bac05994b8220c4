//! The dynamic value sum type (spec §3, §9: "Dynamic values → one `Value`
//! sum").
//!
//! Grounded in the teacher's `namespace.rs`/`object.rs` split between an
//! internal value representation and a host-boundary value type, adapted to
//! spec §9's literal enumeration: `{ Null, Bool, Number, String, List, Map,
//! Function, Class, Instance, NativeHandle }`.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::runtime::class::HetuClass;
use crate::runtime::function::HetuFunction;
use crate::runtime::instance::HetuInstance;

pub mod builtins;

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<IndexMap<Value, Value>>>),
    Function(Rc<HetuFunction>),
    Class(Rc<HetuClass>),
    Instance(Rc<HetuInstance>),
    /// An opaque Rust value crossing the host boundary (spec §9), e.g. the
    /// handle backing an `external class` instance before it is wrapped.
    NativeHandle(Rc<dyn Any>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "num",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Function(_) => "function",
            Value::Class(_) => "CLASS",
            Value::Instance(_) => "Object",
            Value::NativeHandle(_) => "NativeHandle",
        }
    }

    /// Truthiness used by `if`/`while` conditions (spec §4.5: "condition
    /// must be boolean" — strict, no implicit truthy/falsy coercion, so
    /// this helper is only used by the few callers that also check
    /// `is_bool` first; kept here as the single place that would need to
    /// change if that were ever relaxed).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Runtime class name used by the `is` operator (spec §4.5 "Unary"/
    /// "Binary", §9 Open Question 2: strict name equality).
    pub fn runtime_class_name(&self) -> Rc<str> {
        match self {
            Value::Null => Rc::from("null"),
            Value::Bool(_) => Rc::from("bool"),
            Value::Number(_) => Rc::from("num"),
            Value::String(_) => Rc::from("String"),
            Value::List(_) => Rc::from("List"),
            Value::Map(_) => Rc::from("Map"),
            Value::Function(_) => Rc::from("function"),
            Value::Class(c) => Rc::clone(&c.name),
            Value::Instance(i) => Rc::clone(&i.class.name),
            Value::NativeHandle(_) => Rc::from("NativeHandle"),
        }
    }
}

/// Deep equality on primitives, identity on objects (spec §4.5 "Binary":
/// "`==`/`!=` use deep value equality on primitives and identity on
/// objects").
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::NativeHandle(a), Value::NativeHandle(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
impl Eq for Value {}

/// Hash consistent with the `PartialEq` above: primitives hash their
/// content, objects hash their `Rc` identity (pointer address). Needed so
/// `Value` can be a `LiteralDict`/`Map` key (spec §3 "Literal vector...
/// key→value pairs").
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => n.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::List(l) => (Rc::as_ptr(l) as *const () as usize).hash(state),
            Value::Map(m) => (Rc::as_ptr(m) as *const () as usize).hash(state),
            Value::Function(f) => (Rc::as_ptr(f) as *const () as usize).hash(state),
            Value::Class(c) => (Rc::as_ptr(c) as *const () as usize).hash(state),
            Value::Instance(i) => (Rc::as_ptr(i) as *const () as usize).hash(state),
            Value::NativeHandle(h) => (Rc::as_ptr(h) as *const () as usize).hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::String(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "<function {}>", func.decl.name),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "<instance of {}>", instance.class.name),
            Value::NativeHandle(_) => write!(f, "<native handle>"),
        }
    }
}
