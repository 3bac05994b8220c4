//! End-to-end scenarios exercising the full pipeline through the public
//! `Interpreter` façade (spec §8 (a)-(f)).

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use pretty_assertions::assert_eq;

use hetu::{EvalOptions, ExternalNamespace, HResult, Interpreter, InterpreterConfig, NativeFn, Value};

/// Builds an interpreter with a `print` external wired to a shared log, so
/// tests can assert on the observable trace instead of the `eval` return
/// value (most scenario scripts communicate entirely through `print`).
fn interpreter_with_log() -> (Interpreter, Rc<RefCell<Vec<String>>>) {
    let interpreter = Interpreter::new(InterpreterConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let print: NativeFn = Rc::new(move |_receiver, args: &[Value], _named: &IndexMap<Rc<str>, Value>| {
        sink.borrow_mut().push(args.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "));
        Ok(Value::Null)
    });
    interpreter.load_external_functions([(Rc::from("print"), print)]);
    (interpreter, log)
}

#[test]
fn arithmetic_and_variables() {
    let (mut interpreter, log) = interpreter_with_log();
    let source = r"
        external fun print(value: any)
        var year = 2020
        proc main {
            print(year + 21)
        }
    ";
    interpreter.eval(source, EvalOptions { invoke_func: Some(Rc::from("main")), ..EvalOptions::default() }).unwrap();
    assert_eq!(log.borrow().as_slice(), ["2041"]);
}

#[test]
fn class_and_method() {
    let (mut interpreter, log) = interpreter_with_log();
    let source = r"
        external fun print(value: any)
        class C {
            var x
            construct(v: num) { this.x = v }
            fun twice: num { return x * 2 }
        }
        proc main {
            var c = C(7)
            print(c.twice())
        }
    ";
    interpreter.eval(source, EvalOptions { invoke_func: Some(Rc::from("main")), ..EvalOptions::default() }).unwrap();
    assert_eq!(log.borrow().as_slice(), ["14"]);
}

#[test]
fn closure_keeps_its_own_state_per_call() {
    let (mut interpreter, log) = interpreter_with_log();
    let source = r"
        external fun print(value: any)
        fun make(): fun {
            var n = 0
            fun step: num {
                n = n + 1
                return n
            }
            return step
        }
        proc main {
            var s = make()
            print(s())
            print(s())
            print(s())
        }
    ";
    interpreter.eval(source, EvalOptions { invoke_func: Some(Rc::from("main")), ..EvalOptions::default() }).unwrap();
    assert_eq!(log.borrow().as_slice(), ["1", "2", "3"]);
}

#[test]
fn for_in_over_list_sums_its_elements() {
    let (mut interpreter, log) = interpreter_with_log();
    let source = r"
        external fun print(value: any)
        proc main {
            var xs = [10, 20, 30]
            var sum = 0
            for (var x in xs) {
                sum = sum + x
            }
            print(sum)
        }
    ";
    interpreter.eval(source, EvalOptions { invoke_func: Some(Rc::from("main")), ..EvalOptions::default() }).unwrap();
    assert_eq!(log.borrow().as_slice(), ["60"]);
}

#[test]
fn subclass_method_overrides_superclass_method() {
    let (mut interpreter, log) = interpreter_with_log();
    let source = r"
        external fun print(value: any)
        class A {
            fun hi { print('A') }
        }
        class B extends A {
            fun hi { print('B') }
        }
        proc main {
            var b = B()
            b.hi()
        }
    ";
    interpreter.eval(source, EvalOptions { invoke_func: Some(Rc::from("main")), ..EvalOptions::default() }).unwrap();
    assert_eq!(log.borrow().as_slice(), ["B"]);
}

#[test]
fn super_call_reaches_the_parent_implementation() {
    let (mut interpreter, log) = interpreter_with_log();
    let source = r"
        external fun print(value: any)
        class A {
            fun hi { print('A') }
        }
        class B extends A {
            fun hi {
                super.hi()
                print('B')
            }
        }
        proc main {
            var b = B()
            b.hi()
        }
    ";
    interpreter.eval(source, EvalOptions { invoke_func: Some(Rc::from("main")), ..EvalOptions::default() }).unwrap();
    assert_eq!(log.borrow().as_slice(), ["A", "B"]);
}

/// Host-provided `Person` backing spec §8 scenario (f): one `name` field
/// defaulted to `"default name"`, and a `greeting` method that performs its
/// own host-side I/O rather than calling back into the script's `print`.
struct PersonNamespace {
    printed: RefCell<Vec<String>>,
}

struct PersonHandle {
    name: RefCell<String>,
}

impl ExternalNamespace for PersonNamespace {
    fn fetch(&self, name: &str) -> HResult<Value> {
        unreachable!("Person has no static members: {name}")
    }

    fn assign(&self, name: &str, _value: Value) -> HResult<()> {
        unreachable!("Person has no static members: {name}")
    }

    fn instance_fetch(&self, handle: &Rc<dyn Any>, name: &str) -> HResult<Value> {
        let person = handle.downcast_ref::<PersonHandle>().expect("Person handle");
        match name {
            "name" => Ok(Value::String(Rc::from(person.name.borrow().as_str()))),
            "greeting" => {
                self.printed.borrow_mut().push(format!("Hi! I'm {}", person.name.borrow()));
                Ok(Value::Null)
            }
            other => unreachable!("unknown Person member {other}"),
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
            other => unreachable!("unknown Person member {other}"),
        }
    }

    fn construct(&self, _positional: &[Value], _named: &IndexMap<Rc<str>, Value>) -> HResult<Rc<dyn Any>> {
        Ok(Rc::new(PersonHandle { name: RefCell::new("default name".to_owned()) }))
    }
}

#[test]
fn external_class_binding_round_trips_through_host_object() {
    let interpreter = Interpreter::new(InterpreterConfig::default());
    let person_ns = Rc::new(PersonNamespace { printed: RefCell::new(Vec::new()) });
    interpreter.bind_external_namespace("Person", Rc::clone(&person_ns) as Rc<dyn ExternalNamespace>);

    let source = r"
        external class Person {
            var name
            fun greeting
        }
        proc main {
            var p = Person()
            p.name = 'Alice'
            p.greeting()
        }
    ";
    let mut interpreter = interpreter;
    interpreter.eval(source, EvalOptions { invoke_func: Some(Rc::from("main")), ..EvalOptions::default() }).unwrap();
    assert_eq!(person_ns.printed.borrow().as_slice(), ["Hi! I'm Alice"]);
}

#[test]
fn immutable_rebind_is_rejected() {
    let (mut interpreter, _log) = interpreter_with_log();
    let source = r"
        let pi = 3
        proc main {
            pi = 4
        }
    ";
    let err = interpreter
        .eval(source, EvalOptions { invoke_func: Some(Rc::from("main")), ..EvalOptions::default() })
        .expect_err("reassigning a `let` binding must fail");
    assert_eq!(err.kind, hetu::ErrorKind::ImmutableWrite);
}
