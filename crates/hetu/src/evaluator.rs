//! Tree-walking visitor executing statements and evaluating expressions
//! (spec §4.5, §5).
//!
//! Grounded in the teacher's `run.rs` statement-dispatch nonlocal-exit
//! handling (return/break/continue/raise all propagate through a dispatch
//! `Result`), narrowed to Hetu's three flow signals since there is no
//! exception system in scope (spec §9 Design Notes: "Return/break/continue
//! → nonlocal exit").

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ahash::AHashSet;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::ast::{BinaryOp, ClassDecl, Expr, ExprKind, FuncDecl, HType, ParamKind, Stmt, StmtKind, UnaryOp};
use crate::errors::{ErrorKind, HResult, HetuError};
use crate::extern_bridge::{ExternalNamespace, NativeFn};
use crate::intern::Interner;
use crate::lexer::Lexer;
use crate::lexicon::{GETTER_PREFIX, SETTER_PREFIX};
use crate::parser::{Literal, Parser};
use crate::resolver::{self, DistanceMap};
use crate::runtime::class::InstanceVarDecl;
use crate::runtime::{Binding, HetuClass, HetuFunction, HetuInstance, Namespace};
use crate::token::Span;
use crate::tracer::{AnyTracer, Tracer};
use crate::value::builtins::{self, BuiltinClasses};
use crate::value::Value;

/// A host callback resolving an import path to source text (spec §6
/// `file_reader`, §4.5 "Import").
pub type FileReader = Rc<dyn Fn(&Path) -> HResult<String>>;

/// The three nonlocal-exit forms (spec §4.5 "Return handling", §9 Design
/// Notes). Never escape `invoke`/`eval` (spec §7 "Internal flow signals are
/// always caught").
#[derive(Debug, Clone)]
pub enum Flow {
    Return(Value),
    Break,
    Continue,
}

/// The result of evaluating one statement: either its last expression's
/// value (so a block/function/library body can report "the last
/// statement's value", spec §6) or a nonlocal exit in flight.
#[derive(Debug, Clone)]
pub enum StmtOutcome {
    Normal(Value),
    Flow(Flow),
}

impl StmtOutcome {
    fn into_value(self) -> Value {
        match self {
            StmtOutcome::Normal(v) => v,
            StmtOutcome::Flow(Flow::Return(v)) => v,
            StmtOutcome::Flow(_) => Value::Null,
        }
    }
}

/// Tree-walking evaluator state (spec §4.5): global namespace, literal pool,
/// the resolver's distance map, and an evaluated-files guard for imports.
/// One `Evaluator` belongs to exactly one interpreter instance; its AST and
/// distance map must not be shared with another (spec §5 "Shared
/// resources").
pub struct Evaluator {
    pub globals: Namespace,
    literals: Vec<Value>,
    distances: DistanceMap,
    builtins: BuiltinClasses,
    file: Rc<str>,
    working_directory: PathBuf,
    file_reader: Option<FileReader>,
    evaluated_files: RefCell<AHashSet<Rc<str>>>,
    external_namespaces: RefCell<IndexMap<Rc<str>, Rc<dyn ExternalNamespace>>>,
    tracer: RefCell<AnyTracer>,
    call_depth: Cell<usize>,
}

impl Evaluator {
    pub fn new(working_directory: PathBuf, file_reader: Option<FileReader>, debug: bool) -> Self {
        let globals = Namespace::root("globals");
        let builtins = builtins::install(&globals);
        Self {
            globals,
            literals: Vec::new(),
            distances: DistanceMap::default(),
            builtins,
            file: Rc::from(""),
            working_directory,
            file_reader,
            evaluated_files: RefCell::new(AHashSet::default()),
            external_namespaces: RefCell::new(IndexMap::new()),
            tracer: RefCell::new(AnyTracer::new(debug)),
            call_depth: Cell::new(0),
        }
    }

    pub fn bind_external_namespace(&self, name: Rc<str>, ns: Rc<dyn ExternalNamespace>) {
        self.external_namespaces.borrow_mut().insert(name, ns);
    }

    pub fn define_global(&self, name: Rc<str>, value: Value, declared_type: HType, mutable: bool) {
        self.globals.define(name, Binding::new(value, declared_type, mutable));
    }

    /// Host re-entry point (spec §6 "invoke"): calls a script-defined
    /// function directly, or a static method when `class_name` is given.
    /// Reentrant — a native callback may call back in this way while the
    /// interpreter is already mid-evaluation.
    pub fn invoke(
        &self,
        function_name: &str,
        class_name: Option<&str>,
        positional: Vec<Value>,
        named: IndexMap<Rc<str>, Value>,
    ) -> HResult<Value> {
        let span = Span::new(Rc::clone(&self.file), 0, 0);
        let target = match class_name {
            Some(cn) => {
                let class_val = self
                    .globals
                    .get_dynamic(cn)
                    .ok_or_else(|| self.err(ErrorKind::UndefinedIdentifier, &span, format!("no such class `{cn}`")))?;
                let Value::Class(class) = class_val else {
                    return Err(self.err(ErrorKind::NotAClass, &span, format!("`{cn}` is not a class")));
                };
                class.statics.get_own(function_name)
            }
            None => self.globals.get_dynamic(function_name),
        };
        match target {
            Some(Value::Function(f)) => self.call_function(&f, None, positional, named, &span),
            Some(other) => Err(self.err(
                ErrorKind::NotCallable,
                &span,
                format!("`{function_name}` is not a function, found {}", other.type_name()),
            )),
            None => Err(self.err(ErrorKind::UndefinedIdentifier, &span, format!("no such function `{function_name}`"))),
        }
    }

    /// Parses, resolves, and evaluates a whole program into the global
    /// namespace (library style), returning the last statement's value
    /// (spec §6 "eval ... returns the last statement's value").
    pub fn eval_source(&mut self, source: &str, file: Rc<str>) -> HResult<Value> {
        let mut interner = Interner::new();
        let tokens = Lexer::new(source, Rc::clone(&file), &mut interner).tokenize()?;
        let program = Parser::new(tokens, Rc::clone(&file)).parse_library()?;
        let distances = resolver::resolve_program(&program, Rc::clone(&file))?;

        self.file = file;
        self.load_literals(&program.literals);
        self.distances = distances;
        let globals = self.globals.clone();
        let outcome = self.eval_stmts(&program.statements, &globals)?;
        // Flow signals are caught by their own handler (loop for break/
        // continue, call frame for return, §7 "Internal flow signals are
        // always caught") — none should still be in flight once a whole
        // library's top-level statements have run.
        debug_assert!(!matches!(outcome, StmtOutcome::Flow(Flow::Break | Flow::Continue)));
        Ok(outcome.into_value())
    }

    fn load_literals(&mut self, literals: &[Literal]) {
        self.literals = literals
            .iter()
            .map(|l| match l {
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::String(Rc::clone(s)),
                Literal::Bool(b) => Value::Bool(*b),
            })
            .collect();
    }

    fn err(&self, kind: ErrorKind, span: &Span, message: impl Into<String>) -> HetuError {
        HetuError::new(kind, Rc::clone(&span.file), span.line, span.column, message.into())
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn eval_stmts(&self, stmts: &[Stmt], ns: &Namespace) -> HResult<StmtOutcome> {
        let mut outcome = StmtOutcome::Normal(Value::Null);
        for stmt in stmts {
            outcome = self.eval_stmt(stmt, ns)?;
            if matches!(outcome, StmtOutcome::Flow(_)) {
                return Ok(outcome);
            }
        }
        Ok(outcome)
    }

    fn eval_stmt(&self, stmt: &Stmt, ns: &Namespace) -> HResult<StmtOutcome> {
        self.tracer.borrow_mut().on_statement(&stmt.span.file, stmt.span.line);
        match &stmt.kind {
            StmtKind::Import { path, alias } => {
                self.eval_import(path.as_ref(), alias.as_deref())?;
                Ok(StmtOutcome::Normal(Value::Null))
            }
            StmtKind::VarDecl(decl) => {
                let value = match &decl.initializer {
                    Some(init) => self.eval_expr(init, ns)?,
                    None => Value::Null,
                };
                ns.define(
                    Rc::clone(&decl.name),
                    Binding {
                        declared_type: decl.declared_type.clone(),
                        value,
                        mutable: decl.flags.mutable,
                        initialized: decl.initializer.is_some(),
                    },
                );
                Ok(StmtOutcome::Normal(Value::Null))
            }
            StmtKind::ExprStmt(expr) => Ok(StmtOutcome::Normal(self.eval_expr(expr, ns)?)),
            StmtKind::Block(stmts) => {
                let child = Namespace::child(ns, "<block>");
                self.eval_stmts(stmts, &child)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval_expr(e, ns)?,
                    None => Value::Null,
                };
                Ok(StmtOutcome::Flow(Flow::Return(value)))
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                if self.eval_bool_condition(cond, ns)? {
                    self.eval_stmt(then_branch, ns)
                } else if let Some(else_branch) = else_branch {
                    self.eval_stmt(else_branch, ns)
                } else {
                    Ok(StmtOutcome::Normal(Value::Null))
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval_bool_condition(cond, ns)? {
                    match self.eval_stmt(body, ns)? {
                        StmtOutcome::Flow(Flow::Break) => break,
                        StmtOutcome::Flow(Flow::Continue) | StmtOutcome::Normal(_) => {}
                        flow @ StmtOutcome::Flow(Flow::Return(_)) => return Ok(flow),
                    }
                }
                Ok(StmtOutcome::Normal(Value::Null))
            }
            StmtKind::Break => Ok(StmtOutcome::Flow(Flow::Break)),
            StmtKind::Continue => Ok(StmtOutcome::Flow(Flow::Continue)),
            StmtKind::FuncDecl(decl) => {
                self.declare_function(decl, ns)?;
                Ok(StmtOutcome::Normal(Value::Null))
            }
            StmtKind::ClassDecl(decl) => {
                self.declare_class(decl, ns)?;
                Ok(StmtOutcome::Normal(Value::Null))
            }
        }
    }

    fn eval_bool_condition(&self, cond: &Expr, ns: &Namespace) -> HResult<bool> {
        match self.eval_expr(cond, ns)? {
            Value::Bool(b) => Ok(b),
            other => Err(self.err(
                ErrorKind::ConditionNotBoolean,
                &cond.span,
                format!("condition must be a bool, found {}", other.type_name()),
            )),
        }
    }

    fn declare_function(&self, decl: &Rc<FuncDecl>, ns: &Namespace) -> HResult<()> {
        let func = if decl.is_external {
            let key: Rc<str> = Rc::from(format!("{}{}", crate::lexicon::EXTERNAL_PREFIX, decl.name));
            let native = self.globals.get_own(&key).and_then(|v| match v {
                Value::NativeHandle(h) => h.downcast_ref::<NativeFnBox>().map(|b| Rc::clone(&b.0)),
                _ => None,
            });
            match native {
                Some(native) => HetuFunction::native(Rc::clone(decl), ns.clone(), native),
                None => HetuFunction::new(Rc::clone(decl), ns.clone()),
            }
        } else {
            HetuFunction::new(Rc::clone(decl), ns.clone())
        };
        ns.define(Rc::clone(&decl.name), Binding::new(Value::Function(Rc::new(func)), HType::named(Rc::from("function")), false));
        Ok(())
    }

    /// Class declaration processing (spec §4.7 state machine).
    fn declare_class(&self, decl: &Rc<ClassDecl>, ns: &Namespace) -> HResult<()> {
        let superclass = match &decl.superclass {
            Some(name) => match ns.get_dynamic(name) {
                Some(Value::Class(c)) => Rc::clone(&c),
                _ => {
                    return Err(self.err(ErrorKind::NotAClass, &decl.span, format!("`{name}` is not a class")));
                }
            },
            None => Rc::clone(&self.builtins.object),
        };

        let statics = Namespace::child(ns, Rc::clone(&decl.name));
        if decl.superclass.is_some() {
            statics.define(
                Rc::from("super"),
                Binding::new(Value::Class(Rc::clone(&superclass)), HType::named(Rc::from("CLASS")), false),
            );
        }

        for var in decl.variables.iter().filter(|v| v.flags.is_static) {
            let value = match &var.initializer {
                Some(init) => self.eval_expr(init, &statics)?,
                None => Value::Null,
            };
            statics.define(
                Rc::clone(&var.name),
                Binding {
                    declared_type: var.declared_type.clone(),
                    value,
                    mutable: var.flags.mutable,
                    initialized: var.initializer.is_some(),
                },
            );
        }

        for method in decl.methods.iter().filter(|m| m.is_static) {
            let func = Rc::new(HetuFunction::new(Rc::clone(method), statics.clone()));
            statics.define(dispatch_name(method), Binding::new(Value::Function(Rc::clone(&func)), HType::any(), false));
        }

        let mut instance_vars: Vec<InstanceVarDecl> = superclass.instance_vars.clone();
        for var in decl.variables.iter().filter(|v| !v.flags.is_static) {
            instance_vars.push(InstanceVarDecl {
                name: Rc::clone(&var.name),
                declared_type: var.declared_type.clone(),
                initializer: var.initializer.clone(),
                mutable: var.flags.mutable,
            });
        }

        let mut instance_methods = IndexMap::new();
        for method in decl.methods.iter().filter(|m| !m.is_static) {
            let func = Rc::new(HetuFunction::new(Rc::clone(method), statics.clone()));
            instance_methods.insert(dispatch_name(method), func);
        }

        let mut class = HetuClass::new(Rc::clone(&decl.name), Some(superclass), statics);
        class.instance_vars = instance_vars;
        class.instance_methods = instance_methods;
        class.is_external = decl.is_external;
        if decl.is_external {
            if let Some(host_ns) = self.external_namespaces.borrow().get(decl.name.as_ref()) {
                *class.external_namespace.borrow_mut() = Some(Rc::clone(host_ns));
            }
        }

        let class = Rc::new(class);
        ns.define(Rc::clone(&decl.name), Binding::new(Value::Class(Rc::clone(&class)), HType::named(Rc::from("CLASS")), false));
        Ok(())
    }

    /// Import resolution (spec §4.5 "Import"): lexes, parses, resolves, and
    /// evaluates the target file exactly once, merging its top-level
    /// declarations into the shared global namespace. `alias` is accepted
    /// (per grammar) but not yet given qualified-access semantics — the
    /// value model has no namespace-handle `Value` variant to bind it to
    /// (documented in DESIGN.md).
    fn eval_import(&self, path: &str, _alias: Option<&str>) -> HResult<()> {
        let key: Rc<str> = Rc::from(path);
        if self.evaluated_files.borrow().contains(&key) {
            return Ok(());
        }
        let full_path = self.working_directory.join(path);
        let source = match &self.file_reader {
            Some(reader) => reader(&full_path)?,
            None => std::fs::read_to_string(&full_path).map_err(|e| {
                HetuError::new(ErrorKind::ImportFailed, Rc::clone(&self.file), 0, 0, format!("reading `{path}`: {e}"))
            })?,
        };

        let mut interner = Interner::new();
        let file: Rc<str> = Rc::from(path);
        let tokens = Lexer::new(&source, Rc::clone(&file), &mut interner).tokenize()?;
        let program = Parser::new(tokens, Rc::clone(&file)).parse_library()?;
        let distances = resolver::resolve_program(&program, file)?;

        // `self.literals`/`self.distances` belong to the currently active
        // program; an imported file gets its own private evaluator over
        // the same (shared, `Rc<RefCell<..>>`-backed) global namespace so
        // its declarations land in `self.globals` without clobbering them.
        let mut sub = Evaluator::new(self.working_directory.clone(), self.file_reader.clone(), false);
        sub.globals = self.globals.clone();
        sub.load_literals(&program.literals);
        sub.distances = distances;
        sub.eval_stmts(&program.statements, &self.globals)?;

        self.evaluated_files.borrow_mut().insert(key);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn eval_expr(&self, expr: &Expr, ns: &Namespace) -> HResult<Value> {
        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Const(idx) => Ok(self.literals[*idx].clone()),
            ExprKind::Group(inner) => self.eval_expr(inner, ns),
            ExprKind::LiteralVector(items) => {
                let values = items.iter().map(|e| self.eval_expr(e, ns)).collect::<HResult<Vec<_>>>()?;
                Ok(Value::List(Rc::new(RefCell::new(values))))
            }
            ExprKind::LiteralDict(pairs) => {
                let mut map = IndexMap::new();
                for (k, v) in pairs {
                    let key = self.eval_expr(k, ns)?;
                    let value = self.eval_expr(v, ns)?;
                    map.insert(key, value);
                }
                Ok(Value::Map(Rc::new(RefCell::new(map))))
            }
            ExprKind::Symbol(name) => self.lookup_symbol(expr, name, ns),
            ExprKind::Unary(op, operand) => self.eval_unary(*op, operand, ns),
            ExprKind::Binary(lhs, op, rhs) => self.eval_binary(lhs, *op, rhs, ns),
            ExprKind::SubGet(coll, key) => {
                let coll_val = self.eval_expr(coll, ns)?;
                let key_val = self.eval_expr(key, ns)?;
                self.sub_get(&coll_val, &key_val, &expr.span)
            }
            ExprKind::SubSet(coll, key, value) => {
                let coll_val = self.eval_expr(coll, ns)?;
                let key_val = self.eval_expr(key, ns)?;
                let value_val = self.eval_expr(value, ns)?;
                self.sub_set(&coll_val, key_val, value_val.clone(), &expr.span)?;
                Ok(value_val)
            }
            ExprKind::MemberGet(coll, name) => {
                let receiver = self.eval_expr(coll, ns)?;
                self.member_get(receiver, name, &expr.span)
            }
            ExprKind::MemberSet(coll, name, value) => {
                let receiver = self.eval_expr(coll, ns)?;
                let value_val = self.eval_expr(value, ns)?;
                self.member_set(&receiver, name, value_val.clone(), &expr.span)?;
                Ok(value_val)
            }
            ExprKind::Call { callee, positional, named } => self.eval_call(callee, positional, named, ns),
            ExprKind::This => self.lookup_symbol(expr, "this", ns),
            ExprKind::Assign { name, value } => {
                let v = self.eval_expr(value, ns)?;
                match self.distances.get(&expr.id) {
                    Some(&d) => ns.assign_at(d, name, v.clone(), || {
                        self.err(ErrorKind::UndefinedIdentifier, &expr.span, format!("undefined identifier `{name}`"))
                    })?,
                    None => ns.assign_dynamic(name, v.clone())?,
                }
                Ok(v)
            }
            ExprKind::NamedArg(_, value) => self.eval_expr(value, ns),
        }
    }

    fn lookup_symbol(&self, expr: &Expr, name: &str, ns: &Namespace) -> HResult<Value> {
        let found = match self.distances.get(&expr.id) {
            Some(&d) => ns.get_at(d, name),
            None => ns.get_dynamic(name),
        };
        found.ok_or_else(|| self.err(ErrorKind::UndefinedIdentifier, &expr.span, format!("undefined identifier `{name}`")))
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr, ns: &Namespace) -> HResult<Value> {
        let value = self.eval_expr(operand, ns)?;
        match (op, &value) {
            (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            _ => Err(self.err(
                ErrorKind::UndefinedOperator,
                &operand.span,
                format!("unary operator not defined for {}", value.type_name()),
            )),
        }
    }

    fn eval_binary(&self, lhs: &Expr, op: BinaryOp, rhs: &Expr, ns: &Namespace) -> HResult<Value> {
        // Short-circuit tier (spec §4.5 "Binary. && and || short-circuit on the left").
        if op == BinaryOp::And || op == BinaryOp::Or {
            let left = self.eval_bool_condition(lhs, ns)?;
            if op == BinaryOp::And && !left {
                return Ok(Value::Bool(false));
            }
            if op == BinaryOp::Or && left {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(self.eval_bool_condition(rhs, ns)?));
        }

        let left = self.eval_expr(lhs, ns)?;

        if op == BinaryOp::Is {
            let Value::Class(class) = self.eval_expr(rhs, ns)? else {
                return Err(self.err(ErrorKind::NotAClass, &rhs.span, "right-hand side of `is` must be a class"));
            };
            return Ok(Value::Bool(left.runtime_class_name().as_ref() == class.name.as_ref()));
        }

        let right = self.eval_expr(rhs, ns)?;

        match op {
            BinaryOp::EqEq => return Ok(Value::Bool(left == right)),
            BinaryOp::NotEq => return Ok(Value::Bool(left != right)),
            _ => {}
        }

        match (op, &left, &right) {
            (BinaryOp::Add, Value::String(a), Value::String(b)) => Ok(Value::String(Rc::from(format!("{a}{b}")))),
            (BinaryOp::Add, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (BinaryOp::Sub, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
            (BinaryOp::Mul, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
            (BinaryOp::Div, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
            (BinaryOp::Rem, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a % b)),
            (BinaryOp::Lt, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),
            (BinaryOp::Gt, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),
            (BinaryOp::Le, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),
            (BinaryOp::Ge, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),
            _ => Err(self.err(
                ErrorKind::UndefinedOperator,
                &lhs.span,
                format!("operator not defined for {} and {}", left.type_name(), right.type_name()),
            )),
        }
    }

    fn sub_get(&self, coll: &Value, key: &Value, span: &Span) -> HResult<Value> {
        match coll {
            Value::List(items) => {
                let Value::Number(idx) = key else {
                    return Err(self.err(ErrorKind::SubscriptOnNonCollection, span, "list index must be a number"));
                };
                let idx = *idx as i64;
                let items = items.borrow();
                if idx < 0 || idx as usize >= items.len() {
                    return Err(self.err(ErrorKind::IndexOutOfRange, span, format!("index {idx} out of range")));
                }
                Ok(items[idx as usize].clone())
            }
            Value::Map(entries) => Ok(entries.borrow().get(key).cloned().unwrap_or(Value::Null)),
            Value::Instance(inst) => {
                let wrapped = inst.wrapped.borrow().clone();
                match wrapped {
                    Some(v) => self.sub_get(&v, key, span),
                    None => Err(self.err(ErrorKind::SubscriptOnNonCollection, span, "not a list or map")),
                }
            }
            other => Err(self.err(
                ErrorKind::SubscriptOnNonCollection,
                span,
                format!("cannot subscript {}", other.type_name()),
            )),
        }
    }

    fn sub_set(&self, coll: &Value, key: Value, value: Value, span: &Span) -> HResult<()> {
        match coll {
            Value::List(items) => {
                let Value::Number(idx) = key else {
                    return Err(self.err(ErrorKind::SubscriptOnNonCollection, span, "list index must be a number"));
                };
                let idx = idx as i64;
                let mut items = items.borrow_mut();
                if idx < 0 || idx as usize >= items.len() {
                    return Err(self.err(ErrorKind::IndexOutOfRange, span, format!("index {idx} out of range")));
                }
                items[idx as usize] = value;
                Ok(())
            }
            Value::Map(entries) => {
                entries.borrow_mut().insert(key, value);
                Ok(())
            }
            Value::Instance(inst) => {
                let wrapped = inst.wrapped.borrow().clone();
                match wrapped {
                    Some(v) => self.sub_set(&v, key, value, span),
                    None => Err(self.err(ErrorKind::SubscriptOnNonCollection, span, "not a list or map")),
                }
            }
            other => Err(self.err(
                ErrorKind::SubscriptOnNonCollection,
                span,
                format!("cannot subscript {}", other.type_name()),
            )),
        }
    }

    /// Wraps a bare primitive in its built-in class's instance shell (spec
    /// §3 "Literal wrappers"). Returns `None` for values that have no
    /// wrapper class (`Null`, `Function`, `Class`, `Instance`,
    /// `NativeHandle`).
    fn wrap_primitive(&self, value: &Value) -> Option<Rc<HetuInstance>> {
        let class = match value {
            Value::Number(_) => Rc::clone(&self.builtins.num),
            Value::Bool(_) => Rc::clone(&self.builtins.bool_),
            Value::String(_) => Rc::clone(&self.builtins.string),
            Value::List(_) => Rc::clone(&self.builtins.list),
            Value::Map(_) => Rc::clone(&self.builtins.map),
            _ => return None,
        };
        let ns = Namespace::child(&class.statics, "<wrapper>");
        Some(Rc::new(HetuInstance::wrapping(class, ns, value.clone())))
    }

    fn member_get(&self, receiver: Value, name: &str, span: &Span) -> HResult<Value> {
        match &receiver {
            Value::Instance(inst) => self.instance_member_get(inst, name, span),
            Value::Class(class) => class
                .statics
                .get_own(name)
                .ok_or_else(|| self.err(ErrorKind::GetOnNonObject, span, format!("no static member `{name}` on `{}`", class.name))),
            _ => match self.wrap_primitive(&receiver) {
                Some(wrapped) => self.instance_member_get(&wrapped, name, span),
                None => Err(self.err(ErrorKind::GetOnNonObject, span, format!("cannot get member `{name}` on {}", receiver.type_name()))),
            },
        }
    }

    fn instance_member_get(&self, inst: &Rc<HetuInstance>, name: &str, span: &Span) -> HResult<Value> {
        if let Some(handle) = inst.external_handle.borrow().as_ref() {
            let ns_guard = inst.class.external_namespace.borrow();
            let ext = ns_guard
                .as_ref()
                .ok_or_else(|| self.err(ErrorKind::HostError, span, "no external namespace bound for this class"))?;
            return ext.instance_fetch(handle, name);
        }
        if let Some(v) = inst.namespace.get_own(name) {
            return Ok(v);
        }
        if let Some(getter) = inst.class.find_instance_method(&format!("{GETTER_PREFIX}{name}")) {
            return self.call_function(&getter, Some(Value::Instance(Rc::clone(inst))), Vec::new(), IndexMap::new(), span);
        }
        if let Some(wrapped) = inst.wrapped.borrow().clone() {
            if let Some(native) = inst.class.find_native_method(name) {
                return native(Some(wrapped), &[], &IndexMap::new());
            }
        }
        if let Some(method) = inst.class.find_instance_method(name) {
            return Ok(Value::Function(method));
        }
        if let Some(v) = inst.class.statics.get_own(name) {
            return Ok(v);
        }
        Err(self.err(ErrorKind::GetOnNonObject, span, format!("no member `{name}` on `{}`", inst.class.name)))
    }

    fn member_set(&self, receiver: &Value, name: &str, value: Value, span: &Span) -> HResult<()> {
        match receiver {
            Value::Instance(inst) => self.instance_member_set(inst, name, value, span),
            Value::Class(class) => class.statics.set_own(name, value),
            _ => Err(self.err(ErrorKind::GetOnNonObject, span, format!("cannot set member `{name}` on {}", receiver.type_name()))),
        }
    }

    fn instance_member_set(&self, inst: &Rc<HetuInstance>, name: &str, value: Value, span: &Span) -> HResult<()> {
        if let Some(handle) = inst.external_handle.borrow().as_ref() {
            let ns_guard = inst.class.external_namespace.borrow();
            let ext = ns_guard
                .as_ref()
                .ok_or_else(|| self.err(ErrorKind::HostError, span, "no external namespace bound for this class"))?;
            return ext.instance_assign(handle, name, value);
        }
        if inst.namespace.has_own(name) {
            return inst.namespace.set_own(name, value);
        }
        if let Some(setter) = inst.class.find_instance_method(&format!("{SETTER_PREFIX}{name}")) {
            self.call_function(&setter, Some(Value::Instance(Rc::clone(inst))), vec![value], IndexMap::new(), span)?;
            return Ok(());
        }
        Err(self.err(ErrorKind::GetOnNonObject, span, format!("no member `{name}` on `{}`", inst.class.name)))
    }

    fn eval_call(
        &self,
        callee: &Expr,
        positional: &[Expr],
        named: &[(Rc<str>, Expr)],
        ns: &Namespace,
    ) -> HResult<Value> {
        if let ExprKind::MemberGet(recv_expr, name) = &callee.kind {
            if is_super_symbol(recv_expr) {
                let (pos, nmd) = self.eval_args(positional, named, ns)?;
                return self.call_super_method(recv_expr, name, pos, nmd, ns, &callee.span);
            }
            let receiver = self.eval_expr(recv_expr, ns)?;
            let (pos, nmd) = self.eval_args(positional, named, ns)?;
            return self.call_method(receiver, name, pos, nmd, &callee.span);
        }

        let callee_val = self.eval_expr(callee, ns)?;
        let (pos, nmd) = self.eval_args(positional, named, ns)?;
        match callee_val {
            Value::Function(f) => self.call_function(&f, None, pos, nmd, &callee.span),
            Value::Class(c) => self.construct(&c, pos, nmd, &callee.span),
            other => Err(self.err(ErrorKind::NotCallable, &callee.span, format!("{} is not callable", other.type_name()))),
        }
    }

    /// `super.method(...)` (spec §3 Invariants: "the `super` name only where
    /// a superclass exists"). Dispatches directly against the superclass's
    /// instance method table with `this` bound to the current instance,
    /// rather than going through `call_method`'s ordinary static/instance
    /// routing — a plain `Value::Class(superclass)` has no instance to bind,
    /// so the normal `MemberGet`-on-a-class path (static members only) can't
    /// reach an instance method at all.
    fn call_super_method(
        &self,
        recv_expr: &Expr,
        name: &str,
        positional: Vec<Value>,
        named: IndexMap<Rc<str>, Value>,
        ns: &Namespace,
        span: &Span,
    ) -> HResult<Value> {
        let Value::Class(superclass) = self.eval_expr(recv_expr, ns)? else {
            return Err(self.err(ErrorKind::NotAClass, span, "`super` did not resolve to a class"));
        };
        let this = ns
            .get_dynamic("this")
            .ok_or_else(|| self.err(ErrorKind::ThisOutsideClass, span, "`super` used outside an instance method"))?;
        let method = superclass
            .find_instance_method(name)
            .ok_or_else(|| self.err(ErrorKind::NotCallable, span, format!("no method `{name}` on `{}`", superclass.name)))?;
        self.call_function(&method, Some(this), positional, named, span)
    }

    fn eval_args(
        &self,
        positional: &[Expr],
        named: &[(Rc<str>, Expr)],
        ns: &Namespace,
    ) -> HResult<(Vec<Value>, IndexMap<Rc<str>, Value>)> {
        let pos = positional.iter().map(|e| self.eval_expr(e, ns)).collect::<HResult<Vec<_>>>()?;
        let mut nmd = IndexMap::new();
        for (name, e) in named {
            nmd.insert(Rc::clone(name), self.eval_expr(e, ns)?);
        }
        Ok((pos, nmd))
    }

    fn call_method(
        &self,
        receiver: Value,
        name: &str,
        positional: Vec<Value>,
        named: IndexMap<Rc<str>, Value>,
        span: &Span,
    ) -> HResult<Value> {
        match &receiver {
            Value::Instance(inst) => {
                if let Some(handle) = inst.external_handle.borrow().as_ref() {
                    let ns_guard = inst.class.external_namespace.borrow();
                    let ext = ns_guard
                        .as_ref()
                        .ok_or_else(|| self.err(ErrorKind::HostError, span, "no external namespace bound for this class"))?;
                    // §4.6 names only fetch/assign for instances; a method
                    // call routes through instance_fetch the same way
                    // plain member access does (no separate "invoke with
                    // args" operation is defined).
                    return ext.instance_fetch(handle, name);
                }
                if let Some(method) = inst.class.find_instance_method(name) {
                    return self.call_function(&method, Some(receiver), positional, named, span);
                }
                if let Some(wrapped) = inst.wrapped.borrow().clone() {
                    if let Some(native) = inst.class.find_native_method(name) {
                        return native(Some(wrapped), &positional, &named);
                    }
                }
                Err(self.err(ErrorKind::NotCallable, span, format!("no method `{name}` on `{}`", inst.class.name)))
            }
            Value::Class(class) => match class.statics.get_own(name) {
                Some(Value::Function(f)) => self.call_function(&f, None, positional, named, span),
                _ => Err(self.err(ErrorKind::NotCallable, span, format!("no static method `{name}` on `{}`", class.name))),
            },
            other => match self.wrap_primitive(other) {
                Some(wrapped) => self.call_method(Value::Instance(wrapped), name, positional, named, span),
                None => Err(self.err(ErrorKind::NotCallable, span, format!("cannot call `{name}` on {}", other.type_name()))),
            },
        }
    }

    /// Function call (spec §4.5 "Function call"): creates a new activation
    /// namespace enclosed by the function's captured declaration context
    /// (or, for an instance method, by the receiver's own namespace —
    /// whose enclosure is already the class's static namespace, giving
    /// bare instance-variable references the same distance the resolver
    /// computed for them).
    fn call_function(
        &self,
        func: &Rc<HetuFunction>,
        receiver: Option<Value>,
        positional: Vec<Value>,
        named: IndexMap<Rc<str>, Value>,
        span: &Span,
    ) -> HResult<Value> {
        if let Some(native) = &func.native {
            return native(receiver, &positional, &named);
        }

        let enclosing = match (&receiver, func.decl.owning_class.is_some(), func.decl.is_static) {
            (Some(Value::Instance(inst)), true, false) => inst.namespace.clone(),
            _ => func.captured.clone(),
        };
        let activation = Namespace::child(&enclosing, format!("<call {}>", func.decl.name));
        if let (Some(Value::Instance(inst)), true, false) = (&receiver, func.decl.owning_class.is_some(), func.decl.is_static) {
            activation.define(Rc::from("this"), Binding::new(Value::Instance(Rc::clone(inst)), HType::any(), false));
        }

        let mut positional: SmallVec<[Value; 4]> = SmallVec::from_vec(positional);
        self.bind_params(&func.decl, &activation, &mut positional, &named, span)?;

        self.call_depth.set(self.call_depth.get() + 1);
        self.tracer.borrow_mut().on_call(&func.decl.name, self.call_depth.get());
        let body = func.decl.body.as_deref().unwrap_or(&[]);
        let result = self.eval_stmts(body, &activation);
        self.tracer.borrow_mut().on_return(&func.decl.name, self.call_depth.get());
        self.call_depth.set(self.call_depth.get() - 1);

        let result = result?;
        debug_assert!(!matches!(result, StmtOutcome::Flow(Flow::Break | Flow::Continue)));
        Ok(result.into_value())
    }

    fn bind_params(
        &self,
        decl: &FuncDecl,
        activation: &Namespace,
        positional: &mut SmallVec<[Value; 4]>,
        named: &IndexMap<Rc<str>, Value>,
        span: &Span,
    ) -> HResult<()> {
        let mut named_remaining = named.clone();
        for param in &decl.params {
            let value = match param.kind {
                ParamKind::Positional => {
                    if positional.is_empty() {
                        return Err(self.err(ErrorKind::ArityMismatch, span, format!("missing required argument `{}`", param.name)));
                    }
                    positional.remove(0)
                }
                ParamKind::Optional => match (!positional.is_empty()).then(|| positional.remove(0)) {
                    Some(v) => v,
                    None => match &param.default {
                        Some(def) => self.eval_expr(def, activation)?,
                        None => Value::Null,
                    },
                },
                ParamKind::Named => match named_remaining.shift_remove(&param.name) {
                    Some(v) => v,
                    None => match &param.default {
                        Some(def) => self.eval_expr(def, activation)?,
                        None => Value::Null,
                    },
                },
            };
            activation.define(Rc::clone(&param.name), Binding::new(value, param.declared_type.clone(), true));
        }

        if !named_remaining.is_empty() {
            let unknown: Vec<&str> = named_remaining.keys().map(|k| k.as_ref()).collect();
            return Err(self.err(ErrorKind::ArityMismatch, span, format!("unknown named argument(s): {unknown:?}")));
        }

        if decl.variadic {
            let rest: Vec<Value> = positional.drain(..).collect();
            activation.define(Rc::from("arguments"), Binding::new(Value::List(Rc::new(RefCell::new(rest))), HType::any(), true));
        } else if !positional.is_empty() {
            return Err(self.err(ErrorKind::ArityMismatch, span, "too many positional arguments"));
        }

        Ok(())
    }

    /// Class call / construction (spec §4.5 "Class call", §4.7).
    fn construct(&self, class: &Rc<HetuClass>, positional: Vec<Value>, named: IndexMap<Rc<str>, Value>, span: &Span) -> HResult<Value> {
        if class.is_external {
            let ns_guard = class.external_namespace.borrow();
            let ext = ns_guard
                .as_ref()
                .ok_or_else(|| self.err(ErrorKind::HostError, span, format!("no external namespace bound for `{}`", class.name)))?;
            let handle = ext.construct(&positional, &named)?;
            let instance_ns = Namespace::child(&class.statics, format!("<instance of {}>", class.name));
            let instance = HetuInstance::new(Rc::clone(class), instance_ns);
            *instance.external_handle.borrow_mut() = Some(handle);
            return Ok(Value::Instance(Rc::new(instance)));
        }

        let instance_ns = Namespace::child(&class.statics, format!("<instance of {}>", class.name));
        let instance = Rc::new(HetuInstance::new(Rc::clone(class), instance_ns.clone()));
        instance_ns.define(Rc::from("this"), Binding::new(Value::Instance(Rc::clone(&instance)), HType::any(), false));
        seed_instance_methods(&instance_ns, class);

        for field in &class.instance_vars {
            let (value, initialized) = match &field.initializer {
                Some(init) => (self.eval_expr(init, &instance_ns)?, true),
                None => (Value::Null, false),
            };
            instance_ns.define(
                Rc::clone(&field.name),
                Binding { declared_type: field.declared_type.clone(), value, mutable: field.mutable, initialized },
            );
        }

        if let Some(ctor) = class.constructor() {
            self.call_function(&ctor, Some(Value::Instance(Rc::clone(&instance))), positional, named, span)?;
        }

        Ok(Value::Instance(instance))
    }
}

/// Whether `expr` is the bare `super` symbol — i.e. `recv_expr` of a
/// `MemberGet`/`Call` callee is literally `super`, not some expression that
/// merely evaluates to a class value.
fn is_super_symbol(expr: &Expr) -> bool {
    matches!(&expr.kind, ExprKind::Symbol(name) if name.as_ref() == "super")
}

/// Binds every instance method reachable from `class` into `ns` (own methods
/// override inherited ones, base class seeded first) so a bare sibling
/// reference inside a method body finds what the resolver declared for it
/// (resolver.rs `resolve_class_body` declares every instance method's name
/// in the instance scope, which `call_function` enters as `inst.namespace`
/// for method activations — without this seeding, `lookup_symbol` would
/// walk to that scope and find nothing).
fn seed_instance_methods(ns: &Namespace, class: &Rc<HetuClass>) {
    if let Some(superclass) = &class.superclass {
        seed_instance_methods(ns, superclass);
    }
    for (name, func) in &class.instance_methods {
        ns.define(Rc::clone(name), Binding::new(Value::Function(Rc::clone(func)), HType::named(Rc::from("function")), false));
    }
}

/// The dispatch name a method is stored under in a class's static/instance
/// method table: getters/setters get the synthesized `__get__`/`__set__`
/// prefix (spec §4.1 reserved prefixes), the constructor keeps its
/// synthesized `__construct__` name from the parser, everything else keeps
/// its source name.
fn dispatch_name(method: &FuncDecl) -> Rc<str> {
    use crate::ast::FuncKind;
    match method.kind {
        FuncKind::Getter => Rc::from(format!("{GETTER_PREFIX}{}", method.name)),
        FuncKind::Setter => Rc::from(format!("{SETTER_PREFIX}{}", method.name)),
        _ => Rc::clone(&method.name),
    }
}

/// Boxes a `NativeFn` as `Any` so it can travel through a `Value::NativeHandle`
/// global entry prefixed `__external__` (spec §4.6), the same slot an
/// `external fun` declaration looks itself up under at evaluation time.
pub(crate) struct NativeFnBox(pub NativeFn);

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> HResult<Value> {
        let mut evaluator = Evaluator::new(PathBuf::from("."), None, false);
        evaluator.eval_source(src, Rc::from("test.ht"))
    }

    /// Spec §8 invariant 4: string-string `+` concatenates, number-number
    /// `+` sums, string-number `+` fails.
    #[test]
    fn plus_concatenates_strings_and_sums_numbers_but_rejects_mixed_kinds() {
        assert_eq!(eval("'a' + 'b'").unwrap(), Value::String(Rc::from("ab")));
        assert_eq!(eval("1 + 2").unwrap(), Value::Number(3.0));
        assert_eq!(eval("'a' + 1").unwrap_err().kind, ErrorKind::UndefinedOperator);
    }

    /// Spec §8 invariant 5: `x is C` iff the runtime class name of `x`
    /// equals `C.name` (strict, no superclass walk — §9 Open Question 2).
    #[test]
    fn is_operator_compares_runtime_class_name_strictly() {
        let src = r"
            class A { }
            class B extends A { }
            var b = B()
            b is B
        ";
        assert_eq!(eval(src).unwrap(), Value::Bool(true));
        let src_super = r"
            class A { }
            class B extends A { }
            var b = B()
            b is A
        ";
        assert_eq!(eval(src_super).unwrap(), Value::Bool(false));
    }

    /// Spec §8 invariant 6: evaluating the same `Const` node twice returns
    /// identical values (literal pool determinism).
    #[test]
    fn same_const_node_evaluates_to_identical_value_each_time() {
        let src = "proc p { } var a = 42 var b = 42 a == b";
        assert_eq!(eval(src).unwrap(), Value::Bool(true));
    }

    /// Spec §8 invariant 7: every instance variable declared on a
    /// superclass `S` appears in an instance of a subclass of `S`.
    #[test]
    fn subclass_instance_carries_every_superclass_instance_variable() {
        let src = r"
            class A { var x construct(v: num) { this.x = v } }
            class B extends A { var y construct(v: num) { this.x = v this.y = v * 2 } }
            var b = B(5)
            b.x + b.y
        ";
        assert_eq!(eval(src).unwrap(), Value::Number(15.0));
    }

    /// A bare (unqualified) reference to a sibling instance method must
    /// resolve the same way the resolver declares it (resolver.rs
    /// `resolve_class_body` puts every instance method's name in scope).
    #[test]
    fn bare_sibling_instance_method_reference_resolves() {
        let src = r"
            class C {
                fun a: num { return b() }
                fun b: num { return 42 }
            }
            var c = C()
            c.a()
        ";
        assert_eq!(eval(src).unwrap(), Value::Number(42.0));
    }

    #[test]
    fn undefined_identifier_is_reported() {
        assert_eq!(eval("nope").unwrap_err().kind, ErrorKind::UndefinedIdentifier);
    }

    #[test]
    fn calling_a_non_function_value_is_not_callable() {
        assert_eq!(eval("var x = 1 x()").unwrap_err().kind, ErrorKind::NotCallable);
    }
}
