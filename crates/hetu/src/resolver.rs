//! Two-pass lexical analyzer computing scope distance for every name-use
//! site (spec §4.4).
//!
//! Grounded on the teacher's `prepare.rs` "prepare pass resolves Local/
//! Global/Cell scope for every identifier before execution" shape,
//! generalized from the teacher's 3-way `NameScope` enum to the spec's
//! integer lexical-distance scheme (§4.4), since Hetu's namespace model is
//! a parent-pointer tree rather than slot arrays. The block-stack algorithm
//! below is the classic two-pass resolver shape (declare, then define,
//! then recurse into bodies) adapted to §4.4's forward-reference rule for
//! sibling functions/classes.

use std::rc::Rc;

use ahash::AHashMap;

use crate::ast::{AstId, ClassDecl, Expr, ExprKind, FuncDecl, FuncKind, Stmt, StmtKind};
use crate::errors::{ErrorKind, HResult, HetuError};
use crate::lexicon::{GETTER_PREFIX, SETTER_PREFIX};
use crate::parser::Program;

/// Resolver-computed lexical distance for every `Symbol`/`This`/`Assign`
/// use-site the resolver found in some block scope. Keyed by `AstId` (spec
/// §9 "Resolver distance map keyed by AST-node identity").
pub type DistanceMap = AHashMap<AstId, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FnContext {
    None,
    Function,
    Procedure,
    Constructor,
    Getter,
    Setter,
    Method,
}

impl From<FuncKind> for FnContext {
    fn from(kind: FuncKind) -> Self {
        match kind {
            FuncKind::Function => Self::Function,
            FuncKind::Procedure => Self::Procedure,
            FuncKind::Constructor => Self::Constructor,
            FuncKind::Getter => Self::Getter,
            FuncKind::Setter => Self::Setter,
            FuncKind::Method => Self::Method,
        }
    }
}

struct Resolver {
    scopes: Vec<AHashMap<Rc<str>, bool>>,
    distances: DistanceMap,
    current_fn: FnContext,
    class_depth: u32,
    file: Rc<str>,
}

/// Resolves an entire parsed program, returning the distance map the
/// evaluator consults for every `Symbol`/`This`/`Assign` node.
pub fn resolve_program(program: &Program, file: Rc<str>) -> HResult<DistanceMap> {
    let mut resolver = Resolver { scopes: Vec::new(), distances: AHashMap::new(), current_fn: FnContext::None, class_depth: 0, file };
    resolver.resolve_stmts(&program.statements)?;
    Ok(resolver.distances)
}

/// A top-level function/class declaration whose *body* is resolved only
/// after every sibling in the same block has been declared (spec §4.4:
/// "queue for body-resolution after the enclosing sequence completes").
enum Pending<'a> {
    Func(&'a FuncDecl),
    Class(&'a ClassDecl),
}

impl Resolver {
    fn error(&self, kind: ErrorKind, message: impl Into<String>) -> HetuError {
        HetuError::new(kind, Rc::clone(&self.file), 0, 0, message.into())
    }

    fn push_scope(&mut self) {
        self.scopes.push(AHashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Rc<str>) -> HResult<()> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name) {
                return Err(self.error(ErrorKind::AlreadyDeclared, format!("`{name}` already declared in this scope")));
            }
            scope.insert(Rc::clone(name), false);
        }
        Ok(())
    }

    fn define(&mut self, name: &Rc<str>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(Rc::clone(name), true);
        }
    }

    /// Declares and immediately marks a name defined (spec §4.4: used for
    /// function/class names, parameters, `this`/`super`).
    fn declare_defined(&mut self, name: &Rc<str>) -> HResult<()> {
        self.declare(name)?;
        self.define(name);
        Ok(())
    }

    fn resolve_local(&mut self, id: AstId, name: &str) {
        let len = self.scopes.len();
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(name) {
                let distance = (len - 1 - i) as u32;
                self.distances.insert(id, distance);
                return;
            }
        }
        // Not found in any block scope: left unresolved, meaning "global"
        // per spec §4.4 ("If not found, do nothing").
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    /// Resolves a sequence of statements *without* pushing a new scope —
    /// used both for library/top-level sequences and for a function body
    /// (spec §4.4 "Function body: A nested block with one slot per
    /// parameter" — the body shares that same scope, it does not get an
    /// additional nested one).
    fn resolve_stmts(&mut self, stmts: &[Stmt]) -> HResult<()> {
        let mut pending = Vec::new();
        for stmt in stmts {
            self.declare_phase(stmt, &mut pending)?;
        }
        for item in pending {
            match item {
                Pending::Func(decl) => self.resolve_function_body(decl)?,
                Pending::Class(decl) => self.resolve_class_body(decl)?,
            }
        }
        Ok(())
    }

    /// Resolves a `{ ... }` block: pushes a fresh scope, resolves its
    /// statements, then pops (spec §4.4 "On entering a block, push a fresh
    /// map; on leaving, pop").
    fn resolve_block(&mut self, stmts: &[Stmt]) -> HResult<()> {
        self.push_scope();
        let result = self.resolve_stmts(stmts);
        self.pop_scope();
        result
    }

    fn declare_phase<'a>(&mut self, stmt: &'a Stmt, pending: &mut Vec<Pending<'a>>) -> HResult<()> {
        match &stmt.kind {
            StmtKind::Import { .. } => Ok(()),
            StmtKind::VarDecl(decl) => {
                self.declare(&decl.name)?;
                if let Some(init) = &decl.initializer {
                    // The name is declared-but-not-defined while its own
                    // initializer resolves, so self-reference is caught
                    // (spec §4.4, §3 Invariants "use of uninitialized").
                    self.resolve_expr(init)?;
                }
                self.define(&decl.name);
                Ok(())
            }
            StmtKind::ExprStmt(expr) => self.resolve_expr(expr),
            StmtKind::Block(stmts) => self.resolve_block(stmts),
            StmtKind::Return(expr) => {
                if self.current_fn == FnContext::None {
                    return Err(self.error(ErrorKind::ReturnOutsideFunction, "`return` outside a function"));
                }
                if self.current_fn == FnContext::Constructor && expr.is_some() {
                    return Err(self.error(
                        ErrorKind::ReturnValueInConstructor,
                        "a constructor may not `return` a value",
                    ));
                }
                if self.current_fn == FnContext::Procedure && expr.is_some() {
                    return Err(self.error(
                        ErrorKind::ReturnValueInConstructor,
                        "a procedure may not `return` a value (spec §3: implicit void return)",
                    ));
                }
                if let Some(e) = expr {
                    self.resolve_expr(e)?;
                }
                Ok(())
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.resolve_expr(cond)?;
                self.resolve_stmt_as_block(then_branch)?;
                if let Some(e) = else_branch {
                    self.resolve_stmt_as_block(e)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                self.resolve_expr(cond)?;
                self.resolve_stmt_as_block(body)
            }
            StmtKind::Break | StmtKind::Continue => Ok(()),
            StmtKind::FuncDecl(decl) => {
                self.declare_defined(&decl.name)?;
                pending.push(Pending::Func(decl));
                Ok(())
            }
            StmtKind::ClassDecl(decl) => {
                if let Some(super_name) = &decl.superclass {
                    if super_name.as_ref() == decl.name.as_ref() {
                        return Err(self.error(ErrorKind::ExtendsSelf, format!("class `{}` extends itself", decl.name)));
                    }
                }
                self.declare_defined(&decl.name)?;
                pending.push(Pending::Class(decl));
                Ok(())
            }
        }
    }

    /// `If`/`While` bodies are always parsed as `{ ... }` blocks already
    /// (spec §4.3), so resolving them always goes through
    /// `resolve_block`'s single-entry path — but they arrive here as a
    /// boxed `Stmt`, not a bare `Vec<Stmt>`, so unwrap first.
    fn resolve_stmt_as_block(&mut self, stmt: &Stmt) -> HResult<()> {
        match &stmt.kind {
            StmtKind::Block(stmts) => self.resolve_block(stmts),
            _ => self.declare_phase(stmt, &mut Vec::new()),
        }
    }

    fn resolve_function_body(&mut self, decl: &FuncDecl) -> HResult<()> {
        let enclosing_fn = self.current_fn;
        self.current_fn = FnContext::from(decl.kind);
        self.push_scope();
        for param in &decl.params {
            self.declare_defined(&param.name)?;
        }
        let result = if let Some(body) = &decl.body { self.resolve_stmts(body) } else { Ok(()) };
        self.pop_scope();
        self.current_fn = enclosing_fn;
        result
    }

    /// Class body resolution (spec §4.4 "Class body"): push a static
    /// scope seeding `super`, declare static vars then static methods
    /// (queuing their bodies), then push a nested instance scope seeding
    /// `this`, declare instance vars then instance methods.
    fn resolve_class_body(&mut self, decl: &ClassDecl) -> HResult<()> {
        self.class_depth += 1;
        self.push_scope(); // static scope
        if decl.superclass.is_some() {
            self.declare_defined(&Rc::from("super"))?;
        }

        let (statics, instances): (Vec<_>, Vec<_>) = decl.variables.iter().partition(|v| v.flags.is_static);
        for var in &statics {
            self.declare(&var.name)?;
            if let Some(init) = &var.initializer {
                self.resolve_expr(init)?;
            }
            self.define(&var.name);
        }

        let (static_methods, instance_methods): (Vec<_>, Vec<_>) = decl.methods.iter().partition(|m| m.is_static);
        let mut pending_static = Vec::new();
        for method in &static_methods {
            self.declare_method_name(method)?;
            pending_static.push(method.as_ref());
        }
        for method in &pending_static {
            self.resolve_function_body(method)?;
        }

        self.push_scope(); // instance scope
        self.declare_defined(&Rc::from("this"))?;
        for var in &instances {
            self.declare(&var.name)?;
            if let Some(init) = &var.initializer {
                self.resolve_expr(init)?;
            }
            self.define(&var.name);
        }
        let mut pending_instance = Vec::new();
        for method in &instance_methods {
            self.declare_method_name(method)?;
            pending_instance.push(method.as_ref());
        }
        for method in &pending_instance {
            self.resolve_function_body(method)?;
        }
        self.pop_scope(); // instance scope
        self.pop_scope(); // static scope
        self.class_depth -= 1;
        Ok(())
    }

    /// Declares a method's dispatch name. Getters/setters additionally
    /// declare the user-facing (unprefixed) name per spec §4.4, so sibling
    /// method bodies in the same class can reference it without the
    /// internal prefix.
    fn declare_method_name(&mut self, method: &FuncDecl) -> HResult<()> {
        match method.kind {
            FuncKind::Getter => {
                self.declare_defined(&Rc::from(format!("{GETTER_PREFIX}{}", method.name)))?;
                self.declare_defined(&method.name)
            }
            FuncKind::Setter => {
                self.declare_defined(&Rc::from(format!("{SETTER_PREFIX}{}", method.name)))?;
                self.declare_defined(&method.name)
            }
            _ => self.declare_defined(&method.name),
        }
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn resolve_expr(&mut self, expr: &Expr) -> HResult<()> {
        match &expr.kind {
            ExprKind::Null | ExprKind::Const(_) => Ok(()),
            ExprKind::Group(inner) => self.resolve_expr(inner),
            ExprKind::LiteralVector(items) => items.iter().try_for_each(|e| self.resolve_expr(e)),
            ExprKind::LiteralDict(pairs) => pairs.iter().try_for_each(|(k, v)| {
                self.resolve_expr(k)?;
                self.resolve_expr(v)
            }),
            ExprKind::Symbol(name) => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.as_ref()) == Some(&false) {
                        return Err(self.error(
                            ErrorKind::UseOfUninitialized,
                            format!("cannot reference `{name}` in its own initializer"),
                        ));
                    }
                }
                self.resolve_local(expr.id, name);
                Ok(())
            }
            ExprKind::Unary(_, operand) => self.resolve_expr(operand),
            ExprKind::Binary(lhs, _, rhs) => {
                self.resolve_expr(lhs)?;
                self.resolve_expr(rhs)
            }
            ExprKind::SubGet(coll, key) => {
                self.resolve_expr(coll)?;
                self.resolve_expr(key)
            }
            ExprKind::SubSet(coll, key, value) => {
                self.resolve_expr(coll)?;
                self.resolve_expr(key)?;
                self.resolve_expr(value)
            }
            ExprKind::MemberGet(coll, _) => self.resolve_expr(coll),
            ExprKind::MemberSet(coll, _, value) => {
                self.resolve_expr(coll)?;
                self.resolve_expr(value)
            }
            ExprKind::Call { callee, positional, named } => {
                self.resolve_expr(callee)?;
                positional.iter().try_for_each(|e| self.resolve_expr(e))?;
                named.iter().try_for_each(|(_, e)| self.resolve_expr(e))
            }
            ExprKind::This => {
                if self.class_depth == 0 {
                    return Err(self.error(ErrorKind::ThisOutsideClass, "`this` outside a class"));
                }
                self.resolve_local(expr.id, "this");
                Ok(())
            }
            ExprKind::Assign { name, value } => {
                self.resolve_expr(value)?;
                self.resolve_local(expr.id, name);
                Ok(())
            }
            ExprKind::NamedArg(_, value) => self.resolve_expr(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn resolve(src: &str) -> HResult<DistanceMap> {
        let mut interner = Interner::new();
        let file: Rc<str> = Rc::from("test.ht");
        let tokens = Lexer::new(src, Rc::clone(&file), &mut interner).tokenize().unwrap();
        let program = Parser::new(tokens, Rc::clone(&file)).parse_library().unwrap();
        resolve_program(&program, file)
    }

    #[test]
    fn parameter_reference_gets_distance_zero() {
        let distances = resolve("fun add(a, b) { return a + b }").unwrap();
        assert!(distances.values().any(|&d| d == 0));
    }

    #[test]
    fn nested_block_reference_to_parameter_gets_distance_one() {
        let distances = resolve("fun f(a) { if (true) { return a } }").unwrap();
        assert!(distances.values().any(|&d| d == 1));
    }

    #[test]
    fn duplicate_declaration_in_same_block_is_an_error() {
        let err = resolve("fun f { var x = 1 var x = 2 }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyDeclared);
    }

    #[test]
    fn self_referential_initializer_is_an_error() {
        let err = resolve("fun f { var x = x }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UseOfUninitialized);
    }

    #[test]
    fn this_outside_class_is_an_error() {
        let err = resolve("fun f { return this }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ThisOutsideClass);
    }

    #[test]
    fn class_extending_itself_is_an_error() {
        let err = resolve("class A extends A { }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExtendsSelf);
    }

    #[test]
    fn sibling_functions_may_forward_reference_each_other() {
        let distances = resolve("fun a { return b() } fun b { return 1 }");
        assert!(distances.is_ok());
    }

    /// Spec §8 invariant 8: "A procedure whose body contains `return v`
    /// fails resolution; a procedure with bare `return` or none succeeds."
    #[test]
    fn procedure_returning_a_value_fails_resolution() {
        let err = resolve("proc p { return 1 }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReturnValueInConstructor);
    }

    #[test]
    fn procedure_with_bare_return_resolves() {
        assert!(resolve("proc p { return }").is_ok());
    }

    #[test]
    fn procedure_with_no_return_resolves() {
        assert!(resolve("proc p { var x = 1 }").is_ok());
    }
}
