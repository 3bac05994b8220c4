//! Expression and statement AST (spec §3), expressed as tagged unions per
//! the Design Notes (§9: "Visitor pattern → tagged unions").
//!
//! `AstId` is grounded on the teacher's `NamespaceId`/`StringId`
//! newtype-around-`u32` idiom (`namespace.rs`, `intern.rs`): a stable,
//! cheap-to-copy identity the resolver can key its distance map on without
//! needing arena pointers (spec §9: "Resolver distance map keyed by AST-node
//! identity"). When the parser clones the for-in iteration target, the clone
//! gets a freshly allocated `AstId` and therefore resolves independently.

use std::cell::Cell;
use std::rc::Rc;

use crate::token::Span;

/// Stable identity for an AST node, used as the resolver's distance-map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AstId(u32);

thread_local! {
    static NEXT_ID: Cell<u32> = const { Cell::new(0) };
}

impl AstId {
    /// Allocates a fresh id. Each parsed node — and each node produced by
    /// cloning another node (for-in lowering) — gets its own id.
    pub fn fresh() -> Self {
        NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            Self(id)
        })
    }
}

/// A nominal type name plus ordered type arguments (spec §3 "HT_Type").
/// Comparison is by name only; arguments are parsed and preserved but never
/// checked (spec §9 Open Question 3 / DESIGN.md).
#[derive(Debug, Clone, PartialEq)]
pub struct HType {
    pub name: Rc<str>,
    pub args: Vec<HType>,
}

impl HType {
    pub fn any() -> Self {
        Self { name: Rc::from("any"), args: Vec::new() }
    }

    pub fn named(name: Rc<str>) -> Self {
        Self { name, args: Vec::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    Is,
    EqEq,
    NotEq,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: AstId,
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self { id: AstId::fresh(), span, kind }
    }

    /// Deep-clones this expression, assigning every node in the clone a
    /// fresh `AstId` so it resolves independently of the original (spec §4.3
    /// for-in lowering, §9 Design Notes).
    pub fn clone_fresh(&self) -> Self {
        let kind = match &self.kind {
            ExprKind::Null => ExprKind::Null,
            ExprKind::Const(idx) => ExprKind::Const(*idx),
            ExprKind::Group(inner) => ExprKind::Group(Box::new(inner.clone_fresh())),
            ExprKind::LiteralVector(items) => {
                ExprKind::LiteralVector(items.iter().map(Expr::clone_fresh).collect())
            }
            ExprKind::LiteralDict(pairs) => ExprKind::LiteralDict(
                pairs.iter().map(|(k, v)| (k.clone_fresh(), v.clone_fresh())).collect(),
            ),
            ExprKind::Symbol(name) => ExprKind::Symbol(Rc::clone(name)),
            ExprKind::Unary(op, operand) => ExprKind::Unary(*op, Box::new(operand.clone_fresh())),
            ExprKind::Binary(lhs, op, rhs) => {
                ExprKind::Binary(Box::new(lhs.clone_fresh()), *op, Box::new(rhs.clone_fresh()))
            }
            ExprKind::SubGet(coll, key) => {
                ExprKind::SubGet(Box::new(coll.clone_fresh()), Box::new(key.clone_fresh()))
            }
            ExprKind::SubSet(coll, key, value) => ExprKind::SubSet(
                Box::new(coll.clone_fresh()),
                Box::new(key.clone_fresh()),
                Box::new(value.clone_fresh()),
            ),
            ExprKind::MemberGet(coll, name) => {
                ExprKind::MemberGet(Box::new(coll.clone_fresh()), Rc::clone(name))
            }
            ExprKind::MemberSet(coll, name, value) => {
                ExprKind::MemberSet(Box::new(coll.clone_fresh()), Rc::clone(name), Box::new(value.clone_fresh()))
            }
            ExprKind::Call { callee, positional, named } => ExprKind::Call {
                callee: Box::new(callee.clone_fresh()),
                positional: positional.iter().map(Expr::clone_fresh).collect(),
                named: named.iter().map(|(n, e)| (Rc::clone(n), e.clone_fresh())).collect(),
            },
            ExprKind::This => ExprKind::This,
            ExprKind::Assign { name, value } => {
                ExprKind::Assign { name: Rc::clone(name), value: Box::new(value.clone_fresh()) }
            }
            ExprKind::NamedArg(name, value) => ExprKind::NamedArg(Rc::clone(name), Box::new(value.clone_fresh())),
        };
        Self { id: AstId::fresh(), span: self.span.clone(), kind }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Null,
    /// Index into the evaluator's literal pool (spec §3 "Literal pool").
    Const(usize),
    Group(Box<Expr>),
    LiteralVector(Vec<Expr>),
    /// Key→value pairs in source (insertion) order.
    LiteralDict(Vec<(Expr, Expr)>),
    Symbol(Rc<str>),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    SubGet(Box<Expr>, Box<Expr>),
    SubSet(Box<Expr>, Box<Expr>, Box<Expr>),
    MemberGet(Box<Expr>, Rc<str>),
    MemberSet(Box<Expr>, Rc<str>, Box<Expr>),
    Call { callee: Box<Expr>, positional: Vec<Expr>, named: Vec<(Rc<str>, Expr)> },
    This,
    Assign { name: Rc<str>, value: Box<Expr> },
    /// Only appears transiently inside a raw, not-yet-split call argument
    /// list (`name: expr` syntax); the parser always destructures it into
    /// `Call`'s `named` field before the tree is handed to the resolver.
    NamedArg(Rc<str>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    Function,
    Procedure,
    Constructor,
    Getter,
    Setter,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Positional,
    Optional,
    Named,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Rc<str>,
    pub declared_type: HType,
    pub default: Option<Expr>,
    pub kind: ParamKind,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub kind: FuncKind,
    pub name: Rc<str>,
    pub return_type: HType,
    pub params: Vec<Param>,
    /// Trailing `...` in the parameter list (spec §4.3): arity = -1.
    pub variadic: bool,
    pub type_params: Vec<Rc<str>>,
    /// `None` for `external` declarations, which have no body.
    pub body: Option<Vec<Stmt>>,
    pub is_static: bool,
    pub is_external: bool,
    pub owning_class: Option<Rc<str>>,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct VarFlags {
    pub is_static: bool,
    pub mutable: bool,
    pub type_inferred: bool,
    pub optional_param: bool,
    pub named_param: bool,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: Rc<str>,
    pub declared_type: HType,
    pub initializer: Option<Expr>,
    pub flags: VarFlags,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Rc<str>,
    pub superclass: Option<Rc<str>>,
    pub type_params: Vec<Rc<str>>,
    pub variables: Vec<VarDecl>,
    pub methods: Vec<Rc<FuncDecl>>,
    pub is_external: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: AstId,
    pub span: Span,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(span: Span, kind: StmtKind) -> Self {
        Self { id: AstId::fresh(), span, kind }
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Import { path: Rc<str>, alias: Option<Rc<str>> },
    VarDecl(VarDecl),
    ExprStmt(Expr),
    Block(Vec<Stmt>),
    Return(Option<Expr>),
    If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    While { cond: Expr, body: Box<Stmt> },
    Break,
    Continue,
    FuncDecl(Rc<FuncDecl>),
    ClassDecl(Rc<ClassDecl>),
}
