//! Token stream → AST, recursive descent with precedence climbing (spec
//! §4.3).
//!
//! Grounded on the teacher's `parse.rs`: a per-file parse that returns
//! `Result<_, ParseError>` and aborts on the first error rather than
//! attempting error recovery — Hetu's spec makes the same choice explicit
//! ("Error recovery. None; a parse error aborts the current file.").

use std::rc::Rc;

use crate::ast::{
    BinaryOp, ClassDecl, Expr, ExprKind, FuncDecl, FuncKind, HType, Param, ParamKind, Stmt, StmtKind, UnaryOp,
    VarDecl, VarFlags,
};
use crate::errors::{ErrorKind, HResult, HetuError};
use crate::lexicon::Keyword;
use crate::token::{Span, Token, TokenKind};

/// A literal value deduplicated into the program's literal pool (spec §3
/// "Literal pool"). `Const` expression nodes reference entries here by
/// index.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(Rc<str>),
    Bool(bool),
}

/// The result of parsing one file: its top-level statements plus the
/// literal pool referenced by every `Const` node inside them.
#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub literals: Vec<Literal>,
}

/// Which statements are legal at the current nesting level (spec §4.3
/// "Three parsing styles").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseStyle {
    Library,
    FunctionBody,
    ClassBody,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: Rc<str>,
    literals: Vec<Literal>,
    for_in_counter: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, file: Rc<str>) -> Self {
        Self { tokens, pos: 0, file, literals: Vec::new(), for_in_counter: 0 }
    }

    /// Parses a whole file in library style (spec §4.3 "Library").
    pub fn parse_library(mut self) -> HResult<Program> {
        let mut statements = Vec::new();
        while !self.at_eof() {
            statements.push(self.parse_statement(ParseStyle::Library)?);
        }
        Ok(Program { statements, literals: self.literals })
    }

    // ---------------------------------------------------------------
    // Token stream helpers
    // ---------------------------------------------------------------

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn span(&self) -> Span {
        self.peek().span.clone()
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw)
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> HResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error(ErrorKind::ExpectedToken, format!("expected {what}, found {:?}", self.peek_kind())))
        }
    }

    fn expect_identifier(&mut self) -> HResult<Rc<str>> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(ErrorKind::ExpectedToken, format!("expected identifier, found {other:?}"))),
        }
    }

    fn error(&self, kind: ErrorKind, message: String) -> HetuError {
        let span = self.span();
        HetuError::new(kind, span.file, span.line, span.column, message)
    }

    fn push_literal(&mut self, literal: Literal) -> usize {
        if let Some(idx) = self.literals.iter().position(|l| l == &literal) {
            return idx;
        }
        self.literals.push(literal);
        self.literals.len() - 1
    }

    // ---------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------

    fn parse_statement(&mut self, style: ParseStyle) -> HResult<Stmt> {
        let span = self.span();

        if self.check_keyword(Keyword::Import) {
            return self.parse_import(span);
        }

        // `external` may prefix a var/fun/proc/class declaration.
        let mut is_external = false;
        let mut save = self.pos;
        if self.matches_keyword(Keyword::External) {
            is_external = true;
            save = self.pos;
        }
        let mut is_static = false;
        if self.matches_keyword(Keyword::Static) {
            is_static = true;
        }

        if self.check_keyword(Keyword::Var) || self.check_keyword(Keyword::Let) || self.check_keyword(Keyword::Def) {
            return self.parse_var_decl(span, is_static);
        }

        if self.check_keyword(Keyword::Class) {
            if style == ParseStyle::FunctionBody {
                return Err(self.error(ErrorKind::UnexpectedToken, "class declarations are not allowed inside a function body".into()));
            }
            return self.parse_class_decl(span, is_external);
        }

        if matches!(
            self.peek_kind(),
            TokenKind::Keyword(Keyword::Fun)
                | TokenKind::Keyword(Keyword::Proc)
                | TokenKind::Keyword(Keyword::Get)
                | TokenKind::Keyword(Keyword::Set)
                | TokenKind::Keyword(Keyword::Construct)
        ) {
            let owning_class = None;
            return self.parse_func_decl(span, is_static, is_external, owning_class).map(|decl| {
                Stmt::new(span_of(&decl), StmtKind::FuncDecl(Rc::new(decl)))
            });
        }

        // Not actually external/static after all: rewind and fall through to
        // the statements legal in this style.
        if is_external || is_static {
            self.pos = save;
        }

        match style {
            ParseStyle::Library => Err(self.error(
                ErrorKind::UnexpectedToken,
                "expected import, var/let/def, class, fun, or proc at library scope".into(),
            )),
            ParseStyle::ClassBody => Err(self.error(
                ErrorKind::UnexpectedToken,
                "expected a member declaration inside a class body".into(),
            )),
            ParseStyle::FunctionBody => self.parse_function_body_statement(span),
        }
    }

    fn parse_function_body_statement(&mut self, span: Span) -> HResult<Stmt> {
        if self.matches_keyword(Keyword::If) {
            return self.parse_if(span);
        }
        if self.matches_keyword(Keyword::While) {
            return self.parse_while(span);
        }
        if self.matches_keyword(Keyword::For) {
            return self.parse_for_in(span);
        }
        if self.matches_keyword(Keyword::Return) {
            return self.parse_return(span);
        }
        if self.matches_keyword(Keyword::Break) {
            return Ok(Stmt::new(span, StmtKind::Break));
        }
        if self.matches_keyword(Keyword::Continue) {
            return Ok(Stmt::new(span, StmtKind::Continue));
        }
        if self.check(&TokenKind::LBrace) {
            return self.parse_block(ParseStyle::FunctionBody);
        }
        let expr = self.parse_expression()?;
        Ok(Stmt::new(span, StmtKind::ExprStmt(expr)))
    }

    fn parse_import(&mut self, span: Span) -> HResult<Stmt> {
        self.advance(); // `import`
        let path = match self.peek_kind().clone() {
            TokenKind::Str(s) => {
                self.advance();
                s
            }
            other => return Err(self.error(ErrorKind::ExpectedToken, format!("expected import path, found {other:?}"))),
        };
        let alias = if self.check(&TokenKind::Identifier(Rc::from(""))) {
            None
        } else {
            None
        };
        // `as alias` would be recognized here if the identifier `as` were
        // reserved; the distilled grammar only names "optional namespace
        // alias" without a keyword, so we accept a bare trailing identifier.
        let alias = match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Some(name)
            }
            _ => alias,
        };
        Ok(Stmt::new(span, StmtKind::Import { path, alias }))
    }

    fn parse_var_decl(&mut self, span: Span, is_static: bool) -> HResult<Stmt> {
        let kw = match self.peek_kind() {
            TokenKind::Keyword(k) => *k,
            _ => unreachable!(),
        };
        self.advance();
        let name = self.expect_identifier()?;
        let declared_type = if self.matches(&TokenKind::Colon) { self.parse_type()? } else { HType::any() };
        let type_inferred = matches!(kw, Keyword::Def) && declared_type.name.as_ref() == "any";
        let initializer = if self.matches(&TokenKind::Eq) { Some(self.parse_expression()?) } else { None };
        let mutable = !matches!(kw, Keyword::Let);
        let flags = VarFlags { is_static, mutable, type_inferred, optional_param: false, named_param: false };
        Ok(Stmt::new(span.clone(), StmtKind::VarDecl(VarDecl { name, declared_type, initializer, flags, span })))
    }

    fn parse_if(&mut self, span: Span) -> HResult<Stmt> {
        self.expect(TokenKind::LParen, "`(`")?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen, "`)`")?;
        let then_branch = Box::new(self.parse_block(ParseStyle::FunctionBody)?);
        let else_branch = if self.matches_keyword(Keyword::Else) {
            if self.check_keyword(Keyword::If) {
                self.advance();
                Some(Box::new(self.parse_if(self.span())?))
            } else {
                Some(Box::new(self.parse_block(ParseStyle::FunctionBody)?))
            }
        } else {
            None
        };
        Ok(Stmt::new(span, StmtKind::If { cond, then_branch, else_branch }))
    }

    fn parse_while(&mut self, span: Span) -> HResult<Stmt> {
        self.expect(TokenKind::LParen, "`(`")?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen, "`)`")?;
        let body = Box::new(self.parse_block(ParseStyle::FunctionBody)?);
        Ok(Stmt::new(span, StmtKind::While { cond, body }))
    }

    /// Desugars `for (var x in target) { body }` to a block containing a
    /// synthetic index counter plus a `while` loop (spec §4.3 "`for-in`
    /// lowering"). The iteration-target expression is cloned so the
    /// length-access and subscript-access sites resolve independently.
    fn parse_for_in(&mut self, span: Span) -> HResult<Stmt> {
        self.expect(TokenKind::LParen, "`(`")?;
        self.matches_keyword(Keyword::Var);
        let loop_var = self.expect_identifier()?;
        let loop_var_type = if self.matches(&TokenKind::Colon) { self.parse_type()? } else { HType::any() };
        if !self.matches_keyword(Keyword::In) {
            return Err(self.error(ErrorKind::ExpectedToken, "expected `in` in for-in loop".into()));
        }
        let target = self.parse_expression()?;
        self.expect(TokenKind::RParen, "`)`")?;
        let body_stmt = self.parse_block(ParseStyle::FunctionBody)?;
        let body = match body_stmt.kind {
            StmtKind::Block(stmts) => stmts,
            other => vec![Stmt::new(body_stmt.span, other)],
        };

        self.for_in_counter += 1;
        let index_name: Rc<str> = Rc::from(format!("{}{}", crate::lexicon::FOR_IN_INDEX_PREFIX, self.for_in_counter));

        let length_target = target.clone();
        let subscript_target = target.clone_fresh();

        let index_decl = Stmt::new(
            span.clone(),
            StmtKind::VarDecl(VarDecl {
                name: Rc::clone(&index_name),
                declared_type: HType::named(Rc::from("num")),
                initializer: Some(Expr::new(span.clone(), ExprKind::Const(self.push_literal_num(0.0)))),
                flags: VarFlags { mutable: true, ..VarFlags::default() },
                span: span.clone(),
            }),
        );

        let loop_var_decl = Stmt::new(
            span.clone(),
            StmtKind::VarDecl(VarDecl {
                name: Rc::clone(&loop_var),
                declared_type: loop_var_type,
                initializer: Some(Expr::new(
                    span.clone(),
                    ExprKind::SubGet(
                        Box::new(subscript_target.clone()),
                        Box::new(Expr::new(span.clone(), ExprKind::Symbol(Rc::clone(&index_name)))),
                    ),
                )),
                flags: VarFlags { mutable: true, ..VarFlags::default() },
                span: span.clone(),
            }),
        );

        let condition = Expr::new(
            span.clone(),
            ExprKind::Binary(
                Box::new(Expr::new(span.clone(), ExprKind::Symbol(Rc::clone(&index_name)))),
                BinaryOp::Lt,
                Box::new(Expr::new(
                    span.clone(),
                    ExprKind::MemberGet(Box::new(length_target), Rc::from("length")),
                )),
            ),
        );

        let advance_index = Stmt::new(
            span.clone(),
            StmtKind::ExprStmt(Expr::new(
                span.clone(),
                ExprKind::Assign {
                    name: Rc::clone(&index_name),
                    value: Box::new(Expr::new(
                        span.clone(),
                        ExprKind::Binary(
                            Box::new(Expr::new(span.clone(), ExprKind::Symbol(Rc::clone(&index_name)))),
                            BinaryOp::Add,
                            Box::new(Expr::new(span.clone(), ExprKind::Const(self.push_literal_num(1.0)))),
                        ),
                    )),
                },
            )),
        );

        let mut while_body = vec![loop_var_decl, advance_index];
        while_body.extend(body);

        let while_loop = Stmt::new(
            span.clone(),
            StmtKind::While { cond: condition, body: Box::new(Stmt::new(span.clone(), StmtKind::Block(while_body))) },
        );

        Ok(Stmt::new(span, StmtKind::Block(vec![index_decl, while_loop])))
    }

    fn push_literal_num(&mut self, n: f64) -> usize {
        self.push_literal(Literal::Number(n))
    }

    fn parse_return(&mut self, span: Span) -> HResult<Stmt> {
        if self.check(&TokenKind::RBrace) || self.at_eof() {
            return Ok(Stmt::new(span, StmtKind::Return(None)));
        }
        let expr = self.parse_expression()?;
        Ok(Stmt::new(span, StmtKind::Return(Some(expr))))
    }

    fn parse_block(&mut self, style: ParseStyle) -> HResult<Stmt> {
        let span = self.span();
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            statements.push(self.parse_statement(style)?);
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(Stmt::new(span, StmtKind::Block(statements)))
    }

    fn parse_class_decl(&mut self, span: Span, is_external: bool) -> HResult<Stmt> {
        self.advance(); // `class`
        let name = self.expect_identifier()?;
        let type_params = self.parse_optional_type_params()?;
        let superclass = if self.matches_keyword(Keyword::Extends) { Some(self.expect_identifier()?) } else { None };

        self.expect(TokenKind::LBrace, "`{`")?;
        let mut variables = Vec::new();
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let member_span = self.span();
            let mut is_static = false;
            if self.matches_keyword(Keyword::Static) {
                is_static = true;
            }
            if self.check_keyword(Keyword::Var) || self.check_keyword(Keyword::Let) || self.check_keyword(Keyword::Def)
            {
                let stmt = self.parse_var_decl(member_span, is_static)?;
                if let StmtKind::VarDecl(mut decl) = stmt.kind {
                    decl.flags.is_static = is_static;
                    variables.push(decl);
                }
                continue;
            }
            // Inside an external class, member functions are implicitly
            // external even without a per-member `external` keyword —
            // everything in the shape is host-supplied (spec §8 scenario f).
            let decl = self.parse_func_decl(member_span, is_static, is_external, Some(Rc::clone(&name)))?;
            methods.push(Rc::new(decl));
        }
        self.expect(TokenKind::RBrace, "`}`")?;

        Ok(Stmt::new(
            span.clone(),
            StmtKind::ClassDecl(Rc::new(ClassDecl { name, superclass, type_params, variables, methods, is_external, span })),
        ))
    }

    fn parse_optional_type_params(&mut self) -> HResult<Vec<Rc<str>>> {
        if !self.matches(&TokenKind::Lt) {
            return Ok(Vec::new());
        }
        let mut params = Vec::new();
        loop {
            params.push(self.expect_identifier()?);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt, "`>`")?;
        Ok(params)
    }

    fn parse_func_decl(
        &mut self,
        span: Span,
        is_static: bool,
        is_external: bool,
        owning_class: Option<Rc<str>>,
    ) -> HResult<FuncDecl> {
        let kind = match self.peek_kind() {
            TokenKind::Keyword(Keyword::Fun) => FuncKind::Function,
            TokenKind::Keyword(Keyword::Proc) => FuncKind::Procedure,
            TokenKind::Keyword(Keyword::Get) => FuncKind::Getter,
            TokenKind::Keyword(Keyword::Set) => FuncKind::Setter,
            TokenKind::Keyword(Keyword::Construct) => FuncKind::Constructor,
            _ => return Err(self.error(ErrorKind::ExpectedToken, "expected fun/proc/get/set/construct".into())),
        };
        self.advance();

        let name: Rc<str> = if kind == FuncKind::Constructor {
            Rc::from(crate::lexicon::CONSTRUCTOR_NAME)
        } else {
            self.expect_identifier()?
        };

        let type_params = self.parse_optional_type_params()?;
        let params = if self.check(&TokenKind::LParen) { self.parse_params()? } else { Vec::new() };
        let variadic = params.last().is_some_and(|p: &Param| p.name.as_ref() == "...");
        let params: Vec<Param> = params.into_iter().filter(|p| p.name.as_ref() != "...").collect();

        if kind == FuncKind::Setter && params.len() != 1 {
            return Err(self.error(ErrorKind::InvalidSetterArity, "a setter must declare exactly one parameter".into()));
        }
        if kind == FuncKind::Getter && !params.is_empty() {
            return Err(self.error(ErrorKind::ArityMismatch, "a getter must declare zero parameters".into()));
        }

        let return_type = if self.matches(&TokenKind::Colon) && kind != FuncKind::Constructor {
            self.parse_type()?
        } else {
            HType::any()
        };

        let body = if is_external {
            // external declarations have no body.
            None
        } else {
            let block = self.parse_block(ParseStyle::FunctionBody)?;
            match block.kind {
                StmtKind::Block(stmts) => Some(stmts),
                _ => unreachable!(),
            }
        };

        Ok(FuncDecl {
            kind,
            name,
            return_type,
            params,
            variadic,
            type_params,
            body,
            is_static,
            is_external,
            owning_class,
            span,
        })
    }

    /// Parameters: positional, then optional-positional (delimited by
    /// `[ ... ]`), then named (delimited by `{ ... }`) — spec §4.3
    /// "Parameters".
    fn parse_params(&mut self) -> HResult<Vec<Param>> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if self.matches(&TokenKind::LBracket) {
                while !self.check(&TokenKind::RBracket) {
                    params.push(self.parse_one_param(ParamKind::Optional)?);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "`]`")?;
            } else if self.matches(&TokenKind::LBrace) {
                while !self.check(&TokenKind::RBrace) {
                    params.push(self.parse_one_param(ParamKind::Named)?);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "`}`")?;
            } else if self.matches(&TokenKind::Ellipsis) {
                params.push(Param { name: Rc::from("..."), declared_type: HType::any(), default: None, kind: ParamKind::Positional });
            } else {
                params.push(self.parse_one_param(ParamKind::Positional)?);
            }
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(params)
    }

    fn parse_one_param(&mut self, kind: ParamKind) -> HResult<Param> {
        let name = self.expect_identifier()?;
        let declared_type = if self.matches(&TokenKind::Colon) { self.parse_type()? } else { HType::any() };
        let default = if self.matches(&TokenKind::Eq) { Some(self.parse_expression()?) } else { None };
        Ok(Param { name, declared_type, default, kind })
    }

    fn parse_type(&mut self) -> HResult<HType> {
        let name = self.expect_identifier()?;
        let args = if self.matches(&TokenKind::Lt) {
            let mut args = Vec::new();
            loop {
                args.push(self.parse_type()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt, "`>`")?;
            args
        } else {
            Vec::new()
        };
        Ok(HType { name, args })
    }

    // ---------------------------------------------------------------
    // Expressions: precedence climbing, tightest to loosest (spec §4.3)
    // ---------------------------------------------------------------

    pub fn parse_expression(&mut self) -> HResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> HResult<Expr> {
        let expr = self.parse_or()?;
        if self.matches(&TokenKind::Eq) {
            let span = expr.span.clone();
            let value = Box::new(self.parse_assignment()?);
            return match expr.kind {
                ExprKind::Symbol(name) => Ok(Expr::new(span, ExprKind::Assign { name, value })),
                ExprKind::MemberGet(coll, name) => Ok(Expr::new(span, ExprKind::MemberSet(coll, name, value))),
                ExprKind::SubGet(coll, key) => Ok(Expr::new(span, ExprKind::SubSet(coll, key, value))),
                _ => Err(self.error(ErrorKind::InvalidLValue, "invalid assignment target".into())),
            };
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> HResult<Expr> {
        let mut expr = self.parse_and()?;
        while self.matches(&TokenKind::OrOr) {
            let span = expr.span.clone();
            let rhs = self.parse_and()?;
            expr = Expr::new(span, ExprKind::Binary(Box::new(expr), BinaryOp::Or, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> HResult<Expr> {
        let mut expr = self.parse_equality()?;
        while self.matches(&TokenKind::AndAnd) {
            let span = expr.span.clone();
            let rhs = self.parse_equality()?;
            expr = Expr::new(span, ExprKind::Binary(Box::new(expr), BinaryOp::And, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> HResult<Expr> {
        let mut expr = self.parse_relational()?;
        loop {
            let op = if self.matches(&TokenKind::EqEq) {
                BinaryOp::EqEq
            } else if self.matches(&TokenKind::NotEq) {
                BinaryOp::NotEq
            } else {
                break;
            };
            let span = expr.span.clone();
            let rhs = self.parse_relational()?;
            expr = Expr::new(span, ExprKind::Binary(Box::new(expr), op, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn parse_relational(&mut self) -> HResult<Expr> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = if self.matches(&TokenKind::Lt) {
                BinaryOp::Lt
            } else if self.matches(&TokenKind::Gt) {
                BinaryOp::Gt
            } else if self.matches(&TokenKind::Le) {
                BinaryOp::Le
            } else if self.matches(&TokenKind::Ge) {
                BinaryOp::Ge
            } else if self.check_keyword(Keyword::Is) {
                self.advance();
                BinaryOp::Is
            } else {
                break;
            };
            let span = expr.span.clone();
            let rhs = self.parse_additive()?;
            expr = Expr::new(span, ExprKind::Binary(Box::new(expr), op, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> HResult<Expr> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = if self.matches(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.matches(&TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let span = expr.span.clone();
            let rhs = self.parse_multiplicative()?;
            expr = Expr::new(span, ExprKind::Binary(Box::new(expr), op, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> HResult<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = if self.matches(&TokenKind::Star) {
                BinaryOp::Mul
            } else if self.matches(&TokenKind::Slash) {
                BinaryOp::Div
            } else if self.matches(&TokenKind::Percent) {
                BinaryOp::Rem
            } else {
                break;
            };
            let span = expr.span.clone();
            let rhs = self.parse_unary()?;
            expr = Expr::new(span, ExprKind::Binary(Box::new(expr), op, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> HResult<Expr> {
        let span = self.span();
        if self.matches(&TokenKind::Bang) {
            let operand = Box::new(self.parse_unary()?);
            return Ok(Expr::new(span, ExprKind::Unary(UnaryOp::Not, operand)));
        }
        if self.matches(&TokenKind::Minus) {
            let operand = Box::new(self.parse_unary()?);
            return Ok(Expr::new(span, ExprKind::Unary(UnaryOp::Neg, operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> HResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(&TokenKind::Dot) {
                let span = expr.span.clone();
                let name = self.expect_identifier()?;
                expr = Expr::new(span, ExprKind::MemberGet(Box::new(expr), name));
            } else if self.matches(&TokenKind::LBracket) {
                let span = expr.span.clone();
                let key = self.parse_expression()?;
                self.expect(TokenKind::RBracket, "`]`")?;
                expr = Expr::new(span, ExprKind::SubGet(Box::new(expr), Box::new(key)));
            } else if self.check(&TokenKind::LParen) {
                let span = expr.span.clone();
                let (positional, named) = self.parse_call_args()?;
                expr = Expr::new(span, ExprKind::Call { callee: Box::new(expr), positional, named });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> HResult<(Vec<Expr>, Vec<(Rc<str>, Expr)>)> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut positional = Vec::new();
        let mut named = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let arg = self.parse_call_argument()?;
            match arg.kind {
                ExprKind::NamedArg(name, value) => named.push((name, *value)),
                _ => positional.push(arg),
            }
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok((positional, named))
    }

    fn parse_call_argument(&mut self) -> HResult<Expr> {
        // `identifier : expr` is a named argument; anything else falls
        // through to a normal expression.
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            if matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Colon)) {
                let span = self.span();
                self.advance(); // identifier
                self.advance(); // `:`
                let value = Box::new(self.parse_expression()?);
                return Ok(Expr::new(span, ExprKind::NamedArg(name, value)));
            }
        }
        self.parse_expression()
    }

    fn parse_primary(&mut self) -> HResult<Expr> {
        let span = self.span();
        match self.peek_kind().clone() {
            TokenKind::Null => {
                self.advance();
                Ok(Expr::new(span, ExprKind::Null))
            }
            TokenKind::Number(n) => {
                self.advance();
                let idx = self.push_literal(Literal::Number(n));
                Ok(Expr::new(span, ExprKind::Const(idx)))
            }
            TokenKind::Str(s) => {
                self.advance();
                let idx = self.push_literal(Literal::Str(s));
                Ok(Expr::new(span, ExprKind::Const(idx)))
            }
            TokenKind::Bool(b) => {
                self.advance();
                let idx = self.push_literal(Literal::Bool(b));
                Ok(Expr::new(span, ExprKind::Const(idx)))
            }
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                Ok(Expr::new(span, ExprKind::This))
            }
            TokenKind::Keyword(Keyword::Super) => {
                self.advance();
                Ok(Expr::new(span, ExprKind::Symbol(Rc::from("super"))))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::new(span, ExprKind::Symbol(name)))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = Box::new(self.parse_expression()?);
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(Expr::new(span, ExprKind::Group(inner)))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    items.push(self.parse_expression()?);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "`]`")?;
                Ok(Expr::new(span, ExprKind::LiteralVector(items)))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut pairs = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let key = self.parse_expression()?;
                    self.expect(TokenKind::Colon, "`:`")?;
                    let value = self.parse_expression()?;
                    pairs.push((key, value));
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "`}`")?;
                Ok(Expr::new(span, ExprKind::LiteralDict(pairs)))
            }
            other => Err(self.error(ErrorKind::UnexpectedToken, format!("unexpected token {other:?}"))),
        }
    }
}

fn span_of(decl: &FuncDecl) -> Span {
    decl.span.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> Program {
        let mut interner = Interner::new();
        let file: Rc<str> = Rc::from("test.ht");
        let tokens = Lexer::new(src, Rc::clone(&file), &mut interner).tokenize().unwrap();
        Parser::new(tokens, file).parse_library().unwrap()
    }

    #[test]
    fn parses_var_decl_with_initializer() {
        let program = parse("var year = 2020");
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0].kind {
            StmtKind::VarDecl(decl) => {
                assert_eq!(decl.name.as_ref(), "year");
                assert!(decl.initializer.is_some());
            }
            other => panic!("expected VarDecl, got {other:?}"),
        }
    }

    #[test]
    fn parses_proc_and_call_print() {
        let program = parse("proc main { print(year + 21) }");
        assert_eq!(program.statements.len(), 1);
        assert!(matches!(program.statements[0].kind, StmtKind::FuncDecl(_)));
    }

    #[test]
    fn parses_class_with_construct_and_method() {
        let program = parse(
            "class C { var x construct(v: num) { this.x = v } fun twice: num { return x * 2 } }",
        );
        match &program.statements[0].kind {
            StmtKind::ClassDecl(decl) => {
                assert_eq!(decl.variables.len(), 1);
                assert_eq!(decl.methods.len(), 2);
            }
            other => panic!("expected ClassDecl, got {other:?}"),
        }
    }

    #[test]
    fn for_in_desugars_to_indexed_while() {
        let program = parse("proc main { for (var x in xs) { sum = sum + x } }");
        let StmtKind::FuncDecl(decl) = &program.statements[0].kind else { panic!() };
        let body = decl.body.as_ref().unwrap();
        assert!(matches!(body[0].kind, StmtKind::Block(_)));
    }

    #[test]
    fn invalid_lvalue_is_a_parse_error() {
        let mut interner = Interner::new();
        let file: Rc<str> = Rc::from("test.ht");
        let tokens = Lexer::new("proc main { 1 + 1 = 2 }", Rc::clone(&file), &mut interner).tokenize().unwrap();
        let result = Parser::new(tokens, file).parse_library();
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind, ErrorKind::InvalidLValue);
    }

    #[test]
    fn named_call_argument_is_split_out() {
        let program = parse("proc main { f(1, name: 'x') }");
        let StmtKind::FuncDecl(decl) = &program.statements[0].kind else { panic!() };
        let body = decl.body.as_ref().unwrap();
        let StmtKind::ExprStmt(expr) = &body[0].kind else { panic!() };
        let ExprKind::Call { positional, named, .. } = &expr.kind else { panic!() };
        assert_eq!(positional.len(), 1);
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].0.as_ref(), "name");
    }
}
