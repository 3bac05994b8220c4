//! Error types shared by every pipeline stage.
//!
//! Grounded on the teacher's `exception_private.rs`: a closed, `strum`-derived
//! kind enum wrapped in a single error struct carrying source position, plus a
//! `Result` type alias (`RunResult` there, `HResult` here). The teacher never
//! reaches for `thiserror`/`anyhow` anywhere in the workspace, so this module
//! doesn't either.

use std::fmt;
use std::rc::Rc;

use strum::{Display, EnumString, IntoStaticStr};

/// Result alias used throughout the pipeline.
pub type HResult<T> = Result<T, HetuError>;

/// Every user-visible error category from spec §7, grouped by pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
pub enum ErrorKind {
    // --- Lex ---
    UnexpectedCharacter,
    UnterminatedString,

    // --- Parse ---
    ExpectedToken,
    UnexpectedToken,
    InvalidLValue,
    InvalidSetterArity,

    // --- Resolve ---
    AlreadyDeclared,
    AlreadyDefined,
    UseOfUninitialized,
    ReturnOutsideFunction,
    ReturnValueInConstructor,
    ThisOutsideClass,
    ExtendsSelf,

    // --- Evaluate ---
    UndefinedIdentifier,
    UndefinedOperator,
    NotCallable,
    NotAType,
    NotAClass,
    GetOnNonObject,
    SubscriptOnNonCollection,
    IndexOutOfRange,
    ImmutableWrite,
    ConditionNotBoolean,
    ArityMismatch,
    ArgumentTypeMismatch,
    SetterArity,

    // --- Embedding / host boundary ---
    ImportFailed,
    HostError,
}

/// A single error produced anywhere in the pipeline.
///
/// File/line/column are always populated: lex and parse errors know their
/// position directly; resolve and evaluate errors carry the position of the
/// AST node that triggered them.
#[derive(Debug, Clone)]
pub struct HetuError {
    pub kind: ErrorKind,
    pub file: Rc<str>,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl HetuError {
    pub fn new(kind: ErrorKind, file: Rc<str>, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self { kind, file, line, column, message: message.into() }
    }
}

impl fmt::Display for HetuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}: {}", self.file, self.line, self.column, self.kind, self.message)
    }
}

impl std::error::Error for HetuError {}
