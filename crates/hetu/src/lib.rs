//! Hetu: an embeddable tree-walking interpreter.
//!
//! The crate is organized as a straight-line pipeline — lexicon, lexer, AST,
//! parser, resolver, value model, evaluator, extern bridge — fronted by the
//! `embedding` module's `Interpreter`, the only type most hosts need to
//! touch. Every stage returns `errors::HResult<T>`; nothing in this crate
//! panics on malformed input.

pub mod ast;
pub mod embedding;
pub mod errors;
pub mod evaluator;
pub mod extern_bridge;
pub mod intern;
pub mod lexer;
pub mod lexicon;
pub mod parser;
pub mod resolver;
pub mod runtime;
pub mod token;
pub mod tracer;
pub mod value;

pub use embedding::{EvalOptions, GlobalOptions, Interpreter, InterpreterConfig, InvokeOptions};
pub use errors::{ErrorKind, HResult, HetuError};
pub use evaluator::FileReader;
pub use extern_bridge::{ExternalNamespace, NativeFn};
pub use value::Value;
