//! Ambient execution-logging layer (spec §6/§9 ambient stack).
//!
//! Grounded directly in the teacher's `tracer.rs` `VmTracer` trait plus its
//! `NoopTracer`/`StderrTracer` pair: the teacher hand-rolls its own tracing
//! trait rather than reaching for `tracing`/`log`, so Hetu follows the same
//! idiom. Scaled down to the three hook points a tree-walker actually needs
//! (the teacher's bytecode VM additionally traces per-opcode dispatch,
//! which has no counterpart here).

/// Hook points a host can observe interpreter execution through. All
/// methods default to no-ops so `NoopTracer` costs nothing.
pub trait Tracer {
    fn on_call(&mut self, _function_name: &str, _depth: usize) {}
    fn on_return(&mut self, _function_name: &str, _depth: usize) {}
    fn on_statement(&mut self, _file: &str, _line: u32) {}
}

/// Zero-cost default (spec §9: "ambient logging layer").
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Human-readable execution log to stderr, enabled by
/// `InterpreterConfig::debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrTracer;

impl Tracer for StderrTracer {
    fn on_call(&mut self, function_name: &str, depth: usize) {
        eprintln!("{}-> call {function_name}", "  ".repeat(depth));
    }

    fn on_return(&mut self, function_name: &str, depth: usize) {
        eprintln!("{}<- return {function_name}", "  ".repeat(depth));
    }

    fn on_statement(&mut self, file: &str, line: u32) {
        eprintln!("{file}:{line}");
    }
}

/// Either tracer, chosen at interpreter-construction time from
/// `InterpreterConfig::debug` (spec §6 embedding API); boxed so
/// `Interpreter` doesn't need to be generic over the tracer type.
pub(crate) enum AnyTracer {
    Noop(NoopTracer),
    Stderr(StderrTracer),
}

impl AnyTracer {
    pub fn new(debug: bool) -> Self {
        if debug { Self::Stderr(StderrTracer) } else { Self::Noop(NoopTracer) }
    }
}

impl Tracer for AnyTracer {
    fn on_call(&mut self, function_name: &str, depth: usize) {
        match self {
            Self::Noop(t) => t.on_call(function_name, depth),
            Self::Stderr(t) => t.on_call(function_name, depth),
        }
    }

    fn on_return(&mut self, function_name: &str, depth: usize) {
        match self {
            Self::Noop(t) => t.on_return(function_name, depth),
            Self::Stderr(t) => t.on_return(function_name, depth),
        }
    }

    fn on_statement(&mut self, file: &str, line: u32) {
        match self {
            Self::Noop(t) => t.on_statement(file, line),
            Self::Stderr(t) => t.on_statement(file, line),
        }
    }
}

