//! Public embedding API (spec §6, §9 "Embedding façade").
//!
//! Grounded in the teacher's `session_manager.rs`/`repl.rs` pairing — a
//! thin, typed wrapper around the pipeline, offering a serialization-free
//! API — trimmed of the teacher's session registry, undo history, and heap
//! introspection surface, none of which spec.md's §6 API calls for (§6:
//! "Persisted state: None").

use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::HType;
use crate::errors::{ErrorKind, HResult, HetuError};
use crate::evaluator::{Evaluator, FileReader, NativeFnBox};
use crate::extern_bridge::{ExternalNamespace, NativeFn};
use crate::lexicon::EXTERNAL_PREFIX;
use crate::value::Value;

/// Construction-time configuration — spec §6's whole configuration surface
/// (§11: no on-disk config format in scope).
pub struct InterpreterConfig {
    /// Base directory `import` paths are resolved against.
    pub working_directory: PathBuf,
    /// Enables the `StderrTracer` instead of the zero-cost `NoopTracer`.
    pub debug: bool,
    /// Host callback from path to source text, used by `import` (spec §6:
    /// "synchronous variant required"). Falls back to `std::fs::read_to_string`
    /// when absent.
    pub file_reader: Option<FileReader>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self { working_directory: PathBuf::from("."), debug: false, file_reader: None }
    }
}

/// Options accepted by [`Interpreter::eval`]/[`Interpreter::eval_file`]
/// (spec §6: `{ file_name?, context?, style, invoke_func?, args? }`, scoped
/// down to library-style evaluation — the only parse entry point the
/// grammar exposes at the top level).
#[derive(Default, Clone)]
pub struct EvalOptions {
    /// Overrides the file name recorded on error positions and `import`
    /// resolution. Defaults to `"<eval>"` for `eval`, the given path for
    /// `eval_file`.
    pub file_name: Option<Rc<str>>,
    /// When set, the named top-level function is invoked with `args`
    /// immediately after the source finishes loading, and its return value
    /// is returned instead of the last statement's value.
    pub invoke_func: Option<Rc<str>>,
    /// Positional arguments passed to `invoke_func`, if set.
    pub args: Vec<Value>,
}

/// Options accepted by [`Interpreter::define_global`].
pub struct GlobalOptions {
    pub declared_type: HType,
    pub mutable: bool,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self { declared_type: HType::any(), mutable: false }
    }
}

/// Options accepted by [`Interpreter::invoke`].
#[derive(Default, Clone)]
pub struct InvokeOptions {
    /// Qualifies `function_name` as a static method of this class.
    pub class_name: Option<Rc<str>>,
    pub positional: Vec<Value>,
    pub named: Vec<(Rc<str>, Value)>,
}

/// The crate's public surface. Construct one per script/sandbox, feed it
/// source via [`eval`](Interpreter::eval)/[`eval_file`](Interpreter::eval_file),
/// and bridge host functionality in through
/// [`define_global`](Interpreter::define_global),
/// [`load_external_functions`](Interpreter::load_external_functions), and
/// [`bind_external_namespace`](Interpreter::bind_external_namespace).
pub struct Interpreter {
    evaluator: Evaluator,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Self { evaluator: Evaluator::new(config.working_directory, config.file_reader, config.debug) }
    }

    /// Evaluates `source` as a standalone library, returning either the last
    /// top-level statement's value, or, when `options.invoke_func` is set,
    /// the return value of calling that function after the source loads
    /// (spec §6 "eval").
    pub fn eval(&mut self, source: &str, options: EvalOptions) -> HResult<Value> {
        let file = options.file_name.clone().unwrap_or_else(|| Rc::from("<eval>"));
        let result = self.evaluator.eval_source(source, file)?;
        self.maybe_invoke_after_eval(result, &options)
    }

    /// Reads `path` (through the configured `file_reader`, if any) and
    /// evaluates it the same way as `eval` (spec §6 "eval_file").
    pub fn eval_file(&mut self, path: &Path, options: EvalOptions) -> HResult<Value> {
        let file: Rc<str> = options.file_name.clone().unwrap_or_else(|| Rc::from(path.to_string_lossy().as_ref()));
        let source = self.read_file(path, &file)?;
        let result = self.evaluator.eval_source(&source, file)?;
        self.maybe_invoke_after_eval(result, &options)
    }

    fn read_file(&self, path: &Path, file: &Rc<str>) -> HResult<String> {
        std::fs::read_to_string(path)
            .map_err(|e| HetuError::new(ErrorKind::ImportFailed, Rc::clone(file), 0, 0, format!("reading `{}`: {e}", path.display())))
    }

    fn maybe_invoke_after_eval(&self, loaded: Value, options: &EvalOptions) -> HResult<Value> {
        match &options.invoke_func {
            Some(name) => self.evaluator.invoke(name, None, options.args.clone(), IndexMap::new()),
            None => Ok(loaded),
        }
    }

    /// Defines or overwrites a global binding visible to every script
    /// evaluated by this interpreter (spec §6 "define_global").
    pub fn define_global(&self, name: impl Into<Rc<str>>, value: Value, options: GlobalOptions) {
        self.evaluator.define_global(name.into(), value, options.declared_type, options.mutable);
    }

    /// Calls a script-defined function, or a static method when
    /// `options.class_name` is set, without re-entering `eval` (spec §6
    /// "invoke"). Errors are caught and reported rather than left to
    /// propagate as a panic (§7).
    pub fn invoke(&self, function_name: &str, options: InvokeOptions) -> HResult<Value> {
        let named: IndexMap<Rc<str>, Value> = options.named.into_iter().collect();
        self.evaluator.invoke(function_name, options.class_name.as_deref(), options.positional, named)
    }

    /// Registers a batch of native callbacks under their qualified names
    /// (spec §6 "load_external_functions"). Each entry must correspond to an
    /// `external fun`/`external proc` declaration of the same name somewhere
    /// in the scripts this interpreter will evaluate; `declare_function`
    /// looks the callback up by the `__external__`-prefixed key populated
    /// here the first time that declaration runs.
    pub fn load_external_functions(&self, functions: impl IntoIterator<Item = (Rc<str>, NativeFn)>) {
        for (qualified_name, native_fn) in functions {
            let key: Rc<str> = Rc::from(format!("{EXTERNAL_PREFIX}{qualified_name}"));
            self.evaluator.define_global(key, Value::NativeHandle(Rc::new(NativeFnBox(native_fn))), HType::any(), false);
        }
    }

    /// Registers a host-provided object implementing the four-operation
    /// protocol of spec §4.6, addressable from scripts as `external class
    /// name` (spec §6 "bind_external_namespace").
    pub fn bind_external_namespace(&self, name: impl Into<Rc<str>>, namespace: Rc<dyn ExternalNamespace>) {
        self.evaluator.bind_external_namespace(name.into(), namespace);
    }
}
