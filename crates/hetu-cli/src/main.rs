//! Minimal host exercising the Hetu embedding API: reads a `.ht` file from
//! argv, registers a `print` external, evaluates the file, and reports
//! errors to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use indexmap::IndexMap;

use hetu::{EvalOptions, GlobalOptions, Interpreter, InterpreterConfig, NativeFn, Value};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let Some(file_path) = args.get(1) else {
        eprintln!("usage: hetu <script.ht>");
        return ExitCode::FAILURE;
    };
    let path = Path::new(file_path);

    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error reading {file_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let working_directory = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let mut interpreter = Interpreter::new(InterpreterConfig { working_directory, ..InterpreterConfig::default() });
    register_demo_externals(&interpreter);

    let options = EvalOptions { file_name: Some(Rc::from(file_path.as_str())), invoke_func: Some(Rc::from("main")), ..EvalOptions::default() };
    match interpreter.eval(&source, options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Registers the handful of externals the end-to-end scenarios in spec §8
/// call by name. A real host would expose its own native surface instead.
fn register_demo_externals(interpreter: &Interpreter) {
    let print: NativeFn = Rc::new(|_receiver: Option<Value>, args: &[Value], _named: &IndexMap<Rc<str>, Value>| {
        let rendered = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
        println!("{rendered}");
        Ok(Value::Null)
    });
    interpreter.load_external_functions([(Rc::from("print"), print)]);

    interpreter.define_global("VERSION", Value::String(Rc::from(env!("CARGO_PKG_VERSION"))), GlobalOptions::default());
}
