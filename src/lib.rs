pub mod ast;
pub mod interpreter;
pub mod parser;
pub mod scanner;

use std::path::Path;

pub use interpreter::{stock_interpreter, Interpreter, InterpreterConfig, RuntimeError, Value};

/// Run `source` with the shipped native modules
/// `import_folder` is where the script lives and is searched first for its imports
pub fn run(source: &str, working_dir: &Path, import_folder: &Path) -> Result<Value, RuntimeError> {
    let config = InterpreterConfig::new(working_dir).with_import_folder(import_folder);
    stock_interpreter(config).run_source(source, &import_folder.display().to_string())
}
