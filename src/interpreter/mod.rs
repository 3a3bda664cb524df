mod builtin;
mod callable;
mod modules;
mod runtime;
mod scope;
mod value;

use std::cell::RefCell;
use std::io::{stdout, Stdout};
use std::rc::Rc;

pub use builtin::populate_builtin;
pub use callable::{Callable, HostedFunc, NativeFunction};
pub use modules::{default_library_dir, NativeModule, LIBDIR_VAR, SOURCE_EXTENSION};
pub use runtime::{Interpreter, InterpreterConfig, RuntimeError, Target, UnwindCause};
pub use scope::IndexWriteError;
pub use value::Value;

/// An interpreter with the shipped native modules, printing to stdout
pub fn stock_interpreter(config: InterpreterConfig) -> Interpreter {
    let mut interpreter = Interpreter::new(config);
    let out: Rc<RefCell<Stdout>> = Rc::new(RefCell::new(stdout()));
    populate_builtin(&mut interpreter, out);
    interpreter
}
