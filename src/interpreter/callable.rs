use std::{fmt, rc::Rc};

use tracing::trace;

use super::runtime::{Interpreter, RuntimeError, UnwindCause};
use super::value::Value;
use crate::ast::Node;

pub trait Callable {
    fn name(&self) -> &str;
    fn is_native(&self) -> bool;
    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError>;
}

pub type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Value, RuntimeError>>;

/// A function implemented by the host
/// Natives never see the interpreter's scope, they only get their evaluated arguments
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub call: NativeFn,
}

impl NativeFunction {
    pub fn new<F>(name: &str, call: F) -> NativeFunction
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        NativeFunction {
            name: name.to_string(),
            call: Rc::new(call),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_native(&self) -> bool {
        true
    }

    fn call(&self, _interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        (self.call)(&args)
    }
}

/// A function written in the language itself
/// There is no closure: the body resolves names against whatever scope is live when it is called
#[derive(Clone, Debug)]
pub struct HostedFunc {
    pub label: String,
    pub parameters: Vec<String>,
    pub body: Rc<Node>,
}

impl HostedFunc {
    pub fn new(parameters: Vec<String>, body: Node) -> HostedFunc {
        HostedFunc {
            label: format!("fn ({})", parameters.join(" ")),
            parameters,
            body: Rc::new(body),
        }
    }
}

impl Callable for HostedFunc {
    fn name(&self) -> &str {
        &self.label
    }

    fn is_native(&self) -> bool {
        false
    }

    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        trace!(function = %self.label, args = args.len(), "calling hosted function");
        interpreter.begin_scope();
        // Missing arguments read as none, extra ones were evaluated by the caller and are dropped here
        let mut args = args.into_iter();
        for parameter in self.parameters.iter() {
            interpreter.bind(parameter, args.next().unwrap_or(Value::None));
        }
        let result = interpreter.execute_function_body(&self.body);
        // Dropping the frame also drops the parameter bindings
        interpreter.end_scope()?;
        match result {
            Ok(value) => Ok(value),
            Err(UnwindCause::Return(value)) => Ok(value),
            Err(UnwindCause::Error(error)) => Err(error),
        }
    }
}
