use std::cell::RefCell;
use std::io::prelude::*;
use std::io::stdin;
use std::rc::Rc;
use std::time::SystemTime;

use super::callable::NativeFunction;
use super::modules::NativeModule;
use super::runtime::{Interpreter, RuntimeError};
use super::value::Value;

fn native_error(name: &str, error: impl ToString) -> RuntimeError {
    RuntimeError::Native {
        name: name.to_string(),
        message: error.to_string(),
    }
}

fn joined(args: &[Value]) -> String {
    args.iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn clock_impl(_args: &[Value]) -> Result<Value, RuntimeError> {
    let duration = SystemTime::UNIX_EPOCH
        .elapsed()
        .map_err(|e| native_error("clock", e))?;
    Ok(Value::Number(duration.as_secs_f64()))
}

fn len_impl(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(match args.first() {
        Some(Value::List(items)) => Value::Number(items.borrow().len() as f64),
        Some(Value::String(s)) => Value::Number(s.chars().count() as f64),
        _ => Value::None,
    })
}

fn read_line_impl(_args: &[Value]) -> Result<Value, RuntimeError> {
    let mut line = String::new();
    let n = stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| native_error("read_line", e))?;
    if n == 0 {
        return Ok(Value::None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']);
    Ok(Value::string(trimmed))
}

fn io_module<W: Write + 'static>(out: Rc<RefCell<W>>) -> NativeModule {
    let print_out = out.clone();
    let print = NativeFunction::new("print", move |args| {
        let mut out = print_out.borrow_mut();
        writeln!(out, "{}", joined(args)).map_err(|e| native_error("print", e))?;
        Ok(Value::None)
    });
    let write = NativeFunction::new("write", move |args| {
        let mut out = out.borrow_mut();
        write!(out, "{}", joined(args)).map_err(|e| native_error("write", e))?;
        out.flush().map_err(|e| native_error("write", e))?;
        Ok(Value::None)
    });
    NativeModule::list(
        Some("io"),
        vec![print, write, NativeFunction::new("read_line", read_line_impl)],
    )
}

/// Register the shipped native modules, with `io` output going to `out`
pub fn populate_builtin<W: Write + 'static>(interpreter: &mut Interpreter, out: Rc<RefCell<W>>) {
    interpreter.register_module("std:io", io_module(out));
    interpreter.register_module("std:len", NativeModule::single(NativeFunction::new("len", len_impl)));
    interpreter.register_module("std:time", NativeModule::single(NativeFunction::new("clock", clock_impl)));
}
