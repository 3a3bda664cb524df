use std::{
    fs, io, mem,
    path::{Path, PathBuf},
    rc::Rc,
};

use thiserror::Error;
use tracing::{debug, warn};

use super::callable::{Callable, HostedFunc};
use super::modules::{default_library_dir, ModuleLoader, NativeModule, Resolved};
use super::scope::ScopeManager;
use super::value::{ge, gt, le, lt, Value};
use crate::ast::{ArithOp, Block, CompareOp, Element, ElementInner, Keyword, LogicalOp, Node};
use crate::parser::{parse, CollectingErrorReporter};
use crate::scanner::Scanner;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("module {specifier} does not exist, searched {searched:?}")]
    ModuleNotFound { specifier: String, searched: Vec<PathBuf> },
    #[error("function or keyword {0} does not exist")]
    UnknownForm(String),
    #[error("scope invariant violated: {0}")]
    Invariant(&'static str),
    #[error("unable to read module {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("unable to parse {origin}\n{details}")]
    Parse { origin: String, details: String },
    #[error("native function {name} failed: {message}")]
    Native { name: String, message: String },
}

/// Why evaluation stopped short of producing a value
pub enum UnwindCause {
    Error(RuntimeError),
    Return(Value),
}

impl From<RuntimeError> for UnwindCause {
    fn from(error: RuntimeError) -> Self {
        UnwindCause::Error(error)
    }
}

/// What `let` writes to
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Indexed { variable: String, path: Vec<Value> },
}

// The evaluation rule picked by the head of a form
enum Form {
    Scope,
    Let,
    Arith(ArithOp),
    Compare(CompareOp),
    Logical(LogicalOp),
    If,
    While,
    List,
    Index,
    Fn,
    Return,
    Import,
    Call(Rc<dyn Callable>),
}

/// Directories the interpreter resolves imports against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub working_dir: PathBuf,
    /// Directory of the entry script, the first place imports are looked up
    pub import_folder: PathBuf,
    pub library_dir: PathBuf,
}

impl InterpreterConfig {
    pub fn new(working_dir: &Path) -> InterpreterConfig {
        InterpreterConfig {
            working_dir: working_dir.to_path_buf(),
            import_folder: working_dir.to_path_buf(),
            library_dir: default_library_dir(working_dir),
        }
    }

    pub fn with_import_folder(mut self, import_folder: &Path) -> InterpreterConfig {
        self.import_folder = import_folder.to_path_buf();
        self
    }

    pub fn with_library_dir(mut self, library_dir: &Path) -> InterpreterConfig {
        self.library_dir = library_dir.to_path_buf();
        self
    }
}

pub struct Interpreter {
    scopes: ScopeManager,
    loader: ModuleLoader,
    // The directory of the script or module being evaluated
    current_dir: PathBuf,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Interpreter {
        Interpreter {
            scopes: ScopeManager::new(),
            loader: ModuleLoader::new(config.working_dir, config.library_dir),
            current_dir: config.import_folder,
        }
    }

    pub fn register_module(&mut self, specifier: &str, module: NativeModule) {
        self.loader.register(specifier, module);
    }

    /// Bind a value in the current frame, as `let` would
    pub fn define(&mut self, name: &str, value: Value) {
        self.scopes.write(name, value);
    }

    pub fn lookup(&self, name: &str) -> Value {
        self.scopes.read(name)
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.depth()
    }

    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    pub(crate) fn begin_scope(&mut self) {
        self.scopes.push();
    }

    pub(crate) fn end_scope(&mut self) -> Result<(), RuntimeError> {
        self.scopes.pop()
    }

    pub(crate) fn bind(&mut self, name: &str, value: Value) {
        self.scopes.write(name, value);
    }

    /// Evaluate a whole program, yielding the value of its last statement
    /// A `return` at the top level ends the program early with its value
    /// The top-level nodes always form a statement sequence, even when the first one is an element
    pub fn interpret(&mut self, program: &Block) -> Result<Value, RuntimeError> {
        match self.eval_sequence(&program.members) {
            Ok(value) => Ok(value),
            Err(UnwindCause::Return(value)) => Ok(value),
            Err(UnwindCause::Error(error)) => Err(error),
        }
    }

    /// Parse and evaluate source text, reporting parse errors under `origin`
    pub fn run_source(&mut self, source: &str, origin: &str) -> Result<Value, RuntimeError> {
        let program = parse_source(source, origin)?;
        self.interpret(&program)
    }

    pub fn eval(&mut self, node: &Node) -> Result<Value, UnwindCause> {
        match node {
            Node::Element(element) => Ok(self.eval_element(element)),
            Node::Block(block) => self.eval_body(&block.members),
        }
    }

    // A run of members is a single form when it starts with an element and a sequence of statements otherwise
    fn eval_body(&mut self, members: &[Node]) -> Result<Value, UnwindCause> {
        match members.split_first() {
            None => Ok(Value::None),
            Some((Node::Element(head), args)) => self.eval_form(head, args),
            Some(_) => self.eval_sequence(members),
        }
    }

    fn eval_sequence(&mut self, members: &[Node]) -> Result<Value, UnwindCause> {
        let mut last = Value::None;
        for member in members {
            last = self.eval(member)?;
        }
        Ok(last)
    }

    /// Run the body of a hosted function inside the frame the call already pushed
    pub(crate) fn execute_function_body(&mut self, body: &Node) -> Result<Value, UnwindCause> {
        match body {
            Node::Block(block) if block.is_scope() => self.eval_body(&block.members[1..]),
            other => self.eval(other),
        }
    }

    fn eval_element(&mut self, element: &Element) -> Value {
        match &element.inner {
            ElementInner::Word(name) => self.scopes.read(name),
            ElementInner::Number(number) => Value::Number(number.0),
            ElementInner::String(string) => Value::string(string),
            ElementInner::Keyword(Keyword::True) => Value::Bool(true),
            ElementInner::Keyword(Keyword::False) => Value::Bool(false),
            ElementInner::Keyword(Keyword::Stack) => Value::Map(Rc::new(self.scopes.snapshot())),
            // Operators and other reserved words have no value of their own
            ElementInner::Keyword(_) => Value::None,
        }
    }

    fn classify(&self, head: &Element) -> Result<Form, RuntimeError> {
        let form = match &head.inner {
            ElementInner::Keyword(keyword) => match keyword {
                Keyword::Scope => Form::Scope,
                Keyword::Let => Form::Let,
                Keyword::Fn => Form::Fn,
                Keyword::Return => Form::Return,
                Keyword::If => Form::If,
                Keyword::While => Form::While,
                Keyword::List => Form::List,
                Keyword::Index => Form::Index,
                Keyword::Import => Form::Import,
                Keyword::Arith(op) => Form::Arith(*op),
                Keyword::Compare(op) => Form::Compare(*op),
                Keyword::Logical(op) => Form::Logical(*op),
                Keyword::None | Keyword::Stack | Keyword::True | Keyword::False => {
                    return Err(RuntimeError::UnknownForm(head.text()))
                }
            },
            ElementInner::Word(name) => match self.scopes.read(name).as_function() {
                Some(callable) => Form::Call(callable),
                None => return Err(RuntimeError::UnknownForm(name.clone())),
            },
            ElementInner::Number(_) | ElementInner::String(_) => {
                return Err(RuntimeError::UnknownForm(head.to_string()))
            }
        };
        Ok(form)
    }

    fn eval_form(&mut self, head: &Element, args: &[Node]) -> Result<Value, UnwindCause> {
        match self.classify(head)? {
            Form::Scope => {
                self.begin_scope();
                let result = self.eval_body(args);
                self.end_scope()?;
                result
            }
            Form::Let => self.eval_let(args),
            Form::Arith(op) => self.eval_arith(op, args),
            Form::Compare(op) => {
                let lhs = self.eval_operand(args, 0)?;
                let rhs = self.eval_operand(args, 1)?;
                let result = match op {
                    CompareOp::Equal => lhs == rhs,
                    CompareOp::NotEqual => lhs != rhs,
                    CompareOp::LessThan => lt(&lhs, &rhs),
                    CompareOp::GreaterThan => gt(&lhs, &rhs),
                    CompareOp::LessThanEqual => le(&lhs, &rhs),
                    CompareOp::GreaterThanEqual => ge(&lhs, &rhs),
                };
                Ok(Value::Bool(result))
            }
            // The deciding operand is the result, so `or` works for defaulting
            Form::Logical(LogicalOp::And) => {
                let lhs = self.eval_operand(args, 0)?;
                if lhs.is_truthy() {
                    self.eval_operand(args, 1)
                } else {
                    Ok(lhs)
                }
            }
            Form::Logical(LogicalOp::Or) => {
                let lhs = self.eval_operand(args, 0)?;
                if lhs.is_truthy() {
                    Ok(lhs)
                } else {
                    self.eval_operand(args, 1)
                }
            }
            Form::If => Ok(self.eval_if(args)?.unwrap_or(Value::None)),
            Form::While => {
                while self.eval_operand(args, 0)?.is_truthy() {
                    self.eval_operand(args, 1)?;
                }
                Ok(Value::None)
            }
            Form::List => {
                let items = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::list(items))
            }
            Form::Index => {
                let target = self.eval_operand(args, 0)?;
                let index = self.eval_operand(args, 1)?;
                Ok(target.element_at(&index))
            }
            Form::Fn => Ok(self.eval_fn(args)),
            Form::Return => {
                let value = self.eval_operand(args, 0)?;
                Err(UnwindCause::Return(value))
            }
            Form::Import => {
                self.eval_import(args)?;
                Ok(Value::None)
            }
            Form::Call(callable) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(callable.call(self, args)?)
            }
        }
    }

    // Missing operands read as none
    fn eval_operand(&mut self, args: &[Node], position: usize) -> Result<Value, UnwindCause> {
        match args.get(position) {
            Some(node) => self.eval(node),
            None => Ok(Value::None),
        }
    }

    fn eval_arith(&mut self, op: ArithOp, args: &[Node]) -> Result<Value, UnwindCause> {
        let Some((first, rest)) = args.split_first() else {
            // No operands at all: there is nothing to fold
            return Ok(Value::None);
        };
        let mut acc = self.eval(first)?;
        for operand in rest {
            let rhs = self.eval(operand)?;
            acc = match op {
                ArithOp::Add => acc + rhs,
                ArithOp::Subtract => acc - rhs,
                ArithOp::Multiply => acc * rhs,
                ArithOp::Divide => acc / rhs,
            };
        }
        Ok(acc)
    }

    // None means no branch was taken, which is different from a branch that produced none
    fn eval_if(&mut self, args: &[Node]) -> Result<Option<Value>, UnwindCause> {
        if self.eval_operand(args, 0)?.is_truthy() {
            Ok(Some(self.eval_operand(args, 1)?))
        } else if let Some(or_else) = args.get(2) {
            Ok(Some(self.eval(or_else)?))
        } else {
            Ok(None)
        }
    }

    fn eval_let(&mut self, args: &[Node]) -> Result<Value, UnwindCause> {
        let Some(target) = args.first() else {
            return Ok(Value::None);
        };
        let target = self.target(target)?;
        let value = self.eval_operand(args, 1)?;
        match target {
            Target::Name(name) => {
                self.scopes.write(&name, value.clone());
                Ok(value)
            }
            Target::Indexed { variable, path } => {
                match self.scopes.write_indexed(&variable, &path, value.clone()) {
                    Ok(()) => Ok(value),
                    Err(error) => {
                        warn!(%variable, %error, "index assignment rejected");
                        Ok(Value::None)
                    }
                }
            }
        }
    }

    /// Evaluate `node` as the target of an assignment
    pub fn target(&mut self, node: &Node) -> Result<Target, UnwindCause> {
        match node {
            Node::Element(element) => Ok(Target::Name(element.text())),
            Node::Block(block) if block.head().and_then(Element::keyword) == Some(Keyword::Index) => {
                let args = &block.members[1..];
                let inner = match args.first() {
                    Some(inner) => self.target(inner)?,
                    None => Target::Name(Keyword::None.to_string()),
                };
                let index = self.eval_operand(args, 1)?;
                Ok(match inner {
                    Target::Name(variable) => Target::Indexed {
                        variable,
                        path: vec![index],
                    },
                    Target::Indexed { variable, mut path } => {
                        path.push(index);
                        Target::Indexed { variable, path }
                    }
                })
            }
            // Any other form computes the name to bind
            Node::Block(_) => Ok(Target::Name(self.eval(node)?.to_string())),
        }
    }

    fn eval_fn(&mut self, args: &[Node]) -> Value {
        let parameters = match args.first() {
            Some(Node::Block(params)) => params
                .members
                .iter()
                .filter_map(|param| match param {
                    Node::Element(element) => Some(element.text()),
                    Node::Block(_) => None,
                })
                .collect(),
            Some(Node::Element(param)) => vec![param.text()],
            None => Vec::new(),
        };
        let body = args
            .get(1)
            .cloned()
            .unwrap_or_else(|| Node::Block(Block::new(Default::default(), Vec::new())));
        Value::Function(Rc::new(HostedFunc::new(parameters, body)))
    }

    fn eval_import(&mut self, args: &[Node]) -> Result<(), RuntimeError> {
        let specifier = match args.first() {
            Some(Node::Element(element)) => element.text(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        match self.loader.resolve(&specifier, &self.current_dir)? {
            Resolved::Source(path) => self.import_source(&path),
            Resolved::Native(module) => {
                for function in module.exports.iter() {
                    let name = module.bound_name(function);
                    debug!(%name, "registering native function");
                    self.scopes.write(&name, Value::Function(Rc::new(function.clone())));
                }
                Ok(())
            }
        }
    }

    // Modules run in the importer's frame so their top-level bindings stay visible, but nested imports resolve
    // relative to the module itself
    fn import_source(&mut self, path: &Path) -> Result<(), RuntimeError> {
        debug!(path = %path.display(), "importing module");
        let source = fs::read_to_string(path).map_err(|source| RuntimeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let program = parse_source(&source, &path.display().to_string())?;
        let module_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.current_dir.clone());
        let importer_dir = mem::replace(&mut self.current_dir, module_dir);
        let result = self.interpret(&program);
        self.current_dir = importer_dir;
        result.map(|_| ())
    }
}

fn parse_source(source: &str, origin: &str) -> Result<Block, RuntimeError> {
    let mut reporter = CollectingErrorReporter::default();
    parse(&mut reporter, Scanner::new(source)).map_err(|_| RuntimeError::Parse {
        origin: origin.to_string(),
        details: reporter.messages.join("\n"),
    })
}

#[cfg(test)]
mod test {
    use std::{cell::Cell, fs};

    use super::*;
    use crate::interpreter::callable::NativeFunction;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn interpreter() -> Interpreter {
        Interpreter::new(InterpreterConfig::new(Path::new(".")))
    }

    fn run(code: &str) -> Value {
        interpreter().run_source(code, "test").unwrap()
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn arithmetic_folds_left() {
        assert_eq!(num(6f64), run("(+ 1 2 3)"));
        assert_eq!(num(5f64), run("(- 10 3 2)"));
        assert_eq!(num(2f64), run("(/ 8 2 2)"));
        assert_eq!(num(24f64), run("(* 2 3 4)"));
        assert_eq!(num(9f64), run("(* (+ 1 2) 3)"));
    }

    #[test]
    fn arithmetic_edge_cases() {
        // Zero operands have nothing to fold and give none, one operand is returned as is
        assert_eq!(Value::None, run("(+)"));
        assert_eq!(Value::None, run("(/)"));
        assert_eq!(num(4f64), run("(- 4)"));
        assert_eq!(num(f64::INFINITY), run("(/ 1 0)"));
        assert_eq!(Value::string("n=1"), run(r#"(+ "n=" 1)"#));
    }

    #[test]
    fn let_binds_in_the_current_frame() {
        assert_eq!(num(5f64), run("(let x 5) x"));
        assert_eq!(num(5f64), run("(let x 5)"));
        assert_eq!(Value::None, run("(let x 5) y"));
    }

    #[test]
    fn block_bindings_are_dropped_with_the_block() {
        assert_eq!(Value::None, run("(let x 1) { (let y 2) } y"));
        assert_eq!(num(1f64), run("(let x 1) { (let x 2) } x"));
        assert_eq!(num(3f64), run("(let x 1) { (let x 2) (+ x 1) }"));
    }

    #[test]
    fn brace_block_with_a_single_form() {
        assert_eq!(num(3f64), run("(let a 1) (let b 2) { + a b }"));
    }

    #[test]
    fn list_index_writes_are_shared() {
        let code = "
            (let l (list 1 2 3))
            (let (index l 1) 9)
            { (index l 1) }
        ";
        assert_eq!(num(9f64), run(code));

        let code = "
            (let l (list 1 2 3))
            { (let (index l 0) 7) }
            l
        ";
        assert_eq!(Value::list(vec![num(7f64), num(2f64), num(3f64)]), run(code));
    }

    #[test]
    fn index_reads() {
        assert_eq!(Value::None, run("(index (list 1 2) 5)"));
        assert_eq!(Value::string("a"), run(r#"(index "cat" 1)"#));
        assert_eq!(num(2f64), run("(let m (list (list 1 2))) (index (index m 0) 1)"));
    }

    #[test]
    fn string_index_writes_build_a_new_string() {
        assert_eq!(
            Value::string("bat"),
            run(r#"(let s "cat") (let (index s 0) "b") s"#)
        );
        assert_eq!(
            Value::string("cat"),
            run(r#"(let s "cat") (let (index s 0) "bb") s"#)
        );
        assert_eq!(Value::None, run(r#"(let s "cat") (let (index s 0) "bb")"#));
    }

    #[test]
    fn nested_index_writes() {
        let code = "
            (let m (list (list 1 2) (list 3 4)))
            (let (index (index m 1) 0) 30)
            m
        ";
        assert_eq!(
            Value::list(vec![
                Value::list(vec![num(1f64), num(2f64)]),
                Value::list(vec![num(30f64), num(4f64)]),
            ]),
            run(code)
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(Value::Bool(true), run("(= 1 1)"));
        assert_eq!(Value::Bool(false), run(r#"(= 1 "1")"#));
        assert_eq!(Value::Bool(true), run("(!= 1 2)"));
        assert_eq!(Value::Bool(true), run("(< 1 2)"));
        assert_eq!(Value::Bool(true), run("(<= 2 2)"));
        assert_eq!(Value::Bool(false), run("(> 1 2)"));
        assert_eq!(Value::Bool(true), run(r#"(>= "b" "a")"#));
        assert_eq!(Value::Bool(true), run("(= (list 1 2) (list 1 2))"));
        assert_eq!(Value::Bool(true), run("(= none missing)"));
        assert_eq!(Value::Bool(false), run("(<= none none)"));
        assert_eq!(Value::Bool(false), run("(>= (list 1) (list 1))"));
        assert_eq!(Value::Bool(true), run("(<= 1 1)"));
    }

    #[test]
    fn logical_forms_short_circuit() {
        let calls = Rc::new(Cell::new(0));
        let mut interpreter = interpreter();
        let counter = calls.clone();
        interpreter.define(
            "touch",
            Value::Function(Rc::new(NativeFunction::new("touch", move |_| {
                counter.set(counter.get() + 1);
                Ok(Value::Bool(true))
            }))),
        );
        let result = interpreter.run_source("(and false (touch))", "test").unwrap();
        assert_eq!(Value::Bool(false), result);
        let result = interpreter.run_source("(or 1 (touch))", "test").unwrap();
        assert_eq!(num(1f64), result);
        assert_eq!(0, calls.get());

        let result = interpreter.run_source("(and 1 (touch))", "test").unwrap();
        assert_eq!(Value::Bool(true), result);
        assert_eq!(1, calls.get());
    }

    #[test]
    fn if_branches() {
        assert_eq!(num(1f64), run("(if true 1 2)"));
        assert_eq!(num(2f64), run("(if 0 1 2)"));
        assert_eq!(Value::None, run("(if none 1)"));
    }

    #[test]
    fn while_loops_until_the_condition_fails() {
        // A braced body gets its own frame, so loop state is carried in a shared list
        let code = "
            (let state (list 0 0))
            (while (< (index state 0) 5) {
                (let (index state 1) (+ (index state 1) (index state 0)))
                (let (index state 0) (+ (index state 0) 1))
            })
            (index state 1)
        ";
        assert_eq!(num(10f64), run(code));
        assert_eq!(Value::None, run("(while false 1)"));
    }

    #[test]
    fn while_with_a_plain_body_rebinds_the_outer_frame() {
        let code = "
            (let i 0)
            (while (< i 3) (let i (+ i 1)))
            i
        ";
        assert_eq!(num(3f64), run(code));
    }

    #[test]
    fn functions_add() {
        let mut interpreter = interpreter();
        let result = interpreter
            .run_source("(let add (fn (a b) { + a b })) (add 2 3)", "test")
            .unwrap();
        assert_eq!(num(5f64), result);
        // Short on arguments: b reads as none and the fold gives NaN instead of failing
        let result = interpreter.run_source("(add 2)", "test").unwrap();
        assert!(matches!(result, Value::Number(n) if n.is_nan()));
        // Parameters don't outlive the call
        assert_eq!(Value::None, interpreter.lookup("a"));
        assert_eq!(1, interpreter.scope_depth());
    }

    #[test]
    fn extra_arguments_are_evaluated_and_dropped() {
        let code = "
            (let seen (list))
            (let id (fn (x) x))
            (id 1 (let (index seen 0) 2))
        ";
        assert_eq!(num(1f64), run(code));
        assert_eq!(num(2f64), run(&format!("{} (index seen 0)", code)));
    }

    #[test]
    fn recursive_factorial() {
        let code = "
            (let fact (fn (n) {
                (if (<= n 1) (return 1))
                (return (* n (fact (- n 1))))
            }))
            (list (fact 0) (fact 5))
        ";
        assert_eq!(Value::list(vec![num(1f64), num(120f64)]), run(code));
    }

    #[test]
    fn return_skips_the_rest_of_the_body() {
        let code = "
            (let log (list))
            (let f (fn () {
                (let (index log 0) 1)
                (return 2)
                (let (index log 1) 3)
            }))
            (list (f) log)
        ";
        assert_eq!(
            Value::list(vec![num(2f64), Value::list(vec![num(1f64)])]),
            run(code)
        );
    }

    #[test]
    fn implicit_return_is_the_last_statement() {
        let code = "
            (let f (fn (a) {
                (let b (+ a 1))
                (* b 2)
            }))
            (f 1)
        ";
        assert_eq!(num(4f64), run(code));
        assert_eq!(num(7f64), run("(let f (fn x (+ x 1))) (f 6)"));
        assert_eq!(Value::None, run("(let f (fn ())) (f)"));
    }

    #[test]
    fn return_inside_a_block_unwinds_its_frame() {
        let mut interpreter = interpreter();
        let code = "
            (let f (fn () {
                { { (return 1) } }
            }))
            (f)
        ";
        assert_eq!(num(1f64), interpreter.run_source(code, "test").unwrap());
        assert_eq!(1, interpreter.scope_depth());
    }

    #[test]
    fn top_level_return_ends_the_program() {
        let mut interpreter = interpreter();
        let result = interpreter
            .run_source("(let x 1) (return 2) (let x 3)", "test")
            .unwrap();
        assert_eq!(num(2f64), result);
        assert_eq!(num(1f64), interpreter.lookup("x"));
    }

    #[test]
    fn functions_see_the_callers_scope() {
        let code = "
            (let show (fn () y))
            (let wrap (fn (y) (show)))
            (wrap 7)
        ";
        assert_eq!(num(7f64), run(code));
    }

    #[test]
    fn unknown_forms_fail() {
        let result = interpreter().run_source("(frobnicate 1)", "test");
        assert!(matches!(result, Err(RuntimeError::UnknownForm(name)) if name == "frobnicate"));
        let result = interpreter().run_source("(let x 1) (x 2)", "test");
        assert!(matches!(result, Err(RuntimeError::UnknownForm(name)) if name == "x"));
        let result = interpreter().run_source("(5)", "test");
        assert!(matches!(result, Err(RuntimeError::UnknownForm(name)) if name == "5"));
    }

    #[test]
    fn stack_exposes_the_current_frame() {
        let value = run("(let a 1) { (let b 2) stack }");
        let Value::Map(map) = value else {
            panic!("expected a map");
        };
        assert_eq!(Some(&num(1f64)), map.get("a"));
        assert_eq!(Some(&num(2f64)), map.get("b"));
        assert_eq!(num(1f64), run(r#"(let a 1) (index stack "a")"#));
    }

    #[test]
    fn programs_are_statement_sequences() {
        assert_eq!(num(2f64), run("1 (let x 2) x"));
        assert_eq!(Value::string("hello"), run(r#""hello""#));
        let mut interpreter = interpreter();
        interpreter.run_source("(let x 4)", "test").unwrap();
        assert_eq!(num(4f64), interpreter.run_source("x", "test").unwrap());
        // Operators at the top level are just values, not a form
        assert_eq!(num(2f64), run("+ 1 2"));
    }

    #[test]
    fn self_containing_lists_are_rejected() {
        let code = "
            (let l (list 0))
            (let m (list 0))
            (list (let (index l 0) l) (let (index m 0) (list m)) (= l m) l)
        ";
        assert_eq!(
            Value::list(vec![
                Value::None,
                Value::None,
                Value::Bool(true),
                Value::list(vec![num(0f64)]),
            ]),
            run(code)
        );
    }

    #[test]
    fn huge_list_indexes_are_rejected() {
        assert_eq!(Value::list(vec![]), run("(let l (list)) (let (index l 1e300) 1) l"));
        assert_eq!(Value::None, run("(let l (list)) (let (index l 1e12) 1)"));
        assert_eq!(
            Value::list(vec![Value::None, num(1f64)]),
            run("(let l (list)) (let (index l 1) 1) l")
        );
    }

    #[test]
    fn computed_names() {
        assert_eq!(num(3f64), run(r#"(let (+ "a" "b") 3) ab"#));
    }

    #[test]
    fn parse_errors_are_reported() {
        let result = interpreter().run_source("(let x", "broken.qrk");
        assert!(matches!(result, Err(RuntimeError::Parse { origin, .. }) if origin == "broken.qrk"));
    }

    fn workspace() -> (TempDir, Interpreter) {
        let root = TempDir::new().unwrap();
        let config = InterpreterConfig::new(root.path()).with_library_dir(&root.path().join("libs"));
        let interpreter = Interpreter::new(config);
        (root, interpreter)
    }

    #[test]
    fn importing_twice_runs_the_module_twice() {
        let (root, mut interpreter) = workspace();
        fs::write(root.path().join("counter.qrk"), "(let count (+ count 1))").unwrap();
        let result = interpreter
            .run_source("(let count 0) (import counter) (import counter) count", "test")
            .unwrap();
        assert_eq!(num(2f64), result);
    }

    #[test]
    fn imported_bindings_are_visible_to_the_importer() {
        let (root, mut interpreter) = workspace();
        fs::create_dir_all(root.path().join("libs").join("math")).unwrap();
        fs::write(
            root.path().join("libs").join("math").join("ops.qrk"),
            "(let double (fn (x) (* x 2)))",
        )
        .unwrap();
        let result = interpreter
            .run_source("(import math:ops) (double 21)", "test")
            .unwrap();
        assert_eq!(num(42f64), result);
    }

    #[test]
    fn nested_imports_resolve_from_the_module_directory() {
        let (root, mut interpreter) = workspace();
        let pkg = root.path().join("libs").join("pkg");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("main.qrk"), "(import helper) (let from_main (+ from_helper 1))").unwrap();
        fs::write(pkg.join("helper.qrk"), "(let from_helper 1)").unwrap();
        let result = interpreter
            .run_source("(import pkg:main) from_main", "test")
            .unwrap();
        assert_eq!(num(2f64), result);
        assert_eq!(root.path(), interpreter.current_dir());
    }

    #[test]
    fn module_return_does_not_escape_into_the_importer() {
        let (root, mut interpreter) = workspace();
        fs::write(root.path().join("early.qrk"), "(let a 1) (return 5) (let a 2)").unwrap();
        let code = "
            (let f (fn () { (import early) (+ a 10) }))
            (f)
        ";
        assert_eq!(num(11f64), interpreter.run_source(code, "test").unwrap());
    }

    #[test]
    fn missing_modules_fail_the_run() {
        let (_root, mut interpreter) = workspace();
        let result = interpreter.run_source("(import nowhere) (let x 1)", "test");
        assert!(matches!(result, Err(RuntimeError::ModuleNotFound { specifier, .. }) if specifier == "nowhere"));
        assert_eq!(Value::None, interpreter.lookup("x"));
    }

    #[test]
    fn native_modules_register_into_the_current_frame() {
        let (_root, mut interpreter) = workspace();
        interpreter.register_module(
            "std:math",
            NativeModule::list(
                Some("math"),
                vec![NativeFunction::new("neg", |args| {
                    Ok(match args.first() {
                        Some(Value::Number(n)) => Value::Number(-n),
                        _ => Value::None,
                    })
                })],
            ),
        );
        interpreter.register_module(
            "answer",
            NativeModule::single(NativeFunction::new("answer", |_| Ok(Value::Number(42f64)))),
        );
        let result = interpreter
            .run_source("(import std:math) (import answer) (math:neg (answer))", "test")
            .unwrap();
        assert_eq!(num(-42f64), result);
    }

    #[test]
    fn scoped_native_imports_vanish_with_their_frame() {
        let (_root, mut interpreter) = workspace();
        interpreter.register_module(
            "std:math",
            NativeModule::list(Some("math"), vec![NativeFunction::new("one", |_| Ok(Value::Number(1f64)))]),
        );
        assert_eq!(
            num(1f64),
            interpreter.run_source("{ (import std:math) (math:one) }", "test").unwrap()
        );
        let result = interpreter.run_source("(math:one)", "test");
        assert!(matches!(result, Err(RuntimeError::UnknownForm(name)) if name == "math:one"));
    }

    #[test]
    fn native_failures_abort_the_run() {
        let mut interpreter = interpreter();
        interpreter.define(
            "fail",
            Value::Function(Rc::new(NativeFunction::new("fail", |_| {
                Err(RuntimeError::Native {
                    name: "fail".to_string(),
                    message: "boom".to_string(),
                })
            }))),
        );
        let result = interpreter.run_source("(fail) (let x 1)", "test");
        assert!(matches!(result, Err(RuntimeError::Native { message, .. }) if message == "boom"));
    }
}
