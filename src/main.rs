use std::fs;
use std::io::prelude::*;
use std::io::{stdin, stdout, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quark::interpreter::{stock_interpreter, Interpreter, InterpreterConfig, Value, LIBDIR_VAR};
use quark::parser::{parse, WriteErrorReporter};
use quark::scanner::Scanner;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Script to run, starts a prompt when omitted
    script: Option<PathBuf>,

    /// Library directory searched last for imports
    #[arg(long, env = LIBDIR_VAR)]
    lib_dir: Option<PathBuf>,

    /// Top-level working directory, defaults to the current directory
    #[arg(long)]
    working_dir: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let working_dir = match cli.working_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Unable to determine the working directory")?,
    };
    let mut config = InterpreterConfig::new(&working_dir);
    if let Some(lib_dir) = cli.lib_dir.as_deref() {
        config = config.with_library_dir(lib_dir);
    }

    match cli.script {
        Some(script_path) => run_file(config, &script_path),
        None => run_prompt(stock_interpreter(config)),
    }
}

fn run_file(config: InterpreterConfig, script_path: &Path) -> Result<()> {
    let script = fs::read_to_string(script_path)
        .with_context(|| format!("Unable to read script file {}", script_path.display()))?;
    let import_folder = script_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.working_dir.clone());
    let mut interpreter = stock_interpreter(config.with_import_folder(&import_folder));

    let mut stderr = std::io::stderr().lock();
    let mut reporter = WriteErrorReporter::new(&mut stderr);
    let program = match parse(&mut reporter, Scanner::new(&script)) {
        Ok(program) => program,
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(65);
        }
    };
    interpreter
        .interpret(&program)
        .with_context(|| format!("Error running {}", script_path.display()))?;
    Ok(())
}

fn run_prompt(mut interpreter: Interpreter) -> Result<()> {
    let stdin = stdin().lock();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();
    loop {
        {
            let mut stdout = stdout().lock();
            stdout.write_all("> ".as_bytes())?;
            stdout.flush()?;
        }
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        run_line(&mut interpreter, &line);
        // Don't keep appending code until the next time
        line.clear();
    }
    Ok(())
}

fn run_line(interpreter: &mut Interpreter, code: &str) {
    let mut stderr = std::io::stderr().lock();
    let mut reporter = WriteErrorReporter::new(&mut stderr);

    match parse(&mut reporter, Scanner::new(code)) {
        Ok(program) => {
            match interpreter.interpret(&program) {
                Ok(Value::None) => {}
                Ok(v) => println!("{}", v),
                Err(e) => eprintln!("{}", e),
            }
        }
        Err(error) => {
            eprintln!("{}", error)
        }
    };
}
