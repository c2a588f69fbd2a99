//! Knight CLI.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use knight_bc::Environment;
use knight_diagnostics::{Error, Result};
use knight_parser::lexer::tokenise;
use knight_vm::{print, Vm};

/// An interpreter for the Knight programming language.
#[derive(Debug, Parser)]
#[command(name = "knight")]
pub struct Args {
    /// Evaluate the given expression.
    #[arg(short = 'e', long = "expr", conflicts_with = "file")]
    expr: Option<String>,

    /// Read the program from a file.
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Print the assembled bytecode before running.
    #[arg(long)]
    debug: bool,

    /// Report how long each pipeline stage took.
    #[arg(long)]
    time: bool,
}

fn main() -> ExitCode {
    // --help and --version exit cleanly; anything else malformed is an
    // ordinary error, status 1
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if err.use_stderr() => {
            println!("{err}");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            print!("{err}");
            return ExitCode::SUCCESS;
        }
    };

    let source = match read_source(&args) {
        Ok(source) => source,
        Err(err) => {
            println!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match entry(&args, &source) {
        Ok(status) => ExitCode::from(status as u8),
        Err(err) => {
            report(&source, &err);
            ExitCode::FAILURE
        }
    }
}

fn read_source(args: &Args) -> Result<String> {
    if let Some(expr) = &args.expr {
        return Ok(expr.clone());
    }
    let mut source = String::new();
    match &args.file {
        Some(path) => {
            source = std::fs::read_to_string(path)?;
        }
        None => {
            std::io::stdin().read_to_string(&mut source)?;
        }
    }
    Ok(source)
}

fn entry(args: &Args, source: &str) -> Result<i64> {
    let mut env = Environment::new();

    let start = Instant::now();
    let tokens = tokenise(source)?;
    let blocks = knight_parser::parse(&tokens, &mut env)?;
    let mut vm = Vm::new(&blocks, env)?;
    let assembled = Instant::now();

    if args.debug {
        print::print_bytecode(vm.code(), &mut std::io::stderr())?;
    }

    let status = vm.run()?;
    let finished = Instant::now();

    if args.time {
        eprintln!("assemble: {:?}", assembled - start);
        eprintln!("run:      {:?}", finished - assembled);
    }

    Ok(status)
}

/// Errors go to standard output, prefixed with `line:col` when the error
/// knows where it happened.
fn report(source: &str, err: &Error) {
    match err.span() {
        Some(span) => {
            let (line, col) = position(source, span.start);
            println!("{line}:{col}: {err}");
        }
        None => println!("{err}"),
    }
}

fn position(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (index, byte) in source.bytes().enumerate() {
        if index >= offset {
            break;
        }
        if byte == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::position;

    #[test]
    fn positions_are_one_based() {
        let source = "ab\ncd";
        assert_eq!(position(source, 0), (1, 1));
        assert_eq!(position(source, 1), (1, 2));
        assert_eq!(position(source, 3), (2, 1));
        assert_eq!(position(source, 4), (2, 2));
    }
}
