//! Rune interpreter command-line.
//!
//! `rune <command> <file.rn>` where command is one of `tokenize`,
//! `evaluate`, `run` or `version`. Static faults exit with 65, evaluation
//! faults with 70, usage mistakes with 1.

use std::fs;
use std::io;
use std::process;

use anyhow::Context;

use rune::interpreter::{Interpreter, RuneError};
use rune::scanner;

const VERSION: &str = "0.1";

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PARSE_ERROR: i32 = 65;
const EXIT_EVAL_ERROR: i32 = 70;

const RUNE_EXTENSION: &str = ".rn";

fn main() {
    env_logger::init();
    process::exit(dispatch());
}

fn dispatch() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let Some(command) = args.first() else {
        return usage();
    };

    if command == "version" {
        println!("Rune Interpreter v{}", VERSION);
        return EXIT_OK;
    }

    let Some(file_name) = args.get(1) else {
        return usage();
    };

    if !file_name.ends_with(RUNE_EXTENSION) {
        eprintln!(
            "Error: Only .rn files are supported. Provided file: {}",
            file_name
        );
        return EXIT_ERROR;
    }

    let source = match fs::read_to_string(file_name)
        .with_context(|| format!("failed to read {}", file_name))
    {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error reading file: {:#}", err);
            return EXIT_ERROR;
        }
    };

    match command.as_str() {
        "tokenize" => tokenize(&source),
        "evaluate" => evaluate(&source),
        "run" => run(&source),
        _ => {
            eprintln!("Unknown command: {}", command);
            usage()
        }
    }
}

fn usage() -> i32 {
    eprintln!("Rune Interpreter v{}", VERSION);
    eprintln!("A tree-walking interpreter for the Rune scripting language.");
    eprintln!();
    eprintln!("Usage: rune <command> <filename>");
    eprintln!("Commands:");
    eprintln!("  tokenize  - Tokenizes the input file");
    eprintln!("  evaluate  - Evaluates a single expression from the input file");
    eprintln!("  run       - Runs the program from the input file");
    eprintln!("  version   - Prints the version of the interpreter");
    EXIT_ERROR
}

fn tokenize(source: &str) -> i32 {
    let (tokens, errors) = scanner::scan(source);
    for token in &tokens {
        println!("{}", token);
    }

    if errors.is_empty() {
        return EXIT_OK;
    }
    for err in &errors {
        eprintln!("{}", err);
    }
    EXIT_PARSE_ERROR
}

fn evaluate(source: &str) -> i32 {
    let mut stdout = io::stdout();
    let mut interp = Interpreter::new(&mut stdout);
    match interp.evaluate(source) {
        Ok(value) => {
            println!("{}", value.to_literal_string());
            EXIT_OK
        }
        Err(err) => report(err),
    }
}

fn run(source: &str) -> i32 {
    let mut stdout = io::stdout();
    let mut interp = Interpreter::new(&mut stdout);
    match interp.run(source) {
        Ok(()) => EXIT_OK,
        Err(err) => report(err),
    }
}

fn report(err: RuneError) -> i32 {
    eprintln!("{}", err);
    match err {
        RuneError::Runtime(_) => EXIT_EVAL_ERROR,
        RuneError::Lex(_) | RuneError::Syntax(_) => EXIT_PARSE_ERROR,
    }
}
