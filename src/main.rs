use std::env;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use ore::runtime::{stdlib, Interpreter};
use ore::{parser, scanner};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let result = match args.len() {
        0 => run_prompt(),
        1 => run_file(&args[0]),
        _ => {
            eprintln!("Usage: ore [script]");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_file(path: &str) -> Result<()> {
    let source = fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
    let tokens = scanner::scan_tokens(&source)?;
    let program = parser::parse(&tokens)?;

    let mut output = io::stdout();
    let mut interpreter = Interpreter::new(&mut output);
    stdlib::install_prelude(&mut interpreter);

    match interpreter.run(&program) {
        Ok(_) => Ok(()),
        Err(uncaught) => bail!("{uncaught}"),
    }
}

fn run_prompt() -> Result<()> {
    println!("Welcome to the Ore interactive prompt.");

    let mut output = io::stdout();
    let mut interpreter = Interpreter::new(&mut output);
    stdlib::install_prelude(&mut interpreter);

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        buffer.clear();
        if stdin.read_line(&mut buffer)? == 0 {
            return Ok(());
        }

        // the prompt keeps its interpreter, so bindings persist across lines
        match run_line(&mut interpreter, &buffer) {
            Ok(rendered) => println!("{rendered}"),
            Err(error) => eprintln!("{error}"),
        }
    }
}

fn run_line(interpreter: &mut Interpreter, code: &str) -> ore::error::GenericResult<String> {
    let tokens = scanner::scan_tokens(code)?;
    let program = parser::parse(&tokens)?;
    let value = interpreter.run(&program)?;
    Ok(value.display(interpreter.heap()))
}
