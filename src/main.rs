use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;

use lexel::{evaluate, Context, Registry, Value};

/// lexel is an embeddable expression language; this binary evaluates
/// expressions from the command line or runs a small interactive prompt
/// against a persistent context.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Evaluate the contents of a file instead of an inline expression.
    #[arg(short, long)]
    file: bool,

    /// Expression to evaluate (or a path with --file). Omit to start the
    /// interactive prompt.
    contents: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let registry = Registry::new();
    let ctx = Context::new();

    if let Some(contents) = args.contents {
        let source = if args.file {
            match fs::read_to_string(&contents) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("failed to read '{}': {}", contents, e);
                    return ExitCode::FAILURE;
                }
            }
        } else {
            contents
        };
        return match evaluate(&source, &ctx, &registry) {
            Ok(result) => {
                println!("{}", result);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    repl(&ctx, &registry)
}

fn repl(ctx: &Context, registry: &Registry) -> ExitCode {
    println!("lexel {}", env!("CARGO_PKG_VERSION"));
    println!("Type CTRL-C or 'quit' to exit");

    let stdin = io::stdin();
    loop {
        print!("lexel> ");
        if io::stdout().flush().is_err() {
            return ExitCode::FAILURE;
        }
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            return ExitCode::SUCCESS;
        }
        match evaluate(line, ctx, registry) {
            Ok(result) => print_result(&result),
            Err(e) => println!("{}", e),
        }
    }
}

fn print_result(result: &Value) {
    println!("Result: {} {}", result.type_name(), result);
}
