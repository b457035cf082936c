//! loxbc CLI: run a file, evaluate an expression, or start the REPL.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;

use loxbc::error::LoxError;
use loxbc::repl::Repl;
use loxbc::Session;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a source file
    Run { file: String },
    /// Evaluate a string
    Eval { code: String },
    /// Start the REPL
    Repl,
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    runtime: loxbc::Options,
}

fn print_usage() {
    eprintln!("loxbc {} - Lox bytecode interpreter", VERSION);
    eprintln!();
    eprintln!("Usage: loxbc [options] [path]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e <code>       Evaluate an expression and print the result");
    eprintln!("  --trace         Trace the stack and each instruction as it executes");
    eprintln!("  --print-code    Print the compiled bytecode before running it");
    eprintln!("  --version, -V   Print the version");
    eprintln!("  --help, -h      Show this help message");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LOXBC_TRACE, LOXBC_PRINT_CODE   Same as the flags when set to 1/true/yes/on");
    eprintln!("  LOXBC_LOG                       Log level (error, warn, info, debug, trace)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  loxbc                   Start interactive REPL");
    eprintln!("  loxbc expr.lox          Run a source file");
    eprintln!("  loxbc -e '(1 + 2) * 3'  Evaluate an expression");
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    print_usage();
    process::exit(64);
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut options = Options {
        command: Command::Repl,
        runtime: loxbc::Options::from_env(),
    };

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--version" | "-V" => {
                println!("loxbc {}", VERSION);
                process::exit(0);
            }
            "--trace" => options.runtime.trace_execution = true,
            "--print-code" => options.runtime.print_code = true,
            "-e" => {
                i += 1;
                if i >= args.len() {
                    usage_error("-e requires a code argument");
                }
                if !matches!(options.command, Command::Repl) {
                    usage_error("-e cannot be combined with a source file");
                }
                options.command = Command::Eval {
                    code: args[i].clone(),
                };
            }
            _ if arg.starts_with('-') => usage_error(&format!("Unknown option: {}", arg)),
            _ => {
                if !matches!(options.command, Command::Repl) {
                    usage_error("Only one source file can be specified");
                }
                options.command = Command::Run { file: arg.clone() };
            }
        }
        i += 1;
    }

    options
}

fn main() {
    loxbc::logging::init();
    let options = parse_args();

    let code = match &options.command {
        Command::Repl => run_repl(&options),
        Command::Run { file } => run_file(file, &options),
        Command::Eval { code } => run_source(code, &options),
    };

    process::exit(code);
}

fn run_file(path: &str, options: &Options) -> i32 {
    match fs::read_to_string(path) {
        Ok(source) => run_source(&source, options),
        Err(err) => {
            let err = LoxError::from(err);
            log::debug!("reading {}: {}", path, err);
            eprintln!("Could not open file \"{}\".", path);
            err.exit_code()
        }
    }
}

fn run_source(source: &str, options: &Options) -> i32 {
    let mut session = Session::new(options.runtime).with_highlighted_errors(true);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut err = io::stderr();

    let result = session.interpret(source, &mut out, &mut err);
    if let Err(e) = out.flush() {
        log::warn!("failed to flush stdout: {}", e);
    }
    result.exit_code()
}

fn run_repl(options: &Options) -> i32 {
    match Repl::new(options.runtime).run() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {}", err);
            74
        }
    }
}
