//! loxbc: a bytecode compiler and stack VM for Lox expressions.
//!
//! This is the library root that exports all modules.
//!
//! # Pipeline
//!
//! Source text is scanned lazily, compiled in a single pass straight to
//! bytecode, then executed by the stack VM:
//!
//! ```text
//! source -> Scanner -> Compiler -> Chunk -> VM -> Value
//! ```
//!
//! [`interpret`] runs the whole pipeline and writes results and diagnostics
//! to caller-supplied sinks. [`eval`] does the same but hands back the value
//! or a typed error.

pub mod bytecode;
pub mod config;
pub mod error;
pub mod lexer;
pub mod logging;
pub mod repl;
pub mod span;

use std::io::Write;

use bytecode::{compile_to_chunk, disassemble_chunk, Value, VM};
pub use config::Options;
use error::LoxError;

/// Outcome of interpreting one piece of source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

impl InterpretResult {
    /// Process exit code (sysexits: 65 data error, 70 internal software error).
    pub fn exit_code(self) -> i32 {
        match self {
            InterpretResult::Ok => 0,
            InterpretResult::CompileError => 65,
            InterpretResult::RuntimeError => 70,
        }
    }
}

/// A reusable interpreter: one VM plus the options it runs with.
///
/// Every call to [`Session::interpret`] compiles into a fresh chunk; nothing
/// but the options carries over between calls.
#[derive(Debug, Default)]
pub struct Session {
    vm: VM,
    options: Options,
    highlight_errors: bool,
}

impl Session {
    pub fn new(options: Options) -> Self {
        Self {
            vm: VM::new(),
            options,
            highlight_errors: false,
        }
    }

    /// Colour the `Error` tag of diagnostics (for terminal output).
    pub fn with_highlighted_errors(mut self, highlight: bool) -> Self {
        self.highlight_errors = highlight;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// Compile and run `source`.
    ///
    /// The returned value is printed to `out`, as are the bytecode dump and
    /// execution trace when enabled. Every diagnostic goes to `err`, one per
    /// line.
    pub fn interpret(
        &mut self,
        source: &str,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> InterpretResult {
        let chunk = match compile_to_chunk(source) {
            Ok(chunk) => chunk,
            Err(errors) => {
                for error in &errors {
                    self.diagnostic(err, &error.to_string());
                }
                return InterpretResult::CompileError;
            }
        };

        if self.options.print_code {
            emit(out, &disassemble_chunk(&chunk, "code"));
        }

        let result = if self.options.trace_execution {
            self.vm.run_with_trace(&chunk, out)
        } else {
            self.vm.run(&chunk)
        };

        match result {
            Ok(value) => {
                log::debug!("run finished with {}", value);
                emit(out, &format!("{}\n", value));
                InterpretResult::Ok
            }
            Err(error) => {
                log::debug!("run failed: {:?}", error);
                self.diagnostic(err, &error.to_string());
                error.result()
            }
        }
    }

    fn diagnostic(&self, err: &mut dyn Write, text: &str) {
        let line = if self.highlight_errors {
            error::highlight(text)
        } else {
            text.to_string()
        };
        emit(err, &format!("{}\n", line));
    }
}

/// Compile and run `source` with `options`, writing to the given sinks.
pub fn interpret(
    source: &str,
    options: &Options,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> InterpretResult {
    Session::new(*options).interpret(source, out, err)
}

/// Compile and run `source`, returning the value it evaluates to.
pub fn eval(source: &str) -> Result<Value, LoxError> {
    let chunk = compile_to_chunk(source)?;
    Ok(VM::new().run(&chunk)?)
}

/// Compile `source` and return its disassembly.
pub fn disassemble(source: &str) -> Result<String, LoxError> {
    let chunk = compile_to_chunk(source)?;
    Ok(disassemble_chunk(&chunk, "code"))
}

fn emit(sink: &mut dyn Write, text: &str) {
    if let Err(err) = sink.write_all(text.as_bytes()) {
        log::warn!("failed to write output: {}", err);
    }
}
