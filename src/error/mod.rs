//! Error types for all compilation phases.
//!
//! Every diagnostic renders as `[line <n>] Error<location>: <message>`.

use std::fmt;

use colored::Colorize;
use thiserror::Error;

use crate::InterpretResult;

/// Lexer errors. These travel inside `TokenKind::Error` rather than being
/// returned from the scanner.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character.")]
    UnexpectedChar(char),

    #[error("Unterminated string.")]
    UnterminatedString,

    #[error("Unterminated block comment.")]
    UnterminatedComment,
}

/// Where in the source a compile error points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// The offending token is the end of input.
    End,
    /// The offending token's lexeme.
    Lexeme(String),
    /// The offending token was itself a lexical error.
    Unlocated,
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLocation::End => write!(f, " at end"),
            ErrorLocation::Lexeme(text) => write!(f, " at '{}'", text),
            ErrorLocation::Unlocated => Ok(()),
        }
    }
}

/// Bytecode compilation errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("[line {line}] Error{location}: {message}")]
    Syntax {
        message: String,
        location: ErrorLocation,
        line: u32,
    },

    #[error("[line {line}] Error{location}: Too many constants in one chunk.")]
    TooManyConstants { location: ErrorLocation, line: u32 },

    #[error("[line {line}] Error: {error}")]
    Lexical { error: LexError, line: u32 },
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, location: ErrorLocation, line: u32) -> Self {
        Self::Syntax {
            message: message.into(),
            location,
            line,
        }
    }
}

/// What went wrong while executing a chunk.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    #[error("Operands must be number.")]
    OperandsMustBeNumbers,

    #[error("Operand must be a number.")]
    OperandMustBeNumber,

    #[error("Stack overflow.")]
    StackOverflow,

    #[error("Stack underflow.")]
    StackUnderflow,

    #[error("Unknown opcode {0}.")]
    InvalidOpcode(u8),

    #[error("Invalid constant index {0}.")]
    InvalidConstant(u8),

    #[error("Unexpected end of bytecode.")]
    UnexpectedEnd,
}

/// Runtime errors, tagged with the source line of the failing instruction.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("[line {line}] Error: {kind}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: u32,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, line: u32) -> Self {
        Self { kind, line }
    }

    /// How the failure is classified at the interpreter boundary. An unknown
    /// opcode means the chunk itself is malformed, which is a compile-side
    /// fault.
    pub fn result(&self) -> InterpretResult {
        match self.kind {
            RuntimeErrorKind::InvalidOpcode(_) => InterpretResult::CompileError,
            _ => InterpretResult::RuntimeError,
        }
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum LoxError {
    /// Compilation failed. Holds every diagnostic that was reported.
    #[error("{}", join_lines(.0))]
    Compile(Vec<CompileError>),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoxError {
    /// Process exit code for this failure (sysexits: 65 data, 70 software,
    /// 74 I/O).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Compile(_) => InterpretResult::CompileError.exit_code(),
            Self::Runtime(err) => err.result().exit_code(),
            Self::Io(_) => 74,
        }
    }
}

impl From<Vec<CompileError>> for LoxError {
    fn from(errors: Vec<CompileError>) -> Self {
        Self::Compile(errors)
    }
}

impl From<CompileError> for LoxError {
    fn from(error: CompileError) -> Self {
        Self::Compile(vec![error])
    }
}

/// Colour the `Error` tag of a rendered diagnostic for terminal output.
/// Text that is not a diagnostic is returned unchanged.
pub fn highlight(diagnostic: &str) -> String {
    match diagnostic.split_once("] Error") {
        Some((prefix, rest)) => format!("{}] {}{}", prefix, "Error".red().bold(), rest),
        None => diagnostic.to_string(),
    }
}

fn join_lines(errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
