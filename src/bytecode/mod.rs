//! Bytecode compiler and virtual machine.
//!
//! # Architecture
//!
//! - `value`: runtime values (`nil`, booleans, numbers)
//! - `instruction`: OpCode definitions for the bytecode instruction set
//! - `chunk`: Bytecode chunks containing instructions, line table and constant pool
//! - `compiler`: Single-pass Pratt compiler from source text straight to bytecode
//! - `vm`: Stack-based virtual machine for executing bytecode
//! - `disassembler`: Debug output for bytecode inspection

pub mod chunk;
pub mod compiler;
pub mod disassembler;
pub mod instruction;
pub mod value;
pub mod vm;

pub use chunk::Chunk;
pub use compiler::{compile, compile_to_chunk, Compiler};
pub use disassembler::{disassemble_chunk, disassemble_instruction};
pub use instruction::OpCode;
pub use value::Value;
pub use vm::VM;
