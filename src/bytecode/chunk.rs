//! Bytecode chunk containing instructions and constants.

use crate::bytecode::instruction::OpCode;
use crate::bytecode::value::Value;

/// Constant indices are encoded in a single operand byte.
pub const MAX_CONSTANTS: usize = u8::MAX as usize + 1;

/// A chunk of bytecode containing instructions and metadata.
///
/// Chunks are append-only: bytes and constants can be added but never
/// removed or rewritten. `code` and `lines` always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    /// The bytecode instructions: opcode bytes interleaved with operands.
    code: Vec<u8>,
    /// The constant pool.
    constants: Vec<Value>,
    /// Source line for every byte in `code`.
    lines: Vec<u32>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an opcode to the chunk.
    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write_byte(op as u8, line);
    }

    /// Write a raw byte to the chunk.
    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Add a constant to the pool and return its index.
    ///
    /// Constants are not deduplicated and the pool itself is unbounded;
    /// callers that encode the index in a single byte must check it against
    /// [`MAX_CONSTANTS`].
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    pub fn constant(&self, index: u8) -> Option<Value> {
        self.constants.get(index as usize).copied()
    }

    /// Get the line number at a given offset.
    pub fn get_line(&self, offset: usize) -> u32 {
        self.lines.get(offset).copied().unwrap_or(0)
    }

    /// Number of bytes of code.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_chunk_basics() {
        let mut chunk = Chunk::new();
        let idx = chunk.add_constant(Value::Number(1.2));
        chunk.write_op(OpCode::Constant, 1);
        chunk.write_byte(idx as u8, 1);
        chunk.write_op(OpCode::Return, 2);

        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk.code()[0], OpCode::Constant as u8);
        assert_eq!(chunk.code()[1], 0);
        assert_eq!(chunk.code()[2], OpCode::Return as u8);
        assert_eq!(chunk.lines(), &[1, 1, 2]);
    }

    #[test]
    fn test_lines_track_code() {
        let mut chunk = Chunk::new();
        for line in 1..=10 {
            chunk.write_op(OpCode::Nil, line);
            assert_eq!(chunk.code().len(), chunk.lines().len());
        }
        assert_eq!(chunk.get_line(4), 5);
        assert_eq!(chunk.get_line(100), 0);
    }

    #[test]
    fn test_constant_pool_is_not_deduplicated() {
        let mut chunk = Chunk::new();
        let idx1 = chunk.add_constant(Value::Number(42.0));
        let idx2 = chunk.add_constant(Value::Number(42.0));
        let idx3 = chunk.add_constant(Value::Bool(true));

        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(idx3, 2);
        assert_eq!(chunk.constant(2), Some(Value::Bool(true)));
        assert_eq!(chunk.constant(3), None);
    }
}
