//! Bytecode disassembler for debugging.

use crate::bytecode::chunk::Chunk;
use crate::bytecode::instruction::OpCode;

/// Disassemble a whole chunk under a `== name ==` header.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut output = format!("== {} ==\n", name);
    let mut offset = 0;

    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset, &mut output);
    }

    output
}

/// Disassemble a single instruction, returning the offset of the next one.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, output: &mut String) -> usize {
    output.push_str(&format!("{:04} ", offset));

    // Print line number (or | if same as previous)
    let line = chunk.get_line(offset);
    if offset > 0 && line == chunk.get_line(offset - 1) {
        output.push_str("   | ");
    } else {
        output.push_str(&format!("{:4} ", line));
    }

    let Some(&byte) = chunk.code().get(offset) else {
        output.push_str("<end of chunk>\n");
        return offset + 1;
    };
    let Some(opcode) = OpCode::from_u8(byte) else {
        output.push_str(&format!("Unknown opcode {}\n", byte));
        return offset + 1;
    };

    match opcode {
        OpCode::Constant => constant_instruction(opcode, chunk, offset, output),

        OpCode::Nil
        | OpCode::True
        | OpCode::False
        | OpCode::Equal
        | OpCode::Greater
        | OpCode::Less
        | OpCode::Add
        | OpCode::Subtract
        | OpCode::Multiply
        | OpCode::Divide
        | OpCode::Not
        | OpCode::Negate
        | OpCode::Return => simple_instruction(opcode, offset, output),
    }
}

fn simple_instruction(opcode: OpCode, offset: usize, output: &mut String) -> usize {
    output.push_str(opcode.name());
    output.push('\n');
    offset + 1
}

fn constant_instruction(opcode: OpCode, chunk: &Chunk, offset: usize, output: &mut String) -> usize {
    let Some(&index) = chunk.code().get(offset + 1) else {
        output.push_str(&format!("{} <missing operand>\n", opcode.name()));
        return offset + 1;
    };
    let value = match chunk.constant(index) {
        Some(value) => value.to_string(),
        None => "???".to_string(),
    };
    output.push_str(&format!("{:<16} {:4} '{}'\n", opcode.name(), index, value));
    offset + 1 + opcode.operand_size()
}
