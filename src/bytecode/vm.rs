//! Stack-based virtual machine for executing bytecode.

use std::io::Write;

use crate::bytecode::chunk::Chunk;
use crate::bytecode::disassembler::disassemble_instruction;
use crate::bytecode::instruction::OpCode;
use crate::bytecode::value::Value;
use crate::error::{RuntimeError, RuntimeErrorKind};

/// Maximum stack size.
pub const STACK_MAX: usize = 256;

/// Result type for VM operations.
pub type VMResult<T> = Result<T, RuntimeError>;

/// Result of a single instruction, before a line is attached to any error.
type StepResult<T> = Result<T, RuntimeErrorKind>;

/// The bytecode virtual machine.
///
/// A VM can run any number of chunks one after another. The stack is
/// emptied at the end of every run, whether it succeeded or not.
#[derive(Debug)]
pub struct VM {
    stack: Vec<Value>,
    ip: usize,
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl VM {
    pub fn new() -> Self {
        Self {
            stack: Vec::with_capacity(STACK_MAX),
            ip: 0,
        }
    }

    /// The current value stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Execute `chunk` until `RETURN` and hand back the returned value.
    pub fn run(&mut self, chunk: &Chunk) -> VMResult<Value> {
        self.execute(chunk, None)
    }

    /// Like [`VM::run`], writing the stack and each instruction to `trace`
    /// before it executes.
    pub fn run_with_trace(&mut self, chunk: &Chunk, trace: &mut dyn Write) -> VMResult<Value> {
        self.execute(chunk, Some(trace))
    }

    fn execute(&mut self, chunk: &Chunk, trace: Option<&mut dyn Write>) -> VMResult<Value> {
        self.ip = 0;
        let result = self.dispatch(chunk, trace);
        self.reset_stack();
        result
    }

    /// Main execution loop.
    fn dispatch(&mut self, chunk: &Chunk, mut trace: Option<&mut dyn Write>) -> VMResult<Value> {
        loop {
            let start = self.ip;
            if let Some(out) = trace.as_deref_mut() {
                self.trace_instruction(chunk, out);
            }

            match self.step(chunk) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(kind) => {
                    let line = line_at(chunk, start);
                    log::debug!("runtime error at offset {}: {}", start, kind);
                    return Err(RuntimeError::new(kind, line));
                }
            }
        }
    }

    /// Decode and execute one instruction. `Some` means the chunk returned.
    fn step(&mut self, chunk: &Chunk) -> StepResult<Option<Value>> {
        let byte = self.read_byte(chunk)?;
        let opcode = OpCode::from_u8(byte).ok_or(RuntimeErrorKind::InvalidOpcode(byte))?;

        match opcode {
            OpCode::Constant => {
                let index = self.read_byte(chunk)?;
                let value = chunk
                    .constant(index)
                    .ok_or(RuntimeErrorKind::InvalidConstant(index))?;
                self.push(value)?;
            }

            OpCode::Nil => self.push(Value::Nil)?,
            OpCode::True => self.push(Value::Bool(true))?,
            OpCode::False => self.push(Value::Bool(false))?,

            OpCode::Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Bool(a == b))?;
            }

            OpCode::Greater => self.comparison_op(|a, b| a > b)?,
            OpCode::Less => self.comparison_op(|a, b| a < b)?,

            OpCode::Add => self.arithmetic_op(|a, b| a + b)?,
            OpCode::Subtract => self.arithmetic_op(|a, b| a - b)?,
            OpCode::Multiply => self.arithmetic_op(|a, b| a * b)?,
            // IEEE semantics: x/0 is ±inf, 0/0 is NaN
            OpCode::Divide => self.arithmetic_op(|a, b| a / b)?,

            OpCode::Not => {
                let value = self.pop()?;
                self.push(Value::Bool(value.is_falsey()))?;
            }

            OpCode::Negate => {
                let n = self
                    .peek(0)?
                    .as_number()
                    .ok_or(RuntimeErrorKind::OperandMustBeNumber)?;
                self.pop()?;
                self.push(Value::Number(-n))?;
            }

            OpCode::Return => return Ok(Some(self.pop()?)),
        }

        Ok(None)
    }

    // --- Decoding ---

    fn read_byte(&mut self, chunk: &Chunk) -> StepResult<u8> {
        let byte = *chunk
            .code()
            .get(self.ip)
            .ok_or(RuntimeErrorKind::UnexpectedEnd)?;
        self.ip += 1;
        Ok(byte)
    }

    // --- Stack ---

    fn push(&mut self, value: Value) -> StepResult<()> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeErrorKind::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> StepResult<Value> {
        self.stack.pop().ok_or(RuntimeErrorKind::StackUnderflow)
    }

    fn peek(&self, distance: usize) -> StepResult<Value> {
        let index = self
            .stack
            .len()
            .checked_sub(1 + distance)
            .ok_or(RuntimeErrorKind::StackUnderflow)?;
        Ok(self.stack[index])
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
    }

    // --- Operators ---

    /// Pop two numeric operands, left operand first in the result. Both are
    /// type-checked before either is popped.
    fn number_operands(&mut self) -> StepResult<(f64, f64)> {
        let b = self.peek(0)?.as_number();
        let a = self.peek(1)?.as_number();
        let (Some(a), Some(b)) = (a, b) else {
            return Err(RuntimeErrorKind::OperandsMustBeNumbers);
        };
        self.pop()?;
        self.pop()?;
        Ok((a, b))
    }

    fn arithmetic_op<F>(&mut self, op: F) -> StepResult<()>
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let (a, b) = self.number_operands()?;
        self.push(Value::Number(op(a, b)))
    }

    fn comparison_op<F>(&mut self, op: F) -> StepResult<()>
    where
        F: FnOnce(f64, f64) -> bool,
    {
        let (a, b) = self.number_operands()?;
        self.push(Value::Bool(op(a, b)))
    }

    // --- Tracing ---

    fn trace_instruction(&self, chunk: &Chunk, out: &mut dyn Write) {
        let mut text = String::from("          ");
        for value in &self.stack {
            text.push_str(&format!("[ {} ]", value));
        }
        text.push('\n');
        disassemble_instruction(chunk, self.ip, &mut text);

        if let Err(err) = out.write_all(text.as_bytes()) {
            log::warn!("failed to write execution trace: {}", err);
        }
    }
}

/// Source line for the instruction at `offset`. Offsets past the end map to
/// the last line of the chunk.
fn line_at(chunk: &Chunk, offset: usize) -> u32 {
    chunk
        .lines()
        .get(offset)
        .or_else(|| chunk.lines().last())
        .copied()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::compile_to_chunk;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> VMResult<Value> {
        let chunk = compile_to_chunk(source).expect("compiles");
        VM::new().run(&chunk)
    }

    fn run_err(source: &str) -> RuntimeError {
        run(source).expect_err("runtime error")
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("1 + 2").unwrap(), Value::Number(3.0));
        assert_eq!(run("10 - 2 - 3").unwrap(), Value::Number(5.0));
        assert_eq!(run("(-1 + 2) * 3 - -4").unwrap(), Value::Number(7.0));
        assert_eq!(run("8 / 4 / 2").unwrap(), Value::Number(1.0));
        assert_eq!(run("2 * (3 + 4)").unwrap(), Value::Number(14.0));
    }

    #[test]
    fn test_division_by_zero_follows_ieee() {
        assert_eq!(run("1 / 0").unwrap(), Value::Number(f64::INFINITY));
        assert_eq!(run("-1 / 0").unwrap(), Value::Number(f64::NEG_INFINITY));
        let nan = run("0 / 0").unwrap().as_number().unwrap();
        assert!(nan.is_nan());
    }

    #[test]
    fn test_literals_and_not() {
        assert_eq!(run("nil").unwrap(), Value::Nil);
        assert_eq!(run("!nil").unwrap(), Value::Bool(true));
        assert_eq!(run("!false").unwrap(), Value::Bool(true));
        assert_eq!(run("!0").unwrap(), Value::Bool(false));
        assert_eq!(run("!!true").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_equality() {
        assert_eq!(run("1 == 1").unwrap(), Value::Bool(true));
        assert_eq!(run("nil == nil").unwrap(), Value::Bool(true));
        assert_eq!(run("nil == false").unwrap(), Value::Bool(false));
        assert_eq!(run("1 == true").unwrap(), Value::Bool(false));
        assert_eq!(run("1 != 2").unwrap(), Value::Bool(true));
        assert_eq!(run("(0 / 0) == (0 / 0)").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_comparison() {
        assert_eq!(run("1 < 2").unwrap(), Value::Bool(true));
        assert_eq!(run("2 > 2").unwrap(), Value::Bool(false));
        assert_eq!(run("2 >= 2").unwrap(), Value::Bool(true));
        assert_eq!(run("1 <= 0").unwrap(), Value::Bool(false));
        assert_eq!(run("!(5 - 4 > 3 * 2 == !nil)").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_negate_requires_number() {
        let err = run_err("-true");
        assert_eq!(err.kind, RuntimeErrorKind::OperandMustBeNumber);
        assert_eq!(err.to_string(), "[line 1] Error: Operand must be a number.");
    }

    #[test]
    fn test_binary_requires_numbers() {
        assert_eq!(
            run_err("true < 1").kind,
            RuntimeErrorKind::OperandsMustBeNumbers
        );
        let err = run_err("1 +\nnil");
        assert_eq!(err.to_string(), "[line 2] Error: Operands must be number.");
    }

    #[test]
    fn test_stack_is_empty_after_success_and_failure() {
        let mut vm = VM::new();
        let chunk = compile_to_chunk("1 + 2 * 3").unwrap();
        vm.run(&chunk).unwrap();
        assert!(vm.stack().is_empty());

        let chunk = compile_to_chunk("1 + (2 * false)").unwrap();
        assert!(vm.run(&chunk).is_err());
        assert!(vm.stack().is_empty());

        // Still usable afterwards
        let chunk = compile_to_chunk("4").unwrap();
        assert_eq!(vm.run(&chunk).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn test_invalid_opcode() {
        let mut chunk = Chunk::new();
        chunk.write_byte(0xEE, 3);
        let err = VM::new().run(&chunk).unwrap_err();
        assert_eq!(err, RuntimeError::new(RuntimeErrorKind::InvalidOpcode(0xEE), 3));
    }

    #[test]
    fn test_running_off_the_end() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 1);
        let err = VM::new().run(&chunk).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::UnexpectedEnd);
        assert_eq!(err.line, 1);

        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Constant, 2);
        let err = VM::new().run(&chunk).unwrap_err();
        assert_eq!(err, RuntimeError::new(RuntimeErrorKind::UnexpectedEnd, 2));

        let err = VM::new().run(&Chunk::new()).unwrap_err();
        assert_eq!(err, RuntimeError::new(RuntimeErrorKind::UnexpectedEnd, 0));
    }

    #[test]
    fn test_invalid_constant_index() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write_byte(5, 1);
        let err = VM::new().run(&chunk).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::InvalidConstant(5));
    }

    #[test]
    fn test_stack_overflow() {
        let mut chunk = Chunk::new();
        for _ in 0..=STACK_MAX {
            chunk.write_op(OpCode::Nil, 1);
        }
        chunk.write_op(OpCode::Return, 1);
        let mut vm = VM::new();
        let err = vm.run(&chunk).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::StackOverflow);
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn test_stack_underflow() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Add, 1);
        let err = VM::new().run(&chunk).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::StackUnderflow);

        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Return, 1);
        let err = VM::new().run(&chunk).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::StackUnderflow);
    }

    #[test]
    fn test_every_opcode_executes() {
        for op in OpCode::ALL {
            let mut chunk = Chunk::new();
            let one = chunk.add_constant(Value::Number(1.0)) as u8;
            let two = chunk.add_constant(Value::Number(2.0)) as u8;
            chunk.write_op(OpCode::Constant, 1);
            chunk.write_byte(one, 1);
            chunk.write_op(OpCode::Constant, 1);
            chunk.write_byte(two, 1);
            chunk.write_op(op, 1);
            if op == OpCode::Constant {
                chunk.write_byte(one, 1);
            }
            if op != OpCode::Return {
                chunk.write_op(OpCode::Return, 1);
            }
            let result = VM::new().run(&chunk);
            assert!(result.is_ok(), "{}: {:?}", op, result);
        }
    }

    #[test]
    fn test_trace_output() {
        let chunk = compile_to_chunk("1").unwrap();
        let mut out = Vec::new();
        let value = VM::new().run_with_trace(&chunk, &mut out).unwrap();
        assert_eq!(value, Value::Number(1.0));
        let expected = [
            "          ",
            "0000    1 OP_CONSTANT         0 '1'",
            "          [ 1 ]",
            "0002    | OP_RETURN",
        ];
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), expected);
    }
}
