//! Single-pass Pratt compiler: tokens in, bytecode out.
//!
//! There is no syntax tree. The compiler pulls tokens from the [`Scanner`]
//! one at a time, keeping only the `previous` and `current` token, and emits
//! instructions into a [`Chunk`] as soon as it knows what they are.
//!
//! Parsing is driven by [`get_rule`], which maps each token kind to an
//! optional prefix action, an optional infix action and the precedence the
//! token binds with when it appears in infix position.
//!
//! # Error recovery
//!
//! The first error sets both `had_error` (sticky) and `panic_mode`. While in
//! panic mode every further diagnostic is dropped. A lone expression has no
//! statement boundary to resynchronise at, so panic mode is never cleared
//! and a failed compile reports exactly one error.

use crate::bytecode::chunk::{Chunk, MAX_CONSTANTS};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::value::Value;
use crate::error::{CompileError, ErrorLocation};
use crate::lexer::{Scanner, Token, TokenKind};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, Vec<CompileError>>;

/// Deepest allowed nesting of `parse_precedence` calls (groupings and
/// prefix operators).
pub const MAX_NESTING: usize = 512;

/// Binding power of an operator, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    /// One level tighter. Binary operators parse their right operand at
    /// `next()` so that equal-precedence operators associate to the left.
    pub fn next(self) -> Self {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

/// A parse action. Dispatched by [`Compiler::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFn {
    Grouping,
    Unary,
    Binary,
    Number,
    Literal,
}

/// One row of the parse table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseRule {
    pub prefix: Option<ParseFn>,
    pub infix: Option<ParseFn>,
    pub precedence: Precedence,
}

impl ParseRule {
    const fn new(prefix: Option<ParseFn>, infix: Option<ParseFn>, precedence: Precedence) -> Self {
        Self {
            prefix,
            infix,
            precedence,
        }
    }
}

const NO_RULE: ParseRule = ParseRule::new(None, None, Precedence::None);

/// The parse table, keyed by token kind.
pub fn get_rule(kind: TokenKind) -> ParseRule {
    use ParseFn::*;

    match kind {
        TokenKind::LeftParen => ParseRule::new(Some(Grouping), None, Precedence::None),
        TokenKind::Minus => ParseRule::new(Some(Unary), Some(Binary), Precedence::Term),
        TokenKind::Plus => ParseRule::new(None, Some(Binary), Precedence::Term),
        TokenKind::Slash | TokenKind::Star => {
            ParseRule::new(None, Some(Binary), Precedence::Factor)
        }
        TokenKind::Bang => ParseRule::new(Some(Unary), None, Precedence::None),
        TokenKind::BangEqual | TokenKind::EqualEqual => {
            ParseRule::new(None, Some(Binary), Precedence::Equality)
        }
        TokenKind::Greater
        | TokenKind::GreaterEqual
        | TokenKind::Less
        | TokenKind::LessEqual => ParseRule::new(None, Some(Binary), Precedence::Comparison),
        TokenKind::Number => ParseRule::new(Some(Number), None, Precedence::None),
        TokenKind::False | TokenKind::Nil | TokenKind::True => {
            ParseRule::new(Some(Literal), None, Precedence::None)
        }
        _ => NO_RULE,
    }
}

/// Compile one expression from `source` into `chunk`.
///
/// On failure the chunk may hold partial bytecode and must not be executed.
pub fn compile(source: &str, chunk: &mut Chunk) -> CompileResult<()> {
    Compiler::new(source, chunk).compile()
}

/// Compile one expression into a fresh chunk.
pub fn compile_to_chunk(source: &str) -> CompileResult<Chunk> {
    let mut chunk = Chunk::new();
    compile(source, &mut chunk)?;
    Ok(chunk)
}

/// Parser and code generator state for a single compilation.
pub struct Compiler<'src, 'c> {
    scanner: Scanner<'src>,
    chunk: &'c mut Chunk,
    previous: Token,
    current: Token,
    had_error: bool,
    panic_mode: bool,
    errors: Vec<CompileError>,
    depth: usize,
}

impl<'src, 'c> Compiler<'src, 'c> {
    pub fn new(source: &'src str, chunk: &'c mut Chunk) -> Self {
        Self {
            scanner: Scanner::new(source),
            chunk,
            previous: Token::none(),
            current: Token::none(),
            had_error: false,
            panic_mode: false,
            errors: Vec::new(),
            depth: 0,
        }
    }

    /// Compile a full expression followed by end of input.
    pub fn compile(mut self) -> CompileResult<()> {
        self.advance();
        self.expression();
        self.consume(TokenKind::Eof, "Expect end of expression.");
        self.end_compiler();

        if self.had_error {
            return Err(self.errors);
        }
        log::debug!(
            "compiled {} bytes, {} constants",
            self.chunk.len(),
            self.chunk.constants().len()
        );
        Ok(())
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    // --- Token handling ---

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            log::trace!("token {} at {}", self.current.kind, self.current.span);
            let TokenKind::Error(error) = self.current.kind else {
                break;
            };
            let line = self.current.line();
            self.report(CompileError::Lexical { error, line });
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    // --- Pratt core ---

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        if self.depth >= MAX_NESTING {
            self.error_at_current("Expression nested too deeply.");
            return;
        }
        self.depth += 1;
        self.parse_operand(precedence);
        self.depth -= 1;
    }

    fn parse_operand(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = get_rule(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };
        self.apply(prefix);

        while precedence <= get_rule(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = get_rule(self.previous.kind).infix {
                self.apply(infix);
            }
        }
    }

    fn apply(&mut self, action: ParseFn) {
        match action {
            ParseFn::Grouping => self.grouping(),
            ParseFn::Unary => self.unary(),
            ParseFn::Binary => self.binary(),
            ParseFn::Number => self.number(),
            ParseFn::Literal => self.literal(),
        }
    }

    // --- Parse actions ---

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self) {
        let operator = self.previous.kind;

        // Operand first; the operator applies to whatever it left on the stack
        self.parse_precedence(Precedence::Unary);

        match operator {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => {}
        }
    }

    fn binary(&mut self) {
        let operator = self.previous.kind;
        let rule = get_rule(operator);
        self.parse_precedence(rule.precedence.next());

        match operator {
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::BangEqual => self.emit_ops(OpCode::Equal, OpCode::Not),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => self.emit_ops(OpCode::Less, OpCode::Not),
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => self.emit_ops(OpCode::Greater, OpCode::Not),
            _ => {}
        }
    }

    fn number(&mut self) {
        let text = self.previous.lexeme(self.scanner.source());
        match text.parse::<f64>() {
            Ok(value) => self.emit_constant(Value::Number(value)),
            Err(_) => self.error("Invalid number literal."),
        }
    }

    fn literal(&mut self) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            TokenKind::True => self.emit_op(OpCode::True),
            _ => {}
        }
    }

    // --- Emission ---

    /// Every byte is tagged with the line of the token that produced it.
    fn emit_byte(&mut self, byte: u8) {
        self.chunk.write_byte(byte, self.previous.line());
    }

    fn emit_op(&mut self, op: OpCode) {
        self.chunk.write_op(op, self.previous.line());
    }

    fn emit_ops(&mut self, first: OpCode, second: OpCode) {
        self.emit_op(first);
        self.emit_op(second);
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_op(OpCode::Constant);
        self.emit_byte(index);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.chunk.add_constant(value);
        match u8::try_from(index) {
            Ok(index) => index,
            Err(_) => {
                debug_assert!(index >= MAX_CONSTANTS);
                let location = self.location_of(self.previous);
                let line = self.previous.line();
                self.report(CompileError::TooManyConstants { location, line });
                0
            }
        }
    }

    fn end_compiler(&mut self) {
        self.emit_op(OpCode::Return);
    }

    // --- Diagnostics ---

    /// Report at the token just consumed.
    fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    /// Report at the token about to be consumed.
    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    fn error_at(&mut self, token: Token, message: &str) {
        let location = self.location_of(token);
        self.report(CompileError::syntax(message, location, token.line()));
    }

    fn location_of(&self, token: Token) -> ErrorLocation {
        match token.kind {
            TokenKind::Eof => ErrorLocation::End,
            TokenKind::Error(_) => ErrorLocation::Unlocated,
            _ => ErrorLocation::Lexeme(token.lexeme(self.scanner.source()).to_string()),
        }
    }

    fn report(&mut self, error: CompileError) {
        if self.panic_mode {
            log::trace!("suppressed while in panic mode: {}", error);
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn code_of(source: &str) -> Vec<u8> {
        compile_to_chunk(source).unwrap().code().to_vec()
    }

    fn errors_of(source: &str) -> Vec<String> {
        compile_to_chunk(source)
            .unwrap_err()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    const CONSTANT: u8 = OpCode::Constant as u8;

    #[test]
    fn test_precedence_order() {
        assert!(Precedence::None < Precedence::Assignment);
        assert!(Precedence::Term < Precedence::Factor);
        assert!(Precedence::Factor < Precedence::Unary);
        assert_eq!(Precedence::Term.next(), Precedence::Factor);
        assert_eq!(Precedence::Primary.next(), Precedence::Primary);
    }

    #[test]
    fn test_rule_table() {
        let minus = get_rule(TokenKind::Minus);
        assert_eq!(minus.prefix, Some(ParseFn::Unary));
        assert_eq!(minus.infix, Some(ParseFn::Binary));
        assert_eq!(minus.precedence, Precedence::Term);

        assert_eq!(get_rule(TokenKind::Star).precedence, Precedence::Factor);
        assert_eq!(get_rule(TokenKind::EqualEqual).precedence, Precedence::Equality);
        assert_eq!(get_rule(TokenKind::LessEqual).precedence, Precedence::Comparison);
        assert_eq!(get_rule(TokenKind::Nil).prefix, Some(ParseFn::Literal));
        assert_eq!(get_rule(TokenKind::String), NO_RULE);
        assert_eq!(get_rule(TokenKind::Eof), NO_RULE);
    }

    #[test]
    fn test_factor_binds_tighter_than_term() {
        assert_eq!(
            code_of("1 + 2 * 3"),
            vec![
                CONSTANT,
                0,
                CONSTANT,
                1,
                CONSTANT,
                2,
                OpCode::Multiply as u8,
                OpCode::Add as u8,
                OpCode::Return as u8,
            ]
        );
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(
            code_of("10 - 2 - 3"),
            vec![
                CONSTANT,
                0,
                CONSTANT,
                1,
                OpCode::Subtract as u8,
                CONSTANT,
                2,
                OpCode::Subtract as u8,
                OpCode::Return as u8,
            ]
        );
    }

    #[test]
    fn test_unary_binds_tighter_than_binary() {
        assert_eq!(
            code_of("-2 + 3"),
            vec![
                CONSTANT,
                0,
                OpCode::Negate as u8,
                CONSTANT,
                1,
                OpCode::Add as u8,
                OpCode::Return as u8,
            ]
        );
    }

    #[test]
    fn test_derived_comparisons() {
        assert_eq!(
            code_of("true != false"),
            vec![
                OpCode::True as u8,
                OpCode::False as u8,
                OpCode::Equal as u8,
                OpCode::Not as u8,
                OpCode::Return as u8,
            ]
        );
        let ge = code_of("1 >= 2");
        assert_eq!(&ge[4..6], &[OpCode::Less as u8, OpCode::Not as u8]);
        let le = code_of("1 <= 2");
        assert_eq!(&le[4..6], &[OpCode::Greater as u8, OpCode::Not as u8]);
    }

    #[test]
    fn test_constants_are_stored_in_order() {
        let chunk = compile_to_chunk("(1.5 + 2) * 1.5").unwrap();
        assert_eq!(
            chunk.constants(),
            &[Value::Number(1.5), Value::Number(2.0), Value::Number(1.5)]
        );
    }

    #[test]
    fn test_lines_follow_tokens() {
        let chunk = compile_to_chunk("1 +\n\n2").unwrap();
        assert_eq!(chunk.lines(), &[1, 1, 3, 3, 3, 3]);
    }

    #[test]
    fn test_missing_operand_reports_once() {
        assert_eq!(
            errors_of("(1 +"),
            vec!["[line 1] Error at end: Expect expression."]
        );
    }

    #[test]
    fn test_missing_prefix_rule() {
        assert_eq!(
            errors_of(")"),
            vec!["[line 1] Error at ')': Expect expression."]
        );
        assert_eq!(
            errors_of("\"text\""),
            vec!["[line 1] Error at '\"text\"': Expect expression."]
        );
    }

    #[test]
    fn test_missing_close_paren() {
        assert_eq!(
            errors_of("(1"),
            vec!["[line 1] Error at end: Expect ')' after expression."]
        );
    }

    #[test]
    fn test_trailing_tokens() {
        assert_eq!(
            errors_of("1 2"),
            vec!["[line 1] Error at '2': Expect end of expression."]
        );
    }

    #[test]
    fn test_lexical_error_is_unlocated() {
        assert_eq!(
            errors_of("1 + @"),
            vec!["[line 1] Error: Unexpected character."]
        );
        assert_eq!(
            errors_of("\n\"abc"),
            vec!["[line 2] Error: Unterminated string."]
        );
    }

    #[test]
    fn test_panic_mode_suppresses_everything_after_first_error() {
        // Three independent problems, one diagnostic
        assert_eq!(
            errors_of("@ ) 1 2"),
            vec!["[line 1] Error: Unexpected character."]
        );
    }

    #[test]
    fn test_nesting_limit() {
        let ok = format!("{}1{}", "(".repeat(MAX_NESTING - 1), ")".repeat(MAX_NESTING - 1));
        assert!(compile_to_chunk(&ok).is_ok());

        let n = MAX_NESTING + 10;
        let deep = format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(
            errors_of(&deep),
            vec!["[line 1] Error at '(': Expression nested too deeply."]
        );
    }

    #[test]
    fn test_nesting_limit_far_past_the_limit() {
        let deep = format!("{}nil", "!".repeat(200_000));
        assert_eq!(
            errors_of(&deep),
            vec!["[line 1] Error at '!': Expression nested too deeply."]
        );

        let deep = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert_eq!(errors_of(&deep).len(), 1);
    }

    #[test]
    fn test_256_constants_fit() {
        let source = (0..256).map(|i| i.to_string()).collect::<Vec<_>>().join(" + ");
        let chunk = compile_to_chunk(&source).unwrap();
        assert_eq!(chunk.constants().len(), 256);
    }

    #[test]
    fn test_too_many_constants() {
        let source = (1..=257).map(|i| i.to_string()).collect::<Vec<_>>().join(" + ");
        assert_eq!(
            errors_of(&source),
            vec!["[line 1] Error at '257': Too many constants in one chunk."]
        );
    }

    #[test]
    fn test_compiler_flags() {
        let mut chunk = Chunk::new();
        let compiler = Compiler::new("1", &mut chunk);
        assert!(!compiler.had_error());
    }
}
