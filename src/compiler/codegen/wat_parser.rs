//! A small textual-WebAssembly parser producing the typed instruction list.
//!
//! Covers the flat instruction subset that `@TextCode` bodies and synthetic
//! functions use: constants, local access, numeric operations, direct calls,
//! control blocks and stack housekeeping. Parentheses only group, so folded
//! expressions are flattened in source order. Line comments (`;;`) are
//! skipped.

use crate::compiler::codegen::code_builder::MethodCode;
use crate::compiler::codegen::function_name::FunctionName;
use crate::compiler::codegen::instructions::{
    BlockOperator, LocalOperator, NumericOperator, WasmConst, WasmInstruction,
};
use crate::compiler::codegen::value_types::ValueType;
use crate::compiler::compiler_errors::{ErrorLocation, ErrorType};
use crate::CompileError;

pub struct WatParser;

impl WatParser {
    pub fn new() -> WatParser {
        WatParser
    }

    /// Parse a text-code body. Every produced instruction carries `line`,
    /// the first source line of the annotated method.
    pub fn parse(&self, source: &str, line: i32) -> Result<MethodCode, CompileError> {
        let mut instructions = Vec::new();
        let mut tokens = tokenize(source).into_iter().peekable();

        while let Some(token) = tokens.next() {
            let instruction = match token.as_str() {
                "nop" => WasmInstruction::Nop { line },
                "drop" => block(BlockOperator::Drop, None, line),
                "return" => block(BlockOperator::Return, None, line),
                "unreachable" => block(BlockOperator::Unreachable, None, line),
                "block" => block(BlockOperator::Block, None, line),
                "loop" => block(BlockOperator::Loop, None, line),
                "if" => block(BlockOperator::If, None, line),
                "else" => block(BlockOperator::Else, None, line),
                "end" => block(BlockOperator::End, None, line),
                "try" => block(BlockOperator::Try, None, line),
                "catch" => block(BlockOperator::Catch, None, line),
                "throw" => block(BlockOperator::Throw, None, line),
                "rethrow" => block(BlockOperator::Rethrow, None, line),
                "br" => block(BlockOperator::Br, Some(index(&mut tokens, source)?), line),
                "br_if" => block(BlockOperator::BrIf, Some(index(&mut tokens, source)?), line),
                "call" => {
                    let target = tokens
                        .next()
                        .ok_or_else(|| error(source, "call without a target"))?;
                    let target = target.strip_prefix('$').unwrap_or(&target);
                    WasmInstruction::Call {
                        name: FunctionName::parse(target)
                            .map_err(|_| error(source, "malformed call target"))?,
                        line,
                    }
                }
                "local.get" => local(LocalOperator::Get, index(&mut tokens, source)?, line),
                "local.set" => local(LocalOperator::Set, index(&mut tokens, source)?, line),
                "local.tee" => local(LocalOperator::Tee, index(&mut tokens, source)?, line),
                "i32.const" => constant(
                    WasmConst::I32(number(&mut tokens, source)?),
                    line,
                ),
                "i64.const" => constant(
                    WasmConst::I64(number(&mut tokens, source)?),
                    line,
                ),
                "f32.const" => constant(
                    WasmConst::F32(number(&mut tokens, source)?),
                    line,
                ),
                "f64.const" => constant(
                    WasmConst::F64(number(&mut tokens, source)?),
                    line,
                ),
                other => match numeric(other) {
                    Some((op, ty)) => WasmInstruction::Numeric { op, ty, line },
                    None => {
                        return Err(error(
                            source,
                            &format!("unknown instruction '{other}'"),
                        ))
                    }
                },
            };
            instructions.push(instruction);
        }

        Ok(MethodCode::new(instructions))
    }
}

impl Default for WatParser {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw_line in source.lines() {
        let code = match raw_line.find(";;") {
            Some(index) => &raw_line[..index],
            None => raw_line,
        };
        // parentheses group folded expressions and are skipped, except
        // inside a token: call targets embed their own signature parens
        let mut token = String::new();
        let mut depth = 0usize;
        for c in code.chars() {
            match c {
                c if c.is_whitespace() => {
                    if !token.is_empty() {
                        tokens.push(std::mem::take(&mut token));
                        depth = 0;
                    }
                }
                '(' if token.is_empty() => {}
                '(' => {
                    depth += 1;
                    token.push(c);
                }
                ')' if depth == 0 => {
                    if !token.is_empty() {
                        tokens.push(std::mem::take(&mut token));
                    }
                }
                ')' => {
                    depth -= 1;
                    token.push(c);
                }
                c => token.push(c),
            }
        }
        if !token.is_empty() {
            tokens.push(token);
        }
    }
    tokens
}

fn block(op: BlockOperator, depth: Option<u32>, line: i32) -> WasmInstruction {
    WasmInstruction::Block { op, depth, line }
}

fn local(op: LocalOperator, index: u32, line: i32) -> WasmInstruction {
    WasmInstruction::Local { op, index, line }
}

fn constant(value: WasmConst, line: i32) -> WasmInstruction {
    WasmInstruction::Const { value, line }
}

fn index(
    tokens: &mut std::iter::Peekable<std::vec::IntoIter<String>>,
    source: &str,
) -> Result<u32, CompileError> {
    let token = tokens
        .next()
        .ok_or_else(|| error(source, "missing index operand"))?;
    token
        .parse()
        .map_err(|_| error(source, &format!("invalid index '{token}'")))
}

fn number<T: std::str::FromStr>(
    tokens: &mut std::iter::Peekable<std::vec::IntoIter<String>>,
    source: &str,
) -> Result<T, CompileError> {
    let token = tokens
        .next()
        .ok_or_else(|| error(source, "missing constant operand"))?;
    token
        .parse()
        .map_err(|_| error(source, &format!("invalid constant '{token}'")))
}

fn numeric(token: &str) -> Option<(NumericOperator, ValueType)> {
    let (prefix, op_name) = token.split_once('.')?;
    let ty = match prefix {
        "i32" => ValueType::I32,
        "i64" => ValueType::I64,
        "f32" => ValueType::F32,
        "f64" => ValueType::F64,
        _ => return None,
    };
    let op = match op_name {
        "add" => NumericOperator::Add,
        "sub" => NumericOperator::Sub,
        "mul" => NumericOperator::Mul,
        "div" | "div_s" => NumericOperator::Div,
        "eq" => NumericOperator::Eq,
        "ne" => NumericOperator::Ne,
        "lt" | "lt_s" => NumericOperator::Lt,
        "gt" | "gt_s" => NumericOperator::Gt,
        "le" | "le_s" => NumericOperator::Le,
        "ge" | "ge_s" => NumericOperator::Ge,
        _ => return None,
    };
    Some((op, ty))
}

fn error(source: &str, detail: &str) -> CompileError {
    CompileError::new(
        format!("Invalid text code ({detail}): {source}"),
        ErrorLocation::none(),
        ErrorType::TextCode,
    )
}
