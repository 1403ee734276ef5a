//! The typed instruction stream flowing from code builders to the writer.
//!
//! Instruction kinds are tagged variants rather than a class hierarchy; each
//! variant carries the source line it maps to (-1 when unknown) and knows
//! how to stream itself through a `ModuleWriter`.

use crate::compiler::codegen::function_manager::FunctionManager;
use crate::compiler::codegen::function_name::FunctionName;
use crate::compiler::codegen::module_writer::ModuleWriter;
use crate::compiler::codegen::type_manager::TypeManager;
use crate::compiler::codegen::value_types::ValueType;
use crate::CompileError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WasmConst {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOperator {
    Get,
    Set,
    Tee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOperator {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOperator {
    Block,
    Loop,
    If,
    Else,
    End,
    Br,
    BrIf,
    Return,
    Drop,
    Unreachable,
    Try,
    Catch,
    Throw,
    Rethrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructOperator {
    New,
    NewDefault,
    Get,
    Set,
}

/// Discriminant used by the scanner and the emitter fix-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Const,
    Local,
    Numeric,
    Block,
    Call,
    CallVirtual,
    CallInterface,
    Struct,
    Nop,
}

#[derive(Debug, Clone)]
pub enum WasmInstruction {
    Const {
        value: WasmConst,
        line: i32,
    },
    Local {
        op: LocalOperator,
        index: u32,
        line: i32,
    },
    Numeric {
        op: NumericOperator,
        ty: ValueType,
        line: i32,
    },
    Block {
        op: BlockOperator,
        /// Branch depth for `br`/`br_if`
        depth: Option<u32>,
        line: i32,
    },
    /// A static or otherwise direct call
    Call {
        name: FunctionName,
        line: i32,
    },
    /// A call dispatched through the receiver's vtable
    CallVirtual {
        name: FunctionName,
        this_class: String,
        line: i32,
    },
    /// A call dispatched through an interface-method slot
    CallInterface {
        name: FunctionName,
        this_class: String,
        line: i32,
    },
    Struct {
        op: StructOperator,
        class_name: String,
        field_index: Option<u32>,
        line: i32,
    },
    Nop {
        line: i32,
    },
}

impl WasmInstruction {
    pub fn kind(&self) -> InstructionKind {
        match self {
            WasmInstruction::Const { .. } => InstructionKind::Const,
            WasmInstruction::Local { .. } => InstructionKind::Local,
            WasmInstruction::Numeric { .. } => InstructionKind::Numeric,
            WasmInstruction::Block { .. } => InstructionKind::Block,
            WasmInstruction::Call { .. } => InstructionKind::Call,
            WasmInstruction::CallVirtual { .. } => InstructionKind::CallVirtual,
            WasmInstruction::CallInterface { .. } => InstructionKind::CallInterface,
            WasmInstruction::Struct { .. } => InstructionKind::Struct,
            WasmInstruction::Nop { .. } => InstructionKind::Nop,
        }
    }

    pub fn line_number(&self) -> i32 {
        match self {
            WasmInstruction::Const { line, .. }
            | WasmInstruction::Local { line, .. }
            | WasmInstruction::Numeric { line, .. }
            | WasmInstruction::Block { line, .. }
            | WasmInstruction::Call { line, .. }
            | WasmInstruction::CallVirtual { line, .. }
            | WasmInstruction::CallInterface { line, .. }
            | WasmInstruction::Struct { line, .. }
            | WasmInstruction::Nop { line } => *line,
        }
    }

    /// The callee of a call instruction, if this is one.
    pub fn callee(&self) -> Option<&FunctionName> {
        match self {
            WasmInstruction::Call { name, .. }
            | WasmInstruction::CallVirtual { name, .. }
            | WasmInstruction::CallInterface { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Stream this instruction to the writer. Virtual calls resolve their
    /// compile-time vtable slot against the type manager; direct calls
    /// resolve aliases so callers of an unresolved name reach the concrete
    /// function that satisfies it.
    pub fn write_to<W: ModuleWriter>(
        &self,
        writer: &mut W,
        types: &TypeManager,
        functions: &FunctionManager,
    ) -> Result<(), CompileError> {
        match self {
            WasmInstruction::Const { value, .. } => writer.write_const(value),
            WasmInstruction::Local { op, index, .. } => writer.write_local(*op, *index),
            WasmInstruction::Numeric { op, ty, .. } => writer.write_numeric_op(*op, *ty),
            WasmInstruction::Block { op, depth, .. } => writer.write_block(*op, *depth),
            WasmInstruction::Call { name, .. } => {
                writer.write_function_call(functions.resolve_alias(name))
            }
            WasmInstruction::CallVirtual {
                name,
                this_class,
                line,
            } => {
                let receiver = types.by_name(this_class).ok_or_else(|| {
                    CompileError::compiler_error(format!(
                        "Virtual call receiver type was never registered: {this_class}"
                    ))
                    .with_line(*line)
                })?;
                let slot = receiver
                    .vtable_slot(&name.method_name, &name.signature)
                    .ok_or_else(|| {
                        CompileError::missing_function(&name.signature_name).with_line(*line)
                    })?;
                writer.write_virtual_function_call(name, receiver, slot)
            }
            WasmInstruction::CallInterface { line, .. } => Err(CompileError::unsupported(
                "Interface calls are not supported.",
                *line,
            )),
            WasmInstruction::Struct {
                op,
                class_name,
                field_index,
                line,
            } => {
                let struct_type = types.by_name(class_name).ok_or_else(|| {
                    CompileError::compiler_error(format!(
                        "Struct type was never registered: {class_name}"
                    ))
                    .with_line(*line)
                })?;
                writer.write_struct_operation(*op, struct_type, *field_index)
            }
            WasmInstruction::Nop { .. } => Ok(()),
        }
    }
}
