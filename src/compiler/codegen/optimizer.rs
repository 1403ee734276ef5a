//! Peephole pass over the final instruction list.
//!
//! Runs exactly once per emitted function, after scanning is complete, so
//! it must not remove call instructions (reachability is already fixed).

use crate::compiler::codegen::instructions::{
    BlockOperator, LocalOperator, NumericOperator, WasmConst, WasmInstruction,
};

/// Stateless peephole optimizer.
#[derive(Default)]
pub struct CodeOptimizer;

impl CodeOptimizer {
    pub fn new() -> CodeOptimizer {
        CodeOptimizer
    }

    /// Optimize the instruction list in place.
    pub fn optimize(&self, instructions: &mut Vec<WasmInstruction>) {
        let source = std::mem::take(instructions);
        let mut result: Vec<WasmInstruction> = Vec::with_capacity(source.len());
        let mut i = 0;

        while i < source.len() {
            if i + 1 < source.len() {
                // local.set x; local.get x  ->  local.tee x
                if let (
                    WasmInstruction::Local {
                        op: LocalOperator::Set,
                        index: set_index,
                        line,
                    },
                    WasmInstruction::Local {
                        op: LocalOperator::Get,
                        index: get_index,
                        ..
                    },
                ) = (&source[i], &source[i + 1])
                {
                    if set_index == get_index {
                        result.push(WasmInstruction::Local {
                            op: LocalOperator::Tee,
                            index: *set_index,
                            line: *line,
                        });
                        i += 2;
                        continue;
                    }
                }

                // local.get x; local.set x is a no-op
                if let (
                    WasmInstruction::Local {
                        op: LocalOperator::Get,
                        index: get_index,
                        ..
                    },
                    WasmInstruction::Local {
                        op: LocalOperator::Set,
                        index: set_index,
                        ..
                    },
                ) = (&source[i], &source[i + 1])
                {
                    if get_index == set_index {
                        i += 2;
                        continue;
                    }
                }

                // an unused constant followed by drop
                if let (
                    WasmInstruction::Const { .. },
                    WasmInstruction::Block {
                        op: BlockOperator::Drop,
                        ..
                    },
                ) = (&source[i], &source[i + 1])
                {
                    i += 2;
                    continue;
                }

                // identity arithmetic: x + 0, x - 0, x * 1, x / 1
                if let (
                    WasmInstruction::Const { value, .. },
                    WasmInstruction::Numeric { op, .. },
                ) = (&source[i], &source[i + 1])
                {
                    let is_identity = match op {
                        NumericOperator::Add | NumericOperator::Sub => is_zero(value),
                        NumericOperator::Mul | NumericOperator::Div => is_one(value),
                        _ => false,
                    };
                    if is_identity {
                        i += 2;
                        continue;
                    }
                }
            }

            result.push(source[i].clone());
            i += 1;
        }

        *instructions = result;
    }
}

fn is_zero(value: &WasmConst) -> bool {
    match value {
        WasmConst::I32(v) => *v == 0,
        WasmConst::I64(v) => *v == 0,
        WasmConst::F32(v) => *v == 0.0,
        WasmConst::F64(v) => *v == 0.0,
    }
}

fn is_one(value: &WasmConst) -> bool {
    match value {
        WasmConst::I32(v) => *v == 1,
        WasmConst::I64(v) => *v == 1,
        WasmConst::F32(v) => *v == 1.0,
        WasmConst::F64(v) => *v == 1.0,
    }
}
