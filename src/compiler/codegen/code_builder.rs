//! The seam to the external stack-to-register instruction builder.

use crate::compiler::classfile::loader::ClassFileLoader;
use crate::compiler::classfile::{Code, MethodInfo};
use crate::compiler::codegen::function_manager::FunctionManager;
use crate::compiler::codegen::instructions::WasmInstruction;
use crate::compiler::codegen::string_manager::StringManager;
use crate::compiler::codegen::type_manager::TypeManager;
use crate::compiler::codegen::value_types::AnyType;
use crate::compiler::settings::WasmOptions;
use crate::CompileError;

/// One slot of a method's local-variable table. Parameters come first;
/// names are debug information and may be absent.
#[derive(Debug, Clone)]
pub struct LocalVariable {
    pub ty: AnyType,
    pub name: Option<String>,
}

/// The product of building one method body: the typed instruction list plus
/// the local-variable table the signature writer reads names and extra
/// locals from.
#[derive(Debug, Clone, Default)]
pub struct MethodCode {
    pub instructions: Vec<WasmInstruction>,
    pub locals: Vec<LocalVariable>,
}

impl MethodCode {
    pub fn new(instructions: Vec<WasmInstruction>) -> MethodCode {
        MethodCode {
            instructions,
            locals: Vec::new(),
        }
    }

    pub fn local_name(&self, index: usize) -> Option<&str> {
        self.locals.get(index).and_then(|l| l.name.as_deref())
    }

    /// The locals that are not parameters, i.e. everything past
    /// `param_count` in the table.
    pub fn local_types(&self, param_count: usize) -> &[LocalVariable] {
        if param_count >= self.locals.len() {
            &[]
        } else {
            &self.locals[param_count..]
        }
    }
}

/// Everything a code builder may touch while translating one method: types
/// for receiver and field references, functions for callee registration,
/// strings for literal interning, the loader for constant-pool chasing.
pub struct BuildContext<'a> {
    pub types: &'a mut TypeManager,
    pub functions: &'a mut FunctionManager,
    pub strings: &'a mut StringManager,
    pub loader: &'a mut ClassFileLoader,
    pub options: &'a WasmOptions,
}

/// Converts stack-machine bytecode into the typed instruction list. The
/// real implementation lives outside this crate; tests substitute canned
/// bodies.
pub trait CodeBuilder {
    fn build_code(
        &mut self,
        code: &Code,
        method: &MethodInfo,
        ctx: &mut BuildContext,
    ) -> Result<MethodCode, CompileError>;
}
