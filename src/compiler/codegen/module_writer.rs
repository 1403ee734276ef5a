//! The back-end seam: everything the generator needs from a module writer.

use crate::compiler::codegen::function_name::FunctionName;
use crate::compiler::codegen::instructions::{
    BlockOperator, LocalOperator, NumericOperator, StructOperator, WasmConst,
};
use crate::compiler::codegen::type_manager::StructType;
use crate::compiler::codegen::value_types::{AnyType, ValueType};
use crate::compiler::settings::WasmOptions;
use crate::CompileError;

/// What a signature entry binds: a parameter, a result or an extra local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Param,
    Result,
    Local,
}

/// A module writer back end (binary, text, trace). The generator drives it
/// in a fixed protocol:
///
/// - finalize phase: `prepare_import` + signature for every import, a
///   signature for every needed function, `write_struct_type` per class,
///   `write_string_data`, then `prepare_finish`
/// - emit phase, per function: `write_export?`, `write_method_start`,
///   signature, instruction sinks, `write_method_finish`
///
/// Function bodies do not carry a trailing `end`; writers that need one
/// append it when the method finishes.
pub trait ModuleWriter {
    fn options(&self) -> &WasmOptions;

    /// Announce an imported function. Its signature follows through the
    /// `write_method_param*` calls.
    fn prepare_import(
        &mut self,
        name: &FunctionName,
        module: &str,
        import_name: &str,
    ) -> Result<(), CompileError>;

    fn write_export(&mut self, name: &FunctionName, export_name: &str)
        -> Result<(), CompileError>;

    /// One resolved struct layout with its vtable, emitted during type
    /// finalization.
    fn write_struct_type(&mut self, struct_type: &StructType) -> Result<(), CompileError>;

    /// The interned string literals as one data segment.
    fn write_string_data(&mut self, data: &[u8]) -> Result<(), CompileError>;

    fn write_method_start(
        &mut self,
        name: &FunctionName,
        source_file: Option<&str>,
    ) -> Result<(), CompileError>;

    fn write_method_param_start(&mut self, name: &FunctionName) -> Result<(), CompileError>;

    fn write_method_param(
        &mut self,
        kind: BindingKind,
        ty: &AnyType,
        param_name: Option<&str>,
    ) -> Result<(), CompileError>;

    fn write_method_param_finish(&mut self, name: &FunctionName) -> Result<(), CompileError>;

    fn write_method_finish(&mut self) -> Result<(), CompileError>;

    /// Source-map information: the following instructions come from this
    /// source line.
    fn mark_source_line(&mut self, line: i32) -> Result<(), CompileError>;

    /// Called before each exception-handling block operation when exception
    /// handling is enabled.
    fn write_exception(&mut self) -> Result<(), CompileError>;

    fn write_const(&mut self, value: &WasmConst) -> Result<(), CompileError>;

    /// The zero/null value for a field or local of the given type.
    fn write_default_value(&mut self, ty: &AnyType) -> Result<(), CompileError>;

    fn write_local(&mut self, op: LocalOperator, index: u32) -> Result<(), CompileError>;

    fn write_numeric_op(&mut self, op: NumericOperator, ty: ValueType)
        -> Result<(), CompileError>;

    fn write_block(&mut self, op: BlockOperator, depth: Option<u32>) -> Result<(), CompileError>;

    fn write_function_call(&mut self, name: &FunctionName) -> Result<(), CompileError>;

    /// A call dispatched through the receiver's vtable: load the vtable
    /// field, index the compile-time-known slot, `call_indirect` with the
    /// target's function type.
    fn write_virtual_function_call(
        &mut self,
        name: &FunctionName,
        receiver: &StructType,
        slot: usize,
    ) -> Result<(), CompileError>;

    fn write_struct_operation(
        &mut self,
        op: StructOperator,
        struct_type: &StructType,
        field_index: Option<u32>,
    ) -> Result<(), CompileError>;

    /// Imports, types and data are complete; function bodies follow.
    fn prepare_finish(&mut self) -> Result<(), CompileError>;
}
