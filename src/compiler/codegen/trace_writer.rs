//! A module writer that records the call trace as readable lines.
//!
//! Useful for debugging the generator without decoding binary output, and
//! the backbone of the end-to-end tests: every writer interaction becomes
//! one line that can be asserted on.

use crate::compiler::codegen::function_name::FunctionName;
use crate::compiler::codegen::instructions::{
    BlockOperator, LocalOperator, NumericOperator, StructOperator, WasmConst,
};
use crate::compiler::codegen::module_writer::{BindingKind, ModuleWriter};
use crate::compiler::codegen::type_manager::StructType;
use crate::compiler::codegen::value_types::{AnyType, ValueType};
use crate::compiler::settings::WasmOptions;
use crate::CompileError;

pub struct TraceWriter {
    options: WasmOptions,
    pub events: Vec<String>,
}

impl TraceWriter {
    pub fn new(options: WasmOptions) -> TraceWriter {
        TraceWriter {
            options,
            events: Vec::new(),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.events.iter().any(|e| e.contains(needle))
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.events.iter().filter(|e| e.contains(needle)).count()
    }

    fn push(&mut self, event: String) {
        self.events.push(event);
    }
}

impl ModuleWriter for TraceWriter {
    fn options(&self) -> &WasmOptions {
        &self.options
    }

    fn prepare_import(
        &mut self,
        name: &FunctionName,
        module: &str,
        import_name: &str,
    ) -> Result<(), CompileError> {
        self.push(format!("import {module}.{import_name} = {name}"));
        Ok(())
    }

    fn write_export(
        &mut self,
        name: &FunctionName,
        export_name: &str,
    ) -> Result<(), CompileError> {
        self.push(format!("export {export_name} = {name}"));
        Ok(())
    }

    fn write_struct_type(&mut self, struct_type: &StructType) -> Result<(), CompileError> {
        let fields: Vec<String> = struct_type
            .fields()
            .iter()
            .map(|f| format!("{}:{}", f.name, f.ty))
            .collect();
        let vtable: Vec<String> = struct_type
            .vtable()
            .iter()
            .map(|f| f.signature_name.clone())
            .collect();
        self.push(format!(
            "struct_type {} index={} vtable_id={} fields=[{}] vtable=[{}]",
            struct_type.name(),
            struct_type.class_index(),
            struct_type.vtable_id(),
            fields.join(", "),
            vtable.join(", "),
        ));
        Ok(())
    }

    fn write_string_data(&mut self, data: &[u8]) -> Result<(), CompileError> {
        self.push(format!("string_data {} bytes", data.len()));
        Ok(())
    }

    fn write_method_start(
        &mut self,
        name: &FunctionName,
        source_file: Option<&str>,
    ) -> Result<(), CompileError> {
        self.push(format!(
            "method_start {name} source={}",
            source_file.unwrap_or("?")
        ));
        Ok(())
    }

    fn write_method_param_start(&mut self, name: &FunctionName) -> Result<(), CompileError> {
        self.push(format!("signature_start {name}"));
        Ok(())
    }

    fn write_method_param(
        &mut self,
        kind: BindingKind,
        ty: &AnyType,
        param_name: Option<&str>,
    ) -> Result<(), CompileError> {
        let kind = match kind {
            BindingKind::Param => "param",
            BindingKind::Result => "result",
            BindingKind::Local => "local",
        };
        match param_name {
            Some(param_name) => self.push(format!("{kind} {ty} {param_name}")),
            None => self.push(format!("{kind} {ty}")),
        }
        Ok(())
    }

    fn write_method_param_finish(&mut self, name: &FunctionName) -> Result<(), CompileError> {
        self.push(format!("signature_finish {name}"));
        Ok(())
    }

    fn write_method_finish(&mut self) -> Result<(), CompileError> {
        self.push("method_finish".to_string());
        Ok(())
    }

    fn mark_source_line(&mut self, line: i32) -> Result<(), CompileError> {
        self.push(format!("source_line {line}"));
        Ok(())
    }

    fn write_exception(&mut self) -> Result<(), CompileError> {
        self.push("exception".to_string());
        Ok(())
    }

    fn write_const(&mut self, value: &WasmConst) -> Result<(), CompileError> {
        match value {
            WasmConst::I32(v) => self.push(format!("const i32 {v}")),
            WasmConst::I64(v) => self.push(format!("const i64 {v}")),
            WasmConst::F32(v) => self.push(format!("const f32 {v}")),
            WasmConst::F64(v) => self.push(format!("const f64 {v}")),
        }
        Ok(())
    }

    fn write_default_value(&mut self, ty: &AnyType) -> Result<(), CompileError> {
        self.push(format!("default_value {ty}"));
        Ok(())
    }

    fn write_local(&mut self, op: LocalOperator, index: u32) -> Result<(), CompileError> {
        let op = match op {
            LocalOperator::Get => "get",
            LocalOperator::Set => "set",
            LocalOperator::Tee => "tee",
        };
        self.push(format!("local.{op} {index}"));
        Ok(())
    }

    fn write_numeric_op(
        &mut self,
        op: NumericOperator,
        ty: ValueType,
    ) -> Result<(), CompileError> {
        self.push(format!("numeric {ty:?} {op:?}").to_lowercase());
        Ok(())
    }

    fn write_block(&mut self, op: BlockOperator, depth: Option<u32>) -> Result<(), CompileError> {
        match depth {
            Some(depth) => self.push(format!("block {op:?} {depth}").to_lowercase()),
            None => self.push(format!("block {op:?}").to_lowercase()),
        }
        Ok(())
    }

    fn write_function_call(&mut self, name: &FunctionName) -> Result<(), CompileError> {
        self.push(format!("call {name}"));
        Ok(())
    }

    fn write_virtual_function_call(
        &mut self,
        name: &FunctionName,
        receiver: &StructType,
        slot: usize,
    ) -> Result<(), CompileError> {
        self.push(format!(
            "virtual_call {name} receiver={} slot={slot}",
            receiver.name()
        ));
        Ok(())
    }

    fn write_struct_operation(
        &mut self,
        op: StructOperator,
        struct_type: &StructType,
        field_index: Option<u32>,
    ) -> Result<(), CompileError> {
        let op = match op {
            StructOperator::New => "new",
            StructOperator::NewDefault => "new_default",
            StructOperator::Get => "get",
            StructOperator::Set => "set",
        };
        match field_index {
            Some(field) => self.push(format!(
                "struct.{op} {} field={field}",
                struct_type.name()
            )),
            None => self.push(format!("struct.{op} {}", struct_type.name())),
        }
        Ok(())
    }

    fn prepare_finish(&mut self) -> Result<(), CompileError> {
        self.push("prepare_finish".to_string());
        Ok(())
    }
}
