//! A `ModuleWriter` that produces binary WebAssembly with `wasm-encoder`.
//!
//! The writer collects everything abstractly while the generator drives it
//! and encodes all sections in [`finish`](BinaryModuleWriter::finish), in
//! the required order: Type, Import, Function, Table, Memory, Export,
//! Element, Code, Data. Deferring the encoding keeps forward references
//! simple: function indices place imports before defined functions, struct
//! type indices follow the function types in one recursion group, and the
//! funcref dispatch table concatenates every class's vtable so a struct's
//! `vtable_id` is its base offset in the element segment.

use rustc_hash::FxHashMap;
use wasm_encoder::{
    AbstractHeapType, BlockType, CodeSection, CompositeInnerType, CompositeType, ConstExpr,
    DataSection, ElementSection, Elements, EntityType, ExportKind, ExportSection, FieldType,
    FuncType, Function, FunctionSection, HeapType, Ieee32, Ieee64, ImportSection, Instruction,
    MemorySection, MemoryType, Module, RefType, StorageType, StructType as EncodedStructType,
    SubType, TableSection, TableType, TypeSection, ValType,
};

use crate::compiler::codegen::function_name::FunctionName;
use crate::compiler::codegen::instructions::{
    BlockOperator, LocalOperator, NumericOperator, StructOperator, WasmConst,
};
use crate::compiler::codegen::module_writer::{BindingKind, ModuleWriter};
use crate::compiler::codegen::type_manager::StructType;
use crate::compiler::codegen::value_types::{AnyType, ValueType};
use crate::compiler::settings::WasmOptions;
use crate::CompileError;

/// An instruction collected during emission. Calls and struct operations
/// keep symbolic references until every index is known.
enum RawInst {
    Plain(Instruction<'static>),
    Call(String),
    CallIndirect { type_of: String },
    StructNew(u32),
    StructNewDefault(u32),
    StructGet { class_index: u32, field_index: u32 },
    StructSet { class_index: u32, field_index: u32 },
    RefNullStruct(u32),
}

struct StructEntry {
    class_index: u32,
    fields: Vec<AnyType>,
    vtable: Vec<String>,
}

struct FunctionBody {
    signature_name: String,
    type_index: u32,
    locals: Vec<AnyType>,
    instructions: Vec<RawInst>,
}

#[derive(Default)]
struct CurrentFunction {
    signature_name: String,
    params: Vec<AnyType>,
    results: Vec<AnyType>,
    locals: Vec<AnyType>,
    instructions: Vec<RawInst>,
}

pub struct BinaryModuleWriter {
    options: WasmOptions,
    func_types: Vec<(Vec<AnyType>, Vec<AnyType>)>,
    func_type_cache: FxHashMap<String, u32>,
    func_type_of: FxHashMap<String, u32>,
    /// (signature name, module, field) of every imported function, in order
    imports: Vec<(String, String, String)>,
    pending_import: Option<(String, String, String)>,
    structs: Vec<StructEntry>,
    exports: Vec<(String, String)>,
    string_data: Vec<u8>,
    bodies: Vec<FunctionBody>,
    current: Option<CurrentFunction>,
    in_body: bool,
}

impl BinaryModuleWriter {
    pub fn new(options: WasmOptions) -> BinaryModuleWriter {
        BinaryModuleWriter {
            options,
            func_types: Vec::new(),
            func_type_cache: FxHashMap::default(),
            func_type_of: FxHashMap::default(),
            imports: Vec::new(),
            pending_import: None,
            structs: Vec::new(),
            exports: Vec::new(),
            string_data: Vec::new(),
            bodies: Vec::new(),
            current: None,
            in_body: false,
        }
    }

    fn push(&mut self, inst: RawInst) -> Result<(), CompileError> {
        if !self.in_body {
            return Err(CompileError::compiler_error(
                "Instruction streamed outside of a method body",
            ));
        }
        match self.current.as_mut() {
            Some(current) => {
                current.instructions.push(inst);
                Ok(())
            }
            None => Err(CompileError::compiler_error(
                "Instruction streamed before the method signature",
            )),
        }
    }

    /// Encode every collected section and return the module bytes.
    pub fn finish(self) -> Result<Vec<u8>, CompileError> {
        let BinaryModuleWriter {
            func_types,
            func_type_of,
            imports,
            mut structs,
            exports,
            string_data,
            bodies,
            ..
        } = self;
        let func_type_count = func_types.len() as u32;

        // function index space: imports first, then defined functions
        let mut function_index: FxHashMap<&str, u32> = FxHashMap::default();
        for (index, (signature_name, _, _)) in imports.iter().enumerate() {
            function_index.insert(signature_name, index as u32);
        }
        for (index, body) in bodies.iter().enumerate() {
            function_index.insert(&body.signature_name, (imports.len() + index) as u32);
        }

        // struct wasm type indices follow the function types and mirror the
        // class-index order the type manager emitted them in
        structs.sort_by_key(|s| s.class_index);
        for (position, entry) in structs.iter().enumerate() {
            if entry.class_index != position as u32 {
                return Err(CompileError::compiler_error(format!(
                    "Struct type section is not contiguous at class index {}",
                    entry.class_index
                )));
            }
        }

        let mut sub_types: Vec<SubType> = Vec::with_capacity(func_types.len() + structs.len());
        for (params, results) in &func_types {
            let params: Vec<ValType> = params.iter().map(|t| lower(t, func_type_count)).collect();
            let results: Vec<ValType> = results.iter().map(|t| lower(t, func_type_count)).collect();
            sub_types.push(SubType {
                is_final: true,
                supertype_idx: None,
                composite_type: CompositeType {
                    inner: CompositeInnerType::Func(FuncType::new(params, results)),
                    shared: false,
                    descriptor: None,
                    describes: None,
                },
            });
        }
        for entry in &structs {
            let fields: Vec<FieldType> = entry
                .fields
                .iter()
                .map(|ty| FieldType {
                    element_type: StorageType::Val(lower(ty, func_type_count)),
                    mutable: true,
                })
                .collect();
            sub_types.push(SubType {
                is_final: true,
                supertype_idx: None,
                composite_type: CompositeType {
                    inner: CompositeInnerType::Struct(EncodedStructType {
                        fields: fields.into_boxed_slice(),
                    }),
                    shared: false,
                    descriptor: None,
                    describes: None,
                },
            });
        }
        let mut type_section = TypeSection::new();
        if !sub_types.is_empty() {
            type_section.ty().rec(sub_types);
        }

        let mut import_section = ImportSection::new();
        for (signature_name, module, field) in &imports {
            let type_index = *func_type_of.get(signature_name).ok_or_else(|| {
                CompileError::compiler_error(format!(
                    "Import without a registered signature: {signature_name}"
                ))
            })?;
            import_section.import(module, field, EntityType::Function(type_index));
        }

        let mut function_section = FunctionSection::new();
        let mut code_section = CodeSection::new();
        for body in &bodies {
            function_section.function(body.type_index);
            let locals = group_locals(&body.locals, func_type_count);
            let mut function = Function::new(locals);
            for inst in &body.instructions {
                let lowered =
                    lower_inst(inst, &function_index, &func_type_of, func_type_count)?;
                function.instruction(&lowered);
            }
            function.instruction(&Instruction::End);
            code_section.function(&function);
        }

        // one funcref table holds every vtable back to back
        let vtable_indices: Vec<u32> = {
            let mut indices = Vec::new();
            for entry in &structs {
                for signature_name in &entry.vtable {
                    let index =
                        *function_index.get(signature_name.as_str()).ok_or_else(|| {
                            CompileError::compiler_error(format!(
                                "Vtable entry was never written: {signature_name}"
                            ))
                        })?;
                    indices.push(index);
                }
            }
            indices
        };
        let mut table_section = TableSection::new();
        let mut element_section = ElementSection::new();
        if !vtable_indices.is_empty() {
            table_section.table(TableType {
                element_type: RefType::FUNCREF,
                minimum: vtable_indices.len() as u64,
                maximum: Some(vtable_indices.len() as u64),
                table64: false,
                shared: false,
            });
            element_section.active(
                None,
                &ConstExpr::i32_const(0),
                Elements::Functions(vtable_indices.into()),
            );
        }

        let mut memory_section = MemorySection::new();
        let mut data_section = DataSection::new();
        if !string_data.is_empty() {
            memory_section.memory(MemoryType {
                minimum: 1,
                maximum: None,
                memory64: false,
                shared: false,
                page_size_log2: None,
            });
            data_section.active(0, &ConstExpr::i32_const(0), string_data.iter().copied());
        }

        let mut export_section = ExportSection::new();
        for (export_name, signature_name) in &exports {
            let index = *function_index.get(signature_name.as_str()).ok_or_else(|| {
                CompileError::compiler_error(format!(
                    "Exported function was never written: {signature_name}"
                ))
            })?;
            export_section.export(export_name, ExportKind::Func, index);
        }

        let mut module = Module::new();
        module.section(&type_section);
        if !imports.is_empty() {
            module.section(&import_section);
        }
        module.section(&function_section);
        if !table_section.is_empty() {
            module.section(&table_section);
        }
        if !memory_section.is_empty() {
            module.section(&memory_section);
        }
        if !export_section.is_empty() {
            module.section(&export_section);
        }
        if !element_section.is_empty() {
            module.section(&element_section);
        }
        module.section(&code_section);
        if !data_section.is_empty() {
            module.section(&data_section);
        }
        Ok(module.finish())
    }

}

fn lower_inst(
    inst: &RawInst,
    function_index: &FxHashMap<&str, u32>,
    func_type_of: &FxHashMap<String, u32>,
    func_type_count: u32,
) -> Result<Instruction<'static>, CompileError> {
    Ok(match inst {
        RawInst::Plain(instruction) => instruction.clone(),
        RawInst::Call(signature_name) => {
            let index = *function_index.get(signature_name.as_str()).ok_or_else(|| {
                CompileError::compiler_error(format!(
                    "Call to a function that was never written: {signature_name}"
                ))
            })?;
            Instruction::Call(index)
        }
        RawInst::CallIndirect { type_of } => {
            let type_index = *func_type_of.get(type_of).ok_or_else(|| {
                CompileError::compiler_error(format!(
                    "Indirect call without a registered signature: {type_of}"
                ))
            })?;
            Instruction::CallIndirect {
                type_index,
                table_index: 0,
            }
        }
        RawInst::StructNew(class_index) => Instruction::StructNew(func_type_count + class_index),
        RawInst::StructNewDefault(class_index) => {
            Instruction::StructNewDefault(func_type_count + class_index)
        }
        RawInst::StructGet {
            class_index,
            field_index,
        } => Instruction::StructGet {
            struct_type_index: func_type_count + class_index,
            field_index: *field_index,
        },
        RawInst::StructSet {
            class_index,
            field_index,
        } => Instruction::StructSet {
            struct_type_index: func_type_count + class_index,
            field_index: *field_index,
        },
        RawInst::RefNullStruct(class_index) => {
            Instruction::RefNull(HeapType::Concrete(func_type_count + class_index))
        }
    })
}

impl ModuleWriter for BinaryModuleWriter {
    fn options(&self) -> &WasmOptions {
        &self.options
    }

    fn prepare_import(
        &mut self,
        name: &FunctionName,
        module: &str,
        import_name: &str,
    ) -> Result<(), CompileError> {
        self.pending_import = Some((
            name.signature_name.clone(),
            module.to_string(),
            import_name.to_string(),
        ));
        Ok(())
    }

    fn write_export(
        &mut self,
        name: &FunctionName,
        export_name: &str,
    ) -> Result<(), CompileError> {
        self.exports
            .push((export_name.to_string(), name.signature_name.clone()));
        Ok(())
    }

    fn write_struct_type(&mut self, struct_type: &StructType) -> Result<(), CompileError> {
        self.structs.push(StructEntry {
            class_index: struct_type.class_index(),
            fields: struct_type.fields().iter().map(|f| f.ty).collect(),
            vtable: struct_type
                .vtable()
                .iter()
                .map(|f| f.signature_name.clone())
                .collect(),
        });
        Ok(())
    }

    fn write_string_data(&mut self, data: &[u8]) -> Result<(), CompileError> {
        self.string_data.extend_from_slice(data);
        Ok(())
    }

    fn write_method_start(
        &mut self,
        name: &FunctionName,
        _source_file: Option<&str>,
    ) -> Result<(), CompileError> {
        self.current = Some(CurrentFunction {
            signature_name: name.signature_name.clone(),
            ..CurrentFunction::default()
        });
        self.in_body = true;
        Ok(())
    }

    fn write_method_param_start(&mut self, name: &FunctionName) -> Result<(), CompileError> {
        if !self.in_body {
            // signature-only pass during finalization
            self.current = Some(CurrentFunction {
                signature_name: name.signature_name.clone(),
                ..CurrentFunction::default()
            });
        }
        Ok(())
    }

    fn write_method_param(
        &mut self,
        kind: BindingKind,
        ty: &AnyType,
        _param_name: Option<&str>,
    ) -> Result<(), CompileError> {
        let current = self.current.as_mut().ok_or_else(|| {
            CompileError::compiler_error("Signature entry outside of a signature")
        })?;
        match kind {
            BindingKind::Param => current.params.push(*ty),
            BindingKind::Result => current.results.push(*ty),
            BindingKind::Local => current.locals.push(*ty),
        }
        Ok(())
    }

    fn write_method_param_finish(&mut self, name: &FunctionName) -> Result<(), CompileError> {
        let (params, results) = match self.current.as_ref() {
            Some(current) => (current.params.clone(), current.results.clone()),
            None => {
                return Err(CompileError::compiler_error(
                    "Signature finished before it started",
                ))
            }
        };

        let key = type_key(&params, &results);
        let type_index = match self.func_type_cache.get(&key) {
            Some(&index) => index,
            None => {
                let index = self.func_types.len() as u32;
                self.func_types.push((params, results));
                self.func_type_cache.insert(key, index);
                index
            }
        };
        self.func_type_of
            .insert(name.signature_name.clone(), type_index);

        if let Some((import_name, module, field)) = self.pending_import.take() {
            if import_name == name.signature_name {
                self.imports.push((import_name, module, field));
            } else {
                self.pending_import = Some((import_name, module, field));
            }
        }
        if !self.in_body {
            self.current = None;
        }
        Ok(())
    }

    fn write_method_finish(&mut self) -> Result<(), CompileError> {
        let current = self.current.take().ok_or_else(|| {
            CompileError::compiler_error("Method finished before it started")
        })?;
        let type_index = *self
            .func_type_of
            .get(&current.signature_name)
            .ok_or_else(|| {
                CompileError::compiler_error(format!(
                    "Method body without a signature: {}",
                    current.signature_name
                ))
            })?;
        self.bodies.push(FunctionBody {
            signature_name: current.signature_name,
            type_index,
            locals: current.locals,
            instructions: current.instructions,
        });
        self.in_body = false;
        Ok(())
    }

    fn mark_source_line(&mut self, _line: i32) -> Result<(), CompileError> {
        // no source-map section in the binary writer
        Ok(())
    }

    fn write_exception(&mut self) -> Result<(), CompileError> {
        Err(CompileError::unsupported(
            "Exception handling is not supported by the binary writer",
            -1,
        ))
    }

    fn write_const(&mut self, value: &WasmConst) -> Result<(), CompileError> {
        let instruction = match value {
            WasmConst::I32(v) => Instruction::I32Const(*v),
            WasmConst::I64(v) => Instruction::I64Const(*v),
            WasmConst::F32(v) => Instruction::F32Const(Ieee32::from(*v)),
            WasmConst::F64(v) => Instruction::F64Const(Ieee64::from(*v)),
        };
        self.push(RawInst::Plain(instruction))
    }

    fn write_default_value(&mut self, ty: &AnyType) -> Result<(), CompileError> {
        match ty {
            AnyType::Value(ValueType::I32) => self.push(RawInst::Plain(Instruction::I32Const(0))),
            AnyType::Value(ValueType::I64) => self.push(RawInst::Plain(Instruction::I64Const(0))),
            AnyType::Value(ValueType::F32) => {
                self.push(RawInst::Plain(Instruction::F32Const(Ieee32::from(0.0))))
            }
            AnyType::Value(ValueType::F64) => {
                self.push(RawInst::Plain(Instruction::F64Const(Ieee64::from(0.0))))
            }
            AnyType::Value(ValueType::ExternRef) => {
                self.push(RawInst::Plain(Instruction::RefNull(HeapType::Abstract {
                    shared: false,
                    ty: AbstractHeapType::Extern,
                })))
            }
            AnyType::Struct(class_index) => self.push(RawInst::RefNullStruct(*class_index)),
        }
    }

    fn write_local(&mut self, op: LocalOperator, index: u32) -> Result<(), CompileError> {
        let instruction = match op {
            LocalOperator::Get => Instruction::LocalGet(index),
            LocalOperator::Set => Instruction::LocalSet(index),
            LocalOperator::Tee => Instruction::LocalTee(index),
        };
        self.push(RawInst::Plain(instruction))
    }

    fn write_numeric_op(
        &mut self,
        op: NumericOperator,
        ty: ValueType,
    ) -> Result<(), CompileError> {
        use NumericOperator::*;
        let instruction = match (ty, op) {
            (ValueType::I32, Add) => Instruction::I32Add,
            (ValueType::I32, Sub) => Instruction::I32Sub,
            (ValueType::I32, Mul) => Instruction::I32Mul,
            (ValueType::I32, Div) => Instruction::I32DivS,
            (ValueType::I32, Eq) => Instruction::I32Eq,
            (ValueType::I32, Ne) => Instruction::I32Ne,
            (ValueType::I32, Lt) => Instruction::I32LtS,
            (ValueType::I32, Gt) => Instruction::I32GtS,
            (ValueType::I32, Le) => Instruction::I32LeS,
            (ValueType::I32, Ge) => Instruction::I32GeS,
            (ValueType::I64, Add) => Instruction::I64Add,
            (ValueType::I64, Sub) => Instruction::I64Sub,
            (ValueType::I64, Mul) => Instruction::I64Mul,
            (ValueType::I64, Div) => Instruction::I64DivS,
            (ValueType::I64, Eq) => Instruction::I64Eq,
            (ValueType::I64, Ne) => Instruction::I64Ne,
            (ValueType::I64, Lt) => Instruction::I64LtS,
            (ValueType::I64, Gt) => Instruction::I64GtS,
            (ValueType::I64, Le) => Instruction::I64LeS,
            (ValueType::I64, Ge) => Instruction::I64GeS,
            (ValueType::F32, Add) => Instruction::F32Add,
            (ValueType::F32, Sub) => Instruction::F32Sub,
            (ValueType::F32, Mul) => Instruction::F32Mul,
            (ValueType::F32, Div) => Instruction::F32Div,
            (ValueType::F32, Eq) => Instruction::F32Eq,
            (ValueType::F32, Ne) => Instruction::F32Ne,
            (ValueType::F32, Lt) => Instruction::F32Lt,
            (ValueType::F32, Gt) => Instruction::F32Gt,
            (ValueType::F32, Le) => Instruction::F32Le,
            (ValueType::F32, Ge) => Instruction::F32Ge,
            (ValueType::F64, Add) => Instruction::F64Add,
            (ValueType::F64, Sub) => Instruction::F64Sub,
            (ValueType::F64, Mul) => Instruction::F64Mul,
            (ValueType::F64, Div) => Instruction::F64Div,
            (ValueType::F64, Eq) => Instruction::F64Eq,
            (ValueType::F64, Ne) => Instruction::F64Ne,
            (ValueType::F64, Lt) => Instruction::F64Lt,
            (ValueType::F64, Gt) => Instruction::F64Gt,
            (ValueType::F64, Le) => Instruction::F64Le,
            (ValueType::F64, Ge) => Instruction::F64Ge,
            (ValueType::ExternRef, _) => {
                return Err(CompileError::compiler_error(
                    "Numeric operation on a reference type",
                ))
            }
        };
        self.push(RawInst::Plain(instruction))
    }

    fn write_block(&mut self, op: BlockOperator, depth: Option<u32>) -> Result<(), CompileError> {
        let instruction = match op {
            BlockOperator::Block => Instruction::Block(BlockType::Empty),
            BlockOperator::Loop => Instruction::Loop(BlockType::Empty),
            BlockOperator::If => Instruction::If(BlockType::Empty),
            BlockOperator::Else => Instruction::Else,
            BlockOperator::End => Instruction::End,
            BlockOperator::Br => Instruction::Br(depth.unwrap_or(0)),
            BlockOperator::BrIf => Instruction::BrIf(depth.unwrap_or(0)),
            BlockOperator::Return => Instruction::Return,
            BlockOperator::Drop => Instruction::Drop,
            BlockOperator::Unreachable => Instruction::Unreachable,
            BlockOperator::Try
            | BlockOperator::Catch
            | BlockOperator::Throw
            | BlockOperator::Rethrow => {
                if self.options.use_eh() {
                    return Err(CompileError::unsupported(
                        "Exception handling is not supported by the binary writer",
                        -1,
                    ));
                }
                // a no-op with exception handling disabled
                return Ok(());
            }
        };
        self.push(RawInst::Plain(instruction))
    }

    fn write_function_call(&mut self, name: &FunctionName) -> Result<(), CompileError> {
        self.push(RawInst::Call(name.signature_name.clone()))
    }

    fn write_virtual_function_call(
        &mut self,
        name: &FunctionName,
        receiver: &StructType,
        slot: usize,
    ) -> Result<(), CompileError> {
        // receiver is on the stack: read its vtable base, add the slot and
        // dispatch through the shared funcref table
        self.push(RawInst::StructGet {
            class_index: receiver.class_index(),
            field_index: 0,
        })?;
        self.push(RawInst::Plain(Instruction::I32Const(slot as i32)))?;
        self.push(RawInst::Plain(Instruction::I32Add))?;
        self.push(RawInst::CallIndirect {
            type_of: name.signature_name.clone(),
        })
    }

    fn write_struct_operation(
        &mut self,
        op: StructOperator,
        struct_type: &StructType,
        field_index: Option<u32>,
    ) -> Result<(), CompileError> {
        let class_index = struct_type.class_index();
        match op {
            StructOperator::New => self.push(RawInst::StructNew(class_index)),
            StructOperator::NewDefault => {
                if self.options.use_gc() {
                    // the generator already pushed every field initializer
                    self.push(RawInst::StructNew(class_index))
                } else {
                    self.push(RawInst::StructNewDefault(class_index))
                }
            }
            StructOperator::Get => self.push(RawInst::StructGet {
                class_index,
                field_index: field_index.unwrap_or(0),
            }),
            StructOperator::Set => self.push(RawInst::StructSet {
                class_index,
                field_index: field_index.unwrap_or(0),
            }),
        }
    }

    fn prepare_finish(&mut self) -> Result<(), CompileError> {
        Ok(())
    }
}

fn type_key(params: &[AnyType], results: &[AnyType]) -> String {
    let mut key = String::new();
    for ty in params {
        key.push_str(&format!("{ty},"));
    }
    key.push_str("->");
    for ty in results {
        key.push_str(&format!("{ty},"));
    }
    key
}

fn lower(ty: &AnyType, struct_type_base: u32) -> ValType {
    match ty {
        AnyType::Value(ValueType::I32) => ValType::I32,
        AnyType::Value(ValueType::I64) => ValType::I64,
        AnyType::Value(ValueType::F32) => ValType::F32,
        AnyType::Value(ValueType::F64) => ValType::F64,
        AnyType::Value(ValueType::ExternRef) => ValType::EXTERNREF,
        AnyType::Struct(class_index) => ValType::Ref(RefType {
            nullable: true,
            heap_type: HeapType::Concrete(struct_type_base + class_index),
        }),
    }
}

/// Group consecutive locals of the same type into (count, type) runs for
/// the compact locals encoding.
fn group_locals(locals: &[AnyType], struct_type_base: u32) -> Vec<(u32, ValType)> {
    let mut grouped: Vec<(u32, ValType)> = Vec::new();
    for ty in locals {
        let val_type = lower(ty, struct_type_base);
        match grouped.last_mut() {
            Some((count, last)) if *last == val_type => *count += 1,
            _ => grouped.push((1, val_type)),
        }
    }
    grouped
}
