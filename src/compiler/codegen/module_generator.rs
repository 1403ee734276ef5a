//! The module generation driver.
//!
//! Owns one of every manager for the lifetime of a compilation and drives
//! the four phases: prepare, scan, finalize, emit. See the module-level
//! docs in [`crate::compiler::codegen`] for the phase overview.

use std::path::PathBuf;

use crate::codegen_log;
use crate::compiler::classfile::library::load_library;
use crate::compiler::classfile::loader::{ClassFileLoader, ClasspathLoader};
use crate::compiler::classfile::{
    ClassFile, ClassFileParser, MethodInfo, EXPORT_ANNOTATION, IMPORT_ANNOTATION,
    PARTIAL_ANNOTATION, REPLACE_ANNOTATION, TEXT_CODE_ANNOTATION,
};
use crate::compiler::codegen::code_builder::{BuildContext, CodeBuilder, MethodCode};
use crate::compiler::codegen::function_manager::FunctionManager;
use crate::compiler::codegen::function_name::{FunctionName, SyntheticKind};
use crate::compiler::codegen::instructions::{
    BlockOperator, InstructionKind, StructOperator, WasmConst, WasmInstruction,
};
use crate::compiler::codegen::module_writer::{BindingKind, ModuleWriter};
use crate::compiler::codegen::optimizer::CodeOptimizer;
use crate::compiler::codegen::string_manager::StringManager;
use crate::compiler::codegen::type_manager::{TypeManager, VTABLE_FIELD};
use crate::compiler::codegen::value_types::{parse_method_signature, AnyType};
use crate::compiler::codegen::wat_parser::WatParser;
use crate::CompileError;

/// Generates one WebAssembly module from a set of class files.
pub struct ModuleGenerator<W: ModuleWriter> {
    writer: W,
    loader: ClassFileLoader,
    code_builder: Box<dyn CodeBuilder>,
    wat_parser: WatParser,
    functions: FunctionManager,
    types: TypeManager,
    strings: StringManager,
    optimizer: CodeOptimizer,
    /// Source file of the class currently being processed, for error context
    source_file: Option<String>,
    /// Class currently being processed, for error context
    class_name: Option<String>,
}

impl<W: ModuleWriter> ModuleGenerator<W> {
    pub fn new(
        writer: W,
        code_builder: Box<dyn CodeBuilder>,
        classpath: Box<dyn ClasspathLoader>,
    ) -> ModuleGenerator<W> {
        let mut functions = FunctionManager::new();
        let mut strings = StringManager::new();
        strings.init(&mut functions);
        ModuleGenerator {
            writer,
            loader: ClassFileLoader::new(classpath),
            code_builder,
            wat_parser: WatParser::new(),
            functions,
            types: TypeManager::new(),
            strings,
            optimizer: CodeOptimizer::new(),
            source_file: None,
            class_name: None,
        }
    }

    pub fn functions(&self) -> &FunctionManager {
        &self.functions
    }

    pub fn types(&self) -> &TypeManager {
        &self.types
    }

    pub fn loader_mut(&mut self) -> &mut ClassFileLoader {
        &mut self.loader
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Walk every library and prepare each class file it contains. Parse
    /// failures skip the class; everything else is fatal.
    pub fn scan_libraries(
        &mut self,
        libraries: &[PathBuf],
        parser: &dyn ClassFileParser,
    ) -> Result<(), CompileError> {
        for library in libraries {
            for class_file in load_library(library, parser)? {
                self.prepare(class_file)?;
            }
        }
        Ok(())
    }

    /// Register one class: cache it with the loader, apply class-level
    /// `@Replace`/`@Partial` records and inspect every method's
    /// annotations. Exported methods become reachability roots.
    pub fn prepare(&mut self, class_file: ClassFile) -> Result<(), CompileError> {
        self.source_file = class_file.source_file.clone();
        self.class_name = Some(class_file.this_class.clone());

        if let Some(values) = class_file.annotation(REPLACE_ANNOTATION) {
            if let Some(target) = values.get("value") {
                self.loader.replace(target, class_file.clone());
            }
        }
        if let Some(values) = class_file.annotation(PARTIAL_ANNOTATION) {
            if let Some(target) = values.get("value") {
                self.loader.partial(target, class_file.clone());
            }
        }

        for method in &class_file.methods {
            Self::prepare_method(&mut self.functions, method).map_err(|e| {
                e.with_context(self.source_file.as_deref(), self.class_name.as_deref(), -1)
            })?;
        }

        self.loader.cache(class_file);
        Ok(())
    }

    fn prepare_method(
        functions: &mut FunctionManager,
        method: &MethodInfo,
    ) -> Result<(), CompileError> {
        let name = FunctionName::from_method(method);
        if functions.is_known(&name) {
            return Ok(());
        }
        if let Some(values) = method.annotation(REPLACE_ANNOTATION) {
            // register this name so its annotations are not processed a
            // second time; is_known() returns true from here on
            functions.set_need_this(&name);
            if let Some(target) = values.get("value") {
                let target_name = FunctionName::parse(target)?;
                functions.add_replacement(&target_name, method.clone());
            }
        }
        if let Some(values) = method.annotation(IMPORT_ANNOTATION) {
            if !method.is_static {
                crate::return_annotation_error!(format!(
                    "Import method must be static: {}",
                    name.signature_name
                ));
            }
            functions.mark_as_import(&name, values.clone());
            return Ok(());
        }
        if method.annotation(EXPORT_ANNOTATION).is_some() {
            if !method.is_static {
                crate::return_annotation_error!(format!(
                    "Export method must be static: {}",
                    name.signature_name
                ));
            }
            functions.mark_as_needed(&name);
        }
        Ok(())
    }

    /// Drain the worklist. Scanning one method can mark more methods as
    /// needed, so the loop runs until the worklist is empty.
    fn scan_functions(&mut self) -> Result<(), CompileError> {
        'next: while let Some(next) = self.functions.next_scan_later() {
            self.class_name = Some(next.class_name.clone());

            if let Some(kind) = next.synthetic() {
                match kind {
                    SyntheticKind::TextCode { source } => {
                        let code = self.wat_parser.parse(source, -1)?;
                        self.scan_method(&code);
                    }
                    SyntheticKind::Import { annotation } => {
                        self.functions.mark_as_import(&next, annotation.clone());
                    }
                }
                self.functions.mark_as_scanned(&next, false);
                continue;
            }

            codegen_log!("scan {}", next.signature_name);
            let class_file = self.loader.get(&next.class_name)?;
            let mut method = None;
            if let Some(class_file) = &class_file {
                self.source_file = class_file.source_file.clone();
                self.class_name = Some(class_file.this_class.clone());
                method = class_file.method(&next.method_name, &next.signature).cloned();
            }
            if method.is_none() {
                method = self.functions.replacement(&next);
            }
            if let Some(found) = method {
                let body = self.functions.replace(&next, found.clone());
                if let Some(code) = self.create_instructions(&body)? {
                    self.scan_method(&code);
                }
                let needs_this = !found.is_static || found.name == "<init>";
                self.functions.mark_as_scanned(&next, needs_this);
                continue;
            }

            // search for a superclass with the same signature
            let mut super_file = class_file.clone();
            while let Some(current) = super_file {
                if let Some(found) = current.method(&next.method_name, &next.signature) {
                    let found_name = FunctionName::from_method(found);
                    self.functions.mark_as_needed(&found_name);
                    self.functions.set_alias(&next, found_name);
                    continue 'next;
                }
                super_file = match &current.super_class {
                    Some(super_name) => Some(
                        self.loader
                            .get(super_name)?
                            .ok_or_else(|| CompileError::missing_class(super_name))?,
                    ),
                    None => None,
                };
            }

            // search for a default implementation in an interface
            let mut super_file = class_file;
            while let Some(current) = super_file {
                for interface in &current.interfaces {
                    let interface_file = self
                        .loader
                        .get(interface)?
                        .ok_or_else(|| CompileError::missing_class(interface))?;
                    if let Some(found) =
                        interface_file.method(&next.method_name, &next.signature)
                    {
                        let found_name = FunctionName::from_method(found);
                        self.functions.mark_as_needed(&found_name);
                        self.functions.set_alias(&next, found_name);
                        continue 'next;
                    }
                }
                super_file = match &current.super_class {
                    Some(super_name) => Some(
                        self.loader
                            .get(super_name)?
                            .ok_or_else(|| CompileError::missing_class(super_name))?,
                    ),
                    None => None,
                };
            }

            return Err(CompileError::missing_function(&next.signature_name)
                .with_context(self.source_file.as_deref(), self.class_name.as_deref(), -1));
        }
        Ok(())
    }

    /// List every method the instructions call. Only direct and virtual
    /// calls feed reachability; interface calls are rejected at emission.
    fn scan_method(&mut self, code: &MethodCode) {
        for instruction in &code.instructions {
            match instruction.kind() {
                InstructionKind::Call | InstructionKind::CallVirtual => {
                    if let Some(callee) = instruction.callee() {
                        self.functions.mark_as_needed(callee);
                    }
                }
                _ => {}
            }
        }
    }

    /// Build the instruction list for a method, or `None` for an import.
    fn create_instructions(
        &mut self,
        method: &MethodInfo,
    ) -> Result<Option<MethodCode>, CompileError> {
        let first_line = method.code.as_ref().map(|c| c.first_line).unwrap_or(-1);
        self.create_instructions_inner(method, first_line)
            .map_err(|e| {
                e.with_context(
                    self.source_file.as_deref(),
                    self.class_name.as_deref(),
                    first_line,
                )
            })
    }

    fn create_instructions_inner(
        &mut self,
        method: &MethodInfo,
        first_line: i32,
    ) -> Result<Option<MethodCode>, CompileError> {
        if let Some(values) = method.annotation(IMPORT_ANNOTATION) {
            self.functions
                .mark_as_import(&FunctionName::from_method(method), values.clone());
            return Ok(None);
        }
        if let Some(values) = method.annotation(TEXT_CODE_ANNOTATION) {
            let source = values.get("value").ok_or_else(|| {
                CompileError::new(
                    format!("TextCode annotation without code: {}", method.name),
                    crate::compiler::compiler_errors::ErrorLocation::none(),
                    crate::ErrorType::Annotation,
                )
            })?;
            return Ok(Some(self.wat_parser.parse(source, first_line)?));
        }
        if let Some(code) = &method.code {
            let mut ctx = BuildContext {
                types: &mut self.types,
                functions: &mut self.functions,
                strings: &mut self.strings,
                loader: &mut self.loader,
                options: self.writer.options(),
            };
            let built = self.code_builder.build_code(code, method, &mut ctx)?;
            return Ok(Some(built));
        }
        // abstract and interface methods have no code attribute
        Err(CompileError::unsupported(
            format!(
                "Abstract or native method can not be used: {}",
                FunctionName::from_method(method).signature_name
            ),
            first_line,
        ))
    }

    /// Finish the prepare phase: run the scan to a fixed point, write the
    /// imports and function types, finalize struct types (which can add
    /// override methods, so the scan runs again) and flush strings. Must be
    /// called before [`finish`](Self::finish).
    pub fn prepare_finish(&mut self) -> Result<(), CompileError> {
        self.scan_functions()?;

        self.write_needed_imports()?;
        while let Some(name) = self.functions.next_needed_function() {
            self.write_method_signature(&name, None)?;
        }

        codegen_log!("scan finish");
        self.types
            .prepare_finish(&mut self.writer, &mut self.functions, &mut self.loader)?;
        // resolving vtables can mark override methods as needed
        self.scan_functions()?;
        self.write_needed_imports()?;
        while let Some(name) = self.functions.next_needed_function() {
            self.write_method_signature(&name, None)?;
        }

        self.functions.prepare_finish();
        self.strings.prepare_finish(&mut self.writer)?;
        self.writer.prepare_finish()
    }

    /// Write every needed import: the import directive, then its
    /// signature. An absent module defaults to the simple class name, an
    /// absent name to the method name.
    fn write_needed_imports(&mut self) -> Result<(), CompileError> {
        while let Some(name) = self.functions.next_needed_import() {
            self.functions.mark_as_written(&name);
            let annotation = self.functions.import_annotation(&name).cloned().unwrap_or_default();
            let module = annotation
                .get("module")
                .filter(|m| !m.is_empty())
                .cloned()
                .unwrap_or_else(|| simple_class_name(&name.class_name).to_string());
            let import_name = annotation
                .get("name")
                .filter(|n| !n.is_empty())
                .cloned()
                .unwrap_or_else(|| name.method_name.clone());
            self.writer.prepare_import(&name, &module, &import_name)?;
            self.write_method_signature(&name, None)?;
        }
        Ok(())
    }

    /// Emit every still-needed function. Emission itself can append late
    /// override methods to the write bucket; they are picked up before the
    /// loop ends.
    pub fn finish(&mut self) -> Result<(), CompileError> {
        while let Some(next) = self.functions.next_write_later() {
            // clear stale context in case an error is raised before the
            // class file is read
            self.source_file = None;
            self.class_name = Some(next.class_name.clone());

            if let Some(kind) = next.synthetic() {
                if let SyntheticKind::TextCode { source } = kind {
                    if self.functions.need_to_write(&next) {
                        let code = self.wat_parser.parse(source, -1)?;
                        self.write_method_impl(&next, code)?;
                    }
                }
                continue;
            }

            let class_file = self
                .loader
                .get(&next.class_name)?
                .ok_or_else(|| CompileError::missing_function(&next.signature_name))?;
            self.source_file = class_file.source_file.clone();
            self.class_name = Some(class_file.this_class.clone());

            match class_file.method(&next.method_name, &next.signature).cloned() {
                Some(mut method) => {
                    let mut name = next.clone();
                    if let Some(values) = method.annotation(TEXT_CODE_ANNOTATION).cloned() {
                        // a signature override re-keys the written function
                        if let Some(signature) = values.get("signature") {
                            name = FunctionName::new(&method.class_name, &method.name, signature);
                        }
                    } else {
                        method = self.functions.replace(&next, method);
                    }
                    if self.functions.need_to_write(&name) {
                        self.write_method(&name, &method).map_err(|e| {
                            e.with_context(
                                self.source_file.as_deref(),
                                self.class_name.as_deref(),
                                -1,
                            )
                        })?;
                    }
                }
                None => {
                    if self.functions.need_to_write(&next) {
                        return Err(CompileError::missing_function(&next.signature_name)
                            .with_context(
                                self.source_file.as_deref(),
                                self.class_name.as_deref(),
                                -1,
                            ));
                    }
                }
            }
        }
        Ok(())
    }

    fn write_method(
        &mut self,
        name: &FunctionName,
        method: &MethodInfo,
    ) -> Result<(), CompileError> {
        let code = match self.create_instructions(method)? {
            Some(code) => code,
            None => return Ok(()),
        };
        self.write_export(name, method)?;
        self.write_method_impl(name, code)
    }

    /// Write an export directive when the method asks for one. The export
    /// name defaults to the raw method name.
    fn write_export(
        &mut self,
        name: &FunctionName,
        method: &MethodInfo,
    ) -> Result<(), CompileError> {
        if let Some(values) = method.annotation(EXPORT_ANNOTATION) {
            let export_name = values
                .get("name")
                .cloned()
                .unwrap_or_else(|| method.name.clone());
            self.writer.write_export(name, &export_name)?;
        }
        Ok(())
    }

    fn write_method_impl(
        &mut self,
        name: &FunctionName,
        mut code: MethodCode,
    ) -> Result<(), CompileError> {
        self.writer
            .write_method_start(name, self.source_file.as_deref())?;
        self.functions.mark_as_written(name);
        self.write_method_signature(name, Some(&code))?;

        self.optimizer.optimize(&mut code.instructions);

        let mut last_source_line = -1;
        for instruction in &code.instructions {
            self.write_instruction(instruction, &mut last_source_line)
                .map_err(|e| e.with_line(instruction.line_number()))?;
        }
        self.writer.write_method_finish()
    }

    fn write_instruction(
        &mut self,
        instruction: &WasmInstruction,
        last_source_line: &mut i32,
    ) -> Result<(), CompileError> {
        // source-map information
        let line = instruction.line_number();
        if line >= 0 && line != *last_source_line {
            self.writer.mark_source_line(line)?;
            *last_source_line = line;
        }

        match instruction {
            WasmInstruction::Block { op, .. } => match op {
                BlockOperator::Try
                | BlockOperator::Catch
                | BlockOperator::Throw
                | BlockOperator::Rethrow => {
                    if self.writer.options().use_eh() {
                        self.writer.write_exception()?;
                    }
                }
                _ => {}
            },
            WasmInstruction::Call { name, .. } | WasmInstruction::CallVirtual { name, .. } => {
                // the optimizer may have introduced calls
                self.functions.mark_as_needed(name);
            }
            WasmInstruction::Struct {
                op: StructOperator::NewDefault,
                class_name,
                ..
            } => {
                if self.writer.options().use_gc() {
                    // construction installs the vtable: emit every field's
                    // initializer in field order
                    let struct_type = self.types.by_name(class_name).ok_or_else(|| {
                        CompileError::compiler_error(format!(
                            "Struct type was never registered: {class_name}"
                        ))
                    })?;
                    let vtable_id = struct_type.vtable_id();
                    for field in struct_type.fields() {
                        if field.name == VTABLE_FIELD {
                            self.writer.write_const(&WasmConst::I32(vtable_id))?;
                        } else {
                            self.writer.write_default_value(&field.ty)?;
                        }
                    }
                }
            }
            _ => {}
        }

        instruction.write_to(&mut self.writer, &self.types, &self.functions)
    }

    /// Write the parameter, result and local signature of a function. The
    /// implicit receiver comes first when the function needs one; names are
    /// taken from the code builder's debug info when available.
    fn write_method_signature(
        &mut self,
        name: &FunctionName,
        code: Option<&MethodCode>,
    ) -> Result<(), CompileError> {
        let debug_names = self.writer.options().debug_names;
        self.writer.write_method_param_start(name)?;

        let mut param_count = 0;
        if self.functions.need_this_parameter(name) {
            let class_index = self.types.value_of(&name.class_name);
            self.writer.write_method_param(
                BindingKind::Param,
                &AnyType::Struct(class_index),
                Some("this"),
            )?;
            param_count += 1;
        }

        let (params, results) = parse_method_signature(&name.signature, &mut self.types)?;
        for ty in &params {
            let param_name = code
                .filter(|_| debug_names)
                .and_then(|c| c.local_name(param_count));
            self.writer
                .write_method_param(BindingKind::Param, ty, param_name)?;
            param_count += 1;
        }
        for ty in &results {
            self.writer.write_method_param(BindingKind::Result, ty, None)?;
        }

        if let Some(code) = code {
            for (offset, local) in code.local_types(param_count).iter().enumerate() {
                let local_name = if debug_names {
                    code.local_name(param_count + offset)
                } else {
                    None
                };
                self.writer
                    .write_method_param(BindingKind::Local, &local.ty, local_name)?;
            }
        }
        self.writer.write_method_param_finish(name)
    }
}

fn simple_class_name(class_name: &str) -> &str {
    match class_name.rfind('/') {
        Some(index) => &class_name[index + 1..],
        None => class_name,
    }
}
