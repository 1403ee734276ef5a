//! Interned string literals and their synthetic accessor function.

use rustc_hash::FxHashMap;

use crate::compiler::codegen::function_manager::FunctionManager;
use crate::compiler::codegen::function_name::FunctionName;
use crate::compiler::codegen::module_writer::ModuleWriter;
use crate::CompileError;

/// The synthetic accessor that turns a literal id into a string reference
/// at runtime. The body is writer territory; at this layer it is an
/// identity stub carried as text code.
const ACCESSOR_CLASS: &str = "classlift/Strings";
const ACCESSOR_METHOD: &str = "literal";
const ACCESSOR_SIGNATURE: &str = "(I)I";
const ACCESSOR_BODY: &str = "local.get 0";

/// Interns string literals in first-use order and emits them as one data
/// segment at finalize time.
#[derive(Default)]
pub struct StringManager {
    ids: FxHashMap<String, u32>,
    order: Vec<String>,
    accessor: Option<FunctionName>,
}

impl StringManager {
    pub fn new() -> StringManager {
        StringManager::default()
    }

    /// Register the synthetic functions this manager needs. Called once
    /// when the generator is created, before anything is scanned.
    pub fn init(&mut self, functions: &mut FunctionManager) {
        let accessor = FunctionName::synthetic_text(
            ACCESSOR_CLASS,
            ACCESSOR_METHOD,
            ACCESSOR_SIGNATURE,
            ACCESSOR_BODY,
        );
        functions.mark_as_known(&accessor);
        self.accessor = Some(accessor);
    }

    /// The function a builder should call to materialize a string literal.
    pub fn accessor(&self) -> Option<&FunctionName> {
        self.accessor.as_ref()
    }

    /// Intern a literal and return its id. The first literal makes the
    /// accessor function reachable.
    pub fn get_literal_id(&mut self, literal: &str, functions: &mut FunctionManager) -> u32 {
        if let Some(&id) = self.ids.get(literal) {
            return id;
        }
        if let Some(accessor) = &self.accessor {
            functions.mark_as_needed(accessor);
        }
        let id = self.order.len() as u32;
        self.ids.insert(literal.to_string(), id);
        self.order.push(literal.to_string());
        id
    }

    pub fn literal_count(&self) -> usize {
        self.order.len()
    }

    /// Emit the interned literals as a single length-prefixed data segment.
    pub fn prepare_finish<W: ModuleWriter>(&mut self, writer: &mut W) -> Result<(), CompileError> {
        if self.order.is_empty() {
            return Ok(());
        }
        let mut data = Vec::new();
        for literal in &self.order {
            let bytes = literal.as_bytes();
            data.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            data.extend_from_slice(bytes);
        }
        writer.write_string_data(&data)
    }
}
