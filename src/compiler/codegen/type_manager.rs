//! Class indices, struct field layout and vtable resolution.

use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::compiler::classfile::loader::ClassFileLoader;
use crate::compiler::classfile::ClassFile;
use crate::compiler::codegen::function_manager::FunctionManager;
use crate::compiler::codegen::function_name::FunctionName;
use crate::compiler::codegen::module_writer::ModuleWriter;
use crate::compiler::codegen::value_types::{parse_field_type, AnyType, ValueType};
use crate::CompileError;

/// Name of the synthetic vtable field injected into every struct layout.
/// The leading dot keeps it out of the way of any source-level field name.
pub const VTABLE_FIELD: &str = ".vtable";

#[derive(Debug, Clone)]
pub struct NamedStorageType {
    pub name: String,
    pub ty: AnyType,
}

/// The compiled shape of one class: a stable class index, the ordered field
/// list (vtable field first, then superclass fields, then own fields) and
/// the resolved vtable.
#[derive(Debug)]
pub struct StructType {
    name: String,
    class_index: u32,
    fields: Vec<NamedStorageType>,
    vtable: Vec<FunctionName>,
    /// (method name, signature) → vtable slot; slots are shared across the
    /// class hierarchy
    slots: FxHashMap<String, usize>,
    /// Base of this class's vtable in the module's dispatch table; also the
    /// value the vtable field is initialized with on construction
    vtable_id: i32,
    finished: bool,
}

impl StructType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_index(&self) -> u32 {
        self.class_index
    }

    pub fn fields(&self) -> &[NamedStorageType] {
        &self.fields
    }

    pub fn vtable(&self) -> &[FunctionName] {
        &self.vtable
    }

    pub fn vtable_slot(&self, method_name: &str, signature: &str) -> Option<usize> {
        self.slots.get(&slot_key(method_name, signature)).copied()
    }

    pub fn vtable_id(&self) -> i32 {
        self.vtable_id
    }
}

fn slot_key(method_name: &str, signature: &str) -> String {
    format!("{method_name}{signature}")
}

/// Assigns class indices and builds struct layouts and vtables for every
/// class the compilation touches.
#[derive(Default)]
pub struct TypeManager {
    types: Vec<StructType>,
    indices: FxHashMap<String, u32>,
}

impl TypeManager {
    pub fn new() -> TypeManager {
        TypeManager::default()
    }

    /// Get or assign the class index for a name. Indices are contiguous and
    /// start at zero; repeated calls are idempotent.
    pub fn value_of(&mut self, class_name: &str) -> u32 {
        if let Some(&index) = self.indices.get(class_name) {
            return index;
        }
        let index = self.types.len() as u32;
        self.types.push(StructType {
            name: class_name.to_string(),
            class_index: index,
            fields: vec![NamedStorageType {
                name: VTABLE_FIELD.to_string(),
                ty: AnyType::Value(ValueType::I32),
            }],
            vtable: Vec::new(),
            slots: FxHashMap::default(),
            vtable_id: -1,
            finished: false,
        });
        self.indices.insert(class_name.to_string(), index);
        index
    }

    pub fn get(&self, class_index: u32) -> &StructType {
        &self.types[class_index as usize]
    }

    pub fn by_name(&self, class_name: &str) -> Option<&StructType> {
        self.indices
            .get(class_name)
            .map(|&index| &self.types[index as usize])
    }

    pub fn count(&self) -> usize {
        self.types.len()
    }

    /// Resolve field layouts and vtables for every registered type and emit
    /// them through the writer. Laying out one type can register new types
    /// (field and superclass references), so the loop chases the growing
    /// list. Vtable entries are the most-derived override for each slot and
    /// are marked as needed, which can put new methods on the scan
    /// worklist.
    pub fn prepare_finish<W: ModuleWriter>(
        &mut self,
        writer: &mut W,
        functions: &mut FunctionManager,
        loader: &mut ClassFileLoader,
    ) -> Result<(), CompileError> {
        let mut next_vtable_id = 0;
        let mut index = 0;
        while index < self.types.len() {
            if self.types[index].finished {
                index += 1;
                continue;
            }
            let name = self.types[index].name.clone();
            let chain = self.class_chain(&name, loader)?;
            // a used class makes its superclasses used types as well
            for class_file in &chain {
                self.value_of(&class_file.this_class);
            }

            let mut fields = vec![NamedStorageType {
                name: VTABLE_FIELD.to_string(),
                ty: AnyType::Value(ValueType::I32),
            }];
            let mut vtable: Vec<FunctionName> = Vec::new();
            let mut slots: FxHashMap<String, usize> = FxHashMap::default();

            for class_file in &chain {
                for field in &class_file.fields {
                    if field.is_static {
                        continue;
                    }
                    fields.push(NamedStorageType {
                        name: field.name.clone(),
                        ty: parse_field_type(&field.signature, self)?,
                    });
                }
                for method in &class_file.methods {
                    if method.is_static || method.name == "<init>" || method.name == "<clinit>" {
                        continue;
                    }
                    let entry = FunctionName::from_method(method);
                    let key = slot_key(&method.name, &method.signature);
                    match slots.get(&key) {
                        // a more derived class overrides an inherited slot
                        Some(&slot) => vtable[slot] = entry,
                        None => {
                            slots.insert(key, vtable.len());
                            vtable.push(entry);
                        }
                    }
                }
            }

            for entry in &vtable {
                functions.mark_as_needed(entry);
            }

            let struct_type = &mut self.types[index];
            struct_type.fields = fields;
            struct_type.vtable = vtable;
            struct_type.slots = slots;
            struct_type.vtable_id = next_vtable_id;
            struct_type.finished = true;
            next_vtable_id += self.types[index].vtable.len() as i32;

            writer.write_struct_type(&self.types[index])?;
            index += 1;
        }
        Ok(())
    }

    /// The class hierarchy from the root superclass down to `name`. Fails
    /// with MissingClass when a link cannot be produced and guards against
    /// superclass cycles.
    fn class_chain(
        &self,
        name: &str,
        loader: &mut ClassFileLoader,
    ) -> Result<VecDeque<Rc<ClassFile>>, CompileError> {
        let mut chain = VecDeque::new();
        let mut seen = FxHashSet::default();
        let mut current = Some(name.to_string());
        while let Some(class_name) = current {
            if !seen.insert(class_name.clone()) {
                return Err(CompileError::compiler_error(format!(
                    "Superclass cycle through {class_name}"
                )));
            }
            let class_file = loader
                .get(&class_name)?
                .ok_or_else(|| CompileError::missing_class(&class_name))?;
            current = class_file.super_class.clone();
            chain.push_front(class_file);
        }
        Ok(chain)
    }
}
