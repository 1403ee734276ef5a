use rustc_hash::FxHashMap;

use crate::compiler::classfile::loader::{ClassFileLoader, EmptyClasspath};
use crate::compiler::classfile::{ClassFile, Code, FieldInfo, MethodInfo};
use crate::compiler::codegen::function_manager::FunctionManager;
use crate::compiler::codegen::function_name::FunctionName;
use crate::compiler::codegen::trace_writer::TraceWriter;
use crate::compiler::codegen::type_manager::{TypeManager, VTABLE_FIELD};
use crate::compiler::codegen::value_types::{AnyType, ValueType};
use crate::compiler::settings::WasmOptions;
use crate::ErrorType;

fn virtual_method(class: &str, name: &str) -> MethodInfo {
    MethodInfo {
        class_name: class.to_string(),
        name: name.to_string(),
        signature: "()V".to_string(),
        is_static: false,
        annotations: FxHashMap::default(),
        code: Some(Code::new(vec![0xb1], 1)),
    }
}

fn class(
    name: &str,
    super_class: Option<&str>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
) -> ClassFile {
    ClassFile {
        this_class: name.to_string(),
        super_class: super_class.map(str::to_owned),
        interfaces: Vec::new(),
        source_file: None,
        annotations: FxHashMap::default(),
        methods,
        fields,
    }
}

fn field(name: &str, signature: &str) -> FieldInfo {
    FieldInfo {
        name: name.to_string(),
        signature: signature.to_string(),
        is_static: false,
    }
}

#[test]
fn class_indices_are_contiguous_and_idempotent() {
    let mut types = TypeManager::new();
    assert_eq!(types.value_of("app/A"), 0);
    assert_eq!(types.value_of("app/B"), 1);
    assert_eq!(types.value_of("app/A"), 0);
    assert_eq!(types.count(), 2);
    assert_eq!(types.get(1).name(), "app/B");
}

#[test]
fn layout_puts_the_vtable_field_first_and_super_fields_before_own() {
    let mut loader = ClassFileLoader::new(Box::new(EmptyClasspath));
    loader.cache(class("app/A", None, vec![field("base", "I")], Vec::new()));
    loader.cache(class(
        "app/B",
        Some("app/A"),
        vec![field("extra", "D")],
        Vec::new(),
    ));

    let mut types = TypeManager::new();
    types.value_of("app/B");
    let mut writer = TraceWriter::new(WasmOptions::new());
    let mut functions = FunctionManager::new();
    types
        .prepare_finish(&mut writer, &mut functions, &mut loader)
        .unwrap();

    let b = types.by_name("app/B").unwrap();
    let names: Vec<&str> = b.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec![VTABLE_FIELD, "base", "extra"]);
    assert_eq!(b.fields()[0].ty, AnyType::Value(ValueType::I32));
    assert_eq!(b.fields()[2].ty, AnyType::Value(ValueType::F64));
}

#[test]
fn vtable_selects_the_most_derived_override_and_shares_slots() {
    let mut loader = ClassFileLoader::new(Box::new(EmptyClasspath));
    loader.cache(class(
        "app/A",
        None,
        Vec::new(),
        vec![virtual_method("app/A", "f"), virtual_method("app/A", "g")],
    ));
    loader.cache(class(
        "app/B",
        Some("app/A"),
        Vec::new(),
        vec![virtual_method("app/B", "f")],
    ));

    let mut types = TypeManager::new();
    types.value_of("app/B");
    let mut writer = TraceWriter::new(WasmOptions::new());
    let mut functions = FunctionManager::new();
    types
        .prepare_finish(&mut writer, &mut functions, &mut loader)
        .unwrap();

    let b = types.by_name("app/B").unwrap();
    assert_eq!(b.vtable_slot("f", "()V"), Some(0));
    assert_eq!(b.vtable_slot("g", "()V"), Some(1));
    assert_eq!(b.vtable()[0], FunctionName::new("app/B", "f", "()V"));
    assert_eq!(b.vtable()[1], FunctionName::new("app/A", "g", "()V"));

    // the superclass became a used type with its own vtable and slots match
    let a = types.by_name("app/A").unwrap();
    assert_eq!(a.vtable_slot("f", "()V"), Some(0));
    assert_eq!(a.vtable()[0], FunctionName::new("app/A", "f", "()V"));

    // every override is on the worklist now
    assert!(functions.is_known(&FunctionName::new("app/B", "f", "()V")));
    assert!(functions.is_known(&FunctionName::new("app/A", "g", "()V")));

    // vtable bases follow class-index order
    assert_eq!(b.vtable_id(), 0);
    assert_eq!(a.vtable_id(), 2);
}

#[test]
fn constructors_and_statics_stay_out_of_the_vtable() {
    let mut constructor = virtual_method("app/A", "<init>");
    constructor.signature = "()V".to_string();
    let mut static_method = virtual_method("app/A", "helper");
    static_method.is_static = true;

    let mut loader = ClassFileLoader::new(Box::new(EmptyClasspath));
    loader.cache(class(
        "app/A",
        None,
        Vec::new(),
        vec![constructor, static_method, virtual_method("app/A", "f")],
    ));

    let mut types = TypeManager::new();
    types.value_of("app/A");
    let mut writer = TraceWriter::new(WasmOptions::new());
    let mut functions = FunctionManager::new();
    types
        .prepare_finish(&mut writer, &mut functions, &mut loader)
        .unwrap();

    let a = types.by_name("app/A").unwrap();
    assert_eq!(a.vtable().len(), 1);
    assert_eq!(a.vtable()[0].method_name, "f");
}

#[test]
fn missing_superclass_fails_the_hierarchy_walk() {
    let mut loader = ClassFileLoader::new(Box::new(EmptyClasspath));
    loader.cache(class("app/B", Some("app/Gone"), Vec::new(), Vec::new()));

    let mut types = TypeManager::new();
    types.value_of("app/B");
    let mut writer = TraceWriter::new(WasmOptions::new());
    let mut functions = FunctionManager::new();
    let err = types
        .prepare_finish(&mut writer, &mut functions, &mut loader)
        .unwrap_err();
    assert_eq!(err.error_type, ErrorType::MissingClass);
    assert!(err.msg.contains("app/Gone"));
}
