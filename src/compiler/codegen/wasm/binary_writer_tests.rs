use crate::compiler::codegen::function_name::FunctionName;
use crate::compiler::codegen::instructions::{LocalOperator, NumericOperator};
use crate::compiler::codegen::module_writer::{BindingKind, ModuleWriter};
use crate::compiler::codegen::value_types::{AnyType, ValueType};
use crate::compiler::codegen::wasm::binary_writer::BinaryModuleWriter;
use crate::compiler::codegen::wasm::validator::validate_module;
use crate::compiler::settings::WasmOptions;

const I32: AnyType = AnyType::Value(ValueType::I32);

fn write_signature(writer: &mut BinaryModuleWriter, name: &FunctionName) {
    writer.write_method_param_start(name).unwrap();
    writer
        .write_method_param(BindingKind::Param, &I32, Some("a"))
        .unwrap();
    writer
        .write_method_param(BindingKind::Param, &I32, Some("b"))
        .unwrap();
    writer
        .write_method_param(BindingKind::Result, &I32, None)
        .unwrap();
    writer.write_method_param_finish(name).unwrap();
}

#[test]
fn emits_a_valid_module_for_one_exported_function() {
    let name = FunctionName::new("app/Calc", "add", "(II)I");
    let mut writer = BinaryModuleWriter::new(WasmOptions::new());

    // finalize phase registers the signature
    write_signature(&mut writer, &name);
    writer.prepare_finish().unwrap();

    // emit phase
    writer.write_export(&name, "add").unwrap();
    writer.write_method_start(&name, Some("Calc.java")).unwrap();
    write_signature(&mut writer, &name);
    writer.write_local(LocalOperator::Get, 0).unwrap();
    writer.write_local(LocalOperator::Get, 1).unwrap();
    writer
        .write_numeric_op(NumericOperator::Add, ValueType::I32)
        .unwrap();
    writer.write_method_finish().unwrap();

    let bytes = writer.finish().unwrap();
    assert_eq!(&bytes[0..4], b"\0asm");
    validate_module(&bytes).unwrap();
}

#[test]
fn imports_come_before_defined_functions() {
    let log = FunctionName::new("app/Host", "log", "(II)I");
    let caller = FunctionName::new("app/Calc", "run", "(II)I");
    let mut writer = BinaryModuleWriter::new(WasmOptions::new());

    writer.prepare_import(&log, "env", "log").unwrap();
    write_signature(&mut writer, &log);
    write_signature(&mut writer, &caller);
    writer.prepare_finish().unwrap();

    writer.write_method_start(&caller, None).unwrap();
    write_signature(&mut writer, &caller);
    writer.write_local(LocalOperator::Get, 0).unwrap();
    writer.write_local(LocalOperator::Get, 1).unwrap();
    writer.write_function_call(&log).unwrap();
    writer.write_method_finish().unwrap();

    let bytes = writer.finish().unwrap();
    validate_module(&bytes).unwrap();
}

#[test]
fn identical_signatures_share_one_function_type() {
    let first = FunctionName::new("app/Calc", "add", "(II)I");
    let second = FunctionName::new("app/Calc", "mul", "(II)I");
    let mut writer = BinaryModuleWriter::new(WasmOptions::new());

    write_signature(&mut writer, &first);
    write_signature(&mut writer, &second);
    writer.prepare_finish().unwrap();

    for name in [&first, &second] {
        writer.write_method_start(name, None).unwrap();
        write_signature(&mut writer, name);
        writer.write_local(LocalOperator::Get, 0).unwrap();
        writer.write_method_finish().unwrap();
    }

    let bytes = writer.finish().unwrap();
    validate_module(&bytes).unwrap();
}
