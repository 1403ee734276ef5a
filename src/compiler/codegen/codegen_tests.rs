use crate::compiler::codegen::instructions::{
    BlockOperator, LocalOperator, NumericOperator, WasmConst, WasmInstruction,
};
use crate::compiler::codegen::optimizer::CodeOptimizer;
use crate::compiler::codegen::type_manager::TypeManager;
use crate::compiler::codegen::value_types::{parse_method_signature, AnyType, ValueType};
use crate::compiler::codegen::wat_parser::WatParser;
use crate::ErrorType;

// =========================================================================
// Signature parsing
// =========================================================================

#[test]
fn parses_primitive_signatures() {
    let mut types = TypeManager::new();
    let (params, results) = parse_method_signature("(IJ)D", &mut types).unwrap();
    assert_eq!(
        params,
        vec![
            AnyType::Value(ValueType::I32),
            AnyType::Value(ValueType::I64)
        ]
    );
    assert_eq!(results, vec![AnyType::Value(ValueType::F64)]);
}

#[test]
fn void_results_are_empty() {
    let mut types = TypeManager::new();
    let (params, results) = parse_method_signature("()V", &mut types).unwrap();
    assert!(params.is_empty());
    assert!(results.is_empty());
}

#[test]
fn object_references_mint_class_indices() {
    let mut types = TypeManager::new();
    let (params, _) =
        parse_method_signature("(Ljava/lang/String;Ljava/lang/String;)V", &mut types).unwrap();
    // the same class appears once in the index space
    assert_eq!(params, vec![AnyType::Struct(0), AnyType::Struct(0)]);
    assert_eq!(types.count(), 1);
    assert_eq!(types.get(0).name(), "java/lang/String");
}

#[test]
fn arrays_lower_to_opaque_references() {
    let mut types = TypeManager::new();
    let (params, results) = parse_method_signature("([I[[D)[J", &mut types).unwrap();
    assert_eq!(
        params,
        vec![
            AnyType::Value(ValueType::ExternRef),
            AnyType::Value(ValueType::ExternRef)
        ]
    );
    assert_eq!(results, vec![AnyType::Value(ValueType::ExternRef)]);
}

#[test]
fn malformed_signatures_are_rejected() {
    let mut types = TypeManager::new();
    assert!(parse_method_signature("II)I", &mut types).is_err());
    assert!(parse_method_signature("(Q)V", &mut types).is_err());
    assert!(parse_method_signature("(Ljava/lang/String)V", &mut types).is_err());
}

// =========================================================================
// Text code parsing
// =========================================================================

#[test]
fn parses_a_folded_constant() {
    let parser = WatParser::new();
    let code = parser.parse("(i32.const 42)", 7).unwrap();
    assert_eq!(code.instructions.len(), 1);
    match &code.instructions[0] {
        WasmInstruction::Const {
            value: WasmConst::I32(42),
            line: 7,
        } => {}
        other => panic!("unexpected instruction: {other:?}"),
    }
}

#[test]
fn parses_locals_numerics_and_comments() {
    let parser = WatParser::new();
    let code = parser
        .parse("local.get 0 ;; first argument\nlocal.get 1\ni32.add", -1)
        .unwrap();
    assert_eq!(code.instructions.len(), 3);
    match &code.instructions[2] {
        WasmInstruction::Numeric {
            op: NumericOperator::Add,
            ty: ValueType::I32,
            ..
        } => {}
        other => panic!("unexpected instruction: {other:?}"),
    }
}

#[test]
fn parses_calls_by_signature_name() {
    let parser = WatParser::new();
    let code = parser.parse("(call $app/Host.log(I)V)", -1).unwrap();
    match &code.instructions[0] {
        WasmInstruction::Call { name, .. } => {
            assert_eq!(name.signature_name, "app/Host.log(I)V");
        }
        other => panic!("unexpected instruction: {other:?}"),
    }
}

#[test]
fn rejects_unknown_instructions() {
    let parser = WatParser::new();
    let err = parser.parse("i32.popcount_backwards", -1).unwrap_err();
    assert_eq!(err.error_type, ErrorType::TextCode);
}

// =========================================================================
// Peephole optimizer
// =========================================================================

fn get(index: u32) -> WasmInstruction {
    WasmInstruction::Local {
        op: LocalOperator::Get,
        index,
        line: -1,
    }
}

fn set(index: u32) -> WasmInstruction {
    WasmInstruction::Local {
        op: LocalOperator::Set,
        index,
        line: -1,
    }
}

#[test]
fn set_then_get_becomes_tee() {
    let optimizer = CodeOptimizer::new();
    let mut instructions = vec![set(2), get(2)];
    optimizer.optimize(&mut instructions);
    assert_eq!(instructions.len(), 1);
    match &instructions[0] {
        WasmInstruction::Local {
            op: LocalOperator::Tee,
            index: 2,
            ..
        } => {}
        other => panic!("unexpected instruction: {other:?}"),
    }
}

#[test]
fn get_then_set_of_the_same_local_is_removed() {
    let optimizer = CodeOptimizer::new();
    let mut instructions = vec![get(1), set(1), get(3)];
    optimizer.optimize(&mut instructions);
    assert_eq!(instructions.len(), 1);

    // different locals stay untouched
    let mut instructions = vec![get(1), set(2)];
    optimizer.optimize(&mut instructions);
    assert_eq!(instructions.len(), 2);
}

#[test]
fn dropped_constants_are_removed() {
    let optimizer = CodeOptimizer::new();
    let mut instructions = vec![
        WasmInstruction::Const {
            value: WasmConst::I32(9),
            line: -1,
        },
        WasmInstruction::Block {
            op: BlockOperator::Drop,
            depth: None,
            line: -1,
        },
    ];
    optimizer.optimize(&mut instructions);
    assert!(instructions.is_empty());
}

#[test]
fn identity_arithmetic_is_removed() {
    let optimizer = CodeOptimizer::new();
    let mut instructions = vec![
        get(0),
        WasmInstruction::Const {
            value: WasmConst::I32(0),
            line: -1,
        },
        WasmInstruction::Numeric {
            op: NumericOperator::Add,
            ty: ValueType::I32,
            line: -1,
        },
    ];
    optimizer.optimize(&mut instructions);
    assert_eq!(instructions.len(), 1);

    // adding a non-zero constant is kept
    let mut instructions = vec![
        get(0),
        WasmInstruction::Const {
            value: WasmConst::I32(5),
            line: -1,
        },
        WasmInstruction::Numeric {
            op: NumericOperator::Add,
            ty: ValueType::I32,
            line: -1,
        },
    ];
    optimizer.optimize(&mut instructions);
    assert_eq!(instructions.len(), 3);
}
