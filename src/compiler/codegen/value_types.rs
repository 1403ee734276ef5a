//! WebAssembly-facing type model and the JVM descriptor parser.

use crate::compiler::codegen::type_manager::TypeManager;
use crate::compiler::compiler_errors::{ErrorLocation, ErrorType};
use crate::CompileError;

/// A plain WebAssembly value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
    /// Opaque host reference; also the lowering of array types, which have
    /// no object model in this pipeline.
    ExternRef,
}

/// A parameter, result, local or field type: either a plain value type or a
/// reference to a compiled class, identified by its class index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyType {
    Value(ValueType),
    Struct(u32),
}

impl std::fmt::Display for AnyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnyType::Value(ValueType::I32) => write!(f, "i32"),
            AnyType::Value(ValueType::I64) => write!(f, "i64"),
            AnyType::Value(ValueType::F32) => write!(f, "f32"),
            AnyType::Value(ValueType::F64) => write!(f, "f64"),
            AnyType::Value(ValueType::ExternRef) => write!(f, "externref"),
            AnyType::Struct(index) => write!(f, "(ref {index})"),
        }
    }
}

/// Parse a JVM method descriptor like `(ILjava/lang/String;)D` into
/// parameter and result types. The void marker produces an empty result
/// list. Class references are registered with the type manager so every
/// signature mention mints a class index.
pub fn parse_method_signature(
    signature: &str,
    types: &mut TypeManager,
) -> Result<(Vec<AnyType>, Vec<AnyType>), CompileError> {
    let mut chars = signature.char_indices().peekable();
    match chars.next() {
        Some((_, '(')) => {}
        _ => return Err(signature_error(signature)),
    }

    let mut params = Vec::new();
    loop {
        match chars.peek() {
            Some((_, ')')) => {
                chars.next();
                break;
            }
            Some(_) => params.push(parse_one_type(signature, &mut chars, types)?),
            None => return Err(signature_error(signature)),
        }
    }

    let mut results = Vec::new();
    while let Some(&(_, c)) = chars.peek() {
        if c == 'V' {
            // void marker, nothing to emit
            chars.next();
            continue;
        }
        results.push(parse_one_type(signature, &mut chars, types)?);
    }
    Ok((params, results))
}

/// Parse a single field descriptor like `I` or `Ljava/lang/String;`.
pub fn parse_field_type(
    descriptor: &str,
    types: &mut TypeManager,
) -> Result<AnyType, CompileError> {
    let mut chars = descriptor.char_indices().peekable();
    let ty = parse_one_type(descriptor, &mut chars, types)?;
    if chars.next().is_some() {
        return Err(signature_error(descriptor));
    }
    Ok(ty)
}

fn parse_one_type(
    signature: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices>,
    types: &mut TypeManager,
) -> Result<AnyType, CompileError> {
    let (_, c) = chars.next().ok_or_else(|| signature_error(signature))?;
    match c {
        'Z' | 'B' | 'C' | 'S' | 'I' => Ok(AnyType::Value(ValueType::I32)),
        'J' => Ok(AnyType::Value(ValueType::I64)),
        'F' => Ok(AnyType::Value(ValueType::F32)),
        'D' => Ok(AnyType::Value(ValueType::F64)),
        'L' => {
            let start = match chars.peek() {
                Some(&(index, _)) => index,
                None => return Err(signature_error(signature)),
            };
            let mut end = start;
            for (index, c) in chars.by_ref() {
                if c == ';' {
                    end = index;
                    break;
                }
            }
            if end == start {
                return Err(signature_error(signature));
            }
            let class_name = &signature[start..end];
            Ok(AnyType::Struct(types.value_of(class_name)))
        }
        '[' => {
            // consume the component type; the array itself is opaque
            parse_one_type(signature, chars, types)?;
            Ok(AnyType::Value(ValueType::ExternRef))
        }
        _ => Err(signature_error(signature)),
    }
}

fn signature_error(signature: &str) -> CompileError {
    CompileError::new(
        format!("Malformed type signature: {signature}"),
        ErrorLocation::none(),
        ErrorType::Compiler,
    )
}
