//! Identity of a callable: class + method + JVM signature.

use crate::compiler::classfile::{AnnotationValues, MethodInfo};
use crate::compiler::compiler_errors::{ErrorLocation, ErrorType};
use crate::CompileError;

/// Payload of a compiler-produced function that has no class-file method
/// behind it: either an inline textual-WebAssembly body or an import
/// annotation.
#[derive(Debug, Clone)]
pub enum SyntheticKind {
    TextCode { source: String },
    Import { annotation: AnnotationValues },
}

/// Identity of a callable. Equality and hashing use only the derived
/// `signature_name`, so freely cloned values compare like the original.
#[derive(Debug, Clone)]
pub struct FunctionName {
    /// Owning class in internal slash form, e.g. `java/lang/Math`
    pub class_name: String,
    pub method_name: String,
    /// JVM-style type signature, e.g. `(DD)D`
    pub signature: String,
    /// The canonical key: `class.method(signature)`
    pub signature_name: String,
    synthetic: Option<SyntheticKind>,
}

impl FunctionName {
    pub fn new(class_name: &str, method_name: &str, signature: &str) -> FunctionName {
        FunctionName {
            class_name: class_name.to_string(),
            method_name: method_name.to_string(),
            signature: signature.to_string(),
            signature_name: format!("{class_name}.{method_name}{signature}"),
            synthetic: None,
        }
    }

    pub fn from_method(method: &MethodInfo) -> FunctionName {
        FunctionName::new(&method.class_name, &method.name, &method.signature)
    }

    /// Parse a signature name like `java/lang/Math.sqrt(D)D`, the format
    /// `@Replace` annotations use to name their target.
    pub fn parse(signature_name: &str) -> Result<FunctionName, CompileError> {
        let paren = signature_name.find('(');
        let (front, signature) = match paren {
            Some(index) => signature_name.split_at(index),
            None => {
                return Err(CompileError::new(
                    format!("Malformed signature name: {signature_name}"),
                    ErrorLocation::none(),
                    ErrorType::Annotation,
                ))
            }
        };
        let dot = front.rfind('.').ok_or_else(|| {
            CompileError::new(
                format!("Malformed signature name: {signature_name}"),
                ErrorLocation::none(),
                ErrorType::Annotation,
            )
        })?;
        Ok(FunctionName::new(&front[..dot], &front[dot + 1..], signature))
    }

    /// A compiler-produced function whose body is textual WebAssembly.
    pub fn synthetic_text(
        class_name: &str,
        method_name: &str,
        signature: &str,
        source: &str,
    ) -> FunctionName {
        let mut name = FunctionName::new(class_name, method_name, signature);
        name.synthetic = Some(SyntheticKind::TextCode {
            source: source.to_string(),
        });
        name
    }

    /// A compiler-produced function provided by the host as an import.
    pub fn synthetic_import(
        class_name: &str,
        method_name: &str,
        signature: &str,
        annotation: AnnotationValues,
    ) -> FunctionName {
        let mut name = FunctionName::new(class_name, method_name, signature);
        name.synthetic = Some(SyntheticKind::Import { annotation });
        name
    }

    pub fn synthetic(&self) -> Option<&SyntheticKind> {
        self.synthetic.as_ref()
    }
}

impl PartialEq for FunctionName {
    fn eq(&self, other: &Self) -> bool {
        self.signature_name == other.signature_name
    }
}

impl Eq for FunctionName {}

impl std::hash::Hash for FunctionName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.signature_name.hash(state);
    }
}

impl std::fmt::Display for FunctionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.signature_name)
    }
}
