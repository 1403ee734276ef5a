//! Validates finished binary modules with wasmparser.

use crate::compiler::compiler_errors::{ErrorLocation, ErrorType};
use crate::CompileError;

/// Validate a complete module. Returns a Compiler error with wasmparser's
/// diagnostics on failure, since invalid output is always a bug in the
/// writer or the instruction stream handed to it.
pub fn validate_module(wasm_bytes: &[u8]) -> Result<(), CompileError> {
    match wasmparser::validate(wasm_bytes) {
        Ok(_) => Ok(()),
        Err(e) => Err(CompileError::new(
            format!("Generated module failed validation: {e}"),
            ErrorLocation::none(),
            ErrorType::Compiler,
        )),
    }
}
