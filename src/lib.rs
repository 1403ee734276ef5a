//! # classlift
//!
//! Compiles parsed class-file bytecode (a stack-machine IR produced from a
//! statically typed object-oriented source language) into WebAssembly
//! modules.
//!
//! The crate is built around the module generation pipeline in
//! [`compiler::codegen::module_generator::ModuleGenerator`]:
//!
//! 1. Scan libraries and register annotated classes/methods
//! 2. Drain the needed-function worklist, resolving virtual and interface
//!    references against the class hierarchy
//! 3. Finalize imports, function types and struct/vtable layouts
//! 4. Emit every still-needed function through a pluggable `ModuleWriter`
//!
//! The class-file parser, the bytecode-to-instruction builder and the module
//! writer back ends are collaborators consumed through traits; a
//! `wasm-encoder` backed binary writer ships in
//! [`compiler::codegen::wasm::binary_writer`].

pub mod compiler;

pub use compiler::compiler_errors::{CompileError, ErrorType};
pub use compiler::settings::WasmOptions;
