//! # Module Generation Pipeline
//!
//! Transforms parsed class files into a typed WebAssembly instruction stream
//! driven through a pluggable `ModuleWriter`.
//!
//! The pipeline runs in four phases, all owned by
//! [`module_generator::ModuleGenerator`]:
//!
//! 1. **Prepare**: every library class is cached with the loader, class and
//!    method annotations (`@Replace`, `@Partial`, `@Import`, `@Export`) are
//!    registered, exports become reachability roots.
//! 2. **Scan**: the needed-function worklist is drained. Each method body
//!    is fetched (honoring replacements), its instructions are produced, and
//!    every call marks its callee as needed. Unresolved references walk the
//!    superclass chain, then interface defaults.
//! 3. **Finalize**: imports, function types and struct/vtable layouts are
//!    written; the scan re-runs because vtable resolution can add override
//!    methods.
//! 4. **Emit**: every still-needed function is streamed to the writer with
//!    in-stream fix-ups for vtable injection, source lines and exception
//!    blocks.

pub mod code_builder;
pub mod function_manager;
pub mod function_name;
pub mod instructions;
pub mod module_generator;
pub mod module_writer;
pub mod optimizer;
pub mod string_manager;
pub mod trace_writer;
pub mod type_manager;
pub mod value_types;
pub mod wasm;
pub mod wat_parser;

#[cfg(test)]
mod function_manager_tests;
#[cfg(test)]
mod type_manager_tests;
#[cfg(test)]
mod codegen_tests;
