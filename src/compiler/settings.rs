//! Compiler options shared between the generator and the module writer.

/// Feature switches for one compilation. Owned by the module writer and read
/// by the generator through `ModuleWriter::options()`.
#[derive(Debug, Clone)]
pub struct WasmOptions {
    /// Emit structured exception handling. When off, exception block
    /// operations become no-ops in the writer.
    pub exception_handling: bool,
    /// Emit GC struct types and self-installing vtable fields on
    /// construction. When off, object construction is left to the writer's
    /// linear-memory strategy.
    pub garbage_collection: bool,
    /// Emit debug names for params and locals where the code builder has
    /// them.
    pub debug_names: bool,
}

impl WasmOptions {
    pub fn new() -> WasmOptions {
        WasmOptions {
            exception_handling: false,
            garbage_collection: true,
            debug_names: true,
        }
    }

    pub fn use_eh(&self) -> bool {
        self.exception_handling
    }

    pub fn use_gc(&self) -> bool {
        self.garbage_collection
    }
}

impl Default for WasmOptions {
    fn default() -> Self {
        Self::new()
    }
}
