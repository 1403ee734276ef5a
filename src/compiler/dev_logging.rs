// CODEGEN LOGGING MACROS
//
// Progress output while scanning and emitting functions. Compiled out
// entirely unless the `verbose_codegen` feature is enabled.

#[macro_export]
#[cfg(feature = "verbose_codegen")]
macro_rules! codegen_log {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "verbose_codegen"))]
macro_rules! codegen_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}
