pub mod classfile;
pub mod codegen;
pub mod compiler_errors;
pub mod dev_logging;
pub mod settings;
