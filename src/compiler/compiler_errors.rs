//! # Compiler Error Handling
//!
//! Unified error type for the module generation pipeline. Every failure that
//! crosses a phase boundary is a [`CompileError`] carrying an [`ErrorType`]
//! from the pipeline's taxonomy and an [`ErrorLocation`] naming the source
//! file, class and line the failure was observed at.
//!
//! Errors raised deep inside per-method processing usually start with no
//! location at all; the generator attaches `(source_file, class_name, line)`
//! context on the way out via [`CompileError::with_context`], so the outer
//! caller always sees where compilation stopped.

use colour::{e_dark_yellow_ln, e_red_ln, e_yellow_ln};
use rustc_hash::FxHashMap;

/// Structured metadata keys attached to an error for tooling that wants more
/// than the message string.
#[derive(Debug, Eq, Hash, PartialEq, Clone)]
pub enum ErrorMetaDataKey {
    CompilationStage,
    PrimarySuggestion,
    AlternativeSuggestion,
}

/// Where an error was observed. All fields are optional because most errors
/// are created close to the failing data and wrapped with context later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorLocation {
    pub source_file: Option<String>,
    pub class_name: Option<String>,
    /// Source line number, -1 when unknown
    pub line: i32,
}

impl ErrorLocation {
    pub fn none() -> ErrorLocation {
        ErrorLocation {
            source_file: None,
            class_name: None,
            line: -1,
        }
    }

    pub fn at_line(line: i32) -> ErrorLocation {
        ErrorLocation {
            source_file: None,
            class_name: None,
            line,
        }
    }
}

/// The failure categories of the pipeline.
#[derive(PartialEq, Debug, Clone)]
pub enum ErrorType {
    /// A class file could not be parsed. Non-fatal during library scanning
    /// (the class is logged and skipped), fatal everywhere else.
    ClassParse,
    /// A needed function could not be resolved through direct lookup, the
    /// superclass chain or interface defaults.
    MissingFunction,
    /// A hierarchy walk dereferenced a class name the loader cannot produce.
    MissingClass,
    /// A construct the pipeline does not compile (interface-call emission,
    /// abstract or native methods reached as needed).
    Unsupported,
    /// An annotation used in a way its contract forbids, e.g. a non-static
    /// import or export method.
    Annotation,
    /// Textual WebAssembly that could not be parsed.
    TextCode,
    /// An underlying I/O failure, with whatever context was available.
    Io,
    /// An internal bug in the compiler itself.
    Compiler,
}

pub fn error_type_to_str(e_type: &ErrorType) -> &'static str {
    match e_type {
        ErrorType::ClassParse => "Class Parse Error",
        ErrorType::MissingFunction => "Missing Function",
        ErrorType::MissingClass => "Missing Class",
        ErrorType::Unsupported => "Unsupported Construct",
        ErrorType::Annotation => "Annotation Violation",
        ErrorType::TextCode => "Text Code Error",
        ErrorType::Io => "I/O Failure",
        ErrorType::Compiler => "Compiler Bug",
    }
}

#[derive(Debug, Clone)]
pub struct CompileError {
    pub msg: String,
    pub location: ErrorLocation,
    pub error_type: ErrorType,
    pub metadata: FxHashMap<ErrorMetaDataKey, &'static str>,
}

impl CompileError {
    pub fn new(msg: impl Into<String>, location: ErrorLocation, error_type: ErrorType) -> Self {
        CompileError {
            msg: msg.into(),
            location,
            error_type,
            metadata: FxHashMap::default(),
        }
    }

    /// A missing function, keyed by its signature name.
    pub fn missing_function(signature_name: &str) -> Self {
        CompileError::new(
            format!("Missing function: {signature_name}"),
            ErrorLocation::none(),
            ErrorType::MissingFunction,
        )
    }

    /// A class the loader cannot produce, observed during a hierarchy walk.
    pub fn missing_class(class_name: &str) -> Self {
        CompileError::new(
            format!("Missing class: {class_name}"),
            ErrorLocation::none(),
            ErrorType::MissingClass,
        )
    }

    pub fn unsupported(msg: impl Into<String>, line: i32) -> Self {
        CompileError::new(msg, ErrorLocation::at_line(line), ErrorType::Unsupported)
    }

    /// Internal bug, not the user's fault.
    pub fn compiler_error(msg: impl Into<String>) -> Self {
        CompileError::new(msg, ErrorLocation::none(), ErrorType::Compiler)
    }

    pub fn from_io(err: std::io::Error) -> Self {
        CompileError::new(err.to_string(), ErrorLocation::none(), ErrorType::Io)
    }

    /// Attach site context to an error bubbling out of per-method
    /// processing. Already-present fields win, so the innermost context
    /// (closest to the failure) is preserved.
    pub fn with_context(
        mut self,
        source_file: Option<&str>,
        class_name: Option<&str>,
        line: i32,
    ) -> Self {
        if self.location.source_file.is_none() {
            self.location.source_file = source_file.map(str::to_owned);
        }
        if self.location.class_name.is_none() {
            self.location.class_name = class_name.map(str::to_owned);
        }
        if self.location.line < 0 {
            self.location.line = line;
        }
        self
    }

    /// Attach only a line number, used by the per-instruction emission wrap.
    pub fn with_line(mut self, line: i32) -> Self {
        if self.location.line < 0 {
            self.location.line = line;
        }
        self
    }

    pub fn insert_metadata(&mut self, key: ErrorMetaDataKey, value: &'static str) {
        self.metadata.insert(key, value);
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", error_type_to_str(&self.error_type), self.msg)?;
        if let Some(class) = &self.location.class_name {
            write!(f, " (in {class}")?;
            if let Some(file) = &self.location.source_file {
                write!(f, ", {file}")?;
            }
            if self.location.line >= 0 {
                write!(f, ":{}", self.location.line)?;
            }
            write!(f, ")")?;
        } else if self.location.line >= 0 {
            write!(f, " (line {})", self.location.line)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Print an error to stderr in the usual red/yellow terminal format.
pub fn print_formatted_error(error: &CompileError) {
    e_red_ln!("{}", error_type_to_str(&error.error_type));
    e_yellow_ln!("  {}", error.msg);
    if let Some(class) = &error.location.class_name {
        e_dark_yellow_ln!("  in class: {}", class);
    }
    if let Some(file) = &error.location.source_file {
        if error.location.line >= 0 {
            e_dark_yellow_ln!("  at: {}:{}", file, error.location.line);
        } else {
            e_dark_yellow_ln!("  at: {}", file);
        }
    }
    for (key, value) in &error.metadata {
        e_dark_yellow_ln!("  {:?}: {}", key, value);
    }
}

/// Returns an Unsupported error for constructs the pipeline refuses to
/// compile.
///
/// Usage: `return_unsupported_error!("Interface calls are not supported.", line)`
#[macro_export]
macro_rules! return_unsupported_error {
    ($msg:expr, $line:expr) => {
        return Err($crate::compiler::compiler_errors::CompileError::unsupported(
            $msg, $line,
        ))
    };
}

/// Returns an Annotation error for annotation contract violations.
#[macro_export]
macro_rules! return_annotation_error {
    ($msg:expr) => {
        return Err($crate::compiler::compiler_errors::CompileError::new(
            $msg,
            $crate::compiler::compiler_errors::ErrorLocation::none(),
            $crate::compiler::compiler_errors::ErrorType::Annotation,
        ))
    };
}

/// Returns a Compiler error for internal bugs.
#[macro_export]
macro_rules! return_compiler_error {
    ($($arg:tt)*) => {
        return Err($crate::compiler::compiler_errors::CompileError::compiler_error(
            format!($($arg)*),
        ))
    };
}
