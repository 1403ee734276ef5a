//! Structured views of parsed class files.
//!
//! The class-file parser itself is a collaborator: anything that can produce
//! a [`ClassFile`] (see [`ClassFileParser`]) can feed the pipeline. The types
//! here are plain owned data so tests can construct them directly.

pub mod library;
pub mod loader;

use rustc_hash::FxHashMap;

/// Class-level annotation: this class fully replaces the named target class.
pub const REPLACE_ANNOTATION: &str = "classlift/api/Replace";
/// Class-level annotation: this class overlays the named target class,
/// shadowing methods and fields it declares.
pub const PARTIAL_ANNOTATION: &str = "classlift/api/Partial";
/// Method-level annotation: the body is elided and the function is emitted
/// as an import from the host.
pub const IMPORT_ANNOTATION: &str = "classlift/api/Import";
/// Method-level annotation: the function is a reachability root and is
/// exported from the module.
pub const EXPORT_ANNOTATION: &str = "classlift/api/Export";
/// Method-level annotation: the body is given as textual WebAssembly.
pub const TEXT_CODE_ANNOTATION: &str = "classlift/api/TextCode";

/// Annotation values are kept as data: key/value string pairs. All
/// interpretation happens in the generator.
pub type AnnotationValues = FxHashMap<String, String>;

/// The code attribute of a method: raw stack-machine bytecode plus the first
/// source line it maps to. Interpretation belongs to the `CodeBuilder`
/// collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub bytecode: Vec<u8>,
    pub first_line: i32,
}

impl Code {
    pub fn new(bytecode: Vec<u8>, first_line: i32) -> Code {
        Code {
            bytecode,
            first_line,
        }
    }
}

/// A single method of a class file.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Internal (slash form) name of the declaring class
    pub class_name: String,
    pub name: String,
    /// JVM-style type descriptor, e.g. `(II)I`
    pub signature: String,
    pub is_static: bool,
    pub annotations: FxHashMap<String, AnnotationValues>,
    /// None for abstract and native methods
    pub code: Option<Code>,
}

impl MethodInfo {
    pub fn annotation(&self, name: &str) -> Option<&AnnotationValues> {
        self.annotations.get(name)
    }
}

/// A field of a class file.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    /// JVM-style type descriptor, e.g. `I` or `Ljava/lang/String;`
    pub signature: String,
    pub is_static: bool,
}

/// A parsed class file.
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// Internal (slash form) class name
    pub this_class: String,
    pub super_class: Option<String>,
    /// Directly implemented interfaces, in declared order
    pub interfaces: Vec<String>,
    pub source_file: Option<String>,
    pub annotations: FxHashMap<String, AnnotationValues>,
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldInfo>,
}

impl ClassFile {
    /// Look up a method by name and signature.
    pub fn method(&self, name: &str, signature: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.signature == signature)
    }

    pub fn annotation(&self, name: &str) -> Option<&AnnotationValues> {
        self.annotations.get(name)
    }

    /// Merge a partial overlay onto this class. Overlay methods shadow by
    /// (name, signature) and overlay fields shadow by name; everything the
    /// overlay does not declare falls through to the original. Class
    /// identity (name, superclass, interfaces, source file) stays with the
    /// original.
    pub fn with_overlay(&self, overlay: &ClassFile) -> ClassFile {
        let mut methods: Vec<MethodInfo> = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            match overlay.method(&method.name, &method.signature) {
                Some(shadow) => {
                    let mut shadow = shadow.clone();
                    shadow.class_name = self.this_class.clone();
                    methods.push(shadow);
                }
                None => methods.push(method.clone()),
            }
        }
        // Methods only the overlay declares are appended after the originals
        for method in &overlay.methods {
            if self.method(&method.name, &method.signature).is_none() {
                let mut added = method.clone();
                added.class_name = self.this_class.clone();
                methods.push(added);
            }
        }

        let mut fields: Vec<FieldInfo> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match overlay.fields.iter().find(|f| f.name == field.name) {
                Some(shadow) => fields.push(shadow.clone()),
                None => fields.push(field.clone()),
            }
        }
        for field in &overlay.fields {
            if !self.fields.iter().any(|f| f.name == field.name) {
                fields.push(field.clone());
            }
        }

        ClassFile {
            this_class: self.this_class.clone(),
            super_class: self.super_class.clone(),
            interfaces: self.interfaces.clone(),
            source_file: self.source_file.clone(),
            annotations: self.annotations.clone(),
            methods,
            fields,
        }
    }
}

/// The class-file parser collaborator. Library scanning hands it the raw
/// bytes of every `*.class` entry it finds.
pub trait ClassFileParser {
    fn parse(&self, bytes: &[u8]) -> Result<ClassFile, crate::CompileError>;
}

#[cfg(test)]
mod classfile_tests {
    use super::*;

    fn method(class: &str, name: &str, sig: &str) -> MethodInfo {
        MethodInfo {
            class_name: class.to_string(),
            name: name.to_string(),
            signature: sig.to_string(),
            is_static: false,
            annotations: FxHashMap::default(),
            code: Some(Code::new(vec![0xb1], 1)),
        }
    }

    fn class(name: &str, methods: Vec<MethodInfo>) -> ClassFile {
        ClassFile {
            this_class: name.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            source_file: Some(format!("{name}.java")),
            annotations: FxHashMap::default(),
            methods,
            fields: Vec::new(),
        }
    }

    #[test]
    fn overlay_shadows_matching_methods_fully() {
        let original = class("app/Math", vec![method("app/Math", "sqrt", "(D)D")]);
        let mut shadow = method("user/FastMath", "sqrt", "(D)D");
        shadow.code = Some(Code::new(vec![0x01, 0xb1], 7));
        let overlay = class("user/FastMath", vec![shadow]);

        let merged = original.with_overlay(&overlay);
        assert_eq!(merged.this_class, "app/Math");
        let got = merged.method("sqrt", "(D)D").unwrap();
        // The overlay body wins and is re-homed onto the original class
        assert_eq!(got.code.as_ref().unwrap().first_line, 7);
        assert_eq!(got.class_name, "app/Math");
    }

    #[test]
    fn overlay_appends_methods_the_original_lacks() {
        let original = class("app/Math", vec![method("app/Math", "sqrt", "(D)D")]);
        let overlay = class("user/FastMath", vec![method("user/FastMath", "cbrt", "(D)D")]);

        let merged = original.with_overlay(&overlay);
        assert!(merged.method("sqrt", "(D)D").is_some());
        assert!(merged.method("cbrt", "(D)D").is_some());
        assert_eq!(merged.methods.len(), 2);
    }
}
