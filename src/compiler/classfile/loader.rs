//! Central cache and overlay layer for class-file access.
//!
//! Every lookup in the pipeline goes through [`ClassFileLoader::get`], which
//! honors `@Replace` substitutions and `@Partial` overlays before falling
//! back to the underlying classpath.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::compiler::classfile::ClassFile;
use crate::CompileError;

/// The underlying classpath consulted on a cache miss. Implementations own
/// their parsing; file I/O wrappers stay outside the pipeline.
pub trait ClasspathLoader {
    fn load(&mut self, class_name: &str) -> Result<Option<ClassFile>, CompileError>;
}

/// A classpath that never finds anything. Useful when every class is cached
/// up front by library scanning.
pub struct EmptyClasspath;

impl ClasspathLoader for EmptyClasspath {
    fn load(&mut self, _class_name: &str) -> Result<Option<ClassFile>, CompileError> {
        Ok(None)
    }
}

pub struct ClassFileLoader {
    cache: FxHashMap<String, Rc<ClassFile>>,
    replaces: FxHashMap<String, Rc<ClassFile>>,
    partials: FxHashMap<String, Rc<ClassFile>>,
    /// Partial merges are computed once and memoized here
    merged: FxHashMap<String, Rc<ClassFile>>,
    classpath: Box<dyn ClasspathLoader>,
}

impl ClassFileLoader {
    pub fn new(classpath: Box<dyn ClasspathLoader>) -> ClassFileLoader {
        ClassFileLoader {
            cache: FxHashMap::default(),
            replaces: FxHashMap::default(),
            partials: FxHashMap::default(),
            merged: FxHashMap::default(),
            classpath,
        }
    }

    /// Record a parsed class file under its internal name. First write wins:
    /// later duplicates on the scan path are ignored. Replace and partial
    /// records take precedence over anything cached here.
    pub fn cache(&mut self, class_file: ClassFile) {
        let name = class_file.this_class.clone();
        self.cache.entry(name).or_insert_with(|| Rc::new(class_file));
    }

    /// Subsequent `get(target)` calls return `class_file` instead of
    /// whatever the classpath would produce.
    pub fn replace(&mut self, target: &str, class_file: ClassFile) {
        self.replaces.insert(target.to_string(), Rc::new(class_file));
    }

    /// Overlay semantics: `get(target)` returns a merged view where methods
    /// and fields present in the overlay shadow the original.
    pub fn partial(&mut self, target: &str, class_file: ClassFile) {
        self.partials.insert(target.to_string(), Rc::new(class_file));
        self.merged.remove(target);
    }

    /// Look up a class, honoring replace/partial records and falling back to
    /// the classpath on a cache miss. Returns `None` when nothing can
    /// produce the class; hierarchy traversals turn that into a
    /// MissingClass error.
    pub fn get(&mut self, name: &str) -> Result<Option<Rc<ClassFile>>, CompileError> {
        if let Some(replacement) = self.replaces.get(name) {
            return Ok(Some(Rc::clone(replacement)));
        }
        if self.partials.contains_key(name) {
            if let Some(merged) = self.merged.get(name) {
                return Ok(Some(Rc::clone(merged)));
            }
            let original = match self.get_unmerged(name)? {
                Some(original) => original,
                None => return Ok(None),
            };
            let overlay = &self.partials[name];
            let merged = Rc::new(original.with_overlay(overlay));
            self.merged.insert(name.to_string(), Rc::clone(&merged));
            return Ok(Some(merged));
        }
        self.get_unmerged(name)
    }

    fn get_unmerged(&mut self, name: &str) -> Result<Option<Rc<ClassFile>>, CompileError> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(Some(Rc::clone(cached)));
        }
        match self.classpath.load(name)? {
            Some(class_file) => {
                let class_file = Rc::new(class_file);
                self.cache.insert(name.to_string(), Rc::clone(&class_file));
                Ok(Some(class_file))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod loader_tests {
    use super::*;
    use crate::compiler::classfile::{Code, MethodInfo};
    use rustc_hash::FxHashMap;

    fn class(name: &str, method_names: &[&str]) -> ClassFile {
        ClassFile {
            this_class: name.to_string(),
            super_class: None,
            interfaces: Vec::new(),
            source_file: None,
            annotations: FxHashMap::default(),
            methods: method_names
                .iter()
                .map(|m| MethodInfo {
                    class_name: name.to_string(),
                    name: m.to_string(),
                    signature: "()V".to_string(),
                    is_static: true,
                    annotations: FxHashMap::default(),
                    code: Some(Code::new(vec![0xb1], 1)),
                })
                .collect(),
            fields: Vec::new(),
        }
    }

    fn loader() -> ClassFileLoader {
        ClassFileLoader::new(Box::new(EmptyClasspath))
    }

    #[test]
    fn cache_is_first_write_wins() {
        let mut loader = loader();
        loader.cache(class("app/A", &["first"]));
        loader.cache(class("app/A", &["second"]));

        let got = loader.get("app/A").unwrap().unwrap();
        assert!(got.method("first", "()V").is_some());
        assert!(got.method("second", "()V").is_none());
    }

    #[test]
    fn replace_shadows_the_cached_class() {
        let mut loader = loader();
        loader.cache(class("app/A", &["original"]));
        loader.replace("app/A", class("user/B", &["replacement"]));

        let got = loader.get("app/A").unwrap().unwrap();
        assert!(got.method("replacement", "()V").is_some());
        assert!(got.method("original", "()V").is_none());
    }

    #[test]
    fn partial_merges_onto_the_cached_class() {
        let mut loader = loader();
        loader.cache(class("app/A", &["original"]));
        loader.partial("app/A", class("user/B", &["extra"]));

        let got = loader.get("app/A").unwrap().unwrap();
        assert!(got.method("original", "()V").is_some());
        assert!(got.method("extra", "()V").is_some());
        assert_eq!(got.this_class, "app/A");
    }

    #[test]
    fn unknown_class_is_none() {
        let mut loader = loader();
        assert!(loader.get("no/Such").unwrap().is_none());
    }
}
