//! Library discovery: walking directories and archives of class files.
//!
//! A library path that resolves to a directory is walked recursively for
//! `*.class` files; anything else is opened as an archive and every
//! `*.class` entry is read. A parse failure in one class is reported and
//! that class skipped; the rest of the library still loads.

use std::fs;
use std::io::Read;
use std::path::Path;

use colour::e_yellow_ln;
use walkdir::WalkDir;

use crate::compiler::classfile::{ClassFile, ClassFileParser};
use crate::compiler::compiler_errors::print_formatted_error;
use crate::CompileError;

/// Parse every class file a library provides, in discovery order.
pub fn load_library(
    path: &Path,
    parser: &dyn ClassFileParser,
) -> Result<Vec<ClassFile>, CompileError> {
    if path.is_dir() {
        load_directory(path, parser)
    } else {
        load_archive(path, parser)
    }
}

fn load_directory(
    path: &Path,
    parser: &dyn ClassFileParser,
) -> Result<Vec<ClassFile>, CompileError> {
    let mut classes = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CompileError::from_io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other("walkdir error without io cause")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("class") {
            continue;
        }
        let bytes = fs::read(entry.path()).map_err(CompileError::from_io)?;
        match parser.parse(&bytes) {
            Ok(class_file) => classes.push(class_file),
            Err(error) => skip_class(&entry.path().display().to_string(), &error),
        }
    }
    Ok(classes)
}

fn load_archive(path: &Path, parser: &dyn ClassFileParser) -> Result<Vec<ClassFile>, CompileError> {
    let file = fs::File::open(path).map_err(CompileError::from_io)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| CompileError::from_io(std::io::Error::other(e)))?;

    let mut classes = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| CompileError::from_io(std::io::Error::other(e)))?;
        if !entry.name().ends_with(".class") {
            continue;
        }
        let entry_name = entry.name().to_string();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(CompileError::from_io)?;
        match parser.parse(&bytes) {
            Ok(class_file) => classes.push(class_file),
            Err(error) => skip_class(&entry_name, &error),
        }
    }
    Ok(classes)
}

fn skip_class(origin: &str, error: &CompileError) {
    e_yellow_ln!("Skipping class file {}:", origin);
    print_formatted_error(error);
}
