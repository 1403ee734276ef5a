//! The reachability worklist and dispatch state.
//!
//! Every callable moves monotonically through
//! `Known → Needed → Scanned → Written`; aliasing is the one exception, and
//! an aliased name is resolved in place of being scanned or written. Each
//! bucket (scan, imports, functions, write) preserves the order names were
//! first promoted in, and the cursor-style `next_*` iterators chase the tail
//! of that order so items appended during iteration are still yielded.

use rustc_hash::FxHashMap;

use crate::compiler::classfile::{AnnotationValues, MethodInfo};
use crate::compiler::codegen::function_name::FunctionName;
use crate::codegen_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FunctionState {
    /// Observed, nothing decided yet
    Known,
    /// Reachable, waiting for its body to be scanned
    Needed,
    /// Body scanned (or resolved by alias); callees are known
    Scanned,
    /// Emitted to the writer (or written as an import)
    Written,
}

#[derive(Debug)]
struct FunctionEntry {
    name: FunctionName,
    state: FunctionState,
    need_this: bool,
    import: Option<AnnotationValues>,
    alias: Option<FunctionName>,
}

#[derive(Default)]
pub struct FunctionManager {
    entries: FxHashMap<String, FunctionEntry>,
    replacements: FxHashMap<String, MethodInfo>,
    /// Names in the order they were first promoted to Needed. All cursors
    /// walk this list.
    needed_order: Vec<String>,
    scan_cursor: usize,
    import_cursor: usize,
    function_cursor: usize,
    write_cursor: usize,
    frozen: bool,
}

impl FunctionManager {
    pub fn new() -> FunctionManager {
        FunctionManager::default()
    }

    fn entry(&mut self, name: &FunctionName) -> &mut FunctionEntry {
        self.entries
            .entry(name.signature_name.clone())
            .or_insert_with(|| FunctionEntry {
                name: name.clone(),
                state: FunctionState::Known,
                need_this: false,
                import: None,
                alias: None,
            })
    }

    /// True iff this name has been observed in any state.
    pub fn is_known(&self, name: &FunctionName) -> bool {
        self.entries.contains_key(&name.signature_name)
    }

    pub fn state(&self, name: &FunctionName) -> Option<FunctionState> {
        self.entries.get(&name.signature_name).map(|e| e.state)
    }

    /// Register a name without promoting it. Used for synthetic functions
    /// that exist before anything calls them.
    pub fn mark_as_known(&mut self, name: &FunctionName) {
        self.entry(name);
    }

    /// Promote to Needed. Idempotent for names that are already Needed or
    /// further along.
    pub fn mark_as_needed(&mut self, name: &FunctionName) {
        if self.frozen && !self.is_known(name) {
            codegen_log!("needed after freeze: {}", name.signature_name);
        }
        let entry = self.entry(name);
        if entry.state == FunctionState::Known {
            entry.state = FunctionState::Needed;
            self.needed_order.push(name.signature_name.clone());
        }
    }

    /// Record the name as provided by the host. It will be emitted as an
    /// import and never scanned for a body.
    pub fn mark_as_import(&mut self, name: &FunctionName, annotation: AnnotationValues) {
        let entry = self.entry(name);
        entry.import = Some(annotation);
    }

    pub fn import_annotation(&self, name: &FunctionName) -> Option<&AnnotationValues> {
        self.entries
            .get(&name.signature_name)
            .and_then(|e| e.import.as_ref())
    }

    /// Record that compiling `original` uses `replacement`'s body instead.
    pub fn add_replacement(&mut self, original: &FunctionName, replacement: MethodInfo) {
        self.replacements
            .entry(original.signature_name.clone())
            .or_insert(replacement);
    }

    /// The recorded replacement body for a name, if any.
    pub fn replacement(&self, name: &FunctionName) -> Option<MethodInfo> {
        self.replacements.get(&name.signature_name).cloned()
    }

    /// If a replacement exists for `name` return it, else return the input.
    pub fn replace(&self, name: &FunctionName, method: MethodInfo) -> MethodInfo {
        self.replacements
            .get(&name.signature_name)
            .cloned()
            .unwrap_or(method)
    }

    /// Mark the name as receiving an implicit receiver as first parameter.
    /// Once true it stays true.
    pub fn set_need_this(&mut self, name: &FunctionName) {
        self.entry(name).need_this = true;
    }

    pub fn need_this_parameter(&self, name: &FunctionName) -> bool {
        self.entries
            .get(&name.signature_name)
            .map(|e| e.need_this)
            .unwrap_or(false)
    }

    /// Record that `from` is satisfied by `to`. `from` counts as resolved
    /// and will never be written itself.
    pub fn set_alias(&mut self, from: &FunctionName, to: FunctionName) {
        let entry = self.entry(from);
        entry.alias = Some(to);
        if entry.state < FunctionState::Scanned {
            entry.state = FunctionState::Scanned;
        }
    }

    pub fn alias_of(&self, name: &FunctionName) -> Option<&FunctionName> {
        self.entries
            .get(&name.signature_name)
            .and_then(|e| e.alias.as_ref())
    }

    /// Follow the alias chain to the concrete function that satisfies
    /// `name`. Aliases are acyclic, so this terminates.
    pub fn resolve_alias<'a>(&'a self, name: &'a FunctionName) -> &'a FunctionName {
        let mut current = name;
        while let Some(target) = self.alias_of(current) {
            current = target;
        }
        current
    }

    pub fn mark_as_scanned(&mut self, name: &FunctionName, needs_this: bool) {
        let entry = self.entry(name);
        if entry.state < FunctionState::Scanned {
            entry.state = FunctionState::Scanned;
        }
        entry.need_this |= needs_this;
    }

    /// Idempotent; the first call per name reports true.
    pub fn mark_as_written(&mut self, name: &FunctionName) -> bool {
        let entry = self.entry(name);
        let first = entry.state != FunctionState::Written;
        entry.state = FunctionState::Written;
        first
    }

    /// Whether `name` still wants a body in the output: not yet written,
    /// not satisfied by an alias and not provided as an import.
    pub fn need_to_write(&self, name: &FunctionName) -> bool {
        match self.entries.get(&name.signature_name) {
            Some(entry) => {
                entry.state != FunctionState::Written
                    && entry.alias.is_none()
                    && entry.import.is_none()
            }
            None => true,
        }
    }

    /// The next name promoted to Needed that has not been scanned yet, FIFO
    /// on promotion order. The cursor only advances past resolved entries,
    /// so the caller must scan or alias what it is handed.
    pub fn next_scan_later(&mut self) -> Option<FunctionName> {
        while self.scan_cursor < self.needed_order.len() {
            let key = &self.needed_order[self.scan_cursor];
            let entry = &self.entries[key];
            if entry.state == FunctionState::Needed {
                return Some(entry.name.clone());
            }
            self.scan_cursor += 1;
        }
        None
    }

    /// Needed imports in promotion order.
    pub fn next_needed_import(&mut self) -> Option<FunctionName> {
        while self.import_cursor < self.needed_order.len() {
            let key = &self.needed_order[self.import_cursor];
            self.import_cursor += 1;
            let entry = &self.entries[key];
            if entry.import.is_some() {
                return Some(entry.name.clone());
            }
        }
        None
    }

    /// Needed non-import, non-aliased functions in promotion order. Used by
    /// the finalize phase to register function types.
    pub fn next_needed_function(&mut self) -> Option<FunctionName> {
        while self.function_cursor < self.needed_order.len() {
            let key = &self.needed_order[self.function_cursor];
            self.function_cursor += 1;
            let entry = &self.entries[key];
            if entry.import.is_none() && entry.alias.is_none() {
                return Some(entry.name.clone());
            }
        }
        None
    }

    /// Everything the emit phase should consider writing, in promotion
    /// order. Names appended during emission (late overrides) are yielded
    /// before the iteration ends.
    pub fn next_write_later(&mut self) -> Option<FunctionName> {
        while self.write_cursor < self.needed_order.len() {
            let key = &self.needed_order[self.write_cursor];
            self.write_cursor += 1;
            let entry = &self.entries[key];
            if entry.import.is_none() {
                return Some(entry.name.clone());
            }
        }
        None
    }

    /// Freeze additions to every bucket except the write bucket, which
    /// keeps accepting override methods discovered during emission.
    pub fn prepare_finish(&mut self) {
        self.frozen = true;
    }
}
