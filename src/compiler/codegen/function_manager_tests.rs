use rustc_hash::FxHashMap;

use crate::compiler::classfile::{Code, MethodInfo};
use crate::compiler::codegen::function_manager::{FunctionManager, FunctionState};
use crate::compiler::codegen::function_name::FunctionName;

fn name(class: &str, method: &str) -> FunctionName {
    FunctionName::new(class, method, "()V")
}

fn method_info(class: &str, method: &str) -> MethodInfo {
    MethodInfo {
        class_name: class.to_string(),
        name: method.to_string(),
        signature: "()V".to_string(),
        is_static: true,
        annotations: FxHashMap::default(),
        code: Some(Code::new(vec![0xb1], 3)),
    }
}

#[test]
fn states_progress_monotonically() {
    let mut functions = FunctionManager::new();
    let f = name("app/A", "run");

    assert!(!functions.is_known(&f));
    functions.mark_as_needed(&f);
    assert_eq!(functions.state(&f), Some(FunctionState::Needed));

    functions.mark_as_scanned(&f, false);
    assert_eq!(functions.state(&f), Some(FunctionState::Scanned));

    // a late mark_as_needed must not regress the state
    functions.mark_as_needed(&f);
    assert_eq!(functions.state(&f), Some(FunctionState::Scanned));

    assert!(functions.mark_as_written(&f));
    assert_eq!(functions.state(&f), Some(FunctionState::Written));
    // idempotent per name
    assert!(!functions.mark_as_written(&f));
}

#[test]
fn scan_worklist_is_fifo_on_promotion_order() {
    let mut functions = FunctionManager::new();
    let first = name("app/A", "first");
    let second = name("app/A", "second");
    functions.mark_as_needed(&first);
    functions.mark_as_needed(&second);
    // re-promotion must not change the order
    functions.mark_as_needed(&first);

    let next = functions.next_scan_later().unwrap();
    assert_eq!(next, first);
    functions.mark_as_scanned(&next, false);

    let next = functions.next_scan_later().unwrap();
    assert_eq!(next, second);
    functions.mark_as_scanned(&next, false);

    assert!(functions.next_scan_later().is_none());
}

#[test]
fn names_appended_while_draining_are_still_yielded() {
    let mut functions = FunctionManager::new();
    functions.mark_as_needed(&name("app/A", "root"));

    let mut scanned = Vec::new();
    while let Some(next) = functions.next_scan_later() {
        if scanned.is_empty() {
            // scanning the root discovers a callee
            functions.mark_as_needed(&name("app/A", "callee"));
        }
        functions.mark_as_scanned(&next, false);
        scanned.push(next.method_name.clone());
    }
    assert_eq!(scanned, vec!["root", "callee"]);
}

#[test]
fn aliased_names_are_resolved_and_never_written() {
    let mut functions = FunctionManager::new();
    let from = name("app/C", "g");
    let to = name("app/A", "g");
    functions.mark_as_needed(&from);
    functions.mark_as_needed(&to);
    functions.set_alias(&from, to.clone());

    // the alias counts as resolved, so the scan moves on
    assert_eq!(functions.next_scan_later().unwrap(), to);
    assert!(!functions.need_to_write(&from));
    assert!(functions.need_to_write(&to));
    assert_eq!(functions.resolve_alias(&from), &to);
}

#[test]
fn replace_substitutes_a_recorded_body() {
    let mut functions = FunctionManager::new();
    let target = FunctionName::new("java/lang/Math", "sqrt", "(D)D");
    let replacement = method_info("user/FastMath", "sqrt");
    functions.add_replacement(&target, replacement.clone());

    let platform = method_info("java/lang/Math", "sqrt");
    let chosen = functions.replace(&target, platform.clone());
    assert_eq!(chosen.class_name, "user/FastMath");

    // names without a replacement pass through
    let other = FunctionName::new("java/lang/Math", "abs", "(D)D");
    let chosen = functions.replace(&other, platform.clone());
    assert_eq!(chosen.class_name, "java/lang/Math");
}

#[test]
fn need_this_is_sticky() {
    let mut functions = FunctionManager::new();
    let f = name("app/A", "run");
    assert!(!functions.need_this_parameter(&f));
    functions.set_need_this(&f);
    assert!(functions.need_this_parameter(&f));
    functions.mark_as_scanned(&f, false);
    assert!(functions.need_this_parameter(&f));
}

#[test]
fn import_and_function_buckets_are_disjoint() {
    let mut functions = FunctionManager::new();
    let host = name("app/Host", "log");
    let local = name("app/A", "run");
    functions.mark_as_import(&host, FxHashMap::default());
    functions.mark_as_needed(&host);
    functions.mark_as_needed(&local);

    assert_eq!(functions.next_needed_import().unwrap(), host);
    assert!(functions.next_needed_import().is_none());

    assert_eq!(functions.next_needed_function().unwrap(), local);
    assert!(functions.next_needed_function().is_none());

    // imports never reach the write bucket
    assert_eq!(functions.next_write_later().unwrap(), local);
    assert!(functions.next_write_later().is_none());
    assert!(!functions.need_to_write(&host));
}
