use std::collections::HashMap;

use super::heap::{Heap, ScopeRef};
use super::value::Value;

/// A single visibility region: name bindings plus a parent link. Scopes live
/// in the heap's scope arena so that closure-captured chains participate in
/// collection like any other object graph.
///
/// A block scope's parent is the enclosing scope; a function frame's parent
/// is the closure's captured environment, never the caller's scope.
pub struct Scope {
    pub(crate) bindings: HashMap<String, Value>,
    pub(crate) parent: Option<ScopeRef>,
}

impl Scope {
    pub fn new(parent: Option<ScopeRef>) -> Scope {
        Scope {
            bindings: HashMap::new(),
            parent,
        }
    }
}

/// Walk the chain from `scope` outward until a binding for `name` is found.
pub fn lookup(heap: &Heap, scope: ScopeRef, name: &str) -> Option<Value> {
    let mut current = Some(scope);
    while let Some(r) = current {
        let scope = heap.scope(r);
        if let Some(value) = scope.bindings.get(name) {
            return Some(*value);
        }
        current = scope.parent;
    }
    None
}

/// Insert a binding directly in the given scope, shadowing any ancestor.
pub fn declare(heap: &mut Heap, scope: ScopeRef, name: &str, value: Value) {
    heap.scope_mut(scope)
        .bindings
        .insert(name.to_string(), value);
}

/// Rebind `name` in the nearest scope that already defines it; when no
/// ancestor does, create the binding in `scope` itself.
pub fn assign(heap: &mut Heap, scope: ScopeRef, name: &str, value: Value) {
    let mut current = Some(scope);
    while let Some(r) = current {
        if heap.scope(r).bindings.contains_key(name) {
            heap.scope_mut(r).bindings.insert(name.to_string(), value);
            return;
        }
        current = heap.scope(r).parent;
    }
    declare(heap, scope, name, value);
}

/// Rebind or create `name` in the outermost (program) scope.
pub fn assign_global(heap: &mut Heap, root: ScopeRef, name: &str, value: Value) {
    declare(heap, root, name, value);
}
