use std::cell::Cell;

use tracing::debug;

use super::object::{Object, ObjectKind};
use super::scope::Scope;
use super::value::Value;

const INITIAL_ARENA_CAPACITY: usize = 1024;

/// Handle to a heap object. Handles are stable for the lifetime of the
/// object; the collector never relocates live slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ref(pub(crate) usize);

/// Handle to a scope in the heap's scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeRef(pub(crate) usize);

pub struct HeapConfig {
    /// Allocations between collections. Collection itself only happens at
    /// evaluator safe points once this many allocations have accumulated.
    pub gc_threshold: usize,
}

impl Default for HeapConfig {
    fn default() -> HeapConfig {
        HeapConfig {
            gc_threshold: 10_000,
        }
    }
}

struct ObjectEntry {
    marked: Cell<bool>,
    object: Object,
}

struct ScopeEntry {
    marked: Cell<bool>,
    scope: Scope,
}

/// Owner of every allocated object and scope. Freed slots are recycled
/// through free lists, so a handle handed out for a live object never moves.
pub struct Heap {
    objects: Vec<Option<ObjectEntry>>,
    free_objects: Vec<usize>,
    scopes: Vec<Option<ScopeEntry>>,
    free_scopes: Vec<usize>,
    allocations_since_gc: usize,
    config: HeapConfig,
}

impl Heap {
    pub fn new(config: HeapConfig) -> Heap {
        Heap {
            objects: Vec::with_capacity(INITIAL_ARENA_CAPACITY),
            free_objects: Vec::new(),
            scopes: Vec::with_capacity(INITIAL_ARENA_CAPACITY),
            free_scopes: Vec::new(),
            allocations_since_gc: 0,
            config,
        }
    }

    pub fn allocate(&mut self, object: Object) -> Ref {
        self.allocations_since_gc += 1;
        let entry = ObjectEntry {
            marked: Cell::new(false),
            object,
        };
        if let Some(index) = self.free_objects.pop() {
            self.objects[index] = Some(entry);
            Ref(index)
        } else {
            self.objects.push(Some(entry));
            Ref(self.objects.len() - 1)
        }
    }

    pub fn allocate_scope(&mut self, scope: Scope) -> ScopeRef {
        self.allocations_since_gc += 1;
        let entry = ScopeEntry {
            marked: Cell::new(false),
            scope,
        };
        if let Some(index) = self.free_scopes.pop() {
            self.scopes[index] = Some(entry);
            ScopeRef(index)
        } else {
            self.scopes.push(Some(entry));
            ScopeRef(self.scopes.len() - 1)
        }
    }

    // panics here indicate an interpreter bug: a live handle must always
    // point at an occupied slot
    pub fn object(&self, r: Ref) -> &Object {
        &self.objects[r.0]
            .as_ref()
            .expect("Object handle referenced a freed heap slot.")
            .object
    }

    pub fn object_mut(&mut self, r: Ref) -> &mut Object {
        &mut self.objects[r.0]
            .as_mut()
            .expect("Object handle referenced a freed heap slot.")
            .object
    }

    pub fn scope(&self, r: ScopeRef) -> &Scope {
        &self.scopes[r.0]
            .as_ref()
            .expect("Scope handle referenced a freed heap slot.")
            .scope
    }

    pub fn scope_mut(&mut self, r: ScopeRef) -> &mut Scope {
        &mut self.scopes[r.0]
            .as_mut()
            .expect("Scope handle referenced a freed heap slot.")
            .scope
    }

    pub fn should_collect(&self) -> bool {
        self.allocations_since_gc >= self.config.gc_threshold
    }

    pub fn live_object_count(&self) -> usize {
        self.objects.iter().filter(|slot| slot.is_some()).count()
    }

    /// Mark and sweep. The caller supplies the complete root set: the
    /// evaluator's active scopes and every in-flight value. The heap never
    /// inspects the evaluator itself.
    pub fn collect(&mut self, scope_roots: &[ScopeRef], value_roots: &[Value]) {
        enum Trace {
            Object(Ref),
            Scope(ScopeRef),
        }

        // explicit work list rather than recursion so that deeply linked
        // structures can't exhaust the native stack
        let mut worklist: Vec<Trace> = Vec::new();
        for &scope in scope_roots {
            worklist.push(Trace::Scope(scope));
        }
        for value in value_roots {
            if let Value::Ref(r) = value {
                worklist.push(Trace::Object(*r));
            }
        }

        while let Some(item) = worklist.pop() {
            match item {
                Trace::Object(r) => {
                    let entry = self.objects[r.0]
                        .as_ref()
                        .expect("Reachable object referenced a freed heap slot.");
                    if entry.marked.replace(true) {
                        continue;
                    }
                    for value in entry.object.properties.values() {
                        if let Value::Ref(child) = value {
                            worklist.push(Trace::Object(*child));
                        }
                    }
                    match &entry.object.kind {
                        ObjectKind::Array(elements) => {
                            for element in elements {
                                if let Value::Ref(child) = element {
                                    worklist.push(Trace::Object(*child));
                                }
                            }
                        }
                        ObjectKind::Function(function) => {
                            worklist.push(Trace::Scope(function.captured_scope));
                        }
                        ObjectKind::NativeFunction(native) => {
                            if let Some(owner) = native.owner {
                                worklist.push(Trace::Object(owner));
                            }
                        }
                        _ => {}
                    }
                }
                Trace::Scope(s) => {
                    let entry = self.scopes[s.0]
                        .as_ref()
                        .expect("Reachable scope referenced a freed heap slot.");
                    if entry.marked.replace(true) {
                        continue;
                    }
                    for value in entry.scope.bindings.values() {
                        if let Value::Ref(child) = value {
                            worklist.push(Trace::Object(*child));
                        }
                    }
                    if let Some(parent) = entry.scope.parent {
                        worklist.push(Trace::Scope(parent));
                    }
                }
            }
        }

        let mut live = 0usize;
        let mut freed = 0usize;
        for (index, slot) in self.objects.iter_mut().enumerate() {
            match slot {
                Some(entry) if entry.marked.get() => {
                    entry.marked.set(false);
                    live += 1;
                }
                Some(_) => {
                    // dropping the entry releases any host resources it owns
                    *slot = None;
                    self.free_objects.push(index);
                    freed += 1;
                }
                None => {}
            }
        }

        let mut freed_scopes = 0usize;
        for (index, slot) in self.scopes.iter_mut().enumerate() {
            match slot {
                Some(entry) if entry.marked.get() => entry.marked.set(false),
                Some(_) => {
                    *slot = None;
                    self.free_scopes.push(index);
                    freed_scopes += 1;
                }
                None => {}
            }
        }

        self.allocations_since_gc = 0;
        debug!(
            live = live,
            freed = freed,
            freed_scopes = freed_scopes,
            "mark and sweep complete"
        );
    }
}
