use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use libloading::Library;
use tracing::trace;

use crate::ast::{Block, Parameter};

use super::heap::{Ref, ScopeRef};
use super::interpreter::Interpreter;
use super::value::Value;

/// Result of a native callable. The error side carries the exception value
/// that will be thrown into the running program.
pub type NativeResult = Result<Value, Value>;

/// A host-provided procedure. It receives the interpreter so it can allocate,
/// collect, and re-enter user code through `Interpreter::call_value`.
pub type NativeFn = fn(&mut Interpreter<'_>, &[Value]) -> NativeResult;

/// Every heap object is a string-keyed property map plus a kind tag carrying
/// the per-kind state. Capability dispatch (indexing, invocation) switches on
/// the kind; there is no inheritance anywhere in the object model.
pub struct Object {
    pub properties: HashMap<String, Value>,
    pub kind: ObjectKind,
}

pub enum ObjectKind {
    Plain,
    StringBox(String),
    Array(Vec<Value>),
    Function(FunctionObject),
    NativeFunction(NativeFunction),
    Exception(ExceptionData),
    FfiModule(FfiModule),
}

/// A closure: the body and parameter list are shared with the AST node that
/// produced it, and the captured scope is the chain that was current at the
/// point of the defining expression.
pub struct FunctionObject {
    pub name: Option<String>,
    pub parameters: Rc<Vec<Parameter>>,
    pub body: Rc<Block>,
    pub captured_scope: ScopeRef,
}

pub struct NativeFunction {
    pub name: String,
    pub func: NativeFn,
    // the FFI module whose library provides this symbol; the collector keeps
    // the module (and its open handle) alive while the callable is reachable
    pub owner: Option<Ref>,
}

#[derive(Debug)]
pub struct ExceptionData {
    pub kind: ExceptionKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Type,
    Reference,
    Range,
    Syntax,
    FileNotFound,
    Native,
}

impl ExceptionKind {
    pub fn name(self) -> &'static str {
        match self {
            ExceptionKind::Type => "TypeError",
            ExceptionKind::Reference => "ReferenceError",
            ExceptionKind::Range => "RangeError",
            ExceptionKind::Syntax => "SyntaxError",
            ExceptionKind::FileNotFound => "FileNotFound",
            ExceptionKind::Native => "NativeError",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A dynamically loaded module. The library handle stays open for the
/// lifetime of the object and is closed when the collector sweeps it.
pub struct FfiModule {
    pub path: String,
    _library: Library,
}

impl FfiModule {
    pub fn new(path: &str, library: Library) -> FfiModule {
        FfiModule {
            path: path.to_string(),
            _library: library,
        }
    }
}

impl Drop for FfiModule {
    fn drop(&mut self) {
        trace!(path = %self.path, "closing dynamic module");
    }
}

impl Object {
    pub fn plain() -> Object {
        Object::with_kind(ObjectKind::Plain)
    }

    pub fn string(content: impl Into<String>) -> Object {
        Object::with_kind(ObjectKind::StringBox(content.into()))
    }

    pub fn array(elements: Vec<Value>) -> Object {
        Object::with_kind(ObjectKind::Array(elements))
    }

    pub fn function(function: FunctionObject) -> Object {
        Object::with_kind(ObjectKind::Function(function))
    }

    pub fn native_function(name: &str, func: NativeFn, owner: Option<Ref>) -> Object {
        Object::with_kind(ObjectKind::NativeFunction(NativeFunction {
            name: name.to_string(),
            func,
            owner,
        }))
    }

    pub fn exception(kind: ExceptionKind, message: &str) -> Object {
        Object::with_kind(ObjectKind::Exception(ExceptionData {
            kind,
            message: message.to_string(),
        }))
    }

    pub fn ffi_module(module: FfiModule) -> Object {
        Object::with_kind(ObjectKind::FfiModule(module))
    }

    fn with_kind(kind: ObjectKind) -> Object {
        Object {
            properties: HashMap::new(),
            kind,
        }
    }

    /// Property lookup. A missing key reads as nil rather than an error; the
    /// length of an array or string is computed live and shadows the map.
    pub fn get(&self, key: &str) -> Value {
        match (&self.kind, key) {
            (ObjectKind::Array(elements), "length") => Value::Number(elements.len() as f64),
            (ObjectKind::StringBox(content), "length") => Value::Number(content.len() as f64),
            _ => self.properties.get(key).copied().unwrap_or(Value::Nil),
        }
    }

    pub fn put(&mut self, key: &str, value: Value) {
        self.properties.insert(key.to_string(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Write an array element, extending with nils when the index is past the
    /// current length.
    pub fn set_element(&mut self, index: usize, value: Value) {
        match &mut self.kind {
            ObjectKind::Array(elements) => {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Nil);
                }
                elements[index] = value;
            }
            _ => panic!("Element access on a non-array object."),
        }
    }
}
