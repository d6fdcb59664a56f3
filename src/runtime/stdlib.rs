use std::io::Write;
use std::time::Instant;

use once_cell::sync::Lazy;

use crate::ast::UnaryOp;

use super::ffi;
use super::interpreter::Interpreter;
use super::object::{ExceptionKind, NativeResult, Object, ObjectKind};
use super::value::{self, Value};

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Install the standard prelude into the interpreter's program scope. This is
/// the same registration contract any embedder uses for its own builtins.
pub fn install_prelude(interpreter: &mut Interpreter) {
    interpreter.register("print", native_print);
    interpreter.register("len", native_len);
    interpreter.register("str", native_str);
    interpreter.register("type_of", native_type_of);
    interpreter.register("push", native_push);
    interpreter.register("pop", native_pop);
    interpreter.register("contains", native_contains);
    interpreter.register("keys", native_keys);
    interpreter.register("clock", native_clock);
    interpreter.register("gc_collect", native_gc_collect);
    interpreter.register("gc_heap_size", native_gc_heap_size);
    interpreter.register("load_library", native_load_library);
}

fn native_print(interpreter: &mut Interpreter, args: &[Value]) -> NativeResult {
    let rendered: Vec<String> = args
        .iter()
        .map(|value| value.display(interpreter.heap()))
        .collect();
    writeln!(interpreter.output_writer, "{}", rendered.join(" "))
        .expect("Writing to program output should always succeed.");
    Ok(Value::Nil)
}

fn native_len(interpreter: &mut Interpreter, args: &[Value]) -> NativeResult {
    let [value] = args else {
        return Err(interpreter.make_error(ExceptionKind::Type, "len expects one argument."));
    };
    value::unary_op(interpreter.heap(), UnaryOp::Length, *value)
        .map_err(|e| interpreter.make_error(e.kind, &e.message))
}

fn native_str(interpreter: &mut Interpreter, args: &[Value]) -> NativeResult {
    let text = match args.first() {
        Some(value) => value.display(interpreter.heap()),
        None => "nil".to_string(),
    };
    Ok(Value::Ref(interpreter.heap_mut().allocate(Object::string(text))))
}

fn native_type_of(interpreter: &mut Interpreter, args: &[Value]) -> NativeResult {
    let [value] = args else {
        return Err(interpreter.make_error(ExceptionKind::Type, "type_of expects one argument."));
    };
    let name = value.type_name(interpreter.heap());
    Ok(Value::Ref(interpreter.heap_mut().allocate(Object::string(name))))
}

fn native_push(interpreter: &mut Interpreter, args: &[Value]) -> NativeResult {
    let [array, value] = args else {
        return Err(interpreter.make_error(
            ExceptionKind::Type,
            "push expects an array and a value.",
        ));
    };
    let Some(r) = array.as_heap_ref() else {
        return Err(interpreter.make_error(ExceptionKind::Type, "push expects an array."));
    };
    let new_length = match &mut interpreter.heap_mut().object_mut(r).kind {
        ObjectKind::Array(elements) => {
            elements.push(*value);
            Some(elements.len())
        }
        _ => None,
    };
    match new_length {
        Some(length) => Ok(Value::Number(length as f64)),
        None => Err(interpreter.make_error(ExceptionKind::Type, "push expects an array.")),
    }
}

fn native_pop(interpreter: &mut Interpreter, args: &[Value]) -> NativeResult {
    let [array] = args else {
        return Err(interpreter.make_error(ExceptionKind::Type, "pop expects an array."));
    };
    let Some(r) = array.as_heap_ref() else {
        return Err(interpreter.make_error(ExceptionKind::Type, "pop expects an array."));
    };
    let popped = match &mut interpreter.heap_mut().object_mut(r).kind {
        // popping an empty array reads as nil
        ObjectKind::Array(elements) => Some(elements.pop().unwrap_or(Value::Nil)),
        _ => None,
    };
    match popped {
        Some(value) => Ok(value),
        None => Err(interpreter.make_error(ExceptionKind::Type, "pop expects an array.")),
    }
}

fn native_contains(interpreter: &mut Interpreter, args: &[Value]) -> NativeResult {
    let [object, key] = args else {
        return Err(interpreter.make_error(
            ExceptionKind::Type,
            "contains expects an object and a key.",
        ));
    };
    let Some(r) = object.as_heap_ref() else {
        return Err(interpreter.make_error(ExceptionKind::Type, "contains expects an object."));
    };
    let Some(key) = value::property_key(interpreter.heap(), *key) else {
        return Err(interpreter.make_error(
            ExceptionKind::Type,
            "Property keys must be numbers or strings.",
        ));
    };
    Ok(Value::Bool(interpreter.heap().object(r).contains(&key)))
}

fn native_keys(interpreter: &mut Interpreter, args: &[Value]) -> NativeResult {
    let [object] = args else {
        return Err(interpreter.make_error(ExceptionKind::Type, "keys expects one argument."));
    };
    let Some(r) = object.as_heap_ref() else {
        return Err(interpreter.make_error(ExceptionKind::Type, "keys expects an object."));
    };
    let mut names: Vec<String> = interpreter
        .heap()
        .object(r)
        .properties
        .keys()
        .cloned()
        .collect();
    names.sort();
    let elements: Vec<Value> = names
        .into_iter()
        .map(|name| Value::Ref(interpreter.heap_mut().allocate(Object::string(name))))
        .collect();
    Ok(Value::Ref(interpreter.heap_mut().allocate(Object::array(elements))))
}

fn native_clock(_interpreter: &mut Interpreter, _args: &[Value]) -> NativeResult {
    // make sure epoch is initialized first (lazy init)
    let epoch = *EPOCH;
    let duration = Instant::now() - epoch;
    Ok(Value::Number(duration.as_millis() as f64))
}

fn native_gc_collect(interpreter: &mut Interpreter, _args: &[Value]) -> NativeResult {
    interpreter.collect_garbage(&[]);
    Ok(Value::Nil)
}

fn native_gc_heap_size(interpreter: &mut Interpreter, _args: &[Value]) -> NativeResult {
    Ok(Value::Number(interpreter.heap().live_object_count() as f64))
}

fn native_load_library(interpreter: &mut Interpreter, args: &[Value]) -> NativeResult {
    let path = args
        .first()
        .and_then(|value| match value.as_heap_ref() {
            Some(r) => match &interpreter.heap().object(r).kind {
                ObjectKind::StringBox(content) => Some(content.clone()),
                _ => None,
            },
            None => None,
        });
    let Some(path) = path else {
        return Err(interpreter.make_error(
            ExceptionKind::Type,
            "load_library expects a path string.",
        ));
    };
    ffi::load_module(interpreter, &path)
}
