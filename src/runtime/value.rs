use crate::ast::{BinaryOp, UnaryOp};

use super::heap::{Heap, Ref};
use super::object::{ExceptionKind, Object, ObjectKind};

/// A runtime datum. Values are copied freely; copying a `Ref` aliases the
/// same heap object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Ref(Ref),
}

impl Value {
    /// Nil and false are false; every other value is true, including zero,
    /// the empty string, and the empty array.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(value) => *value,
            _ => true,
        }
    }

    pub fn as_heap_ref(&self) -> Option<Ref> {
        match self {
            Value::Ref(r) => Some(*r),
            _ => None,
        }
    }

    pub fn type_name(self, heap: &Heap) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Ref(r) => match &heap.object(r).kind {
                ObjectKind::Plain => "object",
                ObjectKind::StringBox(_) => "string",
                ObjectKind::Array(_) => "array",
                ObjectKind::Function(_) => "function",
                ObjectKind::NativeFunction(_) => "native function",
                ObjectKind::Exception(_) => "exception",
                ObjectKind::FfiModule(_) => "module",
            },
        }
    }

    /// The display form used by string concatenation and by `print`.
    pub fn display(self, heap: &Heap) -> String {
        self.display_depth(heap, 3)
    }

    // containers render their children up to a fixed depth so that cyclic
    // object graphs terminate
    fn display_depth(self, heap: &Heap, depth: u32) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Number(value) => format_number(value),
            Value::Ref(r) => {
                let object = heap.object(r);
                match &object.kind {
                    ObjectKind::StringBox(content) => content.clone(),
                    ObjectKind::Array(elements) => {
                        if depth == 0 {
                            return "[...]".to_string();
                        }
                        let rendered: Vec<String> = elements
                            .iter()
                            .map(|element| element.display_depth(heap, depth - 1))
                            .collect();
                        format!("[{}]", rendered.join(", "))
                    }
                    ObjectKind::Plain => {
                        if depth == 0 {
                            return "{...}".to_string();
                        }
                        let rendered: Vec<String> = object
                            .properties
                            .iter()
                            .map(|(key, value)| {
                                format!("{key}: {}", value.display_depth(heap, depth - 1))
                            })
                            .collect();
                        format!("{{ {} }}", rendered.join(", "))
                    }
                    ObjectKind::Function(function) => match &function.name {
                        Some(name) => format!("<fn {name}>"),
                        None => "<fn>".to_string(),
                    },
                    ObjectKind::NativeFunction(native) => format!("<native fn {}>", native.name),
                    ObjectKind::Exception(data) => format!("{}: {}", data.kind, data.message),
                    ObjectKind::FfiModule(module) => format!("<module {}>", module.path),
                }
            }
        }
    }
}

/// The decimal form of a number, also used when a numeric property key is
/// coerced to a string (so `o[1]` and `o["1"]` address the same slot).
pub fn format_number(value: f64) -> String {
    value.to_string()
}

/// Coerce a value into a property key. Only numbers and strings qualify.
pub fn property_key(heap: &Heap, value: Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(format_number(n)),
        Value::Ref(r) => match &heap.object(r).kind {
            ObjectKind::StringBox(content) => Some(content.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// An operator failure, carried back to the evaluator which turns it into a
/// thrown exception object.
#[derive(Debug)]
pub struct OpError {
    pub kind: ExceptionKind,
    pub message: String,
}

impl OpError {
    fn type_error(message: String) -> OpError {
        OpError {
            kind: ExceptionKind::Type,
            message,
        }
    }
}

pub type OpResult = Result<Value, OpError>;

pub fn binary_op(heap: &mut Heap, op: BinaryOp, lhs: Value, rhs: Value) -> OpResult {
    match op {
        BinaryOp::Add => arithmetic(heap, op, lhs, rhs, |a, b| a + b),
        BinaryOp::Sub => arithmetic(heap, op, lhs, rhs, |a, b| a - b),
        BinaryOp::Mult => arithmetic(heap, op, lhs, rhs, |a, b| a * b),
        // division by zero follows IEEE rules and produces an infinity or NaN
        BinaryOp::Div => arithmetic(heap, op, lhs, rhs, |a, b| a / b),
        BinaryOp::Pow => arithmetic(heap, op, lhs, rhs, f64::powf),
        BinaryOp::Modulo => arithmetic(heap, op, lhs, rhs, |a, b| a % b),
        BinaryOp::ShiftLeft => arithmetic(heap, op, lhs, rhs, |a, b| {
            (a as i64).wrapping_shl(b as i64 as u32) as f64
        }),
        BinaryOp::ShiftRight => arithmetic(heap, op, lhs, rhs, |a, b| {
            (a as i64).wrapping_shr(b as i64 as u32) as f64
        }),
        BinaryOp::Equals => Ok(Value::Bool(equals(heap, lhs, rhs))),
        BinaryOp::NotEquals => Ok(Value::Bool(!equals(heap, lhs, rhs))),
        BinaryOp::GreaterThan
        | BinaryOp::LessThan
        | BinaryOp::GreaterThanOrEquals
        | BinaryOp::LessThanOrEquals => compare(heap, op, lhs, rhs),
        BinaryOp::Xor => Ok(Value::Bool(lhs.truthy() ^ rhs.truthy())),
        BinaryOp::StringConcat => {
            let text = format!("{}{}", lhs.display(heap), rhs.display(heap));
            Ok(Value::Ref(heap.allocate(Object::string(text))))
        }
        // short-circuiting means these never reach operator dispatch
        BinaryOp::And | BinaryOp::Or => {
            panic!("Logical operators must be handled by the evaluator.")
        }
    }
}

pub fn unary_op(heap: &Heap, op: UnaryOp, operand: Value) -> OpResult {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.truthy())),
        UnaryOp::Negate => match operand {
            Value::Number(value) => Ok(Value::Number(-value)),
            _ => Err(OpError::type_error(format!(
                "Cannot negate a {}.",
                operand.type_name(heap)
            ))),
        },
        UnaryOp::Length => length(heap, operand),
    }
}

/// String and array length; every other kind is a type error.
pub fn length(heap: &Heap, value: Value) -> OpResult {
    if let Value::Ref(r) = value {
        match &heap.object(r).kind {
            ObjectKind::StringBox(content) => return Ok(Value::Number(content.len() as f64)),
            ObjectKind::Array(elements) => return Ok(Value::Number(elements.len() as f64)),
            _ => {}
        }
    }
    Err(OpError::type_error(format!(
        "Cannot take the length of a {}.",
        value.type_name(heap)
    )))
}

/// Same-tag equality. References compare by identity unless both sides are
/// string boxes, which compare by content. Heterogeneous tags are unequal.
pub fn equals(heap: &Heap, lhs: Value, rhs: Value) -> bool {
    match (lhs, rhs) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Ref(a), Value::Ref(b)) => {
            if a == b {
                return true;
            }
            match (&heap.object(a).kind, &heap.object(b).kind) {
                (ObjectKind::StringBox(x), ObjectKind::StringBox(y)) => x == y,
                _ => false,
            }
        }
        _ => false,
    }
}

fn arithmetic(
    heap: &Heap,
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
    apply: impl Fn(f64, f64) -> f64,
) -> OpResult {
    let (a, b) = numeric_operands(heap, op, lhs, rhs)?;
    Ok(Value::Number(apply(a, b)))
}

fn numeric_operands(heap: &Heap, op: BinaryOp, lhs: Value, rhs: Value) -> Result<(f64, f64), OpError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),
        _ => Err(OpError::type_error(format!(
            "Operator '{}' requires numeric operands, found {} and {}.",
            op.symbol(),
            lhs.type_name(heap),
            rhs.type_name(heap)
        ))),
    }
}

fn compare(heap: &Heap, op: BinaryOp, lhs: Value, rhs: Value) -> OpResult {
    let result = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match op {
            BinaryOp::GreaterThan => a > b,
            BinaryOp::LessThan => a < b,
            BinaryOp::GreaterThanOrEquals => a >= b,
            BinaryOp::LessThanOrEquals => a <= b,
            _ => panic!("Unhandled comparison operator: {op:?}"),
        },
        (Value::Ref(a), Value::Ref(b)) => {
            // ordered comparison is defined for string boxes only (lexicographic)
            let (ObjectKind::StringBox(x), ObjectKind::StringBox(y)) =
                (&heap.object(a).kind, &heap.object(b).kind)
            else {
                return Err(comparison_error(heap, op, lhs, rhs));
            };
            match op {
                BinaryOp::GreaterThan => x > y,
                BinaryOp::LessThan => x < y,
                BinaryOp::GreaterThanOrEquals => x >= y,
                BinaryOp::LessThanOrEquals => x <= y,
                _ => panic!("Unhandled comparison operator: {op:?}"),
            }
        }
        _ => return Err(comparison_error(heap, op, lhs, rhs)),
    };
    Ok(Value::Bool(result))
}

fn comparison_error(heap: &Heap, op: BinaryOp, lhs: Value, rhs: Value) -> OpError {
    OpError::type_error(format!(
        "Operator '{}' cannot compare {} and {}.",
        op.symbol(),
        lhs.type_name(heap),
        rhs.type_name(heap)
    ))
}
