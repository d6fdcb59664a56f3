use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use crate::ast::{AssignmentOp, BinaryOp, Block, Expr, Parameter, Program, Stmt};
use crate::error::UncaughtException;

use super::heap::{Heap, HeapConfig, Ref, ScopeRef};
use super::object::{ExceptionKind, FunctionObject, NativeFn, Object, ObjectKind};
use super::scope::{self, Scope};
use super::value::{self, Value};

const MAX_CALL_DEPTH: usize = 256;

/// The non-value outcome of evaluating a node. Signals bubble up through the
/// recursive evaluation until something absorbs them: `Return` at a call
/// boundary, `Break`/`Continue` at the nearest loop, `Throw` at the nearest
/// try statement.
pub enum Signal {
    Return(Value),
    Break,
    Continue,
    Throw(Value),
}

type EvalResult = Result<Value, Signal>;

// resolved target of a member access: either an element of a sequence or a
// named property
enum MemberSlot {
    Index(usize),
    Property(String),
}

enum Invoke {
    Closure,
    Native(String, NativeFn),
}

pub struct Interpreter<'a> {
    heap: Heap,
    // every active scope, innermost last; entry zero is the program scope
    scope_stack: Vec<ScopeRef>,
    // in-flight values that must survive a collection at a safe point; sites
    // that absorb signals truncate back to their saved mark
    temps: Vec<Value>,
    // names of the functions currently entered, for error reporting
    call_names: Vec<String>,
    last_exception_stack: Vec<String>,
    exported: Option<Value>,
    pub output_writer: &'a mut dyn Write,
    tick_hook: Option<Box<dyn FnMut() -> bool + 'a>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(output_writer: &'a mut dyn Write) -> Interpreter<'a> {
        Interpreter::with_config(HeapConfig::default(), output_writer)
    }

    pub fn with_config(config: HeapConfig, output_writer: &'a mut dyn Write) -> Interpreter<'a> {
        let mut heap = Heap::new(config);
        let root = heap.allocate_scope(Scope::new(None));
        Interpreter {
            heap,
            scope_stack: vec![root],
            temps: Vec::new(),
            call_names: Vec::new(),
            last_exception_stack: Vec::new(),
            exported: None,
            output_writer,
            tick_hook: None,
        }
    }

    /// Install a host callable under `name` in the program scope.
    pub fn register(&mut self, name: &str, func: NativeFn) {
        let native = self.heap.allocate(Object::native_function(name, func, None));
        let root_scope = self.root_scope();
        scope::declare(&mut self.heap, root_scope, name, Value::Ref(native));
    }

    /// Install a predicate consulted before each statement of a block; a
    /// false return aborts the program with a NativeError.
    pub fn set_tick_hook(&mut self, hook: Box<dyn FnMut() -> bool + 'a>) {
        self.tick_hook = Some(hook);
    }

    /// The value recorded by the last `export` statement, if any.
    pub fn exported_value(&self) -> Option<Value> {
        self.exported
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn run(&mut self, program: &Program) -> Result<Value, UncaughtException> {
        debug!(statements = program.body.statements.len(), "running program");
        // the program body runs directly in the root scope
        let result = self.execute_block(&program.body.statements);
        self.temps.clear();
        match result {
            Ok(value) => Ok(value),
            Err(Signal::Return(value)) => Ok(value),
            Err(Signal::Throw(value)) => Err(self.build_uncaught(value)),
            Err(Signal::Break) | Err(Signal::Continue) => {
                self.last_exception_stack.clear();
                let value =
                    self.make_error(ExceptionKind::Type, "Break or continue outside of a loop.");
                Err(self.build_uncaught(value))
            }
        }
    }

    /// Allocate a fresh exception object. Native callables use this to build
    /// the error side of their result.
    pub fn make_error(&mut self, kind: ExceptionKind, message: &str) -> Value {
        Value::Ref(self.heap.allocate(Object::exception(kind, message)))
    }

    /// Collect garbage now, rooting the active scopes, the in-flight value
    /// stack, the exported value, and any extra values the caller is holding.
    pub fn collect_garbage(&mut self, extra_roots: &[Value]) {
        let mut value_roots = self.temps.clone();
        value_roots.extend_from_slice(extra_roots);
        if let Some(exported) = self.exported {
            value_roots.push(exported);
        }
        self.heap.collect(&self.scope_stack, &value_roots);
    }

    fn root_scope(&self) -> ScopeRef {
        self.scope_stack[0]
    }

    fn current_scope(&self) -> ScopeRef {
        *self
            .scope_stack
            .last()
            .expect("Scope stack should never be empty.")
    }

    fn build_uncaught(&self, value: Value) -> UncaughtException {
        let (kind, message) = match value {
            Value::Ref(r) => match &self.heap.object(r).kind {
                ObjectKind::Exception(data) => (data.kind.name().to_string(), data.message.clone()),
                _ => ("User".to_string(), value.display(&self.heap)),
            },
            _ => ("User".to_string(), value.display(&self.heap)),
        };
        UncaughtException {
            kind,
            message,
            stack: self.last_exception_stack.clone(),
        }
    }

    // raising records the entered-function stack so an uncaught exception can
    // still report where it came from after the frames unwind
    fn raise(&mut self, value: Value) -> Signal {
        self.last_exception_stack = self.call_names.clone();
        Signal::Throw(value)
    }

    fn raise_error(&mut self, kind: ExceptionKind, message: &str) -> Signal {
        let value = self.make_error(kind, message);
        self.raise(value)
    }

    fn raise_op_error(&mut self, error: value::OpError) -> Signal {
        self.raise_error(error.kind, &error.message)
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> EvalResult {
        let mut last = Value::Nil;
        for statement in statements {
            self.statement_safe_point(last)?;
            last = self.execute_statement(statement)?;
        }
        Ok(last)
    }

    // between statements no evaluation is in flight, which makes this the
    // place where the tick hook runs and a pending collection may happen
    fn statement_safe_point(&mut self, pending: Value) -> Result<(), Signal> {
        let interrupted = match &mut self.tick_hook {
            Some(hook) => !hook(),
            None => false,
        };
        if interrupted {
            return Err(self.raise_error(ExceptionKind::Native, "Execution interrupted by host."));
        }
        if self.heap.should_collect() {
            self.collect_garbage(&[pending]);
        }
        Ok(())
    }

    fn execute_statement(&mut self, statement: &Stmt) -> EvalResult {
        match statement {
            Stmt::Expression { expression } => self.evaluate(expression),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => self.if_statement(test, consequent, alternate),
            Stmt::While { test, body } => self.while_statement(test, body),
            Stmt::DoWhile { test, body } => self.do_while_statement(test, body),
            Stmt::For {
                init,
                test,
                update,
                body,
            } => self.for_statement(init, test, update, body),
            Stmt::Return { argument } => {
                let value = match argument {
                    Some(expression) => self.evaluate(expression)?,
                    None => Value::Nil,
                };
                Err(Signal::Return(value))
            }
            Stmt::Break => Err(Signal::Break),
            Stmt::Continue => Err(Signal::Continue),
            Stmt::Throw { argument } => {
                let value = self.evaluate(argument)?;
                Err(self.raise(value))
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => self.try_statement(block, param, handler, finalizer.as_ref()),
            Stmt::Global { assignment } => match assignment {
                Expr::Assignment { op, lhs, rhs } => self.assignment_expression(*op, lhs, rhs, true),
                // reachable only through a malformed tree; the parser rejects this
                _ => Err(self.raise_error(
                    ExceptionKind::Syntax,
                    "Global statement requires an assignment.",
                )),
            },
            Stmt::Export { argument } => {
                let value = self.evaluate(argument)?;
                self.exported = Some(value);
                Ok(Value::Nil)
            }
        }
    }

    fn if_statement(
        &mut self,
        test: &Expr,
        consequent: &Block,
        alternate: &Option<Block>,
    ) -> EvalResult {
        if self.evaluate(test)?.truthy() {
            self.execute_scoped_block(consequent)
        } else if let Some(alternate) = alternate {
            self.execute_scoped_block(alternate)
        } else {
            Ok(Value::Nil)
        }
    }

    // a block introduces a new scope parented at the current one
    fn execute_scoped_block(&mut self, block: &Block) -> EvalResult {
        let scope = self.heap.allocate_scope(Scope::new(Some(self.current_scope())));
        self.scope_stack.push(scope);
        let result = self.execute_block(&block.statements);
        // make sure to restore the scope stack even when a signal unwinds
        self.scope_stack.pop();
        result
    }

    fn while_statement(&mut self, test: &Expr, body: &Block) -> EvalResult {
        let temps_mark = self.temps.len();
        loop {
            // the back edge is also a safe point, so empty bodies still honor
            // the tick hook and pending collections
            self.statement_safe_point(Value::Nil)?;
            if !self.evaluate(test)?.truthy() {
                break;
            }
            match self.execute_scoped_block(body) {
                Ok(_) => {}
                Err(Signal::Break) => break,
                Err(Signal::Continue) => {}
                Err(signal) => return Err(signal),
            }
            self.temps.truncate(temps_mark);
        }
        self.temps.truncate(temps_mark);
        Ok(Value::Nil)
    }

    // the body runs exactly once before the first test
    fn do_while_statement(&mut self, test: &Expr, body: &Block) -> EvalResult {
        let temps_mark = self.temps.len();
        loop {
            self.statement_safe_point(Value::Nil)?;
            match self.execute_scoped_block(body) {
                Ok(_) | Err(Signal::Continue) => {}
                Err(Signal::Break) => break,
                Err(signal) => return Err(signal),
            }
            self.temps.truncate(temps_mark);
            if !self.evaluate(test)?.truthy() {
                break;
            }
        }
        self.temps.truncate(temps_mark);
        Ok(Value::Nil)
    }

    fn for_statement(
        &mut self,
        init: &Option<Expr>,
        test: &Option<Expr>,
        update: &Option<Expr>,
        body: &Block,
    ) -> EvalResult {
        // the loop clauses get their own scope so an induction variable
        // introduced by the initializer stays local to the loop
        let scope = self.heap.allocate_scope(Scope::new(Some(self.current_scope())));
        self.scope_stack.push(scope);
        let result = self.for_loop(init, test, update, body);
        self.scope_stack.pop();
        result
    }

    fn for_loop(
        &mut self,
        init: &Option<Expr>,
        test: &Option<Expr>,
        update: &Option<Expr>,
        body: &Block,
    ) -> EvalResult {
        if let Some(init) = init {
            self.evaluate(init)?;
        }
        let temps_mark = self.temps.len();
        loop {
            self.statement_safe_point(Value::Nil)?;
            // an absent test reads as true
            let proceed = match test {
                Some(test) => self.evaluate(test)?.truthy(),
                None => true,
            };
            if !proceed {
                break;
            }
            match self.execute_scoped_block(body) {
                // continue still runs the update expression
                Ok(_) | Err(Signal::Continue) => {}
                Err(Signal::Break) => break,
                Err(signal) => return Err(signal),
            }
            if let Some(update) = update {
                self.evaluate(update)?;
            }
            self.temps.truncate(temps_mark);
        }
        self.temps.truncate(temps_mark);
        Ok(Value::Nil)
    }

    fn try_statement(
        &mut self,
        block: &Block,
        param: &str,
        handler: &Block,
        finalizer: Option<&Block>,
    ) -> EvalResult {
        let temps_mark = self.temps.len();
        let mut result = self.execute_scoped_block(block);

        if let Err(Signal::Throw(thrown)) = result {
            self.temps.truncate(temps_mark);
            // keep the caught value alive while the handler runs
            self.temps.push(thrown);
            let scope = self.heap.allocate_scope(Scope::new(Some(self.current_scope())));
            scope::declare(&mut self.heap, scope, param, thrown);
            self.scope_stack.push(scope);
            result = self.execute_block(&handler.statements);
            self.scope_stack.pop();
        }

        if let Some(finalizer) = finalizer {
            // the finalizer runs on every exit path; protect a value carried
            // by a pending return or throw while it does
            if let Err(Signal::Return(value)) | Err(Signal::Throw(value)) = &result {
                self.temps.push(*value);
            }
            let finalizer_result = self.execute_scoped_block(finalizer);
            if let Err(signal) = finalizer_result {
                // a signal from the finalizer replaces the pending one
                result = Err(signal);
            }
        }

        self.temps.truncate(temps_mark);
        result
    }

    fn evaluate(&mut self, expression: &Expr) -> EvalResult {
        match expression {
            Expr::NumberLiteral { value } => Ok(Value::Number(*value)),
            Expr::BooleanLiteral { value } => Ok(Value::Bool(*value)),
            Expr::NilLiteral => Ok(Value::Nil),
            Expr::StringLiteral { value } => {
                let r = self.heap.allocate(Object::string(value.clone()));
                Ok(Value::Ref(r))
            }
            Expr::Identifier { name } => {
                match scope::lookup(&self.heap, self.current_scope(), name) {
                    Some(value) => Ok(value),
                    None => Err(self.raise_error(
                        ExceptionKind::Reference,
                        &format!("Undefined variable {name}."),
                    )),
                }
            }
            Expr::FunctionDeclaration {
                name,
                parameters,
                body,
            } => {
                let function = FunctionObject {
                    name: name.clone(),
                    parameters: parameters.clone(),
                    body: body.clone(),
                    captured_scope: self.current_scope(),
                };
                let r = self.heap.allocate(Object::function(function));
                // a named function binds itself in the defining scope so that
                // it can recurse
                if let Some(name) = name {
                    let current_scope = self.current_scope();
                    scope::declare(&mut self.heap, current_scope, name, Value::Ref(r));
                }
                Ok(Value::Ref(r))
            }
            Expr::Call { callee, arguments } => self.call_expression(callee, arguments),
            Expr::Assignment { op, lhs, rhs } => self.assignment_expression(*op, lhs, rhs, false),
            Expr::Binary { op, lhs, rhs } => self.binary_expression(*op, lhs, rhs),
            Expr::Unary { op, operand } => {
                let operand = self.evaluate(operand)?;
                value::unary_op(&self.heap, *op, operand).map_err(|e| self.raise_op_error(e))
            }
            Expr::Member {
                object,
                property,
                computed,
            } => self.member_expression(object, property, *computed),
            Expr::ArrayExpression { elements } => self.array_expression(elements),
            Expr::ObjectExpression { properties } => self.object_expression(properties),
        }
    }

    fn binary_expression(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> EvalResult {
        // and/or yield the deciding operand and never evaluate the right
        // side when the left already decides
        if let BinaryOp::And | BinaryOp::Or = op {
            let left = self.evaluate(lhs)?;
            let decided = match op {
                BinaryOp::And => !left.truthy(),
                _ => left.truthy(),
            };
            if decided {
                return Ok(left);
            }
            return self.evaluate(rhs);
        }

        let left = self.evaluate(lhs)?;
        self.temps.push(left);
        let right = self.evaluate(rhs)?;
        self.temps.pop();
        value::binary_op(&mut self.heap, op, left, right).map_err(|e| self.raise_op_error(e))
    }

    fn call_expression(&mut self, callee: &Expr, arguments: &[Expr]) -> EvalResult {
        let temps_mark = self.temps.len();
        let callee_value = self.evaluate(callee)?;
        self.temps.push(callee_value);
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let value = self.evaluate(argument)?;
            self.temps.push(value);
            args.push(value);
        }
        let result = self.call_value(callee_value, args)?;
        self.temps.truncate(temps_mark);
        Ok(result)
    }

    /// Invoke a callable value. Public so that native callables can re-enter
    /// user code through the closure-invocation contract.
    pub fn call_value(&mut self, callee: Value, args: Vec<Value>) -> EvalResult {
        let Some(r) = callee.as_heap_ref() else {
            let type_name = callee.type_name(&self.heap).to_string();
            return Err(self.raise_error(
                ExceptionKind::Type,
                &format!("Cannot call a {type_name} value."),
            ));
        };
        let invoke = {
            match &self.heap.object(r).kind {
                ObjectKind::Function(_) => Some(Invoke::Closure),
                ObjectKind::NativeFunction(native) => {
                    Some(Invoke::Native(native.name.clone(), native.func))
                }
                _ => None,
            }
        };
        let Some(invoke) = invoke else {
            let type_name = callee.type_name(&self.heap).to_string();
            return Err(self.raise_error(
                ExceptionKind::Type,
                &format!("Cannot call a {type_name} value."),
            ));
        };
        match invoke {
            Invoke::Closure => self.call_function(r, args),
            Invoke::Native(name, func) => self.call_native(&name, func, args),
        }
    }

    fn call_function(&mut self, function: Ref, args: Vec<Value>) -> EvalResult {
        if self.call_names.len() >= MAX_CALL_DEPTH {
            return Err(self.raise_error(ExceptionKind::Range, "Call stack overflow."));
        }
        let (display_name, parameters, body, captured) = {
            let ObjectKind::Function(function) = &self.heap.object(function).kind else {
                panic!("call_function invoked with a non-function object.");
            };
            (
                function
                    .name
                    .clone()
                    .unwrap_or_else(|| "anonymous".to_string()),
                function.parameters.clone(),
                function.body.clone(),
                function.captured_scope,
            )
        };

        // the frame's parent is the captured environment, not the caller
        let frame = self.heap.allocate_scope(Scope::new(Some(captured)));
        self.scope_stack.push(frame);
        self.call_names.push(display_name);
        let result = self.execute_call_frame(frame, &parameters, args, &body);
        self.call_names.pop();
        self.scope_stack.pop();

        match result {
            // a function that runs off the end of its body yields nil
            Ok(_) => Ok(Value::Nil),
            Err(Signal::Return(value)) => Ok(value),
            Err(Signal::Break) | Err(Signal::Continue) => {
                Err(self.raise_error(ExceptionKind::Type, "Break or continue outside of a loop."))
            }
            Err(signal) => Err(signal),
        }
    }

    fn execute_call_frame(
        &mut self,
        frame: ScopeRef,
        parameters: &[Parameter],
        args: Vec<Value>,
        body: &Block,
    ) -> EvalResult {
        for (index, parameter) in parameters.iter().enumerate() {
            let value = match args.get(index) {
                Some(value) => *value,
                // a missing argument takes the parameter's default, evaluated
                // in the new frame; with no default it binds nil
                None => match &parameter.default_value {
                    Some(default) => self.evaluate(default)?,
                    None => Value::Nil,
                },
            };
            scope::declare(&mut self.heap, frame, &parameter.name, value);
        }
        self.execute_block(&body.statements)
    }

    fn call_native(&mut self, name: &str, func: NativeFn, args: Vec<Value>) -> EvalResult {
        self.call_names.push(name.to_string());
        let result = panic::catch_unwind(AssertUnwindSafe(|| func(&mut *self, &args)));
        self.call_names.pop();
        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(thrown)) => Err(self.raise(thrown)),
            // a panic inside the host procedure becomes a catchable exception
            Err(payload) => {
                let message = panic_message(&*payload);
                Err(self.raise_error(
                    ExceptionKind::Native,
                    &format!("Native callable {name} panicked: {message}"),
                ))
            }
        }
    }

    fn assignment_expression(
        &mut self,
        op: AssignmentOp,
        lhs: &Expr,
        rhs: &Expr,
        global: bool,
    ) -> EvalResult {
        match lhs {
            Expr::Identifier { name } => {
                let value = match op.binary_op() {
                    None => self.evaluate(rhs)?,
                    Some(binary) => {
                        // compound forms read the target before the right side runs
                        let current =
                            match scope::lookup(&self.heap, self.current_scope(), name) {
                                Some(value) => value,
                                None => {
                                    return Err(self.raise_error(
                                        ExceptionKind::Reference,
                                        &format!("Undefined variable {name}."),
                                    ))
                                }
                            };
                        self.temps.push(current);
                        let right = self.evaluate(rhs)?;
                        self.temps.pop();
                        value::binary_op(&mut self.heap, binary, current, right)
                            .map_err(|e| self.raise_op_error(e))?
                    }
                };
                if global {
                    let root_scope = self.root_scope();
                    scope::assign_global(&mut self.heap, root_scope, name, value);
                } else {
                    let current_scope = self.current_scope();
                    scope::assign(&mut self.heap, current_scope, name, value);
                }
                Ok(value)
            }
            Expr::Member {
                object,
                property,
                computed,
            } => {
                let temps_mark = self.temps.len();
                let object_value = self.evaluate(object)?;
                self.temps.push(object_value);
                let indexable = self.is_indexable(object_value);
                let slot = self.member_slot(property, *computed, indexable)?;
                let Value::Ref(r) = object_value else {
                    let type_name = object_value.type_name(&self.heap).to_string();
                    return Err(self.raise_error(
                        ExceptionKind::Type,
                        &format!("Cannot set properties on a {type_name} value."),
                    ));
                };
                let value = match op.binary_op() {
                    None => self.evaluate(rhs)?,
                    Some(binary) => {
                        let current = self.read_member_slot(r, &slot);
                        self.temps.push(current);
                        let right = self.evaluate(rhs)?;
                        value::binary_op(&mut self.heap, binary, current, right)
                            .map_err(|e| self.raise_op_error(e))?
                    }
                };
                self.write_member_slot(r, slot, value)?;
                self.temps.truncate(temps_mark);
                Ok(value)
            }
            // reachable only through a malformed tree; the parser rejects this
            _ => Err(self.raise_error(ExceptionKind::Syntax, "Invalid assignment target.")),
        }
    }

    fn member_expression(&mut self, object: &Expr, property: &Expr, computed: bool) -> EvalResult {
        let temps_mark = self.temps.len();
        let object_value = self.evaluate(object)?;
        self.temps.push(object_value);
        let indexable = self.is_indexable(object_value);
        let slot = self.member_slot(property, computed, indexable)?;
        self.temps.truncate(temps_mark);

        // scalars carry no method table, so any property reads as nil
        let Value::Ref(r) = object_value else {
            return Ok(Value::Nil);
        };
        match slot {
            MemberSlot::Index(index) => Ok(self.read_index(r, index)),
            MemberSlot::Property(key) => Ok(self.heap.object(r).get(&key)),
        }
    }

    fn member_slot(
        &mut self,
        property: &Expr,
        computed: bool,
        indexable: bool,
    ) -> Result<MemberSlot, Signal> {
        if !computed {
            let Expr::Identifier { name } = property else {
                // reachable only through a malformed tree
                return Err(self.raise_error(
                    ExceptionKind::Syntax,
                    "Member access requires a property name.",
                ));
            };
            return Ok(MemberSlot::Property(name.clone()));
        }

        let key = self.evaluate(property)?;
        if indexable {
            if let Value::Number(n) = key {
                // non-negative integral numbers address sequence elements;
                // everything else falls through to the property map
                if n >= 0.0 && n.fract() == 0.0 {
                    return Ok(MemberSlot::Index(n as usize));
                }
            }
        }
        match value::property_key(&self.heap, key) {
            Some(key) => Ok(MemberSlot::Property(key)),
            None => {
                let type_name = key.type_name(&self.heap).to_string();
                Err(self.raise_error(
                    ExceptionKind::Type,
                    &format!("A {type_name} value cannot be used as a property key."),
                ))
            }
        }
    }

    fn is_indexable(&self, value: Value) -> bool {
        match value {
            Value::Ref(r) => matches!(
                self.heap.object(r).kind,
                ObjectKind::Array(_) | ObjectKind::StringBox(_)
            ),
            _ => false,
        }
    }

    fn read_index(&mut self, r: Ref, index: usize) -> Value {
        enum Indexed {
            Element(Value),
            Char(Option<char>),
        }
        let indexed = match &self.heap.object(r).kind {
            ObjectKind::Array(elements) => {
                Indexed::Element(elements.get(index).copied().unwrap_or(Value::Nil))
            }
            // indexing a string yields a fresh one-character string box
            ObjectKind::StringBox(content) => Indexed::Char(content.chars().nth(index)),
            _ => Indexed::Element(Value::Nil),
        };
        match indexed {
            Indexed::Element(value) => value,
            Indexed::Char(Some(c)) => Value::Ref(self.heap.allocate(Object::string(c.to_string()))),
            Indexed::Char(None) => Value::Nil,
        }
    }

    fn read_member_slot(&mut self, r: Ref, slot: &MemberSlot) -> Value {
        match slot {
            MemberSlot::Index(index) => self.read_index(r, *index),
            MemberSlot::Property(key) => self.heap.object(r).get(key),
        }
    }

    fn write_member_slot(
        &mut self,
        r: Ref,
        slot: MemberSlot,
        value: Value,
    ) -> Result<(), Signal> {
        match slot {
            MemberSlot::Index(index) => {
                let is_array = matches!(self.heap.object(r).kind, ObjectKind::Array(_));
                if is_array {
                    self.heap.object_mut(r).set_element(index, value);
                    Ok(())
                } else {
                    // string boxes are immutable
                    Err(self.raise_error(
                        ExceptionKind::Type,
                        "Cannot assign into a string value.",
                    ))
                }
            }
            MemberSlot::Property(key) => {
                self.heap.object_mut(r).put(&key, value);
                Ok(())
            }
        }
    }

    fn array_expression(&mut self, elements: &[Expr]) -> EvalResult {
        let temps_mark = self.temps.len();
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            let value = self.evaluate(element)?;
            self.temps.push(value);
            values.push(value);
        }
        let array = self.heap.allocate(Object::array(values));
        self.temps.truncate(temps_mark);
        Ok(Value::Ref(array))
    }

    fn object_expression(&mut self, properties: &[(String, Expr)]) -> EvalResult {
        let object = self.heap.allocate(Object::plain());
        self.temps.push(Value::Ref(object));
        // properties evaluate in declared order
        for (key, expression) in properties {
            let value = self.evaluate(expression)?;
            self.heap.object_mut(object).put(key, value);
        }
        self.temps.pop();
        Ok(Value::Ref(object))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
