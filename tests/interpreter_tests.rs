use ore::error::UncaughtException;
use ore::parser;
use ore::runtime::{stdlib, Interpreter, Value};
use ore::scanner;

type TestResult = ore::error::GenericResult<()>;

// run ore source with a fresh interpreter and prelude, returning the display
// form of the program result and the captured program output
fn run(code: &str) -> ore::error::GenericResult<(String, String)> {
    let mut buffer = Vec::new();
    let tokens = scanner::scan_tokens(code)?;
    let program = parser::parse(&tokens)?;
    let mut interpreter = Interpreter::new(&mut buffer);
    stdlib::install_prelude(&mut interpreter);
    let value = interpreter.run(&program)?;
    let rendered = value.display(interpreter.heap());
    drop(interpreter);
    Ok((rendered, String::from_utf8(buffer)?))
}

fn run_result(code: &str) -> ore::error::GenericResult<String> {
    Ok(run(code)?.0)
}

fn run_uncaught(code: &str) -> UncaughtException {
    let tokens = scanner::scan_tokens(code).expect("scanning should succeed");
    let program = parser::parse(&tokens).expect("parsing should succeed");
    let mut buffer = Vec::new();
    let mut interpreter = Interpreter::new(&mut buffer);
    stdlib::install_prelude(&mut interpreter);
    interpreter
        .run(&program)
        .expect_err("program should end with an uncaught exception")
}

#[test]
fn addition_of_variables() -> TestResult {
    let result = run_result("x = 1; y = 2; return x + y")?;
    assert_eq!("3", result);
    Ok(())
}

#[test]
fn recursive_factorial() -> TestResult {
    let code = "\
        fn fact(n)
            if n <= 1 then return 1 end
            return n * fact(n - 1)
        end
        return fact(5)";
    assert_eq!("120", run_result(code)?);
    Ok(())
}

#[test]
fn array_index_assignment() -> TestResult {
    let result = run_result("a = [10, 20, 30]; a[1] = 99; return a[0] + a[1] + a[2]")?;
    assert_eq!("139", result);
    Ok(())
}

#[test]
fn object_property_update() -> TestResult {
    let result = run_result("o = {k: 1}; o.k = o.k + 41; return o.k")?;
    assert_eq!("42", result);
    Ok(())
}

#[test]
fn thrown_string_is_caught() -> TestResult {
    let result = run_result("try throw \"boom\" catch e do return e end")?;
    assert_eq!("boom", result);
    Ok(())
}

#[test]
fn for_loop_accumulates() -> TestResult {
    let result = run_result("c = 0; for i = 0, i < 5, i = i + 1 do c = c + i end; return c")?;
    assert_eq!("10", result);
    Ok(())
}

#[test]
fn closure_counter() -> TestResult {
    let code = "\
        mk = fn()
            c = 0
            return fn() c = c + 1; return c end
        end
        f = mk()
        f()
        f()
        return f()";
    assert_eq!("3", run_result(code)?);
    Ok(())
}

#[test]
fn assignment_rebinds_in_defining_ancestor() -> TestResult {
    let code = "\
        x = \"outer\"
        if true then
            x = \"inner\"
        end
        return x";
    assert_eq!("inner", run_result(code)?);
    Ok(())
}

#[test]
fn block_local_binding_does_not_escape() {
    let code = "\
        if true then
            y = \"block local\"
        end
        return y";
    let uncaught = run_uncaught(code);
    assert_eq!("ReferenceError", uncaught.kind);
    assert_eq!("Undefined variable y.", uncaught.message);
}

#[test]
fn closures_capture_the_defining_scope_chain() -> TestResult {
    let code = "\
        n = 1
        f = fn() return n end
        n = 5
        return f()";
    assert_eq!("5", run_result(code)?);
    Ok(())
}

#[test]
fn closure_over_unbound_name_is_a_reference_error() {
    let uncaught = run_uncaught("f = fn() return m end; f()");
    assert_eq!("ReferenceError", uncaught.kind);
}

#[test]
fn logical_operators_short_circuit() -> TestResult {
    let code = "\
        calls = 0
        fn g()
            global calls = calls + 1
            return true
        end
        a = false and g()
        b = true or g()
        return [calls, a, b]";
    assert_eq!("[0, false, true]", run_result(code)?);
    Ok(())
}

#[test]
fn logical_operators_yield_the_deciding_operand() -> TestResult {
    let result = run_result("return [nil and 1, 2 and 3, nil or \"x\", 4 or 5]")?;
    assert_eq!("[nil, 3, x, 4]", result);
    Ok(())
}

#[test]
fn xor_coerces_to_boolean() -> TestResult {
    let result = run_result("return [true xor false, true xor true, 1 xor nil]")?;
    assert_eq!("[true, false, true]", result);
    Ok(())
}

#[test]
fn finally_runs_after_normal_and_thrown_exits() -> TestResult {
    let code = "\
        log = \"\"
        try
            log = log .. \"t\"
        catch e do
            log = log .. \"c\"
        finally
            log = log .. \"f\"
        end
        try
            throw \"x\"
        catch e do
            log = log .. \"c\"
        finally
            log = log .. \"f\"
        end
        return log";
    assert_eq!("tfcf", run_result(code)?);
    Ok(())
}

#[test]
fn finally_runs_when_return_unwinds_through() -> TestResult {
    let code = "\
        trace = \"\"
        fn f()
            try
                return \"r\"
            catch e do
                return \"c\"
            finally
                global trace = trace .. \"f\"
            end
        end
        return f() .. trace";
    assert_eq!("rf", run_result(code)?);
    Ok(())
}

#[test]
fn finally_runs_when_break_unwinds_through() -> TestResult {
    let code = "\
        log = \"\"
        for i = 0, i < 3, i = i + 1 do
            try
                if i == 1 then break end
            catch e do
                log = log .. \"c\"
            finally
                log = log .. str(i)
            end
        end
        return log";
    assert_eq!("01", run_result(code)?);
    Ok(())
}

#[test]
fn finalizer_signal_replaces_the_pending_one() -> TestResult {
    let code = "\
        try
            try
                throw \"inner\"
            catch e do
                throw \"rethrown\"
            finally
                throw \"from finally\"
            end
        catch e do
            return e
        end";
    assert_eq!("from finally", run_result(code)?);
    Ok(())
}

#[test]
fn do_while_runs_body_before_first_test() -> TestResult {
    assert_eq!("1", run_result("n = 0; do n = n + 1 end while false; return n")?);
    let code = "\
        count = 0
        do
            count = count + 1
        end while count < 3
        return count";
    assert_eq!("3", run_result(code)?);
    Ok(())
}

#[test]
fn while_loop_with_continue() -> TestResult {
    let code = "\
        total = 0
        i = 0
        while i < 10 do
            i = i + 1
            if i % 2 == 0 then continue end
            total = total + i
        end
        return total";
    assert_eq!("25", run_result(code)?);
    Ok(())
}

#[test]
fn compound_assignment_on_identifiers() -> TestResult {
    let code = "\
        x = 10
        x += 5
        x *= 2
        x -= 3
        x /= 9
        s = \"a\"
        s ..= \"b\"
        return [x, s]";
    assert_eq!("[3, ab]", run_result(code)?);
    Ok(())
}

#[test]
fn compound_assignment_on_members() -> TestResult {
    let code = "\
        o = {n: 1}
        o.n += 2
        a = [1, 2]
        a[0] += 9
        return [o.n, a[0]]";
    assert_eq!("[3, 10]", run_result(code)?);
    Ok(())
}

#[test]
fn shift_operators_truncate_to_integers() -> TestResult {
    assert_eq!("[16, 32]", run_result("return [1 << 4, 256 >> 3]")?);
    Ok(())
}

#[test]
fn power_and_modulo() -> TestResult {
    assert_eq!("[1024, 1]", run_result("return [2 ** 10, 7 % 3]")?);
    Ok(())
}

#[test]
fn string_operations() -> TestResult {
    let code = "return [(\"abc\" < \"abd\"), (\"a\" .. 1 .. true), #\"hello\", \"hello\"[1]]";
    assert_eq!("[true, a1true, 5, e]", run_result(code)?);
    Ok(())
}

#[test]
fn equality_semantics() -> TestResult {
    let code = "\
        a = [1]
        b = [1]
        return [a == a, a == b, \"x\" == \"x\", 1 == \"1\", nil == nil, nil == false]";
    assert_eq!("[true, false, true, false, true, false]", run_result(code)?);
    Ok(())
}

#[test]
fn truthiness_of_values() -> TestResult {
    let result = run_result("return [not nil, not false, not 0, not \"\", not []]")?;
    assert_eq!("[true, true, false, false, false]", result);
    Ok(())
}

#[test]
fn arithmetic_type_error_is_catchable() -> TestResult {
    let code = "try return 1 + \"x\" catch e do return e end";
    assert_eq!(
        "TypeError: Operator '+' requires numeric operands, found number and string.",
        run_result(code)?
    );
    Ok(())
}

#[test]
fn calling_a_non_callable_is_a_type_error() -> TestResult {
    let code = "try nil() catch e do return e end";
    assert_eq!("TypeError: Cannot call a nil value.", run_result(code)?);
    Ok(())
}

#[test]
fn length_of_a_number_is_a_type_error() -> TestResult {
    let code = "try return #5 catch e do return e end";
    assert_eq!(
        "TypeError: Cannot take the length of a number.",
        run_result(code)?
    );
    Ok(())
}

#[test]
fn division_by_zero_follows_ieee() -> TestResult {
    assert_eq!("[inf, -inf]", run_result("return [1 / 0, -1 / 0]")?);
    Ok(())
}

#[test]
fn parameter_defaults() -> TestResult {
    let code = "\
        fn greet(name, greeting = \"hello\")
            return greeting .. \" \" .. name
        end
        return greet(\"ore\")";
    assert_eq!("hello ore", run_result(code)?);

    // a default may reference parameters bound before it
    let code = "fn f(a, b = a + 1) return b end; return f(4)";
    assert_eq!("5", run_result(code)?);
    Ok(())
}

#[test]
fn surplus_and_missing_arguments() -> TestResult {
    assert_eq!("1", run_result("fn f(a) return a end; return f(1, 2, 3)")?);
    assert_eq!("[true]", run_result("fn f(a) return a end; return [f() == nil]")?);
    Ok(())
}

#[test]
fn array_reads_and_writes_out_of_range() -> TestResult {
    let code = "\
        a = [1]
        x = a[5]
        a[3] = 9
        return [x == nil, #a, a[2] == nil, a[3]]";
    assert_eq!("[true, 4, true, 9]", run_result(code)?);
    Ok(())
}

#[test]
fn numeric_keys_collide_with_decimal_strings() -> TestResult {
    assert_eq!("one", run_result("o = {}; o[1] = \"one\"; return o[\"1\"]")?);
    Ok(())
}

#[test]
fn member_access_on_scalars_reads_nil() -> TestResult {
    assert_eq!("[true, true]", run_result("x = nil; return [x.foo == nil, true.bar == nil]")?);
    Ok(())
}

#[test]
fn member_write_on_scalar_is_a_type_error() -> TestResult {
    let code = "try 5.x = 1 catch e do return e end";
    assert_eq!(
        "TypeError: Cannot set properties on a number value.",
        run_result(code)?
    );
    Ok(())
}

#[test]
fn global_statement_targets_the_program_scope() -> TestResult {
    let code = "\
        x = \"program\"
        fn f()
            global x = \"set from f\"
        end
        f()
        return x";
    assert_eq!("set from f", run_result(code)?);

    // global may also create a binding that didn't exist yet
    assert_eq!("1", run_result("fn g() global fresh = 1 end; g(); return fresh")?);
    Ok(())
}

#[test]
fn else_branches_chain() -> TestResult {
    let code = "\
        fn classify(n)
            if n < 0 then
                return \"negative\"
            else
                if n == 0 then return \"zero\" end
                return \"positive\"
            end
        end
        return classify(0) .. \" \" .. classify(5) .. \" \" .. classify(-5)";
    assert_eq!("zero positive negative", run_result(code)?);
    Ok(())
}

#[test]
fn uncaught_exception_reports_kind_message_and_stack() {
    let code = "\
        fn inner() return missing end
        fn outer() return inner() end
        outer()";
    let uncaught = run_uncaught(code);
    assert_eq!("ReferenceError", uncaught.kind);
    assert_eq!("Undefined variable missing.", uncaught.message);
    assert_eq!(vec!["outer".to_string(), "inner".to_string()], uncaught.stack);
}

#[test]
fn break_outside_a_loop_is_a_type_error() {
    assert_eq!("TypeError", run_uncaught("break").kind);
    assert_eq!("TypeError", run_uncaught("fn f() continue end; f()").kind);
}

#[test]
fn break_does_not_cross_a_call_boundary() {
    // a break raised inside a called function must not escape into the
    // caller's loop
    let code = "\
        fn f() break end
        while true do f() end";
    assert_eq!("TypeError", run_uncaught(code).kind);
}

#[test]
fn print_writes_to_program_output() -> TestResult {
    let (_, output) = run("print(\"hello\", 42)")?;
    assert_eq!("hello 42\n", output);
    Ok(())
}

#[test]
fn program_result_is_last_statement_value() -> TestResult {
    assert_eq!("7", run_result("1 + 1; 3 + 4")?);
    assert_eq!("nil", run_result("")?);
    Ok(())
}

#[test]
fn prelude_helpers() -> TestResult {
    let code = "\
        a = [1, 2]
        push(a, 3)
        last = pop(a)
        o = {k: 1, j: 2}
        return [len(a), last, len(\"abc\"), type_of(a), contains(o, \"k\"), contains(o, \"z\"), keys(o)]";
    assert_eq!(
        "[2, 3, 3, array, true, false, [j, k]]",
        run_result(code)?
    );
    Ok(())
}

#[test]
fn exported_value_is_visible_to_the_embedder() -> TestResult {
    let tokens = scanner::scan_tokens("export {answer: 42}; return nil")?;
    let program = parser::parse(&tokens)?;
    let mut buffer = Vec::new();
    let mut interpreter = Interpreter::new(&mut buffer);
    stdlib::install_prelude(&mut interpreter);
    interpreter.run(&program)?;
    let exported = interpreter
        .exported_value()
        .expect("export statement should record a value");
    assert_eq!("{ answer: 42 }", exported.display(interpreter.heap()));
    Ok(())
}

#[test]
fn registered_native_callables_are_invokable() -> TestResult {
    fn native_double(
        interpreter: &mut Interpreter,
        args: &[Value],
    ) -> ore::runtime::object::NativeResult {
        match args.first() {
            Some(Value::Number(n)) => Ok(Value::Number(n * 2.0)),
            _ => Err(interpreter.make_error(
                ore::runtime::object::ExceptionKind::Type,
                "double expects a number.",
            )),
        }
    }

    let tokens = scanner::scan_tokens("return double(21)")?;
    let program = parser::parse(&tokens)?;
    let mut buffer = Vec::new();
    let mut interpreter = Interpreter::new(&mut buffer);
    interpreter.register("double", native_double);
    let value = interpreter.run(&program)?;
    assert_eq!("42", value.display(interpreter.heap()));
    Ok(())
}

#[test]
fn native_panic_becomes_a_catchable_native_error() -> TestResult {
    fn native_boom(
        _interpreter: &mut Interpreter,
        _args: &[Value],
    ) -> ore::runtime::object::NativeResult {
        panic!("intentional");
    }

    let tokens = scanner::scan_tokens("try boom() catch e do return e end")?;
    let program = parser::parse(&tokens)?;
    let mut buffer = Vec::new();
    let mut interpreter = Interpreter::new(&mut buffer);
    interpreter.register("boom", native_boom);
    let value = interpreter.run(&program)?;
    assert_eq!(
        "NativeError: Native callable boom panicked: intentional",
        value.display(interpreter.heap())
    );
    Ok(())
}

#[test]
fn runaway_recursion_is_a_range_error() {
    let uncaught = run_uncaught("fn f() return f() end; f()");
    assert_eq!("RangeError", uncaught.kind);
    assert_eq!("Call stack overflow.", uncaught.message);
}

#[test]
fn tick_hook_interrupts_execution() {
    let tokens = scanner::scan_tokens("while true do end").expect("scanning should succeed");
    let program = parser::parse(&tokens).expect("parsing should succeed");
    let mut buffer = Vec::new();
    let mut interpreter = Interpreter::new(&mut buffer);
    let mut ticks = 0u32;
    interpreter.set_tick_hook(Box::new(move || {
        ticks += 1;
        ticks < 100
    }));
    let uncaught = interpreter
        .run(&program)
        .expect_err("hook should interrupt the loop");
    assert_eq!("NativeError", uncaught.kind);
}

#[test]
fn runs_are_deterministic() -> TestResult {
    let code = "\
        o = {tag: \"t\"}
        a = [1, o, \"s\"]
        print(a[1].tag .. str(#a))
        return (3 + 4) * 2";
    let first = run(code)?;
    let second = run(code)?;
    assert_eq!(first, second);
    Ok(())
}
