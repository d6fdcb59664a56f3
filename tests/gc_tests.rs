use ore::parser;
use ore::runtime::{stdlib, HeapConfig, Interpreter};
use ore::scanner;

type TestResult = ore::error::GenericResult<()>;

// run ore code with a fresh interpreter and return the display form of the
// program result
fn run(code: &str) -> ore::error::GenericResult<String> {
    let mut buffer = Vec::new();
    ore::execute(code, &mut buffer)
}

#[test]
fn garbage_is_reclaimed_after_collection() -> TestResult {
    let code = "\
        gc_collect()
        base = gc_heap_size()
        if true then
            for i = 0, i < 50, i = i + 1 do
                temp = [1, 2, {k: \"v\"}]
            end
        end
        gc_collect()
        return gc_heap_size() - base";
    assert_eq!("0", run(code)?);
    Ok(())
}

#[test]
fn cyclic_object_graphs_are_reclaimed() -> TestResult {
    // a closure capturing the frame that binds it forms a cycle, which
    // reference counting could never reclaim
    let code = "\
        gc_collect()
        base = gc_heap_size()
        if true then
            fn outer()
                self_ref = fn() return self_ref end
                return self_ref
            end
            r = outer()
            a = [nil]
            b = {partner: a}
            a[0] = b
        end
        gc_collect()
        return gc_heap_size() - base";
    assert_eq!("0", run(code)?);
    Ok(())
}

#[test]
fn reachable_cycles_survive_collection() -> TestResult {
    let code = "\
        gc_collect()
        base = gc_heap_size()
        keep = nil
        if true then
            a = [nil]
            b = {partner: a}
            a[0] = b
            global keep = b
        end
        gc_collect()
        return [gc_heap_size() - base, keep.partner[0] == keep]";
    assert_eq!("[2, true]", run(code)?);
    Ok(())
}

#[test]
fn closure_keeps_its_captured_scope_alive() -> TestResult {
    let code = "\
        mk = fn()
            c = 0
            return fn() c = c + 1; return c end
        end
        f = mk()
        f()
        gc_collect()
        return f()";
    assert_eq!("2", run(code)?);
    Ok(())
}

#[test]
fn surviving_objects_remain_readable_after_collection() -> TestResult {
    let code = "\
        keep = {v: 1}
        if true then
            for i = 0, i < 100, i = i + 1 do
                garbage = [\"x\" .. i, {n: i}]
            end
        end
        gc_collect()
        return keep.v";
    assert_eq!("1", run(code)?);
    Ok(())
}

#[test]
fn collection_triggers_automatically_at_the_threshold() -> TestResult {
    let code = "\
        for i = 0, i < 500, i = i + 1 do
            s = \"tmp\" .. i
        end
        return nil";
    let tokens = scanner::scan_tokens(code)?;
    let program = parser::parse(&tokens)?;
    let mut buffer = Vec::new();
    let mut interpreter = Interpreter::with_config(HeapConfig { gc_threshold: 64 }, &mut buffer);
    stdlib::install_prelude(&mut interpreter);
    interpreter.run(&program)?;
    // the loop allocates ~1000 string boxes; with a low threshold the heap
    // must stay near the live set (prelude natives plus a few leftovers)
    assert!(interpreter.heap().live_object_count() < 100);
    Ok(())
}

#[test]
fn exported_value_is_rooted_across_collections() -> TestResult {
    let code = "\
        export {answer: 42}
        gc_collect()
        return nil";
    let tokens = scanner::scan_tokens(code)?;
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
