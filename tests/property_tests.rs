use proptest::prelude::*;

// run ore source and return the display form of the program result
fn run(code: &str) -> String {
    let mut buffer = Vec::new();
    ore::execute(code, &mut buffer).expect("program should run")
}

// run ore source and return both the result and the captured program output
fn run_with_output(code: &str) -> (String, String) {
    let mut buffer = Vec::new();
    let result = ore::execute(code, &mut buffer).expect("program should run");
    (result, String::from_utf8(buffer).expect("output should be utf-8"))
}

proptest! {
    // exact for integral doubles well inside the 2^53 mantissa range
    #[test]
    fn addition_round_trips(x in -1_000_000i64..1_000_000i64) {
        prop_assert_eq!(run(&format!("x = {x}; return ((x + 1) - 1) == x")), "true");
    }

    #[test]
    fn equality_is_reflexive_for_numbers(x in any::<i32>()) {
        prop_assert_eq!(run(&format!("v = {x}; return v == v")), "true");
    }

    #[test]
    fn equality_is_reflexive_for_strings(s in "[a-z]{0,10}") {
        prop_assert_eq!(run(&format!("v = \"{s}\"; return v == v")), "true");
    }

    #[test]
    fn equality_is_reflexive_for_nil_and_bools(b in any::<bool>()) {
        prop_assert_eq!(run(&format!("v = {b}; return [v == v, nil == nil]")), "[true, true]");
    }

    #[test]
    fn array_literal_length_matches(n in 0usize..24) {
        let elements = vec!["0"; n].join(", ");
        prop_assert_eq!(run(&format!("return #[{elements}]")), n.to_string());
    }

    #[test]
    fn concatenation_length_adds(a in "[a-z]{0,12}", b in "[a-z]{0,12}") {
        let code = format!("return #(\"{a}\" .. \"{b}\")");
        prop_assert_eq!(run(&code), (a.len() + b.len()).to_string());
    }

    // with no native callables beyond the deterministic prelude, two fresh
    // interpreters observe identical results and output
    #[test]
    fn runs_are_deterministic(a in -100i64..100, b in -100i64..100) {
        let code = format!(
            "x = {a}; y = {b}; o = {{sum: x + y}}; print(o.sum, x * y); return o.sum - y"
        );
        prop_assert_eq!(run_with_output(&code), run_with_output(&code));
    }
}
