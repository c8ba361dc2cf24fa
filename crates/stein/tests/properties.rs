//! Property tests for the reader and for arithmetic.

use proptest::prelude::*;
use stein::{parse, Evaluator, Expr, Value};

fn arb_symbol() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-zA-Z0-9]{0,8}".prop_filter("reserved", |s| s != "nil"),
        "[a-z][a-zA-Z]{0,6}:",
        Just("+".to_string()),
        Just("<=".to_string()),
        Just("->".to_string()),
    ]
}

fn arb_atom() -> impl Strategy<Value = Expr> {
    prop_oneof![
        any::<i64>().prop_map(Expr::int),
        any::<f64>()
            .prop_filter("finite", |x| x.is_finite())
            .prop_map(Expr::float),
        "[ -~\t\n]{0,12}".prop_map(|s| Expr::string(&s)),
        arb_symbol().prop_map(|s| Expr::symbol(&s)),
        Just(Expr::nil()),
    ]
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    arb_atom().prop_recursive(4, 48, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(Expr::list)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn printed_trees_read_back_equal(exprs in prop::collection::vec(arb_expr(), 1..4)) {
        let printed = exprs.iter().map(Expr::to_string).collect::<Vec<_>>().join("\n");
        let reparsed = parse(&printed, "generated").unwrap();
        prop_assert_eq!(reparsed, exprs);
    }

    #[test]
    fn parsing_never_panics(source in "[()a-z0-9 \":;.\\\\-]{0,40}") {
        let _ = parse(&source, "generated");
    }

    #[test]
    fn integer_addition_matches_rust(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
        let evaluator = Evaluator::new();
        let result = evaluator.run(&format!("({} + {})", a, b), "generated").unwrap();
        prop_assert_eq!(result, Value::Int(a + b));
    }
}
