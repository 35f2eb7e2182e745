//! End-to-end tests: parse → compile → evaluate.

use rowforge_eval::{Compiled, CompileContext, State};
use rowforge_parser::{parse, parse_expr};
use rowforge_types::{Value, NANOS_PER_SEC};

fn compile(ctx: &mut CompileContext, input: &str) -> Compiled {
    let expr = parse_expr(input).expect(input);
    ctx.compile_expr(&expr).expect(input)
}

fn eval_one(input: &str) -> Value {
    let mut ctx = CompileContext::new();
    let compiled = compile(&mut ctx, input);
    let mut state = State::new(&mut ctx, 0);
    compiled.eval(&mut state).expect(input)
}

#[test]
fn test_generate_series_expr() {
    assert_eq!(
        eval_one("generate_series(1, 5, 2)"),
        Value::Array(vec![Value::Int(1), Value::Int(3), Value::Int(5)])
    );
}

#[test]
fn test_case_folds_to_constant() {
    let mut ctx = CompileContext::new();
    let compiled = compile(
        &mut ctx,
        "case 2 when 1 then 'a' when 2 then 'b' else 'c' end",
    );
    match compiled {
        Compiled::Constant(v) => assert_eq!(v, Value::bytes(*b"b")),
        other => panic!("CASE over constants must fold, got {other:?}"),
    }
}

#[test]
fn test_case_short_circuits_on_state() {
    let mut ctx = CompileContext::new();
    let compiled = compile(
        &mut ctx,
        "case rownum when 1 then 'first' when 2 then 'second' else 'rest' end",
    );
    let mut state = State::new(&mut ctx, 0);
    state.row_num = 2;
    assert_eq!(compiled.eval(&mut state).unwrap(), Value::bytes(*b"second"));
    state.row_num = 9;
    assert_eq!(compiled.eval(&mut state).unwrap(), Value::bytes(*b"rest"));
}

#[test]
fn test_searched_case_uses_truth() {
    let mut ctx = CompileContext::new();
    let compiled = compile(&mut ctx, "case when rownum > 3 then 'big' else 'small' end");
    let mut state = State::new(&mut ctx, 0);
    state.row_num = 5;
    assert_eq!(compiled.eval(&mut state).unwrap(), Value::bytes(*b"big"));
    state.row_num = 1;
    assert_eq!(compiled.eval(&mut state).unwrap(), Value::bytes(*b"small"));
}

#[test]
fn test_row_counters() {
    let mut ctx = CompileContext::new();
    let compiled = compile(&mut ctx, "rownum * 10 + subrownum");
    let mut state = State::new(&mut ctx, 0);
    state.row_num = 3;
    state.sub_row_num = 7;
    assert_eq!(compiled.eval(&mut state).unwrap(), Value::Int(37));
}

#[test]
fn test_variables_persist_across_rows() {
    let mut ctx = CompileContext::new();
    let set = compile(&mut ctx, "@counter := coalesce(@counter, 0) + 1");
    let mut state = State::new(&mut ctx, 0);
    assert_eq!(set.eval(&mut state).unwrap(), Value::Int(1));
    assert_eq!(set.eval(&mut state).unwrap(), Value::Int(2));
    assert_eq!(set.eval(&mut state).unwrap(), Value::Int(3));
}

#[test]
fn test_semicolon_chain_evaluates_left_to_right() {
    let mut ctx = CompileContext::new();
    let compiled = compile(&mut ctx, "@x := 5; @y := @x * 2; @y + 1");
    let mut state = State::new(&mut ctx, 0);
    assert_eq!(compiled.eval(&mut state).unwrap(), Value::Int(11));
}

#[test]
fn test_assignment_yields_value_and_rewrites() {
    let mut ctx = CompileContext::new();
    let compiled = compile(&mut ctx, "@x := @y := 4");
    let mut state = State::new(&mut ctx, 0);
    assert_eq!(compiled.eval(&mut state).unwrap(), Value::Int(4));
    let x = compile(&mut ctx, "@x");
    let mut state = State::new(&mut ctx, 0);
    assert_eq!(x.eval(&mut state).unwrap(), Value::Int(4));
}

#[test]
fn test_interval_expression() {
    assert_eq!(
        eval_one("interval 30 minute"),
        Value::Interval(30 * 60 * NANOS_PER_SEC)
    );
    assert_eq!(
        eval_one("interval 2 day / 4"),
        Value::Interval(12 * 3600 * NANOS_PER_SEC)
    );
}

#[test]
fn test_timestamp_plus_interval_expression() {
    let v = eval_one("timestamp '2020-06-01 10:00:00' + interval 90 minute");
    assert_eq!(v.to_string(), "2020-06-01 11:30:00");
}

#[test]
fn test_hex_literal_decodes() {
    assert_eq!(eval_one("X'C2BF'"), Value::Bytes(vec![0xc2, 0xbf]));
}

#[test]
fn test_subscript_expression() {
    assert_eq!(eval_one("array['a', 'b', 'c'][2]"), Value::bytes(*b"b"));
    assert_eq!(eval_one("array['a'][5]"), Value::Null);
}

#[test]
fn test_current_timestamp_is_constant() {
    let mut ctx = CompileContext::new();
    let captured = ctx.current_timestamp;
    let compiled = compile(&mut ctx, "current_timestamp");
    match compiled {
        Compiled::Constant(Value::Timestamp(t)) => assert_eq!(t, captured),
        other => panic!("expected folded timestamp, got {other:?}"),
    }
}

#[test]
fn test_constant_folding_is_semantics_preserving() {
    // Deterministic expressions evaluate to the same value whether or not
    // they were folded at compile time.
    let cases = [
        "1 + 2 * 3",
        "least(9, 4, 7)",
        "'a' || 'b' || 'c'",
        "not (1 > 2)",
        "case 1 when 1 then 'y' end",
        "coalesce(null, null, 3)",
        "-(9223372036854775807 + 1)",
        "2 = 2.0",
    ];
    for input in cases {
        let folded = {
            let mut ctx = CompileContext::new();
            let compiled = compile(&mut ctx, input);
            assert!(
                compiled.is_constant(),
                "{input} should fold at compile time"
            );
            let mut state = State::new(&mut ctx, 0);
            compiled.eval(&mut state).unwrap()
        };
        assert_eq!(folded, eval_one(input), "{input}");
    }
}

#[test]
fn test_random_calls_do_not_fold() {
    let mut ctx = CompileContext::new();
    let compiled = compile(&mut ctx, "rand.range(0, 100)");
    assert!(
        !compiled.is_constant(),
        "random call with constant args must stay unfolded"
    );
}

#[test]
fn test_unknown_function_and_arity_errors() {
    let mut ctx = CompileContext::new();
    let expr = parse_expr("no.such.fn(1)").unwrap();
    let err = ctx.compile_expr(&expr).unwrap_err();
    assert!(err.to_string().contains("unknown function"), "{err}");

    let expr = parse_expr("round(1, 2)").unwrap();
    let err = ctx.compile_expr(&expr).unwrap_err();
    assert!(err.to_string().contains("wrong number of arguments"), "{err}");
}

#[test]
fn test_compile_template_end_to_end() {
    let input = r"
{{ @seq := 0 }}
CREATE TABLE t (
    id INT    {{ @seq := @seq + 1 }},
    flag BOOL {{ rownum = 1 }}
);
/*{{ for each row of t generate 2 rows of u }}*/
CREATE TABLE u (
    parent INT {{ @seq }},
    n INT      {{ subrownum }}
);";
    let template = parse(input).unwrap();
    let mut ctx = CompileContext::new();
    let compiled = ctx.compile_template(&template).unwrap();

    assert_eq!(compiled.global_row.0.len(), 1);
    assert_eq!(compiled.tables.len(), 2);
    assert_eq!(compiled.tables[0].derived.len(), 1);
    assert_eq!(compiled.tables[0].derived[0].0, 1);
    assert_eq!(compiled.tables[0].columns.len(), 2);
    assert!(!compiled.tables[0].content.contains("{{"));

    let mut state = State::new(&mut ctx, 1);
    state.row_num = 1;
    state.sub_row_num = 1;
    let globals = compiled.global_row.eval(&mut state).unwrap();
    assert_eq!(globals, vec![Value::Int(0)]);

    let row = compiled.tables[0].row.eval(&mut state).unwrap();
    assert_eq!(row, vec![Value::Int(1), Value::Bool(true)]);

    // The derived-count expression evaluates in the parent row's context.
    let count = compiled.tables[0].derived[0].1.eval(&mut state).unwrap();
    assert_eq!(count, Value::Int(2));

    let child = compiled.tables[1].row.eval(&mut state).unwrap();
    assert_eq!(child, vec![Value::Int(1), Value::Int(1)]);
}

#[test]
fn test_cloned_context_is_independent() {
    let mut ctx = CompileContext::new();
    let compiled = compile(&mut ctx, "@n := coalesce(@n, 0) + 1");

    let mut worker = ctx.clone();
    {
        let mut state = State::new(&mut ctx, 0);
        compiled.eval(&mut state).unwrap();
        compiled.eval(&mut state).unwrap();
    }
    // The clone still sees the pre-evaluation slot values.
    let mut state = State::new(&mut worker, 0);
    assert_eq!(compiled.eval(&mut state).unwrap(), Value::Int(1));
}

mod props {
    use proptest::prelude::*;

    use super::eval_one;
    use rowforge_types::Value;

    proptest! {
        // A printed integer value parses back to an equal constant, across
        // both representations' boundary.
        #[test]
        fn prop_integer_literal_roundtrip(v in any::<i64>()) {
            prop_assert_eq!(eval_one(&v.to_string()), Value::Int(v));
        }

        #[test]
        fn prop_folded_arithmetic_matches_host(a in any::<i32>(), b in any::<i32>()) {
            let (a, b) = (i64::from(a), i64::from(b));
            let sum = eval_one(&format!("({a}) + ({b})"));
            prop_assert_eq!(sum, Value::Int(a + b));
            let product = eval_one(&format!("({a}) * ({b})"));
            prop_assert_eq!(product, Value::Int(a * b));
        }
    }
}

#[test]
fn test_eval_error_surfaces_immediately() {
    let mut ctx = CompileContext::new();
    let compiled = compile(&mut ctx, "@a := 1; debug.panic(@a); @a := 2");
    let mut state = State::new(&mut ctx, 0);
    assert!(compiled.eval(&mut state).is_err());
    // Writes preceding the failing node stick; later ones never ran.
    let a = compile(&mut ctx, "@a");
    let mut state = State::new(&mut ctx, 0);
    assert_eq!(a.eval(&mut state).unwrap(), Value::Int(1));
}
