// Integration tests for the full language: compiler + evaluator together,
// driven through the public API against a host-style data fixture.

use lexel::{compile, evaluate, run, Context, EvalError, Error, Registry, Value};

/// A rules-engine-shaped context: an entity with attributes, host
/// parameters, an array of records, and a constant.
fn fixture() -> Context {
    let data = serde_json::json!({
        "entity": {
            "id": "house>123",
            "name": "Some Switch",
            "attributes": {
                "power_switch": { "state": true },
                "position": { "level": 0.1 },
                "volume": { "level": 0.25 }
            }
        },
        "parameters": { "amount": 0.13 },
        "arr": [
            { "name": "Spot", "type": "beagle" },
            { "name": "Lucy", "type": "shepherd" }
        ],
        "pi": 3.14159265
    });
    let serde_json::Value::Object(map) = data else {
        unreachable!("fixture is an object");
    };
    let ctx = Context::new();
    for (k, v) in map {
        ctx.define_var(&k, Value::from(v));
    }
    ctx
}

fn eval_in(ctx: &Context, src: &str) -> Value {
    let registry = Registry::new();
    evaluate(src, ctx, &registry).unwrap_or_else(|e| panic!("{:?} evaluating {:?}", e, src))
}

fn eval_one(src: &str) -> Value {
    eval_in(&Context::new(), src)
}

fn numbers(ns: &[f64]) -> Value {
    Value::array(ns.iter().map(|n| Value::Number(*n)).collect())
}

fn strings(ss: &[&str]) -> Value {
    Value::array(ss.iter().map(|s| Value::from(*s)).collect())
}

#[test]
fn string_literals_and_escapes() {
    assert_eq!(eval_one(r#""Hello""#), Value::from("Hello"));
    assert_eq!(eval_one("'There'"), Value::from("There"));
    assert_eq!(eval_one("`lexel`"), Value::from("lexel"));
    assert_eq!(eval_one(r"`This is \`fine\``"), Value::from("This is `fine`"));
    assert_eq!(eval_one(r#""So \"is\" this""#), Value::from("So \"is\" this"));
    assert_eq!(eval_one(r"'\t\n'"), Value::from("\t\n"));
    assert_eq!(
        eval_one("`I'm a little \\\n\t\tteapot`"),
        Value::from("I'm a little teapot")
    );
    assert_eq!(
        eval_one("\"he\\x40\\u0041llo\\u{000021} \" + 'there' + `\\nagain`"),
        Value::from("he@Allo! there\nagain")
    );
    assert_eq!(eval_one(r"'\t\\t\z\.'"), Value::from("\t\\tz."));
}

#[test]
fn comments_and_whitespace() {
    assert_eq!(
        eval_one("# Evaluate as best we can\n1 + 1\n# That's it."),
        Value::from(2.0)
    );
    assert_eq!(eval_one("'nice' # this is a comment"), Value::from("nice"));
    assert_eq!(eval_one("\n\n\n\t\t1\t\t\n\n\r"), Value::from(1.0));
}

#[test]
fn numeric_literal_forms() {
    assert_eq!(eval_one("99221"), Value::from(99221.0));
    assert_eq!(eval_one("0x40"), Value::from(64.0));
    assert_eq!(eval_one("0xff"), Value::from(255.0));
    assert_eq!(eval_one("0b1011"), Value::from(11.0));
    assert_eq!(eval_one("0o177"), Value::from(127.0));
    assert_eq!(eval_one("2.75"), Value::from(2.75));
    assert_eq!(eval_one("-4.88"), Value::from(-4.88));
    assert_eq!(eval_one("1e2"), Value::from(100.0));
    assert_eq!(eval_one("1e-3"), Value::from(0.001));
}

#[test]
fn arithmetic_and_precedence() {
    assert_eq!(eval_one("2 ** 16"), Value::from(65536.0));
    assert_eq!(eval_one("350 / 7"), Value::from(50.0));
    assert_eq!(eval_one("357 % 5"), Value::from(2.0));
    assert_eq!(eval_one("-5 - 6"), Value::from(-11.0));
    assert_eq!(eval_one("3 * 2 ** 4"), Value::from(48.0));
    assert_eq!(eval_one("2 ** 4 ** 2"), Value::from(65536.0));
    assert_eq!(eval_one("3 * 8 / 12"), Value::from(2.0));
    assert_eq!(eval_one("4 * 8 + 2"), Value::from(34.0));
    assert_eq!(eval_one("4 - 8 * 2"), Value::from(-12.0));
    assert_eq!(eval_one("1 + (2 + (3 + (4 + (5 + (6 + (7))))))"), Value::from(28.0));
}

#[test]
fn word_operators() {
    assert_eq!(eval_one("true and false"), Value::Bool(false));
    assert_eq!(eval_one("true or false"), Value::Bool(true));
    assert_eq!(eval_one("not true"), Value::Bool(false));
    assert_eq!(eval_one("not false"), Value::Bool(true));
}

#[test]
fn shifts_and_bitwise() {
    assert_eq!(eval_one("4 >> 2"), Value::from(1.0));
    assert_eq!(eval_one("(-4) >> 2"), Value::from(-1.0));
    assert_eq!(eval_one("16 >>> 3"), Value::from(2.0));
    assert_eq!(eval_one("(-16) >>> 3"), Value::from(536870910.0));
    assert_eq!(eval_one("2 << 6"), Value::from(128.0));
    assert_eq!(eval_one("0x30 | 0x10"), Value::from(0x30 as f64));
    assert_eq!(eval_one("0x40 & 0x04"), Value::from(0.0));
}

#[test]
fn coalescing_operators() {
    assert_eq!(eval_one("123 ?? 456"), Value::from(123.0));
    assert_eq!(eval_one("null ?? 456"), Value::from(456.0));
    assert_eq!(eval_one("t=0, 123 ?? (t=456), t"), Value::from(0.0));
    assert_eq!(eval_one("t=0, null ?? (t=456), t"), Value::from(456.0));
    assert_eq!(eval_one("123 ?# null"), Value::from(123.0));
    assert_eq!(eval_one("'123' ?# null"), Value::from(123.0));
    assert_eq!(eval_one("'fox' ?# 'hound'"), Value::from("hound"));
    assert_eq!(eval_one("(1/0) ?# 'rabbit'"), Value::from("rabbit"));
}

#[test]
fn container_identity_semantics() {
    assert_eq!(eval_one("[1,2,3] == [1,2,3]"), Value::Bool(false));
    assert_eq!(eval_one("s=[1,2,3], t=s, s==t"), Value::Bool(true));
    // member assignment is visible through every holder of the reference
    assert_eq!(eval_one("o={a:1}, o.a=9, o.a"), Value::from(9.0));
    assert_eq!(eval_one("o={a:1}, p=o, p.a=9, o.a"), Value::from(9.0));
}

#[test]
fn membership_is_positional_for_arrays() {
    assert_eq!(eval_one("1 in [5, 6, 4]"), Value::Bool(true));
    assert_eq!(eval_one("4 in [5, 6, 4]"), Value::Bool(false));
    assert_eq!(eval_one("1 in { one: 1, two: 2 }"), Value::Bool(false));
    assert_eq!(eval_one("'one' in { one: 1, two: 2 }"), Value::Bool(true));
    assert_eq!(eval_one("'three' in { one: 1, two: 2 }"), Value::Bool(false));
}

#[test]
fn ranges() {
    assert_eq!(eval_one("3..6"), numbers(&[3.0, 4.0, 5.0, 6.0]));
    assert_eq!(eval_one("6..3"), numbers(&[6.0, 5.0, 4.0, 3.0]));
    assert_eq!(eval_one("0.5..2.6"), numbers(&[0.0, 1.0, 2.0]));
    let err = evaluate("1..1001", &Context::new(), &Registry::new()).unwrap_err();
    assert!(matches!(err, Error::Eval(EvalError::Range(_))));
}

#[test]
fn extended_identifiers() {
    assert_eq!(
        eval_one("gem\u{00b5}se = 'gut', gem\u{00b5}se"),
        Value::from("gut")
    );
}

#[test]
fn fixture_member_access() {
    let ctx = fixture();
    assert_eq!(eval_in(&ctx, "entity.id"), Value::from("house>123"));
    assert_eq!(eval_in(&ctx, "pi"), Value::from(3.14159265));
    assert_eq!(
        eval_in(&ctx, "t='attributes', str(entity[t]['power_switch']['state'])"),
        Value::from("true")
    );
    assert_eq!(
        eval_in(&ctx, "entity.attributes.position.level"),
        Value::from(0.1)
    );
}

#[test]
fn fixture_null_conditional_chains() {
    let ctx = fixture();
    assert_eq!(eval_in(&ctx, "entity?.id"), Value::from("house>123"));
    assert_eq!(eval_in(&ctx, "entity?.attributes?.size?.octopus"), Value::Null);
    assert_eq!(
        eval_in(&ctx, "entity?.attributes?.size?.octopus ?? 99"),
        Value::from(99.0)
    );
    assert_eq!(eval_in(&ctx, "nontity?.id"), Value::Null);
    assert_eq!(eval_in(&ctx, "arr?[1]?.name"), Value::from("Lucy"));
    assert_eq!(eval_in(&ctx, "arg?[1]?.name"), Value::Null);
    assert_eq!(eval_in(&ctx, "arr[5]?.name"), Value::Null);
}

#[test]
fn fixture_conditionals() {
    let ctx = fixture();
    assert_eq!(
        eval_in(&ctx, "if entity.attributes.power_switch.state then 1 else 0 endif"),
        Value::from(1.0)
    );
    assert_eq!(
        eval_in(&ctx, "if !entity.attributes.power_switch.state then 1 else 0 endif"),
        Value::from(0.0)
    );
    assert_eq!(
        eval_in(&ctx, "if !entity.attributes.power_switch.state then 1 endif"),
        Value::Null
    );
}

#[test]
fn fixture_defaulted_parameter_math() {
    let ctx = fixture();
    let expected = 0.25_f64 - 0.13;
    assert_eq!(
        eval_in(
            &ctx,
            "min(1, entity.attributes.volume.level - (parameters.amount ?? 0.05))"
        ),
        Value::from(expected)
    );
}

#[test]
fn iteration_over_fixture() {
    let ctx = fixture();
    assert_eq!(
        eval_in(&ctx, "each item in arr: item.name"),
        strings(&["Spot", "Lucy"])
    );
    assert_eq!(
        eval_in(&ctx, "each item, key in entity.attributes: key"),
        strings(&["power_switch", "position", "volume"])
    );
    // body side effects run once per element
    assert_eq!(
        eval_in(&ctx, "t=0; each item in arr: do t=t+1; null done; t"),
        Value::from(2.0)
    );
}

#[test]
fn iteration_shapes() {
    assert_eq!(
        eval_one("each item in [1,2,3,4,5]: 2 * item"),
        numbers(&[2.0, 4.0, 6.0, 8.0, 10.0])
    );
    assert_eq!(
        eval_one("each item, index in [1,2,3,4,5]: 3 * index"),
        numbers(&[0.0, 3.0, 6.0, 9.0, 12.0])
    );
    assert_eq!(eval_one("each v in null: true"), Value::array(vec![]));
    assert_eq!(eval_one("each v in 123: v"), numbers(&[123.0]));
    assert_eq!(
        eval_one("each v, k in { 'alpha': 1, 'beta': 2 }: k"),
        strings(&["alpha", "beta"])
    );
    assert_eq!(
        eval_one("t = each item in 'hello': item + ' there', t?[0]"),
        Value::from("hello there")
    );
    assert_eq!(
        eval_one("each n in 4..6: [n, n+1, n+2]"),
        Value::array(vec![
            numbers(&[4.0, 5.0, 6.0]),
            numbers(&[5.0, 6.0, 7.0]),
            numbers(&[6.0, 7.0, 8.0]),
        ])
    );
    // nulls produced by the body are dropped from the result
    assert_eq!(
        eval_one("each n in [1,2,3]: if n == 2 then null else n endif"),
        numbers(&[1.0, 3.0])
    );
    // the loop variable does not leak
    assert_eq!(eval_one("each n in 1..3: (yyy = n), yyy"), Value::Null);
}

#[test]
fn search_construct() {
    let ctx = fixture();
    assert_eq!(eval_one("t=[3,4], first m in t with m"), Value::from(3.0));
    assert_eq!(eval_one("t=[3,4], first m in t with m <= 4"), Value::from(3.0));
    assert_eq!(eval_one("t=[3,4], first m in t with m >= 4"), Value::from(4.0));
    assert_eq!(eval_one("t=[3,4], first m in t with m >= 6"), Value::Null);
    assert_eq!(eval_one("first v in null with true"), Value::Null);
    assert_eq!(eval_one("first v in 123 with true"), Value::from(123.0));
    assert_eq!(
        eval_in(
            &ctx,
            "(first item in entity.attributes with !isnull(item?.level)).level == 0.1"
        ),
        Value::Bool(true)
    );
    assert_eq!(
        eval_in(
            &ctx,
            "(first item in entity.attributes with (item?.level ?? 0) > 0.2).level"
        ),
        Value::from(0.25)
    );
    assert_eq!(
        eval_one(
            "modes = {home: {hm:1}, away: {hm:2, ac:'away'}, sleep: {hm:3}}, \
             (first item in modes with item.hm == 2).ac"
        ),
        Value::from("away")
    );
    // result expression runs in the match binding
    assert_eq!(
        eval_one("t=[7,23,3,4], first m in t with m <= 4 : 2 * m"),
        Value::from(6.0)
    );
    assert_eq!(
        eval_one("t=[1,0,3,4], first m in t with m >= 4 : 2 * m"),
        Value::from(8.0)
    );
}

#[test]
fn blocks_and_scopes_across_evaluations() {
    let registry = Registry::new();
    let ctx = Context::new();

    assert_eq!(eval_in(&ctx, "do 5, 6, 7, 8, 9 done"), Value::from(9.0));
    assert_eq!(eval_in(&ctx, "do yyy = 444 done, yyy"), Value::Null);

    // mirror of the original scope-test sequence: globals persist between
    // evaluate calls on the same root context
    evaluate("xyzzy = ''", &ctx, &registry).unwrap();
    assert_eq!(
        eval_in(&ctx, "do global xyzzy = 'global' done, xyzzy"),
        Value::from("global")
    );
    assert_eq!(
        eval_in(&ctx, "outer = 'outer', do local xyzzy = 'inner', outer = xyzzy done, xyzzy"),
        Value::from("global")
    );
    assert_eq!(eval_in(&ctx, "outer"), Value::from("inner"));
}

#[test]
fn user_defined_functions() {
    assert_eq!(
        eval_one("define square(a) a * a, [square(5), square(0), square(-5)]"),
        numbers(&[25.0, 0.0, 25.0])
    );
    // extra arguments are ignored
    assert_eq!(
        eval_one(r#"define botch(q) '"' + str(q) + '"', botch('hello', 'there')"#),
        Value::from("\"hello\"")
    );
    // missing arguments bind null
    assert_eq!(
        eval_one(r#"define botch(q, p) '"' + str(q) + str(p) + '"', botch('hello')"#),
        Value::from("\"hellonull\"")
    );
}

#[test]
fn sorting() {
    assert_eq!(
        eval_one("sort(['e', 'd', 'b', 'a', 'c'])"),
        strings(&["a", "b", "c", "d", "e"])
    );
    assert_eq!(
        eval_one(
            "define ff(a, b) a < b ? 1 : (a == b ? 0 : -1), sort(['e', 'd', 'b', 'a', 'c'], ff)"
        ),
        strings(&["e", "d", "c", "b", "a"])
    );
    assert_eq!(
        eval_one("sort(['e', 'd', 'b', 'a', 'c'], $1 < $2 ? 1 : ($1 == $2 ? 0 : -1))"),
        strings(&["e", "d", "c", "b", "a"])
    );
    assert_eq!(
        eval_one("sort(['e', 'd', 'b', 'a', 'c'], 0)"),
        strings(&["e", "d", "b", "a", "c"])
    );
}

#[test]
fn object_literal_lookup_idiom() {
    assert_eq!(
        eval_one("t = 'off', ({off: 'OFF', on: 'ON'})[t]"),
        Value::from("OFF")
    );
    assert_eq!(eval_one("([9, 8, 7, 6])[2]"), Value::from(7.0));
}

#[test]
fn compiled_expression_reuse_is_stateless() {
    let registry = Registry::new();
    let ce = compile("x = items[0] + items[1], x * scale").unwrap();

    let make_ctx = || {
        let ctx = Context::new();
        ctx.define_var("items", numbers(&[2.0, 3.0]));
        ctx.define_var("scale", Value::from(10.0));
        ctx
    };

    let a = run(&ce, &make_ctx(), &registry).unwrap();
    let b = run(&ce, &make_ctx(), &registry).unwrap();
    assert_eq!(a, Value::from(50.0));
    assert_eq!(a, b);
}

#[test]
fn recompilation_yields_equal_trees() {
    let sources = [
        "2 + 3 * 4",
        "each item in arr: item.name",
        "if a then b elif c then d else e endif",
        "define f(x) x * x, sort(t, f)",
        "o = { a: [1, 2, { b: 'c' }] }, o?.a?[2]?.b",
    ];
    for src in sources {
        assert_eq!(compile(src).unwrap(), compile(src).unwrap());
    }
}

#[test]
fn error_taxonomy() {
    let registry = Registry::new();
    let ctx = Context::new();

    // lexical
    assert!(matches!(
        evaluate("'unterminated", &ctx, &registry),
        Err(Error::Parse(lexel::ParseError::UnterminatedString { .. }))
    ));
    // syntax
    assert!(matches!(
        evaluate("1 + 2 = 3", &ctx, &registry),
        Err(Error::Parse(lexel::ParseError::InvalidTarget { .. }))
    ));
    // reference
    assert!(matches!(
        evaluate("nosuchfn(1)", &ctx, &registry),
        Err(Error::Eval(EvalError::Reference(_)))
    ));
    // type
    assert!(matches!(
        evaluate("1 .. 'a'", &ctx, &registry),
        Err(Error::Eval(EvalError::Type(_)))
    ));
    // unresolved *variable* reads do not error
    assert_eq!(eval_in(&ctx, "not_defined_anywhere"), Value::Null);
}

#[test]
fn assignment_results_and_persistence() {
    let registry = Registry::new();
    let ctx = Context::new();
    assert_eq!(
        evaluate("t = 'soul stone'", &ctx, &registry).unwrap(),
        Value::from("soul stone")
    );
    assert_eq!(eval_in(&ctx, "t"), Value::from("soul stone"));
}
