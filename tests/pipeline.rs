// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end tests: building expressions, piping data into verbs

use pipeverb::{
    Arguments, CallOptions, CallOutcome, Context, EvaluationError, Expression, FunctionOptions,
    Pipe, Signature, Symbolic, TypeInfo, Value, VerbOptions, collect_references, evaluate_value,
    pipe, pipe_all, register_function, register_verb,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn integer(args: &pipeverb::CallArgs, index: usize, name: &str) -> i64 {
    args.lookup(index, name)
        .and_then(Value::as_integer)
        .unwrap_or_default()
}

#[test]
fn test_add_cols_end_to_end() {
    init_logging();
    let f = Symbolic::new("f");
    let add_cols = register_verb(
        "add_cols",
        Signature::from_names(["data", "a", "b"]),
        VerbOptions::new().context(Context::EVAL),
        |_, args| Ok(Value::Integer(integer(&args, 0, "a") + integer(&args, 1, "b"))),
    )
    .unwrap();
    add_cols
        .register(&[TypeInfo::Map], Default::default(), |_, args| {
            Ok(Value::Integer(integer(&args, 0, "a") + integer(&args, 1, "b")))
        })
        .unwrap();

    let data = Value::from(json!({"x": 1, "y": 2}));
    let call = add_cols.defer(Arguments::new().arg(f.attr("x")).arg(f.attr("y")));
    assert_eq!(pipe(&data, &call).unwrap(), Value::Integer(3));
    assert_eq!(call.to_string(), "add_cols(., x, y)");
}

#[test]
fn test_evaluation_is_idempotent() {
    let f = Symbolic::new("f");
    let data = Value::from(json!({"a": 2, "b": [1, 2, 3]}));
    let exprs = [
        f.attr("a") + 1,
        1 + f.attr("a"),
        f.attr("b").item(-1) * f.attr("a"),
        -f.attr("a"),
    ];
    for expr in &exprs {
        let first = expr.evaluate(&data, Some(&Context::EVAL)).unwrap();
        let second = expr.evaluate(&data, Some(&Context::EVAL)).unwrap();
        assert_eq!(first, second, "{expr}");
    }
}

#[test]
fn test_select_versus_eval() {
    let f = Symbolic::new("f");
    let x = f.attr("x");
    assert_eq!(x.evaluate(&Value::Null, Some(&Context::SELECT)).unwrap(), Value::from("x"));
    assert_eq!(
        x.evaluate(&Value::from(json!({"x": 5})), Some(&Context::EVAL)).unwrap(),
        Value::Integer(5)
    );
}

#[test]
fn test_reflected_operators() {
    let f = Symbolic::new("f");
    let data = Value::from(json!({"a": 2}));
    assert_eq!(
        (f.attr("a") + 1).evaluate(&data, Some(&Context::EVAL)).unwrap(),
        Value::Integer(3)
    );
    assert_eq!(
        (1 + f.attr("a")).evaluate(&data, Some(&Context::EVAL)).unwrap(),
        Value::Integer(3)
    );
    assert_eq!(
        (10 - f.attr("a")).evaluate(&data, Some(&Context::EVAL)).unwrap(),
        Value::Integer(8)
    );
    let rsub = Expression::operator("rsub", vec![f.attr("a"), Expression::literal(10)]).unwrap();
    assert_eq!(rsub.evaluate(&data, Some(&Context::EVAL)).unwrap(), Value::Integer(8));
}

#[test]
fn test_pending_function_defers_its_arguments() {
    let f = Symbolic::new("f");
    let quote = register_function(
        "quote",
        Signature::from_names(["x"]),
        FunctionOptions::new().context(Context::PENDING),
        |args| Ok(args.get(0).cloned().unwrap_or(Value::Null)),
    )
    .unwrap();

    let expr = quote.defer(Arguments::new().arg(f.attr("x") + 1));
    let raw = expr.evaluate(&Value::Null, Some(&Context::EVAL)).unwrap();
    let Value::Expr(inner) = &raw else {
        panic!("expected an unevaluated argument, got {raw:?}");
    };
    assert_eq!(inner.to_string(), "x + 1");
    assert_eq!(
        evaluate_value(&raw, &Value::from(json!({"x": 41})), Some(&Context::EVAL)).unwrap(),
        Value::Integer(42)
    );
}

#[test]
fn test_function_call_convention() {
    let f = Symbolic::new("f");
    let add = register_function(
        "add",
        Signature::from_names(["a", "b"]),
        FunctionOptions::new(),
        |args| Ok(Value::Integer(integer(&args, 0, "a") + integer(&args, 1, "b"))),
    )
    .unwrap();

    let ready = add.call(Arguments::new().arg(1).arg(2)).unwrap();
    assert_eq!(ready, CallOutcome::Ready(Value::Integer(3)));

    let deferred = add.call(Arguments::new().arg(1).kwarg("b", f.attr("y"))).unwrap();
    assert!(deferred.is_deferred());

    // the deferred function runs inside a verb, against the piped data
    let identity = register_verb(
        "identity",
        Signature::from_names(["data", "value"]),
        VerbOptions::new().context(Context::EVAL),
        |_, args| Ok(args.get(0).cloned().unwrap_or(Value::Null)),
    )
    .unwrap();
    let call = identity.defer(Arguments::new().arg(deferred));
    assert_eq!(call.to_string(), "identity(., add(1, b=y))");
    assert_eq!(
        Value::from(json!({"y": 5})).pipe(&call).unwrap(),
        Value::Integer(6)
    );
}

#[test]
fn test_mixed_context() {
    let f = Symbolic::new("f");
    let rename = register_verb(
        "rename",
        Signature::from_names(["data"]).with_variadic("columns").with_keywords("renames"),
        VerbOptions::new().context(Context::MIXED),
        |_, args| {
            let mut out = args.positional().to_vec();
            out.extend(args.keyword().values().cloned());
            Ok(Value::List(out))
        },
    )
    .unwrap();

    let call = rename.defer(Arguments::new().arg(f.attr("a")).kwarg("b", f.attr("a")));
    let data = Value::from(json!({"a": 7}));
    assert_eq!(data.pipe(&call).unwrap(), Value::list([Value::from("a"), Value::Integer(7)]));
}

#[test]
fn test_dependent_verb_inside_another_verb() {
    let count = register_verb(
        "count",
        Signature::from_names(["data"]),
        VerbOptions::new().dependent(),
        |data, _| Ok(Value::Integer(data.as_list().map_or(0, <[Value]>::len) as i64)),
    )
    .unwrap();
    let scale = register_verb(
        "scale",
        Signature::from_names(["data", "factor"]),
        VerbOptions::new().context(Context::EVAL),
        |data, args| {
            let factor = integer(&args, 0, "factor");
            let items = data
                .as_list()
                .unwrap_or_default()
                .iter()
                .map(|item| Value::Integer(item.as_integer().unwrap_or_default() * factor))
                .collect();
            Ok(Value::List(items))
        },
    )
    .unwrap();

    let n = count.call(Arguments::new()).unwrap().into_expression();
    let call = scale.defer(Arguments::new().arg(n));
    assert_eq!(call.to_string(), "scale(., count())");
    assert_eq!(
        Value::list([1, 2]).pipe(&call).unwrap(),
        Value::list([2, 4])
    );
}

#[test]
fn test_verb_used_as_function() {
    let f = Symbolic::new("f");
    let total = register_verb(
        "total",
        Signature::from_names(["data"]),
        VerbOptions::new(),
        |data, _| {
            let sum = data
                .as_list()
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_integer)
                .sum();
            Ok(Value::Integer(sum))
        },
    )
    .unwrap();
    let identity = register_verb(
        "identity",
        Signature::from_names(["data", "value"]),
        VerbOptions::new().context(Context::EVAL),
        |_, args| Ok(args.get(0).cloned().unwrap_or(Value::Null)),
    )
    .unwrap();

    let inner = total.call(Arguments::new().arg(f.attr("values"))).unwrap();
    assert!(inner.is_deferred());
    let call = identity.defer(Arguments::new().arg(inner));
    assert_eq!(call.to_string(), "identity(., total(values))");

    let data = Value::from(json!({"values": [1, 2, 3]}));
    assert_eq!(data.pipe(&call).unwrap(), Value::Integer(6));
}

#[test]
fn test_call_site_backend_and_context() {
    let f = Symbolic::new("f");
    let show = register_verb(
        "show",
        Signature::from_names(["data", "value"]),
        VerbOptions::new().context(Context::EVAL),
        |_, args| Ok(args.get(0).cloned().unwrap_or(Value::Null)),
    )
    .unwrap();
    show.register(
        &[TypeInfo::Map],
        pipeverb::RegisterOptions::new().backend("upper"),
        |_, args| {
            let text = args.get(0).and_then(Value::as_str).unwrap_or_default();
            Ok(Value::from(text.to_uppercase()))
        },
    )
    .unwrap();

    let data = Value::from(json!({"name": "ada"}));
    let default = show.defer_with(
        Arguments::new().arg(f.attr("name")),
        CallOptions::backend("default"),
    );
    let upper = show.defer_with(
        Arguments::new().arg(f.attr("name")),
        CallOptions::backend("upper"),
    );
    let selected = show.defer_with(
        Arguments::new().arg(f.attr("name")),
        CallOptions {
            backend: Some("upper".to_string()),
            context: Some(Context::SELECT),
        },
    );
    assert_eq!(data.pipe(&default).unwrap(), Value::from("ada"));
    assert_eq!(data.pipe(&upper).unwrap(), Value::from("ADA"));
    assert_eq!(data.pipe(&selected).unwrap(), Value::from("NAME"));
}

#[test]
fn test_pipe_all_chains_verbs() {
    let f = Symbolic::new("f");
    let pluck = register_verb(
        "pluck",
        Signature::from_names(["data", "key"]),
        VerbOptions::new().context(Context::SELECT),
        |data, args| {
            let key = args.get(0).cloned().unwrap_or(Value::Null);
            data.get_item(&key)
        },
    )
    .unwrap();
    let data = Value::from(json!({"a": {"b": {"c": 1}}}));
    let steps = [
        pluck.defer(Arguments::new().arg(f.attr("a"))),
        pluck.defer(Arguments::new().arg(f.attr("b"))),
        pluck.defer(Arguments::new().arg(f.item("c"))),
    ];
    assert_eq!(pipe_all(data, &steps).unwrap(), Value::Integer(1));
}

#[test]
fn test_errors_surface_unchanged() {
    let f = Symbolic::new("f");
    let needs = register_verb(
        "needs",
        Signature::from_names(["data", "value"]),
        VerbOptions::new(),
        |_, args| Ok(args.get(0).cloned().unwrap_or(Value::Null)),
    )
    .unwrap();

    // no context anywhere: the reference cannot be resolved
    let call = needs.defer(Arguments::new().arg(f.attr("x")));
    assert!(Value::Null.pipe(&call).unwrap_err().is_context_error());

    // missing data argument
    assert!(matches!(
        needs.call(Arguments::new()),
        Err(EvaluationError::MissingDataArgument { .. })
    ));

    // too many arguments
    let call = needs.defer(Arguments::new().arg(1).arg(2));
    assert!(matches!(
        Value::Null.pipe(&call),
        Err(EvaluationError::Function(_))
    ));

    // iterating an unevaluated expression
    let expr = Value::Expr(f.attr("x"));
    assert!(matches!(
        expr.try_iter().map(|_| ()),
        Err(EvaluationError::IterateExpression { .. })
    ));
}

#[test]
fn test_reference_collection() {
    let f = Symbolic::new("f");
    let expr = (f.attr("price") * f.attr("qty")).gt(f.item("limit"));
    assert_eq!(collect_references(&expr), vec!["price", "qty", "limit"]);
}
