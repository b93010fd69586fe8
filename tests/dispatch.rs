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

//! Type-directed dispatch across backends

use std::sync::Arc;

use pipeverb::{
    AmbiguityPolicy, Arguments, CallArgs, Catalog, ClassInfo, Context, ContextBase, ContextError,
    DispatchConfig, DispatchError, EvaluationError, EvaluationResult, FunctionOptions, Pipe,
    RegisterOptions, RegistrationError, Signature, Symbolic, TypeInfo, Value, VerbOptions,
    declare_function, declare_verb, register_function, register_verb,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn label(text: &'static str) -> impl Fn(CallArgs) -> EvaluationResult<Value> {
    move |_| Ok(Value::from(text))
}

#[rstest]
#[case(Value::Integer(1), "int")]
#[case(Value::Boolean(true), "int")]
#[case(Value::from("s"), "generic")]
#[case(Value::Float(1.5), "generic")]
fn test_specific_type_beats_default(#[case] arg: Value, #[case] expected: &str) {
    let describe = register_function(
        "describe",
        Signature::from_names(["x"]),
        FunctionOptions::new(),
        label("generic"),
    )
    .unwrap();
    describe
        .register(&[TypeInfo::Integer], RegisterOptions::new(), label("int"))
        .unwrap();
    assert_eq!(describe.invoke(CallArgs::new().arg(arg)).unwrap(), Value::from(expected));
}

#[test]
fn test_missing_default_is_dispatch_error() {
    let describe = declare_function("describe", Signature::from_names(["x"]), FunctionOptions::new())
        .unwrap();
    describe
        .register(&[TypeInfo::Integer], RegisterOptions::new(), label("int"))
        .unwrap();
    let err = describe.invoke(CallArgs::new().arg("s")).unwrap_err();
    assert_eq!(
        err,
        EvaluationError::Dispatch(DispatchError::NotImplemented {
            name: "describe".to_string(),
            type_name: "String".to_string(),
        })
    );
}

#[test]
fn test_function_dispatches_on_evaluated_first_argument() {
    let f = Symbolic::new("f");
    let kind = declare_function("kind", Signature::from_names(["x"]), FunctionOptions::new()).unwrap();
    kind.register(&[TypeInfo::List], RegisterOptions::new(), label("list"))
        .unwrap();
    kind.register(&[TypeInfo::String], RegisterOptions::new(), label("string"))
        .unwrap();

    let expr = kind.defer(Arguments::new().arg(f.attr("value")));
    let data = Value::map([("value", Value::list([1]))]);
    assert_eq!(expr.evaluate(&data, Some(&Context::EVAL)).unwrap(), Value::from("list"));
    assert_eq!(expr.evaluate(&data, Some(&Context::SELECT)).unwrap(), Value::from("string"));
}

/// Refuses lookups itself, positional arguments are selected
#[derive(Debug)]
struct ColumnsOnly;

impl ContextBase for ColumnsOnly {
    fn name(&self) -> &str {
        "columns_only"
    }

    fn getattr(&self, _current: &Context, _parent: &Value, name: &str) -> EvaluationResult<Value> {
        Err(ContextError::Unsupported {
            context: self.name().to_string(),
            operation: format!(".{name}"),
        }
        .into())
    }

    fn getitem(&self, _current: &Context, _parent: &Value, key: &Value) -> EvaluationResult<Value> {
        Err(ContextError::Unsupported {
            context: self.name().to_string(),
            operation: format!("[{key}]"),
        }
        .into())
    }

    fn args_context(&self) -> Option<Context> {
        Some(Context::SELECT)
    }
}

#[test]
fn test_dispatch_argument_uses_custom_args_context() {
    let f = Symbolic::new("f");
    let kind = declare_function(
        "kind",
        Signature::from_names(["x"]),
        FunctionOptions::new().context(Context::custom(ColumnsOnly)),
    )
    .unwrap();
    kind.register(&[TypeInfo::String], RegisterOptions::new(), |args| {
        Ok(args.get(0).cloned().unwrap_or(Value::Null))
    })
    .unwrap();
    kind.register(&[TypeInfo::Map], RegisterOptions::new(), label("map"))
        .unwrap();

    let expr = kind.defer(Arguments::new().arg(f.attr("a")));
    let data = Value::map([("a", Value::map([("b", 1)]))]);
    assert_eq!(expr.evaluate(&data, Some(&Context::EVAL)).unwrap(), Value::from("a"));
}

#[test]
fn test_favored_backend_wins_without_ambiguity() {
    init_logging();
    let verb = declare_verb(
        "summarise",
        Signature::from_names(["data"]),
        VerbOptions::new().config(DispatchConfig::strict()),
    )
    .unwrap();
    verb.register(
        &[TypeInfo::Map],
        RegisterOptions::new().backend("b").favored(),
        |_, _| Ok(Value::from("b")),
    )
    .unwrap();
    verb.register(&[TypeInfo::Map], RegisterOptions::new().backend("a"), |_, _| {
        Ok(Value::from("a"))
    })
    .unwrap();

    let resolution = verb.dispatch(&TypeInfo::Map, None).unwrap();
    assert!(!resolution.is_ambiguous());
    assert_eq!(resolution.backend.as_deref(), Some("b"));

    // strict config would fail on any ambiguity
    let call = verb.defer(Arguments::new());
    assert_eq!(Value::map([("x", 1)]).pipe(&call).unwrap(), Value::from("b"));
}

#[test]
fn test_ambiguity_policies() {
    init_logging();
    let build = |config: DispatchConfig| {
        let verb = declare_verb("head", Signature::from_names(["data"]), VerbOptions::new().config(config))
            .unwrap();
        verb.register(&[TypeInfo::List], RegisterOptions::new().backend("a"), |_, _| {
            Ok(Value::from("a"))
        })
        .unwrap();
        verb.register(&[TypeInfo::List], RegisterOptions::new().backend("b"), |_, _| {
            Ok(Value::from("b"))
        })
        .unwrap();
        verb
    };

    let warn = build(DispatchConfig::default());
    let resolution = warn.dispatch(&TypeInfo::List, None).unwrap();
    assert_eq!(resolution.ambiguous, vec!["b", "a"]);
    assert_eq!(warn.invoke(&Value::list([1]), CallArgs::new()).unwrap(), Value::from("b"));

    let quiet = build(DispatchConfig::quiet());
    assert_eq!(quiet.invoke(&Value::list([1]), CallArgs::new()).unwrap(), Value::from("b"));

    let strict = build(DispatchConfig::strict());
    assert!(matches!(
        strict.invoke(&Value::list([1]), CallArgs::new()),
        Err(EvaluationError::Dispatch(DispatchError::Ambiguous { .. }))
    ));
    assert_eq!(strict.backends(), vec!["default", "a", "b"]);
}

#[test]
fn test_config_from_json() {
    let config = DispatchConfig::from_json(r#"{"default_backend": "core", "ambiguity": "silent"}"#)
        .unwrap();
    assert_eq!(config.ambiguity, AmbiguityPolicy::Silent);

    let verb = declare_verb("tail", Signature::from_names(["data"]), VerbOptions::new().config(config))
        .unwrap();
    verb.register(&[TypeInfo::Any], RegisterOptions::new(), |_, _| Ok(Value::from("core")))
        .unwrap();
    assert_eq!(verb.backends(), vec!["core"]);
    assert_eq!(verb.registered_types("core"), vec![TypeInfo::Any]);
}

#[test]
fn test_user_classes_follow_their_base() {
    let frame = ClassInfo::new("Frame", TypeInfo::Map);
    let grouped = ClassInfo::new("GroupedFrame", TypeInfo::Class(frame.clone()));

    let ungroup = declare_verb("ungroup", Signature::from_names(["data"]), VerbOptions::new()).unwrap();
    ungroup
        .register(&[TypeInfo::Class(frame.clone())], RegisterOptions::new(), |data, _| {
            Ok(data.unwrap_instance().clone())
        })
        .unwrap();
    ungroup
        .register(&[TypeInfo::Class(grouped.clone())], RegisterOptions::new(), |data, _| {
            Ok(Value::instance(
                ClassInfo::new("Frame", TypeInfo::Map),
                data.unwrap_instance().clone(),
            ))
        })
        .unwrap();

    let plain = Value::instance(frame, Value::map([("a", 1)]));
    let nested = Value::instance(grouped, Value::map([("a", 1)]));
    assert_eq!(ungroup.invoke(&plain, CallArgs::new()).unwrap(), Value::map([("a", 1)]));
    assert_eq!(
        ungroup.invoke(&nested, CallArgs::new()).unwrap().type_name(),
        "Frame"
    );
    assert!(ungroup.invoke(&Value::map([("a", 1)]), CallArgs::new()).is_err());
}

#[test]
fn test_registration_context_inherits_descriptor_context() {
    let f = Symbolic::new("f");
    let pick = register_verb(
        "pick",
        Signature::from_names(["data", "column"]),
        VerbOptions::new().context(Context::SELECT),
        |_, args| Ok(args.get(0).cloned().unwrap_or(Value::Null)),
    )
    .unwrap();
    pick.register(&[TypeInfo::List], RegisterOptions::new(), |data, args| {
        let index = args.get(0).cloned().unwrap_or(Value::Null);
        data.get_item(&index)
    })
    .unwrap();
    pick.register(
        &[TypeInfo::Map],
        RegisterOptions::new().context(Context::EVAL),
        |_, args| Ok(args.get(0).cloned().unwrap_or(Value::Null)),
    )
    .unwrap();

    let call = pick.defer(Arguments::new().arg(f.item(1)));
    // list registration keeps the verb's select context: the key itself
    assert_eq!(Value::list([10, 20]).pipe(&call).unwrap(), Value::Integer(20));

    let call = pick.defer(Arguments::new().arg(f.attr("a")));
    assert_eq!(Value::map([("a", 5)]).pipe(&call).unwrap(), Value::Integer(5));
}

#[test]
fn test_extra_contexts_on_registration() {
    let f = Symbolic::new("f");
    let mutate = register_verb(
        "mutate",
        Signature::from_names(["data", "name", "value"]),
        VerbOptions::new().context(Context::EVAL),
        |_, args| Ok(Value::list(args.iter().cloned())),
    )
    .unwrap();
    mutate
        .register(
            &[TypeInfo::Map],
            RegisterOptions::new().extra_context("name", Context::SELECT),
            |_, args| Ok(Value::list(args.iter().cloned())),
        )
        .unwrap();

    let call = mutate.defer(Arguments::new().arg(f.attr("x")).kwarg("value", f.attr("x") * 10));
    assert_eq!(
        Value::map([("x", 2)]).pipe(&call).unwrap(),
        Value::list([Value::from("x"), Value::Integer(20)])
    );

    let err = mutate
        .register(
            &[TypeInfo::List],
            RegisterOptions::new().extra_context("missing", Context::SELECT),
            |_, _| Ok(Value::Null),
        )
        .unwrap_err();
    assert_eq!(err, RegistrationError::unknown_parameter("mutate", "missing"));
}

#[test]
fn test_catalog_registration() {
    let mut catalog = Catalog::new();
    let verb = catalog
        .add_verb(
            register_verb("arrange", Signature::from_names(["data"]), VerbOptions::new(), |data, _| {
                Ok(data.clone())
            })
            .unwrap(),
        )
        .unwrap();
    assert!(Arc::ptr_eq(&verb, catalog.verb("arrange").unwrap()));

    let again = register_function("arrange", Signature::variadic(), FunctionOptions::new(), label("x"))
        .unwrap();
    assert!(matches!(
        catalog.add_function(again),
        Err(RegistrationError::AlreadyRegistered { .. })
    ));
}
