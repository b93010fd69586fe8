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

//! Tree-walking evaluation of expressions
//!
//! Evaluation flows top-down. A call node first resolves the implementation
//! and context for its data, then evaluates its arguments under that context
//! and finally invokes the implementation. Nothing inside a node changes, so
//! one tree can be evaluated against any number of data values.

use indexmap::IndexMap;
use std::sync::Arc;

use super::context::{Context, ContextError};
use super::error::{EvaluationError, EvaluationResult};
use crate::ast::{CallOptions, Callee, Expression, ExpressionNode, FunctionCall, VerbCall};
use crate::model::{Arguments, CallArgs, TypeInfo, Value};
use crate::registry::dispatch::ExtraContexts;
use crate::registry::function::Function;
use crate::registry::operator::{DEFAULT_OPERATORS, OperatorTable};
use crate::registry::signature::Binding;
use crate::registry::verb::Verb;

impl Expression {
    /// Evaluate against `data` under `context`
    ///
    /// `None` means no context was chosen yet. Symbols, literals and operators
    /// on them still evaluate, while references fail with
    /// [`ContextError::Unresolved`].
    pub fn evaluate(&self, data: &Value, context: Option<&Context>) -> EvaluationResult<Value> {
        evaluate_node(self, data, context)
    }
}

/// Evaluate a value that may hold an unevaluated expression
///
/// Implementations running under [`Context::PENDING`] receive their symbolic
/// arguments as [`Value::Expr`] and use this to evaluate them on their terms.
pub fn evaluate_value(
    value: &Value,
    data: &Value,
    context: Option<&Context>,
) -> EvaluationResult<Value> {
    match value {
        Value::Expr(expr) => expr.evaluate(data, context),
        other => Ok(other.clone()),
    }
}

fn evaluate_node(expr: &Expression, data: &Value, context: Option<&Context>) -> EvaluationResult<Value> {
    match expr.node() {
        ExpressionNode::Symbol(_) => Ok(data.clone()),
        ExpressionNode::Literal(value) => evaluate_value(value, data, context),
        ExpressionNode::List(items) => items
            .iter()
            .map(|item| item.evaluate(data, context))
            .collect::<EvaluationResult<Vec<_>>>()
            .map(Value::List),
        ExpressionNode::Map(entries) => entries
            .iter()
            .map(|(key, value)| Ok((key.clone(), value.evaluate(data, context)?)))
            .collect::<EvaluationResult<IndexMap<_, _>>>()
            .map(Value::Map),
        ExpressionNode::Attr(reference) => {
            let context = require_context(expr, context)?;
            let parent = reference.parent().evaluate(data, Some(context))?;
            context.getattr(&parent, reference.name())
        }
        ExpressionNode::Item(reference) => {
            let context = require_context(expr, context)?;
            let parent = reference.parent().evaluate(data, Some(context))?;
            let key = reference.key().evaluate(data, Some(&context.ref_context()))?;
            context.getitem(&parent, &key)
        }
        ExpressionNode::Operator(call) => {
            let operands = call
                .operands()
                .iter()
                .map(|operand| operand.evaluate(data, context))
                .collect::<EvaluationResult<Vec<_>>>()?;
            let table: &Arc<dyn OperatorTable> = call.table().unwrap_or(&*DEFAULT_OPERATORS);
            table.evaluate(call.operator(), &operands, data)
        }
        ExpressionNode::Function(call) => evaluate_function_call(call, data, context),
        ExpressionNode::Verb(call) => evaluate_verb_call(call, data, context),
    }
}

fn require_context<'a>(
    expr: &Expression,
    context: Option<&'a Context>,
) -> EvaluationResult<&'a Context> {
    context.ok_or_else(|| {
        ContextError::Unresolved {
            node: expr.to_string(),
        }
        .into()
    })
}

fn evaluate_function_call(
    call: &FunctionCall,
    data: &Value,
    inherited: Option<&Context>,
) -> EvaluationResult<Value> {
    match call.callee() {
        Callee::Expression(callee) => {
            let context = call.options().context.as_ref().or(inherited);
            let callable = match callee.evaluate(data, context)? {
                Value::Callable(callable) => callable,
                other => {
                    return Err(EvaluationError::NotCallable {
                        type_name: other.type_name(),
                    });
                }
            };
            let args = call.args().try_map(
                |_, arg| arg.evaluate(data, context),
                |_, arg| arg.evaluate(data, context),
            )?;
            callable.call(args)
        }
        Callee::Function(function) => {
            call_function(function, call.args(), call.options(), data, inherited)
        }
        Callee::Verb(verb) => call_verb_as_function(verb, call.args(), call.options(), data, inherited),
    }
}

fn call_function(
    function: &Function,
    args: &Arguments<Expression>,
    options: &CallOptions,
    data: &Value,
    inherited: Option<&Context>,
) -> EvaluationResult<Value> {
    let binding = function.signature().bind(function.name(), args)?;

    // The first argument is evaluated as the call would see it before dispatch
    let first = match args.get(0) {
        Some(arg) if function.is_dispatchable() => {
            let base = effective_context(options.context.as_ref(), function.context(), inherited);
            let context = positional_context(&binding, 0, base.as_ref(), function.extra_contexts());
            let value = evaluate_argument(arg, data, context.as_ref())?;
            Some(EvaluatedFirst { context, value })
        }
        _ => None,
    };
    let ty = first
        .as_ref()
        .map_or(TypeInfo::Any, |first| first.value.type_info());

    let resolution = function.dispatch(&ty, options.backend.as_deref())?;
    let context = effective_context(options.context.as_ref(), resolution.context.as_ref(), inherited);
    let values = evaluate_arguments(
        &binding,
        args,
        context.as_ref(),
        &resolution.extra_contexts,
        data,
        first,
    )?;
    (resolution.implementation)(values)
}

fn call_verb_as_function(
    verb: &Verb,
    args: &Arguments<Expression>,
    options: &CallOptions,
    data: &Value,
    inherited: Option<&Context>,
) -> EvaluationResult<Value> {
    let (first, rest) = args.clone().split_first();
    let first = first.ok_or_else(|| EvaluationError::MissingDataArgument {
        verb: verb.name().to_string(),
    })?;
    let verb_data = first.evaluate(data, options.context.as_ref().or(inherited))?;
    invoke_verb(verb, &verb_data, &rest, options, data, inherited)
}

fn evaluate_verb_call(
    call: &VerbCall,
    data: &Value,
    inherited: Option<&Context>,
) -> EvaluationResult<Value> {
    invoke_verb(call.verb(), data, call.args(), call.options(), data, inherited)
}

/// Dispatch `verb` on `verb_data` and evaluate `args` against `data`
fn invoke_verb(
    verb: &Verb,
    verb_data: &Value,
    args: &Arguments<Expression>,
    options: &CallOptions,
    data: &Value,
    inherited: Option<&Context>,
) -> EvaluationResult<Value> {
    let resolution = verb.dispatch(&verb_data.type_info(), options.backend.as_deref())?;
    let context = effective_context(options.context.as_ref(), resolution.context.as_ref(), inherited);
    log::trace!(
        "Evaluating arguments of `{}` under {}",
        verb.name(),
        context.as_ref().map_or("no context", Context::name)
    );
    let binding = verb.signature().bind_from(verb.name(), args, 1)?;
    let values = evaluate_arguments(
        &binding,
        args,
        context.as_ref(),
        &resolution.extra_contexts,
        data,
        None,
    )?;
    (resolution.implementation)(verb_data, values)
}

/// Call-site override, then the implementation's context, then the inherited one
fn effective_context(
    call_site: Option<&Context>,
    implementation: Option<&Context>,
    inherited: Option<&Context>,
) -> Option<Context> {
    match call_site.or(implementation) {
        Some(context) => Some(context.clone().inherit_meta(inherited)),
        None => inherited.cloned(),
    }
}

fn parameter_context(
    parameter: Option<&str>,
    base: Option<&Context>,
    extra_contexts: &ExtraContexts,
) -> Option<Context> {
    match parameter.and_then(|name| extra_contexts.get(name)) {
        Some(context) => Some(context.clone().inherit_meta(base)),
        None => base.cloned(),
    }
}

/// First positional argument already evaluated to pick the implementation
struct EvaluatedFirst {
    context: Option<Context>,
    value: Value,
}

fn positional_context(
    binding: &Binding,
    index: usize,
    base: Option<&Context>,
    extra_contexts: &ExtraContexts,
) -> Option<Context> {
    parameter_context(binding.positional(index), base, extra_contexts)
        .map(|context| context.args_context())
}

fn evaluate_arguments(
    binding: &Binding,
    args: &Arguments<Expression>,
    context: Option<&Context>,
    extra_contexts: &ExtraContexts,
    data: &Value,
    mut first: Option<EvaluatedFirst>,
) -> EvaluationResult<CallArgs> {
    args.try_map(
        |index, arg| {
            let context = positional_context(binding, index, context, extra_contexts);
            match first.take() {
                Some(first) if index == 0 && first.context == context => Ok(first.value),
                _ => evaluate_argument(arg, data, context.as_ref()),
            }
        },
        |keyword, arg| {
            let context = parameter_context(binding.keyword(keyword), context, extra_contexts)
                .map(|context| context.kwargs_context());
            evaluate_argument(arg, data, context.as_ref())
        },
    )
}

fn evaluate_argument(
    arg: &Expression,
    data: &Value,
    context: Option<&Context>,
) -> EvaluationResult<Value> {
    match context {
        Some(context) if context.is_pending() => Ok(match arg.as_literal() {
            Some(value) => value.clone(),
            None => Value::Expr(arg.clone()),
        }),
        _ => arg.evaluate(data, context),
    }
}
