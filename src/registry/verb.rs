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

//! Registered verbs
//!
//! A verb takes the data as its first argument and evaluates the remaining
//! arguments against it. Verbs dispatch on the type of the data.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use super::dispatch::{DispatchTable, ExtraContexts, Registration, Resolution};
use super::error::{DispatchError, RegistrationError};
use super::options::{
    CallOutcome, RegisterOptions, VerbOptions, merge_extra_contexts, validate_extra_contexts,
};
use super::signature::{ParameterKind, Signature};
use crate::ast::{CallOptions, Callee, Expression, ExpressionNode, FunctionCall, VerbCall};
use crate::evaluator::{Context, EvaluationError, EvaluationResult};
use crate::model::{Arguments, CallArgs, TypeInfo, Value};

/// Implementation of a verb: the data, then the remaining arguments
pub type VerbImpl = dyn Fn(&Value, CallArgs) -> EvaluationResult<Value> + Send + Sync;

/// A registered verb
pub struct Verb {
    name: String,
    signature: Signature,
    context: Option<Context>,
    extra_contexts: ExtraContexts,
    dependent: bool,
    table: RwLock<DispatchTable<VerbImpl>>,
}

/// Register a verb with a default implementation
///
/// The first parameter of `signature` receives the data and must be a plain
/// positional parameter.
pub fn register_verb<F>(
    name: impl Into<String>,
    signature: Signature,
    options: VerbOptions,
    implementation: F,
) -> Result<Arc<Verb>, RegistrationError>
where
    F: Fn(&Value, CallArgs) -> EvaluationResult<Value> + Send + Sync + 'static,
{
    Verb::create(name.into(), signature, options, Some(Arc::new(implementation)))
}

/// Register a verb that only has type-specific implementations
pub fn declare_verb(
    name: impl Into<String>,
    signature: Signature,
    options: VerbOptions,
) -> Result<Arc<Verb>, RegistrationError> {
    Verb::create(name.into(), signature, options, None)
}

impl Verb {
    fn create(
        name: String,
        signature: Signature,
        options: VerbOptions,
        implementation: Option<Arc<VerbImpl>>,
    ) -> Result<Arc<Self>, RegistrationError> {
        match signature.first_parameter() {
            Some(parameter) if parameter.kind == ParameterKind::Positional => {}
            _ => return Err(RegistrationError::MissingDataParameter { verb: name }),
        }
        validate_extra_contexts(&name, &signature, &options.extra_contexts)?;
        let default = implementation.map(|implementation| Registration {
            implementation,
            context: options.context.clone(),
            extra_contexts: options.extra_contexts.clone(),
            favored: false,
        });
        log::debug!(
            "Registered verb `{}` (dependent: {})",
            name,
            options.dependent
        );
        Ok(Arc::new(Self {
            table: RwLock::new(DispatchTable::new(name.clone(), options.config, default)),
            name,
            signature,
            context: options.context,
            extra_contexts: options.extra_contexts,
            dependent: options.dependent,
        }))
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters, the data parameter first
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Context the arguments are evaluated under, `None` to inherit
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// Per-parameter contexts
    pub fn extra_contexts(&self) -> &ExtraContexts {
        &self.extra_contexts
    }

    /// Whether calls always wait for piped data
    pub fn is_dependent(&self) -> bool {
        self.dependent
    }

    /// Add an implementation for data of one of `types`
    pub fn register<F>(
        &self,
        types: &[TypeInfo],
        options: RegisterOptions,
        implementation: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&Value, CallArgs) -> EvaluationResult<Value> + Send + Sync + 'static,
    {
        validate_extra_contexts(&self.name, &self.signature, &options.extra_contexts)?;
        let registration = Registration {
            implementation: Arc::new(implementation) as Arc<VerbImpl>,
            context: options.context.or_else(|| self.context.clone()),
            extra_contexts: merge_extra_contexts(&self.extra_contexts, &options.extra_contexts),
            favored: options.favored,
        };
        self.table
            .write()
            .register(types, options.backend.as_deref(), registration)
    }

    /// Backend names in registration order
    pub fn backends(&self) -> Vec<String> {
        self.table.read().backends().map(str::to_string).collect()
    }

    /// Types registered with `backend`
    pub fn registered_types(&self, backend: &str) -> Vec<TypeInfo> {
        self.table.read().registered_types(backend)
    }

    /// Pick the implementation for data of type `ty`
    pub fn dispatch(
        &self,
        ty: &TypeInfo,
        backend: Option<&str>,
    ) -> Result<Resolution<VerbImpl>, DispatchError> {
        self.table.read().resolve(ty, backend)
    }

    /// Build a node waiting for piped data; `args` exclude the data
    pub fn defer(self: &Arc<Self>, args: Arguments<Expression>) -> Expression {
        self.defer_with(args, CallOptions::default())
    }

    /// [`Verb::defer`] with call-site options
    pub fn defer_with(self: &Arc<Self>, args: Arguments<Expression>, options: CallOptions) -> Expression {
        Expression::new(ExpressionNode::Verb(VerbCall::new(self.clone(), args, options)))
    }

    /// Call with the data as first positional argument
    ///
    /// Dependent verbs always defer and take `args` without data. Otherwise a
    /// symbolic data argument turns the call into a function-style node that
    /// evaluates the data against the outer data first.
    pub fn call(self: &Arc<Self>, args: Arguments<Expression>) -> EvaluationResult<CallOutcome> {
        self.call_with(args, CallOptions::default())
    }

    /// [`Verb::call`] with call-site options
    pub fn call_with(
        self: &Arc<Self>,
        args: Arguments<Expression>,
        options: CallOptions,
    ) -> EvaluationResult<CallOutcome> {
        if self.dependent {
            return Ok(CallOutcome::Deferred(self.defer_with(args, options)));
        }
        if args.positional().is_empty() {
            return Err(EvaluationError::MissingDataArgument {
                verb: self.name.clone(),
            });
        }
        if args.get(0).is_some_and(Expression::is_symbolic) {
            return Ok(CallOutcome::Deferred(Expression::new(ExpressionNode::Function(
                FunctionCall::new(Callee::Verb(self.clone()), args, options),
            ))));
        }

        let (data, rest) = args.split_first();
        let data = match data {
            Some(data) => data.evaluate(&Value::Null, None)?,
            None => Value::Null,
        };
        self.defer_with(rest, options)
            .evaluate(&data, None)
            .map(CallOutcome::Ready)
    }

    /// Run the implementation for concrete data and evaluated arguments
    pub fn invoke(&self, data: &Value, args: CallArgs) -> EvaluationResult<Value> {
        self.signature.bind_from(&self.name, &args, 1)?;
        let resolution = self.dispatch(&data.type_info(), None)?;
        (resolution.implementation)(data, args)
    }
}

impl fmt::Debug for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verb")
            .field("name", &self.name)
            .field("context", &self.context)
            .field("dependent", &self.dependent)
            .field("backends", &self.backends())
            .finish()
    }
}
