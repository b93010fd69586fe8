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

//! Registered functions
//!
//! A function has no mandatory data parameter. Called with concrete arguments
//! it runs at once; called with any symbolic argument it becomes a node that
//! runs when the enclosing verb evaluates its arguments.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use super::dispatch::{DispatchTable, ExtraContexts, Registration, Resolution};
use super::error::{DispatchError, RegistrationError};
use super::options::{
    CallOutcome, FunctionOptions, RegisterOptions, merge_extra_contexts, validate_extra_contexts,
};
use super::signature::Signature;
use crate::ast::{CallOptions, Callee, Expression, ExpressionNode, FunctionCall};
use crate::evaluator::{Context, EvaluationError, EvaluationResult};
use crate::model::{Arguments, CallArgs, TypeInfo, Value};

/// Implementation of a function
pub type FunctionImpl = dyn Fn(CallArgs) -> EvaluationResult<Value> + Send + Sync;

/// A registered function
pub struct Function {
    name: String,
    signature: Signature,
    context: Option<Context>,
    extra_contexts: ExtraContexts,
    table: RwLock<DispatchTable<FunctionImpl>>,
}

/// Register a function with a default implementation
pub fn register_function<F>(
    name: impl Into<String>,
    signature: Signature,
    options: FunctionOptions,
    implementation: F,
) -> Result<Arc<Function>, RegistrationError>
where
    F: Fn(CallArgs) -> EvaluationResult<Value> + Send + Sync + 'static,
{
    Function::create(name.into(), signature, options, Some(Arc::new(implementation)))
}

/// Register a function that only has type-specific implementations
///
/// Calls whose first argument matches no registered type fail with
/// [`DispatchError::NotImplemented`].
pub fn declare_function(
    name: impl Into<String>,
    signature: Signature,
    options: FunctionOptions,
) -> Result<Arc<Function>, RegistrationError> {
    Function::create(name.into(), signature, options, None)
}

impl Function {
    fn create(
        name: String,
        signature: Signature,
        options: FunctionOptions,
        implementation: Option<Arc<FunctionImpl>>,
    ) -> Result<Arc<Self>, RegistrationError> {
        validate_extra_contexts(&name, &signature, &options.extra_contexts)?;
        let default = implementation.map(|implementation| Registration {
            implementation,
            context: options.context.clone(),
            extra_contexts: options.extra_contexts.clone(),
            favored: false,
        });
        log::debug!("Registered function `{}`", name);
        Ok(Arc::new(Self {
            table: RwLock::new(DispatchTable::new(name.clone(), options.config, default)),
            name,
            signature,
            context: options.context,
            extra_contexts: options.extra_contexts,
        }))
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters
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

    /// Add an implementation for calls whose first argument has one of `types`
    pub fn register<F>(
        &self,
        types: &[TypeInfo],
        options: RegisterOptions,
        implementation: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(CallArgs) -> EvaluationResult<Value> + Send + Sync + 'static,
    {
        validate_extra_contexts(&self.name, &self.signature, &options.extra_contexts)?;
        let registration = Registration {
            implementation: Arc::new(implementation) as Arc<FunctionImpl>,
            context: options.context.or_else(|| self.context.clone()),
            extra_contexts: merge_extra_contexts(&self.extra_contexts, &options.extra_contexts),
            favored: options.favored,
        };
        self.table
            .write()
            .register(types, options.backend.as_deref(), registration)
    }

    /// Whether any type-specific implementation exists
    pub fn is_dispatchable(&self) -> bool {
        self.table.read().has_typed_registrations()
    }

    /// Backend names in registration order
    pub fn backends(&self) -> Vec<String> {
        self.table.read().backends().map(str::to_string).collect()
    }

    /// Pick the implementation for a first argument of type `ty`
    pub fn dispatch(
        &self,
        ty: &TypeInfo,
        backend: Option<&str>,
    ) -> Result<Resolution<FunctionImpl>, DispatchError> {
        self.table.read().resolve(ty, backend)
    }

    /// Build a call node without evaluating anything
    pub fn defer(self: &Arc<Self>, args: Arguments<Expression>) -> Expression {
        self.defer_with(args, CallOptions::default())
    }

    /// Build a call node with call-site options
    pub fn defer_with(self: &Arc<Self>, args: Arguments<Expression>, options: CallOptions) -> Expression {
        Expression::new(ExpressionNode::Function(FunctionCall::new(
            Callee::Function(self.clone()),
            args,
            options,
        )))
    }

    /// Call now if every argument is concrete, otherwise build a call node
    pub fn call(self: &Arc<Self>, args: Arguments<Expression>) -> EvaluationResult<CallOutcome> {
        self.call_with(args, CallOptions::default())
    }

    /// [`Function::call`] with call-site options
    pub fn call_with(
        self: &Arc<Self>,
        args: Arguments<Expression>,
        options: CallOptions,
    ) -> EvaluationResult<CallOutcome> {
        if args.iter().any(Expression::is_symbolic) {
            return Ok(CallOutcome::Deferred(self.defer_with(args, options)));
        }
        let values = args.try_map(
            |_, arg| arg.evaluate(&Value::Null, None),
            |_, arg| arg.evaluate(&Value::Null, None),
        )?;
        self.invoke_with(values, options.backend.as_deref())
            .map(CallOutcome::Ready)
    }

    /// Run the implementation for already evaluated arguments
    pub fn invoke(&self, args: CallArgs) -> EvaluationResult<Value> {
        self.invoke_with(args, None)
    }

    fn invoke_with(&self, args: CallArgs, backend: Option<&str>) -> EvaluationResult<Value> {
        self.signature.bind(&self.name, &args)?;
        let ty = args.get(0).map(Value::type_info).unwrap_or(TypeInfo::Any);
        let resolution = self.dispatch(&ty, backend)?;
        (resolution.implementation)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("context", &self.context)
            .field("backends", &self.backends())
            .finish()
    }
}

/// Error for implementations that receive an argument of the wrong shape
pub fn argument_error(name: &str, message: impl Into<String>) -> EvaluationError {
    EvaluationError::implementation(name, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Symbolic;
    use pretty_assertions::assert_eq;

    fn double() -> Arc<Function> {
        register_function(
            "double",
            Signature::from_names(["x"]),
            FunctionOptions::new(),
            |args: CallArgs| {
                let x = args.get(0).and_then(Value::as_integer).unwrap_or_default();
                Ok(Value::Integer(x * 2))
            },
        )
        .unwrap()
    }

    #[test]
    fn test_concrete_call_runs_now() {
        let outcome = double().call(Arguments::new().arg(21)).unwrap();
        assert_eq!(outcome, CallOutcome::Ready(Value::Integer(42)));
    }

    #[test]
    fn test_symbolic_call_defers() {
        let f = Symbolic::new("f");
        let outcome = double().call(Arguments::new().arg(f.attr("x"))).unwrap();
        assert!(outcome.is_deferred());
        assert_eq!(outcome.into_expression().to_string(), "double(x)");
    }

    #[test]
    fn test_arity_is_checked() {
        let err = double().call(Arguments::new().arg(1).arg(2)).unwrap_err();
        assert!(matches!(err, EvaluationError::Function(_)));
    }

    #[test]
    fn test_dispatch_on_first_argument() {
        let describe = declare_function("describe", Signature::from_names(["x"]), FunctionOptions::new())
            .unwrap();
        describe
            .register(&[TypeInfo::Integer], RegisterOptions::new(), |_| Ok(Value::from("int")))
            .unwrap();
        describe
            .register(&[TypeInfo::String], RegisterOptions::new(), |_| Ok(Value::from("str")))
            .unwrap();

        assert_eq!(describe.invoke(CallArgs::new().arg(true)).unwrap(), Value::from("int"));
        assert_eq!(describe.invoke(CallArgs::new().arg("s")).unwrap(), Value::from("str"));
        assert!(matches!(
            describe.invoke(CallArgs::new().arg(1.5)),
            Err(EvaluationError::Dispatch(DispatchError::NotImplemented { .. }))
        ));
        assert!(describe.is_dispatchable());
    }

    #[test]
    fn test_unknown_extra_context() {
        let result = register_function(
            "f",
            Signature::from_names(["x"]),
            FunctionOptions::new().extra_context("y", Context::SELECT),
            |_| Ok(Value::Null),
        );
        assert!(matches!(result, Err(RegistrationError::UnknownParameter { .. })));

        let registered = double().register(
            &[TypeInfo::Any],
            RegisterOptions::new().extra_context("nope", Context::EVAL),
            |_| Ok(Value::Null),
        );
        assert!(matches!(registered, Err(RegistrationError::UnknownParameter { .. })));
    }
}
