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

//! Registration options shared by functions and verbs

use super::config::DispatchConfig;
use super::dispatch::ExtraContexts;
use super::error::RegistrationError;
use super::signature::Signature;
use crate::ast::Expression;
use crate::evaluator::Context;
use crate::model::Value;

/// Options of [`register_function`](super::register_function)
#[derive(Debug, Clone, Default)]
pub struct FunctionOptions {
    /// Context for the arguments, `None` to inherit
    pub context: Option<Context>,
    /// Contexts for individual parameters
    pub extra_contexts: ExtraContexts,
    /// Dispatch behaviour
    pub config: DispatchConfig,
}

impl FunctionOptions {
    /// Default options: inherit the context
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate arguments under `context`
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Evaluate the argument bound to `parameter` under `context`
    pub fn extra_context(mut self, parameter: impl Into<String>, context: Context) -> Self {
        self.extra_contexts.insert(parameter.into(), context);
        self
    }

    /// Use a specific dispatch configuration
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }
}

/// Options of [`register_verb`](super::register_verb)
#[derive(Debug, Clone, Default)]
pub struct VerbOptions {
    /// Context for the arguments, `None` to inherit
    pub context: Option<Context>,
    /// Contexts for individual parameters
    pub extra_contexts: ExtraContexts,
    /// Always defer, even when called with concrete data
    pub dependent: bool,
    /// Dispatch behaviour
    pub config: DispatchConfig,
}

impl VerbOptions {
    /// Default options: inherit the context
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate arguments under `context`
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Evaluate the argument bound to `parameter` under `context`
    pub fn extra_context(mut self, parameter: impl Into<String>, context: Context) -> Self {
        self.extra_contexts.insert(parameter.into(), context);
        self
    }

    /// Make the verb dependent: calls always build a node waiting for data
    pub fn dependent(mut self) -> Self {
        self.dependent = true;
        self
    }

    /// Use a specific dispatch configuration
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }
}

/// Options of a typed `.register(...)`
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Backend to register with, `None` for the configured default
    pub backend: Option<String>,
    /// Take precedence over non-favored implementations of other backends
    pub favored: bool,
    /// Context for this implementation, `None` for the descriptor's
    pub context: Option<Context>,
    /// Per-parameter contexts added to the descriptor's
    pub extra_contexts: ExtraContexts,
}

impl RegisterOptions {
    /// Default backend, not favored, descriptor context
    pub fn new() -> Self {
        Self::default()
    }

    /// Register with `backend`
    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    /// Mark the implementation as favored
    pub fn favored(mut self) -> Self {
        self.favored = true;
        self
    }

    /// Evaluate arguments under `context` for this implementation
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Evaluate the argument bound to `parameter` under `context` for this implementation
    pub fn extra_context(mut self, parameter: impl Into<String>, context: Context) -> Self {
        self.extra_contexts.insert(parameter.into(), context);
        self
    }
}

/// Result of calling a function or verb directly
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// Every argument was concrete and the call was evaluated
    Ready(Value),
    /// Some argument needs data; the call was turned into a node
    Deferred(Expression),
}

impl CallOutcome {
    /// Whether the call was deferred
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// The value of an evaluated call
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Deferred(_) => None,
        }
    }

    /// The node of a deferred call, or the value as a literal
    pub fn into_expression(self) -> Expression {
        match self {
            Self::Ready(value) => Expression::from(value),
            Self::Deferred(expr) => expr,
        }
    }
}

impl From<CallOutcome> for Expression {
    fn from(outcome: CallOutcome) -> Self {
        outcome.into_expression()
    }
}

/// Reject per-parameter contexts naming parameters the signature lacks
pub(crate) fn validate_extra_contexts(
    name: &str,
    signature: &Signature,
    extra_contexts: &ExtraContexts,
) -> Result<(), RegistrationError> {
    match extra_contexts
        .keys()
        .find(|parameter| !signature.has_parameter(parameter))
    {
        Some(parameter) => Err(RegistrationError::unknown_parameter(name, parameter.as_str())),
        None => Ok(()),
    }
}

/// The descriptor's per-parameter contexts overlaid with a registration's own
pub(crate) fn merge_extra_contexts(base: &ExtraContexts, own: &ExtraContexts) -> ExtraContexts {
    let mut merged = base.clone();
    merged.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
