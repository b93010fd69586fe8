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

//! Registries for functions, verbs and operators
//!
//! Functions and verbs are registered once and then extended with
//! type-specific implementations grouped by backend. Operator tables decide
//! what the operator nodes of an expression compute.

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod function;
pub mod operator;
pub mod options;
pub mod signature;
pub mod verb;

pub use catalog::{Catalog, Entry};
pub use config::{AmbiguityPolicy, DEFAULT_BACKEND, DispatchConfig};
pub use dispatch::{DispatchTable, ExtraContexts, Registration, Resolution};
pub use error::{DispatchError, RegistrationError};
pub use function::{Function, FunctionImpl, argument_error, declare_function, register_function};
pub use operator::{
    DEFAULT_OPERATORS, NativeOperators, OperatorError, OperatorRegistry, OperatorResult,
    OperatorTable, apply_native,
};
pub use options::{CallOutcome, FunctionOptions, RegisterOptions, VerbOptions};
pub use signature::{Binding, FunctionError, ParameterInfo, ParameterKind, Signature};
pub use verb::{Verb, VerbImpl, declare_verb, register_verb};
