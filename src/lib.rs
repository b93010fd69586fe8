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

//! Deferred expressions with type-directed dispatch
//!
//! Placeholders are combined with operators, attribute and item access, and
//! calls of registered functions and verbs into an expression tree. The tree
//! is evaluated once data arrives; each call picks its implementation by the
//! runtime type of that data, optionally among several named backends.
//!
//! ```
//! use pipeverb::{Arguments, Context, Pipe, Signature, Symbolic, Value, VerbOptions, register_verb};
//!
//! let f = Symbolic::new("f");
//! let add = register_verb(
//!     "add",
//!     Signature::from_names(["data", "left", "right"]),
//!     VerbOptions::new().context(Context::EVAL),
//!     |_, args| {
//!         let left = args.get(0).and_then(Value::as_integer).unwrap_or_default();
//!         let right = args.get(1).and_then(Value::as_integer).unwrap_or_default();
//!         Ok(Value::Integer(left + right))
//!     },
//! )?;
//!
//! let call = add.defer(Arguments::new().arg(f.attr("x")).arg(f.attr("y")));
//! let data = Value::map([("x", 1), ("y", 2)]);
//! assert_eq!(data.pipe(&call)?, Value::Integer(3));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

pub mod ast;
pub mod evaluator;
pub mod model;
pub mod pipe;
pub mod registry;

pub use ast::{
    CallOptions, Expression, ExpressionNode, OperatorKind, Symbolic, Visitor, collect_references,
};
pub use evaluator::{
    Context, ContextBase, ContextError, EvaluationError, EvaluationResult, evaluate_value,
};
pub use model::{Arguments, CallArgs, Callable, ClassInfo, Instance, TypeInfo, Value};
pub use pipe::{Pipe, pipe, pipe_all};
pub use registry::{
    AmbiguityPolicy, CallOutcome, Catalog, DispatchConfig, DispatchError, Function,
    FunctionOptions, OperatorRegistry, OperatorTable, RegisterOptions, RegistrationError,
    Signature, Verb, VerbOptions, declare_function, declare_verb, register_function,
    register_verb,
};
