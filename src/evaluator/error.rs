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

// Error types for expression evaluation

use thiserror::Error;

use super::context::ContextError;
use crate::registry::error::{DispatchError, RegistrationError};
use crate::registry::operator::OperatorError;
use crate::registry::signature::FunctionError;

/// Result type for evaluation operations
pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Errors that can occur while evaluating an expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// Reference could not be resolved in the current context
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    /// No implementation matches the data type or backend
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Operator evaluation error
    #[error("Operator error: {0}")]
    Operator(#[from] OperatorError),

    /// Argument binding error
    #[error("Function error: {0}")]
    Function(#[from] FunctionError),

    /// Registration error surfaced while building an expression
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Attribute not found on the data
    #[error("Attribute '{attribute}' not found on {type_name}")]
    AttributeNotFound {
        /// Attribute name
        attribute: String,
        /// Type of the value that was accessed
        type_name: String,
    },

    /// Map key not found
    #[error("Key '{key}' not found")]
    KeyNotFound {
        /// Missing key
        key: String,
    },

    /// Index out of bounds
    #[error("Index {index} out of bounds for collection of size {size}")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// Collection size
        size: usize,
    },

    /// Item access on a value that does not support it
    #[error("{type_name} cannot be indexed by {key_type}")]
    NotSubscriptable {
        /// Type of the accessed value
        type_name: String,
        /// Type of the key
        key_type: String,
    },

    /// Call syntax used on something that is not callable
    #[error("{type_name} is not callable")]
    NotCallable {
        /// Type of the value that was called
        type_name: String,
    },

    /// Iteration over a value that is not a container
    #[error("{type_name} is not iterable")]
    NotIterable {
        /// Type of the value
        type_name: String,
    },

    /// Iteration over a value that is still an expression
    #[error(
        "Expression `{expression}` is not iterable; pipe the data into the verb \
         or evaluate the expression first"
    )]
    IterateExpression {
        /// Display form of the expression
        expression: String,
    },

    /// Something other than a verb call was piped into
    #[error("Only verb calls can receive piped data, got `{expression}`")]
    NotPipeable {
        /// Display form of the expression
        expression: String,
    },

    /// A verb was called without its data argument
    #[error("Missing the first argument for verb `{verb}`")]
    MissingDataArgument {
        /// Verb name
        verb: String,
    },

    /// Error raised by an implementation
    #[error("Error in `{name}`: {message}")]
    Implementation {
        /// Name of the failing implementation
        name: String,
        /// Error message
        message: String,
    },
}

impl EvaluationError {
    /// Build an implementation error
    pub fn implementation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Implementation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether this error was caused by an unresolved or pending context
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Context(_))
    }

    /// Whether this error was caused by a dispatch miss
    pub fn is_dispatch_error(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }
}
