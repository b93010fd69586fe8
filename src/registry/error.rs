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

//! Registry error types

use thiserror::Error;

/// Errors raised while choosing an implementation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// No implementation matches the type
    #[error("`{name}` is not implemented for type {type_name}")]
    NotImplemented {
        /// Registered name
        name: String,
        /// Name of the dispatch type
        type_name: String,
    },

    /// The requested backend was never registered
    #[error("No implementations found for backend `{backend}` of `{name}`")]
    UnknownBackend {
        /// Registered name
        name: String,
        /// Requested backend
        backend: String,
    },

    /// Several backends match equally well and ambiguity is configured as an error
    #[error(
        "Multiple implementations of `{name}` for type {type_name} by backends: [{}]; \
         register more specific types or choose a backend",
        backends.join(", ")
    )]
    Ambiguous {
        /// Registered name
        name: String,
        /// Name of the dispatch type
        type_name: String,
        /// Matching backends, most recent first
        backends: Vec<String>,
    },
}

impl DispatchError {
    /// Create a not implemented error
    pub fn not_implemented(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::NotImplemented {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Errors raised while registering or constructing
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistrationError {
    /// Operator name is not known
    #[error("No operator function defined for '{name}'")]
    UnknownOperator {
        /// The offending name
        name: String,
    },

    /// Operator built with the wrong number of operands
    #[error("Operator '{operator}' takes {expected} operand(s), got {actual}")]
    OperandCount {
        /// Operator name
        operator: String,
        /// Operands the operator takes
        expected: usize,
        /// Operands supplied
        actual: usize,
    },

    /// A per-parameter context names a parameter the signature does not have
    #[error("`{name}` has no parameter named '{parameter}'")]
    UnknownParameter {
        /// Registered name
        name: String,
        /// The unknown parameter
        parameter: String,
    },

    /// A verb signature does not start with a positional data parameter
    #[error("Verb `{verb}` must take the data as its first positional parameter")]
    MissingDataParameter {
        /// Verb name
        verb: String,
    },

    /// A name was registered twice in the same catalog
    #[error("`{name}` is already registered")]
    AlreadyRegistered {
        /// The duplicated name
        name: String,
    },

    /// An implementation was registered for no type at all
    #[error("No types given when registering an implementation of `{name}`")]
    EmptyTypeList {
        /// Registered name
        name: String,
    },
}

impl RegistrationError {
    /// Create an unknown parameter error
    pub fn unknown_parameter(name: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::UnknownParameter {
            name: name.into(),
            parameter: parameter.into(),
        }
    }

    /// Create an already registered error
    pub fn already_registered(name: impl Into<String>) -> Self {
        Self::AlreadyRegistered { name: name.into() }
    }
}
