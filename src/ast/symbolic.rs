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

//! Caller-owned placeholder factory

use std::sync::Arc;

use super::expression::Expression;
use crate::registry::operator::OperatorTable;

/// Creates the placeholder that stands for the piped data
///
/// Build one during setup and pass it around:
///
/// ```
/// use pipeverb::{Context, Symbolic, Value};
///
/// let f = Symbolic::new("f");
/// let expr = f.attr("x") + 1;
/// let data = Value::map([("x", 2)]);
/// assert_eq!(expr.evaluate(&data, Some(&Context::EVAL)).unwrap(), Value::Integer(3));
/// ```
#[derive(Clone)]
pub struct Symbolic {
    root: Expression,
}

impl Symbolic {
    /// A placeholder named `name` using native operators
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            root: Expression::symbol(name),
        }
    }

    /// A placeholder whose derived operator nodes use `table`
    pub fn with_operators(name: impl Into<String>, table: Arc<dyn OperatorTable>) -> Self {
        Self {
            root: Expression::symbol_with(name, Some(table)),
        }
    }

    /// The placeholder itself
    pub fn expr(&self) -> &Expression {
        &self.root
    }

    /// `f.name`
    pub fn attr(&self, name: impl Into<String>) -> Expression {
        self.root.attr(name)
    }

    /// `f[key]`
    pub fn item(&self, key: impl Into<Expression>) -> Expression {
        self.root.item(key)
    }
}

impl std::fmt::Debug for Symbolic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Symbolic({})", self.root)
    }
}

impl From<&Symbolic> for Expression {
    fn from(symbolic: &Symbolic) -> Self {
        symbolic.root.clone()
    }
}
