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

//! Piping data into deferred verb calls

use std::ops::Shr;

use crate::ast::{Expression, ExpressionNode};
use crate::evaluator::{EvaluationError, EvaluationResult};
use crate::model::Value;

/// Evaluate a deferred verb call with `data` as its first argument
///
/// Only verb call nodes accept piped data; anything else fails with
/// [`EvaluationError::NotPipeable`].
pub fn pipe(data: &Value, verb_call: &Expression) -> EvaluationResult<Value> {
    match verb_call.node() {
        ExpressionNode::Verb(call) => {
            log::trace!("Piping {} into `{}`", data.type_name(), call.verb().name());
            verb_call.evaluate(data, None)
        }
        _ => Err(EvaluationError::NotPipeable {
            expression: verb_call.to_string(),
        }),
    }
}

/// Run `data` through several verb calls, left to right
pub fn pipe_all<'a, I>(data: Value, verb_calls: I) -> EvaluationResult<Value>
where
    I: IntoIterator<Item = &'a Expression>,
{
    verb_calls
        .into_iter()
        .try_fold(data, |data, verb_call| pipe(&data, verb_call))
}

/// `data.pipe(&verb_call)` as a method
pub trait Pipe {
    /// See [`pipe`]
    fn pipe(&self, verb_call: &Expression) -> EvaluationResult<Value>;
}

impl Pipe for Value {
    fn pipe(&self, verb_call: &Expression) -> EvaluationResult<Value> {
        pipe(self, verb_call)
    }
}

/// `data >> &verb_call`, the operator spelling of [`pipe`]
impl Shr<&Expression> for Value {
    type Output = EvaluationResult<Value>;

    fn shr(self, verb_call: &Expression) -> EvaluationResult<Value> {
        pipe(&self, verb_call)
    }
}

impl Shr<&Expression> for &Value {
    type Output = EvaluationResult<Value>;

    fn shr(self, verb_call: &Expression) -> EvaluationResult<Value> {
        pipe(self, verb_call)
    }
}
