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

//! Operator tables: how an operator node computes its result from evaluated operands

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;

use crate::ast::OperatorKind;
use crate::evaluator::EvaluationResult;
use crate::model::Value;
use crate::registry::error::RegistrationError;

/// Result type for native operator evaluation
pub type OperatorResult<T> = Result<T, OperatorError>;

/// Operator evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperatorError {
    /// Invalid operand types for binary operation
    #[error("Operator '{operator}' cannot be applied to types {left_type} and {right_type}")]
    InvalidOperandTypes {
        /// The operator symbol that failed
        operator: String,
        /// Type of the left operand
        left_type: String,
        /// Type of the right operand
        right_type: String,
    },
    /// Invalid operand type for unary operation
    #[error("Operator '{operator}' cannot be applied to type {operand_type}")]
    InvalidUnaryOperandType {
        /// The operator symbol that failed
        operator: String,
        /// Type of the operand
        operand_type: String,
    },
    /// Division or modulo by zero
    #[error("Division by zero in '{operator}'")]
    DivisionByZero {
        /// The operator symbol that failed
        operator: String,
    },
    /// Operand count does not match the operator
    #[error("Operator '{operator}' takes {expected} operand(s), got {actual}")]
    OperandCount {
        /// The operator symbol
        operator: String,
        /// Operands the operator takes
        expected: usize,
        /// Operands supplied
        actual: usize,
    },
    /// General evaluation error
    #[error("Error evaluating operator '{operator}': {message}")]
    EvaluationError {
        /// The operator that caused the error
        operator: String,
        /// Error message describing what went wrong
        message: String,
    },
}

/// Computes operator results
///
/// A table is attached to the operator nodes built from a
/// [`Symbolic`](crate::ast::Symbolic) factory. `data` is the data the operator
/// node is being evaluated against, for tables that need to look at it.
pub trait OperatorTable: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Apply `operator` to already evaluated operands
    fn evaluate(
        &self,
        operator: OperatorKind,
        operands: &[Value],
        data: &Value,
    ) -> EvaluationResult<Value>;
}

/// Native [`Value`] semantics for every operator
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeOperators;

impl OperatorTable for NativeOperators {
    fn name(&self) -> &str {
        "native"
    }

    fn evaluate(
        &self,
        operator: OperatorKind,
        operands: &[Value],
        _data: &Value,
    ) -> EvaluationResult<Value> {
        Ok(apply_native(operator, operands)?)
    }
}

/// Table used by operator nodes that carry none
pub static DEFAULT_OPERATORS: Lazy<Arc<dyn OperatorTable>> =
    Lazy::new(|| Arc::new(NativeOperators));

type OperatorFn = dyn Fn(&[Value], &Value) -> EvaluationResult<Value> + Send + Sync;

/// Operator table overriding selected operators and deferring the rest to native semantics
#[derive(Clone)]
pub struct OperatorRegistry {
    name: String,
    overrides: FxHashMap<OperatorKind, Arc<OperatorFn>>,
}

impl OperatorRegistry {
    /// Create an empty registry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overrides: FxHashMap::default(),
        }
    }

    /// Override an operator by name
    ///
    /// A reflected name (`radd`) registers the left-handed operator with the
    /// operands swapped before they reach `func`.
    pub fn register<F>(&mut self, name: &str, func: F) -> Result<(), RegistrationError>
    where
        F: Fn(&[Value], &Value) -> EvaluationResult<Value> + Send + Sync + 'static,
    {
        let (operator, reflected) = OperatorKind::from_name(name)?;
        let func: Arc<OperatorFn> = if reflected {
            Arc::new(move |operands: &[Value], data: &Value| {
                let swapped: Vec<Value> = operands.iter().rev().cloned().collect();
                func(&swapped, data)
            })
        } else {
            Arc::new(func)
        };
        log::debug!("Operator table '{}' overrides '{}'", self.name, operator);
        self.overrides.insert(operator, func);
        Ok(())
    }

    /// Builder form of [`OperatorRegistry::register`]
    pub fn with<F>(mut self, name: &str, func: F) -> Result<Self, RegistrationError>
    where
        F: Fn(&[Value], &Value) -> EvaluationResult<Value> + Send + Sync + 'static,
    {
        self.register(name, func)?;
        Ok(self)
    }

    /// Whether `operator` is overridden
    pub fn contains(&self, operator: OperatorKind) -> bool {
        self.overrides.contains_key(&operator)
    }
}

impl OperatorTable for OperatorRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(
        &self,
        operator: OperatorKind,
        operands: &[Value],
        data: &Value,
    ) -> EvaluationResult<Value> {
        match self.overrides.get(&operator) {
            Some(func) => func(operands, data),
            None => NativeOperators.evaluate(operator, operands, data),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Number> {
        match value.unwrap_instance() {
            Value::Integer(i) => Some(Number::Int(*i)),
            Value::Boolean(b) => Some(Number::Int(i64::from(*b))),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

/// Apply native semantics to evaluated operands
pub fn apply_native(operator: OperatorKind, operands: &[Value]) -> OperatorResult<Value> {
    if operands.len() != operator.arity() {
        return Err(OperatorError::OperandCount {
            operator: operator.symbol().to_string(),
            expected: operator.arity(),
            actual: operands.len(),
        });
    }
    if operator.is_unary() {
        return apply_unary(operator, &operands[0]);
    }
    apply_binary(operator, &operands[0], &operands[1])
}

fn invalid_binary(operator: OperatorKind, left: &Value, right: &Value) -> OperatorError {
    OperatorError::InvalidOperandTypes {
        operator: operator.symbol().to_string(),
        left_type: left.type_name(),
        right_type: right.type_name(),
    }
}

/// `sequence * count`, rejecting results that cannot be allocated
fn repeat_sequence(operator: OperatorKind, sequence: &Value, count: &Value) -> OperatorResult<Value> {
    let times = usize::try_from(count.as_integer().unwrap_or_default().max(0)).unwrap_or(usize::MAX);
    let too_large = || OperatorError::EvaluationError {
        operator: operator.symbol().to_string(),
        message: format!("repeating a {} {times} times is too large", sequence.type_name()),
    };

    match sequence {
        Value::String(s) => {
            if s.is_empty() || times == 0 {
                return Ok(Value::String(String::new()));
            }
            let total = s.len().checked_mul(times).ok_or_else(too_large)?;
            let mut repeated = String::new();
            repeated.try_reserve_exact(total).map_err(|_| too_large())?;
            for _ in 0..times {
                repeated.push_str(s);
            }
            Ok(Value::String(repeated))
        }
        Value::List(items) => {
            if items.is_empty() || times == 0 {
                return Ok(Value::List(Vec::new()));
            }
            let total = items.len().checked_mul(times).ok_or_else(too_large)?;
            let mut repeated = Vec::new();
            repeated.try_reserve_exact(total).map_err(|_| too_large())?;
            for _ in 0..times {
                repeated.extend_from_slice(items);
            }
            Ok(Value::List(repeated))
        }
        other => Err(invalid_binary(operator, other, count)),
    }
}

fn overflow(operator: OperatorKind) -> OperatorError {
    OperatorError::EvaluationError {
        operator: operator.symbol().to_string(),
        message: "integer overflow".to_string(),
    }
}

fn apply_unary(operator: OperatorKind, operand: &Value) -> OperatorResult<Value> {
    let invalid = || OperatorError::InvalidUnaryOperandType {
        operator: operator.symbol().to_string(),
        operand_type: operand.type_name(),
    };
    match (operator, operand.unwrap_instance()) {
        (OperatorKind::Invert, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (OperatorKind::Invert, Value::Integer(i)) => Ok(Value::Integer(!i)),
        (OperatorKind::Neg, _) => match Number::of(operand).ok_or_else(invalid)? {
            Number::Int(i) => i
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(|| overflow(operator)),
            Number::Float(f) => Ok(Value::Float(-f)),
        },
        (OperatorKind::Pos, _) => match Number::of(operand).ok_or_else(invalid)? {
            Number::Int(i) => Ok(Value::Integer(i)),
            Number::Float(f) => Ok(Value::Float(f)),
        },
        _ => Err(invalid()),
    }
}

fn apply_binary(operator: OperatorKind, left: &Value, right: &Value) -> OperatorResult<Value> {
    use OperatorKind::*;

    match operator {
        Eq => return Ok(Value::Boolean(left.unwrap_instance() == right.unwrap_instance())),
        Ne => return Ok(Value::Boolean(left.unwrap_instance() != right.unwrap_instance())),
        Lt | Le | Gt | Ge => return compare(operator, left, right),
        BitAnd | BitOr | BitXor => return bitwise(operator, left, right),
        _ => {}
    }

    match (left.unwrap_instance(), right.unwrap_instance()) {
        (Value::String(a), Value::String(b)) if operator == Add => {
            return Ok(Value::String(format!("{a}{b}")));
        }
        (Value::List(a), Value::List(b)) if operator == Add => {
            return Ok(Value::List(a.iter().chain(b).cloned().collect()));
        }
        (sequence @ (Value::String(_) | Value::List(_)), count)
        | (count, sequence @ (Value::String(_) | Value::List(_)))
            if operator == Mul && matches!(count, Value::Integer(_) | Value::Boolean(_)) =>
        {
            return repeat_sequence(operator, sequence, count);
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (Number::of(left), Number::of(right)) else {
        return Err(invalid_binary(operator, left, right));
    };

    match operator {
        TrueDiv => {
            if b.is_zero() {
                return Err(OperatorError::DivisionByZero {
                    operator: operator.symbol().to_string(),
                });
            }
            Ok(Value::Float(a.as_f64() / b.as_f64()))
        }
        FloorDiv | Mod if b.is_zero() => Err(OperatorError::DivisionByZero {
            operator: operator.symbol().to_string(),
        }),
        LShift | RShift => shift(operator, left, right, a, b),
        MatMul => Err(invalid_binary(operator, left, right)),
        _ => match (a, b) {
            (Number::Int(a), Number::Int(b)) => integer_arithmetic(operator, a, b),
            (a, b) => float_arithmetic(operator, a.as_f64(), b.as_f64()),
        },
    }
}

fn integer_arithmetic(operator: OperatorKind, a: i64, b: i64) -> OperatorResult<Value> {
    use OperatorKind::*;

    let result = match operator {
        Add => a.checked_add(b),
        Sub => a.checked_sub(b),
        Mul => a.checked_mul(b),
        FloorDiv => a.checked_div(b).map(|q| {
            if a % b != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }),
        Mod => a.checked_rem(b).map(|r| {
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }),
        Pow if b < 0 => return Ok(Value::Float((a as f64).powf(b as f64))),
        Pow => u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp)),
        _ => unreachable!("non-arithmetic operators are handled by the caller"),
    };
    result.map(Value::Integer).ok_or_else(|| overflow(operator))
}

fn float_arithmetic(operator: OperatorKind, a: f64, b: f64) -> OperatorResult<Value> {
    use OperatorKind::*;

    let result = match operator {
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        FloorDiv => (a / b).floor(),
        Mod => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        Pow => a.powf(b),
        _ => unreachable!("non-arithmetic operators are handled by the caller"),
    };
    Ok(Value::Float(result))
}

fn shift(
    operator: OperatorKind,
    left: &Value,
    right: &Value,
    a: Number,
    b: Number,
) -> OperatorResult<Value> {
    let (Number::Int(a), Number::Int(b)) = (a, b) else {
        return Err(invalid_binary(operator, left, right));
    };
    let amount = u32::try_from(b).map_err(|_| OperatorError::EvaluationError {
        operator: operator.symbol().to_string(),
        message: "negative shift count".to_string(),
    })?;
    let result = match operator {
        OperatorKind::LShift => a.checked_shl(amount),
        _ => Some(a.checked_shr(amount).unwrap_or(if a < 0 { -1 } else { 0 })),
    };
    result.map(Value::Integer).ok_or_else(|| overflow(operator))
}

fn bitwise(operator: OperatorKind, left: &Value, right: &Value) -> OperatorResult<Value> {
    match (left.unwrap_instance(), right.unwrap_instance()) {
        (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(match operator {
            OperatorKind::BitAnd => a & b,
            OperatorKind::BitOr => a | b,
            _ => a ^ b,
        })),
        (l, r) => match (l.as_integer(), r.as_integer()) {
            (Some(a), Some(b)) => Ok(Value::Integer(match operator {
                OperatorKind::BitAnd => a & b,
                OperatorKind::BitOr => a | b,
                _ => a ^ b,
            })),
            _ => Err(invalid_binary(operator, left, right)),
        },
    }
}

fn compare(operator: OperatorKind, left: &Value, right: &Value) -> OperatorResult<Value> {
    let ordering = match (left.unwrap_instance(), right.unwrap_instance()) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (Number::of(left), Number::of(right)) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Some(a.cmp(&b)),
            (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
            _ => return Err(invalid_binary(operator, left, right)),
        },
    };
    // NaN compares false in every direction
    let Some(ordering) = ordering else {
        return Ok(Value::Boolean(false));
    };
    Ok(Value::Boolean(match operator {
        OperatorKind::Lt => ordering == Ordering::Less,
        OperatorKind::Le => ordering != Ordering::Greater,
        OperatorKind::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    }))
}
