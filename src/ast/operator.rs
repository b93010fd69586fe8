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

//! Operator names, symbols, precedence and associativity

use std::fmt;

use crate::registry::error::RegistrationError;

/// Operator associativity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    /// Left-associative operator (evaluated left to right)
    Left,
    /// Right-associative operator (evaluated right to left)
    Right,
}

/// Every operator an expression can carry
///
/// Reflected spellings (`radd`, `rsub`, ...) are not separate operators: they
/// parse to the left-handed operator with the operands swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a @ b`
    MatMul,
    /// `a / b`
    TrueDiv,
    /// `a // b`
    FloorDiv,
    /// `a % b`
    Mod,
    /// `a ** b`
    Pow,
    /// `a << b`
    LShift,
    /// `a >> b`
    RShift,
    /// `a & b`
    BitAnd,
    /// `a ^ b`
    BitXor,
    /// `a | b`
    BitOr,
    /// `a < b`
    Lt,
    /// `a <= b`
    Le,
    /// `a == b`
    Eq,
    /// `a != b`
    Ne,
    /// `a > b`
    Gt,
    /// `a >= b`
    Ge,
    /// `-a`
    Neg,
    /// `+a`
    Pos,
    /// `~a`
    Invert,
}

const ALL_OPERATORS: [OperatorKind; 22] = [
    OperatorKind::Add,
    OperatorKind::Sub,
    OperatorKind::Mul,
    OperatorKind::MatMul,
    OperatorKind::TrueDiv,
    OperatorKind::FloorDiv,
    OperatorKind::Mod,
    OperatorKind::Pow,
    OperatorKind::LShift,
    OperatorKind::RShift,
    OperatorKind::BitAnd,
    OperatorKind::BitXor,
    OperatorKind::BitOr,
    OperatorKind::Lt,
    OperatorKind::Le,
    OperatorKind::Eq,
    OperatorKind::Ne,
    OperatorKind::Gt,
    OperatorKind::Ge,
    OperatorKind::Neg,
    OperatorKind::Pos,
    OperatorKind::Invert,
];

/// Precedence of a unary operator applied to an operand
pub(crate) const UNARY_PRECEDENCE: u8 = 7;

/// Precedence of nodes that never need parentheses
pub(crate) const ATOM_PRECEDENCE: u8 = u8::MAX;

impl OperatorKind {
    /// All operators
    pub fn all() -> &'static [OperatorKind] {
        &ALL_OPERATORS
    }

    /// Canonical name (`add`, `and_`, `invert`, ...)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::MatMul => "matmul",
            Self::TrueDiv => "truediv",
            Self::FloorDiv => "floordiv",
            Self::Mod => "mod",
            Self::Pow => "pow",
            Self::LShift => "lshift",
            Self::RShift => "rshift",
            Self::BitAnd => "and_",
            Self::BitXor => "xor",
            Self::BitOr => "or_",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Neg => "neg",
            Self::Pos => "pos",
            Self::Invert => "invert",
        }
    }

    /// Symbol used when rendering expressions
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add | Self::Pos => "+",
            Self::Sub | Self::Neg => "-",
            Self::Mul => "*",
            Self::MatMul => "@",
            Self::TrueDiv => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitAnd => "&",
            Self::BitXor => "^",
            Self::BitOr => "|",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Invert => "~",
        }
    }

    /// Whether the operator takes a single operand
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::Neg | Self::Pos | Self::Invert)
    }

    /// Number of operands
    pub fn arity(&self) -> usize {
        if self.is_unary() { 1 } else { 2 }
    }

    /// Binding strength; higher values bind tighter
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Pow => 8,
            Self::Neg | Self::Pos | Self::Invert => UNARY_PRECEDENCE,
            Self::Mul | Self::MatMul | Self::TrueDiv | Self::FloorDiv | Self::Mod => 6,
            Self::Add | Self::Sub => 5,
            Self::LShift | Self::RShift => 4,
            Self::BitAnd => 3,
            Self::BitXor => 2,
            Self::BitOr => 1,
            Self::Lt | Self::Le | Self::Eq | Self::Ne | Self::Gt | Self::Ge => 0,
        }
    }

    /// Grouping of chains of the same precedence
    pub fn associativity(&self) -> Associativity {
        match self {
            Self::Pow => Associativity::Right,
            _ => Associativity::Left,
        }
    }

    fn lookup(name: &str) -> Option<OperatorKind> {
        let name = match name {
            "and" => "and_",
            "or" => "or_",
            other => other,
        };
        ALL_OPERATORS.iter().copied().find(|op| op.name() == name)
    }

    /// Parse an operator name, returning the operator and whether it was reflected
    ///
    /// Exact names win over reflected ones, so `rshift` is the shift operator
    /// while `rrshift` is its reflected spelling. Unary operators have no
    /// reflected form.
    pub fn from_name(name: &str) -> Result<(OperatorKind, bool), RegistrationError> {
        if let Some(op) = Self::lookup(name) {
            return Ok((op, false));
        }
        if let Some(op) = name.strip_prefix('r').and_then(Self::lookup) {
            if !op.is_unary() {
                return Ok((op, true));
            }
        }
        Err(RegistrationError::UnknownOperator {
            name: name.to_string(),
        })
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
