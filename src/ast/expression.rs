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

//! Expression tree nodes and builders
//!
//! Building an expression never evaluates anything. Every builder returns a new
//! node that shares its children, so one subtree may appear under several
//! parents.

use indexmap::IndexMap;
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops;
use std::sync::Arc;

use super::operator::{ATOM_PRECEDENCE, Associativity, OperatorKind, UNARY_PRECEDENCE};
use crate::evaluator::Context;
use crate::model::{Arguments, Value};
use crate::registry::error::RegistrationError;
use crate::registry::function::Function;
use crate::registry::operator::OperatorTable;
use crate::registry::verb::Verb;

/// Handle to an immutable expression node
///
/// Cloning is cheap. Equality and hashing are by identity: two separately
/// built `x.a` nodes are different keys.
#[derive(Clone)]
pub struct Expression(Arc<ExpressionNode>);

/// The node kinds an expression tree is built from
pub enum ExpressionNode {
    /// The placeholder for the data supplied at evaluation time
    Symbol(Symbol),
    /// A concrete value
    Literal(Value),
    /// A list whose items may be expressions
    List(Vec<Expression>),
    /// A map whose values may be expressions
    Map(IndexMap<String, Expression>),
    /// `parent.name`
    Attr(ReferenceAttr),
    /// `parent[key]`
    Item(ReferenceItem),
    /// Operator applied to operands
    Operator(OperatorCall),
    /// Call of a registered function, a verb used as a function or an expression
    Function(FunctionCall),
    /// Verb call waiting for piped data
    Verb(VerbCall),
}

/// Placeholder node
pub struct Symbol {
    name: String,
    operators: Option<Arc<dyn OperatorTable>>,
}

impl Symbol {
    /// Name shown when rendering
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operator table inherited by nodes built from this symbol
    pub fn operators(&self) -> Option<&Arc<dyn OperatorTable>> {
        self.operators.as_ref()
    }
}

/// Attribute reference
pub struct ReferenceAttr {
    parent: Expression,
    name: String,
}

impl ReferenceAttr {
    /// Expression the attribute is read from
    pub fn parent(&self) -> &Expression {
        &self.parent
    }

    /// Attribute name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Item reference
pub struct ReferenceItem {
    parent: Expression,
    key: Expression,
}

impl ReferenceItem {
    /// Expression the item is read from
    pub fn parent(&self) -> &Expression {
        &self.parent
    }

    /// Key, evaluated under the context's `ref` context
    pub fn key(&self) -> &Expression {
        &self.key
    }
}

/// Operator node
pub struct OperatorCall {
    operator: OperatorKind,
    operands: SmallVec<[Expression; 2]>,
    table: Option<Arc<dyn OperatorTable>>,
}

impl OperatorCall {
    /// The operator
    pub fn operator(&self) -> OperatorKind {
        self.operator
    }

    /// Operands, left first
    pub fn operands(&self) -> &[Expression] {
        &self.operands
    }

    /// Custom operator table, if any
    pub fn table(&self) -> Option<&Arc<dyn OperatorTable>> {
        self.table.as_ref()
    }
}

/// Options fixed at a call site
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Dispatch only among this backend's implementations
    pub backend: Option<String>,
    /// Context overriding both the implementation's and the inherited one
    pub context: Option<Context>,
}

impl CallOptions {
    /// Options selecting a backend
    pub fn backend(backend: impl Into<String>) -> Self {
        Self {
            backend: Some(backend.into()),
            context: None,
        }
    }

    /// Options overriding the context
    pub fn context(context: Context) -> Self {
        Self {
            backend: None,
            context: Some(context),
        }
    }
}

/// What a function call node calls
#[derive(Clone)]
pub enum Callee {
    /// A registered function
    Function(Arc<Function>),
    /// A verb whose data argument is itself an expression
    Verb(Arc<Verb>),
    /// An expression evaluating to a callable, as in `x.col.get(...)`
    Expression(Expression),
}

/// Function call node
pub struct FunctionCall {
    callee: Callee,
    args: Arguments<Expression>,
    options: CallOptions,
}

impl FunctionCall {
    pub(crate) fn new(callee: Callee, args: Arguments<Expression>, options: CallOptions) -> Self {
        Self {
            callee,
            args,
            options,
        }
    }

    /// What is called
    pub fn callee(&self) -> &Callee {
        &self.callee
    }

    /// Call-site arguments
    pub fn args(&self) -> &Arguments<Expression> {
        &self.args
    }

    /// Call-site options
    pub fn options(&self) -> &CallOptions {
        &self.options
    }
}

/// Verb call node; the data arrives through [`pipe`](crate::pipe)
pub struct VerbCall {
    verb: Arc<Verb>,
    args: Arguments<Expression>,
    options: CallOptions,
}

impl VerbCall {
    pub(crate) fn new(verb: Arc<Verb>, args: Arguments<Expression>, options: CallOptions) -> Self {
        Self {
            verb,
            args,
            options,
        }
    }

    /// The verb
    pub fn verb(&self) -> &Arc<Verb> {
        &self.verb
    }

    /// Arguments after the data
    pub fn args(&self) -> &Arguments<Expression> {
        &self.args
    }

    /// Call-site options
    pub fn options(&self) -> &CallOptions {
        &self.options
    }
}

impl Expression {
    /// Wrap a node
    pub fn new(node: ExpressionNode) -> Self {
        Self(Arc::new(node))
    }

    /// The node behind this handle
    pub fn node(&self) -> &ExpressionNode {
        &self.0
    }

    /// A placeholder with native operators; see [`Symbolic`](super::Symbolic)
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::symbol_with(name, None)
    }

    pub(crate) fn symbol_with(
        name: impl Into<String>,
        operators: Option<Arc<dyn OperatorTable>>,
    ) -> Self {
        Self::new(ExpressionNode::Symbol(Symbol {
            name: name.into(),
            operators,
        }))
    }

    /// A concrete value
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::new(ExpressionNode::Literal(value.into()))
    }

    /// A list literal
    pub fn list<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expression>,
    {
        Self::new(ExpressionNode::List(items.into_iter().map(Into::into).collect()))
    }

    /// A map literal
    pub fn map<I, K, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, E)>,
        K: Into<String>,
        E: Into<Expression>,
    {
        Self::new(ExpressionNode::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    /// `self.name`
    pub fn attr(&self, name: impl Into<String>) -> Self {
        Self::new(ExpressionNode::Attr(ReferenceAttr {
            parent: self.clone(),
            name: name.into(),
        }))
    }

    /// `self[key]`
    pub fn item(&self, key: impl Into<Expression>) -> Self {
        Self::new(ExpressionNode::Item(ReferenceItem {
            parent: self.clone(),
            key: key.into(),
        }))
    }

    /// `self(args)`: call whatever `self` evaluates to
    pub fn call(&self, args: Arguments<Expression>) -> Self {
        Self::new(ExpressionNode::Function(FunctionCall::new(
            Callee::Expression(self.clone()),
            args,
            CallOptions::default(),
        )))
    }

    /// Operator node by name
    ///
    /// Reflected names (`radd`, `rsub`, ...) swap the two operands.
    pub fn operator(name: &str, operands: Vec<Expression>) -> Result<Self, RegistrationError> {
        let (operator, reflected) = OperatorKind::from_name(name)?;
        if operands.len() != operator.arity() {
            return Err(RegistrationError::OperandCount {
                operator: name.to_string(),
                expected: operator.arity(),
                actual: operands.len(),
            });
        }
        let mut operands: SmallVec<[Expression; 2]> = operands.into_iter().collect();
        if reflected {
            operands.swap(0, 1);
        }
        Ok(Self::build_operator(operator, operands))
    }

    fn build_operator(operator: OperatorKind, operands: SmallVec<[Expression; 2]>) -> Self {
        let table = operands.iter().find_map(Expression::operator_table);
        Self::new(ExpressionNode::Operator(OperatorCall {
            operator,
            operands,
            table,
        }))
    }

    fn binary(operator: OperatorKind, left: Expression, right: Expression) -> Self {
        let mut operands = SmallVec::new();
        operands.push(left);
        operands.push(right);
        Self::build_operator(operator, operands)
    }

    fn unary(&self, operator: OperatorKind) -> Self {
        let mut operands = SmallVec::new();
        operands.push(self.clone());
        Self::build_operator(operator, operands)
    }

    /// `self == other`
    pub fn equals(&self, other: impl Into<Expression>) -> Self {
        Self::binary(OperatorKind::Eq, self.clone(), other.into())
    }

    /// `self != other`
    pub fn not_equals(&self, other: impl Into<Expression>) -> Self {
        Self::binary(OperatorKind::Ne, self.clone(), other.into())
    }

    /// `self < other`
    pub fn lt(&self, other: impl Into<Expression>) -> Self {
        Self::binary(OperatorKind::Lt, self.clone(), other.into())
    }

    /// `self <= other`
    pub fn le(&self, other: impl Into<Expression>) -> Self {
        Self::binary(OperatorKind::Le, self.clone(), other.into())
    }

    /// `self > other`
    pub fn gt(&self, other: impl Into<Expression>) -> Self {
        Self::binary(OperatorKind::Gt, self.clone(), other.into())
    }

    /// `self >= other`
    pub fn ge(&self, other: impl Into<Expression>) -> Self {
        Self::binary(OperatorKind::Ge, self.clone(), other.into())
    }

    /// `self // other`
    pub fn floordiv(&self, other: impl Into<Expression>) -> Self {
        Self::binary(OperatorKind::FloorDiv, self.clone(), other.into())
    }

    /// `self ** other`
    pub fn pow(&self, other: impl Into<Expression>) -> Self {
        Self::binary(OperatorKind::Pow, self.clone(), other.into())
    }

    /// `self @ other`
    pub fn matmul(&self, other: impl Into<Expression>) -> Self {
        Self::binary(OperatorKind::MatMul, self.clone(), other.into())
    }

    /// `~self`
    pub fn invert(&self) -> Self {
        self.unary(OperatorKind::Invert)
    }

    /// `+self`
    pub fn pos(&self) -> Self {
        self.unary(OperatorKind::Pos)
    }

    /// Whether evaluating this expression needs data
    ///
    /// Only literals, and list/map literals made of literals, are concrete.
    pub fn is_symbolic(&self) -> bool {
        match self.node() {
            ExpressionNode::Literal(_) => false,
            ExpressionNode::List(items) => items.iter().any(Expression::is_symbolic),
            ExpressionNode::Map(entries) => entries.values().any(Expression::is_symbolic),
            _ => true,
        }
    }

    /// The value of a literal node
    pub fn as_literal(&self) -> Option<&Value> {
        match self.node() {
            ExpressionNode::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Operator table the nodes built from this one inherit
    pub fn operator_table(&self) -> Option<Arc<dyn OperatorTable>> {
        match self.node() {
            ExpressionNode::Symbol(symbol) => symbol.operators.clone(),
            ExpressionNode::Attr(reference) => reference.parent.operator_table(),
            ExpressionNode::Item(reference) => reference.parent.operator_table(),
            ExpressionNode::Operator(call) => call.table.clone(),
            _ => None,
        }
    }

    /// Whether both handles point to the same node
    pub fn ptr_eq(&self, other: &Expression) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn precedence(&self) -> u8 {
        match self.node() {
            ExpressionNode::Operator(call) => call.operator.precedence(),
            ExpressionNode::Literal(value) => match value {
                Value::Integer(i) if *i < 0 => UNARY_PRECEDENCE,
                Value::Float(f) if f.is_sign_negative() => UNARY_PRECEDENCE,
                _ => ATOM_PRECEDENCE,
            },
            _ => ATOM_PRECEDENCE,
        }
    }

    /// References whose parent is the placeholder render without it
    fn is_top_level(&self) -> bool {
        matches!(self.node(), ExpressionNode::Symbol(_))
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expression({self})")
    }
}

fn write_operand(
    f: &mut fmt::Formatter<'_>,
    operand: &Expression,
    parenthesize: bool,
) -> fmt::Result {
    if parenthesize {
        write!(f, "({operand})")
    } else {
        write!(f, "{operand}")
    }
}

fn write_arguments(
    f: &mut fmt::Formatter<'_>,
    leading: Option<&str>,
    args: &Arguments<Expression>,
) -> fmt::Result {
    let mut parts: Vec<String> = leading.into_iter().map(str::to_string).collect();
    parts.extend(args.positional().iter().map(ToString::to_string));
    parts.extend(args.keyword().iter().map(|(key, value)| format!("{key}={value}")));
    write!(f, "({})", parts.join(", "))
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            ExpressionNode::Symbol(symbol) => f.write_str(&symbol.name),
            ExpressionNode::Literal(value) => write!(f, "{value}"),
            ExpressionNode::List(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            ExpressionNode::Map(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
            ExpressionNode::Attr(reference) => {
                if reference.parent.is_top_level() {
                    f.write_str(&reference.name)
                } else {
                    write!(f, "{}.{}", reference.parent, reference.name)
                }
            }
            ExpressionNode::Item(reference) => {
                if reference.parent.is_top_level() {
                    write!(f, "{}", reference.key)
                } else {
                    write!(f, "{}[{}]", reference.parent, reference.key)
                }
            }
            ExpressionNode::Operator(call) => {
                let op = call.operator;
                let precedence = op.precedence();
                if op.is_unary() {
                    f.write_str(op.symbol())?;
                    return write_operand(
                        f,
                        &call.operands[0],
                        call.operands[0].precedence() < UNARY_PRECEDENCE,
                    );
                }
                let (left, right) = (&call.operands[0], &call.operands[1]);
                // comparisons chain, so a nested comparison always needs parentheses
                let chained = precedence == 0;
                let left_parens = left.precedence() < precedence
                    || (left.precedence() == precedence
                        && (chained || op.associativity() == Associativity::Right));
                let right_parens = right.precedence() < precedence
                    || (right.precedence() == precedence
                        && (chained || op.associativity() == Associativity::Left));
                write_operand(f, left, left_parens)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, right_parens)
            }
            ExpressionNode::Function(call) => {
                match &call.callee {
                    Callee::Function(function) => f.write_str(function.name())?,
                    Callee::Verb(verb) => f.write_str(verb.name())?,
                    Callee::Expression(callee) => {
                        write_operand(f, callee, callee.precedence() != ATOM_PRECEDENCE)?
                    }
                }
                write_arguments(f, None, &call.args)
            }
            ExpressionNode::Verb(call) => {
                f.write_str(call.verb.name())?;
                let leading = (!call.verb.is_dependent()).then_some(".");
                write_arguments(f, leading, &call.args)
            }
        }
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        match value {
            Value::Expr(expr) => expr,
            other => Self::literal(other),
        }
    }
}

impl From<&Expression> for Expression {
    fn from(expr: &Expression) -> Self {
        expr.clone()
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Expression {
                fn from(value: $ty) -> Self {
                    Self::literal(value)
                }
            }
        )*
    };
}

literal_from!(bool, i32, i64, f64, &str, String);

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $kind:expr) => {
        impl<R: Into<Expression>> ops::$trait<R> for Expression {
            type Output = Expression;

            fn $method(self, rhs: R) -> Expression {
                Expression::binary($kind, self, rhs.into())
            }
        }

        impl<R: Into<Expression>> ops::$trait<R> for &Expression {
            type Output = Expression;

            fn $method(self, rhs: R) -> Expression {
                Expression::binary($kind, self.clone(), rhs.into())
            }
        }

        // `1 + x`: the reflected spelling, normalized to the left-handed operator
        reflected_operator!($trait, $method, $kind, i64, f64);
    };
}

macro_rules! reflected_operator {
    ($trait:ident, $method:ident, $kind:expr, $($lhs:ty),*) => {
        $(
            impl ops::$trait<Expression> for $lhs {
                type Output = Expression;

                fn $method(self, rhs: Expression) -> Expression {
                    Expression::binary($kind, Expression::from(self), rhs)
                }
            }

            impl ops::$trait<&Expression> for $lhs {
                type Output = Expression;

                fn $method(self, rhs: &Expression) -> Expression {
                    Expression::binary($kind, Expression::from(self), rhs.clone())
                }
            }
        )*
    };
}

binary_operator!(Add, add, OperatorKind::Add);
binary_operator!(Sub, sub, OperatorKind::Sub);
binary_operator!(Mul, mul, OperatorKind::Mul);
binary_operator!(Div, div, OperatorKind::TrueDiv);
binary_operator!(Rem, rem, OperatorKind::Mod);
binary_operator!(BitAnd, bitand, OperatorKind::BitAnd);
binary_operator!(BitOr, bitor, OperatorKind::BitOr);
binary_operator!(BitXor, bitxor, OperatorKind::BitXor);
binary_operator!(Shl, shl, OperatorKind::LShift);
binary_operator!(Shr, shr, OperatorKind::RShift);

impl ops::Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        self.unary(OperatorKind::Neg)
    }
}

impl ops::Neg for &Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        self.unary(OperatorKind::Neg)
    }
}

impl ops::Not for Expression {
    type Output = Expression;

    fn not(self) -> Expression {
        self.unary(OperatorKind::Invert)
    }
}

impl ops::Not for &Expression {
    type Output = Expression;

    fn not(self) -> Expression {
        self.unary(OperatorKind::Invert)
    }
}
