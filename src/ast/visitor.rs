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

//! Visitor pattern for expression traversal

use indexmap::IndexSet;

use super::expression::{
    Callee, Expression, ExpressionNode, FunctionCall, OperatorCall, ReferenceAttr, ReferenceItem,
    Symbol, VerbCall,
};
use crate::model::{Arguments, Value};

/// Trait for visiting expression nodes
///
/// Every method defaults to visiting the node's children, so an implementation
/// only overrides the nodes it cares about.
pub trait Visitor: Sized {
    /// Visit an expression
    fn visit_expression(&mut self, expr: &Expression) {
        walk_expression(self, expr)
    }

    /// Visit the placeholder
    fn visit_symbol(&mut self, _symbol: &Symbol) {}

    /// Visit a literal
    fn visit_literal(&mut self, _value: &Value) {}

    /// Visit an attribute reference
    fn visit_attr(&mut self, reference: &ReferenceAttr) {
        self.visit_expression(reference.parent());
    }

    /// Visit an item reference
    fn visit_item(&mut self, reference: &ReferenceItem) {
        self.visit_expression(reference.parent());
        self.visit_expression(reference.key());
    }

    /// Visit an operator node
    fn visit_operator(&mut self, call: &OperatorCall) {
        for operand in call.operands() {
            self.visit_expression(operand);
        }
    }

    /// Visit a function call
    fn visit_function_call(&mut self, call: &FunctionCall) {
        if let Callee::Expression(callee) = call.callee() {
            self.visit_expression(callee);
        }
        walk_arguments(self, call.args());
    }

    /// Visit a verb call
    fn visit_verb_call(&mut self, call: &VerbCall) {
        walk_arguments(self, call.args());
    }
}

/// Default implementation of walking an expression tree
pub fn walk_expression<V: Visitor>(visitor: &mut V, expr: &Expression) {
    match expr.node() {
        ExpressionNode::Symbol(symbol) => visitor.visit_symbol(symbol),
        ExpressionNode::Literal(value) => visitor.visit_literal(value),
        ExpressionNode::List(items) => {
            for item in items {
                visitor.visit_expression(item);
            }
        }
        ExpressionNode::Map(entries) => {
            for value in entries.values() {
                visitor.visit_expression(value);
            }
        }
        ExpressionNode::Attr(reference) => visitor.visit_attr(reference),
        ExpressionNode::Item(reference) => visitor.visit_item(reference),
        ExpressionNode::Operator(call) => visitor.visit_operator(call),
        ExpressionNode::Function(call) => visitor.visit_function_call(call),
        ExpressionNode::Verb(call) => visitor.visit_verb_call(call),
    }
}

/// Visit every call argument, positional first
pub fn walk_arguments<V: Visitor>(visitor: &mut V, args: &Arguments<Expression>) {
    for arg in args.iter() {
        visitor.visit_expression(arg);
    }
}

/// Collects the names referenced directly on the placeholder
///
/// `f.x + f["y"] * f.z.w` references `x`, `y` and `z`. Item keys that are not
/// literal strings are skipped.
#[derive(Debug, Default)]
pub struct ReferenceCollector {
    names: IndexSet<String>,
}

impl ReferenceCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Names in first-seen order
    pub fn into_names(self) -> Vec<String> {
        self.names.into_iter().collect()
    }
}

fn is_placeholder(expr: &Expression) -> bool {
    matches!(expr.node(), ExpressionNode::Symbol(_))
}

impl Visitor for ReferenceCollector {
    fn visit_attr(&mut self, reference: &ReferenceAttr) {
        if is_placeholder(reference.parent()) {
            self.names.insert(reference.name().to_string());
        }
        self.visit_expression(reference.parent());
    }

    fn visit_item(&mut self, reference: &ReferenceItem) {
        if is_placeholder(reference.parent()) {
            if let Some(Value::String(key)) = reference.key().as_literal() {
                self.names.insert(key.clone());
            }
        }
        self.visit_expression(reference.parent());
        self.visit_expression(reference.key());
    }
}

/// Names referenced directly on the placeholder anywhere in `expr`
pub fn collect_references(expr: &Expression) -> Vec<String> {
    let mut collector = ReferenceCollector::new();
    collector.visit_expression(expr);
    collector.into_names()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collect_references() {
        let f = Expression::symbol("f");
        let expr = f.attr("x") + f.item("y") * f.attr("z").attr("w") - f.attr("x");
        assert_eq!(collect_references(&expr), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_collect_inside_calls_and_keys() {
        let f = Expression::symbol("f");
        let call = f
            .attr("col")
            .attr("get")
            .call(Arguments::new().arg(f.attr("key")).kwarg("default", f.item(f.attr("k"))));
        assert_eq!(collect_references(&call), vec!["col", "key", "k"]);
    }

    #[derive(Default)]
    struct LiteralCounter(usize);

    impl Visitor for LiteralCounter {
        fn visit_literal(&mut self, _value: &Value) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_default_walk_reaches_leaves() {
        let f = Expression::symbol("f");
        let expr = Expression::list([f.attr("a") + 1, Expression::literal(2)]);
        let mut counter = LiteralCounter::default();
        counter.visit_expression(&expr);
        assert_eq!(counter.0, 2);
    }
}
