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

//! Core value type that expressions are evaluated against

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

use super::arguments::CallArgs;
use super::types::{ClassInfo, TypeInfo};
use crate::ast::Expression;
use crate::evaluator::{EvaluationError, EvaluationResult};

/// Dynamically typed data
///
/// This is the data piped into verbs, the result of every evaluation and the
/// argument type of every implementation.
#[derive(Clone)]
pub enum Value {
    /// Absence of a value
    Null,

    /// Boolean value
    Boolean(bool),

    /// Integer value (64-bit signed)
    Integer(i64),

    /// Floating point value
    Float(f64),

    /// String value
    String(String),

    /// Ordered list of values
    List(Vec<Value>),

    /// Insertion ordered map with string keys
    Map(IndexMap<String, Value>),

    /// Value tagged with a user-declared class
    Instance(Instance),

    /// Host function, usually a method bound to a receiver
    Callable(Callable),

    /// Expression handed over without evaluation
    Expr(Expression),
}

/// A value tagged with a user class
///
/// Lookups delegate to the wrapped value, dispatch sees the class.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    class: Arc<ClassInfo>,
    value: Box<Value>,
}

impl Instance {
    /// Tag `value` with `class`
    pub fn new(class: Arc<ClassInfo>, value: Value) -> Self {
        Self {
            class,
            value: Box::new(value),
        }
    }

    /// The declared class
    pub fn class(&self) -> &Arc<ClassInfo> {
        &self.class
    }

    /// The wrapped value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Unwrap the inner value
    pub fn into_value(self) -> Value {
        *self.value
    }
}

type CallableFn = dyn Fn(CallArgs) -> EvaluationResult<Value> + Send + Sync;

/// Named host function
#[derive(Clone)]
pub struct Callable {
    name: Arc<str>,
    func: Arc<CallableFn>,
}

impl Callable {
    /// Wrap a closure
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(CallArgs) -> EvaluationResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Name used in messages
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function
    pub fn call(&self, args: CallArgs) -> EvaluationResult<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<callable {}>", self.name)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl Value {
    /// Build a map from key/value pairs
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Build a list from values
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Tag a value with a user class
    pub fn instance(class: Arc<ClassInfo>, value: Value) -> Self {
        Self::Instance(Instance::new(class, value))
    }

    /// Runtime type used for dispatch
    pub fn type_info(&self) -> TypeInfo {
        match self {
            Self::Null => TypeInfo::Null,
            Self::Boolean(_) => TypeInfo::Boolean,
            Self::Integer(_) => TypeInfo::Integer,
            Self::Float(_) => TypeInfo::Float,
            Self::String(_) => TypeInfo::String,
            Self::List(_) => TypeInfo::List,
            Self::Map(_) => TypeInfo::Map,
            Self::Instance(instance) => TypeInfo::Class(instance.class.clone()),
            Self::Callable(_) => TypeInfo::Callable,
            Self::Expr(_) => TypeInfo::Expression,
        }
    }

    /// Get the type name for this value
    pub fn type_name(&self) -> String {
        self.type_info().name().to_string()
    }

    /// Strip user class tags
    pub fn unwrap_instance(&self) -> &Value {
        match self {
            Self::Instance(instance) => instance.value().unwrap_instance(),
            other => other,
        }
    }

    /// Try to convert to an integer (booleans count as integers)
    pub fn as_integer(&self) -> Option<i64> {
        match self.unwrap_instance() {
            Self::Integer(i) => Some(*i),
            Self::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Try to convert to a float (integers and booleans are widened)
    pub fn as_float(&self) -> Option<f64> {
        match self.unwrap_instance() {
            Self::Float(f) => Some(*f),
            other => other.as_integer().map(|i| i as f64),
        }
    }

    /// Try to convert to a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self.unwrap_instance() {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self.unwrap_instance() {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to view as a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self.unwrap_instance() {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Try to view as a map
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self.unwrap_instance() {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Try to view as an unevaluated expression
    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            Self::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    /// Truthiness: empty containers, zero and null are false
    pub fn is_truthy(&self) -> bool {
        match self.unwrap_instance() {
            Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
            _ => true,
        }
    }

    /// Iterate over the elements of a container
    ///
    /// Lists yield their items, maps their keys, strings their characters.
    /// An unevaluated expression is rejected: iterating one almost always means
    /// it was used as an argument of a plain call instead of being piped.
    pub fn try_iter(&self) -> EvaluationResult<Box<dyn Iterator<Item = Value> + '_>> {
        match self.unwrap_instance() {
            Self::List(items) => Ok(Box::new(items.iter().cloned())),
            Self::Map(entries) => Ok(Box::new(entries.keys().cloned().map(Value::String))),
            Self::String(s) => Ok(Box::new(s.chars().map(|c| Value::String(c.to_string())))),
            Self::Expr(expr) => Err(EvaluationError::IterateExpression {
                expression: expr.to_string(),
            }),
            other => Err(EvaluationError::NotIterable {
                type_name: other.type_name(),
            }),
        }
    }

    /// Resolve `self.name` against concrete data
    ///
    /// Map keys take precedence over builtin methods.
    pub fn get_attribute(&self, name: &str) -> EvaluationResult<Value> {
        if let Some(entries) = self.as_map() {
            if let Some(value) = entries.get(name) {
                return Ok(value.clone());
            }
        }
        self.method(name)
            .map(Value::Callable)
            .ok_or_else(|| EvaluationError::AttributeNotFound {
                attribute: name.to_string(),
                type_name: self.type_name(),
            })
    }

    /// Resolve `self[key]` against concrete data
    pub fn get_item(&self, key: &Value) -> EvaluationResult<Value> {
        match (self.unwrap_instance(), key.unwrap_instance()) {
            (Self::Map(entries), Self::String(k)) => {
                entries
                    .get(k)
                    .cloned()
                    .ok_or_else(|| EvaluationError::KeyNotFound { key: k.clone() })
            }
            (Self::List(items), index) if index.as_integer().is_some() => {
                let index = index.as_integer().unwrap_or_default();
                resolve_index(index, items.len()).map(|i| items[i].clone())
            }
            (Self::String(s), index) if index.as_integer().is_some() => {
                let index = index.as_integer().unwrap_or_default();
                let chars: Vec<char> = s.chars().collect();
                resolve_index(index, chars.len()).map(|i| Value::String(chars[i].to_string()))
            }
            (container, key) => Err(EvaluationError::NotSubscriptable {
                type_name: container.type_name(),
                key_type: key.type_name(),
            }),
        }
    }

    /// Builtin method bound to this value
    pub fn method(&self, name: &str) -> Option<Callable> {
        let receiver = self.unwrap_instance().clone();
        let supported = match (&receiver, name) {
            (Self::String(_) | Self::List(_) | Self::Map(_), "len") => true,
            (Self::String(_), "upper" | "lower" | "strip") => true,
            (Self::Map(_), "keys" | "values" | "get") => true,
            _ => false,
        };
        if !supported {
            return None;
        }
        let method = name.to_string();
        Some(Callable::new(
            format!("{}.{}", receiver.type_name(), name),
            move |args| call_builtin_method(&receiver, &method, args),
        ))
    }
}

fn resolve_index(index: i64, len: usize) -> EvaluationResult<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvaluationError::IndexOutOfBounds { index, size: len });
    }
    Ok(resolved as usize)
}

fn call_builtin_method(receiver: &Value, method: &str, args: CallArgs) -> EvaluationResult<Value> {
    match (receiver, method) {
        (Value::String(s), "len") => Ok(Value::Integer(s.chars().count() as i64)),
        (Value::List(items), "len") => Ok(Value::Integer(items.len() as i64)),
        (Value::Map(entries), "len") => Ok(Value::Integer(entries.len() as i64)),
        (Value::String(s), "upper") => Ok(Value::String(s.to_uppercase())),
        (Value::String(s), "lower") => Ok(Value::String(s.to_lowercase())),
        (Value::String(s), "strip") => Ok(Value::String(s.trim().to_string())),
        (Value::Map(entries), "keys") => Ok(Value::list(entries.keys().cloned())),
        (Value::Map(entries), "values") => Ok(Value::List(entries.values().cloned().collect())),
        (Value::Map(entries), "get") => {
            let key = args
                .lookup(0, "key")
                .and_then(Value::as_str)
                .ok_or_else(|| EvaluationError::Implementation {
                    name: "Map.get".to_string(),
                    message: "expects a string key".to_string(),
                })?;
            let default = args.lookup(1, "default").cloned().unwrap_or(Value::Null);
            Ok(entries.get(key).cloned().unwrap_or(default))
        }
        _ => Err(EvaluationError::AttributeNotFound {
            attribute: method.to_string(),
            type_name: receiver.type_name(),
        }),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Integer(a), Self::Float(b)) | (Self::Float(b), Self::Integer(a)) => {
                (*a as f64) == *b
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Instance(a), Self::Instance(b)) => a == b,
            (Self::Callable(a), Self::Callable(b)) => a == b,
            (Self::Expr(a), Self::Expr(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Boolean(b) => write!(f, "Boolean({b})"),
            Self::Integer(i) => write!(f, "Integer({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Self::Instance(instance) => f
                .debug_tuple(instance.class.name())
                .field(instance.value())
                .finish(),
            Self::Callable(callable) => write!(f, "{callable:?}"),
            Self::Expr(expr) => write!(f, "Expr({expr})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Self::Instance(instance) => write!(f, "{}", instance.value()),
            Self::Callable(callable) => write!(f, "{}", callable.name()),
            Self::Expr(expr) => write!(f, "{expr}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::List(values)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Self::Map(entries)
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Self::Callable(callable)
    }
}

/// Convert from serde_json::Value to Value
impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Boolean(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Value {
    /// Convert to JSON; callables and expressions become their display strings
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::Integer(i) => JsonValue::from(*i),
            Self::Float(x) => JsonValue::from(*x),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Self::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Self::Instance(instance) => instance.value().to_json(),
            Self::Callable(_) | Self::Expr(_) => JsonValue::String(self.to_string()),
        }
    }
}
