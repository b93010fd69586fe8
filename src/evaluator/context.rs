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

//! Evaluation contexts
//!
//! A context decides how `x.name` and `x[key]` resolve against concrete data:
//!
//! 1. under [`Context::SELECT`] both return the name/key itself
//! 2. under [`Context::EVAL`] they perform a real lookup on the data
//! 3. under [`Context::PENDING`] resolution fails; the implementation receives
//!    its arguments unevaluated and evaluates them itself
//! 4. under [`Context::MIXED`] positional arguments are selected and keyword
//!    arguments are evaluated

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::error::EvaluationResult;
use crate::model::Value;

/// Errors raised when a reference cannot be resolved in the current context
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextError {
    /// No context was supplied by the time a reference was evaluated
    #[error("Cannot evaluate `{node}` without a context")]
    Unresolved {
        /// Display form of the reference
        node: String,
    },

    /// Resolution attempted under the pending context
    #[error("Cannot resolve `{operation}` under the pending context")]
    Pending {
        /// The attempted access
        operation: String,
    },

    /// The context does not define the requested access
    #[error("Context `{context}` does not support `{operation}`")]
    Unsupported {
        /// Context name
        context: String,
        /// The attempted access
        operation: String,
    },
}

/// Behaviour of a user-defined context
///
/// Subordinate contexts default to the context itself.
pub trait ContextBase: Send + Sync + fmt::Debug {
    /// Name used in messages
    fn name(&self) -> &str;

    /// Resolve `parent.name`; `current` carries the meta entries in effect
    fn getattr(&self, current: &Context, parent: &Value, name: &str) -> EvaluationResult<Value>;

    /// Resolve `parent[key]`, the key already evaluated under [`ContextBase::ref_context`]
    fn getitem(&self, current: &Context, parent: &Value, key: &Value) -> EvaluationResult<Value>;

    /// Context used to evaluate item keys
    fn ref_context(&self) -> Option<Context> {
        None
    }

    /// Context used for positional arguments
    fn args_context(&self) -> Option<Context> {
        None
    }

    /// Context used for keyword arguments
    fn kwargs_context(&self) -> Option<Context> {
        None
    }

    /// Whether arguments should be handed over unevaluated
    fn is_pending(&self) -> bool {
        false
    }
}

/// The closed set of builtin contexts plus an escape hatch for custom ones
#[derive(Clone, Debug)]
pub enum ContextKind {
    /// References resolve to their own names
    Select,
    /// References resolve against the data
    Eval,
    /// References are not resolved at all
    Pending,
    /// Positional arguments selected, keyword arguments evaluated
    Mixed,
    /// User-defined behaviour
    Custom(Arc<dyn ContextBase>),
}

impl PartialEq for ContextKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Select, Self::Select)
            | (Self::Eval, Self::Eval)
            | (Self::Pending, Self::Pending)
            | (Self::Mixed, Self::Mixed) => true,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Auxiliary values passed down the tree alongside the context
pub type ContextMeta = IndexMap<String, Value>;

/// An evaluation context plus its meta information
///
/// Contexts are immutable; [`Context::with_meta`] and [`Context::inherit_meta`]
/// return new values.
#[derive(Clone, Debug, PartialEq)]
pub struct Context {
    kind: ContextKind,
    meta: Option<Arc<ContextMeta>>,
}

impl Context {
    /// `x.a` is `"a"`, `x["a"]` is `"a"`
    pub const SELECT: Context = Context::from_kind(ContextKind::Select);
    /// `x.a` is `data.a`, `x["a"]` is `data["a"]`
    pub const EVAL: Context = Context::from_kind(ContextKind::Eval);
    /// Arguments are passed to the implementation unevaluated
    pub const PENDING: Context = Context::from_kind(ContextKind::Pending);
    /// Positional arguments under `SELECT`, keyword arguments under `EVAL`
    pub const MIXED: Context = Context::from_kind(ContextKind::Mixed);

    const fn from_kind(kind: ContextKind) -> Self {
        Self { kind, meta: None }
    }

    /// Wrap a user-defined context
    pub fn custom(context: impl ContextBase + 'static) -> Self {
        Self::from_kind(ContextKind::Custom(Arc::new(context)))
    }

    /// The kind of this context
    pub fn kind(&self) -> &ContextKind {
        &self.kind
    }

    /// Name used in messages
    pub fn name(&self) -> &str {
        match &self.kind {
            ContextKind::Select => "select",
            ContextKind::Eval => "eval",
            ContextKind::Pending => "pending",
            ContextKind::Mixed => "mixed",
            ContextKind::Custom(custom) => custom.name(),
        }
    }

    /// Whether arguments must be handed over unevaluated
    pub fn is_pending(&self) -> bool {
        match &self.kind {
            ContextKind::Pending => true,
            ContextKind::Custom(custom) => custom.is_pending(),
            _ => false,
        }
    }

    /// Resolve `parent.name`
    pub fn getattr(&self, parent: &Value, name: &str) -> EvaluationResult<Value> {
        match &self.kind {
            ContextKind::Select => Ok(Value::String(name.to_string())),
            ContextKind::Eval => parent.get_attribute(name),
            ContextKind::Pending => Err(ContextError::Pending {
                operation: format!(".{name}"),
            }
            .into()),
            ContextKind::Mixed => Err(ContextError::Unsupported {
                context: self.name().to_string(),
                operation: format!(".{name}"),
            }
            .into()),
            ContextKind::Custom(custom) => custom.getattr(self, parent, name),
        }
    }

    /// Resolve `parent[key]`
    pub fn getitem(&self, parent: &Value, key: &Value) -> EvaluationResult<Value> {
        match &self.kind {
            ContextKind::Select => Ok(key.clone()),
            ContextKind::Eval => parent.get_item(key),
            ContextKind::Pending => Err(ContextError::Pending {
                operation: format!("[{key}]"),
            }
            .into()),
            ContextKind::Mixed => Err(ContextError::Unsupported {
                context: self.name().to_string(),
                operation: format!("[{key}]"),
            }
            .into()),
            ContextKind::Custom(custom) => custom.getitem(self, parent, key),
        }
    }

    /// Context used to evaluate item keys
    pub fn ref_context(&self) -> Context {
        match &self.kind {
            ContextKind::Custom(custom) => self.subordinate(custom.ref_context()),
            _ => self.clone(),
        }
    }

    /// Context used to evaluate positional arguments
    pub fn args_context(&self) -> Context {
        match &self.kind {
            ContextKind::Mixed => self.subordinate(Some(Context::SELECT)),
            ContextKind::Custom(custom) => self.subordinate(custom.args_context()),
            _ => self.clone(),
        }
    }

    /// Context used to evaluate keyword arguments
    pub fn kwargs_context(&self) -> Context {
        match &self.kind {
            ContextKind::Mixed => self.subordinate(Some(Context::EVAL)),
            ContextKind::Custom(custom) => self.subordinate(custom.kwargs_context()),
            _ => self.clone(),
        }
    }

    fn subordinate(&self, context: Option<Context>) -> Context {
        match context {
            Some(context) => context.inherit_meta(Some(self)),
            None => self.clone(),
        }
    }

    /// Meta value by key
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.as_ref().and_then(|meta| meta.get(key))
    }

    /// All meta entries
    pub fn meta_entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.meta.iter().flat_map(|meta| meta.iter())
    }

    /// A copy of this context with one more meta entry
    pub fn with_meta(&self, key: impl Into<String>, value: impl Into<Value>) -> Context {
        let mut meta = self.meta.as_deref().cloned().unwrap_or_default();
        meta.insert(key.into(), value.into());
        Context {
            kind: self.kind.clone(),
            meta: Some(Arc::new(meta)),
        }
    }

    /// Copy the meta entries of `parent` that this context does not define
    pub fn inherit_meta(self, parent: Option<&Context>) -> Context {
        let Some(parent_meta) = parent.and_then(|p| p.meta.as_ref()) else {
            return self;
        };
        let merged = match &self.meta {
            None => parent_meta.clone(),
            Some(own) if Arc::ptr_eq(own, parent_meta) => return self,
            Some(own) => {
                let mut merged = (**parent_meta).clone();
                merged.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
                Arc::new(merged)
            }
        };
        Context {
            kind: self.kind,
            meta: Some(merged),
        }
    }

    /// Whether both contexts have the same behaviour, ignoring meta
    pub fn same_kind(&self, other: &Context) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
