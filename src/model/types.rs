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

//! Runtime type information used as the dispatch key

use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Runtime type of a [`Value`](super::Value)
///
/// Every type has a single-inheritance ancestor chain ending in [`TypeInfo::Any`].
/// Dispatch walks that chain from the most specific entry to the least specific one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeInfo {
    /// Root of every chain; an implementation registered for `Any` is a generic default
    Any,
    /// The null value
    Null,
    /// Boolean value, a subtype of `Integer`
    Boolean,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
    /// UTF-8 string
    String,
    /// Ordered list of values
    List,
    /// Insertion ordered string-keyed map
    Map,
    /// Host closure
    Callable,
    /// Unevaluated expression
    Expression,
    /// User-declared class
    Class(Arc<ClassInfo>),
}

/// A user-declared class with a single base type
#[derive(Debug)]
pub struct ClassInfo {
    name: String,
    base: TypeInfo,
}

impl ClassInfo {
    /// Declare a class deriving from `base`
    pub fn new(name: impl Into<String>, base: TypeInfo) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            base,
        })
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct base type
    pub fn base(&self) -> &TypeInfo {
        &self.base
    }
}

// Classes compare by declaration identity, two classes sharing a name are still distinct.
impl PartialEq for ClassInfo {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for ClassInfo {}

impl Hash for ClassInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl TypeInfo {
    /// Direct parent in the ancestor chain, `None` for `Any`
    pub fn parent(&self) -> Option<TypeInfo> {
        match self {
            TypeInfo::Any => None,
            TypeInfo::Boolean => Some(TypeInfo::Integer),
            TypeInfo::Class(class) => Some(class.base.clone()),
            _ => Some(TypeInfo::Any),
        }
    }

    /// Ancestor chain from `self` (inclusive) to `Any` (inclusive)
    pub fn ancestors(&self) -> SmallVec<[TypeInfo; 4]> {
        let mut chain = SmallVec::new();
        let mut current = Some(self.clone());
        while let Some(ty) = current {
            current = ty.parent();
            chain.push(ty);
        }
        chain
    }

    /// Whether `self` is `other` or derives from it
    pub fn is_subtype_of(&self, other: &TypeInfo) -> bool {
        self.ancestors().iter().any(|ty| ty == other)
    }

    /// Display name of the type
    pub fn name(&self) -> &str {
        match self {
            TypeInfo::Any => "Any",
            TypeInfo::Null => "Null",
            TypeInfo::Boolean => "Boolean",
            TypeInfo::Integer => "Integer",
            TypeInfo::Float => "Float",
            TypeInfo::String => "String",
            TypeInfo::List => "List",
            TypeInfo::Map => "Map",
            TypeInfo::Callable => "Callable",
            TypeInfo::Expression => "Expression",
            TypeInfo::Class(class) => class.name(),
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
