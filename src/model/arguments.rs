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

//! Positional and keyword argument lists

use indexmap::IndexMap;

/// Positional and keyword arguments of a call
///
/// The same container is used for the arguments written at a call site
/// (`Arguments<Expression>`) and for the values handed to an implementation
/// (`Arguments<Value>`, aliased as [`CallArgs`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Arguments<T> {
    positional: Vec<T>,
    keyword: IndexMap<String, T>,
}

/// Arguments as received by an implementation
pub type CallArgs = Arguments<super::Value>;

impl<T> Default for Arguments<T> {
    fn default() -> Self {
        Self {
            positional: Vec::new(),
            keyword: IndexMap::new(),
        }
    }
}

impl<T> Arguments<T> {
    /// Create an empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from already collected parts
    pub fn from_parts(positional: Vec<T>, keyword: IndexMap<String, T>) -> Self {
        Self {
            positional,
            keyword,
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<T>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<T>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Positional arguments in call order
    pub fn positional(&self) -> &[T] {
        &self.positional
    }

    /// Keyword arguments in call order
    pub fn keyword(&self) -> &IndexMap<String, T> {
        &self.keyword
    }

    /// Positional argument at `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        self.positional.get(index)
    }

    /// Keyword argument by name
    pub fn get_kwarg(&self, name: &str) -> Option<&T> {
        self.keyword.get(name)
    }

    /// Positional argument at `index`, or the keyword argument `name`
    pub fn lookup(&self, index: usize, name: &str) -> Option<&T> {
        self.positional.get(index).or_else(|| self.keyword.get(name))
    }

    /// Total number of arguments
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    /// Whether there are no arguments at all
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Iterate over every argument, positional first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.positional.iter().chain(self.keyword.values())
    }

    /// Split off the first positional argument
    pub fn split_first(mut self) -> (Option<T>, Self) {
        if self.positional.is_empty() {
            return (None, self);
        }
        let first = self.positional.remove(0);
        (Some(first), self)
    }

    /// Prepend a positional argument
    pub fn with_first(mut self, value: T) -> Self {
        self.positional.insert(0, value);
        self
    }

    /// Decompose into positional and keyword parts
    pub fn into_parts(self) -> (Vec<T>, IndexMap<String, T>) {
        (self.positional, self.keyword)
    }

    /// Convert every argument, stopping at the first error
    pub fn try_map<U, E>(
        &self,
        mut positional: impl FnMut(usize, &T) -> Result<U, E>,
        mut keyword: impl FnMut(&str, &T) -> Result<U, E>,
    ) -> Result<Arguments<U>, E> {
        let positional = self
            .positional
            .iter()
            .enumerate()
            .map(|(index, value)| positional(index, value))
            .collect::<Result<Vec<_>, _>>()?;
        let keyword = self
            .keyword
            .iter()
            .map(|(name, value)| Ok((name.clone(), keyword(name, value)?)))
            .collect::<Result<IndexMap<_, _>, E>>()?;
        Ok(Arguments {
            positional,
            keyword,
        })
    }
}
