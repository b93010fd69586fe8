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

//! Named collection of registered functions and verbs

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::error::RegistrationError;
use super::function::Function;
use super::verb::Verb;

/// A descriptor stored in a [`Catalog`]
#[derive(Debug, Clone)]
pub enum Entry {
    /// A registered function
    Function(Arc<Function>),
    /// A registered verb
    Verb(Arc<Verb>),
}

impl Entry {
    /// Registered name
    pub fn name(&self) -> &str {
        match self {
            Entry::Function(function) => function.name(),
            Entry::Verb(verb) => verb.name(),
        }
    }
}

/// Descriptors by name
///
/// Functions and verbs share one namespace, as they would in a module.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: FxHashMap<String, Entry>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function; its name must be free
    pub fn add_function(&mut self, function: Arc<Function>) -> Result<Arc<Function>, RegistrationError> {
        self.insert(Entry::Function(function.clone()))?;
        Ok(function)
    }

    /// Add a verb; its name must be free
    pub fn add_verb(&mut self, verb: Arc<Verb>) -> Result<Arc<Verb>, RegistrationError> {
        self.insert(Entry::Verb(verb.clone()))?;
        Ok(verb)
    }

    fn insert(&mut self, entry: Entry) -> Result<(), RegistrationError> {
        let name = entry.name().to_string();
        if self.entries.contains_key(&name) {
            return Err(RegistrationError::already_registered(name));
        }
        log::debug!("Catalog entry `{}` added", name);
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Look up any descriptor
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Look up a function
    pub fn function(&self, name: &str) -> Option<&Arc<Function>> {
        match self.entries.get(name) {
            Some(Entry::Function(function)) => Some(function),
            _ => None,
        }
    }

    /// Look up a verb
    pub fn verb(&self, name: &str) -> Option<&Arc<Verb>> {
        match self.entries.get(name) {
            Some(Entry::Verb(verb)) => Some(verb),
            _ => None,
        }
    }

    /// Check if a name is taken
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove a descriptor, returning it
    pub fn remove(&mut self, name: &str) -> Option<Entry> {
        self.entries.remove(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of descriptors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
