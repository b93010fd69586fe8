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

//! Type-directed dispatch with named backends
//!
//! Each registered name owns one [`DispatchTable`]: an ordered map from backend
//! name to a type-indexed map of implementations. Resolution walks the ancestor
//! chain of the runtime type, so the most specific registration of a backend
//! wins within that backend.
//!
//! Without an explicit backend every backend is consulted, newest first.
//! Favored registrations take precedence over every non-favored match
//! regardless of backend order. If the winning tier still holds more than one
//! distinct implementation the newest backend is used and the ambiguity is
//! reported according to [`AmbiguityPolicy`].

use indexmap::IndexMap;
use std::sync::Arc;

use super::config::{AmbiguityPolicy, DispatchConfig};
use super::error::{DispatchError, RegistrationError};
use crate::evaluator::Context;
use crate::model::TypeInfo;

/// Per-parameter contexts of a registration
pub type ExtraContexts = IndexMap<String, Context>;

/// One implementation together with how its arguments are evaluated
pub struct Registration<F: ?Sized> {
    /// The implementation
    pub implementation: Arc<F>,
    /// Context for its arguments, `None` to inherit
    pub context: Option<Context>,
    /// Contexts for individual parameters
    pub extra_contexts: ExtraContexts,
    /// Whether it takes precedence over non-favored matches of other backends
    pub favored: bool,
}

impl<F: ?Sized> Clone for Registration<F> {
    fn clone(&self) -> Self {
        Self {
            implementation: self.implementation.clone(),
            context: self.context.clone(),
            extra_contexts: self.extra_contexts.clone(),
            favored: self.favored,
        }
    }
}

/// Outcome of resolving a type
pub struct Resolution<F: ?Sized> {
    /// The chosen implementation
    pub implementation: Arc<F>,
    /// Its context, `None` to inherit
    pub context: Option<Context>,
    /// Its per-parameter contexts
    pub extra_contexts: ExtraContexts,
    /// Backend it came from, `None` for the descriptor default
    pub backend: Option<String>,
    /// Backends that matched equally well, newest first; empty unless ambiguous
    pub ambiguous: Vec<String>,
}

impl<F: ?Sized> Resolution<F> {
    fn new(registration: &Registration<F>, backend: Option<String>) -> Self {
        Self {
            implementation: registration.implementation.clone(),
            context: registration.context.clone(),
            extra_contexts: registration.extra_contexts.clone(),
            backend,
            ambiguous: Vec::new(),
        }
    }

    /// Whether several backends competed for the call
    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguous.is_empty()
    }
}

/// Dispatch table of one registered name
pub struct DispatchTable<F: ?Sized> {
    name: String,
    config: DispatchConfig,
    backends: IndexMap<String, IndexMap<TypeInfo, Registration<F>>>,
    default: Option<Registration<F>>,
}

impl<F: ?Sized> DispatchTable<F> {
    /// Create a table whose fallback is `default`, or "not implemented" when `None`
    pub fn new(
        name: impl Into<String>,
        config: DispatchConfig,
        default: Option<Registration<F>>,
    ) -> Self {
        let mut backends = IndexMap::new();
        backends.insert(config.default_backend.clone(), IndexMap::new());
        Self {
            name: name.into(),
            config,
            backends,
            default,
        }
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration in effect
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Backend names in registration order
    pub fn backends(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    /// Types registered with `backend`
    pub fn registered_types(&self, backend: &str) -> Vec<TypeInfo> {
        self.backends
            .get(backend)
            .map(|types| types.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any implementation was registered for a specific type
    pub fn has_typed_registrations(&self) -> bool {
        self.backends.values().any(|types| !types.is_empty())
    }

    /// Whether a descriptor-level default exists
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Add `registration` for every type in `types` under `backend`
    ///
    /// A later registration for the same backend and type replaces the earlier one.
    pub fn register(
        &mut self,
        types: &[TypeInfo],
        backend: Option<&str>,
        registration: Registration<F>,
    ) -> Result<(), RegistrationError> {
        if types.is_empty() {
            return Err(RegistrationError::EmptyTypeList {
                name: self.name.clone(),
            });
        }
        let backend = backend.unwrap_or(&self.config.default_backend).to_string();
        let table = self.backends.entry(backend.clone()).or_default();
        for ty in types {
            log::debug!(
                "Registering `{}` for {} (backend: {}, favored: {})",
                self.name,
                ty,
                backend,
                registration.favored
            );
            table.insert(ty.clone(), registration.clone());
        }
        Ok(())
    }

    fn lookup<'a>(
        types: &'a IndexMap<TypeInfo, Registration<F>>,
        ty: &TypeInfo,
    ) -> Option<&'a Registration<F>> {
        ty.ancestors().iter().find_map(|ancestor| types.get(ancestor))
    }

    fn fallback(&self, ty: &TypeInfo) -> Result<Resolution<F>, DispatchError> {
        match &self.default {
            Some(default) => Ok(Resolution::new(default, None)),
            None => Err(DispatchError::not_implemented(&self.name, ty.name())),
        }
    }

    /// Pick the implementation for `ty`
    pub fn resolve(
        &self,
        ty: &TypeInfo,
        backend: Option<&str>,
    ) -> Result<Resolution<F>, DispatchError> {
        match backend {
            Some(backend) => self.resolve_in(ty, backend),
            None => self.resolve_any(ty),
        }
    }

    fn resolve_in(&self, ty: &TypeInfo, backend: &str) -> Result<Resolution<F>, DispatchError> {
        let types = self
            .backends
            .get(backend)
            .ok_or_else(|| DispatchError::UnknownBackend {
                name: self.name.clone(),
                backend: backend.to_string(),
            })?;
        if let Some(registration) = Self::lookup(types, ty) {
            log::debug!("Dispatching `{}` for {} to backend {}", self.name, ty, backend);
            return Ok(Resolution::new(registration, Some(backend.to_string())));
        }
        if backend == self.config.default_backend {
            return self.fallback(ty);
        }
        Err(DispatchError::not_implemented(&self.name, ty.name()))
    }

    fn resolve_any(&self, ty: &TypeInfo) -> Result<Resolution<F>, DispatchError> {
        let mut favored: Vec<(&str, &Registration<F>)> = Vec::new();
        let mut regular: Vec<(&str, &Registration<F>)> = Vec::new();
        for (backend, types) in self.backends.iter().rev() {
            if let Some(registration) = Self::lookup(types, ty) {
                if registration.favored {
                    favored.push((backend.as_str(), registration));
                } else {
                    regular.push((backend.as_str(), registration));
                }
            }
        }
        if self.config.default_is_candidate {
            if let Some(default) = &self.default {
                regular.push((self.config.default_backend.as_str(), default));
            }
        }

        let tier = if favored.is_empty() { regular } else { favored };
        let Some(&(backend, chosen)) = tier.first() else {
            log::debug!("No registration of `{}` matches {}, using the default", self.name, ty);
            return self.fallback(ty);
        };

        let mut distinct: Vec<&Arc<F>> = Vec::new();
        for (_, registration) in &tier {
            if !distinct
                .iter()
                .any(|seen| Arc::ptr_eq(seen, &registration.implementation))
            {
                distinct.push(&registration.implementation);
            }
        }

        let mut resolution = Resolution::new(chosen, Some(backend.to_string()));
        if distinct.len() > 1 {
            let backends: Vec<String> = tier.iter().map(|(b, _)| b.to_string()).collect();
            match self.config.ambiguity {
                AmbiguityPolicy::Error => {
                    return Err(DispatchError::Ambiguous {
                        name: self.name.clone(),
                        type_name: ty.name().to_string(),
                        backends,
                    });
                }
                AmbiguityPolicy::Warn => log::warn!(
                    "Multiple implementations found for `{}` by backends: [{}], \
                     register with more specific types or choose a backend",
                    self.name,
                    backends.join(", ")
                ),
                AmbiguityPolicy::Silent => {}
            }
            resolution.ambiguous = backends;
        }
        log::debug!("Dispatching `{}` for {} to backend {}", self.name, ty, backend);
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassInfo;
    use pretty_assertions::assert_eq;

    type Impl = dyn Fn() -> &'static str + Send + Sync;

    fn reg(label: &'static str, favored: bool) -> Registration<Impl> {
        Registration {
            implementation: Arc::new(move || label),
            context: None,
            extra_contexts: ExtraContexts::new(),
            favored,
        }
    }

    fn resolve(table: &DispatchTable<Impl>, ty: TypeInfo, backend: Option<&str>) -> &'static str {
        (table.resolve(&ty, backend).unwrap().implementation)()
    }

    #[test]
    fn test_most_specific_type_wins() {
        let mut table = DispatchTable::new("f", DispatchConfig::default(), Some(reg("generic", false)));
        table.register(&[TypeInfo::Integer], None, reg("int", false)).unwrap();
        table.register(&[TypeInfo::Boolean], None, reg("bool", false)).unwrap();

        assert_eq!(resolve(&table, TypeInfo::Boolean, None), "bool");
        assert_eq!(resolve(&table, TypeInfo::Integer, None), "int");
        assert_eq!(resolve(&table, TypeInfo::String, None), "generic");
    }

    #[test]
    fn test_subclass_uses_base_registration() {
        let frame = ClassInfo::new("Frame", TypeInfo::Map);
        let grouped = ClassInfo::new("Grouped", TypeInfo::Class(frame.clone()));
        let mut table: DispatchTable<Impl> = DispatchTable::new("f", DispatchConfig::default(), None);
        table.register(&[TypeInfo::Class(frame)], None, reg("frame", false)).unwrap();

        assert_eq!(resolve(&table, TypeInfo::Class(grouped), None), "frame");
        assert!(matches!(
            table.resolve(&TypeInfo::Map, None),
            Err(DispatchError::NotImplemented { .. })
        ));
    }

    #[test]
    fn test_explicit_backend() {
        let mut table: DispatchTable<Impl> = DispatchTable::new("f", DispatchConfig::default(), None);
        table.register(&[TypeInfo::Any], Some("polars"), reg("polars", false)).unwrap();

        assert_eq!(resolve(&table, TypeInfo::Map, Some("polars")), "polars");
        assert!(matches!(
            table.resolve(&TypeInfo::Map, Some("arrow")),
            Err(DispatchError::UnknownBackend { .. })
        ));
        assert!(matches!(
            table.resolve(&TypeInfo::Map, Some("default")),
            Err(DispatchError::NotImplemented { .. })
        ));
    }

    #[test]
    fn test_newest_backend_wins_and_reports_ambiguity() {
        let mut table: DispatchTable<Impl> = DispatchTable::new("f", DispatchConfig::default(), None);
        table.register(&[TypeInfo::Map], None, reg("default", false)).unwrap();
        table.register(&[TypeInfo::Map], Some("b"), reg("b", false)).unwrap();

        let resolution = table.resolve(&TypeInfo::Map, None).unwrap();
        assert_eq!((resolution.implementation)(), "b");
        assert_eq!(resolution.backend.as_deref(), Some("b"));
        assert_eq!(resolution.ambiguous, vec!["b", "default"]);
    }

    #[test]
    fn test_favored_beats_newer_backends() {
        let mut table: DispatchTable<Impl> = DispatchTable::new("f", DispatchConfig::default(), None);
        table.register(&[TypeInfo::Map], Some("b"), reg("b", true)).unwrap();
        table.register(&[TypeInfo::Map], Some("a"), reg("a", false)).unwrap();

        let resolution = table.resolve(&TypeInfo::Map, None).unwrap();
        assert_eq!((resolution.implementation)(), "b");
        assert!(!resolution.is_ambiguous());
    }

    #[test]
    fn test_same_implementation_is_not_ambiguous() {
        let shared = reg("shared", false);
        let mut table: DispatchTable<Impl> = DispatchTable::new("f", DispatchConfig::default(), None);
        table.register(&[TypeInfo::Map], Some("a"), shared.clone()).unwrap();
        table.register(&[TypeInfo::Map], Some("b"), shared).unwrap();
        assert!(!table.resolve(&TypeInfo::Map, None).unwrap().is_ambiguous());
    }

    #[test]
    fn test_strict_config_rejects_ambiguity() {
        let mut table: DispatchTable<Impl> = DispatchTable::new("f", DispatchConfig::strict(), None);
        table.register(&[TypeInfo::Map], Some("a"), reg("a", false)).unwrap();
        table.register(&[TypeInfo::Map], Some("b"), reg("b", false)).unwrap();
        assert!(matches!(
            table.resolve(&TypeInfo::Map, None),
            Err(DispatchError::Ambiguous { .. })
        ));
        // an explicit backend is never ambiguous
        assert_eq!(resolve(&table, TypeInfo::Map, Some("a")), "a");
    }

    #[test]
    fn test_default_as_candidate() {
        let config = DispatchConfig::new("default", AmbiguityPolicy::Silent, true);
        let mut table = DispatchTable::new("f", config, Some(reg("generic", false)));
        table.register(&[TypeInfo::Map], Some("b"), reg("b", false)).unwrap();

        let resolution = table.resolve(&TypeInfo::Map, None).unwrap();
        assert_eq!((resolution.implementation)(), "b");
        assert_eq!(resolution.ambiguous, vec!["b", "default"]);
    }

    #[test]
    fn test_empty_type_list() {
        let mut table: DispatchTable<Impl> = DispatchTable::new("f", DispatchConfig::default(), None);
        assert!(matches!(
            table.register(&[], None, reg("x", false)),
            Err(RegistrationError::EmptyTypeList { .. })
        ));
        assert!(!table.has_typed_registrations());
    }
}
