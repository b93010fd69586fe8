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

//! Dispatch configuration options

use serde::{Deserialize, Serialize};

/// Backend used when a registration names none
pub const DEFAULT_BACKEND: &str = "default";

/// What to do when several backends match equally well
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityPolicy {
    /// Log a warning and use the most recently registered backend
    #[default]
    Warn,
    /// Use the most recently registered backend without a warning
    Silent,
    /// Fail with [`DispatchError::Ambiguous`](super::error::DispatchError::Ambiguous)
    Error,
}

/// Configuration for dispatch behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Backend that registrations without an explicit backend go to
    pub default_backend: String,

    /// Reaction to ambiguous matches
    pub ambiguity: AmbiguityPolicy,

    /// Whether the descriptor's own default competes with typed registrations
    /// when no backend is requested
    pub default_is_candidate: bool,
}

impl DispatchConfig {
    /// Create a dispatch configuration with custom settings
    pub fn new(
        default_backend: impl Into<String>,
        ambiguity: AmbiguityPolicy,
        default_is_candidate: bool,
    ) -> Self {
        Self {
            default_backend: default_backend.into(),
            ambiguity,
            default_is_candidate,
        }
    }

    /// Create a configuration that rejects ambiguous matches
    pub fn strict() -> Self {
        Self {
            ambiguity: AmbiguityPolicy::Error,
            ..Self::default()
        }
    }

    /// Create a configuration that resolves ambiguity silently
    pub fn quiet() -> Self {
        Self {
            ambiguity: AmbiguityPolicy::Silent,
            ..Self::default()
        }
    }

    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_backend: DEFAULT_BACKEND.to_string(),
            ambiguity: AmbiguityPolicy::Warn,
            default_is_candidate: false,
        }
    }
}
