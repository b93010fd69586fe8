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

//! Function signatures and argument binding

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Arguments;

/// Errors raised when call arguments do not fit a signature
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FunctionError {
    /// Wrong number of positional arguments
    #[error("`{name}` expects {} positional argument(s), got {actual}", arity_range(*min, *max))]
    InvalidArity {
        /// Function name
        name: String,
        /// Minimum number of positional arguments
        min: usize,
        /// Maximum number of positional arguments (None for variadic)
        max: Option<usize>,
        /// Number supplied
        actual: usize,
    },

    /// Keyword argument matching no parameter
    #[error("`{name}` got an unexpected keyword argument '{keyword}'")]
    UnexpectedKeyword {
        /// Function name
        name: String,
        /// The keyword
        keyword: String,
    },

    /// Parameter given both positionally and by keyword
    #[error("`{name}` got multiple values for argument '{parameter}'")]
    DuplicateArgument {
        /// Function name
        name: String,
        /// Parameter name
        parameter: String,
    },

    /// Required parameter not supplied
    #[error("`{name}` is missing required argument '{parameter}'")]
    MissingArgument {
        /// Function name
        name: String,
        /// Parameter name
        parameter: String,
    },
}

fn arity_range(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    }
}

/// How a parameter receives its argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    /// A single argument, by position or by keyword
    Positional,
    /// Every extra positional argument
    Variadic,
    /// Every extra keyword argument
    KeywordVariadic,
}

/// Parameter information for functions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name
    pub name: String,
    /// How the parameter is bound
    pub kind: ParameterKind,
    /// Whether this parameter is optional
    pub optional: bool,
}

impl ParameterInfo {
    /// Create a required parameter
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Positional,
            optional: false,
        }
    }

    /// Create an optional parameter
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Positional,
            optional: true,
        }
    }

    /// Create a parameter collecting extra positional arguments
    pub fn variadic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Variadic,
            optional: true,
        }
    }

    /// Create a parameter collecting extra keyword arguments
    pub fn keyword_variadic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::KeywordVariadic,
            optional: true,
        }
    }
}

/// Parameters of a registered function or verb
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Parameters in declaration order
    pub parameters: Vec<ParameterInfo>,
    /// Minimum number of positional arguments
    pub min_arity: usize,
    /// Maximum number of positional arguments (None for variadic)
    pub max_arity: Option<usize>,
}

/// Parameter names that call arguments were bound to
///
/// Extra arguments bind to the name of the variadic parameter that absorbed them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Binding {
    positional: Vec<String>,
    keyword: IndexMap<String, String>,
}

impl Binding {
    /// Parameter receiving the positional argument at `index`
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    /// Parameter receiving the keyword argument `keyword`
    pub fn keyword(&self, keyword: &str) -> Option<&str> {
        self.keyword.get(keyword).map(String::as_str)
    }
}

impl Signature {
    /// Create a new signature
    pub fn new(parameters: Vec<ParameterInfo>) -> Self {
        let positional = parameters
            .iter()
            .filter(|p| p.kind == ParameterKind::Positional);
        let min_arity = positional.clone().filter(|p| !p.optional).count();
        let max_arity = if parameters.iter().any(|p| p.kind == ParameterKind::Variadic) {
            None
        } else {
            Some(positional.count())
        };
        Self {
            parameters,
            min_arity,
            max_arity,
        }
    }

    /// Required positional parameters with the given names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(ParameterInfo::required).collect())
    }

    /// Accept anything: `*args, **kwargs`
    pub fn variadic() -> Self {
        Self::new(vec![
            ParameterInfo::variadic("args"),
            ParameterInfo::keyword_variadic("kwargs"),
        ])
    }

    /// Append an optional parameter
    pub fn with_optional(self, name: impl Into<String>) -> Self {
        self.with_parameter(ParameterInfo::optional(name))
    }

    /// Append a parameter collecting extra positional arguments
    pub fn with_variadic(self, name: impl Into<String>) -> Self {
        self.with_parameter(ParameterInfo::variadic(name))
    }

    /// Append a parameter collecting extra keyword arguments
    pub fn with_keywords(self, name: impl Into<String>) -> Self {
        self.with_parameter(ParameterInfo::keyword_variadic(name))
    }

    fn with_parameter(mut self, parameter: ParameterInfo) -> Self {
        self.parameters.push(parameter);
        Self::new(self.parameters)
    }

    /// Parameter by name
    pub fn parameter(&self, name: &str) -> Option<&ParameterInfo> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Whether a parameter with this name exists
    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    /// First parameter, if any
    pub fn first_parameter(&self) -> Option<&ParameterInfo> {
        self.parameters.first()
    }

    /// Bind call arguments to parameter names
    pub fn bind<T>(&self, name: &str, args: &Arguments<T>) -> Result<Binding, FunctionError> {
        self.bind_from(name, args, 0)
    }

    /// Bind call arguments, treating the first `skip` positional parameters as
    /// already supplied
    ///
    /// Verbs receive their data separately, so their arguments bind from the
    /// second parameter on.
    pub fn bind_from<T>(
        &self,
        name: &str,
        args: &Arguments<T>,
        skip: usize,
    ) -> Result<Binding, FunctionError> {
        let named: Vec<&ParameterInfo> = self
            .parameters
            .iter()
            .filter(|p| p.kind == ParameterKind::Positional)
            .collect();
        let skipped = &named[..skip.min(named.len())];
        let open = &named[skipped.len()..];
        let variadic = self
            .parameters
            .iter()
            .find(|p| p.kind == ParameterKind::Variadic);
        let keywords = self
            .parameters
            .iter()
            .find(|p| p.kind == ParameterKind::KeywordVariadic);

        let mut binding = Binding::default();
        for index in 0..args.positional().len() {
            let parameter = match (open.get(index), variadic) {
                (Some(parameter), _) => parameter.name.clone(),
                (None, Some(variadic)) => variadic.name.clone(),
                (None, None) => {
                    return Err(FunctionError::InvalidArity {
                        name: name.to_string(),
                        min: open.iter().filter(|p| !p.optional).count(),
                        max: Some(open.len()),
                        actual: args.positional().len(),
                    });
                }
            };
            binding.positional.push(parameter);
        }

        for keyword in args.keyword().keys() {
            let already_bound = skipped.iter().any(|p| &p.name == keyword)
                || binding.positional.iter().any(|p| p == keyword);
            if already_bound {
                return Err(FunctionError::DuplicateArgument {
                    name: name.to_string(),
                    parameter: keyword.clone(),
                });
            }
            let parameter = if open.iter().any(|p| &p.name == keyword) {
                keyword.clone()
            } else if let Some(keywords) = keywords {
                keywords.name.clone()
            } else {
                return Err(FunctionError::UnexpectedKeyword {
                    name: name.to_string(),
                    keyword: keyword.clone(),
                });
            };
            binding.keyword.insert(keyword.clone(), parameter);
        }

        for parameter in open.iter().filter(|p| !p.optional) {
            let bound = binding.positional.iter().any(|p| p == &parameter.name)
                || binding.keyword.contains_key(&parameter.name);
            if !bound {
                return Err(FunctionError::MissingArgument {
                    name: name.to_string(),
                    parameter: parameter.name.clone(),
                });
            }
        }

        Ok(binding)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::variadic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CallArgs;
    use rstest::rstest;

    fn add_cols() -> Signature {
        Signature::from_names(["data", "a"]).with_optional("b")
    }

    #[test]
    fn test_arity() {
        let sig = add_cols();
        assert_eq!(sig.min_arity, 2);
        assert_eq!(sig.max_arity, Some(3));
        assert_eq!(Signature::variadic().max_arity, None);
        assert_eq!(Signature::variadic().min_arity, 0);
    }

    #[test]
    fn test_bind_positional_and_keyword() {
        let args = CallArgs::new().arg(1).kwarg("b", 2);
        let binding = add_cols().bind_from("add_cols", &args, 1).unwrap();
        assert_eq!(binding.positional(0), Some("a"));
        assert_eq!(binding.keyword("b"), Some("b"));
    }

    #[test]
    fn test_bind_variadic() {
        let sig = Signature::from_names(["x"]).with_variadic("rest").with_keywords("options");
        let args = CallArgs::new().arg(1).arg(2).arg(3).kwarg("na_rm", true);
        let binding = sig.bind("f", &args).unwrap();
        assert_eq!(binding.positional(0), Some("x"));
        assert_eq!(binding.positional(2), Some("rest"));
        assert_eq!(binding.keyword("na_rm"), Some("options"));
    }

    #[rstest]
    #[case(CallArgs::new().arg(1).arg(2).arg(3), "InvalidArity")]
    #[case(CallArgs::new().arg(1).kwarg("z", 1), "UnexpectedKeyword")]
    #[case(CallArgs::new().arg(1).kwarg("a", 1), "DuplicateArgument")]
    #[case(CallArgs::new().kwarg("data", 1).kwarg("a", 1), "DuplicateArgument")]
    #[case(CallArgs::new().kwarg("b", 1), "MissingArgument")]
    fn test_bind_errors(#[case] args: CallArgs, #[case] expected: &str) {
        let err = add_cols().bind_from("add_cols", &args, 1).unwrap_err();
        let actual = match err {
            FunctionError::InvalidArity { .. } => "InvalidArity",
            FunctionError::UnexpectedKeyword { .. } => "UnexpectedKeyword",
            FunctionError::DuplicateArgument { .. } => "DuplicateArgument",
            FunctionError::MissingArgument { .. } => "MissingArgument",
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_arity_message() {
        let err = add_cols()
            .bind_from("add_cols", &CallArgs::new().arg(1).arg(2).arg(3), 1)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "`add_cols` expects 1 to 2 positional argument(s), got 3"
        );
    }
}
