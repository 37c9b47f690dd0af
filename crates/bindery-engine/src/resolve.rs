//! Overload resolution
//!
//! Binding runs per candidate, in the order the class chain declares them:
//!
//! 1. positional arguments fill parameters left to right
//! 2. keyword arguments fill the remaining parameters by name
//! 3. defaults fill whatever is still unbound
//! 4. every bound value is converted to its declared type
//!
//! A candidate needing no implicit conversion wins; otherwise the first
//! candidate that binds at all. When nothing binds, the error lists every
//! candidate with the reason it was rejected.

use std::rc::Rc;

use bindery_sdk::{BindError, BindResult, CandidateFailure, Variant};

use crate::class::method::Overload;
use crate::class::signature::{ParamSpec, ParamType};
use crate::class::ClassRegistry;
use crate::marshal::{convert_value, ArgFailure};
use crate::registry::InstanceRegistry;

/// Arguments of a host call: positional values plus named keywords
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    /// Positional values in order
    pub positional: Vec<Variant>,
    /// Keyword values in the order given
    pub keywords: Vec<(String, Variant)>,
}

impl CallArgs {
    /// No arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional arguments only
    pub fn positional(values: Vec<Variant>) -> Self {
        Self {
            positional: values,
            keywords: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Variant>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument
    pub fn kw(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    /// Whether no argument was given
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    /// Value given at a source position
    pub fn source_value(&self, source: ArgSource) -> Option<&Variant> {
        match source {
            ArgSource::Positional(i) => self.positional.get(i),
            ArgSource::Keyword(i) => self.keywords.get(i).map(|(_, v)| v),
            ArgSource::Default => None,
        }
    }

    /// Mutable value given at a source position
    pub fn source_value_mut(&mut self, source: ArgSource) -> Option<&mut Variant> {
        match source {
            ArgSource::Positional(i) => self.positional.get_mut(i),
            ArgSource::Keyword(i) => self.keywords.get_mut(i).map(|(_, v)| v),
            ArgSource::Default => None,
        }
    }
}

impl From<Vec<Variant>> for CallArgs {
    fn from(values: Vec<Variant>) -> Self {
        CallArgs::positional(values)
    }
}

/// Where a bound parameter's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSource {
    /// The n-th positional argument
    Positional(usize),
    /// The n-th keyword argument
    Keyword(usize),
    /// The parameter's default
    Default,
}

/// The selected overload with converted arguments
#[derive(Debug, Clone)]
pub struct Binding {
    /// Index into the candidate list
    pub index: usize,
    /// Converted values, one per parameter
    pub values: Vec<Variant>,
    /// Origin of each value
    pub sources: Vec<ArgSource>,
}

enum Rejection {
    Reason(String),
    Mismatch {
        index: usize,
        name: String,
        expected: String,
        actual: String,
        object: bool,
    },
    ConstObject {
        index: usize,
        name: String,
    },
}

impl Rejection {
    fn reason(&self) -> String {
        match self {
            Rejection::Reason(text) => text.clone(),
            Rejection::Mismatch {
                index,
                name,
                expected,
                actual,
                object: true,
            } => format!(
                "argument #{} ({}): expected object of class {}, got {}",
                index, name, expected, actual
            ),
            Rejection::Mismatch {
                index,
                name,
                expected,
                actual,
                object: false,
            } => format!(
                "argument #{} ({}): cannot convert {} to {}",
                index, name, actual, expected
            ),
            Rejection::ConstObject { index, name } => format!(
                "argument #{} ({}): const object passed to non-const reference",
                index, name
            ),
        }
    }
}

struct Bound {
    values: Vec<Variant>,
    sources: Vec<ArgSource>,
    cost: u32,
}

/// Select an overload for the given arguments
pub fn resolve(
    classes: &ClassRegistry,
    instances: &InstanceRegistry,
    owner: &str,
    method: &str,
    overloads: &[Rc<Overload>],
    args: &CallArgs,
) -> BindResult<Binding> {
    let mut rejections = Vec::with_capacity(overloads.len());
    let mut first_match: Option<(usize, Bound)> = None;

    for (index, overload) in overloads.iter().enumerate() {
        match bind(classes, instances, &overload.sig.params, args, method)? {
            Ok(bound) if bound.cost == 0 => {
                return Ok(Binding {
                    index,
                    values: bound.values,
                    sources: bound.sources,
                });
            }
            Ok(bound) => {
                if first_match.is_none() {
                    first_match = Some((index, bound));
                }
            }
            Err(rejection) => rejections.push((index, rejection)),
        }
    }

    if let Some((index, bound)) = first_match {
        return Ok(Binding {
            index,
            values: bound.values,
            sources: bound.sources,
        });
    }

    if overloads.len() == 1 {
        if let Some((_, rejection)) = rejections.pop() {
            match rejection {
                Rejection::Mismatch {
                    index,
                    expected,
                    actual,
                    object: true,
                    ..
                } => {
                    return Err(BindError::TypeMismatch {
                        expected,
                        actual,
                        index,
                        class: owner.to_string(),
                        method: method.to_string(),
                    });
                }
                Rejection::Mismatch {
                    index,
                    expected,
                    actual,
                    object: false,
                    ..
                } => {
                    return Err(BindError::ConversionError {
                        expected,
                        actual,
                        index,
                        class: owner.to_string(),
                        method: method.to_string(),
                    });
                }
                Rejection::ConstObject { .. } => {
                    return Err(BindError::ConstViolation {
                        class: owner.to_string(),
                        method: method.to_string(),
                    });
                }
                reason @ Rejection::Reason(_) => rejections.push((0, reason)),
            }
        }
    }

    Err(BindError::OverloadResolutionFailure {
        class: owner.to_string(),
        method: method.to_string(),
        candidates: rejections
            .iter()
            .map(|(index, rejection)| CandidateFailure {
                signature: overloads[*index].sig.render(method),
                reason: rejection.reason(),
            })
            .collect(),
    })
}

/// Bind one candidate; the outer error aborts resolution entirely
fn bind(
    classes: &ClassRegistry,
    instances: &InstanceRegistry,
    params: &[ParamSpec],
    args: &CallArgs,
    method: &str,
) -> BindResult<Result<Bound, Rejection>> {
    let given = args.positional.len();
    if given > params.len() {
        return Ok(Err(Rejection::Reason(format!(
            "too many arguments: {} given, at most {} expected",
            given,
            params.len()
        ))));
    }

    let mut sources: Vec<Option<ArgSource>> = (0..params.len())
        .map(|i| (i < given).then_some(ArgSource::Positional(i)))
        .collect();

    for (k, (name, _)) in args.keywords.iter().enumerate() {
        let Some(pos) = params.iter().position(|p| &p.name == name) else {
            return Ok(Err(Rejection::Reason(format!(
                "unknown keyword parameter: {}",
                name
            ))));
        };
        match sources[pos] {
            Some(ArgSource::Positional(_)) => {
                return Ok(Err(Rejection::Reason(format!(
                    "argument #{} ({}) given both positionally and by keyword",
                    pos + 1,
                    name
                ))));
            }
            Some(_) => {
                return Ok(Err(Rejection::Reason(format!(
                    "keyword parameter {} given more than once",
                    name
                ))));
            }
            None => sources[pos] = Some(ArgSource::Keyword(k)),
        }
    }

    if let Some(missing) = params
        .iter()
        .enumerate()
        .position(|(i, p)| sources[i].is_none() && p.is_required())
    {
        let explicit_later = sources[missing + 1..].iter().any(Option::is_some);
        let reason = if explicit_later {
            format!("no value given for argument #{}", missing + 1)
        } else {
            format!("no value given for argument #{} and following", missing + 1)
        };
        return Ok(Err(Rejection::Reason(reason)));
    }

    let mut values = Vec::with_capacity(params.len());
    let mut resolved = Vec::with_capacity(params.len());
    let mut cost = 0;
    for (i, param) in params.iter().enumerate() {
        let source = sources[i].unwrap_or(ArgSource::Default);
        let raw = match source {
            ArgSource::Default => param.default.clone().unwrap_or_default(),
            other => args.source_value(other).cloned().unwrap_or_default(),
        };
        match convert_value(classes, instances, &param.ty, param.kind, &raw) {
            Ok((value, c)) => {
                cost += c;
                values.push(value);
                resolved.push(source);
            }
            Err(ArgFailure::Destroyed { class }) => {
                return Err(BindError::UseAfterFree {
                    class,
                    operation: method.to_string(),
                });
            }
            Err(ArgFailure::ConstObject) => {
                return Ok(Err(Rejection::ConstObject {
                    index: i + 1,
                    name: param.name.clone(),
                }));
            }
            Err(ArgFailure::Mismatch { expected, actual }) => {
                return Ok(Err(Rejection::Mismatch {
                    index: i + 1,
                    name: param.name.clone(),
                    expected,
                    actual,
                    object: matches!(param.ty, ParamType::Object(_)),
                }));
            }
        }
    }

    Ok(Ok(Bound {
        values,
        sources: resolved,
        cost,
    }))
}
