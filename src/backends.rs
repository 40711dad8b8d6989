// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the STRATA project (Staged Tensor Runtime And Toolchain Assembly).

//! Backend registry and cross-backend result comparison.
//!
//! Programs are run on several backends and their results compared against
//! each other. The `reference` backend evaluates without compiling;
//! `reference_also` is a second reference run used to catch nondeterminism
//! between runs.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::info;

/// Default relative tolerance for [`MultiResults::assert_all_close`].
pub const DEFAULT_RTOL: f64 = 1e-6;
/// Default absolute tolerance for [`MultiResults::assert_all_close`].
pub const DEFAULT_ATOL: f64 = 1e-6;

/// One backend programs can be executed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendInfo {
    pub name: &'static str,
    /// HAL driver executing compiled programs; `None` for reference backends.
    pub driver: Option<&'static str>,
    /// Compiler target patterns used when compiling for this backend.
    pub compiler_targets: &'static [&'static str],
}

/// Every known backend, in selection order.
pub const BACKENDS: &[BackendInfo] = &[
    BackendInfo {
        name: "reference",
        driver: None,
        compiler_targets: &[],
    },
    BackendInfo {
        name: "reference_also",
        driver: None,
        compiler_targets: &[],
    },
    BackendInfo {
        name: "dylib",
        driver: Some("dylib"),
        compiler_targets: &["dylib-llvm-aot"],
    },
    BackendInfo {
        name: "vmla",
        driver: Some("vmla"),
        compiler_targets: &["vmla"],
    },
    BackendInfo {
        name: "vulkan",
        driver: Some("vulkan"),
        compiler_targets: &["vulkan-*"],
    },
];

const REFERENCE: &str = "reference";
const REFERENCE_ALSO: &str = "reference_also";

impl BackendInfo {
    pub fn lookup(name: &str) -> Option<&'static BackendInfo> {
        BACKENDS.iter().find(|backend| backend.name == name)
    }

    pub fn is_reference(&self) -> bool {
        self.driver.is_none()
    }
}

impl fmt::Display for BackendInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(driver) = self.driver {
            write!(f, " (driver {driver}, targets {})", self.compiler_targets.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BackendError {
    #[error("invalid backend specification '{spec}': unexpected name '{name}'; valid names are {valid}")]
    UnknownBackend {
        spec: String,
        name: String,
        valid: String,
    },
    #[error("results have different structure: {0}")]
    StructureMismatch(String),
    #[error("multiple backends disagree ({0})")]
    Disagreement(Disagreements),
}

/// Decodes a comma-delimited list of backend names.
pub fn parse_target_backends(spec: &str) -> Result<Vec<&'static BackendInfo>, BackendError> {
    spec.split(',')
        .map(str::trim)
        .map(|name| {
            BackendInfo::lookup(name).ok_or_else(|| BackendError::UnknownBackend {
                spec: spec.to_string(),
                name: name.to_string(),
                valid: BACKENDS
                    .iter()
                    .map(|b| format!("'{}'", b.name))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        })
        .collect()
}

/// Backends to run on.
///
/// Without an explicit list every backend is used. A lone `reference` is
/// paired with `reference_also` so it has something to be compared with.
pub fn select_backends(target_backends: Option<&str>) -> Result<Vec<&'static BackendInfo>, BackendError> {
    let Some(spec) = target_backends else {
        return Ok(BACKENDS.iter().collect());
    };
    info!(backends = spec, "using requested backends");
    let mut backends = parse_target_backends(spec)?;
    if backends.len() == 1 && backends[0].name == REFERENCE {
        if let Some(also) = BackendInfo::lookup(REFERENCE_ALSO) {
            backends.push(also);
        }
    }
    Ok(backends)
}

/// Element-wise `|a - b| <= atol + rtol * |b|`. NaNs never compare close.
pub fn all_close(a: &[f64], b: &[f64], rtol: f64, atol: f64) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= atol + rtol * y.abs())
}

/// A value produced by running a program on one backend.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultValue {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Str(String),
    List(Vec<ResultValue>),
    Map(BTreeMap<String, ResultValue>),
}

impl ResultValue {
    fn kind(&self) -> &'static str {
        match self {
            ResultValue::Float(_) => "float",
            ResultValue::Int(_) => "int",
            ResultValue::Str(_) => "str",
            ResultValue::List(_) => "list",
            ResultValue::Map(_) => "map",
        }
    }

    fn as_f64s(&self) -> Option<Vec<f64>> {
        match self {
            ResultValue::Float(values) => Some(values.clone()),
            ResultValue::Int(values) => Some(values.iter().map(|v| *v as f64).collect()),
            _ => None,
        }
    }

    /// Numeric closeness over any mix of float and int leaves.
    pub fn is_close(&self, other: &ResultValue, rtol: f64, atol: f64) -> bool {
        match (self, other) {
            (ResultValue::List(a), ResultValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_close(y, rtol, atol))
            }
            (ResultValue::Map(a), ResultValue::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, x)| {
                        b.get(key).is_some_and(|y| x.is_close(y, rtol, atol))
                    })
            }
            (ResultValue::Str(a), ResultValue::Str(b)) => a == b,
            _ => match (self.as_f64s(), other.as_f64s()) {
                (Some(a), Some(b)) => all_close(&a, &b, rtol, atol),
                _ => false,
            },
        }
    }

    /// Floats compare within tolerance, everything else exactly. Differing
    /// structure is an error rather than a disagreement.
    pub fn check_same(&self, other: &ResultValue, rtol: f64, atol: f64) -> Result<bool, BackendError> {
        match (self, other) {
            (ResultValue::Map(a), ResultValue::Map(b)) => {
                if !a.keys().eq(b.keys()) {
                    return Err(BackendError::StructureMismatch(format!(
                        "map keys {:?} vs {:?}",
                        a.keys().collect::<Vec<_>>(),
                        b.keys().collect::<Vec<_>>()
                    )));
                }
                for (x, y) in a.values().zip(b.values()) {
                    if !x.check_same(y, rtol, atol)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (ResultValue::List(a), ResultValue::List(b)) => {
                if a.len() != b.len() {
                    return Err(BackendError::StructureMismatch(format!(
                        "list lengths {} vs {}",
                        a.len(),
                        b.len()
                    )));
                }
                for (x, y) in a.iter().zip(b) {
                    if !x.check_same(y, rtol, atol)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (ResultValue::Float(a), ResultValue::Float(b)) => Ok(all_close(a, b, rtol, atol)),
            (ResultValue::Int(a), ResultValue::Int(b)) => Ok(a == b),
            (ResultValue::Str(a), ResultValue::Str(b)) => Ok(a == b),
            (a, b) => Err(BackendError::StructureMismatch(format!(
                "{} vs {}",
                a.kind(),
                b.kind()
            ))),
        }
    }
}

/// For each backend, the other backends whose results it disagrees with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Disagreements {
    pub by_backend: Vec<(String, Vec<String>)>,
}

impl Disagreements {
    pub fn has_disagreement(&self) -> bool {
        self.by_backend.iter().any(|(_, others)| !others.is_empty())
    }
}

impl fmt::Display for Disagreements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (backend, others) in &self.by_backend {
            if others.is_empty() {
                continue;
            }
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{backend} vs {}", others.join(", "))?;
        }
        Ok(())
    }
}

/// Compares every ordered pair of distinct entries with `predicate`.
pub fn collect_disagreements<F>(results: &[(String, ResultValue)], mut predicate: F) -> Disagreements
where
    F: FnMut(&ResultValue, &ResultValue) -> bool,
{
    let by_backend = results
        .iter()
        .enumerate()
        .map(|(i, (name, reference))| {
            let others = results
                .iter()
                .enumerate()
                .filter(|(j, (_, target))| i != *j && !predicate(reference, target))
                .map(|(_, (other, _))| other.clone())
                .collect();
            (name.clone(), others)
        })
        .collect();
    Disagreements { by_backend }
}

/// Results of one invocation, keyed by backend name in run order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiResults {
    results: Vec<(String, ResultValue)>,
}

impl MultiResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, backend: impl Into<String>, value: ResultValue) {
        self.results.push((backend.into(), value));
    }

    pub fn with(mut self, backend: impl Into<String>, value: ResultValue) -> Self {
        self.push(backend, value);
        self
    }

    pub fn get(&self, backend: &str) -> Option<&ResultValue> {
        self.results
            .iter()
            .find(|(name, _)| name == backend)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn assert_all_close(&self, rtol: f64, atol: f64) -> Result<&Self, BackendError> {
        self.check(collect_disagreements(&self.results, |a, b| a.is_close(b, rtol, atol)))
    }

    pub fn assert_all_equal(&self) -> Result<&Self, BackendError> {
        self.check(collect_disagreements(&self.results, |a, b| a == b))
    }

    /// Tolerant on floats, exact on integers and strings, over nested
    /// lists and maps.
    pub fn assert_all_close_and_equal(&self, rtol: f64, atol: f64) -> Result<&Self, BackendError> {
        let mut by_backend = Vec::with_capacity(self.results.len());
        for (i, (name, reference)) in self.results.iter().enumerate() {
            let mut others = Vec::new();
            for (other, target) in &self.results[..i] {
                if !reference.check_same(target, rtol, atol)? {
                    others.push(other.clone());
                }
            }
            by_backend.push((name.clone(), others));
        }
        self.check(Disagreements { by_backend })
    }

    fn check(&self, disagreements: Disagreements) -> Result<&Self, BackendError> {
        if disagreements.has_disagreement() {
            return Err(BackendError::Disagreement(disagreements));
        }
        Ok(self)
    }
}
