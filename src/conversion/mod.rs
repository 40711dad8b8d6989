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

//! Dialect conversion: rewrite patterns, type converters, legality targets,
//! and the drivers that apply them to an [`IRModule`](crate::ir::IRModule).
//!
//! A conversion walks the module once in program order. Legal ops are kept,
//! everything else is offered to the patterns registered for its name in
//! insertion order. The first pattern that does not report a
//! [`ConversionError::MatchFailure`] wins; any other error aborts the
//! conversion and leaves the module untouched.

mod driver;
mod rewriter;
mod target;
mod type_converter;

use std::fmt;

use crate::ir::{IrVerifyError, Operation, ValueId};

pub use driver::{apply_full_conversion, apply_partial_conversion, ConversionReport};
pub use rewriter::Rewriter;
pub use target::{ConversionTarget, Legality};
pub use type_converter::{TypeConverter, UNREALIZED_CAST_OP};

/// Structured errors produced while converting a module.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConversionError {
    /// A VM-import pattern fired but its import is absent from the table.
    #[error("import '{import}' required by {op} is not declared in the import table")]
    ImportNotFound { import: String, op: String },
    /// The type converter has no target-layer equivalent for a type.
    #[error("failed to convert type {ty} while lowering {op}")]
    TypeConversion { ty: String, op: String },
    /// An op carried an unexpected number of operands.
    #[error("{op} expects {expected} operands but has {found}")]
    OperandCount {
        op: String,
        expected: usize,
        found: usize,
    },
    /// A replacement supplied the wrong number of values.
    #[error("{op} produces {expected} results but was replaced with {found} values")]
    ResultCount {
        op: String,
        expected: usize,
        found: usize,
    },
    /// The op is malformed for its dialect; no pattern may lower it.
    #[error("invalid {op}: {reason}")]
    InvalidOp { op: String, reason: String },
    /// The pattern does not apply; the driver tries the next one.
    #[error("pattern {pattern} did not match: {reason}")]
    MatchFailure { pattern: String, reason: String },
    /// No pattern could legalize an illegal op.
    #[error("failed to legalize operation {op} at index {index}")]
    IllegalOperation { op: String, index: usize },
    /// A value referenced during rewriting has no recorded type.
    #[error("value {0} has no recorded type")]
    MissingValueType(ValueId),
    /// The converted module failed verification.
    #[error("IR verification failed: {0}")]
    Verify(#[from] IrVerifyError),
}

impl ConversionError {
    /// Match failures are recoverable: the driver moves to the next pattern.
    pub fn is_match_failure(&self) -> bool {
        matches!(self, ConversionError::MatchFailure { .. })
    }
}

/// What a pattern lowers its root op into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTarget {
    /// Another op, possibly of the same name.
    Op(String),
    /// A call to the named VM import.
    Import(String),
}

impl fmt::Display for PatternTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternTarget::Op(name) => write!(f, "op {name}"),
            PatternTarget::Import(name) => write!(f, "import @{name}"),
        }
    }
}

/// Introspection record for a registered pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDescriptor {
    pub source: String,
    pub target: PatternTarget,
}

impl fmt::Display for PatternDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Rejects a malformed op before a pattern rewrites it.
///
/// Operand types are read through [`Rewriter::source_type`], so the hook sees
/// the types the op was built with even after signature conversion.
pub type OpVerifier = fn(&Operation, &Rewriter<'_>) -> Result<(), ConversionError>;

/// A rule rewriting ops of one kind into a lower-level form.
pub trait ConversionPattern: Send + Sync {
    /// Name of the op this pattern matches.
    fn root_name(&self) -> &str;

    fn descriptor(&self) -> PatternDescriptor;

    /// Rewrites `op` through `rewriter`. On success the original op is erased
    /// and every op created through the rewriter is inserted in its place.
    fn match_and_rewrite(
        &self,
        op: &Operation,
        rewriter: &mut Rewriter<'_>,
    ) -> Result<(), ConversionError>;
}

/// Append-only, ordered collection of conversion patterns.
#[derive(Default)]
pub struct PatternSet {
    patterns: Vec<Box<dyn ConversionPattern>>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<P>(&mut self, pattern: P)
    where
        P: ConversionPattern + 'static,
    {
        self.patterns.push(Box::new(pattern));
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ConversionPattern> {
        self.patterns.iter().map(|p| p.as_ref())
    }

    /// Patterns rooted at `name`, in insertion order.
    pub fn patterns_for<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a dyn ConversionPattern> + 'a {
        self.iter().filter(move |p| p.root_name() == name)
    }

    pub fn descriptors(&self) -> Vec<PatternDescriptor> {
        self.iter().map(|p| p.descriptor()).collect()
    }
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.descriptors()).finish()
    }
}
