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

use std::collections::BTreeMap;

/// Fixed metadata for a registered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpDefinition {
    /// Fully qualified op name (`dialect.op`).
    pub name: &'static str,
    /// Minimum number of operands.
    pub min_operands: usize,
    /// Maximum number of operands; `None` means variadic.
    pub max_operands: Option<usize>,
    /// Number of results produced.
    pub results: usize,
    /// Short description of the op contract.
    pub summary: &'static str,
}

impl OpDefinition {
    pub const fn fixed(
        name: &'static str,
        operands: usize,
        results: usize,
        summary: &'static str,
    ) -> Self {
        Self {
            name,
            min_operands: operands,
            max_operands: Some(operands),
            results,
            summary,
        }
    }

    pub const fn variadic(
        name: &'static str,
        min_operands: usize,
        results: usize,
        summary: &'static str,
    ) -> Self {
        Self {
            name,
            min_operands,
            max_operands: None,
            results,
            summary,
        }
    }

    pub fn accepts_operand_count(&self, count: usize) -> bool {
        count >= self.min_operands && self.max_operands.map_or(true, |max| count <= max)
    }
}

/// A namespace of operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub namespace: &'static str,
    pub ops: &'static [OpDefinition],
}

/// Registry of the dialects known to a compilation.
///
/// Rewrite patterns consult the context for the definition of the op they
/// match; the verifier uses it to check operand arity of registered ops.
#[derive(Debug, Clone, Default)]
pub struct Context {
    dialects: BTreeMap<&'static str, Dialect>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with the `builtin`, `std`, `check`, `hal`, and `vm` dialects.
    pub fn with_default_dialects() -> Self {
        let mut context = Self::new();
        for dialect in crate::dialects::all_dialects() {
            context.register_dialect(dialect);
        }
        context
    }

    /// Registers a dialect, replacing any previous one with the same namespace.
    pub fn register_dialect(&mut self, dialect: Dialect) {
        self.dialects.insert(dialect.namespace, dialect);
    }

    pub fn is_dialect_registered(&self, namespace: &str) -> bool {
        self.dialects.contains_key(namespace)
    }

    pub fn lookup_op(&self, name: &str) -> Option<&'static OpDefinition> {
        let namespace = name.split_once('.').map(|(ns, _)| ns)?;
        let dialect = self.dialects.get(namespace)?;
        dialect.ops.iter().find(|op| op.name == name)
    }

    pub fn dialects(&self) -> impl Iterator<Item = &Dialect> {
        self.dialects.values()
    }
}
