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

use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{IRModule, Operation};

type LegalityFn = Box<dyn Fn(&Operation, &IRModule) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Legality {
    Legal,
    Illegal,
    /// Neither the op nor its dialect was classified.
    Unknown,
}

/// Describes which ops may remain after a conversion.
///
/// Lookup order: dynamic callbacks, explicit op rules, then dialect rules.
#[derive(Default)]
pub struct ConversionTarget {
    legal_dialects: BTreeSet<String>,
    illegal_dialects: BTreeSet<String>,
    legal_ops: BTreeSet<String>,
    illegal_ops: BTreeSet<String>,
    dynamic_ops: BTreeMap<String, LegalityFn>,
}

impl ConversionTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_legal_dialect(&mut self, namespace: &str) -> &mut Self {
        self.illegal_dialects.remove(namespace);
        self.legal_dialects.insert(namespace.to_string());
        self
    }

    pub fn add_illegal_dialect(&mut self, namespace: &str) -> &mut Self {
        self.legal_dialects.remove(namespace);
        self.illegal_dialects.insert(namespace.to_string());
        self
    }

    pub fn add_legal_op(&mut self, name: &str) -> &mut Self {
        self.illegal_ops.remove(name);
        self.legal_ops.insert(name.to_string());
        self
    }

    pub fn add_illegal_op(&mut self, name: &str) -> &mut Self {
        self.legal_ops.remove(name);
        self.illegal_ops.insert(name.to_string());
        self
    }

    /// Legality of `name` is decided per op instance by `f`.
    pub fn add_dynamically_legal_op<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&Operation, &IRModule) -> bool + Send + Sync + 'static,
    {
        self.dynamic_ops.insert(name.to_string(), Box::new(f));
        self
    }

    pub fn legality(&self, op: &Operation, module: &IRModule) -> Legality {
        if let Some(f) = self.dynamic_ops.get(&op.name) {
            return if f(op, module) {
                Legality::Legal
            } else {
                Legality::Illegal
            };
        }
        if self.illegal_ops.contains(&op.name) {
            return Legality::Illegal;
        }
        if self.legal_ops.contains(&op.name) {
            return Legality::Legal;
        }
        let dialect = op.dialect();
        if self.illegal_dialects.contains(dialect) {
            Legality::Illegal
        } else if self.legal_dialects.contains(dialect) {
            Legality::Legal
        } else {
            Legality::Unknown
        }
    }
}
