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

//! Generic SSA IR shared by the `check`, `hal`, and `vm` dialects.
//!
//! Operations are identified by their fully qualified name
//! (`dialect.op`). Each value has exactly one type recorded in the module's
//! type table; the rewrite engine retypes arguments in place and materializes
//! casts for everything else.

mod context;
mod print;
mod types;
mod verify;

use std::collections::BTreeMap;
use std::fmt;

pub use context::{Context, Dialect, OpDefinition};
pub use print::format_ir_module;
pub use types::{Dim, ScalarType, TensorType, Type};
pub use verify::{verify_module, IrVerifyError};

/// Name of the generic constant op used by front-ends.
pub const CONSTANT_OP: &str = "std.constant";
/// Attribute carrying a constant's payload.
pub const VALUE_ATTR: &str = "value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub usize);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(String),
}

impl Attribute {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Attribute::Float(v) => Some(*v),
            Attribute::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Attribute::Bool(b) => Some(i64::from(*b)),
            Attribute::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Bool(b) => write!(f, "{b}"),
            Attribute::Int(v) => write!(f, "{v}"),
            Attribute::Float(v) => write!(f, "{v:?}"),
            Attribute::Str(s) => write!(f, "{s:?}"),
            Attribute::Symbol(s) => write!(f, "@{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: String,
    pub operands: Vec<ValueId>,
    pub results: Vec<ValueId>,
    pub attributes: BTreeMap<String, Attribute>,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operands: Vec::new(),
            results: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_operands(mut self, operands: impl IntoIterator<Item = ValueId>) -> Self {
        self.operands.extend(operands);
        self
    }

    pub fn with_results(mut self, results: impl IntoIterator<Item = ValueId>) -> Self {
        self.results.extend(results);
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: Attribute) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Dialect namespace, i.e. everything before the first `.`.
    pub fn dialect(&self) -> &str {
        self.name.split_once('.').map_or("", |(dialect, _)| dialect)
    }

    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IRModule {
    /// Entry arguments; their types are rewritten in place during conversion.
    pub arguments: Vec<ValueId>,
    pub ops: Vec<Operation>,
    pub value_types: BTreeMap<ValueId, Type>,
    pub next_id: usize,
}

impl IRModule {
    pub fn new() -> Self {
        Self {
            arguments: Vec::new(),
            ops: Vec::new(),
            value_types: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn fresh(&mut self, ty: Type) -> ValueId {
        let id = ValueId(self.next_id);
        self.next_id += 1;
        self.value_types.insert(id, ty);
        id
    }

    pub fn add_argument(&mut self, ty: Type) -> ValueId {
        let id = self.fresh(ty);
        self.arguments.push(id);
        id
    }

    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    pub fn value_type(&self, id: ValueId) -> Option<&Type> {
        self.value_types.get(&id)
    }

    /// Appends a `std.constant` producing a value of `ty`.
    pub fn constant(&mut self, value: Attribute, ty: Type) -> ValueId {
        let id = self.fresh(ty);
        self.ops.push(
            Operation::new(CONSTANT_OP)
                .with_results([id])
                .with_attr(VALUE_ATTR, value),
        );
        id
    }

    /// Returns every op with the given fully-qualified name.
    pub fn ops_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Operation> + 'a {
        self.ops.iter().filter(move |op| op.name == name)
    }

    pub fn contains_op(&self, name: &str) -> bool {
        self.ops.iter().any(|op| op.name == name)
    }
}

impl Default for IRModule {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IRModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_ir_module(self))
    }
}
