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

//! The `vm` dialect: the serialisable form invoked by the runtime.
//!
//! Only the pieces needed to lower into calls on imported native modules live
//! here: the import table, the VM type converter, and the call/constant ops.

mod conversion;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::conversion::TypeConverter;
use crate::ir::{Attribute, Dialect, OpDefinition, ScalarType, Type};

pub use conversion::{populate_std_to_vm_patterns, ConstantOpConversion, VmImportOpConversion};

pub const CALL_OP: &str = "vm.call";
/// Symbol attribute naming the import a `vm.call` targets.
pub const CALLEE_ATTR: &str = "callee";
pub const CONST_I32_OP: &str = "vm.const.i32";
pub const CONST_I64_OP: &str = "vm.const.i64";
pub const CONST_F32_OP: &str = "vm.const.f32";
pub const CONST_F64_OP: &str = "vm.const.f64";
pub const EXT_I1_I32_OP: &str = "vm.ext.i1.i32";

const VM_OPS: &[OpDefinition] = &[
    OpDefinition::variadic(CALL_OP, 0, 0, "Calls an imported or internal function."),
    OpDefinition::fixed(CONST_I32_OP, 0, 1, "32-bit integer constant."),
    OpDefinition::fixed(CONST_I64_OP, 0, 1, "64-bit integer constant."),
    OpDefinition::fixed(CONST_F32_OP, 0, 1, "32-bit float constant."),
    OpDefinition::fixed(CONST_F64_OP, 0, 1, "64-bit float constant."),
    OpDefinition::fixed(EXT_I1_I32_OP, 1, 1, "Zero-extends a predicate to i32."),
];

pub fn dialect() -> Dialect {
    Dialect {
        namespace: "vm",
        ops: VM_OPS,
    }
}

/// Name of the constant op materializing a value of the given VM scalar type.
pub fn const_op_for(ty: ScalarType) -> Option<&'static str> {
    match ty {
        ScalarType::I32 => Some(CONST_I32_OP),
        ScalarType::I64 => Some(CONST_I64_OP),
        ScalarType::F32 => Some(CONST_F32_OP),
        ScalarType::F64 => Some(CONST_F64_OP),
        _ => None,
    }
}

/// A call argument supplied by an attribute of the source op rather than an
/// operand. Materialized as a `vm.const.*` before the call.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeParam {
    pub name: String,
    pub ty: ScalarType,
    pub default: Option<Attribute>,
}

/// Declaration of a function imported from a native module.
///
/// Call arguments are the converted operands followed by the attribute params
/// in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub name: String,
    pub operands: Vec<Type>,
    pub attributes: Vec<AttributeParam>,
    pub results: Vec<Type>,
}

impl ImportDecl {
    pub fn new(name: impl Into<String>, operands: Vec<Type>) -> Self {
        Self {
            name: name.into(),
            operands,
            attributes: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        ty: ScalarType,
        default: Option<Attribute>,
    ) -> Self {
        self.attributes.push(AttributeParam {
            name: name.into(),
            ty,
            default,
        });
        self
    }

    pub fn with_results(mut self, results: Vec<Type>) -> Self {
        self.results = results;
        self
    }

    /// Number of arguments the emitted call passes.
    pub fn arity(&self) -> usize {
        self.operands.len() + self.attributes.len()
    }
}

/// Shared handle to an import declaration cached by patterns.
pub type ImportHandle = Arc<ImportDecl>;

/// Symbol table of the functions a VM module imports.
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    imports: BTreeMap<String, ImportHandle>,
}

impl ImportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `decl`, replacing any import of the same name.
    pub fn declare(&mut self, decl: ImportDecl) -> ImportHandle {
        let handle = Arc::new(decl);
        self.imports.insert(handle.name.clone(), Arc::clone(&handle));
        handle
    }

    pub fn lookup(&self, name: &str) -> Option<ImportHandle> {
        self.imports.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.imports.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ImportHandle> {
        self.imports.remove(name)
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.imports.keys().map(String::as_str)
    }
}

impl FromIterator<ImportDecl> for ImportTable {
    fn from_iter<I: IntoIterator<Item = ImportDecl>>(iter: I) -> Self {
        let mut table = ImportTable::new();
        for decl in iter {
            table.declare(decl);
        }
        table
    }
}

/// Type converter for lowering HAL-level programs into the VM.
///
/// Narrow integers widen to `i32`, buffer views become `!vm.ref`s, and tensors
/// have no VM equivalent.
pub fn vm_type_converter() -> TypeConverter {
    let mut converter = TypeConverter::new();
    converter.add_conversion(|ty| match ty {
        Type::Scalar(s) => match s {
            ScalarType::I1 | ScalarType::I8 | ScalarType::I16 | ScalarType::I32 => Some(Type::I32),
            ScalarType::I64 => Some(Type::I64),
            ScalarType::F32 | ScalarType::F64 => Some(ty.clone()),
            ScalarType::F16 => None,
        },
        Type::BufferView => Some(Type::vm_ref(Type::BufferView)),
        Type::Ref(_) => Some(ty.clone()),
        Type::Tensor(_) => None,
    });
    converter.add_materialization(|from, to| {
        (*from == Type::I1 && *to == Type::I32).then_some(EXT_I1_I32_OP)
    });
    converter
}
