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

use crate::dialects::check::{CheckOp, DEFAULT_TOLERANCE, TOLERANCE_ATTR};
use crate::dialects::vm::{ImportDecl, ImportTable};
use crate::ir::{Attribute, ScalarType, Type};

/// Import declarations for every function exported by the native check
/// module, as a VM module importing it would declare them.
pub fn check_module_imports() -> ImportTable {
    let view = || Type::vm_ref(Type::BufferView);
    CheckOp::ALL
        .into_iter()
        .map(|op| match op {
            CheckOp::ExpectTrue | CheckOp::ExpectFalse => ImportDecl::new(op.name(), vec![Type::I32]),
            CheckOp::ExpectAllTrue => ImportDecl::new(op.name(), vec![view()]),
            CheckOp::ExpectEq => ImportDecl::new(op.name(), vec![view(), view()]),
            CheckOp::ExpectAlmostEq => ImportDecl::new(op.name(), vec![view(), view()])
                .with_attribute(
                    TOLERANCE_ATTR,
                    ScalarType::F32,
                    Some(Attribute::Float(f64::from(DEFAULT_TOLERANCE))),
                ),
        })
        .collect()
}
