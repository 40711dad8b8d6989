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

use std::collections::BTreeSet;

use crate::ir::{Context, IRModule, ValueId};

/// Structured errors returned by the IR verifier.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IrVerifyError {
    /// Multiple definitions (ops or arguments) of the same SSA value.
    #[error("duplicate definition for value {0}")]
    DuplicateDefinition(ValueId),
    /// A value was referenced before it had been defined.
    #[error("use of undefined value {value} at op {op_index}")]
    UseBeforeDefinition { value: ValueId, op_index: usize },
    /// A value has no entry in the module's type table.
    #[error("value {0} has no recorded type")]
    MissingType(ValueId),
    /// The module's `next_id` counter does not cover the SSA IDs in use.
    #[error("next_id {found} is smaller than required {expected}")]
    NextIdOutOfSync { found: usize, expected: usize },
    /// A registered op was given the wrong number of operands.
    #[error("op {op_index} ({name}) has {found} operands")]
    InvalidOperandCount {
        op_index: usize,
        name: String,
        found: usize,
    },
}

/// Verify that an [`IRModule`] is well-formed.
///
/// Enforces SSA discipline (unique definitions, no use-before-def), that
/// every value is typed, and that `next_id` is in sync. Ops whose dialect is
/// registered in `context` additionally have their operand count checked;
/// unregistered ops are accepted as opaque.
pub fn verify_module(module: &IRModule, context: &Context) -> Result<(), IrVerifyError> {
    let mut defined: BTreeSet<ValueId> = BTreeSet::new();
    let mut max_seen = 0usize;

    let mut define = |id: ValueId, defined: &mut BTreeSet<ValueId>| {
        if !defined.insert(id) {
            return Err(IrVerifyError::DuplicateDefinition(id));
        }
        if module.value_type(id).is_none() {
            return Err(IrVerifyError::MissingType(id));
        }
        max_seen = max_seen.max(id.0 + 1);
        Ok(())
    };

    for arg in &module.arguments {
        define(*arg, &mut defined)?;
    }

    for (op_index, op) in module.ops.iter().enumerate() {
        for operand in &op.operands {
            if !defined.contains(operand) {
                return Err(IrVerifyError::UseBeforeDefinition {
                    value: *operand,
                    op_index,
                });
            }
        }

        if let Some(def) = context.lookup_op(&op.name) {
            if !def.accepts_operand_count(op.operands.len()) {
                return Err(IrVerifyError::InvalidOperandCount {
                    op_index,
                    name: op.name.clone(),
                    found: op.operands.len(),
                });
            }
        }

        for result in &op.results {
            define(*result, &mut defined)?;
        }
    }

    if module.next_id < max_seen {
        return Err(IrVerifyError::NextIdOutOfSync {
            found: module.next_id,
            expected: max_seen,
        });
    }

    Ok(())
}
