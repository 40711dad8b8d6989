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

use std::sync::Arc;

use tracing::debug;

use crate::conversion::{ConversionError, PatternSet, Rewriter, TypeConverter};
use crate::dialects::check::{verify_check_types, CheckOp};
use crate::dialects::hal::HalOpConversion;
use crate::dialects::vm::{ImportTable, VmImportOpConversion};
use crate::ir::{Context, Operation};

/// Import called by each check op once lowered to the VM. These names must
/// match the exports of the native check module exactly.
const VM_IMPORTS: [(CheckOp, &str); 5] = [
    (CheckOp::ExpectTrue, "check.expect_true"),
    (CheckOp::ExpectFalse, "check.expect_false"),
    (CheckOp::ExpectAllTrue, "check.expect_all_true"),
    (CheckOp::ExpectEq, "check.expect_eq"),
    (CheckOp::ExpectAlmostEq, "check.expect_almost_eq"),
];

// The same op handles both tensors and buffer views.
const HAL_OPS: [CheckOp; 3] = [
    CheckOp::ExpectAllTrue,
    CheckOp::ExpectEq,
    CheckOp::ExpectAlmostEq,
];

/// Rejects ill-typed check ops instead of letting a cast paper over them.
fn verify_before_lowering(
    op: &Operation,
    rewriter: &Rewriter<'_>,
) -> Result<(), ConversionError> {
    verify_check_types(op, |value| rewriter.source_type(value).ok().cloned())
        .map(|_| ())
        .map_err(|err| ConversionError::InvalidOp {
            op: op.name.clone(),
            reason: err.to_string(),
        })
}

/// Appends one VM-import pattern per check op to `patterns`.
///
/// Imports are looked up in `import_symbols` now; a missing one surfaces as
/// [`ConversionError::ImportNotFound`](crate::conversion::ConversionError)
/// when its pattern fires. The set is append-only: calling this twice
/// registers every pattern twice.
pub fn populate_check_to_vm_patterns(
    context: &Context,
    import_symbols: &ImportTable,
    patterns: &mut PatternSet,
    type_converter: &Arc<TypeConverter>,
) {
    for (op, import_name) in VM_IMPORTS {
        patterns.insert(
            VmImportOpConversion::new(
                context,
                import_symbols,
                Arc::clone(type_converter),
                op.name(),
                import_name,
            )
            .with_verifier(verify_before_lowering),
        );
    }
    debug!(count = VM_IMPORTS.len(), "registered check -> vm patterns");
}

/// Appends the HAL patterns for the shaped check ops to `patterns`.
///
/// Each op maps to itself with converted operand types. Scalar predicates
/// need no HAL lowering and get no pattern.
pub fn populate_check_to_hal_patterns(
    context: &Context,
    patterns: &mut PatternSet,
    type_converter: &Arc<TypeConverter>,
) {
    for op in HAL_OPS {
        patterns.insert(
            HalOpConversion::new(context, Arc::clone(type_converter), op.name(), op.name())
                .with_verifier(verify_before_lowering),
        );
    }
    debug!(count = HAL_OPS.len(), "registered check -> hal patterns");
}
