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

//! The `check` dialect: runtime assertions on scalars, tensors, and buffer
//! views.
//!
//! Shaped assertions accept either tensors or HAL buffer views so the same op
//! survives HAL lowering with only its operand types changed. Lowering to the
//! VM turns every assertion into a call to the native check module.

mod conversion;
mod imports;

use std::fmt;

use crate::ir::{Attribute, Dialect, IRModule, OpDefinition, Operation, Type, ValueId};

pub use conversion::{populate_check_to_hal_patterns, populate_check_to_vm_patterns};
pub use imports::check_module_imports;

/// Attribute holding the absolute tolerance of `check.expect_almost_eq`.
pub const TOLERANCE_ATTR: &str = "tolerance";
/// Tolerance used when `check.expect_almost_eq` carries no attribute.
pub const DEFAULT_TOLERANCE: f32 = 1e-4;

const CHECK_OPS: &[OpDefinition] = &[
    OpDefinition::fixed(
        "check.expect_true",
        1,
        0,
        "Fails unless the scalar operand is non-zero.",
    ),
    OpDefinition::fixed(
        "check.expect_false",
        1,
        0,
        "Fails unless the scalar operand is zero.",
    ),
    OpDefinition::fixed(
        "check.expect_all_true",
        1,
        0,
        "Fails unless every element of the operand is non-zero.",
    ),
    OpDefinition::fixed(
        "check.expect_eq",
        2,
        0,
        "Fails unless both operands are elementwise equal.",
    ),
    OpDefinition::fixed(
        "check.expect_almost_eq",
        2,
        0,
        "Fails unless both operands are elementwise equal within a tolerance.",
    ),
];

pub fn dialect() -> Dialect {
    Dialect {
        namespace: "check",
        ops: CHECK_OPS,
    }
}

/// The assertion ops of the dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckOp {
    ExpectTrue,
    ExpectFalse,
    ExpectAllTrue,
    ExpectEq,
    ExpectAlmostEq,
}

/// Operand shape expected by an assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// One integer scalar.
    ScalarPredicate,
    /// One tensor or buffer view.
    Shaped,
    /// Two tensors or buffer views of the same type.
    ShapedPair,
}

impl CheckOp {
    pub const ALL: [CheckOp; 5] = [
        CheckOp::ExpectTrue,
        CheckOp::ExpectFalse,
        CheckOp::ExpectAllTrue,
        CheckOp::ExpectEq,
        CheckOp::ExpectAlmostEq,
    ];

    pub fn name(self) -> &'static str {
        self.definition().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn definition(self) -> &'static OpDefinition {
        &CHECK_OPS[self as usize]
    }

    pub fn operand_kind(self) -> OperandKind {
        match self {
            CheckOp::ExpectTrue | CheckOp::ExpectFalse => OperandKind::ScalarPredicate,
            CheckOp::ExpectAllTrue => OperandKind::Shaped,
            CheckOp::ExpectEq | CheckOp::ExpectAlmostEq => OperandKind::ShapedPair,
        }
    }

    pub fn operand_count(self) -> usize {
        match self.operand_kind() {
            OperandKind::ScalarPredicate | OperandKind::Shaped => 1,
            OperandKind::ShapedPair => 2,
        }
    }

    pub fn accepts_tolerance(self) -> bool {
        self == CheckOp::ExpectAlmostEq
    }
}

impl fmt::Display for CheckOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type errors in check ops.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CheckVerifyError {
    #[error("{op} is not a check op")]
    UnknownOp { op: String },
    #[error("{op} expects {expected} operands but has {found}")]
    OperandCount {
        op: CheckOp,
        expected: usize,
        found: usize,
    },
    #[error("{op} operand {index} has type {ty}, expected {expected}")]
    OperandType {
        op: CheckOp,
        index: usize,
        ty: String,
        expected: &'static str,
    },
    #[error("{op} operands differ in type: {lhs} vs {rhs}")]
    MismatchedOperands { op: CheckOp, lhs: String, rhs: String },
    #[error("{op} does not accept a tolerance")]
    UnexpectedTolerance { op: CheckOp },
    #[error("{op} tolerance must be numeric, found {found}")]
    InvalidTolerance { op: CheckOp, found: String },
}

/// Checks operand count and types of a check op against `module`'s type table.
pub fn verify_check_op(op: &Operation, module: &IRModule) -> Result<CheckOp, CheckVerifyError> {
    verify_check_types(op, |value| module.value_type(value).cloned())
}

/// Like [`verify_check_op`], with operand types supplied by `type_of`.
pub fn verify_check_types<F>(op: &Operation, type_of: F) -> Result<CheckOp, CheckVerifyError>
where
    F: Fn(ValueId) -> Option<Type>,
{
    let kind = CheckOp::from_name(&op.name).ok_or_else(|| CheckVerifyError::UnknownOp {
        op: op.name.clone(),
    })?;

    if op.operands.len() != kind.operand_count() {
        return Err(CheckVerifyError::OperandCount {
            op: kind,
            expected: kind.operand_count(),
            found: op.operands.len(),
        });
    }

    if let Some(tolerance) = op.attr(TOLERANCE_ATTR) {
        if !kind.accepts_tolerance() {
            return Err(CheckVerifyError::UnexpectedTolerance { op: kind });
        }
        if tolerance.as_f64().is_none() {
            return Err(CheckVerifyError::InvalidTolerance {
                op: kind,
                found: tolerance.to_string(),
            });
        }
    }

    let types: Vec<Option<Type>> = op.operands.iter().map(|v| type_of(*v)).collect();
    for (index, ty) in types.iter().enumerate() {
        let ok = match kind.operand_kind() {
            OperandKind::ScalarPredicate => {
                ty.as_ref().and_then(Type::as_scalar).is_some_and(|s| s.is_integer())
            }
            OperandKind::Shaped | OperandKind::ShapedPair => {
                ty.as_ref().is_some_and(Type::is_shaped)
            }
        };
        if !ok {
            return Err(CheckVerifyError::OperandType {
                op: kind,
                index,
                ty: ty.as_ref().map_or_else(|| "<untyped>".to_string(), ToString::to_string),
                expected: match kind.operand_kind() {
                    OperandKind::ScalarPredicate => "an integer scalar",
                    _ => "a tensor or buffer view",
                },
            });
        }
    }

    if let [Some(lhs), Some(rhs)] = types.as_slice() {
        if lhs != rhs {
            return Err(CheckVerifyError::MismatchedOperands {
                op: kind,
                lhs: lhs.to_string(),
                rhs: rhs.to_string(),
            });
        }
    }

    Ok(kind)
}

pub fn expect_true(module: &mut IRModule, predicate: ValueId) {
    module.push(Operation::new(CheckOp::ExpectTrue.name()).with_operands([predicate]));
}

pub fn expect_false(module: &mut IRModule, predicate: ValueId) {
    module.push(Operation::new(CheckOp::ExpectFalse.name()).with_operands([predicate]));
}

pub fn expect_all_true(module: &mut IRModule, operand: ValueId) {
    module.push(Operation::new(CheckOp::ExpectAllTrue.name()).with_operands([operand]));
}

pub fn expect_eq(module: &mut IRModule, lhs: ValueId, rhs: ValueId) {
    module.push(Operation::new(CheckOp::ExpectEq.name()).with_operands([lhs, rhs]));
}

pub fn expect_almost_eq(module: &mut IRModule, lhs: ValueId, rhs: ValueId, tolerance: Option<f32>) {
    let mut op = Operation::new(CheckOp::ExpectAlmostEq.name()).with_operands([lhs, rhs]);
    if let Some(tolerance) = tolerance {
        op = op.with_attr(TOLERANCE_ATTR, Attribute::Float(f64::from(tolerance)));
    }
    module.push(op);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ScalarType;

    #[test]
    fn names_round_trip_through_lookup() {
        for op in CheckOp::ALL {
            assert_eq!(CheckOp::from_name(op.name()), Some(op));
            assert!(op.name().starts_with("check.expect_"));
        }
        assert_eq!(CheckOp::from_name("check.expect_maybe"), None);
    }

    #[test]
    fn verifier_accepts_tensor_and_buffer_view_pairs() {
        let mut module = IRModule::new();
        let a = module.add_argument(Type::tensor(ScalarType::F32, &[4]));
        let b = module.add_argument(Type::tensor(ScalarType::F32, &[4]));
        let c = module.add_argument(Type::BufferView);
        let d = module.add_argument(Type::BufferView);
        expect_eq(&mut module, a, b);
        expect_almost_eq(&mut module, c, d, Some(0.5));

        for op in &module.ops {
            verify_check_op(op, &module).expect("valid check op");
        }
    }

    #[test]
    fn verifier_rejects_mismatched_pairs() {
        let mut module = IRModule::new();
        let a = module.add_argument(Type::tensor(ScalarType::F32, &[4]));
        let b = module.add_argument(Type::BufferView);
        expect_eq(&mut module, a, b);

        let err = verify_check_op(&module.ops[0], &module).unwrap_err();
        assert!(matches!(err, CheckVerifyError::MismatchedOperands { .. }));
    }

    #[test]
    fn verifier_rejects_shaped_predicates() {
        let mut module = IRModule::new();
        let a = module.add_argument(Type::tensor(ScalarType::I1, &[2]));
        expect_true(&mut module, a);

        let err = verify_check_op(&module.ops[0], &module).unwrap_err();
        assert!(matches!(err, CheckVerifyError::OperandType { index: 0, .. }));
    }

    #[test]
    fn tolerance_only_on_almost_eq() {
        let mut module = IRModule::new();
        let a = module.add_argument(Type::BufferView);
        module.push(
            Operation::new(CheckOp::ExpectAllTrue.name())
                .with_operands([a])
                .with_attr(TOLERANCE_ATTR, Attribute::Float(0.1)),
        );
        let err = verify_check_op(&module.ops[0], &module).unwrap_err();
        assert_eq!(
            err,
            CheckVerifyError::UnexpectedTolerance {
                op: CheckOp::ExpectAllTrue
            }
        );
    }

    #[test]
    fn tolerance_must_be_numeric() {
        let mut module = IRModule::new();
        let a = module.add_argument(Type::BufferView);
        let b = module.add_argument(Type::BufferView);
        module.push(
            Operation::new(CheckOp::ExpectAlmostEq.name())
                .with_operands([a, b])
                .with_attr(TOLERANCE_ATTR, Attribute::Str("loose".to_string())),
        );
        let err = verify_check_op(&module.ops[0], &module).unwrap_err();
        assert_eq!(
            err,
            CheckVerifyError::InvalidTolerance {
                op: CheckOp::ExpectAlmostEq,
                found: "\"loose\"".to_string(),
            }
        );
    }
}
