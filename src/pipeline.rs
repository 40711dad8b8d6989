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

//! Lowering pipeline for programs containing `check` assertions.
//!
//! Programs are lowered in two stages. The HAL stage turns tensor operands of
//! shaped checks into buffer views. The VM stage rewrites every check into a
//! call to the native check module. Both stages are partial conversions: ops
//! neither stage knows about are carried through untouched.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info_span;

use crate::conversion::{
    apply_partial_conversion, ConversionError, ConversionReport, ConversionTarget, PatternSet,
};
use crate::dialects::check::{self, CheckOp, OperandKind};
use crate::dialects::hal::hal_type_converter;
use crate::dialects::vm::{populate_std_to_vm_patterns, vm_type_converter, ImportTable};
use crate::ir::{Context, IRModule, CONSTANT_OP};

/// Last stage a module is lowered to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoweringTarget {
    Hal,
    #[default]
    Vm,
}

impl fmt::Display for LoweringTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoweringTarget::Hal => "hal",
            LoweringTarget::Vm => "vm",
        })
    }
}

impl FromStr for LoweringTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hal" => Ok(LoweringTarget::Hal),
            "vm" => Ok(LoweringTarget::Vm),
            other => Err(format!("unknown lowering target '{other}' (expected 'hal' or 'vm')")),
        }
    }
}

/// Options controlling [`lower_module`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoweringOptions {
    pub target: LoweringTarget,
    /// Fail up front when the import table lacks any check import instead of
    /// when the first affected op is rewritten.
    pub strict_imports: bool,
}

/// Errors surfaced by the lowering pipeline.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    /// Strict import checking found check imports missing from the table.
    #[error("import table is missing check imports: {}", .0.join(", "))]
    MissingImports(Vec<String>),
    /// A conversion stage failed; the module is unchanged by that stage.
    #[error("conversion failed: {0}")]
    Conversion(#[from] ConversionError),
}

/// Per-stage reports of a [`lower_module`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub hal: Option<ConversionReport>,
    pub vm: Option<ConversionReport>,
}

/// Ops that may remain after the HAL stage.
///
/// Shaped checks stay legal once none of their operands is a tensor; scalar
/// checks are never touched by this stage.
pub fn hal_conversion_target() -> ConversionTarget {
    let mut target = ConversionTarget::new();
    target
        .add_legal_dialect("hal")
        .add_legal_dialect("builtin")
        .add_legal_op(CheckOp::ExpectTrue.name())
        .add_legal_op(CheckOp::ExpectFalse.name());
    for op in CheckOp::ALL {
        if op.operand_kind() == OperandKind::ScalarPredicate {
            continue;
        }
        target.add_dynamically_legal_op(op.name(), |op, module| {
            op.operands
                .iter()
                .all(|v| module.value_type(*v).is_some_and(|ty| !ty.is_tensor()))
        });
    }
    target
}

/// Ops that may remain after the VM stage.
pub fn vm_conversion_target() -> ConversionTarget {
    let mut target = ConversionTarget::new();
    target
        .add_legal_dialect("vm")
        .add_legal_dialect("builtin")
        .add_illegal_dialect("check");
    // Scalar constants must become vm.const.*; tensor constants are left to
    // other lowerings.
    target.add_dynamically_legal_op(CONSTANT_OP, |op, module| {
        op.results
            .iter()
            .all(|v| module.value_type(*v).is_some_and(|ty| ty.as_scalar().is_none()))
    });
    target
}

/// Lowers shaped checks on tensors to checks on buffer views.
pub fn lower_check_to_hal(
    module: &mut IRModule,
    context: &Context,
) -> Result<ConversionReport, PipelineError> {
    let _span = info_span!("lower_check_to_hal").entered();
    let converter = Arc::new(hal_type_converter());
    let mut patterns = PatternSet::new();
    check::populate_check_to_hal_patterns(context, &mut patterns, &converter);
    let report = apply_partial_conversion(
        module,
        context,
        &hal_conversion_target(),
        &patterns,
        &converter,
    )?;
    Ok(report)
}

/// Lowers every check to a `vm.call` of the matching entry of `imports`.
pub fn lower_check_to_vm(
    module: &mut IRModule,
    context: &Context,
    imports: &ImportTable,
    options: &LoweringOptions,
) -> Result<ConversionReport, PipelineError> {
    let _span = info_span!("lower_check_to_vm").entered();
    if options.strict_imports {
        let missing: Vec<String> = CheckOp::ALL
            .iter()
            .map(|op| op.name())
            .filter(|name| !imports.contains(name))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingImports(missing));
        }
    }

    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_std_to_vm_patterns(context, &mut patterns, &converter);
    check::populate_check_to_vm_patterns(context, imports, &mut patterns, &converter);
    let report = apply_partial_conversion(
        module,
        context,
        &vm_conversion_target(),
        &patterns,
        &converter,
    )?;
    Ok(report)
}

/// Runs the HAL stage and, for [`LoweringTarget::Vm`], the VM stage.
///
/// A failing VM stage leaves the module in its post-HAL form.
pub fn lower_module(
    module: &mut IRModule,
    context: &Context,
    imports: &ImportTable,
    options: &LoweringOptions,
) -> Result<PipelineReport, PipelineError> {
    let mut report = PipelineReport {
        hal: Some(lower_check_to_hal(module, context)?),
        vm: None,
    };
    if options.target == LoweringTarget::Vm {
        report.vm = Some(lower_check_to_vm(module, context, imports, options)?);
    }
    Ok(report)
}
