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

use tracing::{debug, trace};

use crate::conversion::rewriter::{CastKey, RewriteCommit, Rewriter};
use crate::conversion::{ConversionError, ConversionTarget, Legality, PatternSet, TypeConverter};
use crate::ir::{verify_module, Context, IRModule, Operation, Type, ValueId};

/// Summary of a successful conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Ops replaced by a pattern.
    pub rewritten: usize,
    /// Cast ops inserted to reconcile operand types.
    pub materialized: usize,
    /// Module arguments whose type changed.
    pub retyped_arguments: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Partial,
    Full,
}

/// Converts `module`, keeping ops the target does not classify.
///
/// On error the module is left exactly as it was.
pub fn apply_partial_conversion(
    module: &mut IRModule,
    context: &Context,
    target: &ConversionTarget,
    patterns: &PatternSet,
    type_converter: &TypeConverter,
) -> Result<ConversionReport, ConversionError> {
    apply_conversion(module, context, target, patterns, type_converter, Mode::Partial)
}

/// Converts `module`, requiring every remaining op to be legal.
pub fn apply_full_conversion(
    module: &mut IRModule,
    context: &Context,
    target: &ConversionTarget,
    patterns: &PatternSet,
    type_converter: &TypeConverter,
) -> Result<ConversionReport, ConversionError> {
    apply_conversion(module, context, target, patterns, type_converter, Mode::Full)
}

#[derive(Default)]
struct ConversionState {
    value_map: BTreeMap<ValueId, ValueId>,
    cast_cache: BTreeMap<CastKey, ValueId>,
    /// Pre-conversion types of retyped module arguments.
    source_types: BTreeMap<ValueId, Type>,
    ops: Vec<Operation>,
    report: ConversionReport,
}

impl ConversionState {
    fn commit(&mut self, commit: RewriteCommit) {
        self.report.materialized += commit.casts.len();
        self.cast_cache.extend(commit.casts);
        self.value_map.extend(commit.replacements);
        self.ops.extend(commit.ops);
    }
}

fn apply_conversion(
    module: &mut IRModule,
    context: &Context,
    target: &ConversionTarget,
    patterns: &PatternSet,
    type_converter: &TypeConverter,
    mode: Mode,
) -> Result<ConversionReport, ConversionError> {
    let mut working = module.clone();
    let mut state = ConversionState::default();

    state.source_types = convert_signature(&mut working, type_converter)?;
    state.report.retyped_arguments = state.source_types.len();

    let ops = std::mem::take(&mut working.ops);
    for (index, op) in ops.into_iter().enumerate() {
        let legality = target.legality(&op, &working);
        if legality == Legality::Legal {
            keep_op(&mut working, &mut state, op, type_converter, false)?;
            continue;
        }

        if rewrite_op(&mut working, &mut state, &op, patterns)? {
            continue;
        }

        match (legality, mode) {
            // Ops outside the target still expect the original argument types.
            (Legality::Unknown, Mode::Partial) => {
                keep_op(&mut working, &mut state, op, type_converter, true)?;
            }
            _ => {
                debug!(op = %op.name, index, "failed to legalize operation");
                return Err(ConversionError::IllegalOperation { op: op.name, index });
            }
        }
    }

    working.ops = state.ops;
    prune_dead_types(&mut working);
    verify_module(&working, context)?;

    *module = working;
    debug!(
        rewritten = state.report.rewritten,
        materialized = state.report.materialized,
        "conversion finished"
    );
    Ok(state.report)
}

/// Retypes module arguments in place, returning the previous type of each
/// argument that changed.
fn convert_signature(
    module: &mut IRModule,
    type_converter: &TypeConverter,
) -> Result<BTreeMap<ValueId, Type>, ConversionError> {
    let mut retyped = BTreeMap::new();
    for arg in module.arguments.clone() {
        let ty = module
            .value_type(arg)
            .ok_or(ConversionError::MissingValueType(arg))?;
        let converted =
            type_converter
                .convert_type(ty)
                .ok_or_else(|| ConversionError::TypeConversion {
                    ty: ty.to_string(),
                    op: "module signature".to_string(),
                })?;
        if converted != *ty {
            let previous = ty.clone();
            module.value_types.insert(arg, converted);
            retyped.insert(arg, previous);
        }
    }
    Ok(retyped)
}

/// Offers `op` to its patterns in insertion order. Returns whether one applied.
fn rewrite_op(
    working: &mut IRModule,
    state: &mut ConversionState,
    op: &Operation,
    patterns: &PatternSet,
) -> Result<bool, ConversionError> {
    for pattern in patterns.patterns_for(&op.name) {
        let mut rewriter = Rewriter::new(
            working,
            &state.value_map,
            &state.cast_cache,
            &state.source_types,
        );
        match pattern.match_and_rewrite(op, &mut rewriter) {
            Ok(()) => {
                trace!(pattern = %pattern.descriptor(), "pattern applied");
                let commit = rewriter.into_commit();
                state.commit(commit);
                state.report.rewritten += 1;
                return Ok(true);
            }
            Err(err) if err.is_match_failure() => {
                trace!(error = %err, "pattern did not match");
                rewriter.rollback();
            }
            Err(err) => return Err(err),
        }
    }
    Ok(false)
}

fn keep_op(
    working: &mut IRModule,
    state: &mut ConversionState,
    mut op: Operation,
    type_converter: &TypeConverter,
    restore_arguments: bool,
) -> Result<(), ConversionError> {
    let mut rewriter = Rewriter::new(
        working,
        &state.value_map,
        &state.cast_cache,
        &state.source_types,
    );
    let mut operands = Vec::with_capacity(op.operands.len());
    for operand in &op.operands {
        operands.push(rewriter.remap_for_kept_op(*operand, type_converter, restore_arguments)?);
    }
    let commit = rewriter.into_commit();
    state.commit(commit);

    op.operands = operands;
    state.ops.push(op);
    Ok(())
}

fn prune_dead_types(module: &mut IRModule) {
    let live: BTreeSet<ValueId> = module
        .arguments
        .iter()
        .chain(module.ops.iter().flat_map(|op| op.results.iter()))
        .copied()
        .collect();
    module.value_types.retain(|id, _| live.contains(id));
}
