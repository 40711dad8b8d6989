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

use crate::conversion::{ConversionError, TypeConverter};
use crate::ir::{IRModule, Operation, Type, ValueId};

pub(crate) type CastKey = (ValueId, Type);

/// Changes recorded by a successful rewrite, applied by the driver.
pub(crate) struct RewriteCommit {
    pub ops: Vec<Operation>,
    pub casts: Vec<(CastKey, ValueId)>,
    pub replacements: Vec<(ValueId, ValueId)>,
}

/// Buffered view of the module handed to a pattern.
///
/// Nothing a pattern does through the rewriter is visible to the module's op
/// list until the driver commits it, so a failed match leaves no trace.
pub struct Rewriter<'a> {
    module: &'a mut IRModule,
    value_map: &'a BTreeMap<ValueId, ValueId>,
    cast_cache: &'a BTreeMap<CastKey, ValueId>,
    source_types: &'a BTreeMap<ValueId, Type>,
    pending: Vec<Operation>,
    new_casts: Vec<(CastKey, ValueId)>,
    replacements: Vec<(ValueId, ValueId)>,
    created: Vec<ValueId>,
}

impl<'a> Rewriter<'a> {
    pub(crate) fn new(
        module: &'a mut IRModule,
        value_map: &'a BTreeMap<ValueId, ValueId>,
        cast_cache: &'a BTreeMap<CastKey, ValueId>,
        source_types: &'a BTreeMap<ValueId, Type>,
    ) -> Self {
        Self {
            module,
            value_map,
            cast_cache,
            source_types,
            pending: Vec::new(),
            new_casts: Vec::new(),
            replacements: Vec::new(),
            created: Vec::new(),
        }
    }

    pub fn value_type(&self, value: ValueId) -> Result<&Type, ConversionError> {
        self.module
            .value_type(value)
            .ok_or(ConversionError::MissingValueType(value))
    }

    /// Type of `value` before the module signature was converted.
    pub fn source_type(&self, value: ValueId) -> Result<&Type, ConversionError> {
        match self.source_types.get(&value) {
            Some(ty) => Ok(ty),
            None => self.value_type(value),
        }
    }

    /// The value currently standing in for `value` after earlier rewrites.
    pub fn lookup(&self, value: ValueId) -> ValueId {
        let mut current = value;
        while let Some(next) = self.value_map.get(&current) {
            current = *next;
        }
        current
    }

    pub fn fresh(&mut self, ty: Type) -> ValueId {
        let id = self.module.fresh(ty);
        self.created.push(id);
        id
    }

    /// Queues `op` for insertion in place of the op being rewritten.
    pub fn create(&mut self, op: Operation) {
        self.pending.push(op);
    }

    /// Remaps every operand of `op` and converts it to the type `converter`
    /// assigns to the operand's original type.
    pub fn convert_operands(
        &mut self,
        op: &Operation,
        converter: &TypeConverter,
    ) -> Result<Vec<ValueId>, ConversionError> {
        op.operands
            .iter()
            .map(|operand| {
                let original = self.value_type(*operand)?.clone();
                let target =
                    converter
                        .convert_type(&original)
                        .ok_or_else(|| ConversionError::TypeConversion {
                            ty: original.to_string(),
                            op: op.name.clone(),
                        })?;
                let current = self.lookup(*operand);
                self.cast_to(current, &target, converter)
            })
            .collect()
    }

    /// Returns `value` if it already has type `target`, otherwise a cast of it.
    ///
    /// Casts are memoised per (value, type) for the whole conversion.
    pub fn cast_to(
        &mut self,
        value: ValueId,
        target: &Type,
        converter: &TypeConverter,
    ) -> Result<ValueId, ConversionError> {
        let current_ty = self.value_type(value)?.clone();
        if current_ty == *target {
            return Ok(value);
        }

        let key = (value, target.clone());
        if let Some(cached) = self.cached_cast(&key) {
            return Ok(cached);
        }

        let cast_op = converter.materialization_op(&current_ty, target);
        let result = self.fresh(target.clone());
        self.pending.push(
            Operation::new(cast_op)
                .with_operands([value])
                .with_results([result]),
        );
        self.new_casts.push((key, result));
        Ok(result)
    }

    /// Remaps `original` for an op that is kept as-is, casting back to the
    /// original type when an earlier rewrite changed it.
    ///
    /// With `restore_arguments`, retyped module arguments are also cast back
    /// to the type they had before signature conversion.
    pub(crate) fn remap_for_kept_op(
        &mut self,
        original: ValueId,
        converter: &TypeConverter,
        restore_arguments: bool,
    ) -> Result<ValueId, ConversionError> {
        let current = self.lookup(original);
        let original_ty = match self.source_types.get(&original) {
            Some(ty) if restore_arguments => ty.clone(),
            _ if current == original => return Ok(original),
            _ => self.value_type(original)?.clone(),
        };
        self.cast_to(current, &original_ty, converter)
    }

    /// Replaces every result of `op` with the matching entry of `values`.
    pub fn replace_op(&mut self, op: &Operation, values: &[ValueId]) -> Result<(), ConversionError> {
        if op.results.len() != values.len() {
            return Err(ConversionError::ResultCount {
                op: op.name.clone(),
                expected: op.results.len(),
                found: values.len(),
            });
        }
        self.replacements
            .extend(op.results.iter().copied().zip(values.iter().copied()));
        Ok(())
    }

    fn cached_cast(&self, key: &CastKey) -> Option<ValueId> {
        self.new_casts
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
            .or_else(|| self.cast_cache.get(key).copied())
    }

    pub(crate) fn into_commit(self) -> RewriteCommit {
        RewriteCommit {
            ops: self.pending,
            casts: self.new_casts,
            replacements: self.replacements,
        }
    }

    /// Forgets every value created during a failed match.
    pub(crate) fn rollback(self) {
        for id in self.created {
            self.module.value_types.remove(&id);
        }
    }
}
