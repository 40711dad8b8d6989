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

use crate::conversion::{
    ConversionError, ConversionPattern, OpVerifier, PatternDescriptor, PatternTarget, Rewriter,
    TypeConverter,
};
use crate::ir::{Context, OpDefinition, Operation};

/// Re-creates an op as `target` with converted operand and result types.
///
/// Operand count and attributes are carried over unchanged.
pub struct HalOpConversion {
    source: String,
    target: String,
    definition: Option<&'static OpDefinition>,
    verifier: Option<OpVerifier>,
    type_converter: Arc<TypeConverter>,
}

impl HalOpConversion {
    pub fn new(
        context: &Context,
        type_converter: Arc<TypeConverter>,
        source: &str,
        target: &str,
    ) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            definition: context.lookup_op(source),
            verifier: None,
            type_converter,
        }
    }

    /// Runs `verifier` on every matched op before rewriting it.
    pub fn with_verifier(mut self, verifier: OpVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }
}

impl ConversionPattern for HalOpConversion {
    fn root_name(&self) -> &str {
        &self.source
    }

    fn descriptor(&self) -> PatternDescriptor {
        PatternDescriptor {
            source: self.source.clone(),
            target: PatternTarget::Op(self.target.clone()),
        }
    }

    fn match_and_rewrite(
        &self,
        op: &Operation,
        rewriter: &mut Rewriter<'_>,
    ) -> Result<(), ConversionError> {
        if let Some(def) = self.definition {
            if !def.accepts_operand_count(op.operands.len()) {
                return Err(ConversionError::OperandCount {
                    op: op.name.clone(),
                    expected: def.min_operands,
                    found: op.operands.len(),
                });
            }
        }

        if let Some(verify) = self.verifier {
            verify(op, rewriter)?;
        }

        let operands = rewriter.convert_operands(op, &self.type_converter)?;

        let mut results = Vec::with_capacity(op.results.len());
        for result in &op.results {
            let ty = rewriter.value_type(*result)?.clone();
            let converted =
                self.type_converter
                    .convert_type(&ty)
                    .ok_or_else(|| ConversionError::TypeConversion {
                        ty: ty.to_string(),
                        op: op.name.clone(),
                    })?;
            results.push(rewriter.fresh(converted));
        }

        let mut replacement = Operation::new(self.target.as_str())
            .with_operands(operands)
            .with_results(results.clone());
        replacement.attributes = op.attributes.clone();
        rewriter.create(replacement);
        rewriter.replace_op(op, &results)
    }
}
