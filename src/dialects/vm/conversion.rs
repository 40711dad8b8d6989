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

use crate::conversion::{
    ConversionError, ConversionPattern, OpVerifier, PatternDescriptor, PatternSet, PatternTarget,
    Rewriter, TypeConverter,
};
use crate::dialects::vm::{const_op_for, ImportHandle, ImportTable, CALLEE_ATTR, CALL_OP};
use crate::ir::{Attribute, Context, OpDefinition, Operation, Type, CONSTANT_OP, VALUE_ATTR};

/// Rewrites an op into a `vm.call` of a named import.
///
/// The import is resolved once, at construction. A missing import is not an
/// error until the pattern fires.
pub struct VmImportOpConversion {
    source: String,
    import_name: String,
    import: Option<ImportHandle>,
    definition: Option<&'static OpDefinition>,
    verifier: Option<OpVerifier>,
    type_converter: Arc<TypeConverter>,
}

impl VmImportOpConversion {
    pub fn new(
        context: &Context,
        import_symbols: &ImportTable,
        type_converter: Arc<TypeConverter>,
        source: &str,
        import_name: &str,
    ) -> Self {
        let import = import_symbols.lookup(import_name);
        if import.is_none() {
            debug!(source, import = import_name, "import not declared; deferring failure");
        }
        Self {
            source: source.to_string(),
            import_name: import_name.to_string(),
            import,
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

    pub fn import_name(&self) -> &str {
        &self.import_name
    }

    /// The cached declaration, if the import existed at registration.
    pub fn import(&self) -> Option<&ImportHandle> {
        self.import.as_ref()
    }
}

impl ConversionPattern for VmImportOpConversion {
    fn root_name(&self) -> &str {
        &self.source
    }

    fn descriptor(&self) -> PatternDescriptor {
        PatternDescriptor {
            source: self.source.clone(),
            target: PatternTarget::Import(self.import_name.clone()),
        }
    }

    fn match_and_rewrite(
        &self,
        op: &Operation,
        rewriter: &mut Rewriter<'_>,
    ) -> Result<(), ConversionError> {
        let import = self
            .import
            .as_ref()
            .ok_or_else(|| ConversionError::ImportNotFound {
                import: self.import_name.clone(),
                op: op.name.clone(),
            })?;

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
        if op.operands.len() != import.operands.len() {
            return Err(ConversionError::OperandCount {
                op: op.name.clone(),
                expected: import.operands.len(),
                found: op.operands.len(),
            });
        }

        let converted = rewriter.convert_operands(op, &self.type_converter)?;
        let mut args = Vec::with_capacity(import.arity());
        for (value, param_ty) in converted.into_iter().zip(&import.operands) {
            args.push(rewriter.cast_to(value, param_ty, &self.type_converter)?);
        }

        for param in &import.attributes {
            let value = op
                .attr(&param.name)
                .or(param.default.as_ref())
                .ok_or_else(|| ConversionError::MatchFailure {
                    pattern: format!("{} -> @{}", self.source, self.import_name),
                    reason: format!("missing attribute '{}'", param.name),
                })?;
            let const_op = const_op_for(param.ty).ok_or_else(|| ConversionError::TypeConversion {
                ty: param.ty.to_string(),
                op: op.name.clone(),
            })?;
            let value = if param.ty.is_float() {
                value.as_f64().map(Attribute::Float)
            } else {
                value.as_i64().map(Attribute::Int)
            }
            .ok_or_else(|| ConversionError::InvalidOp {
                op: op.name.clone(),
                reason: format!(
                    "attribute '{}' = {value} does not convert to {}",
                    param.name, param.ty
                ),
            })?;
            let arg = rewriter.fresh(Type::Scalar(param.ty));
            rewriter.create(
                Operation::new(const_op)
                    .with_results([arg])
                    .with_attr(VALUE_ATTR, value),
            );
            args.push(arg);
        }

        let results: Vec<_> = import
            .results
            .iter()
            .map(|ty| rewriter.fresh(ty.clone()))
            .collect();
        rewriter.create(
            Operation::new(CALL_OP)
                .with_operands(args)
                .with_results(results.clone())
                .with_attr(CALLEE_ATTR, Attribute::Symbol(import.name.clone())),
        );
        rewriter.replace_op(op, &results)
    }
}

/// Lowers scalar `std.constant`s to the matching `vm.const.*`.
pub struct ConstantOpConversion {
    type_converter: Arc<TypeConverter>,
}

impl ConstantOpConversion {
    pub fn new(type_converter: Arc<TypeConverter>) -> Self {
        Self { type_converter }
    }
}

impl ConversionPattern for ConstantOpConversion {
    fn root_name(&self) -> &str {
        CONSTANT_OP
    }

    fn descriptor(&self) -> PatternDescriptor {
        PatternDescriptor {
            source: CONSTANT_OP.to_string(),
            target: PatternTarget::Op("vm.const".to_string()),
        }
    }

    fn match_and_rewrite(
        &self,
        op: &Operation,
        rewriter: &mut Rewriter<'_>,
    ) -> Result<(), ConversionError> {
        let no_match = |reason: &str| ConversionError::MatchFailure {
            pattern: "std.constant -> vm.const".to_string(),
            reason: reason.to_string(),
        };

        let [result] = op.results.as_slice() else {
            return Err(no_match("constant must have exactly one result"));
        };
        let source_ty = rewriter.value_type(*result)?.clone();
        let target_ty = self
            .type_converter
            .convert_type(&source_ty)
            .ok_or_else(|| no_match("result type has no VM equivalent"))?;
        let scalar = target_ty
            .as_scalar()
            .ok_or_else(|| no_match("only scalar constants lower to vm.const"))?;
        let const_op = const_op_for(scalar).ok_or_else(|| no_match("unsupported scalar"))?;

        let value = op
            .attr(VALUE_ATTR)
            .ok_or_else(|| no_match("missing value attribute"))?;
        let value = if scalar.is_float() {
            value.as_f64().map(Attribute::Float)
        } else {
            value.as_i64().map(Attribute::Int)
        }
        .ok_or_else(|| no_match("value attribute does not fit the result type"))?;

        let new_result = rewriter.fresh(target_ty);
        rewriter.create(
            Operation::new(const_op)
                .with_results([new_result])
                .with_attr(VALUE_ATTR, value),
        );
        rewriter.replace_op(op, &[new_result])
    }
}

/// Adds the patterns lowering front-end scalar constants into the VM.
pub fn populate_std_to_vm_patterns(
    _context: &Context,
    patterns: &mut PatternSet,
    type_converter: &Arc<TypeConverter>,
) {
    patterns.insert(ConstantOpConversion::new(Arc::clone(type_converter)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{apply_full_conversion, ConversionTarget};
    use crate::dialects::vm::{vm_type_converter, ImportDecl, CONST_I32_OP};
    use crate::ir::IRModule;

    fn vm_target() -> ConversionTarget {
        let mut target = ConversionTarget::new();
        target.add_legal_dialect("vm");
        target
    }

    #[test]
    fn boolean_constant_becomes_vm_const_i32() {
        let context = Context::with_default_dialects();
        let converter = Arc::new(vm_type_converter());
        let mut patterns = PatternSet::new();
        populate_std_to_vm_patterns(&context, &mut patterns, &converter);

        let mut module = IRModule::new();
        module.constant(Attribute::Bool(true), Type::I1);

        apply_full_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
            .expect("constant lowers");

        assert_eq!(module.ops.len(), 1);
        let constant = module.ops_named(CONST_I32_OP).next().expect("vm.const.i32");
        assert_eq!(constant.attr(VALUE_ATTR), Some(&Attribute::Int(1)));
        assert_eq!(module.value_type(constant.results[0]), Some(&Type::I32));
    }

    #[test]
    fn tensor_constants_do_not_match() {
        let context = Context::with_default_dialects();
        let converter = Arc::new(vm_type_converter());
        let mut patterns = PatternSet::new();
        populate_std_to_vm_patterns(&context, &mut patterns, &converter);

        let mut module = IRModule::new();
        module.constant(
            Attribute::Float(0.0),
            Type::tensor(crate::ir::ScalarType::F32, &[4]),
        );

        let err = apply_full_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
            .unwrap_err();
        assert!(matches!(err, ConversionError::IllegalOperation { index: 0, .. }));
    }

    #[test]
    fn mistyped_attribute_params_are_rejected() {
        let context = Context::with_default_dialects();
        let converter = Arc::new(vm_type_converter());
        let imports: ImportTable = [ImportDecl::new("test.scale", vec![Type::I32])
            .with_attribute("factor", crate::ir::ScalarType::F32, None)]
        .into_iter()
        .collect();

        let mut patterns = PatternSet::new();
        patterns.insert(VmImportOpConversion::new(
            &context,
            &imports,
            Arc::clone(&converter),
            "test.scale",
            "test.scale",
        ));

        let mut module = IRModule::new();
        let x = module.add_argument(Type::I32);
        module.push(
            Operation::new("test.scale")
                .with_operands([x])
                .with_attr("factor", Attribute::Str("double".to_string())),
        );
        let before = module.clone();

        let err = apply_full_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
            .unwrap_err();
        assert_eq!(
            err,
            ConversionError::InvalidOp {
                op: "test.scale".to_string(),
                reason: "attribute 'factor' = \"double\" does not convert to f32".to_string(),
            }
        );
        assert_eq!(module, before);
    }

    #[test]
    fn attribute_params_are_materialized_after_operands() {
        let context = Context::with_default_dialects();
        let converter = Arc::new(vm_type_converter());
        let imports: ImportTable = [ImportDecl::new("test.scale", vec![Type::I32])
            .with_attribute("factor", crate::ir::ScalarType::F32, Some(Attribute::Float(2.0)))]
        .into_iter()
        .collect();

        let mut patterns = PatternSet::new();
        patterns.insert(VmImportOpConversion::new(
            &context,
            &imports,
            Arc::clone(&converter),
            "test.scale",
            "test.scale",
        ));

        let mut module = IRModule::new();
        let x = module.add_argument(Type::I32);
        module.push(Operation::new("test.scale").with_operands([x]));

        apply_full_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
            .expect("import call emitted");

        let factor = module.ops_named("vm.const.f32").next().expect("factor const");
        assert_eq!(factor.attr(VALUE_ATTR), Some(&Attribute::Float(2.0)));
        let call = module.ops_named(CALL_OP).next().expect("call");
        assert_eq!(call.operands, vec![x, factor.results[0]]);
        assert_eq!(
            call.attr(CALLEE_ATTR),
            Some(&Attribute::Symbol("test.scale".to_string()))
        );
    }
}
