use std::sync::Arc;

use pretty_assertions::assert_eq;

use strata::conversion::{
    apply_full_conversion, apply_partial_conversion, ConversionError, ConversionTarget,
    PatternDescriptor, PatternSet, PatternTarget,
};
use strata::dialects::check::{
    self, check_module_imports, populate_check_to_hal_patterns, populate_check_to_vm_patterns,
    CheckOp,
};
use strata::dialects::hal::hal_type_converter;
use strata::dialects::vm::{populate_std_to_vm_patterns, vm_type_converter, ImportTable};
use strata::ir::{format_ir_module, Attribute, Context, IRModule, Operation, ScalarType, Type, ValueId};

fn producer(module: &mut IRModule, ty: Type) -> ValueId {
    let id = module.fresh(ty);
    module.push(Operation::new("test.producer").with_results([id]));
    id
}

fn vm_target() -> ConversionTarget {
    let mut target = ConversionTarget::new();
    target.add_legal_dialect("vm").add_illegal_dialect("check").add_illegal_dialect("std");
    target
}

#[test]
fn vm_population_registers_one_import_per_check_op() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_vm_patterns(&context, &check_module_imports(), &mut patterns, &converter);

    let expected: Vec<PatternDescriptor> = [
        ("check.expect_true", "check.expect_true"),
        ("check.expect_false", "check.expect_false"),
        ("check.expect_all_true", "check.expect_all_true"),
        ("check.expect_eq", "check.expect_eq"),
        ("check.expect_almost_eq", "check.expect_almost_eq"),
    ]
    .into_iter()
    .map(|(source, import)| PatternDescriptor {
        source: source.to_string(),
        target: PatternTarget::Import(import.to_string()),
    })
    .collect();
    assert_eq!(patterns.descriptors(), expected);
}

#[test]
fn hal_population_skips_scalar_predicates() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(hal_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_hal_patterns(&context, &mut patterns, &converter);

    assert_eq!(patterns.len(), 3);
    let sources: Vec<String> = patterns.descriptors().into_iter().map(|d| d.source).collect();
    assert_eq!(
        sources,
        vec!["check.expect_all_true", "check.expect_eq", "check.expect_almost_eq"]
    );
    assert_eq!(patterns.patterns_for("check.expect_true").count(), 0);
    assert_eq!(patterns.patterns_for("check.expect_false").count(), 0);
    for descriptor in patterns.descriptors() {
        assert_eq!(descriptor.target, PatternTarget::Op(descriptor.source.clone()));
    }
}

#[test]
fn repeated_population_appends_duplicates() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let imports = check_module_imports();
    let mut patterns = PatternSet::new();
    populate_check_to_vm_patterns(&context, &imports, &mut patterns, &converter);
    populate_check_to_vm_patterns(&context, &imports, &mut patterns, &converter);

    assert_eq!(patterns.len(), 10);
    assert_eq!(patterns.patterns_for("check.expect_eq").count(), 2);
}

#[test]
fn population_preserves_existing_patterns() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_std_to_vm_patterns(&context, &mut patterns, &converter);
    populate_check_to_vm_patterns(&context, &check_module_imports(), &mut patterns, &converter);

    let descriptors = patterns.descriptors();
    assert_eq!(descriptors.len(), 6);
    assert_eq!(descriptors[0].source, "std.constant");
    assert_eq!(descriptors[1].source, "check.expect_true");
}

#[test]
fn hal_patterns_leave_buffer_view_programs_unchanged() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(hal_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_hal_patterns(&context, &mut patterns, &converter);

    let mut module = IRModule::new();
    let lhs = module.add_argument(Type::BufferView);
    let rhs = module.add_argument(Type::BufferView);
    check::expect_all_true(&mut module, lhs);
    check::expect_eq(&mut module, lhs, rhs);
    check::expect_almost_eq(&mut module, lhs, rhs, Some(0.25));
    let before = format_ir_module(&module);

    // Force every shaped check through its pattern.
    let mut target = ConversionTarget::new();
    target.add_illegal_dialect("check");
    let report = apply_full_conversion(&mut module, &context, &target, &patterns, &converter)
        .expect("conversion succeeds");

    assert_eq!(report.rewritten, 3);
    assert_eq!(report.materialized, 0);
    assert_eq!(format_ir_module(&module), before);
}

#[test]
fn hal_patterns_export_tensor_operands() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(hal_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_hal_patterns(&context, &mut patterns, &converter);

    let mut module = IRModule::new();
    let lhs = producer(&mut module, Type::tensor(ScalarType::F32, &[2, 2]));
    let rhs = producer(&mut module, Type::tensor(ScalarType::F32, &[2, 2]));
    check::expect_eq(&mut module, lhs, rhs);

    let mut target = ConversionTarget::new();
    target.add_illegal_dialect("check").add_legal_dialect("hal");
    let report = apply_partial_conversion(&mut module, &context, &target, &patterns, &converter)
        .expect("conversion succeeds");

    assert_eq!(report.rewritten, 1);
    assert_eq!(report.materialized, 2);
    assert_eq!(
        format_ir_module(&module),
        "module() {\n\
         \x20 %0 = test.producer() : () -> (tensor<2x2xf32>)\n\
         \x20 %1 = test.producer() : () -> (tensor<2x2xf32>)\n\
         \x20 %2 = hal.tensor.export(%0) : (tensor<2x2xf32>) -> (!hal.buffer_view)\n\
         \x20 %3 = hal.tensor.export(%1) : (tensor<2x2xf32>) -> (!hal.buffer_view)\n\
         \x20 check.expect_eq(%2, %3) : (!hal.buffer_view, !hal.buffer_view) -> ()\n\
         }  // next_id = 4\n"
    );
    let eq = module.ops_named("check.expect_eq").next().expect("rewritten op");
    assert_eq!(eq.operands.len(), 2);
}

#[test]
fn hal_patterns_reuse_one_export_per_value() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(hal_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_hal_patterns(&context, &mut patterns, &converter);

    let mut module = IRModule::new();
    let value = producer(&mut module, Type::tensor(ScalarType::I1, &[4]));
    check::expect_all_true(&mut module, value);
    check::expect_eq(&mut module, value, value);

    let mut target = ConversionTarget::new();
    target.add_illegal_dialect("check");
    let report = apply_partial_conversion(&mut module, &context, &target, &patterns, &converter)
        .expect("conversion succeeds");

    assert_eq!(report.materialized, 1);
    assert_eq!(module.ops_named("hal.tensor.export").count(), 1);
}

#[test]
fn tensor_arguments_are_retyped_in_the_signature() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(hal_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_hal_patterns(&context, &mut patterns, &converter);

    let mut module = IRModule::new();
    let lhs = module.add_argument(Type::tensor(ScalarType::I32, &[3]));
    let rhs = module.add_argument(Type::tensor(ScalarType::I32, &[3]));
    check::expect_eq(&mut module, lhs, rhs);

    let mut target = ConversionTarget::new();
    target.add_illegal_dialect("check");
    let report = apply_partial_conversion(&mut module, &context, &target, &patterns, &converter)
        .expect("conversion succeeds");

    assert_eq!(report.retyped_arguments, 2);
    assert_eq!(
        format_ir_module(&module),
        "module(%0: !hal.buffer_view, %1: !hal.buffer_view) {\n\
         \x20 check.expect_eq(%0, %1) : (!hal.buffer_view, !hal.buffer_view) -> ()\n\
         }  // next_id = 2\n"
    );
}

#[test]
fn expect_true_on_a_constant_lowers_to_a_vm_call() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_std_to_vm_patterns(&context, &mut patterns, &converter);
    populate_check_to_vm_patterns(&context, &check_module_imports(), &mut patterns, &converter);

    let mut module = IRModule::new();
    let predicate = module.constant(Attribute::Bool(true), Type::I1);
    check::expect_true(&mut module, predicate);

    apply_full_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
        .expect("conversion succeeds");

    assert!(!module.contains_op(CheckOp::ExpectTrue.name()));
    assert_eq!(
        format_ir_module(&module),
        "module() {\n\
         \x20 %1 = vm.const.i32() {value = 1} : () -> (i32)\n\
         \x20 vm.call(%1) {callee = @check.expect_true} : (i32) -> ()\n\
         }  // next_id = 2\n"
    );
}

#[test]
fn predicate_arguments_are_widened_for_the_import() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_vm_patterns(&context, &check_module_imports(), &mut patterns, &converter);

    let mut module = IRModule::new();
    let predicate = producer(&mut module, Type::I1);
    check::expect_false(&mut module, predicate);

    apply_partial_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
        .expect("conversion succeeds");

    let printed = format_ir_module(&module);
    assert!(
        printed.contains("%1 = vm.ext.i1.i32(%0) : (i1) -> (i32)"),
        "expected widening cast: {printed}"
    );
    assert!(printed.contains("vm.call(%1) {callee = @check.expect_false}"), "{printed}");
}

#[test]
fn missing_import_surfaces_when_the_pattern_fires() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut imports = check_module_imports();
    imports.remove("check.expect_all_true");

    let mut patterns = PatternSet::new();
    populate_check_to_vm_patterns(&context, &imports, &mut patterns, &converter);
    assert_eq!(patterns.len(), 5);

    let mut module = IRModule::new();
    let view = module.add_argument(Type::BufferView);
    check::expect_all_true(&mut module, view);
    let before = module.clone();

    let err = apply_partial_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
        .unwrap_err();
    assert_eq!(
        err,
        ConversionError::ImportNotFound {
            import: "check.expect_all_true".to_string(),
            op: "check.expect_all_true".to_string(),
        }
    );
    assert_eq!(module, before);
}

#[test]
fn empty_import_table_only_fails_used_imports() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_vm_patterns(&context, &ImportTable::new(), &mut patterns, &converter);

    let mut module = IRModule::new();
    producer(&mut module, Type::I32);
    apply_partial_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
        .expect("no check op, no lookup");
}

#[test]
fn tensors_have_no_vm_form() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_vm_patterns(&context, &check_module_imports(), &mut patterns, &converter);

    let mut module = IRModule::new();
    let lhs = producer(&mut module, Type::tensor(ScalarType::F32, &[2]));
    let rhs = producer(&mut module, Type::tensor(ScalarType::F32, &[2]));
    check::expect_eq(&mut module, lhs, rhs);

    let err = apply_partial_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
        .unwrap_err();
    assert_eq!(
        err,
        ConversionError::TypeConversion {
            ty: "tensor<2xf32>".to_string(),
            op: "check.expect_eq".to_string(),
        }
    );
}

#[test]
fn almost_eq_passes_its_tolerance_to_the_import() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_vm_patterns(&context, &check_module_imports(), &mut patterns, &converter);

    let mut module = IRModule::new();
    let lhs = module.add_argument(Type::BufferView);
    let rhs = module.add_argument(Type::BufferView);
    check::expect_almost_eq(&mut module, lhs, rhs, Some(0.5));

    apply_full_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
        .expect("conversion succeeds");

    assert_eq!(
        format_ir_module(&module),
        "module(%0: !vm.ref<!hal.buffer_view>, %1: !vm.ref<!hal.buffer_view>) {\n\
         \x20 %2 = vm.const.f32() {value = 0.5} : () -> (f32)\n\
         \x20 vm.call(%0, %1, %2) {callee = @check.expect_almost_eq} : \
         (!vm.ref<!hal.buffer_view>, !vm.ref<!hal.buffer_view>, f32) -> ()\n\
         }  // next_id = 3\n"
    );
}

#[test]
fn almost_eq_without_tolerance_uses_the_import_default() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_vm_patterns(&context, &check_module_imports(), &mut patterns, &converter);

    let mut module = IRModule::new();
    let lhs = module.add_argument(Type::BufferView);
    let rhs = module.add_argument(Type::BufferView);
    check::expect_almost_eq(&mut module, lhs, rhs, None);

    apply_full_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
        .expect("conversion succeeds");

    let constant = module.ops_named("vm.const.f32").next().expect("tolerance constant");
    let value = constant
        .attr("value")
        .and_then(Attribute::as_f64)
        .expect("float value");
    assert!((value - f64::from(check::DEFAULT_TOLERANCE)).abs() < 1e-12);
}

#[test]
fn non_numeric_tolerance_is_rejected() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_vm_patterns(&context, &check_module_imports(), &mut patterns, &converter);

    let mut module = IRModule::new();
    let lhs = module.add_argument(Type::BufferView);
    let rhs = module.add_argument(Type::BufferView);
    module.push(
        Operation::new(CheckOp::ExpectAlmostEq.name())
            .with_operands([lhs, rhs])
            .with_attr(check::TOLERANCE_ATTR, Attribute::Str("loose".to_string())),
    );
    let before = module.clone();

    let err = apply_full_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
        .unwrap_err();
    assert_eq!(
        err,
        ConversionError::InvalidOp {
            op: "check.expect_almost_eq".to_string(),
            reason: "check.expect_almost_eq tolerance must be numeric, found \"loose\"".to_string(),
        }
    );
    assert_eq!(module, before);
}

#[test]
fn float_predicates_are_not_cast_into_the_import() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_vm_patterns(&context, &check_module_imports(), &mut patterns, &converter);

    let mut module = IRModule::new();
    let predicate = module.add_argument(Type::F32);
    check::expect_true(&mut module, predicate);

    let err = apply_full_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
        .unwrap_err();
    assert!(
        matches!(&err, ConversionError::InvalidOp { op, .. } if op == "check.expect_true"),
        "{err}"
    );
    assert!(!format_ir_module(&module).contains("unrealized_conversion_cast"));
}

#[test]
fn hal_patterns_reject_mismatched_pairs() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(hal_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_hal_patterns(&context, &mut patterns, &converter);

    let mut module = IRModule::new();
    let lhs = producer(&mut module, Type::tensor(ScalarType::F32, &[2]));
    let rhs = producer(&mut module, Type::tensor(ScalarType::I32, &[2]));
    check::expect_eq(&mut module, lhs, rhs);

    let mut target = ConversionTarget::new();
    target.add_illegal_dialect("check");
    let err = apply_partial_conversion(&mut module, &context, &target, &patterns, &converter)
        .unwrap_err();
    assert_eq!(
        err,
        ConversionError::InvalidOp {
            op: "check.expect_eq".to_string(),
            reason: "check.expect_eq operands differ in type: tensor<2xf32> vs tensor<2xi32>"
                .to_string(),
        }
    );
}

#[test]
fn retyped_arguments_are_verified_with_their_original_types() {
    let context = Context::with_default_dialects();
    let converter = Arc::new(vm_type_converter());
    let mut patterns = PatternSet::new();
    populate_check_to_vm_patterns(&context, &check_module_imports(), &mut patterns, &converter);

    // %0 is retyped to a VM ref while the produced %1 stays a buffer view.
    let mut module = IRModule::new();
    let lhs = module.add_argument(Type::BufferView);
    let rhs = producer(&mut module, Type::BufferView);
    check::expect_eq(&mut module, lhs, rhs);

    apply_partial_conversion(&mut module, &context, &vm_target(), &patterns, &converter)
        .expect("conversion succeeds");
    assert!(!module.contains_op(CheckOp::ExpectEq.name()));
}
