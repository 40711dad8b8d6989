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

use std::fmt::Write;

use crate::ir::{IRModule, Operation, ValueId};

/// Format an [`IRModule`] into a stable, human-readable string.
pub fn format_ir_module(module: &IRModule) -> String {
    let mut out = String::new();
    let args = module
        .arguments
        .iter()
        .map(|id| format!("{}: {}", id, type_name(module, *id)))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(&mut out, "module({args}) {{").expect("write to string cannot fail");
    for op in &module.ops {
        format_op(module, op, &mut out);
    }
    writeln!(&mut out, "}}  // next_id = {}", module.next_id).expect("write to string cannot fail");
    out
}

fn format_op(module: &IRModule, op: &Operation, out: &mut String) {
    out.push_str("  ");
    if !op.results.is_empty() {
        out.push_str(&join_values(&op.results));
        out.push_str(" = ");
    }
    write!(out, "{}({})", op.name, join_values(&op.operands)).expect("write to string cannot fail");

    if !op.attributes.is_empty() {
        let attrs = op
            .attributes
            .iter()
            .map(|(name, value)| format!("{name} = {value}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(out, " {{{attrs}}}").expect("write to string cannot fail");
    }

    let operand_types = join_types(module, &op.operands);
    let result_types = join_types(module, &op.results);
    writeln!(out, " : ({operand_types}) -> ({result_types})").expect("write to string cannot fail");
}

fn join_values(values: &[ValueId]) -> String {
    values
        .iter()
        .map(ValueId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_types(module: &IRModule, values: &[ValueId]) -> String {
    values
        .iter()
        .map(|id| type_name(module, *id))
        .collect::<Vec<_>>()
        .join(", ")
}

fn type_name(module: &IRModule, id: ValueId) -> String {
    module
        .value_type(id)
        .map_or_else(|| "<untyped>".to_string(), ToString::to_string)
}
