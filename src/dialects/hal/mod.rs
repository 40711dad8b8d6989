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

//! The `hal` dialect: device-neutral buffers and buffer views.

mod conversion;

use crate::conversion::TypeConverter;
use crate::ir::{Dialect, OpDefinition, Type};

pub use conversion::HalOpConversion;

/// Exports a tensor value as a buffer view.
pub const TENSOR_EXPORT_OP: &str = "hal.tensor.export";
/// Imports a buffer view as a tensor value.
pub const TENSOR_IMPORT_OP: &str = "hal.tensor.import";

const HAL_OPS: &[OpDefinition] = &[
    OpDefinition::fixed(TENSOR_EXPORT_OP, 1, 1, "Wraps tensor storage in a buffer view."),
    OpDefinition::fixed(TENSOR_IMPORT_OP, 1, 1, "Reads a buffer view as a tensor."),
];

pub fn dialect() -> Dialect {
    Dialect {
        namespace: "hal",
        ops: HAL_OPS,
    }
}

/// Type converter for lowering tensor programs onto the HAL.
///
/// Tensors become buffer views; every other type is already legal.
pub fn hal_type_converter() -> TypeConverter {
    let mut converter = TypeConverter::identity();
    converter.add_conversion(|ty| ty.is_tensor().then_some(Type::BufferView));
    converter.add_materialization(|from, to| match (from, to) {
        (Type::Tensor(_), Type::BufferView) => Some(TENSOR_EXPORT_OP),
        (Type::BufferView, Type::Tensor(_)) => Some(TENSOR_IMPORT_OP),
        _ => None,
    });
    converter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ScalarType;

    #[test]
    fn tensors_become_buffer_views() {
        let converter = hal_type_converter();
        let tensor = Type::tensor(ScalarType::I32, &[3, 3]);
        assert_eq!(converter.convert_type(&tensor), Some(Type::BufferView));
        assert_eq!(converter.convert_type(&Type::I1), Some(Type::I1));
        assert_eq!(
            converter.materialization_op(&tensor, &Type::BufferView),
            TENSOR_EXPORT_OP
        );
    }
}
