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

//! Value types shared by every dialect.
//!
//! # Example
//! ```
//! use strata::ir::{Dim, ScalarType, TensorType, Type};
//! let ty = Type::Tensor(TensorType::new(ScalarType::F32, vec![Dim::Known(2), Dim::Dynamic]));
//! assert_eq!(ty.to_string(), "tensor<2x?xf32>");
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarType {
    I1,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
}

impl ScalarType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::I1 => "i1",
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::F16 => "f16",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarType::I1 | ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64
        )
    }

    pub fn is_float(self) -> bool {
        !self.is_integer()
    }

    pub fn bit_width(self) -> u32 {
        match self {
            ScalarType::I1 => 1,
            ScalarType::I8 => 8,
            ScalarType::I16 | ScalarType::F16 => 16,
            ScalarType::I32 | ScalarType::F32 => 32,
            ScalarType::I64 | ScalarType::F64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dim {
    Known(usize),
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorType {
    pub element: ScalarType,
    pub shape: Vec<Dim>,
}

impl TensorType {
    pub fn new(element: ScalarType, shape: Vec<Dim>) -> Self {
        Self { element, shape }
    }

    /// Convenience constructor for fully static shapes.
    pub fn of(element: ScalarType, dims: &[usize]) -> Self {
        Self::new(element, dims.iter().copied().map(Dim::Known).collect())
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn is_static(&self) -> bool {
        self.shape.iter().all(|dim| matches!(dim, Dim::Known(_)))
    }
}

/// Type of an SSA value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Scalar(ScalarType),
    Tensor(TensorType),
    /// `!hal.buffer_view`: a HAL buffer plus shape and element metadata.
    BufferView,
    /// `!vm.ref<T>`: a reference-counted VM handle to `T`.
    Ref(Box<Type>),
}

impl Type {
    pub const I1: Type = Type::Scalar(ScalarType::I1);
    pub const I32: Type = Type::Scalar(ScalarType::I32);
    pub const I64: Type = Type::Scalar(ScalarType::I64);
    pub const F32: Type = Type::Scalar(ScalarType::F32);

    pub fn tensor(element: ScalarType, dims: &[usize]) -> Self {
        Type::Tensor(TensorType::of(element, dims))
    }

    pub fn vm_ref(inner: Type) -> Self {
        Type::Ref(Box::new(inner))
    }

    pub fn as_scalar(&self) -> Option<ScalarType> {
        match self {
            Type::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&TensorType> {
        match self {
            Type::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Type::Tensor(_))
    }

    pub fn is_buffer_view(&self) -> bool {
        matches!(self, Type::BufferView)
    }

    /// True for values that carry tensor contents at any layer.
    pub fn is_shaped(&self) -> bool {
        match self {
            Type::Tensor(_) | Type::BufferView => true,
            Type::Ref(inner) => inner.is_shaped(),
            Type::Scalar(_) => false,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<")?;
        for dim in &self.shape {
            match dim {
                Dim::Known(n) => write!(f, "{n}x")?,
                Dim::Dynamic => write!(f, "?x")?,
            }
        }
        write!(f, "{}>", self.element)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(s) => write!(f, "{s}"),
            Type::Tensor(t) => write!(f, "{t}"),
            Type::BufferView => write!(f, "!hal.buffer_view"),
            Type::Ref(inner) => write!(f, "!vm.ref<{inner}>"),
        }
    }
}
