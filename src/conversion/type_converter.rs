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

use std::fmt;

use crate::ir::Type;

/// Op inserted when no materialization is registered for a pair of types.
pub const UNREALIZED_CAST_OP: &str = "builtin.unrealized_conversion_cast";

type ConversionFn = Box<dyn Fn(&Type) -> Option<Type> + Send + Sync>;
type MaterializationFn = Box<dyn Fn(&Type, &Type) -> Option<&'static str> + Send + Sync>;

/// Maps source-layer types to their destination-layer equivalents.
///
/// Conversions are tried most-recently-registered first; the first callback
/// returning `Some` decides. Materializations name the op used to cast a
/// value whose current type differs from the one a pattern needs.
#[derive(Default)]
pub struct TypeConverter {
    conversions: Vec<ConversionFn>,
    materializations: Vec<MaterializationFn>,
}

impl TypeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A converter that maps every type to itself.
    pub fn identity() -> Self {
        let mut converter = Self::new();
        converter.add_conversion(|ty| Some(ty.clone()));
        converter
    }

    pub fn add_conversion<F>(&mut self, f: F)
    where
        F: Fn(&Type) -> Option<Type> + Send + Sync + 'static,
    {
        self.conversions.push(Box::new(f));
    }

    pub fn add_materialization<F>(&mut self, f: F)
    where
        F: Fn(&Type, &Type) -> Option<&'static str> + Send + Sync + 'static,
    {
        self.materializations.push(Box::new(f));
    }

    pub fn convert_type(&self, ty: &Type) -> Option<Type> {
        self.conversions.iter().rev().find_map(|f| f(ty))
    }

    /// A type is legal when it converts to itself.
    pub fn is_legal(&self, ty: &Type) -> bool {
        self.convert_type(ty).as_ref() == Some(ty)
    }

    pub fn materialization_op(&self, from: &Type, to: &Type) -> &'static str {
        self.materializations
            .iter()
            .rev()
            .find_map(|f| f(from, to))
            .unwrap_or(UNREALIZED_CAST_OP)
    }
}

impl fmt::Debug for TypeConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeConverter")
            .field("conversions", &self.conversions.len())
            .field("materializations", &self.materializations.len())
            .finish()
    }
}
