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

//! Dialect definitions and their conversion patterns.

pub mod check;
pub mod hal;
pub mod vm;

use crate::conversion::UNREALIZED_CAST_OP;
use crate::ir::{Dialect, OpDefinition, CONSTANT_OP};

const BUILTIN_OPS: &[OpDefinition] = &[OpDefinition::fixed(
    UNREALIZED_CAST_OP,
    1,
    1,
    "Placeholder cast between types of different layers.",
)];

const STD_OPS: &[OpDefinition] = &[OpDefinition::fixed(
    CONSTANT_OP,
    0,
    1,
    "Materializes the `value` attribute as an SSA value.",
)];

pub fn builtin_dialect() -> Dialect {
    Dialect {
        namespace: "builtin",
        ops: BUILTIN_OPS,
    }
}

pub fn std_dialect() -> Dialect {
    Dialect {
        namespace: "std",
        ops: STD_OPS,
    }
}

/// Every dialect shipped with the crate.
pub fn all_dialects() -> Vec<Dialect> {
    vec![
        builtin_dialect(),
        std_dialect(),
        check::dialect(),
        hal::dialect(),
        vm::dialect(),
    ]
}
