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

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use crate::hal::dylib::executable::{fingerprint, DyLibExecutable};
use crate::hal::{Executable, ExecutableCache, ExecutableFormat, ExecutableSpec, Fingerprint, HalError};

/// Executable cache preparing `DLIB` payloads.
///
/// Prepared executables are keyed by content fingerprint, so preparing the
/// same payload twice yields the same `Arc`.
#[derive(Default)]
pub struct DyLibExecutableCache {
    executables: Mutex<HashMap<Fingerprint, Arc<DyLibExecutable>>>,
}

impl DyLibExecutableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executables currently cached.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recovers from poisoning: a panic while loading never leaves a partial
    /// entry in the map.
    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, Arc<DyLibExecutable>>> {
        match self.executables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ExecutableCache for DyLibExecutableCache {
    fn can_prepare_format(&self, format: ExecutableFormat) -> bool {
        format == ExecutableFormat::DYLIB
    }

    fn prepare_executable(&self, spec: &ExecutableSpec) -> Result<Arc<dyn Executable>, HalError> {
        if !self.can_prepare_format(spec.format) {
            return Err(HalError::UnsupportedFormat(spec.format));
        }

        let key = fingerprint(spec);
        let mut executables = self.lock();
        if let Some(existing) = executables.get(&key) {
            trace!(fingerprint = %key, "executable cache hit");
            return Ok(Arc::clone(existing) as Arc<dyn Executable>);
        }

        let executable = Arc::new(DyLibExecutable::load(spec)?);
        executables.insert(key, Arc::clone(&executable));
        Ok(executable)
    }
}
