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

use std::io::Write;

use libloading::Library;
use sha2::{Digest, Sha256};
use tempfile::TempPath;
use tracing::debug;

use crate::hal::{Executable, ExecutableSpec, Fingerprint, HalError};

/// Hashes the library payload together with the entry point names.
pub fn fingerprint(spec: &ExecutableSpec) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(&spec.library);
    for name in &spec.entry_points {
        hasher.update([0u8]);
        hasher.update(name.as_bytes());
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    Fingerprint(bytes)
}

/// A shared object loaded from an in-memory payload.
///
/// The payload is spilled to a temporary file because platform loaders only
/// open paths. The file lives as long as the executable. Every declared entry
/// point is resolved at load time; dispatching them is left to the caller.
pub struct DyLibExecutable {
    fingerprint: Fingerprint,
    entry_points: Vec<String>,
    // Field order matters: the library must be closed before its file is
    // removed.
    _library: Library,
    _file: TempPath,
}

impl DyLibExecutable {
    pub fn load(spec: &ExecutableSpec) -> Result<Self, HalError> {
        if spec.library.is_empty() {
            return Err(HalError::InvalidSpec("library payload is empty".to_string()));
        }
        if spec.entry_points.is_empty() {
            return Err(HalError::InvalidSpec(
                "executable declares no entry points".to_string(),
            ));
        }

        let mut file = tempfile::Builder::new()
            .prefix("strata_dylib_")
            .suffix(std::env::consts::DLL_SUFFIX)
            .tempfile()?;
        file.write_all(&spec.library)?;
        file.flush()?;
        let path = file.into_temp_path();

        let library = unsafe { Library::new(&*path) }.map_err(|source| HalError::LoadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        for name in &spec.entry_points {
            unsafe { library.get::<unsafe extern "C" fn()>(name.as_bytes()) }.map_err(
                |source| HalError::MissingEntryPoint {
                    name: name.clone(),
                    source,
                },
            )?;
        }
        let entry_points = spec.entry_points.clone();

        let fingerprint = fingerprint(spec);
        debug!(
            %fingerprint,
            entry_points = entry_points.len(),
            path = %path.display(),
            "loaded dylib executable"
        );
        Ok(Self {
            fingerprint,
            entry_points,
            _library: library,
            _file: path,
        })
    }
}

impl Executable for DyLibExecutable {
    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    fn entry_point_count(&self) -> usize {
        self.entry_points.len()
    }

    fn entry_point_name(&self, ordinal: usize) -> Option<&str> {
        self.entry_points.get(ordinal).map(String::as_str)
    }
}
