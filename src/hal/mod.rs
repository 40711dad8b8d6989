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

//! Hardware abstraction layer runtime.
//!
//! # Architecture
//!
//! A [`Driver`] enumerates [`DeviceInfo`]s and constructs [`Device`]s from
//! them. Devices that execute on the host share [`HostLocalDevice`], which
//! owns the device info and a [`SchedulingModel`] and provides submission and
//! host buffer allocation. Backends differ only in the [`ExecutableCache`]
//! they hand out:
//!
//! | Backend | Device              | Cache                   | Format |
//! |---------|---------------------|-------------------------|--------|
//! | dylib   | [`dylib::DyLibDevice`] | [`dylib::DyLibExecutableCache`] | `DLIB` |

mod driver;
pub mod dylib;
mod host;

use std::fmt;
use std::ops::BitOr;
use std::path::PathBuf;
use std::sync::Arc;

pub use driver::{Driver, DriverRegistry};
pub use host::{HostLocalDevice, InlineSchedulingModel, SchedulingModel, Submission};

/// Capability bits advertised by a device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DeviceFeatures(u32);

impl DeviceFeatures {
    pub const NONE: Self = Self(0);
    pub const DEBUGGING: Self = Self(1 << 0);
    pub const COVERAGE: Self = Self(1 << 1);
    pub const PROFILING: Self = Self(1 << 2);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DeviceFeatures {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Describes one device instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: u64,
    pub name: String,
    pub features: DeviceFeatures,
}

impl DeviceInfo {
    pub fn new(id: u64, name: impl Into<String>, features: DeviceFeatures) -> Self {
        Self {
            id,
            name: name.into(),
            features,
        }
    }
}

/// Four-character code identifying an executable payload format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExecutableFormat(u32);

impl ExecutableFormat {
    /// Native shared objects loaded with the platform dynamic loader.
    pub const DYLIB: Self = Self::fourcc(*b"DLIB");

    pub const fn fourcc(code: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(code))
    }

    pub const fn code(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for ExecutableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.code()))
    }
}

/// Everything an executable cache needs to prepare one executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutableSpec {
    pub format: ExecutableFormat,
    /// Raw payload, e.g. the bytes of a shared object.
    pub library: Vec<u8>,
    /// Exported symbols, addressed by ordinal in declaration order.
    pub entry_points: Vec<String>,
}

/// Content fingerprint (SHA-256) keying prepared executables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A prepared, device-loadable executable.
pub trait Executable: Send + Sync {
    fn fingerprint(&self) -> Fingerprint;

    fn entry_point_count(&self) -> usize;

    fn entry_point_name(&self, ordinal: usize) -> Option<&str>;
}

/// Per-device store of prepared executables.
///
/// Implementations synchronise internally; a cache may be shared across
/// threads and outlive the device that created it.
pub trait ExecutableCache: Send + Sync {
    fn can_prepare_format(&self, format: ExecutableFormat) -> bool;

    /// Prepares `spec`, returning the cached executable when the same content
    /// was prepared before.
    fn prepare_executable(&self, spec: &ExecutableSpec) -> Result<Arc<dyn Executable>, HalError>;
}

/// A logical device work is submitted to.
pub trait Device: Send + Sync {
    fn info(&self) -> &DeviceInfo;

    /// Creates a new executable cache. Every call returns a distinct cache.
    fn create_executable_cache(&self) -> Arc<dyn ExecutableCache>;

    fn submit(&self, batch: Vec<Submission>) -> Result<(), HalError>;

    /// Blocks until all submitted work has completed.
    fn wait_idle(&self) -> Result<(), HalError>;
}

/// Structured errors for HAL runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    #[error("executable format {0} is not supported by this cache")]
    UnsupportedFormat(ExecutableFormat),
    #[error("invalid executable spec: {0}")]
    InvalidSpec(String),
    #[error("failed to load shared library {}: {source}", path.display())]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("entry point '{name}' not found: {source}")]
    MissingEntryPoint {
        name: String,
        #[source]
        source: libloading::Error,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("driver '{name}' is not registered (available: {available})")]
    DriverNotFound { name: String, available: String },
    #[error("no devices available for driver '{0}'")]
    NoDevices(String),
    #[error("submission failed: {0}")]
    Submission(String),
}
