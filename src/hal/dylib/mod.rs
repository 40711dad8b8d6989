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

//! Host device executing programs compiled to native shared objects.

mod executable;
mod executable_cache;

use std::sync::Arc;

use tracing::{info, trace_span};

pub use executable::{fingerprint, DyLibExecutable};
pub use executable_cache::DyLibExecutableCache;

use crate::hal::{
    Device, DeviceFeatures, DeviceInfo, Driver, ExecutableCache, HalError, HostLocalDevice,
    InlineSchedulingModel, SchedulingModel, Submission,
};

/// A host-local device whose executable cache loads `DLIB` payloads.
pub struct DyLibDevice {
    host: HostLocalDevice,
}

impl DyLibDevice {
    /// Takes ownership of `info` and `scheduling_model`; both are released
    /// when the device is dropped.
    pub fn new(info: DeviceInfo, scheduling_model: Box<dyn SchedulingModel>) -> Self {
        info!(
            device = %info.name,
            id = info.id,
            scheduling = scheduling_model.name(),
            "created dylib device"
        );
        Self {
            host: HostLocalDevice::new(info, scheduling_model),
        }
    }

    pub fn host(&self) -> &HostLocalDevice {
        &self.host
    }
}

impl Device for DyLibDevice {
    fn info(&self) -> &DeviceInfo {
        self.host.info()
    }

    fn create_executable_cache(&self) -> Arc<dyn ExecutableCache> {
        let _span = trace_span!("DyLibDevice::create_executable_cache").entered();
        Arc::new(DyLibExecutableCache::new())
    }

    fn submit(&self, batch: Vec<Submission>) -> Result<(), HalError> {
        self.host.submit(batch)
    }

    fn wait_idle(&self) -> Result<(), HalError> {
        self.host.wait_idle()
    }
}

/// Driver producing [`DyLibDevice`]s with inline scheduling.
#[derive(Debug, Default, Clone, Copy)]
pub struct DyLibDriver;

impl DyLibDriver {
    pub const NAME: &'static str = "dylib";

    pub fn new() -> Self {
        Self
    }

    /// Whether this platform can load shared objects at runtime.
    pub fn is_supported() -> bool {
        cfg!(any(unix, windows))
    }
}

impl Driver for DyLibDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enumerate_available_devices(&self) -> Result<Vec<DeviceInfo>, HalError> {
        if !Self::is_supported() {
            return Ok(Vec::new());
        }
        Ok(vec![DeviceInfo::new(0, Self::NAME, DeviceFeatures::NONE)])
    }

    fn create_device(&self, info: DeviceInfo) -> Result<Arc<dyn Device>, HalError> {
        Ok(Arc::new(DyLibDevice::new(
            info,
            Box::new(InlineSchedulingModel::new()),
        )))
    }
}
