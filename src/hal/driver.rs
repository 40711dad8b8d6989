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

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::hal::dylib::DyLibDriver;
use crate::hal::{Device, DeviceInfo, HalError};

/// Factory for the devices of one backend.
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    fn enumerate_available_devices(&self) -> Result<Vec<DeviceInfo>, HalError>;

    fn create_device(&self, info: DeviceInfo) -> Result<Arc<dyn Device>, HalError>;

    /// Creates the first enumerated device.
    fn create_default_device(&self) -> Result<Arc<dyn Device>, HalError> {
        let info = self
            .enumerate_available_devices()?
            .into_iter()
            .next()
            .ok_or_else(|| HalError::NoDevices(self.name().to_string()))?;
        self.create_device(info)
    }
}

/// Drivers addressable by name.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every driver built into this crate.
    pub fn with_default_drivers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DyLibDriver::new()));
        registry
    }

    /// Registers `driver`, replacing any driver of the same name.
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        debug!(driver = driver.name(), "registered HAL driver");
        self.drivers.insert(driver.name().to_string(), driver);
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Driver>, HalError> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| HalError::DriverNotFound {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }
}
