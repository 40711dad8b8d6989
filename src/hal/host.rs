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

use std::sync::atomic::{AtomicU64, Ordering};

use crate::hal::{DeviceInfo, HalError};

/// One unit of host work.
pub type Submission = Box<dyn FnOnce() -> Result<(), HalError> + Send>;

/// Strategy deciding how submitted work is ordered and executed.
pub trait SchedulingModel: Send + Sync {
    fn name(&self) -> &str;

    /// Schedules `batch`; submissions within a batch run in order.
    fn submit(&self, batch: Vec<Submission>) -> Result<(), HalError>;

    /// Blocks until all previously submitted work has completed.
    fn wait_idle(&self) -> Result<(), HalError>;
}

/// Runs every submission synchronously on the submitting thread.
#[derive(Debug, Default)]
pub struct InlineSchedulingModel {
    completed: AtomicU64,
}

impl InlineSchedulingModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of submissions that ran to completion.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

impl SchedulingModel for InlineSchedulingModel {
    fn name(&self) -> &str {
        "inline"
    }

    fn submit(&self, batch: Vec<Submission>) -> Result<(), HalError> {
        for submission in batch {
            submission()?;
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), HalError> {
        // Work finishes inside submit.
        Ok(())
    }
}

/// Shared state of devices that execute on the host CPU.
///
/// Owns the device info and scheduling model; concrete devices embed it and
/// add only their executable cache.
pub struct HostLocalDevice {
    info: DeviceInfo,
    scheduling_model: Box<dyn SchedulingModel>,
}

impl HostLocalDevice {
    pub fn new(info: DeviceInfo, scheduling_model: Box<dyn SchedulingModel>) -> Self {
        Self {
            info,
            scheduling_model,
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn scheduling_model(&self) -> &dyn SchedulingModel {
        self.scheduling_model.as_ref()
    }

    pub fn submit(&self, batch: Vec<Submission>) -> Result<(), HalError> {
        self.scheduling_model.submit(batch)
    }

    pub fn wait_idle(&self) -> Result<(), HalError> {
        self.scheduling_model.wait_idle()
    }
}
