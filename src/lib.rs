//! STRATA core library: check-dialect lowering and the dynamic-library HAL
//! device.
pub mod backends;
pub mod config;
pub mod conversion;
pub mod dialects;
pub mod hal;
pub mod pipeline;

pub mod ir;

pub use conversion::{ConversionError, ConversionPattern, PatternSet, TypeConverter};
pub use dialects::check::{populate_check_to_hal_patterns, populate_check_to_vm_patterns};
pub use hal::dylib::DyLibDevice;
pub use hal::{Device, DeviceInfo, ExecutableCache, HalError, SchedulingModel};
pub use ir::{Context, IRModule};
pub use pipeline::{lower_module, LoweringOptions, LoweringTarget, PipelineError};
