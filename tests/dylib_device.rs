use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use strata::hal::dylib::{DyLibDevice, DyLibDriver, DyLibExecutableCache};
use strata::hal::{
    Device, DeviceFeatures, DeviceInfo, Driver, DriverRegistry, ExecutableCache, ExecutableFormat,
    ExecutableSpec, HalError, InlineSchedulingModel, SchedulingModel, Submission,
};

/// Scheduling model that counts how often it is dropped.
struct CountingModel {
    inner: InlineSchedulingModel,
    drops: Arc<AtomicUsize>,
}

impl SchedulingModel for CountingModel {
    fn name(&self) -> &str {
        "counting"
    }

    fn submit(&self, batch: Vec<Submission>) -> Result<(), HalError> {
        self.inner.submit(batch)
    }

    fn wait_idle(&self) -> Result<(), HalError> {
        self.inner.wait_idle()
    }
}

impl Drop for CountingModel {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting_device(drops: &Arc<AtomicUsize>) -> DyLibDevice {
    DyLibDevice::new(
        DeviceInfo::new(3, "dylib-test", DeviceFeatures::PROFILING),
        Box::new(CountingModel {
            inner: InlineSchedulingModel::new(),
            drops: Arc::clone(drops),
        }),
    )
}

fn system_library() -> Option<&'static Path> {
    [
        "/lib/x86_64-linux-gnu/libm.so.6",
        "/usr/lib/x86_64-linux-gnu/libm.so.6",
        "/lib/aarch64-linux-gnu/libm.so.6",
        "/usr/lib/aarch64-linux-gnu/libm.so.6",
        "/lib64/libm.so.6",
        "/usr/lib64/libm.so.6",
        "/usr/lib/libm.so.6",
    ]
    .into_iter()
    .map(Path::new)
    .find(|path| path.is_file())
}

#[test]
fn device_owns_info_and_scheduling_model() {
    let drops = Arc::new(AtomicUsize::new(0));
    let device = counting_device(&drops);

    assert_eq!(device.info().id, 3);
    assert_eq!(device.info().name, "dylib-test");
    assert!(device.info().features.contains(DeviceFeatures::PROFILING));
    assert_eq!(device.host().scheduling_model().name(), "counting");
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(device);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn every_cache_request_returns_a_new_cache() {
    let drops = Arc::new(AtomicUsize::new(0));
    let device = counting_device(&drops);

    let first = device.create_executable_cache();
    let second = device.create_executable_cache();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(Arc::strong_count(&first), 1);
}

#[test]
fn caches_outlive_their_device() {
    let drops = Arc::new(AtomicUsize::new(0));
    let device = counting_device(&drops);
    let cache = device.create_executable_cache();

    drop(device);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(cache.can_prepare_format(ExecutableFormat::DYLIB));
}

#[test]
fn caches_are_shareable_across_threads() {
    let drops = Arc::new(AtomicUsize::new(0));
    let device = counting_device(&drops);
    let cache = device.create_executable_cache();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.can_prepare_format(ExecutableFormat::DYLIB))
        })
        .collect();
    for handle in handles {
        assert!(handle.join().expect("thread finished"));
    }
}

#[test]
fn submissions_run_through_the_scheduling_model() {
    let drops = Arc::new(AtomicUsize::new(0));
    let device = counting_device(&drops);
    let log = Arc::new(Mutex::new(Vec::new()));

    let batch: Vec<Submission> = ["a", "b"]
        .into_iter()
        .map(|tag| {
            let log = Arc::clone(&log);
            Box::new(move || {
                log.lock().unwrap().push(tag);
                Ok(())
            }) as Submission
        })
        .collect();
    device.submit(batch).expect("submit");
    device.wait_idle().expect("idle");

    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
}

#[test]
fn garbage_payloads_fail_to_load() {
    let cache = DyLibExecutableCache::new();
    let spec = ExecutableSpec {
        format: ExecutableFormat::DYLIB,
        library: b"\x7fELF but not really".to_vec(),
        entry_points: vec!["main".to_string()],
    };
    let err = cache.prepare_executable(&spec).err().expect("load fails");
    assert!(matches!(err, HalError::LoadFailed { .. }), "{err}");
    assert!(cache.is_empty());
}

#[test]
fn system_library_loads_and_is_cached_by_content() {
    let Some(path) = system_library() else {
        return;
    };
    let library = std::fs::read(path).expect("read system library");
    let spec = ExecutableSpec {
        format: ExecutableFormat::DYLIB,
        library,
        entry_points: vec!["cos".to_string(), "sin".to_string()],
    };

    let cache = DyLibExecutableCache::new();
    let first = cache.prepare_executable(&spec).expect("load");
    let second = cache.prepare_executable(&spec).expect("cached");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
    assert_eq!(first.entry_point_count(), 2);
    assert_eq!(first.entry_point_name(1), Some("sin"));
    assert_eq!(first.entry_point_name(2), None);

    let missing = ExecutableSpec {
        entry_points: vec!["strata_no_such_symbol".to_string()],
        ..spec
    };
    let err = cache.prepare_executable(&missing).err().expect("symbol missing");
    assert!(matches!(err, HalError::MissingEntryPoint { .. }), "{err}");
}

#[test]
fn driver_creates_default_dylib_device() {
    if !DyLibDriver::is_supported() {
        return;
    }
    let registry = DriverRegistry::with_default_drivers();
    let driver = registry.lookup(DyLibDriver::NAME).expect("registered");
    let device = driver.create_default_device().expect("device");
    assert_eq!(device.info().name, DyLibDriver::NAME);
    assert!(device
        .create_executable_cache()
        .can_prepare_format(ExecutableFormat::DYLIB));
}

#[test]
fn driver_without_devices_reports_it() {
    struct EmptyDriver;

    impl Driver for EmptyDriver {
        fn name(&self) -> &str {
            "empty"
        }

        fn enumerate_available_devices(&self) -> Result<Vec<DeviceInfo>, HalError> {
            Ok(Vec::new())
        }

        fn create_device(&self, _info: DeviceInfo) -> Result<Arc<dyn Device>, HalError> {
            unreachable!("no devices to create")
        }
    }

    let err = EmptyDriver.create_default_device().err().expect("no device");
    assert_eq!(err.to_string(), "no devices available for driver 'empty'");
}
