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

//! STRATA command-line driver: inspect conversion patterns, HAL devices and
//! backends, and lower a sample module.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use strata::config::{self, BackendsConfig, StrataConfig};
use strata::conversion::PatternSet;
use strata::dialects::check;
use strata::dialects::hal::hal_type_converter;
use strata::dialects::vm::vm_type_converter;
use strata::hal::{DriverRegistry, ExecutableFormat};
use strata::ir::{Attribute, Context, IRModule, ScalarType, Type};
use strata::pipeline::{lower_module, LoweringOptions, LoweringTarget};

#[derive(Parser, Debug)]
#[command(name = "strata", author, version, about = "STRATA lowering and HAL tools", long_about = None)]
struct Cli {
    /// Configuration file; defaults to the nearest Strata.toml.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the check-dialect conversion patterns registered for a target.
    Patterns {
        /// hal or vm.
        #[arg(long, default_value = "vm")]
        target: LoweringTarget,
    },
    /// Enumerate the devices of the configured HAL driver.
    Devices {
        /// Driver name, overriding the configuration.
        #[arg(long)]
        driver: Option<String>,
    },
    /// Show the backends results would be compared across.
    Backends {
        /// Comma-delimited backend names, overriding the configuration.
        #[arg(long)]
        targets: Option<String>,
    },
    /// Lower a built-in sample module and print it before and after.
    LowerDemo {
        /// hal or vm; defaults to the configured target.
        #[arg(long)]
        target: Option<LoweringTarget>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Patterns { target } => list_patterns(target),
        Command::Devices { driver } => {
            list_devices(driver.as_deref().unwrap_or(&config.hal.driver))
        }
        Command::Backends { targets } => list_backends(&config.backends, targets.as_deref()),
        Command::LowerDemo { target } => {
            let mut options = config.lowering.options();
            if let Some(target) = target {
                options.target = target;
            }
            lower_demo(&options)
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<StrataConfig> {
    match path {
        Some(path) => StrataConfig::load(path),
        None => {
            let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
            config::discover(&cwd)
        }
    }
}

fn list_patterns(target: LoweringTarget) -> Result<()> {
    let context = Context::with_default_dialects();
    let mut patterns = PatternSet::new();
    match target {
        LoweringTarget::Hal => {
            let converter = Arc::new(hal_type_converter());
            check::populate_check_to_hal_patterns(&context, &mut patterns, &converter);
        }
        LoweringTarget::Vm => {
            let converter = Arc::new(vm_type_converter());
            let imports = check::check_module_imports();
            check::populate_check_to_vm_patterns(&context, &imports, &mut patterns, &converter);
        }
    }
    println!("{} patterns for target {target}:", patterns.len());
    for descriptor in patterns.descriptors() {
        println!("  {descriptor}");
    }
    Ok(())
}

fn list_devices(driver_name: &str) -> Result<()> {
    let registry = DriverRegistry::with_default_drivers();
    let driver = registry.lookup(driver_name)?;
    let devices = driver
        .enumerate_available_devices()
        .with_context(|| format!("Failed to enumerate devices of driver '{driver_name}'"))?;
    if devices.is_empty() {
        println!("driver '{driver_name}' has no available devices");
        return Ok(());
    }
    for info in devices {
        let device = driver.create_device(info)?;
        let cache = device.create_executable_cache();
        let info = device.info();
        println!(
            "#{} {} (features {:#x}, {} executables: {})",
            info.id,
            info.name,
            info.features.bits(),
            ExecutableFormat::DYLIB,
            if cache.can_prepare_format(ExecutableFormat::DYLIB) {
                "yes"
            } else {
                "no"
            }
        );
    }
    Ok(())
}

fn list_backends(config: &BackendsConfig, targets: Option<&str>) -> Result<()> {
    for backend in config.select(targets)? {
        println!("{backend}");
    }
    println!("results compared with rtol = {}, atol = {}", config.rtol, config.atol);
    Ok(())
}

fn demo_module() -> IRModule {
    let mut module = IRModule::new();
    let lhs = module.add_argument(Type::tensor(ScalarType::F32, &[2, 2]));
    let rhs = module.add_argument(Type::tensor(ScalarType::F32, &[2, 2]));
    let predicate = module.constant(Attribute::Bool(true), Type::I1);
    check::expect_true(&mut module, predicate);
    check::expect_eq(&mut module, lhs, rhs);
    check::expect_almost_eq(&mut module, lhs, rhs, Some(1e-3));
    module
}

fn lower_demo(options: &LoweringOptions) -> Result<()> {
    let context = Context::with_default_dialects();
    let imports = check::check_module_imports();
    let mut module = demo_module();
    println!("// input\n{module}");
    let report = lower_module(&mut module, &context, &imports, options)
        .with_context(|| format!("Failed to lower sample module to {}", options.target))?;
    println!("// lowered to {}\n{module}", options.target);
    println!("// {report:?}");
    Ok(())
}
