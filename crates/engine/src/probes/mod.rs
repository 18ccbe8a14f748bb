//! Built-in hardware probes and the default registry.
//!
//! Every probe reaches the OS through the capability traits on
//! [`ProbeContext`], never through `std::fs` or `std::process` directly.

mod board;
mod display;
mod network;
mod peripherals;
mod storage;
mod telemetry;

use crate::context::ProbeContext;
use crate::registry::{ProbeError, ProbeFn, ProbeFuture, ProbeRegistry, ProbeResult, RegistryError};
use crate::settings::ProbeSettings;
use crate::traits::CommandOutput;
use std::path::Path;
use std::sync::Arc;

pub use board::{describe_revision, header_pin_count};
pub use telemetry::format_uptime;

macro_rules! probe_table {
    ($($name:literal => $func:path),* $(,)?) => {
        /// Names and entry points of every built-in probe, in run order.
        pub fn builtin_probes() -> Vec<(&'static str, ProbeFn)> {
            vec![$(($name, {
                fn call(ctx: &ProbeContext) -> ProbeFuture<'_> {
                    Box::pin($func(ctx))
                }
                call as ProbeFn
            })),*]
        }
    };
}

probe_table! {
    "Raspberry Pi Version" => board::raspberry_pi_version,
    "Memory Info" => board::memory_info,
    "CPU Info" => board::cpu_info,
    "SD Card Performance" => storage::sd_card_performance,
    "Ethernet Port Status" => network::ethernet_port_status,
    "Ethernet Speed" => network::ethernet_speed,
    "Wifi Adapter Status" => network::wifi_adapter_status,
    "Wifi Availability" => network::wifi_availability,
    "Bluetooth Availability" => network::bluetooth_availability,
    "USB Ports" => peripherals::usb_ports,
    "USB Ports Test" => peripherals::usb_ports_test,
    "GPIO Pins" => board::gpio_pins,
    "GPIO Pins Test" => peripherals::gpio_pins_test,
    "Camera Port Test" => peripherals::camera_port_test,
    "Display Port" => display::display_port_test,
    "HDMI Port" => display::hdmi_port_test,
    "Audio Jack" => peripherals::audio_jack_test,
    "CPU Temperature" => telemetry::cpu_temperature,
    "Voltages" => telemetry::voltages,
    "CPU Utilization" => telemetry::cpu_utilization,
    "GPU Memory" => telemetry::gpu_memory,
    "Clock Frequencies" => telemetry::clock_frequencies,
    "Disk I/O" => storage::disk_io,
    "Hardware Codecs" => telemetry::hardware_codecs,
    "IRQ (Interrupts) Statistics" => telemetry::irq_statistics,
    "Network Statistics" => network::network_statistics,
    "Bluetooth Info" => network::bluetooth_info,
    "Storage Space" => storage::storage_space,
    "Uptime" => telemetry::uptime,
    "Internet Connectivity" => network::internet_connectivity,
}

/// Registry holding every built-in probe except those named in
/// `settings.skip`.
pub fn default_registry(settings: &ProbeSettings) -> Result<ProbeRegistry, RegistryError> {
    let mut registry = ProbeRegistry::new();
    for (name, func) in builtin_probes() {
        if settings.skip.iter().any(|s| s == name) {
            tracing::debug!(probe = name, "skipped by configuration");
            continue;
        }
        registry.register(name, Arc::new(func))?;
    }
    Ok(registry)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn command_error(program: &str, out: &CommandOutput) -> ProbeError {
    ProbeError::Command {
        program: program.to_string(),
        code: out
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string()),
        output: out.combined(),
    }
}

/// Run a command that must succeed and return everything it printed.
async fn command_text(ctx: &ProbeContext, program: &str, args: &[&str]) -> ProbeResult<String> {
    let out = ctx.commands().run(program, args).await?;
    if !out.success() {
        return Err(command_error(program, &out));
    }
    Ok(out.combined())
}

/// Query the firmware through `vcgencmd` and return its trimmed stdout.
async fn vcgencmd(ctx: &ProbeContext, args: &[&str]) -> ProbeResult<String> {
    let program = ctx.settings.vcgencmd.as_str();
    let out = ctx.commands().run(program, args).await?;
    if !out.success() {
        return Err(command_error(program, &out));
    }
    Ok(out.stdout.trim().to_string())
}

async fn read_text(ctx: &ProbeContext, path: &str) -> ProbeResult<String> {
    Ok(ctx.fs().read_to_string(Path::new(path))?)
}

/// One ICMP echo to the configured host. Any failure, including a missing
/// `ping` binary, counts as unreachable.
async fn can_ping(ctx: &ProbeContext) -> bool {
    let host = ctx.settings.ping_host.as_str();
    match ctx.commands().run("ping", &["-c", "1", host]).await {
        Ok(out) => out.success(),
        Err(e) => {
            tracing::debug!(error = %e, "ping unavailable");
            false
        }
    }
}

fn interface_present(ctx: &ProbeContext, iface: &str) -> bool {
    ctx.fs()
        .list_dir(Path::new("/sys/class/net"))
        .map(|names| names.iter().any(|n| n == iface))
        .unwrap_or(false)
}
