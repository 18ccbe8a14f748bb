//! Doctor – gather environment facts and check the external tools the
//! probes shell out to.
//!
//! The doctor only reports. It never installs packages; the CLI prints an
//! `apt-get install` line for whatever is missing.

use crate::context::ProbeContext;
use crate::types::*;
use serde::Serialize;
use std::path::Path;

/// External tools used by the probe catalogue and the Debian package that
/// ships each one.
const TOOLS: &[(&str, &str)] = &[
    ("hciconfig", "bluez"),
    ("hcitool", "bluez"),
    ("iwconfig", "wireless-tools"),
    ("iwlist", "wireless-tools"),
    ("speedtest-cli", "speedtest-cli"),
    ("raspistill", "libraspberrypi-bin"),
    ("libcamera-still", "libcamera-apps"),
    ("amixer", "alsa-utils"),
    ("aplay", "alsa-utils"),
    ("netstat", "net-tools"),
    ("lsusb", "usbutils"),
    ("ping", "iputils-ping"),
    ("dd", "coreutils"),
    ("df", "coreutils"),
];

const VCGENCMD_PACKAGE: &str = "libraspberrypi-bin";

#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub package: String,
    pub installed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub os_name: String,
    pub os_version: String,
    pub kernel: String,
    pub arch: String,
    /// Board model from the device tree, when there is one.
    pub board: Option<String>,
    pub user_id: Option<u32>,
    pub is_root: bool,
    pub headless: bool,
    pub tools: Vec<ToolStatus>,
}

impl DoctorReport {
    /// Packages providing at least one missing tool, de-duplicated, in
    /// catalogue order.
    pub fn missing_packages(&self) -> Vec<&str> {
        let mut packages: Vec<&str> = Vec::new();
        for tool in self.tools.iter().filter(|t| !t.installed) {
            if !packages.contains(&tool.package.as_str()) {
                packages.push(&tool.package);
            }
        }
        packages
    }

    pub fn all_tools_present(&self) -> bool {
        self.tools.iter().all(|t| t.installed)
    }
}

pub async fn run_doctor(ctx: &ProbeContext) -> DoctorReport {
    let user_id = user_id(ctx).await;
    DoctorReport {
        os_name: current_os().to_string(),
        os_version: os_version(ctx),
        kernel: kernel_version(ctx),
        arch: std::env::consts::ARCH.to_string(),
        board: board_model(ctx),
        user_id,
        is_root: user_id == Some(0),
        headless: detect_headless(),
        tools: tool_statuses(ctx),
    }
}

fn tool_statuses(ctx: &ProbeContext) -> Vec<ToolStatus> {
    let vcgencmd = ctx.settings.vcgencmd.as_str();
    std::iter::once((vcgencmd, VCGENCMD_PACKAGE))
        .chain(TOOLS.iter().copied())
        .map(|(name, package)| ToolStatus {
            name: name.to_string(),
            package: package.to_string(),
            installed: ctx.commands().is_installed(name),
        })
        .collect()
}

fn os_version(ctx: &ProbeContext) -> String {
    ctx.fs()
        .read_to_string(Path::new("/etc/os-release"))
        .ok()
        .and_then(|content| {
            content.lines().find_map(|line| {
                line.strip_prefix("PRETTY_NAME=")
                    .map(|v| v.trim_matches('"').to_string())
            })
        })
        .unwrap_or_else(|| "unknown".into())
}

fn kernel_version(ctx: &ProbeContext) -> String {
    ctx.fs()
        .read_to_string(Path::new("/proc/sys/kernel/osrelease"))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".into())
}

fn board_model(ctx: &ProbeContext) -> Option<String> {
    let raw = ctx
        .fs()
        .read_to_string(Path::new("/proc/device-tree/model"))
        .ok()?;
    // The device tree string is NUL terminated.
    let model = raw.trim_end_matches('\0').trim();
    (!model.is_empty()).then(|| model.to_string())
}

/// Effective UID via `id -u`.
async fn user_id(ctx: &ProbeContext) -> Option<u32> {
    let out = ctx.commands().run("id", &["-u"]).await.ok()?;
    if !out.success() {
        return None;
    }
    out.stdout.trim().parse().ok()
}
