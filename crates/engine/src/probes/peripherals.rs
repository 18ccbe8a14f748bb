//! Peripherals: USB, GPIO header, camera connector, audio jack.

use super::{command_error, command_text, vcgencmd};
use crate::context::ProbeContext;
use crate::registry::{ProbeError, ProbeResult};
use crate::traits::CapError;
use crate::types::{new_run_id, ProbeValue};
use std::path::Path;
use std::time::Duration;

const USB_DEVICES: &str = "/sys/bus/usb/devices";
const GPIO_SYSFS: &str = "/sys/class/gpio";

pub(super) async fn usb_ports(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    Ok(ProbeValue::text(command_text(ctx, "lsusb", &[]).await?))
}

/// One entry per root hub; a readable `product` file means something
/// answered on that bus.
pub(super) async fn usb_ports_test(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let base = Path::new(USB_DEVICES);
    let ports: Vec<String> = ctx
        .fs()
        .list_dir(base)
        .unwrap_or_default()
        .into_iter()
        .filter(|name| name.starts_with("usb"))
        .collect();
    if ports.is_empty() {
        return Err(ProbeError::Unsupported("No USB ports found.".into()));
    }

    let fields = ports.into_iter().map(|port| {
        let status = match ctx.fs().read_to_string(&base.join(&port).join("product")) {
            Ok(product) => format!("Device connected: {}", product.trim()),
            Err(_) => "No device connected".to_string(),
        };
        (port, status)
    });
    Ok(ProbeValue::map(fields.collect::<Vec<_>>()))
}

// ---------------------------------------------------------------------------
// GPIO
// ---------------------------------------------------------------------------

/// Global number of BCM line 0. Newer kernels no longer start the SoC
/// controller at 0, so it is looked up from the `pinctrl-*` chip.
fn gpio_chip_base(ctx: &ProbeContext) -> ProbeResult<u32> {
    let root = Path::new(GPIO_SYSFS);
    let chips: Vec<String> = ctx
        .fs()
        .list_dir(root)
        .map_err(|_| ProbeError::Unsupported("GPIO sysfs interface not available.".into()))?
        .into_iter()
        .filter(|n| n.starts_with("gpiochip"))
        .collect();

    let mut fallback = None;
    for chip in &chips {
        let dir = root.join(chip);
        let Ok(base) = ctx.fs().read_to_string(&dir.join("base")) else {
            continue;
        };
        let Ok(base) = base.trim().parse::<u32>() else {
            continue;
        };
        let label = ctx.fs().read_to_string(&dir.join("label")).unwrap_or_default();
        if label.trim().starts_with("pinctrl-") {
            return Ok(base);
        }
        fallback = Some(fallback.map_or(base, |b: u32| b.min(base)));
    }
    fallback.ok_or_else(|| ProbeError::Unsupported("No GPIO controller found.".into()))
}

/// Export `line` unless something already has it. Returns whether this
/// call did the export, so only lines exported here get unexported.
fn claim_pin(ctx: &ProbeContext, line: u32) -> Result<bool, CapError> {
    let root = Path::new(GPIO_SYSFS);
    if ctx.fs().exists(&root.join(format!("gpio{}", line))) {
        return Ok(false);
    }
    ctx.fs().write_file(&root.join("export"), line.to_string().as_bytes())?;
    Ok(true)
}

/// Drive the line high as an output, switch it to an input and read it
/// back.
fn exercise_pin(ctx: &ProbeContext, line: u32) -> Result<bool, CapError> {
    let dir = Path::new(GPIO_SYSFS).join(format!("gpio{}", line));
    ctx.fs().write_file(&dir.join("direction"), b"out")?;
    ctx.fs().write_file(&dir.join("value"), b"1")?;
    ctx.fs().write_file(&dir.join("direction"), b"in")?;
    let value = ctx.fs().read_to_string(&dir.join("value"))?;
    Ok(value.trim() == "1")
}

pub(super) async fn gpio_pins_test(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let base = gpio_chip_base(ctx)?;
    let unexport = Path::new(GPIO_SYSFS).join("unexport");

    let mut failed = Vec::new();
    for &pin in &ctx.settings.gpio_pins {
        let line = base + pin;
        let (claimed, outcome) = match claim_pin(ctx, line) {
            Ok(claimed) => (claimed, exercise_pin(ctx, line)),
            Err(e) => (false, Err(e)),
        };
        if claimed {
            if let Err(e) = ctx.fs().write_file(&unexport, line.to_string().as_bytes()) {
                tracing::debug!(pin, error = %e, "unexport failed");
            }
        }
        match outcome {
            Ok(true) => {}
            Ok(false) => failed.push(pin),
            Err(CapError::PermissionDenied(m)) => return Err(ProbeError::PermissionDenied(m)),
            Err(e) => {
                tracing::debug!(pin, error = %e, "gpio line not usable");
                failed.push(pin);
            }
        }
    }

    if failed.is_empty() {
        Ok(ProbeValue::text("All GPIO pins are functioning correctly."))
    } else {
        let list: Vec<String> = failed.iter().map(u32::to_string).collect();
        Err(ProbeError::CheckFailed(format!(
            "GPIO pins with potential issues: {}",
            list.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

pub(super) async fn camera_port_test(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let reply = vcgencmd(ctx, &["get_camera"]).await?;
    // libcamera stacks report the legacy fields as 0.
    let libcamera = reply.contains("libcamera interfaces=1");
    if !reply.contains("supported=1") && !libcamera {
        return Err(ProbeError::Unsupported(
            "Camera module not supported. Ensure camera interface is enabled via raspi-config."
                .into(),
        ));
    }
    if reply.contains("detected=0") && !libcamera {
        return Err(ProbeError::Unsupported(
            "No camera detected on the camera port.".into(),
        ));
    }

    let tool = ctx
        .settings
        .camera_tools
        .iter()
        .find(|t| ctx.commands().is_installed(t))
        .ok_or_else(|| {
            ProbeError::DependencyMissing(format!(
                "No still-capture tool installed (tried {}).",
                ctx.settings.camera_tools.join(", ")
            ))
        })?;

    let image = ctx
        .fs()
        .temp_dir()
        .join(format!("selftest-{}.jpg", &new_run_id()[..8]));
    let result = capture(ctx, tool, &image).await;
    if ctx.fs().exists(&image) {
        if let Err(e) = ctx.fs().remove_file(&image) {
            tracing::warn!(path = %image.display(), error = %e, "could not remove test image");
        }
    }
    result
}

async fn capture(ctx: &ProbeContext, tool: &str, image: &Path) -> ProbeResult<ProbeValue> {
    let path = image.display().to_string();
    let timeout = Duration::from_secs(ctx.settings.camera_timeout_secs);
    let out = match ctx
        .commands()
        .run_with_timeout(tool, &["-o", &path, "-t", "1"], timeout)
        .await
    {
        Ok(out) => out,
        Err(CapError::Timeout) => {
            return Err(ProbeError::Timeout(format!(
                "{} did not finish within {}s",
                tool, ctx.settings.camera_timeout_secs
            )))
        }
        Err(e) => return Err(e.into()),
    };
    if !out.success() {
        return Err(command_error(tool, &out));
    }
    if !ctx.fs().exists(image) {
        return Err(ProbeError::CheckFailed(
            "Camera capture failed. No image was written.".into(),
        ));
    }
    let size = ctx.fs().file_size(image)?;
    Ok(ProbeValue::text(format!(
        "Camera is functioning correctly. Test image size: {} bytes.",
        size
    )))
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

pub(super) async fn audio_jack_test(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let sound = &ctx.settings.test_sound;
    if !ctx.fs().exists(sound) {
        return Err(ProbeError::DependencyMissing(format!(
            "Test sound {} not found.",
            sound.display()
        )));
    }

    // numid=3 is the output route: 0 auto, 1 analogue jack, 2 HDMI.
    let route = command_text(ctx, "amixer", &["cget", "numid=3"]).await?;
    if !route.contains(": values=1") {
        command_text(ctx, "amixer", &["cset", "numid=3", "1"]).await?;
    }

    let sound = sound.display().to_string();
    command_text(ctx, "aplay", &[&sound]).await?;

    Ok(ProbeValue::text(
        "Attempted to play a test sound through the audio jack.\nPlease confirm if the sound played correctly from connected speakers or headphones.",
    ))
}
