//! DSI and HDMI outputs. Each test checks the firmware's view of the port
//! and then paints a solid colour straight into the framebuffer.

use super::vcgencmd;
use crate::context::ProbeContext;
use crate::registry::{ProbeError, ProbeResult};
use crate::types::ProbeValue;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DSI_DISPLAY: &str = "4";
const HDMI_DISPLAY: &str = "2";
const TOUCHSCREEN: &str = "/dev/input/touchscreen";

const RED: (u8, u8, u8) = (255, 0, 0);
const GREEN: (u8, u8, u8) = (0, 255, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    width: u32,
    height: u32,
    bits_per_pixel: u32,
    /// Bytes per line, including any padding after the last pixel.
    stride: u32,
}

fn parse_virtual_size(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.trim().split_once(',')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Geometry of the configured framebuffer from `/sys/class/graphics/<fb>`.
fn framebuffer_geometry(ctx: &ProbeContext) -> ProbeResult<Geometry> {
    let fb = &ctx.settings.framebuffer;
    let name = fb
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sysfs = PathBuf::from("/sys/class/graphics").join(&name);

    let size = ctx.fs().read_to_string(&sysfs.join("virtual_size"))?;
    let (width, height) = parse_virtual_size(&size)
        .ok_or_else(|| ProbeError::parse("framebuffer virtual_size", format!("'{}'", size.trim())))?;
    let bpp = ctx.fs().read_to_string(&sysfs.join("bits_per_pixel"))?;
    let bits_per_pixel = bpp
        .trim()
        .parse()
        .map_err(|_| ProbeError::parse("framebuffer bits_per_pixel", format!("'{}'", bpp.trim())))?;
    // Older drivers do not expose stride; lines are then unpadded.
    let stride = ctx
        .fs()
        .read_to_string(&sysfs.join("stride"))
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(width * bits_per_pixel / 8);
    Ok(Geometry {
        width,
        height,
        bits_per_pixel,
        stride,
    })
}

/// One frame of a single colour in the framebuffer's pixel format.
fn solid_frame(geometry: Geometry, (r, g, b): (u8, u8, u8)) -> ProbeResult<Vec<u8>> {
    let pixel: Vec<u8> = match geometry.bits_per_pixel {
        32 => vec![b, g, r, 0xff],
        24 => vec![b, g, r],
        16 => {
            let rgb565 = (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3);
            rgb565.to_le_bytes().to_vec()
        }
        other => {
            return Err(ProbeError::Unsupported(format!(
                "Unsupported framebuffer depth: {} bits per pixel.",
                other
            )))
        }
    };
    let mut line = pixel.repeat(geometry.width as usize);
    line.resize(line.len().max(geometry.stride as usize), 0);
    Ok(line.repeat(geometry.height as usize))
}

/// Paint the whole screen, hold it for the configured time, then put the
/// previous contents back.
async fn show_pattern(ctx: &ProbeContext, colour: (u8, u8, u8)) -> ProbeResult<Geometry> {
    let fb: &Path = &ctx.settings.framebuffer;
    if !ctx.fs().exists(fb) {
        return Err(ProbeError::Unsupported(format!(
            "Framebuffer {} not available.",
            fb.display()
        )));
    }
    let geometry = framebuffer_geometry(ctx)?;
    let frame = solid_frame(geometry, colour)?;

    let saved = ctx.fs().read_file(fb)?;
    ctx.fs().write_file(fb, &frame)?;
    tokio::time::sleep(Duration::from_secs(ctx.settings.display_pattern_secs)).await;
    if let Err(e) = ctx.fs().write_file(fb, &saved) {
        tracing::warn!(framebuffer = %fb.display(), error = %e, "could not restore screen contents");
    }
    Ok(geometry)
}

fn is_powered_off(reply: &str) -> bool {
    reply.contains("display_power=0")
}

pub(super) async fn display_port_test(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let power = vcgencmd(ctx, &["display_power", DSI_DISPLAY]).await?;
    if is_powered_off(&power) {
        return Err(ProbeError::Unsupported(
            "Display port (DSI) is not active. Ensure it's correctly set up and connected.".into(),
        ));
    }

    // Only the official touch display creates this node.
    if !ctx.fs().exists(Path::new(TOUCHSCREEN)) {
        return Err(ProbeError::Unsupported(
            "No touchscreen detected on the DSI port. If you're using a non-official screen, manual inspection is recommended.".into(),
        ));
    }

    show_pattern(ctx, RED).await?;
    Ok(ProbeValue::text(
        "Display port (DSI) is active and a display appears to be connected. A red test pattern was displayed.",
    ))
}

/// Value of `key=value` in `vcgencmd get_config int` output.
fn config_value<'a>(config: &'a str, key: &str) -> Option<&'a str> {
    config.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        (k == key).then_some(v)
    })
}

pub(super) async fn hdmi_port_test(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let power = vcgencmd(ctx, &["display_power", HDMI_DISPLAY]).await?;
    if is_powered_off(&power) {
        return Err(ProbeError::Unsupported(
            "HDMI port is not active or no monitor is detected.".into(),
        ));
    }

    let config = vcgencmd(ctx, &["get_config", "int"]).await?;
    let setting = |key: &str| config_value(&config, key).unwrap_or("not set").to_string();

    let geometry = show_pattern(ctx, GREEN).await?;

    let mut fields = vec![
        (
            "Status",
            format!(
                "HDMI port seems active. A green test pattern was displayed on a screen with resolution {}x{}.",
                geometry.width, geometry.height
            ),
        ),
        ("Current HDMI Mode", setting("hdmi_mode")),
        ("Current HDMI Group", setting("hdmi_group")),
        ("Current HDMI Drive", setting("hdmi_drive")),
    ];
    if let Some(timings) = config_value(&config, "hdmi_timings") {
        fields.push(("HDMI Timings", timings.to_string()));
    }
    Ok(ProbeValue::map(fields))
}
