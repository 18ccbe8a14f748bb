//! Runtime telemetry from the firmware and procfs: temperature, voltages,
//! load, clocks, codecs, interrupts, uptime.

use super::{read_text, vcgencmd};
use crate::context::ProbeContext;
use crate::registry::{ProbeError, ProbeResult};
use crate::types::ProbeValue;
use std::path::Path;
use std::time::Duration;

const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Codecs the VideoCore may have licensed.
const CODECS: &[&str] = &["MPG2", "WVC1", "VP8", "VP9", "H264", "MJPG"];

/// Value after the `=` of a `key=value` firmware reply.
fn reply_value(reply: &str) -> &str {
    reply
        .split_once('=')
        .map(|(_, v)| v)
        .unwrap_or(reply)
        .trim()
}

/// Degrees Celsius from `temp=48.3'C`.
fn parse_measure_temp(reply: &str) -> ProbeResult<f32> {
    let value = reply_value(reply).trim_end_matches("'C");
    value
        .parse::<f32>()
        .map_err(|_| ProbeError::parse("measure_temp reply", format!("'{}'", reply)))
}

async fn read_temperature(ctx: &ProbeContext) -> ProbeResult<f32> {
    match vcgencmd(ctx, &["measure_temp"]).await {
        Ok(reply) => parse_measure_temp(&reply),
        Err(e) => {
            tracing::debug!(error = %e, "vcgencmd unavailable, reading thermal zone");
            let raw = ctx.fs().read_to_string(Path::new(THERMAL_ZONE)).map_err(|_| {
                ProbeError::Unsupported("No CPU temperature sensor available.".into())
            })?;
            let milli = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| ProbeError::parse(THERMAL_ZONE, format!("'{}'", raw.trim())))?;
            Ok(milli as f32 / 1000.0)
        }
    }
}

pub(super) async fn cpu_temperature(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let celsius = read_temperature(ctx).await?;
    let limit = ctx.settings.temperature_limit_celsius;
    if celsius >= limit {
        return Err(ProbeError::CheckFailed(format!(
            "CPU Temperature: {:.1}'C is at or above the {:.1}'C limit",
            celsius, limit
        )));
    }
    Ok(ProbeValue::text(format!("CPU Temperature: {:.1}'C", celsius)))
}

pub(super) async fn voltages(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let mut fields = Vec::with_capacity(4);
    for (rail, label) in [
        ("core", "Core Voltage"),
        ("sdram_c", "SDRAM_C Voltage"),
        ("sdram_i", "SDRAM_I Voltage"),
        ("sdram_p", "SDRAM_P Voltage"),
    ] {
        let reply = vcgencmd(ctx, &["measure_volts", rail]).await?;
        fields.push((label, reply_value(&reply).to_string()));
    }
    Ok(ProbeValue::map(fields))
}

/// Busy and total jiffies from the aggregate `cpu` line of `/proc/stat`.
fn cpu_jiffies(stat: &str) -> ProbeResult<(u64, u64)> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| ProbeError::parse("/proc/stat", "no aggregate cpu line"))?;
    let values = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProbeError::parse("/proc/stat", e.to_string()))?;
    if values.len() < 4 {
        return Err(ProbeError::parse("/proc/stat", "too few cpu fields"));
    }
    let total: u64 = values.iter().sum();
    // idle + iowait
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Ok((total - idle, total))
}

fn utilization_percent(before: (u64, u64), after: (u64, u64)) -> f64 {
    let busy = after.0.saturating_sub(before.0);
    let total = after.1.saturating_sub(before.1);
    if total == 0 {
        return 0.0;
    }
    busy as f64 * 100.0 / total as f64
}

pub(super) async fn cpu_utilization(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let before = cpu_jiffies(&read_text(ctx, "/proc/stat").await?)?;
    tokio::time::sleep(Duration::from_millis(ctx.settings.cpu_sample_ms)).await;
    let after = cpu_jiffies(&read_text(ctx, "/proc/stat").await?)?;
    Ok(ProbeValue::text(format!(
        "CPU Utilization: {:.1}%",
        utilization_percent(before, after)
    )))
}

pub(super) async fn gpu_memory(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let reply = vcgencmd(ctx, &["get_mem", "gpu"]).await?;
    Ok(ProbeValue::text(format!("GPU Memory: {}", reply_value(&reply))))
}

/// Whole MHz from `frequency(48)=500000000`.
fn parse_clock_mhz(reply: &str) -> ProbeResult<u64> {
    reply_value(reply)
        .parse::<u64>()
        .map(|hz| hz / 1_000_000)
        .map_err(|_| ProbeError::parse("measure_clock reply", format!("'{}'", reply)))
}

pub(super) async fn clock_frequencies(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let mut fields = Vec::with_capacity(3);
    // The 3D block clock is what the firmware reports as the GPU clock.
    for (clock, label) in [
        ("core", "Core Clock Frequency"),
        ("v3d", "GPU Clock Frequency"),
        ("arm", "ARM Clock Frequency"),
    ] {
        let reply = vcgencmd(ctx, &["measure_clock", clock]).await?;
        fields.push((label, format!("{} MHz", parse_clock_mhz(&reply)?)));
    }
    Ok(ProbeValue::map(fields))
}

pub(super) async fn hardware_codecs(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let mut fields = Vec::with_capacity(CODECS.len());
    for codec in CODECS {
        let reply = vcgencmd(ctx, &["codec_enabled", *codec]).await?;
        fields.push((*codec, reply_value(&reply).to_string()));
    }
    Ok(ProbeValue::map(fields))
}

pub(super) async fn irq_statistics(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let interrupts = read_text(ctx, "/proc/interrupts").await?;
    let head: Vec<&str> = interrupts.lines().take(ctx.settings.irq_lines).collect();
    Ok(ProbeValue::text(head.join("\n")))
}

/// `H:MM:SS`, prefixed by `N day(s), ` once the uptime passes a day.
/// Fractional seconds are dropped.
pub fn format_uptime(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    let clock = format!("{}:{:02}:{:02}", hours, minutes, seconds);
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

pub(super) async fn uptime(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let raw = read_text(ctx, "/proc/uptime").await?;
    let secs = raw
        .split_whitespace()
        .next()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| ProbeError::parse("/proc/uptime", format!("'{}'", raw.trim())))?;
    Ok(ProbeValue::text(format!("Uptime: {}", format_uptime(secs))))
}
