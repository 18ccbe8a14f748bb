//! Board identity: revision code, memory size, CPU model, header layout.

use super::read_text;
use crate::context::ProbeContext;
use crate::registry::{ProbeError, ProbeResult};
use crate::types::ProbeValue;

/// Known revision codes from `/proc/cpuinfo`.
const REVISIONS: &[(&str, &str)] = &[
    ("0002", "Raspberry Pi Model B Rev 1"),
    ("0003", "Raspberry Pi Model B Rev 1 ECN0001 (no fuses, D14 removed)"),
    ("0004", "Raspberry Pi Model B Rev 2"),
    ("0005", "Raspberry Pi Model B Rev 2"),
    ("0006", "Raspberry Pi Model B Rev 2"),
    ("0007", "Raspberry Pi Model A"),
    ("0008", "Raspberry Pi Model A"),
    ("0009", "Raspberry Pi Model A"),
    ("000d", "Raspberry Pi Model B Rev 2"),
    ("000e", "Raspberry Pi Model B Rev 2"),
    ("000f", "Raspberry Pi Model B Rev 2"),
    ("0010", "Raspberry Pi Model B+ Rev 1.2"),
    ("0011", "Raspberry Pi Compute Module 1"),
    ("0012", "Raspberry Pi Model A+ Rev 1.1"),
    ("0013", "Raspberry Pi Model B+ Rev 1.2"),
    ("0014", "Raspberry Pi Compute Module 1"),
    ("0015", "Raspberry Pi Model A+ Rev 1.1"),
    ("a01040", "Raspberry Pi 2 Model B Rev 1.0"),
    ("a01041", "Raspberry Pi 2 Model B Rev 1.1"),
    ("a21041", "Raspberry Pi 2 Model B Rev 1.1"),
    ("a22042", "Raspberry Pi 2 Model B Rev 1.2"),
    ("900021", "Raspberry Pi Model A+ Rev 1.1"),
    ("900032", "Raspberry Pi Model B+ Rev 1.2"),
    ("900092", "Raspberry Pi Zero Rev 1.2"),
    ("900093", "Raspberry Pi Zero Rev 1.3"),
    ("9000c1", "Raspberry Pi Zero W"),
    ("902120", "Raspberry Pi Zero 2 W"),
    ("9020e0", "Raspberry Pi 3 Model A+"),
    ("a02082", "Raspberry Pi 3 Model B Rev 1.2"),
    ("a020a0", "Raspberry Pi Compute Module 3 Rev 1.0"),
    ("a020d3", "Raspberry Pi 3 Model B+"),
    ("a22082", "Raspberry Pi 3 Model B Rev 1.2"),
    ("a220a0", "Raspberry Pi Compute Module 3 Rev 1.0"),
    ("a32082", "Raspberry Pi 3 Model B Rev 1.2"),
    ("a52082", "Raspberry Pi 3 Model B Rev 1.2"),
    ("a22083", "Raspberry Pi 3 Model B Rev 1.3"),
    ("a02100", "Raspberry Pi Compute Module 3+ Rev 1.0"),
    ("a03111", "Raspberry Pi 4 Model B Rev 1.1 (1GB RAM)"),
    ("b03111", "Raspberry Pi 4 Model B Rev 1.1 (2GB RAM)"),
    ("c03111", "Raspberry Pi 4 Model B Rev 1.1 (4GB RAM)"),
    ("c03112", "Raspberry Pi 4 Model B Rev 1.2 (4GB RAM)"),
    ("b03114", "Raspberry Pi 4 Model B Rev 1.4 (2GB RAM)"),
    ("c03114", "Raspberry Pi 4 Model B Rev 1.4 (4GB RAM)"),
    ("d03114", "Raspberry Pi 4 Model B Rev 1.4 (8GB RAM)"),
    ("c03130", "Raspberry Pi 400 Rev 1.0"),
    ("a03140", "Raspberry Pi Compute Module 4 Rev 1.0 (1GB RAM)"),
    ("c04170", "Raspberry Pi 5 Model B Rev 1.0 (4GB RAM)"),
    ("d04170", "Raspberry Pi 5 Model B Rev 1.0 (8GB RAM)"),
];

const UNKNOWN_MODEL: &str = "Unknown Model";

/// Lower-cased revision code with the warranty prefix removed: over-volted
/// old-style boards report e.g. `1000002` for `0002`.
fn normalize_revision(code: &str) -> String {
    let code = code.trim().to_ascii_lowercase();
    match code.strip_prefix("100") {
        Some(rest) if code.len() == 7 => rest.to_string(),
        _ => code,
    }
}

pub fn describe_revision(code: &str) -> &'static str {
    let code = normalize_revision(code);
    REVISIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, d)| *d)
        .unwrap_or(UNKNOWN_MODEL)
}

/// GPIO header size for a revision code: the original Model A/B boards have
/// a 26-pin header, everything from the B+ on has 40 pins.
pub fn header_pin_count(code: &str) -> Option<u32> {
    let code = normalize_revision(code);
    if describe_revision(&code) == UNKNOWN_MODEL {
        return None;
    }
    match code.as_str() {
        "0002" | "0003" | "0004" | "0005" | "0006" | "0007" | "0008" | "0009" | "000d"
        | "000e" | "000f" => Some(26),
        _ => Some(40),
    }
}

/// Value of the first `key : value` line in a cpuinfo-style listing.
fn cpuinfo_field<'a>(cpuinfo: &'a str, key: &str) -> Option<&'a str> {
    cpuinfo.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        (k.trim() == key).then(|| v.trim())
    })
}

fn revision_code(cpuinfo: &str) -> Option<String> {
    cpuinfo_field(cpuinfo, "Revision").map(|r| r.to_ascii_lowercase())
}

pub(super) async fn raspberry_pi_version(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let cpuinfo = read_text(ctx, "/proc/cpuinfo").await?;
    Ok(match revision_code(&cpuinfo) {
        Some(code) => {
            let description = describe_revision(&code);
            ProbeValue::map([("code", code.as_str()), ("description", description)])
        }
        None => ProbeValue::map([("code", "N/A"), ("description", UNKNOWN_MODEL)]),
    })
}

pub(super) async fn memory_info(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let meminfo = read_text(ctx, "/proc/meminfo").await?;
    let total_kb = parse_mem_total_kb(&meminfo)?;
    let total_gb = total_kb as f64 / (1024.0 * 1024.0);
    Ok(ProbeValue::map([
        ("code", total_kb.to_string()),
        ("description", format!("{:.2} GB RAM", total_gb)),
    ]))
}

fn parse_mem_total_kb(meminfo: &str) -> ProbeResult<u64> {
    let raw = meminfo
        .lines()
        .find_map(|l| l.strip_prefix("MemTotal:"))
        .ok_or_else(|| ProbeError::parse("/proc/meminfo", "no MemTotal line"))?;
    let number = raw.split_whitespace().next().unwrap_or_default();
    number
        .parse::<u64>()
        .map_err(|_| ProbeError::parse("/proc/meminfo", format!("bad MemTotal value '{}'", raw.trim())))
}

pub(super) async fn cpu_info(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let cpuinfo = read_text(ctx, "/proc/cpuinfo").await?;
    let model = cpuinfo_field(&cpuinfo, "model name")
        .or_else(|| cpuinfo_field(&cpuinfo, "Model"))
        .unwrap_or("Unknown");
    Ok(ProbeValue::text(model))
}

pub(super) async fn gpio_pins(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let cpuinfo = read_text(ctx, "/proc/cpuinfo").await?;
    let code = revision_code(&cpuinfo).unwrap_or_default();
    Ok(match header_pin_count(&code) {
        Some(pins) => ProbeValue::tuple([describe_revision(&code).to_string(), format!("{} pins", pins)]),
        None => ProbeValue::tuple(["Unknown model", "Unknown pin count"]),
    })
}
