//! Storage: SD card throughput, block device counters, free space.

use super::{command_error, command_text, read_text};
use crate::context::ProbeContext;
use crate::registry::{ProbeError, ProbeResult};
use crate::types::{new_run_id, ProbeValue};
use std::path::Path;

const SECTOR_BYTES: u64 = 512;

pub(super) async fn sd_card_performance(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let scratch = ctx
        .settings
        .sd_test_dir
        .join(format!("selftest-{}.tmp", &new_run_id()[..8]));

    let result = measure_dd(ctx, &scratch).await;

    if ctx.fs().exists(&scratch) {
        if let Err(e) = ctx.fs().remove_file(&scratch) {
            tracing::warn!(path = %scratch.display(), error = %e, "could not remove scratch file");
        }
    }
    result
}

async fn measure_dd(ctx: &ProbeContext, scratch: &Path) -> ProbeResult<ProbeValue> {
    let count = format!("count={}", ctx.settings.sd_test_size_mb);
    let of = format!("of={}", scratch.display());
    let iff = format!("if={}", scratch.display());

    let write = ctx
        .commands()
        .run("dd", &["if=/dev/zero", &of, "bs=1M", &count, "conv=fdatasync,notrunc"])
        .await?;
    if !write.success() {
        return Err(command_error("dd", &write));
    }
    let read = ctx
        .commands()
        .run("dd", &[&iff, "of=/dev/null", "bs=1M", &count])
        .await?;
    if !read.success() {
        return Err(command_error("dd", &read));
    }

    Ok(ProbeValue::tuple([
        format!("Write: {}", parse_dd_rate(&write.combined())?),
        format!("Read: {}", parse_dd_rate(&read.combined())?),
    ]))
}

/// Transfer rate from dd's summary line, e.g. `..., 5.1 s, 210 MB/s`.
fn parse_dd_rate(output: &str) -> ProbeResult<String> {
    let summary = output
        .lines()
        .rev()
        .find(|l| l.contains("copied") || l.contains("/s"))
        .ok_or_else(|| ProbeError::parse("dd output", "no transfer summary"))?;
    let rate = summary.rsplit(',').next().unwrap_or_default().trim();
    if rate.ends_with("/s") {
        Ok(rate.to_string())
    } else {
        Err(ProbeError::parse("dd output", format!("no rate in '{}'", summary)))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct DiskCounters {
    read_count: u64,
    write_count: u64,
    read_bytes: u64,
    write_bytes: u64,
}

/// Sum `/proc/diskstats` over whole disks. When `disks` is `None` every
/// device except loop and ram disks counts.
fn sum_diskstats(diskstats: &str, disks: Option<&[String]>) -> ProbeResult<DiskCounters> {
    let mut total = DiskCounters::default();
    for line in diskstats.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        let name = fields[2];
        let include = match disks {
            Some(list) => list.iter().any(|d| d == name),
            None => !(name.starts_with("loop") || name.starts_with("ram") || name.starts_with("zram")),
        };
        if !include {
            continue;
        }
        let num = |i: usize| {
            fields[i]
                .parse::<u64>()
                .map_err(|_| ProbeError::parse("/proc/diskstats", format!("bad field in '{}'", line.trim())))
        };
        total.read_count += num(3)?;
        total.read_bytes += num(5)? * SECTOR_BYTES;
        total.write_count += num(7)?;
        total.write_bytes += num(9)? * SECTOR_BYTES;
    }
    Ok(total)
}

pub(super) async fn disk_io(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let diskstats = read_text(ctx, "/proc/diskstats").await?;
    let disks: Option<Vec<String>> = ctx.fs().list_dir(Path::new("/sys/block")).ok().map(|names| {
        names
            .into_iter()
            .filter(|n| !n.starts_with("loop") && !n.starts_with("ram") && !n.starts_with("zram"))
            .collect()
    });
    let c = sum_diskstats(&diskstats, disks.as_deref())?;
    Ok(ProbeValue::map([
        ("Disk Read Count", c.read_count.to_string()),
        ("Disk Write Count", c.write_count.to_string()),
        ("Bytes Read", c.read_bytes.to_string()),
        ("Bytes Written", c.write_bytes.to_string()),
    ]))
}

pub(super) async fn storage_space(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    Ok(ProbeValue::text(command_text(ctx, "df", &["-h"]).await?))
}
