//! Network: wired and wireless interfaces, Bluetooth, throughput,
//! reachability.

use super::{can_ping, command_text, interface_present};
use crate::context::ProbeContext;
use crate::registry::{ProbeError, ProbeResult};
use crate::types::ProbeValue;
use serde::Deserialize;
use std::path::PathBuf;

pub(super) async fn ethernet_port_status(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let iface = ctx.settings.ethernet_interface.as_str();
    if !interface_present(ctx, iface) {
        return Err(ProbeError::Unsupported(format!(
            "Ethernet interface ({}) not found.",
            iface
        )));
    }

    // Reading `carrier` fails with EINVAL while the interface is down.
    let carrier_path = PathBuf::from("/sys/class/net").join(iface).join("carrier");
    let link = ctx
        .fs()
        .read_to_string(&carrier_path)
        .map(|s| s.trim() == "1")
        .unwrap_or(false);
    if !link {
        return Err(ProbeError::CheckFailed(format!(
            "Ethernet interface ({}) is present but no link detected.",
            iface
        )));
    }

    if can_ping(ctx).await {
        Ok(ProbeValue::text(format!(
            "Ethernet interface ({}) is functional and has internet connectivity.",
            iface
        )))
    } else {
        Err(ProbeError::CheckFailed(format!(
            "Ethernet interface ({}) is present, link detected but no internet connectivity.",
            iface
        )))
    }
}

/// The fields of `speedtest-cli --json` this probe reports.
#[derive(Debug, Deserialize)]
struct SpeedtestResult {
    /// bits per second
    download: f64,
    /// bits per second
    upload: f64,
    /// milliseconds
    ping: f64,
}

fn parse_speedtest(json: &str) -> ProbeResult<ProbeValue> {
    let r: SpeedtestResult = serde_json::from_str(json.trim())
        .map_err(|e| ProbeError::parse("speedtest-cli output", e.to_string()))?;
    Ok(ProbeValue::tuple([
        format!("Download Speed: {:.2} Mbps", r.download / 1_000_000.0),
        format!("Upload Speed: {:.2} Mbps", r.upload / 1_000_000.0),
        format!("Ping: {} ms", r.ping),
    ]))
}

pub(super) async fn ethernet_speed(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let out = ctx.commands().run("speedtest-cli", &["--json"]).await?;
    if !out.success() {
        return Err(super::command_error("speedtest-cli", &out));
    }
    parse_speedtest(&out.stdout)
}

pub(super) async fn wifi_adapter_status(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let iface = ctx.settings.wifi_interface.as_str();
    if !interface_present(ctx, iface) {
        return Err(ProbeError::Unsupported(format!(
            "WiFi interface ({}) not found.",
            iface
        )));
    }

    let scan = ctx.commands().run("iwlist", &[iface, "scan"]).await?;
    if scan.combined().contains("No scan results") {
        return Err(ProbeError::CheckFailed(format!(
            "WiFi interface ({}) is present but can't detect networks. Ensure WiFi is enabled and permissions are set.",
            iface
        )));
    }

    let config = ctx.commands().run("iwconfig", &[iface]).await?;
    let connection = if config.combined().contains("ESSID:off/any") {
        "Not connected to any WiFi network."
    } else {
        "Connected to a WiFi network."
    };

    let internet = if can_ping(ctx).await {
        "Has internet connectivity."
    } else {
        "No internet connectivity."
    };

    Ok(ProbeValue::text(format!(
        "WiFi interface ({}) is functional. {} {}",
        iface, connection, internet
    )))
}

/// `iwconfig` prints "no wireless extensions" for every non-wireless
/// interface, so availability is decided by a wireless one being listed.
fn has_wireless_interface(iwconfig: &str) -> bool {
    iwconfig.contains("IEEE 802.11") || iwconfig.contains("ESSID")
}

pub(super) async fn wifi_availability(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let out = ctx.commands().run("iwconfig", &[]).await?;
    if has_wireless_interface(&out.combined()) {
        Ok(ProbeValue::text("Available"))
    } else {
        Err(ProbeError::Unsupported("Not available".into()))
    }
}

pub(super) async fn bluetooth_availability(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let out = ctx.commands().run("hcitool", &["dev"]).await?;
    if out.stdout.contains("hci") {
        Ok(ProbeValue::text("Available"))
    } else {
        Err(ProbeError::Unsupported("Not available".into()))
    }
}

pub(super) async fn network_statistics(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    Ok(ProbeValue::text(command_text(ctx, "netstat", &["-i"]).await?))
}

pub(super) async fn bluetooth_info(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let text = command_text(ctx, "hciconfig", &[]).await?;
    if text.trim().is_empty() {
        return Err(ProbeError::Unsupported("No Bluetooth adapter reported.".into()));
    }
    Ok(ProbeValue::text(text))
}

/// Host part of an http(s) URL.
fn url_host(url: &str) -> &str {
    let rest = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let authority = rest.split('/').next().unwrap_or(rest);
    authority.split(':').next().unwrap_or(authority)
}

pub(super) async fn internet_connectivity(ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
    let url = ctx.settings.connectivity_url.as_str();
    let host = url_host(url);

    let addrs = ctx
        .network()
        .dns_resolve(host)
        .await
        .map_err(|e| ProbeError::CheckFailed(format!("DNS resolution failed: {}", e)))?;

    let (status, _body) = ctx
        .network()
        .https_get(url, ctx.settings.http_timeout_ms)
        .await
        .map_err(|e| ProbeError::CheckFailed(format!("HTTPS GET {} failed: {}", url, e)))?;

    if !(200..400).contains(&status) {
        return Err(ProbeError::CheckFailed(format!(
            "HTTPS GET {} returned status {}",
            url, status
        )));
    }

    Ok(ProbeValue::map([
        ("target_url", url.to_string()),
        ("dns_addresses", addrs.join(", ")),
        ("http_status", status.to_string()),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProbeContext;
    use crate::settings::ProbeSettings;
    use crate::testing::{fake_context, FakeCommands, FakeFs, FakeNetwork};

    fn net_fs() -> FakeFs {
        FakeFs::default()
            .with_dir("/sys/class/net/lo")
            .with_dir("/sys/class/net/wlan0")
            .with_file("/sys/class/net/eth0/carrier", "1\n")
    }

    #[tokio::test]
    async fn test_ethernet_missing() {
        let ctx = fake_context(FakeFs::default().with_dir("/sys/class/net/lo"), FakeCommands::default());
        let err = ethernet_port_status(&ctx).await.unwrap_err();
        assert!(matches!(err, ProbeError::Unsupported(_)));
        assert_eq!(err.to_string(), "Ethernet interface (eth0) not found.");
    }

    #[tokio::test]
    async fn test_ethernet_no_link() {
        let fs = FakeFs::default().with_file("/sys/class/net/eth0/carrier", "0\n");
        let ctx = fake_context(fs, FakeCommands::default());
        let err = ethernet_port_status(&ctx).await.unwrap_err();
        assert!(matches!(err, ProbeError::CheckFailed(_)));
        assert!(err.to_string().contains("no link detected"));
    }

    #[tokio::test]
    async fn test_ethernet_functional() {
        let ctx = fake_context(net_fs(), FakeCommands::default().ok("ping -c 1 8.8.8.8", "1 received"));
        let v = ethernet_port_status(&ctx).await.unwrap();
        assert!(v.as_text().unwrap().contains("functional and has internet connectivity"));
    }

    #[tokio::test]
    async fn test_ethernet_no_internet() {
        let ctx = fake_context(
            net_fs(),
            FakeCommands::default().respond("ping -c 1 8.8.8.8", 1, "", "Network is unreachable"),
        );
        let err = ethernet_port_status(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("no internet connectivity"));
    }

    #[test]
    fn test_parse_speedtest() {
        let json = r#"{"download": 93452123.4, "upload": 11873000.0, "ping": 21.5, "server": {"name": "x"}}"#;
        assert_eq!(
            parse_speedtest(json).unwrap(),
            ProbeValue::tuple([
                "Download Speed: 93.45 Mbps",
                "Upload Speed: 11.87 Mbps",
                "Ping: 21.5 ms",
            ])
        );
        assert!(matches!(parse_speedtest("Cannot retrieve speedtest configuration"), Err(ProbeError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_wifi_adapter_status() {
        let commands = FakeCommands::default()
            .ok("iwlist wlan0 scan", "wlan0     Scan completed :\n          Cell 01 - Address: AA:BB:CC:DD:EE:FF\n")
            .ok("iwconfig wlan0", "wlan0     IEEE 802.11  ESSID:\"home\"\n")
            .respond("ping -c 1 8.8.8.8", 1, "", "");
        let ctx = fake_context(net_fs(), commands);
        assert_eq!(
            wifi_adapter_status(&ctx).await.unwrap(),
            ProbeValue::text("WiFi interface (wlan0) is functional. Connected to a WiFi network. No internet connectivity.")
        );
    }

    #[tokio::test]
    async fn test_wifi_adapter_no_networks() {
        let commands = FakeCommands::default().ok("iwlist wlan0 scan", "wlan0     No scan results\n");
        let ctx = fake_context(net_fs(), commands);
        let err = wifi_adapter_status(&ctx).await.unwrap_err();
        assert!(matches!(err, ProbeError::CheckFailed(_)));
    }

    #[tokio::test]
    async fn test_wifi_availability() {
        let ctx = fake_context(
            FakeFs::default(),
            FakeCommands::default().respond(
                "iwconfig",
                0,
                "wlan0     IEEE 802.11  ESSID:off/any\n",
                "lo        no wireless extensions.\n",
            ),
        );
        assert_eq!(wifi_availability(&ctx).await.unwrap(), ProbeValue::text("Available"));

        let ctx = fake_context(
            FakeFs::default(),
            FakeCommands::default().respond("iwconfig", 0, "", "lo        no wireless extensions.\n"),
        );
        let err = wifi_availability(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Not available");
    }

    #[tokio::test]
    async fn test_bluetooth_availability() {
        let ctx = fake_context(
            FakeFs::default(),
            FakeCommands::default().ok("hcitool dev", "Devices:\n\thci0\tB8:27:EB:00:00:01\n"),
        );
        assert_eq!(bluetooth_availability(&ctx).await.unwrap(), ProbeValue::text("Available"));

        let ctx = fake_context(FakeFs::default(), FakeCommands::default().ok("hcitool dev", "Devices:\n"));
        assert!(bluetooth_availability(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_tool_is_dependency_missing() {
        let ctx = fake_context(FakeFs::default(), FakeCommands::default());
        let err = network_statistics(&ctx).await.unwrap_err();
        assert!(matches!(err, ProbeError::DependencyMissing(_)));
    }

    #[test]
    fn test_url_host() {
        assert_eq!(url_host("https://www.raspberrypi.com/"), "www.raspberrypi.com");
        assert_eq!(url_host("http://example.org:8080/x"), "example.org");
        assert_eq!(url_host("example.org"), "example.org");
    }

    #[tokio::test]
    async fn test_internet_connectivity() {
        let online = ProbeContext::new(
            Box::new(FakeFs::default()),
            Box::new(FakeCommands::default()),
            Box::new(FakeNetwork {
                addrs: Ok(vec!["93.93.128.1".into()]),
                status: 200,
            }),
            ProbeSettings::default(),
        );
        let v = internet_connectivity(&online).await.unwrap();
        assert_eq!(v.field("http_status"), Some("200"));
        assert_eq!(v.field("dns_addresses"), Some("93.93.128.1"));

        let offline = fake_context(FakeFs::default(), FakeCommands::default());
        let err = internet_connectivity(&offline).await.unwrap_err();
        assert!(matches!(err, ProbeError::CheckFailed(_)));
    }
}
