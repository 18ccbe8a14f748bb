//! Tunables for the probe catalogue.
//!
//! Every field has a default so a config file only needs to name what it
//! changes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Firmware query tool; a bare name is looked up on `PATH`.
    pub vcgencmd: String,
    pub ethernet_interface: String,
    pub wifi_interface: String,
    /// Host pinged to decide whether an interface has internet connectivity.
    pub ping_host: String,
    pub connectivity_url: String,
    pub http_timeout_ms: u64,
    /// Directory the SD card benchmark writes its scratch file into.
    pub sd_test_dir: PathBuf,
    pub sd_test_size_mb: u32,
    /// Still-capture tools tried in order; the first installed one is used.
    pub camera_tools: Vec<String>,
    pub camera_timeout_secs: u64,
    pub framebuffer: PathBuf,
    /// How long a display test pattern stays on screen.
    pub display_pattern_secs: u64,
    pub test_sound: PathBuf,
    /// BCM GPIO numbers exercised by the GPIO pin test.
    pub gpio_pins: Vec<u32>,
    pub cpu_sample_ms: u64,
    pub temperature_limit_celsius: f32,
    pub irq_lines: usize,
    /// Probe names left out of the registry.
    pub skip: Vec<String>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            vcgencmd: "vcgencmd".to_string(),
            ethernet_interface: "eth0".to_string(),
            wifi_interface: "wlan0".to_string(),
            ping_host: "8.8.8.8".to_string(),
            connectivity_url: "https://www.raspberrypi.com/".to_string(),
            http_timeout_ms: 10_000,
            sd_test_dir: PathBuf::from("."),
            sd_test_size_mb: 1024,
            camera_tools: vec!["libcamera-still".to_string(), "raspistill".to_string()],
            camera_timeout_secs: 10,
            framebuffer: PathBuf::from("/dev/fb0"),
            display_pattern_secs: 5,
            test_sound: PathBuf::from("test_sound.wav"),
            gpio_pins: (2..=27).collect(),
            cpu_sample_ms: 500,
            temperature_limit_celsius: 80.0,
            irq_lines: 10,
            skip: Vec::new(),
        }
    }
}
