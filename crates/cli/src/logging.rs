use crate::config::LoggingConfig;
use regex::Regex;
use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Six colon- or dash-separated octets, as printed by `hciconfig`,
/// `hcitool` and `iwlist`.
const MAC_ADDRESS: &str = r"\b[0-9A-Fa-f]{2}(?:[:-][0-9A-Fa-f]{2}){5}\b";
const MAC_PLACEHOLDER: &str = "[MAC]";

struct RedactingWriter<W> {
    inner: W,
    patterns: Vec<(Regex, String)>,
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let mut redacted = s.to_string();
        for (re, replacement) in &self.patterns {
            redacted = re.replace_all(&redacted, replacement.as_str()).to_string();
        }
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter {
    patterns: Vec<(Regex, String)>,
}

impl<'a> fmt::MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter<io::Stderr>;

    fn make_writer(&self) -> Self::Writer {
        RedactingWriter {
            inner: io::stderr(),
            patterns: self.patterns.clone(),
        }
    }
}

/// Most verbose level enabled in the config; `verbose` forces debug.
fn level_for(config: &LoggingConfig, verbose: bool) -> &'static str {
    if verbose || config.verbose || config.levels.debug {
        return "debug";
    }
    let levels = &config.levels;
    if levels.info {
        "info"
    } else if levels.warning {
        "warn"
    } else if levels.error || levels.critical {
        "error"
    } else {
        "off"
    }
}

fn redaction_patterns(config: &LoggingConfig) -> Vec<(Regex, String)> {
    let redaction = &config.redaction;
    let mut patterns = Vec::new();
    if !redaction.enabled {
        return patterns;
    }
    if redaction.mask_mac_addresses {
        if let Ok(re) = Regex::new(MAC_ADDRESS) {
            patterns.push((re, MAC_PLACEHOLDER.to_string()));
        }
    }
    for p in &redaction.patterns {
        match Regex::new(&p.regex) {
            Ok(re) => patterns.push((re, p.placeholder.clone())),
            Err(e) => eprintln!("warning: ignoring redaction pattern '{}': {}", p.name, e),
        }
    }
    patterns
}

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// levels. Everything goes to stderr so stdout carries only the report.
pub fn init_logging(config: &LoggingConfig, verbose: bool) {
    let level = level_for(config, verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let show_file = config.format.location.show_file;
    let show_line = config.format.location.show_line;
    let make_writer = RedactingMakeWriter {
        patterns: redaction_patterns(config),
    };

    let base = fmt::layer()
        .with_writer(make_writer)
        .with_target(show_file)
        .with_file(show_file)
        .with_line_number(show_line)
        .with_thread_ids(false);

    // Layer::boxed() unifies the branch types.
    let fmt_layer = match (config.json, config.format.show_time) {
        (true, true) => base.json().boxed(),
        (true, false) => base.json().without_time().boxed(),
        (false, true) => base.boxed(),
        (false, false) => base.without_time().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
