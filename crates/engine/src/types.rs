use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// Probe values – the natural shape of each OS query
// ---------------------------------------------------------------------------

/// What a probe reports. Serialized untagged: a string, an array of strings,
/// or an object whose keys keep their insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeValue {
    Text(String),
    Tuple(Vec<String>),
    Map(Vec<(String, String)>),
}

impl ProbeValue {
    pub fn text(s: impl Into<String>) -> Self {
        ProbeValue::Text(s.into())
    }

    pub fn tuple<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProbeValue::Tuple(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        ProbeValue::Map(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Look up a field of a `Map` value.
    pub fn field(&self, key: &str) -> Option<&str> {
        match self {
            ProbeValue::Map(fields) => fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ProbeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ProbeValue {
    fn from(s: &str) -> Self {
        ProbeValue::Text(s.to_string())
    }
}

impl From<String> for ProbeValue {
    fn from(s: String) -> Self {
        ProbeValue::Text(s)
    }
}

impl fmt::Display for ProbeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeValue::Text(s) => f.write_str(s),
            ProbeValue::Tuple(items) => write!(f, "({})", items.join(", ")),
            ProbeValue::Map(fields) => {
                let parts: Vec<String> = fields.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl Serialize for ProbeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProbeValue::Text(s) => serializer.serialize_str(s),
            ProbeValue::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ProbeValue::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome of one probe run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    Fail,
    Skip,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unsupported,
    DependencyMissing,
    PermissionDenied,
    CheckFailed,
    IoError,
    ParseError,
    CommandFailed,
    NetworkError,
    Timeout,
    Panicked,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        f.write_str(&s)
    }
}

/// Tagged result of running a single probe.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ProbeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub timing_ms: u64,
}

impl ProbeOutcome {
    pub fn pass(value: ProbeValue, timing_ms: u64) -> Self {
        Self {
            status: Status::Pass,
            value: Some(value),
            error: None,
            timing_ms,
        }
    }

    pub fn failure(status: Status, code: ErrorCode, message: impl Into<String>, timing_ms: u64) -> Self {
        Self {
            status,
            value: None,
            error: Some(ErrorInfo {
                code,
                message: message.into(),
            }),
            timing_ms,
        }
    }

    /// The value a plain report shows for this probe. Expected conditions
    /// (skip/fail) show their message; unexpected faults are prefixed so they
    /// read as failures.
    pub fn display_value(&self) -> ProbeValue {
        if let Some(value) = &self.value {
            return value.clone();
        }
        let message = self
            .error
            .as_ref()
            .map(|e| e.message.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or("no result");
        match self.status {
            Status::Error => ProbeValue::Text(format!("probe failed: {}", message)),
            _ => ProbeValue::Text(message.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Environment summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvSummary {
    pub os: String,
    pub arch: String,
    pub headless: bool,
}

impl Default for EnvSummary {
    fn default() -> Self {
        Self {
            os: current_os().to_string(),
            arch: std::env::consts::ARCH.to_string(),
            headless: detect_headless(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn current_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "macos",
        "linux" => "linux",
        "windows" => "windows",
        other => other,
    }
}

pub fn detect_headless() -> bool {
    match std::env::consts::OS {
        // No X11 or Wayland display -> headless
        "linux" => std::env::var("DISPLAY").is_err() && std::env::var("WAYLAND_DISPLAY").is_err(),
        _ => false,
    }
}

/// Generate a new run ID (UUIDv4).
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_serializes_in_insertion_order() {
        let v = ProbeValue::map([("zeta", "1"), ("alpha", "2")]);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"zeta":"1","alpha":"2"}"#);
    }

    #[test]
    fn test_tuple_serializes_as_array() {
        let v = ProbeValue::tuple(["a", "b"]);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_display_value_for_error_mentions_failure() {
        let o = ProbeOutcome::failure(Status::Error, ErrorCode::IoError, "disk gone", 3);
        assert_eq!(o.display_value(), ProbeValue::text("probe failed: disk gone"));
    }

    #[test]
    fn test_display_value_for_skip_is_message() {
        let o = ProbeOutcome::failure(Status::Skip, ErrorCode::Unsupported, "Not available", 0);
        assert_eq!(o.display_value(), ProbeValue::text("Not available"));
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::DependencyMissing.to_string(), "DEPENDENCY_MISSING");
    }

    #[test]
    fn test_field_lookup() {
        let v = ProbeValue::map([("code", "a02082")]);
        assert_eq!(v.field("code"), Some("a02082"));
        assert_eq!(v.field("missing"), None);
        assert_eq!(ProbeValue::text("x").field("code"), None);
    }
}
