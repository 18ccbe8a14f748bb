use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result type for capability operations that may be unsupported.
pub type CapResult<T> = Result<T, CapError>;

#[derive(Debug, thiserror::Error)]
pub enum CapError {
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("dependency missing: {0}")]
    DependencyMissing(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

pub trait FilesystemOps: Send + Sync {
    fn read_file(&self, path: &Path) -> CapResult<Vec<u8>>;
    fn read_to_string(&self, path: &Path) -> CapResult<String>;
    /// Entry names of a directory, sorted.
    fn list_dir(&self, path: &Path) -> CapResult<Vec<String>>;
    fn write_file(&self, path: &Path, data: &[u8]) -> CapResult<()>;
    fn remove_file(&self, path: &Path) -> CapResult<()>;
    fn file_size(&self, path: &Path) -> CapResult<u64>;
    fn exists(&self, path: &Path) -> bool;
    fn temp_dir(&self) -> PathBuf;
}

// ---------------------------------------------------------------------------
// External commands
// ---------------------------------------------------------------------------

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr with the trailing newline stripped, the way a
    /// shell would show both streams.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out.trim_end_matches('\n').to_string()
    }
}

#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program to completion. A missing binary is reported as
    /// [`CapError::DependencyMissing`]; a non-zero exit is not an error.
    async fn run(&self, program: &str, args: &[&str]) -> CapResult<CommandOutput>;

    /// Like [`CommandRunner::run`] but kills the child after `timeout` and
    /// returns [`CapError::Timeout`].
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> CapResult<CommandOutput>;

    /// Whether `tool` resolves to an executable on `PATH` (or is a path to one).
    fn is_installed(&self, tool: &str) -> bool;
}

// ---------------------------------------------------------------------------
// Network operations
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait NetworkOps: Send + Sync {
    /// Resolve a hostname to at least one IP address.
    async fn dns_resolve(&self, host: &str) -> CapResult<Vec<String>>;

    /// Perform an HTTPS GET and return (status_code, body_snippet).
    async fn https_get(&self, url: &str, timeout_ms: u64) -> CapResult<(u16, String)>;
}
