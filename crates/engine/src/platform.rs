//! Platform implementations of the OS capability traits.
//!
//! - [`StdFilesystem`]: real std::fs operations
//! - [`TokioCommands`]: child processes via tokio::process
//! - [`ReqwestNetwork`]: DNS via tokio, HTTPS via reqwest

use crate::traits::*;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

// ===========================================================================
// Filesystem – wraps std::fs
// ===========================================================================

pub struct StdFilesystem;

fn map_io(path: &Path, verb: &str, e: std::io::Error) -> CapError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => {
            CapError::PermissionDenied(format!("cannot {} {}: {}", verb, path.display(), e))
        }
        _ => CapError::Io(e),
    }
}

impl FilesystemOps for StdFilesystem {
    fn read_file(&self, path: &Path) -> CapResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| map_io(path, "read", e))
    }

    fn read_to_string(&self, path: &Path) -> CapResult<String> {
        std::fs::read_to_string(path).map_err(|e| map_io(path, "read", e))
    }

    fn list_dir(&self, path: &Path) -> CapResult<Vec<String>> {
        let mut names: Vec<String> = std::fs::read_dir(path)
            .map_err(|e| map_io(path, "list", e))?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> CapResult<()> {
        std::fs::write(path, data).map_err(|e| map_io(path, "write", e))
    }

    fn remove_file(&self, path: &Path) -> CapResult<()> {
        std::fs::remove_file(path).map_err(CapError::Io)
    }

    fn file_size(&self, path: &Path) -> CapResult<u64> {
        std::fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| map_io(path, "stat", e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn temp_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }
}

// ===========================================================================
// Commands – wraps tokio::process
// ===========================================================================

pub struct TokioCommands;

fn spawn_error(program: &str, e: std::io::Error) -> CapError {
    match e.kind() {
        std::io::ErrorKind::NotFound => {
            CapError::DependencyMissing(format!("{} not found", program))
        }
        std::io::ErrorKind::PermissionDenied => {
            CapError::PermissionDenied(format!("cannot execute {}: {}", program, e))
        }
        _ => CapError::Io(e),
    }
}

fn to_output(output: std::process::Output) -> CommandOutput {
    CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

#[async_trait::async_trait]
impl CommandRunner for TokioCommands {
    async fn run(&self, program: &str, args: &[&str]) -> CapResult<CommandOutput> {
        tracing::debug!(program, ?args, "running command");
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(program, e))?;
        Ok(to_output(output))
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> CapResult<CommandOutput> {
        tracing::debug!(program, ?args, ?timeout, "running command with timeout");
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => Ok(to_output(output?)),
            Err(_) => Err(CapError::Timeout),
        }
    }

    fn is_installed(&self, tool: &str) -> bool {
        let candidate = Path::new(tool);
        if candidate.components().count() > 1 {
            return is_executable(candidate);
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(tool))))
            .unwrap_or(false)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ===========================================================================
// Network – wraps reqwest
// ===========================================================================

pub struct ReqwestNetwork;

#[async_trait::async_trait]
impl NetworkOps for ReqwestNetwork {
    async fn dns_resolve(&self, host: &str) -> CapResult<Vec<String>> {
        use tokio::net::lookup_host;
        let addrs: Vec<String> = lookup_host(format!("{}:443", host))
            .await
            .map_err(|e| CapError::Network(format!("DNS resolution failed for {}: {}", host, e)))?
            .map(|a| a.ip().to_string())
            .collect();
        if addrs.is_empty() {
            return Err(CapError::Network(format!(
                "DNS resolution returned no addresses for {}",
                host
            )));
        }
        Ok(addrs)
    }

    async fn https_get(&self, url: &str, timeout_ms: u64) -> CapResult<(u16, String)> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| CapError::Network(format!("failed to build HTTP client: {}", e)))?;

        let resp = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                CapError::Timeout
            } else {
                CapError::Network(format!("HTTPS GET {}: {}", url, e))
            }
        })?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| CapError::Network(format!("reading body: {}", e)))?;
        let snippet: String = body.chars().take(512).collect();
        Ok((status, snippet))
    }
}
