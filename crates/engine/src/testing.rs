//! In-memory fakes for the capability traits.

use crate::context::ProbeContext;
use crate::settings::ProbeSettings;
use crate::traits::*;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct FakeFs {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
}

impl FakeFs {
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.put(path, content.as_bytes());
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.dirs.lock().unwrap().insert(PathBuf::from(path));
        self
    }

    pub fn put(&self, path: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), data.to_vec());
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(Path::new(path)).cloned()
    }
}

fn not_found(path: &Path) -> CapError {
    CapError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("{} not found", path.display()),
    ))
}

impl FilesystemOps for FakeFs {
    fn read_file(&self, path: &Path) -> CapResult<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn read_to_string(&self, path: &Path) -> CapResult<String> {
        self.read_file(path)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    fn list_dir(&self, path: &Path) -> CapResult<Vec<String>> {
        let mut names = BTreeSet::new();
        for p in self.files.lock().unwrap().keys() {
            if let Ok(rest) = p.strip_prefix(path) {
                if let Some(first) = rest.components().next() {
                    names.insert(first.as_os_str().to_string_lossy().into_owned());
                }
            }
        }
        for d in self.dirs.lock().unwrap().iter() {
            if d.parent() == Some(path) {
                if let Some(name) = d.file_name() {
                    names.insert(name.to_string_lossy().into_owned());
                }
            }
        }
        if names.is_empty() && !self.exists(path) {
            return Err(not_found(path));
        }
        Ok(names.into_iter().collect())
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> CapResult<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> CapResult<()> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn file_size(&self, path: &Path) -> CapResult<u64> {
        self.read_file(path).map(|b| b.len() as u64)
    }

    fn exists(&self, path: &Path) -> bool {
        self.dirs.lock().unwrap().contains(path)
            || self
                .files
                .lock()
                .unwrap()
                .keys()
                .any(|p| p == path || p.starts_with(path))
    }

    fn temp_dir(&self) -> PathBuf {
        PathBuf::from("/tmp")
    }
}

/// Canned command responses keyed by the full command line.
#[derive(Default)]
pub struct FakeCommands {
    responses: Mutex<HashMap<String, CommandOutput>>,
    timeouts: Mutex<BTreeSet<String>>,
    installed: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCommands {
    /// Respond to `line` with exit code 0 and the given stdout.
    pub fn ok(self, line: &str, stdout: &str) -> Self {
        self.respond(line, 0, stdout, "")
    }

    pub fn respond(self, line: &str, code: i32, stdout: &str, stderr: &str) -> Self {
        let program = line.split_whitespace().next().unwrap_or_default().to_string();
        self.installed.lock().unwrap().insert(program);
        self.responses.lock().unwrap().insert(
            line.to_string(),
            CommandOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    pub fn times_out(self, line: &str) -> Self {
        let program = line.split_whitespace().next().unwrap_or_default().to_string();
        self.installed.lock().unwrap().insert(program);
        self.timeouts.lock().unwrap().insert(line.to_string());
        self
    }

    pub fn installed(self, tool: &str) -> Self {
        self.installed.lock().unwrap().insert(tool.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup(&self, program: &str, args: &[&str]) -> CapResult<CommandOutput> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line.clone());
        if self.timeouts.lock().unwrap().contains(&line) {
            return Err(CapError::Timeout);
        }
        if let Some(out) = self.responses.lock().unwrap().get(&line) {
            return Ok(out.clone());
        }
        if self.installed.lock().unwrap().contains(program) {
            return Ok(CommandOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: format!("unexpected invocation: {}", line),
            });
        }
        Err(CapError::DependencyMissing(format!("{} not found", program)))
    }
}

#[async_trait::async_trait]
impl CommandRunner for FakeCommands {
    async fn run(&self, program: &str, args: &[&str]) -> CapResult<CommandOutput> {
        self.lookup(program, args)
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        _timeout: Duration,
    ) -> CapResult<CommandOutput> {
        self.lookup(program, args)
    }

    fn is_installed(&self, tool: &str) -> bool {
        self.installed.lock().unwrap().contains(tool)
    }
}

pub struct FakeNetwork {
    pub addrs: CapResult<Vec<String>>,
    pub status: u16,
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self {
            addrs: Err(CapError::Network("offline".into())),
            status: 0,
        }
    }
}

#[async_trait::async_trait]
impl NetworkOps for FakeNetwork {
    async fn dns_resolve(&self, host: &str) -> CapResult<Vec<String>> {
        match &self.addrs {
            Ok(a) => Ok(a.clone()),
            Err(e) => Err(CapError::Network(format!("{}: {}", host, e))),
        }
    }

    async fn https_get(&self, _url: &str, _timeout_ms: u64) -> CapResult<(u16, String)> {
        Ok((self.status, String::new()))
    }
}

// Shared handles so a test can inspect a fake after handing it to a context.

impl FilesystemOps for Arc<FakeFs> {
    fn read_file(&self, path: &Path) -> CapResult<Vec<u8>> {
        self.as_ref().read_file(path)
    }
    fn read_to_string(&self, path: &Path) -> CapResult<String> {
        self.as_ref().read_to_string(path)
    }
    fn list_dir(&self, path: &Path) -> CapResult<Vec<String>> {
        self.as_ref().list_dir(path)
    }
    fn write_file(&self, path: &Path, data: &[u8]) -> CapResult<()> {
        self.as_ref().write_file(path, data)
    }
    fn remove_file(&self, path: &Path) -> CapResult<()> {
        self.as_ref().remove_file(path)
    }
    fn file_size(&self, path: &Path) -> CapResult<u64> {
        self.as_ref().file_size(path)
    }
    fn exists(&self, path: &Path) -> bool {
        self.as_ref().exists(path)
    }
    fn temp_dir(&self) -> PathBuf {
        self.as_ref().temp_dir()
    }
}

#[async_trait::async_trait]
impl CommandRunner for Arc<FakeCommands> {
    async fn run(&self, program: &str, args: &[&str]) -> CapResult<CommandOutput> {
        self.lookup(program, args)
    }
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        _timeout: Duration,
    ) -> CapResult<CommandOutput> {
        self.lookup(program, args)
    }
    fn is_installed(&self, tool: &str) -> bool {
        self.as_ref().is_installed(tool)
    }
}

pub fn shared_context(fs: Arc<FakeFs>, commands: Arc<FakeCommands>) -> ProbeContext {
    ProbeContext::new(
        Box::new(fs),
        Box::new(commands),
        Box::new(FakeNetwork::default()),
        ProbeSettings::default(),
    )
}

pub fn fake_context(fs: FakeFs, commands: FakeCommands) -> ProbeContext {
    fake_context_with(fs, commands, ProbeSettings::default())
}

pub fn fake_context_with(fs: FakeFs, commands: FakeCommands, settings: ProbeSettings) -> ProbeContext {
    ProbeContext::new(
        Box::new(fs),
        Box::new(commands),
        Box::new(FakeNetwork::default()),
        settings,
    )
}

pub fn empty_context() -> ProbeContext {
    fake_context(FakeFs::default(), FakeCommands::default())
}
