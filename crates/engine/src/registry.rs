//! Probe registry – an ordered list of named probes.
//!
//! Probes are registered by name and run in registration order by the
//! [`Runner`](crate::runner::Runner).

use crate::context::ProbeContext;
use crate::traits::CapError;
use crate::types::*;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type ProbeResult<T> = Result<T, ProbeError>;

/// Boxed future returned by a [`ProbeFn`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ProbeResult<ProbeValue>> + Send + 'a>>;

/// Signature for plain probe functions.
pub type ProbeFn = for<'a> fn(&'a ProbeContext) -> ProbeFuture<'a>;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Hardware or interface is absent.
    #[error("{0}")]
    Unsupported(String),
    #[error("{0}")]
    DependencyMissing(String),
    #[error("{0}")]
    PermissionDenied(String),
    /// Hardware is present but a heuristic check came back negative.
    #[error("{0}")]
    CheckFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse {what}: {detail}")]
    Parse { what: String, detail: String },
    #[error("{program} exited with status {code}: {output}")]
    Command {
        program: String,
        code: String,
        output: String,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Other(String),
}

impl ProbeError {
    pub fn parse(what: impl Into<String>, detail: impl Into<String>) -> Self {
        ProbeError::Parse {
            what: what.into(),
            detail: detail.into(),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProbeError::Unsupported(_) => ErrorCode::Unsupported,
            ProbeError::DependencyMissing(_) => ErrorCode::DependencyMissing,
            ProbeError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            ProbeError::CheckFailed(_) => ErrorCode::CheckFailed,
            ProbeError::Io(_) => ErrorCode::IoError,
            ProbeError::Parse { .. } => ErrorCode::ParseError,
            ProbeError::Command { .. } => ErrorCode::CommandFailed,
            ProbeError::Network(_) => ErrorCode::NetworkError,
            ProbeError::Timeout(_) => ErrorCode::Timeout,
            ProbeError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Expected conditions skip, negative checks fail, everything else is an
    /// unexpected fault.
    pub fn status(&self) -> Status {
        match self {
            ProbeError::Unsupported(_)
            | ProbeError::DependencyMissing(_)
            | ProbeError::PermissionDenied(_) => Status::Skip,
            ProbeError::CheckFailed(_) => Status::Fail,
            _ => Status::Error,
        }
    }
}

impl From<CapError> for ProbeError {
    fn from(e: CapError) -> Self {
        match e {
            CapError::Unsupported(m) => ProbeError::Unsupported(m),
            CapError::DependencyMissing(m) => ProbeError::DependencyMissing(m),
            CapError::PermissionDenied(m) => ProbeError::PermissionDenied(m),
            CapError::Io(io) => ProbeError::Io(io),
            CapError::Network(m) => ProbeError::Network(m),
            CapError::Timeout => ProbeError::Timeout("operation did not finish in time".into()),
            CapError::Other(m) => ProbeError::Other(m),
        }
    }
}

// ---------------------------------------------------------------------------
// Probe trait
// ---------------------------------------------------------------------------

/// A named hardware/OS check. Probes share nothing but the context and may
/// fail independently.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn run(&self, ctx: &ProbeContext) -> ProbeResult<ProbeValue>;
}

#[async_trait::async_trait]
impl Probe for ProbeFn {
    async fn run(&self, ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
        (self)(ctx).await
    }
}

/// Adapter for synchronous closures.
pub struct SyncProbe<F>(F);

#[async_trait::async_trait]
impl<F> Probe for SyncProbe<F>
where
    F: Fn(&ProbeContext) -> ProbeResult<ProbeValue> + Send + Sync,
{
    async fn run(&self, ctx: &ProbeContext) -> ProbeResult<ProbeValue> {
        (self.0)(ctx)
    }
}

/// Wrap a synchronous closure as a probe.
pub fn probe_fn<F>(f: F) -> Arc<dyn Probe>
where
    F: Fn(&ProbeContext) -> ProbeResult<ProbeValue> + Send + Sync + 'static,
{
    Arc::new(SyncProbe(f))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("probe already registered: {0}")]
    Duplicate(String),
    #[error("probe name must not be empty")]
    EmptyName,
}

#[derive(Clone)]
pub struct RegisteredProbe {
    pub name: String,
    pub probe: Arc<dyn Probe>,
}

#[derive(Clone, Default)]
pub struct ProbeRegistry {
    entries: Vec<RegisteredProbe>,
}

impl std::fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeRegistry")
            .field("entries", &self.names())
            .finish()
    }
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a probe. Names are unique; a second registration under the same
    /// name is rejected and leaves the registry unchanged.
    pub fn register(&mut self, name: &str, probe: Arc<dyn Probe>) -> Result<(), RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.contains(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.entries.push(RegisteredProbe {
            name: name.to_string(),
            probe,
        });
        Ok(())
    }

    pub fn all(&self) -> &[RegisteredProbe] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the registry holding only the entries `keep` accepts, in the
    /// original order.
    pub fn filtered(&self, keep: impl Fn(&str) -> bool) -> ProbeRegistry {
        ProbeRegistry {
            entries: self
                .entries
                .iter()
                .filter(|e| keep(&e.name))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_preserves_order() {
        let mut reg = ProbeRegistry::new();
        reg.register("b", probe_fn(|_| Ok("1".into()))).unwrap();
        reg.register("a", probe_fn(|_| Ok("2".into()))).unwrap();
        reg.register("c", probe_fn(|_| Ok("3".into()))).unwrap();
        assert_eq!(reg.names(), vec!["b", "a", "c"]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_filtered_keeps_registration_order() {
        let mut reg = ProbeRegistry::new();
        for name in ["x", "y", "z"] {
            reg.register(name, probe_fn(|_| Ok("v".into()))).unwrap();
        }
        let only = reg.filtered(|n| n == "z" || n == "x");
        assert_eq!(only.names(), vec!["x", "z"]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut reg = ProbeRegistry::new();
        reg.register("CPU Info", probe_fn(|_| Ok("x".into()))).unwrap();
        let err = reg
            .register("CPU Info", probe_fn(|_| Ok("y".into())))
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("CPU Info".into()));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut reg = ProbeRegistry::new();
        assert_eq!(
            reg.register("  ", probe_fn(|_| Ok("x".into()))),
            Err(RegistryError::EmptyName)
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ProbeError::Unsupported("x".into()).status(), Status::Skip);
        assert_eq!(ProbeError::CheckFailed("x".into()).status(), Status::Fail);
        assert_eq!(ProbeError::parse("x", "y").status(), Status::Error);
        assert_eq!(
            ProbeError::from(CapError::DependencyMissing("lsusb not found".into())).error_code(),
            ErrorCode::DependencyMissing
        );
        assert_eq!(
            ProbeError::from(CapError::Timeout).error_code(),
            ErrorCode::Timeout
        );
    }
}
