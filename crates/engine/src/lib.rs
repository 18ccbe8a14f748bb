//! Engine crate – diagnostic registry, runner, report and hardware probes.
//!
//! Everything that touches the OS sits behind the capability traits in
//! [`traits`], so the whole catalogue runs against fakes in tests and the
//! CLI only wires settings, logging and output around it.

pub mod context;
pub mod doctor;
pub mod platform;
pub mod probes;
pub mod registry;
pub mod report;
pub mod runner;
pub mod settings;
pub mod traits;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use context::ProbeContext;
pub use registry::{Probe, ProbeError, ProbeRegistry, ProbeResult, RegistryError};
pub use report::{RenderError, Report, ReportEntry};
pub use runner::{RunObserver, RunState, Runner};
pub use settings::ProbeSettings;
pub use types::{ErrorCode, ErrorInfo, ProbeOutcome, ProbeValue, Status};
