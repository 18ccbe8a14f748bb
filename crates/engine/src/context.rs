//! Probe context – holds capability trait objects and settings.

use crate::platform::{ReqwestNetwork, StdFilesystem, TokioCommands};
use crate::settings::ProbeSettings;
use crate::traits::*;

/// Central context passed to every probe.
///
/// Holds trait-object capabilities so callers (CLI / tests) can swap the
/// real OS for fakes.
pub struct ProbeContext {
    fs: Box<dyn FilesystemOps>,
    commands: Box<dyn CommandRunner>,
    network: Box<dyn NetworkOps>,
    pub settings: ProbeSettings,
}

impl ProbeContext {
    pub fn new(
        fs: Box<dyn FilesystemOps>,
        commands: Box<dyn CommandRunner>,
        network: Box<dyn NetworkOps>,
        settings: ProbeSettings,
    ) -> Self {
        Self {
            fs,
            commands,
            network,
            settings,
        }
    }

    /// Create a context backed by the real filesystem, processes and network.
    pub fn default_platform(settings: ProbeSettings) -> Self {
        Self::new(
            Box::new(StdFilesystem),
            Box::new(TokioCommands),
            Box::new(ReqwestNetwork),
            settings,
        )
    }

    pub fn fs(&self) -> &dyn FilesystemOps {
        self.fs.as_ref()
    }

    pub fn commands(&self) -> &dyn CommandRunner {
        self.commands.as_ref()
    }

    pub fn network(&self) -> &dyn NetworkOps {
        self.network.as_ref()
    }
}
