//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::MergeService;
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::infrastructure::snapshot::{ProjectLoader, TomlProjectLoader};
use crate::infrastructure::traits::{FileSystem, LogProgress, ProgressSink, RealFileSystem};

/// Container holding settings, I/O boundaries and service factories.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Project snapshot source
    pub loader: Arc<dyn ProjectLoader>,

    /// Matching progress receiver
    pub progress: Arc<dyn ProgressSink>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let loader = Arc::new(TomlProjectLoader::new(Arc::clone(&fs)));
        Self::with_deps(settings, fs, loader, Arc::new(LogProgress::default()))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        loader: Arc<dyn ProjectLoader>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            fs,
            loader,
            progress,
        }
    }

    /// Merge service configured from the current settings.
    pub fn merge_service(&self) -> ApplicationResult<MergeService> {
        let options = self.settings.match_options()?;
        Ok(MergeService::new(options).with_progress(Arc::clone(&self.progress)))
    }
}
