//! Per-build mutable state threaded through the pipeline.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::TaskError;
use crate::library::ArchiveLibrarySet;
use crate::predex::PredexCache;
use crate::project::Project;
use crate::report::Reporter;
use crate::requirements::ComponentRequirements;
use crate::tools::{CommandRunner, ToolLocator};

/// The package container the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Apk,
    Aab,
}

/// Build options fixed for the life of one build.
#[derive(Debug, Clone, Copy)]
pub struct BuildFlags {
    pub format: OutputFormat,
    /// Restricted debug-companion variant. Without the explicit
    /// dangerous-permission opt-in, default-handler permissions are stripped
    /// from the manifest.
    pub companion: bool,
    /// Emit `requestLegacyExternalStorage` on the application element.
    pub legacy_storage: bool,
    /// Opt-in that keeps dangerous default-handler permissions in companion
    /// builds.
    pub dangerous_permissions: bool,
}

impl BuildFlags {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            companion: false,
            legacy_storage: false,
            dangerous_permissions: false,
        }
    }
}

/// Filesystem locations of one build's intermediate and final artifacts.
///
/// The fixed directories exist from the start; every `Option` slot is a
/// producer/consumer contract between two tasks. A task that finds its input
/// slot empty reports a configuration error naming the missing artifact,
/// which only happens when the pipeline was assembled out of order.
#[derive(Debug)]
pub struct BuildPaths {
    /// Root of all intermediates for this build. Left in place after a
    /// failure for post-mortem inspection.
    pub build_dir: Utf8PathBuf,
    /// Where the final package lands.
    pub output_dir: Utf8PathBuf,
    /// Persistent pre-dex cache directory, shared across builds.
    pub predex_dir: Utf8PathBuf,
    /// Shared root for exploded archive dependencies.
    pub exploded_dir: Utf8PathBuf,
    /// Project resource tree (icons, custom snippets land here).
    pub res_dir: Utf8PathBuf,

    pub manifest: Option<Utf8PathBuf>,
    pub merged_res_dir: Option<Utf8PathBuf>,
    pub merged_assets_dir: Option<Utf8PathBuf>,
    pub classes_dir: Option<Utf8PathBuf>,
    pub dex_dir: Option<Utf8PathBuf>,
    /// Linked resource package (`.ap_` for APK, proto APK for AAB).
    pub resource_pack: Option<Utf8PathBuf>,
    pub unsigned_pack: Option<Utf8PathBuf>,
    pub aligned_pack: Option<Utf8PathBuf>,
    /// Module layout directory for the bundle path.
    pub module_dir: Option<Utf8PathBuf>,
    /// The finished artifact.
    pub output: Option<Utf8PathBuf>,
}

impl BuildPaths {
    pub fn new(
        build_dir: impl Into<Utf8PathBuf>,
        output_dir: impl Into<Utf8PathBuf>,
        predex_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        let build_dir = build_dir.into();
        Self {
            exploded_dir: build_dir.join("exploded"),
            res_dir: build_dir.join("res"),
            build_dir,
            output_dir: output_dir.into(),
            predex_dir: predex_dir.into(),
            manifest: None,
            merged_res_dir: None,
            merged_assets_dir: None,
            classes_dir: None,
            dex_dir: None,
            resource_pack: None,
            unsigned_pack: None,
            aligned_pack: None,
            module_dir: None,
            output: None,
        }
    }

    pub(crate) fn require<'a>(
        slot: &'a Option<Utf8PathBuf>,
        what: &str,
    ) -> Result<&'a Utf8Path, TaskError> {
        slot.as_deref().ok_or_else(|| {
            TaskError::Configuration(format!("{what} was not produced by an earlier task"))
        })
    }
}

/// Aggregate state owned by the executor for the duration of one build.
///
/// Constructed at build start, dropped when the build finishes; nothing in it
/// is reused across builds except the on-disk pre-dex store the cache points
/// at. Abandoning a build is simply dropping this value.
pub struct BuildContext {
    pub project: Project,
    pub flags: BuildFlags,
    pub paths: BuildPaths,
    pub requirements: ComponentRequirements,
    pub exploded: ArchiveLibrarySet,
    pub predex: PredexCache,
    pub tools: Arc<dyn ToolLocator>,
    pub runner: Arc<dyn CommandRunner>,
    pub reporter: Arc<dyn Reporter>,
}

impl BuildContext {
    pub fn new(
        project: Project,
        flags: BuildFlags,
        paths: BuildPaths,
        requirements: ComponentRequirements,
        tools: Arc<dyn ToolLocator>,
        runner: Arc<dyn CommandRunner>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let predex = PredexCache::new(paths.predex_dir.clone());
        Self {
            project,
            flags,
            paths,
            requirements,
            exploded: ArchiveLibrarySet::new(),
            predex,
            tools,
            runner,
            reporter,
        }
    }
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("project", &self.project.package)
            .field("flags", &self.flags)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}
