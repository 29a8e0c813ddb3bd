//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::{Utf8Path, Utf8PathBuf};

use crate::context::{BuildContext, BuildFlags, BuildPaths, OutputFormat};
use crate::project::Project;
use crate::report::Reporter;
use crate::requirements::ComponentRequirements;
use crate::tools::{CommandOutput, CommandRunner, CommandSpec, Tool, ToolLocator};

pub(crate) fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::try_from(path.to_path_buf()).unwrap()
}

pub(crate) fn project() -> Project {
    Project {
        name: "App".into(),
        package: "io.example.app".into(),
        version_code: 1,
        version_name: "1.0".into(),
        min_sdk: 21,
        main_screen: "Screen1".into(),
        sources: vec![Utf8PathBuf::from("src/Screen1.java")],
        assets_dir: None,
        icon: None,
        theme: Default::default(),
        primary_color: "#3F51B5".into(),
        accent_color: "#FF4081".into(),
    }
}

/// Locator resolving tools, libraries and assets from fixed maps.
#[derive(Default)]
pub(crate) struct MapLocator {
    pub tools: HashMap<Tool, Utf8PathBuf>,
    pub libraries: HashMap<String, Utf8PathBuf>,
    pub assets: HashMap<String, Utf8PathBuf>,
    pub library_lookups: AtomicUsize,
}

impl ToolLocator for MapLocator {
    fn locate(&self, tool: Tool) -> Option<Utf8PathBuf> {
        self.tools.get(&tool).cloned()
    }

    fn locate_library(&self, name: &str) -> Option<Utf8PathBuf> {
        self.library_lookups.fetch_add(1, Ordering::SeqCst);
        self.libraries.get(name).cloned()
    }

    fn locate_asset(&self, name: &str) -> Option<Utf8PathBuf> {
        self.assets.get(name).cloned()
    }
}

/// Runner that records every invocation and always reports success.
#[derive(Default)]
pub(crate) struct RecordingRunner {
    pub calls: std::sync::Mutex<Vec<CommandSpec>>,
}

impl RecordingRunner {
    pub(crate) fn invocations(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        Ok(CommandOutput {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

pub(crate) struct NullReporter;

impl Reporter for NullReporter {
    fn progress(&self, _percent: u8, _message: &str) {}
}

/// Build a context rooted in `dir` with the given collaborators.
pub(crate) fn context_in(
    dir: &Utf8Path,
    format: OutputFormat,
    requirements: ComponentRequirements,
    locator: Arc<MapLocator>,
    runner: Arc<RecordingRunner>,
) -> BuildContext {
    BuildContext::new(
        project(),
        BuildFlags::new(format),
        BuildPaths::new(dir.join("build"), dir.join("out"), dir.join("predex")),
        requirements,
        locator,
        runner,
        Arc::new(NullReporter),
    )
}
