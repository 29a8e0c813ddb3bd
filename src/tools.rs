//! Seams to the host: external tool discovery and subprocess execution.
//!
//! The pipeline never hardcodes where a tool lives; it asks a [`ToolLocator`]
//! and treats `None` as fatal for the requesting task. Subprocesses run
//! through the [`CommandRunner`] trait so tests can count and fake
//! invocations without touching the system.

use std::process::Stdio;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::{TaskError, TaskResult};

/// Every external tool or host resource a task may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// `aapt`, packages resources for the APK format.
    Aapt,
    /// `aapt2`, links resources in proto format for the AAB format.
    Aapt2,
    /// `d8`, converts JVM bytecode to dex.
    Dexer,
    /// `dx`, the fallback converter on hosts without `d8`.
    LegacyDexer,
    /// `javac`.
    JavaCompiler,
    /// `apkbuilder`, assembles the unsigned container.
    ApkBuilder,
    /// `zipalign`.
    Aligner,
    /// `apksigner`.
    ApkSigner,
    /// `bundletool`.
    Bundletool,
    /// `jarsigner`, signs the finished bundle.
    JarSigner,
    /// `android.jar` for the target platform level.
    PlatformJar,
    /// The component runtime library linked into every build.
    RuntimeJar,
    /// Keystore used for signing.
    Keystore,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::Aapt => "aapt",
            Tool::Aapt2 => "aapt2",
            Tool::Dexer => "d8",
            Tool::LegacyDexer => "dx",
            Tool::JavaCompiler => "javac",
            Tool::ApkBuilder => "apkbuilder",
            Tool::Aligner => "zipalign",
            Tool::ApkSigner => "apksigner",
            Tool::Bundletool => "bundletool",
            Tool::JarSigner => "jarsigner",
            Tool::PlatformJar => "android.jar",
            Tool::RuntimeJar => "runtime.jar",
            Tool::Keystore => "keystore",
        }
    }
}

/// Resolves tools and named build resources to absolute host paths.
///
/// Where these live on disk is a deployment concern; the pipeline only
/// consumes the answers.
pub trait ToolLocator: Send + Sync {
    fn locate(&self, tool: Tool) -> Option<Utf8PathBuf>;

    /// Resolve a component library by its declared name, e.g.
    /// `mapslib.jar` or `barcode.aar`.
    fn locate_library(&self, name: &str) -> Option<Utf8PathBuf>;

    /// Resolve a component asset by its declared name.
    fn locate_asset(&self, name: &str) -> Option<Utf8PathBuf>;
}

pub(crate) fn require(locator: &dyn ToolLocator, tool: Tool) -> Result<Utf8PathBuf, TaskError> {
    locator
        .locate(tool)
        .ok_or_else(|| TaskError::ToolUnavailable(tool.name().to_string()))
}

/// One fully-framed command line, ready to execute.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: Utf8PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn arg_path(self, path: impl AsRef<Utf8Path>) -> Self {
        self.arg(path.as_ref().as_str())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Synchronously runs one command and captures its output. `Err` means the
/// process could not be spawned at all; a non-zero exit is reported through
/// `CommandOutput::success`.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutput>;
}

/// Runner backed by `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutput> {
        let output = std::process::Command::new(spec.program.as_std_path())
            .args(&spec.args)
            .stdin(Stdio::null())
            .output()?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a tool and map any failure to [`TaskError::Tool`].
pub(crate) fn run_tool(runner: &dyn CommandRunner, name: &str, spec: &CommandSpec) -> TaskResult {
    tracing::debug!(tool = name, program = %spec.program, "invoking external tool");

    let output = runner
        .run(spec)
        .map_err(|err| TaskError::tool(name, format!("failed to start: {err}")))?;

    if output.success {
        Ok(())
    } else {
        Err(TaskError::tool(
            name,
            format!("{}{}", output.stdout, output.stderr),
        ))
    }
}

/// Like [`run_tool`], but retries exactly once. Reserved for invocations
/// known to fail transiently on loaded hosts; the retry happens only when the
/// first attempt failed, and the second outcome is final.
pub(crate) fn run_tool_with_retry(
    runner: &dyn CommandRunner,
    name: &str,
    spec: &CommandSpec,
) -> TaskResult {
    match run_tool(runner, name, spec) {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::warn!(tool = name, error = %first, "tool failed, retrying once");
            run_tool(runner, name, spec)
        }
    }
}
