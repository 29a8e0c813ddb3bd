//! Bytecode conversion to dex, with per-library pre-dexing.
//!
//! Libraries go through the content-addressed cache one at a time, so an
//! unchanged library never converts twice across builds. The compiled
//! project classes convert fresh every build; the cached fragments are then
//! laid alongside them as additional `classesN.dex` entries.

use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use crate::context::{BuildContext, BuildPaths};
use crate::error::{TaskError, TaskResult};
use crate::predex::DexConverter;
use crate::tools::{self, CommandRunner, CommandSpec, Tool};

/// Implicit multidex is available from this API level; below it the main
/// screen's classes must be pinned into the primary dex.
const IMPLICIT_MULTIDEX_API: u32 = 21;

/// Converter backed by `d8`, or `dx` on hosts that predate it.
pub(crate) struct HostDexConverter {
    program: Utf8PathBuf,
    modern: bool,
    min_api: u32,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for HostDexConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostDexConverter")
            .field("program", &self.program)
            .field("modern", &self.modern)
            .field("min_api", &self.min_api)
            .finish_non_exhaustive()
    }
}

impl HostDexConverter {
    /// Pick the best converter the host offers.
    pub(crate) fn locate(ctx: &BuildContext, min_api: u32) -> Result<Self, TaskError> {
        let runner = ctx.runner.clone();
        if let Some(program) = ctx.tools.locate(Tool::Dexer) {
            return Ok(Self { program, modern: true, min_api, runner });
        }
        let program = tools::require(ctx.tools.as_ref(), Tool::LegacyDexer)?;
        Ok(Self { program, modern: false, min_api, runner })
    }

    fn tool_name(&self) -> &'static str {
        if self.modern {
            Tool::Dexer.name()
        } else {
            Tool::LegacyDexer.name()
        }
    }

    fn base_spec(&self, output_dir: &Utf8Path) -> CommandSpec {
        if self.modern {
            CommandSpec::new(self.program.clone())
                .arg("--release")
                .arg("--min-api")
                .arg(self.min_api.to_string())
                .arg("--output")
                .arg_path(output_dir)
        } else {
            CommandSpec::new(self.program.clone())
                .arg("--dex")
                .arg(format!("--output={output_dir}"))
        }
    }

    /// Convert the compiled project classes, pinning the main screen into
    /// the primary dex when the target range requires it.
    fn convert_classes(
        &self,
        ctx: &BuildContext,
        classes_dir: &Utf8Path,
        output_dir: &Utf8Path,
    ) -> TaskResult {
        let mut spec = self.base_spec(output_dir);

        if self.min_api < IMPLICIT_MULTIDEX_API {
            if self.modern {
                let rules = ctx.paths.build_dir.join("main-dex-rules.txt");
                let main_class = format!("{}.{}", ctx.project.package, ctx.project.main_screen);
                fs::write(&rules, format!("-keep class {main_class} {{ *; }}\n"))?;
                spec = spec.arg("--main-dex-rules").arg_path(&rules);
            } else {
                let list = ctx.paths.build_dir.join("main-dex-list.txt");
                let entry = format!(
                    "{}/{}.class",
                    ctx.project.package.replace('.', "/"),
                    ctx.project.main_screen,
                );
                fs::write(&list, format!("{entry}\n"))?;
                spec = spec.arg(format!("--main-dex-list={list}"));
            }
        }

        for class in class_files(classes_dir)? {
            spec = spec.arg_path(class);
        }

        // Same lock that serializes cache-miss conversions; the converter
        // subprocess is a shared resource even when the output never enters
        // the cache.
        let _guard = crate::predex::conversion_guard();
        tools::run_tool(self.runner.as_ref(), self.tool_name(), &spec)
    }
}

impl DexConverter for HostDexConverter {
    // The cache holds the conversion lock around this call; taking it here
    // again would deadlock.
    fn convert(&self, input: &Utf8Path, output_dir: &Utf8Path) -> TaskResult {
        let spec = self.base_spec(output_dir).arg_path(input);
        tools::run_tool(self.runner.as_ref(), self.tool_name(), &spec)
    }
}

pub(crate) fn convert_bytecode(ctx: &mut BuildContext) -> TaskResult {
    let classes_dir = BuildPaths::require(&ctx.paths.classes_dir, "compiled classes")?.to_owned();
    let min_api = ctx.requirements.effective_min_sdk(ctx.project.min_sdk);
    let converter = HostDexConverter::locate(ctx, min_api)?;

    let dex_dir = ctx.paths.build_dir.join("dex");
    fs::create_dir_all(&dex_dir)?;

    converter.convert_classes(ctx, &classes_dir, &dex_dir)?;

    // Every library jar converts through the cache, one fragment each.
    let mut fragments = Vec::new();
    for jar in library_jars(ctx)? {
        fragments.push(ctx.predex.resolve(&jar, &converter)?);
    }

    // Fragments slot in after whatever the project conversion produced.
    let mut next = next_dex_index(&dex_dir)?;
    for fragment in fragments {
        fs::copy(&fragment, dex_dir.join(format!("classes{next}.dex")))?;
        next += 1;
    }

    ctx.paths.dex_dir = Some(dex_dir);
    Ok(())
}

/// Jars contributing dex fragments: the runtime, every remaining component
/// library, and each exploded archive's classes jar. Order and deduplication
/// mirror the classpath.
fn library_jars(ctx: &BuildContext) -> Result<Vec<Utf8PathBuf>, TaskError> {
    let mut jars = Vec::new();
    jars.push(tools::require(ctx.tools.as_ref(), Tool::RuntimeJar)?);

    for (_component, name) in ctx.requirements.libraries() {
        let path = ctx.tools.locate_library(name).ok_or_else(|| {
            TaskError::Configuration(format!("library '{name}' could not be resolved"))
        })?;
        if !jars.contains(&path) {
            jars.push(path);
        }
    }

    for jar in ctx.exploded.classes_jars() {
        jars.push(jar.to_owned());
    }

    Ok(jars)
}

fn class_files(classes_dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, TaskError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(classes_dir).sort_by_file_name() {
        let entry = entry.map_err(|err| TaskError::Io(err.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Utf8PathBuf::try_from(entry.path().to_path_buf())
            .map_err(|err| TaskError::Configuration(err.to_string()))?;
        if path.extension() == Some("class") {
            found.push(path);
        }
    }
    Ok(found)
}

/// First free `classesN.dex` index in `dir`; the unnumbered `classes.dex`
/// counts as index 1.
fn next_dex_index(dir: &Utf8Path) -> Result<u32, TaskError> {
    let mut next = 2;
    for entry in dir.read_dir_utf8()? {
        let name = entry?.file_name().to_string();
        let Some(stem) = name.strip_suffix(".dex") else {
            continue;
        };
        let Some(digits) = stem.strip_prefix("classes") else {
            continue;
        };
        if let Ok(index) = digits.parse::<u32>() {
            next = next.max(index + 1);
        }
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::context::OutputFormat;
    use crate::predex;
    use crate::requirements::ComponentRequirements;
    use crate::testutil::{MapLocator, RecordingRunner, context_in, utf8};
    use crate::tools::CommandOutput;

    /// Runner that records whether the conversion lock was held while the
    /// tool ran.
    #[derive(Default)]
    struct LockObservingRunner {
        held: AtomicBool,
    }

    impl CommandRunner for LockObservingRunner {
        fn run(&self, _spec: &CommandSpec) -> std::io::Result<CommandOutput> {
            self.held
                .store(predex::conversion_lock_is_held(), Ordering::SeqCst);
            Ok(CommandOutput {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    #[test]
    fn next_index_skips_existing_fragments() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());

        fs::write(dir.join("classes.dex"), b"a").unwrap();
        assert_eq!(next_dex_index(&dir).unwrap(), 2);

        fs::write(dir.join("classes2.dex"), b"b").unwrap();
        fs::write(dir.join("classes3.dex"), b"c").unwrap();
        assert_eq!(next_dex_index(&dir).unwrap(), 4);
    }

    #[test]
    fn missing_both_converters_is_tool_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());

        let ctx = context_in(
            &dir,
            OutputFormat::Apk,
            ComponentRequirements::new(),
            Arc::new(MapLocator::default()),
            Arc::new(RecordingRunner::default()),
        );

        let err = HostDexConverter::locate(&ctx, 21).unwrap_err();
        assert!(matches!(err, TaskError::ToolUnavailable(name) if name == "dx"));
    }

    #[test]
    fn low_min_api_pins_the_main_screen() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());

        let locator = Arc::new(MapLocator {
            tools: [(Tool::Dexer, dir.join("d8"))].into(),
            ..Default::default()
        });
        let runner = Arc::new(RecordingRunner::default());

        let ctx = context_in(
            &dir,
            OutputFormat::Apk,
            ComponentRequirements::new(),
            locator,
            runner.clone(),
        );
        fs::create_dir_all(&ctx.paths.build_dir).unwrap();
        let classes = ctx.paths.build_dir.join("classes");
        fs::create_dir_all(&classes).unwrap();
        fs::write(classes.join("Screen1.class"), b"\xca\xfe\xba\xbe").unwrap();

        let converter = HostDexConverter::locate(&ctx, 19).unwrap();
        converter
            .convert_classes(&ctx, &classes, &ctx.paths.build_dir.join("dex"))
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert!(calls[0].args.iter().any(|a| a == "--main-dex-rules"));

        let rules = fs::read_to_string(ctx.paths.build_dir.join("main-dex-rules.txt")).unwrap();
        assert!(rules.contains("io.example.app.Screen1"));
    }

    #[test]
    fn classes_conversion_runs_under_the_conversion_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());

        let ctx = context_in(
            &dir,
            OutputFormat::Apk,
            ComponentRequirements::new(),
            Arc::new(MapLocator::default()),
            Arc::new(RecordingRunner::default()),
        );
        fs::create_dir_all(&ctx.paths.build_dir).unwrap();
        let classes = ctx.paths.build_dir.join("classes");
        fs::create_dir_all(&classes).unwrap();
        fs::write(classes.join("Screen1.class"), b"\xca\xfe\xba\xbe").unwrap();

        let runner = Arc::new(LockObservingRunner::default());
        let converter = HostDexConverter {
            program: dir.join("d8"),
            modern: true,
            min_api: 21,
            runner: runner.clone(),
        };

        converter
            .convert_classes(&ctx, &classes, &ctx.paths.build_dir.join("dex"))
            .unwrap();

        // The subprocess ran with the same lock the cache takes, so two
        // builds can never convert concurrently.
        assert!(runner.held.load(Ordering::SeqCst));
    }
}
