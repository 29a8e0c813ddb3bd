//! Compilation of the generated intermediate sources.

use std::fs;

use camino::Utf8PathBuf;

use crate::context::BuildContext;
use crate::error::{TaskError, TaskResult};
use crate::tools::{self, CommandSpec, Tool};

#[cfg(windows)]
const CLASSPATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const CLASSPATH_SEPARATOR: &str = ":";

pub(crate) fn compile_sources(ctx: &mut BuildContext) -> TaskResult {
    if ctx.project.sources.is_empty() {
        return Err(TaskError::NoUserCode);
    }

    // Screens with no blocks generate whitespace-only sources; that is a
    // project problem, not a compiler failure.
    let mut has_code = false;
    for source in &ctx.project.sources {
        let text = fs::read_to_string(source)?;
        if !text.trim().is_empty() {
            has_code = true;
        }
    }
    if !has_code {
        return Err(TaskError::NoUserCode);
    }

    let javac = tools::require(ctx.tools.as_ref(), Tool::JavaCompiler)?;
    let classpath = assemble_classpath(ctx)?;

    let classes = ctx.paths.build_dir.join("classes");
    fs::create_dir_all(&classes)?;

    let joined = classpath
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(CLASSPATH_SEPARATOR);

    let mut spec = CommandSpec::new(javac)
        .arg("-d")
        .arg_path(&classes)
        .arg("-classpath")
        .arg(joined);
    for source in &ctx.project.sources {
        spec = spec.arg_path(source);
    }

    tools::run_tool(ctx.runner.as_ref(), Tool::JavaCompiler.name(), &spec)?;

    ctx.paths.classes_dir = Some(classes);
    Ok(())
}

/// Deterministic classpath order: the runtime library, then component
/// libraries in requirement order, then archive classes, then the platform
/// jar. A library claimed by two component types appears once, at its first
/// position.
pub(crate) fn assemble_classpath(ctx: &BuildContext) -> Result<Vec<Utf8PathBuf>, TaskError> {
    let mut classpath = Vec::new();
    classpath.push(tools::require(ctx.tools.as_ref(), Tool::RuntimeJar)?);

    for (_component, name) in ctx.requirements.libraries() {
        let path = ctx.tools.locate_library(name).ok_or_else(|| {
            TaskError::Configuration(format!("library '{name}' could not be resolved"))
        })?;
        if !classpath.contains(&path) {
            classpath.push(path);
        }
    }

    for jar in ctx.exploded.classes_jars() {
        classpath.push(jar.to_owned());
    }

    classpath.push(tools::require(ctx.tools.as_ref(), Tool::PlatformJar)?);
    Ok(classpath)
}
