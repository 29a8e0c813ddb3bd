//! Bundle assembly for the AAB format.
//!
//! The module directory is zipped, fed to `bundletool build-bundle`, and the
//! produced bundle is signed in place with `jarsigner`. There is no separate
//! signing task on this path; a bundle is never left unsigned on disk.

use std::fs::File;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::context::{BuildContext, BuildPaths};
use crate::error::{TaskError, TaskResult};
use crate::tools::{self, CommandSpec, Tool};

pub(crate) fn bundle_modules(ctx: &mut BuildContext) -> TaskResult {
    let bundletool = tools::require(ctx.tools.as_ref(), Tool::Bundletool)?;
    let jarsigner = tools::require(ctx.tools.as_ref(), Tool::JarSigner)?;
    let keystore = tools::require(ctx.tools.as_ref(), Tool::Keystore)?;
    let module_dir = BuildPaths::require(&ctx.paths.module_dir, "module layout")?;

    let module_zip = ctx.paths.build_dir.join("base.zip");
    zip_module(module_dir, &module_zip)?;

    std::fs::create_dir_all(&ctx.paths.output_dir)?;
    let output = ctx
        .paths
        .output_dir
        .join(format!("{}.aab", ctx.project.artifact_stem()));

    let build = CommandSpec::new(bundletool)
        .arg("build-bundle")
        .arg(format!("--modules={module_zip}"))
        .arg(format!("--output={output}"))
        .arg("--overwrite");
    tools::run_tool(ctx.runner.as_ref(), Tool::Bundletool.name(), &build)?;

    let sign = CommandSpec::new(jarsigner)
        .arg("-sigalg")
        .arg("SHA256withRSA")
        .arg("-digestalg")
        .arg("SHA-256")
        .arg("-keystore")
        .arg_path(&keystore)
        .arg_path(&output)
        .arg("AndroidKey");
    tools::run_tool(ctx.runner.as_ref(), Tool::JarSigner.name(), &sign)?;

    tracing::info!(output = %output, "signed bundle");
    ctx.paths.output = Some(output);
    Ok(())
}

/// Zip the module directory with entry names relative to its root, in
/// deterministic order.
fn zip_module(module_dir: &Utf8Path, target: &Utf8Path) -> TaskResult {
    let name = target.file_name().unwrap_or("base.zip").to_string();
    let file = File::create(target)?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default();

    for entry in WalkDir::new(module_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|err| TaskError::Io(err.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = Utf8PathBuf::try_from(entry.path().to_path_buf())
            .map_err(|err| TaskError::Configuration(err.to_string()))?;
        let relative = path
            .strip_prefix(module_dir)
            .map_err(|err| TaskError::Configuration(err.to_string()))?;

        zip.start_file(relative.as_str(), options)
            .map_err(|err| TaskError::Archive(name.clone(), err))?;
        let bytes = std::fs::read(&path)?;
        zip.write_all(&bytes)?;
    }

    zip.finish().map_err(|err| TaskError::Archive(name, err))?;
    Ok(())
}
