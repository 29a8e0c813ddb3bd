//! Concrete pipeline tasks, one module per phase.

use std::fs;

use camino::Utf8Path;

use crate::context::BuildContext;
use crate::error::{TaskError, TaskResult};

pub(crate) mod assets;
pub(crate) mod bundle;
pub(crate) mod compile;
pub(crate) mod dex;
pub(crate) mod icon;
pub(crate) mod libraries;
pub(crate) mod manifest;
pub(crate) mod package;
pub(crate) mod resources;
pub(crate) mod sign;

/// Create the intermediate directory layout and write the component-declared
/// custom resource snippets into the project resource tree, so they take part
/// in the later merge like any other resource file.
pub(crate) fn prepare_workspace(ctx: &mut BuildContext) -> TaskResult {
    fs::create_dir_all(&ctx.paths.build_dir)?;
    fs::create_dir_all(&ctx.paths.output_dir)?;
    fs::create_dir_all(&ctx.paths.res_dir)?;
    fs::create_dir_all(&ctx.paths.exploded_dir)?;
    fs::create_dir_all(&ctx.paths.predex_dir)?;

    for (path, xml) in ctx.requirements.custom_resources() {
        validate_resource_path(path)?;
        let target = ctx.paths.res_dir.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, xml)?;
        tracing::debug!(resource = path, "wrote custom resource snippet");
    }

    Ok(())
}

/// A custom resource declaration must name a file inside one resource
/// subdirectory, e.g. `values/colors.xml`.
fn validate_resource_path(path: &str) -> TaskResult {
    let utf8 = Utf8Path::new(path);
    let valid = !path.is_empty()
        && utf8.is_relative()
        && utf8.components().count() == 2
        && !path.contains("..")
        && path.ends_with(".xml");

    if valid {
        Ok(())
    } else {
        Err(TaskError::Configuration(format!(
            "malformed custom resource declaration '{path}'"
        )))
    }
}
