//! Asset attachment: builds the merged asset tree.
//!
//! Collision policy: a component asset claims its file name at the tree
//! root; a later component of a *different* type reusing that name is
//! namespaced under its component type instead of clobbering. Project assets
//! are copied last and may overwrite anything.

use std::collections::HashMap;
use std::fs;

use crate::context::BuildContext;
use crate::error::{TaskError, TaskResult};
use crate::library::overlay_tree;

pub(crate) fn attach_assets(ctx: &mut BuildContext) -> TaskResult {
    let merged = ctx.paths.build_dir.join("assets");
    fs::create_dir_all(&merged)?;

    // Assets shipped inside exploded archives come first; anything declared
    // explicitly wins over them.
    for library in ctx.exploded.libraries() {
        if let Some(assets) = &library.assets_dir {
            overlay_tree(assets, &merged)?;
        }
    }

    let mut claimed: HashMap<String, String> = HashMap::new();

    for (component, name) in ctx.requirements.assets() {
        let source = ctx.tools.locate_asset(name).ok_or_else(|| {
            TaskError::Configuration(format!("asset '{name}' could not be resolved"))
        })?;

        let file_name = source
            .file_name()
            .ok_or_else(|| TaskError::Configuration(format!("invalid asset path '{source}'")))?;

        let target = match claimed.get(file_name) {
            Some(owner) if owner != component => {
                // Namespace by component type to avoid the collision.
                let dir = merged.join(component);
                fs::create_dir_all(&dir)?;
                dir.join(file_name)
            }
            _ => {
                claimed.insert(file_name.to_string(), component.to_string());
                merged.join(file_name)
            }
        };

        fs::copy(&source, &target)?;
    }

    if let Some(project_assets) = &ctx.project.assets_dir {
        if project_assets.exists() {
            overlay_tree(project_assets, &merged)?;
        }
    }

    ctx.paths.merged_assets_dir = Some(merged);
    Ok(())
}
