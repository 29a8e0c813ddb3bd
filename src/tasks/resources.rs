//! Resource merging and packaging.
//!
//! Merging overlays every archive library's resource tree plus the project's
//! own into one directory. Packaging then links that tree with the platform
//! jar; the APK format uses `aapt package` while the bundle format compiles
//! and links through `aapt2` in proto output, chosen at assembly time.

use crate::context::{BuildContext, BuildPaths};
use crate::error::TaskResult;
use crate::tools::{self, CommandSpec, Tool};

pub(crate) fn merge_resources(ctx: &mut BuildContext) -> TaskResult {
    let merged = ctx.paths.build_dir.join("merged-res");
    ctx.exploded.merge_resources(&merged, &ctx.paths.res_dir)?;
    ctx.paths.merged_res_dir = Some(merged);
    Ok(())
}

/// Package resources for the APK format with `aapt`. This invocation is
/// retried once; it is the one call with a history of transient failures on
/// busy hosts.
pub(crate) fn link_resources_apk(ctx: &mut BuildContext) -> TaskResult {
    let aapt = tools::require(ctx.tools.as_ref(), Tool::Aapt)?;
    let platform = tools::require(ctx.tools.as_ref(), Tool::PlatformJar)?;
    let manifest = BuildPaths::require(&ctx.paths.manifest, "manifest")?;
    let merged_res = BuildPaths::require(&ctx.paths.merged_res_dir, "merged resources")?;

    let pack = ctx.paths.build_dir.join("resources.ap_");

    let mut spec = CommandSpec::new(aapt)
        .arg("package")
        .arg("-f")
        .arg("-M")
        .arg_path(manifest)
        .arg("-S")
        .arg_path(merged_res)
        .arg("-I")
        .arg_path(&platform)
        .arg("-F")
        .arg_path(&pack);

    if let Some(assets) = &ctx.paths.merged_assets_dir {
        spec = spec.arg("-A").arg_path(assets);
    }

    tools::run_tool_with_retry(ctx.runner.as_ref(), Tool::Aapt.name(), &spec)?;

    ctx.paths.resource_pack = Some(pack);
    Ok(())
}

/// Package resources in proto format for the bundle path: `aapt2 compile`
/// into a flat archive, then `aapt2 link --proto-format`.
pub(crate) fn link_resources_proto(ctx: &mut BuildContext) -> TaskResult {
    let aapt2 = tools::require(ctx.tools.as_ref(), Tool::Aapt2)?;
    let platform = tools::require(ctx.tools.as_ref(), Tool::PlatformJar)?;
    let manifest = BuildPaths::require(&ctx.paths.manifest, "manifest")?;
    let merged_res = BuildPaths::require(&ctx.paths.merged_res_dir, "merged resources")?;

    let compiled = ctx.paths.build_dir.join("compiled-res.zip");
    let compile = CommandSpec::new(aapt2.clone())
        .arg("compile")
        .arg("--dir")
        .arg_path(merged_res)
        .arg("-o")
        .arg_path(&compiled);
    tools::run_tool(ctx.runner.as_ref(), Tool::Aapt2.name(), &compile)?;

    let pack = ctx.paths.build_dir.join("resources.proto.ap_");
    let mut link = CommandSpec::new(aapt2)
        .arg("link")
        .arg("--proto-format")
        .arg("--auto-add-overlay")
        .arg("--manifest")
        .arg_path(manifest)
        .arg("-I")
        .arg_path(&platform)
        .arg("-R")
        .arg_path(&compiled)
        .arg("-o")
        .arg_path(&pack);

    if let Some(assets) = &ctx.paths.merged_assets_dir {
        link = link.arg("-A").arg_path(assets);
    }

    tools::run_tool(ctx.runner.as_ref(), Tool::Aapt2.name(), &link)?;

    ctx.paths.resource_pack = Some(pack);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use super::*;
    use crate::context::OutputFormat;
    use crate::error::TaskError;
    use crate::requirements::ComponentRequirements;
    use crate::testutil::{MapLocator, RecordingRunner, context_in, utf8};

    #[test]
    fn missing_aapt_is_tool_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());

        let mut ctx = context_in(
            &dir,
            OutputFormat::Apk,
            ComponentRequirements::new(),
            Arc::new(MapLocator::default()),
            Arc::new(RecordingRunner::default()),
        );

        let err = link_resources_apk(&mut ctx).unwrap_err();
        assert!(matches!(err, TaskError::ToolUnavailable(name) if name == "aapt"));
    }

    #[test]
    fn linking_requires_the_manifest_to_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());

        let locator = Arc::new(MapLocator {
            tools: [
                (Tool::Aapt, dir.join("aapt")),
                (Tool::PlatformJar, dir.join("android.jar")),
            ]
            .into(),
            ..Default::default()
        });

        let mut ctx = context_in(
            &dir,
            OutputFormat::Apk,
            ComponentRequirements::new(),
            locator,
            Arc::new(RecordingRunner::default()),
        );

        // Manifest slot was never filled by an earlier task.
        let err = link_resources_apk(&mut ctx).unwrap_err();
        assert!(matches!(err, TaskError::Configuration(_)));
    }

    #[test]
    fn apk_link_invokes_aapt_once_and_sets_the_pack() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());

        let locator = Arc::new(MapLocator {
            tools: [
                (Tool::Aapt, dir.join("aapt")),
                (Tool::PlatformJar, dir.join("android.jar")),
            ]
            .into(),
            ..Default::default()
        });
        let runner = Arc::new(RecordingRunner::default());

        let mut ctx = context_in(
            &dir,
            OutputFormat::Apk,
            ComponentRequirements::new(),
            locator,
            runner.clone(),
        );
        fs::create_dir_all(&ctx.paths.build_dir).unwrap();
        let manifest = ctx.paths.build_dir.join("AndroidManifest.xml");
        fs::write(&manifest, "<manifest/>").unwrap();
        ctx.paths.manifest = Some(manifest);
        ctx.paths.merged_res_dir = Some(ctx.paths.build_dir.join("merged-res"));

        link_resources_apk(&mut ctx).unwrap();

        assert_eq!(runner.invocations(), 1);
        assert!(
            ctx.paths
                .resource_pack
                .as_ref()
                .unwrap()
                .as_str()
                .ends_with("resources.ap_")
        );
    }
}
