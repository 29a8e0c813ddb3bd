//! Alignment and signing of the APK container.

use crate::context::{BuildContext, BuildPaths};
use crate::error::TaskResult;
use crate::tools::{self, CommandSpec, Tool};

pub(crate) fn sign_package(ctx: &mut BuildContext) -> TaskResult {
    let aligner = tools::require(ctx.tools.as_ref(), Tool::Aligner)?;
    let signer = tools::require(ctx.tools.as_ref(), Tool::ApkSigner)?;
    let keystore = tools::require(ctx.tools.as_ref(), Tool::Keystore)?;
    let unsigned = BuildPaths::require(&ctx.paths.unsigned_pack, "unsigned package")?;

    let aligned = ctx.paths.build_dir.join("aligned.apk");
    let align = CommandSpec::new(aligner)
        .arg("-f")
        .arg("4")
        .arg_path(unsigned)
        .arg_path(&aligned);
    tools::run_tool(ctx.runner.as_ref(), Tool::Aligner.name(), &align)?;

    std::fs::create_dir_all(&ctx.paths.output_dir)?;
    let output = ctx
        .paths
        .output_dir
        .join(format!("{}.apk", ctx.project.artifact_stem()));
    let sign = CommandSpec::new(signer)
        .arg("sign")
        .arg("--ks")
        .arg_path(&keystore)
        .arg("--out")
        .arg_path(&output)
        .arg_path(&aligned);
    tools::run_tool(ctx.runner.as_ref(), Tool::ApkSigner.name(), &sign)?;

    tracing::info!(output = %output, "signed package");
    ctx.paths.aligned_pack = Some(aligned);
    ctx.paths.output = Some(output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::OutputFormat;
    use crate::error::TaskError;
    use crate::requirements::ComponentRequirements;
    use crate::testutil::{MapLocator, RecordingRunner, context_in, utf8};

    #[test]
    fn aligns_then_signs_into_the_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());

        let locator = Arc::new(MapLocator {
            tools: [
                (Tool::Aligner, dir.join("zipalign")),
                (Tool::ApkSigner, dir.join("apksigner")),
                (Tool::Keystore, dir.join("android.keystore")),
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
        std::fs::create_dir_all(&ctx.paths.build_dir).unwrap();
        ctx.paths.unsigned_pack = Some(ctx.paths.build_dir.join("unsigned.apk"));

        sign_package(&mut ctx).unwrap();

        assert_eq!(runner.invocations(), 2);
        let calls = runner.calls.lock().unwrap();
        assert!(calls[0].program.as_str().ends_with("zipalign"));
        assert!(calls[1].program.as_str().ends_with("apksigner"));
        assert!(ctx.paths.output.as_ref().unwrap().as_str().ends_with("App.apk"));
    }

    #[test]
    fn display_name_with_separators_stays_in_the_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());

        let locator = Arc::new(MapLocator {
            tools: [
                (Tool::Aligner, dir.join("zipalign")),
                (Tool::ApkSigner, dir.join("apksigner")),
                (Tool::Keystore, dir.join("android.keystore")),
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
        std::fs::create_dir_all(&ctx.paths.build_dir).unwrap();
        ctx.paths.unsigned_pack = Some(ctx.paths.build_dir.join("unsigned.apk"));
        ctx.project.name = "My/App & Co".into();

        sign_package(&mut ctx).unwrap();

        let output = ctx.paths.output.as_ref().unwrap();
        assert_eq!(output.parent().unwrap(), ctx.paths.output_dir.as_path());
        assert!(output.as_str().ends_with("MyAppCo.apk"));
    }

    #[test]
    fn signing_without_a_keystore_is_tool_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());

        let locator = Arc::new(MapLocator {
            tools: [
                (Tool::Aligner, dir.join("zipalign")),
                (Tool::ApkSigner, dir.join("apksigner")),
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
        ctx.paths.unsigned_pack = Some(ctx.paths.build_dir.join("unsigned.apk"));

        let err = sign_package(&mut ctx).unwrap_err();
        assert!(matches!(err, TaskError::ToolUnavailable(name) if name == "keystore"));
    }
}
