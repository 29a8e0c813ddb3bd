//! Manifest creation task: runs the synthesizer and writes the document.

use std::fs;

use crate::context::BuildContext;
use crate::error::TaskResult;
use crate::manifest::ManifestSynthesizer;

pub(crate) fn create_manifest(ctx: &mut BuildContext) -> TaskResult {
    let synthesizer = ManifestSynthesizer::new(&ctx.project, &ctx.requirements, &ctx.flags);
    let document = synthesizer.synthesize()?;

    let path = ctx.paths.build_dir.join("AndroidManifest.xml");
    fs::write(&path, &document)?;
    tracing::debug!(path = %path, bytes = document.len(), "wrote manifest");

    ctx.paths.manifest = Some(path);
    Ok(())
}
