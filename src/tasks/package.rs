//! Container assembly.
//!
//! The APK path hands the linked resource pack, dex fragments and native
//! libraries to `apkbuilder` and gets an unsigned container back. The bundle
//! path instead rearranges the proto-linked pack into the module directory
//! layout `bundletool` expects.

use std::fs;
use std::fs::File;
use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};

use crate::context::{BuildContext, BuildPaths};
use crate::error::{TaskError, TaskResult};
use crate::tools::{self, CommandSpec, Tool};

pub(crate) fn package_apk(ctx: &mut BuildContext) -> TaskResult {
    let builder = tools::require(ctx.tools.as_ref(), Tool::ApkBuilder)?;
    let pack = BuildPaths::require(&ctx.paths.resource_pack, "linked resources")?;
    let dex_dir = BuildPaths::require(&ctx.paths.dex_dir, "dex output")?;

    let unsigned = ctx.paths.build_dir.join("unsigned.apk");

    let mut spec = CommandSpec::new(builder)
        .arg_path(&unsigned)
        .arg("-u")
        .arg("-z")
        .arg_path(pack);

    for fragment in dex_fragments(dex_dir)? {
        spec = spec.arg("-f").arg_path(fragment);
    }

    if let Some(native) = stage_native_libraries(ctx, "native")? {
        spec = spec.arg("-nf").arg_path(native);
    }

    tools::run_tool(ctx.runner.as_ref(), Tool::ApkBuilder.name(), &spec)?;

    ctx.paths.unsigned_pack = Some(unsigned);
    Ok(())
}

/// Rearrange the proto-linked pack into the base module layout:
/// `manifest/AndroidManifest.xml`, `res/`, `resources.pb` and `assets/` keep
/// their roles, anything else moves under `root/`; dex fragments land in
/// `dex/` and native libraries in `lib/<abi>/`.
pub(crate) fn package_base_module(ctx: &mut BuildContext) -> TaskResult {
    let pack = BuildPaths::require(&ctx.paths.resource_pack, "linked resources")?.to_owned();
    let dex_dir = BuildPaths::require(&ctx.paths.dex_dir, "dex output")?.to_owned();

    let base = ctx.paths.build_dir.join("aab/base");
    fs::create_dir_all(&base)?;

    explode_proto_pack(&pack, &base)?;

    let dex_target = base.join("dex");
    fs::create_dir_all(&dex_target)?;
    for fragment in dex_fragments(&dex_dir)? {
        let name = fragment.file_name().unwrap_or("classes.dex");
        fs::copy(&fragment, dex_target.join(name))?;
    }

    for (abi, path) in native_libraries(ctx)? {
        let lib_dir = base.join("lib").join(&abi);
        fs::create_dir_all(&lib_dir)?;
        let name = path
            .file_name()
            .ok_or_else(|| TaskError::Configuration(format!("invalid native path '{path}'")))?;
        fs::copy(&path, lib_dir.join(name))?;
    }

    ctx.paths.module_dir = Some(base);
    Ok(())
}

/// All native libraries of this build: the exploded archives' `jni/` trees
/// plus every component-declared native library, whose ABI is the directory
/// it resolves into.
fn native_libraries(ctx: &BuildContext) -> Result<Vec<(String, Utf8PathBuf)>, TaskError> {
    let mut natives = ctx.exploded.native_libraries()?;

    for name in ctx.requirements.native_libraries() {
        let path = ctx.tools.locate_library(name).ok_or_else(|| {
            TaskError::Configuration(format!("native library '{name}' could not be resolved"))
        })?;
        let abi = path
            .parent()
            .and_then(Utf8Path::file_name)
            .ok_or_else(|| TaskError::Configuration(format!("invalid native path '{path}'")))?
            .to_string();
        natives.push((abi, path));
    }

    Ok(natives)
}

fn explode_proto_pack(pack: &Utf8Path, base: &Utf8Path) -> TaskResult {
    let name = pack.file_name().unwrap_or("resources.proto.ap_").to_string();
    let file = File::open(pack)?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|err| TaskError::Archive(name.clone(), err))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|err| TaskError::Archive(name.clone(), err))?;
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };

        let relative = Utf8PathBuf::try_from(relative)
            .map_err(|err| TaskError::Configuration(err.to_string()))?;
        let target = base.join(module_slot(&relative));

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
    }

    Ok(())
}

fn module_slot(entry: &Utf8Path) -> Utf8PathBuf {
    match entry.as_str() {
        "AndroidManifest.xml" => Utf8PathBuf::from("manifest/AndroidManifest.xml"),
        "resources.pb" => entry.to_owned(),
        _ if entry.starts_with("res") || entry.starts_with("assets") => entry.to_owned(),
        _ => Utf8PathBuf::from("root").join(entry),
    }
}

fn dex_fragments(dex_dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, TaskError> {
    let mut fragments = Vec::new();
    for entry in dex_dir.read_dir_utf8()? {
        let entry = entry?;
        let path = entry.into_path();
        if path.extension() == Some("dex") {
            fragments.push(path);
        }
    }
    fragments.sort();
    Ok(fragments)
}

/// Collect every native library into `lib/<abi>/` under a staging directory;
/// `None` when the build ships no native code.
fn stage_native_libraries(
    ctx: &BuildContext,
    dir_name: &str,
) -> Result<Option<Utf8PathBuf>, TaskError> {
    let natives = native_libraries(ctx)?;
    if natives.is_empty() {
        return Ok(None);
    }

    let staging = ctx.paths.build_dir.join(dir_name);
    for (abi, path) in natives {
        let abi_dir = staging.join("lib").join(&abi);
        fs::create_dir_all(&abi_dir)?;
        let name = path
            .file_name()
            .ok_or_else(|| TaskError::Configuration(format!("invalid native path '{path}'")))?;
        fs::copy(&path, abi_dir.join(name))?;
    }

    Ok(Some(staging))
}
