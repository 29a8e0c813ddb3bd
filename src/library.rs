//! Exploded archive (AAR-style) dependency handling.
//!
//! A packaged dependency archive bundles compiled classes, a resource tree
//! and optionally per-ABI native code. Before any of that can participate in
//! a build it is exploded into a per-archive directory; the set of exploded
//! archives then contributes resources to the merge step and class jars to
//! the classpath.

use std::collections::BTreeSet;
use std::fs;
use std::fs::File;
use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use crate::error::{TaskError, TaskResult};

/// One exploded dependency archive.
#[derive(Debug)]
pub struct ArchiveLibrary {
    /// Declared name of the archive, e.g. `osmdroid.aar`. Identity key for
    /// deduplication within a build.
    pub name: String,
    /// Per-archive directory under the shared exploded root.
    pub root: Utf8PathBuf,
    pub classes_jar: Option<Utf8PathBuf>,
    pub res_dir: Option<Utf8PathBuf>,
    pub assets_dir: Option<Utf8PathBuf>,
    pub jni_dir: Option<Utf8PathBuf>,
}

impl ArchiveLibrary {
    /// Unconditionally extract `archive` into its own subdirectory of
    /// `exploded_root`. Callers are responsible for not unpacking the same
    /// archive identity twice; see [`ArchiveLibrarySet::add`].
    pub fn unpack(archive: &Utf8Path, exploded_root: &Utf8Path) -> Result<Self, TaskError> {
        let name = archive
            .file_name()
            .ok_or_else(|| TaskError::Configuration(format!("invalid archive path '{archive}'")))?
            .to_string();
        let stem = archive.file_stem().unwrap_or(&name);
        let root = exploded_root.join(stem);

        tracing::debug!(archive = %archive, target = %root, "exploding archive");
        fs::create_dir_all(&root)?;

        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(BufReader::new(file))
            .map_err(|err| TaskError::Archive(name.clone(), err))?;

        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|err| TaskError::Archive(name.clone(), err))?;

            // Skip entries escaping the target directory.
            let Some(relative) = entry.enclosed_name() else {
                continue;
            };
            let target = root.join_os(relative);

            if entry.is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&target)?;
                std::io::copy(&mut entry, &mut out)?;
            }
        }

        let existing = |path: Utf8PathBuf| path.exists().then_some(path);

        Ok(ArchiveLibrary {
            classes_jar: existing(root.join("classes.jar")),
            res_dir: existing(root.join("res")),
            assets_dir: existing(root.join("assets")),
            jni_dir: existing(root.join("jni")),
            name,
            root,
        })
    }

    /// Native libraries shipped by this archive, as `(abi, file)` pairs.
    pub fn native_libraries(&self) -> Result<Vec<(String, Utf8PathBuf)>, TaskError> {
        let Some(jni) = &self.jni_dir else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for entry in WalkDir::new(jni).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|err| TaskError::Io(err.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = Utf8PathBuf::try_from(entry.path().to_path_buf())
                .map_err(|err| TaskError::Configuration(err.to_string()))?;
            let abi = path
                .parent()
                .and_then(Utf8Path::file_name)
                .unwrap_or_default()
                .to_string();
            found.push((abi, path));
        }

        Ok(found)
    }
}

/// All exploded archives of one build, in attachment order.
#[derive(Debug, Default)]
pub struct ArchiveLibrarySet {
    libraries: Vec<ArchiveLibrary>,
}

impl ArchiveLibrarySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an exploded library. Identity deduplication is the caller's
    /// concern (the attachment task tracks processed names per build).
    pub fn add(&mut self, library: ArchiveLibrary) {
        self.libraries.push(library);
    }

    pub fn libraries(&self) -> &[ArchiveLibrary] {
        &self.libraries
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Overlay every library's resource tree, then the project's own, into
    /// `target`. The project overlays last so its resources win on name
    /// conflicts; irreconcilable resource identifier conflicts between
    /// libraries are left for the resource linker to reject.
    ///
    /// With zero libraries this reduces to a plain copy of the project tree.
    pub fn merge_resources(&self, target: &Utf8Path, project_res: &Utf8Path) -> TaskResult {
        fs::create_dir_all(target)?;

        for library in &self.libraries {
            if let Some(res) = &library.res_dir {
                overlay_tree(res, target)?;
            }
        }

        if project_res.exists() {
            overlay_tree(project_res, target)?;
        }

        Ok(())
    }

    /// Class jars of every exploded archive, in attachment order.
    pub fn classes_jars(&self) -> Vec<&Utf8Path> {
        self.libraries
            .iter()
            .filter_map(|lib| lib.classes_jar.as_deref())
            .collect()
    }

    /// Native libraries of every exploded archive, deduplicated by
    /// `(abi, file name)` with the first archive winning.
    pub fn native_libraries(&self) -> Result<Vec<(String, Utf8PathBuf)>, TaskError> {
        let mut seen = BTreeSet::new();
        let mut all = Vec::new();

        for library in &self.libraries {
            for (abi, path) in library.native_libraries()? {
                let key = (abi.clone(), path.file_name().unwrap_or_default().to_string());
                if seen.insert(key) {
                    all.push((abi, path));
                }
            }
        }

        Ok(all)
    }
}

/// Recursively copy `src` over `dst`, overwriting files that already exist.
pub(crate) fn overlay_tree(src: &Utf8Path, dst: &Utf8Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let filetype = entry.file_type()?;
        let target = dst.as_std_path().join(entry.file_name());

        if filetype.is_dir() {
            let src = Utf8PathBuf::try_from(entry.path())
                .map_err(|err| std::io::Error::other(err.to_string()))?;
            let dst = Utf8PathBuf::try_from(target)
                .map_err(|err| std::io::Error::other(err.to_string()))?;
            overlay_tree(&src, &dst)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::try_from(path.to_path_buf()).unwrap()
    }

    fn write_archive(dir: &Utf8Path, name: &str) -> Utf8PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let opts = SimpleFileOptions::default();

        zip.start_file("classes.jar", opts).unwrap();
        zip.write_all(b"jar bytes").unwrap();
        zip.start_file("res/values/colors.xml", opts).unwrap();
        zip.write_all(b"<resources/>").unwrap();
        zip.start_file("jni/arm64-v8a/libmap.so", opts).unwrap();
        zip.write_all(b"elf").unwrap();
        zip.finish().unwrap();

        path
    }

    #[test]
    fn unpack_explodes_into_per_archive_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());
        let archive = write_archive(&dir, "maps.aar");

        let lib = ArchiveLibrary::unpack(&archive, &dir.join("exploded")).unwrap();

        assert_eq!(lib.name, "maps.aar");
        assert!(lib.classes_jar.as_ref().unwrap().exists());
        assert!(lib.res_dir.as_ref().unwrap().join("values/colors.xml").exists());
        assert!(lib.assets_dir.is_none());

        let natives = lib.native_libraries().unwrap();
        assert_eq!(natives.len(), 1);
        assert_eq!(natives[0].0, "arm64-v8a");
    }

    #[test]
    fn unpack_unreadable_archive_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());
        let bogus = dir.join("broken.aar");
        fs::write(&bogus, b"not a zip").unwrap();

        let err = ArchiveLibrary::unpack(&bogus, &dir.join("exploded")).unwrap_err();
        assert!(matches!(err, TaskError::Archive(..)));
    }

    #[test]
    fn merge_with_zero_libraries_copies_project_tree_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());

        let project_res = dir.join("res");
        fs::create_dir_all(project_res.join("values")).unwrap();
        fs::write(project_res.join("values/strings.xml"), b"<resources>x</resources>").unwrap();

        let set = ArchiveLibrarySet::new();
        let target = dir.join("merged");
        set.merge_resources(&target, &project_res).unwrap();

        assert_eq!(
            fs::read(target.join("values/strings.xml")).unwrap(),
            fs::read(project_res.join("values/strings.xml")).unwrap(),
        );
    }

    #[test]
    fn project_resources_win_over_library_resources() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8(tmp.path());
        let archive = write_archive(&dir, "maps.aar");

        let mut set = ArchiveLibrarySet::new();
        set.add(ArchiveLibrary::unpack(&archive, &dir.join("exploded")).unwrap());

        let project_res = dir.join("res");
        fs::create_dir_all(project_res.join("values")).unwrap();
        fs::write(project_res.join("values/colors.xml"), b"<resources>own</resources>").unwrap();

        let target = dir.join("merged");
        set.merge_resources(&target, &project_res).unwrap();

        assert_eq!(
            fs::read_to_string(target.join("values/colors.xml")).unwrap(),
            "<resources>own</resources>",
        );
    }
}
