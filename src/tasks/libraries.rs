//! Library attachment: claims archive-suffixed dependencies from the
//! requirement set and explodes each one exactly once.

use std::collections::HashSet;

use crate::context::BuildContext;
use crate::error::{TaskError, TaskResult};
use crate::library::ArchiveLibrary;

/// Dependencies with this suffix bundle resources and native code and need
/// exploding; plain `.jar` libraries stay in the requirement set for the
/// classpath and dex phases.
pub(crate) const ARCHIVE_SUFFIX: &str = ".aar";

pub(crate) fn attach_libraries(ctx: &mut BuildContext) -> TaskResult {
    let claimed = ctx.requirements.claim_archive_libraries(ARCHIVE_SUFFIX);

    // Processed-name set scoped to this build; an archive identity is never
    // unpacked twice however many components requested it.
    let mut processed: HashSet<String> = HashSet::new();

    for name in claimed {
        if !processed.insert(name.clone()) {
            continue;
        }

        let archive = ctx.tools.locate_library(&name).ok_or_else(|| {
            TaskError::Configuration(format!("archive library '{name}' could not be resolved"))
        })?;

        let library = ArchiveLibrary::unpack(&archive, &ctx.paths.exploded_dir)?;
        tracing::debug!(archive = name, root = %library.root, "attached archive library");
        ctx.exploded.add(library);
    }

    Ok(())
}
