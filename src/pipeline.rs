//! Pipeline assembly and execution.
//!
//! The registry below is the single source of phase ordering: icon
//! preparation, manifest, library attachment, asset and resource processing,
//! source compilation, bytecode conversion, packaging, signing, bundling.
//! Format-specific substitutions are resolved here once, at assembly time,
//! instead of branching inside tasks. The APK format carries its own signing
//! task; the bundle format is signed downstream as part of rebundling, so no
//! standalone signing task exists for it.

use std::time::Instant;

use crate::context::{BuildContext, OutputFormat};
use crate::error::TaskResult;
use crate::task::{Applies, Task};
use crate::tasks;

/// Ordered task registry. Assembly filters this by applicability tag.
fn registry() -> Vec<Task> {
    vec![
        Task {
            name: "prepare-workspace",
            applies: Applies::Both,
            run: tasks::prepare_workspace,
        },
        Task {
            name: "prepare-icons",
            applies: Applies::Both,
            run: tasks::icon::prepare_icons,
        },
        Task {
            name: "create-manifest",
            applies: Applies::Both,
            run: tasks::manifest::create_manifest,
        },
        Task {
            name: "attach-libraries",
            applies: Applies::Both,
            run: tasks::libraries::attach_libraries,
        },
        Task {
            name: "attach-assets",
            applies: Applies::Both,
            run: tasks::assets::attach_assets,
        },
        Task {
            name: "merge-resources",
            applies: Applies::Both,
            run: tasks::resources::merge_resources,
        },
        Task {
            name: "link-resources",
            applies: Applies::Apk,
            run: tasks::resources::link_resources_apk,
        },
        Task {
            name: "link-resources-proto",
            applies: Applies::Aab,
            run: tasks::resources::link_resources_proto,
        },
        Task {
            name: "compile-sources",
            applies: Applies::Both,
            run: tasks::compile::compile_sources,
        },
        Task {
            name: "convert-bytecode",
            applies: Applies::Both,
            run: tasks::dex::convert_bytecode,
        },
        Task {
            name: "package-container",
            applies: Applies::Apk,
            run: tasks::package::package_apk,
        },
        Task {
            name: "package-modules",
            applies: Applies::Aab,
            run: tasks::package::package_base_module,
        },
        Task {
            name: "sign-package",
            applies: Applies::Apk,
            run: tasks::sign::sign_package,
        },
        Task {
            name: "bundle-modules",
            applies: Applies::Aab,
            run: tasks::bundle::bundle_modules,
        },
    ]
}

/// Assemble the ordered task list for one output format. Pure list
/// construction; no I/O happens here.
pub fn assemble(format: OutputFormat) -> Vec<Task> {
    registry()
        .into_iter()
        .filter(|task| task.applies.matches(format))
        .collect()
}

/// The pipeline executor: runs tasks strictly in order against one context
/// and stops at the first failure.
pub struct Compiler;

impl Compiler {
    /// Execute `tasks` in order. The first error aborts the build and is
    /// returned verbatim; intermediate artifacts are left on disk for
    /// inspection. No parallelism: phase order encodes real filesystem
    /// dependencies between tasks.
    pub fn run(context: &mut BuildContext, tasks: &[Task]) -> TaskResult {
        let total = tasks.len().max(1);
        let start = Instant::now();

        for (index, task) in tasks.iter().enumerate() {
            let span = tracing::info_span!("task", name = task.name);
            let _enter = span.enter();

            let percent = (index * 100 / total) as u8;
            context.reporter.progress(percent, task.name);

            let s = Instant::now();
            (task.run)(context)?;
            tracing::debug!(elapsed = ?s.elapsed(), "task finished");
        }

        context.reporter.progress(100, "build finished");
        tracing::info!(elapsed = ?start.elapsed(), "pipeline finished");
        Ok(())
    }
}

/// Assemble and run the pipeline for the context's configured format.
pub fn build(context: &mut BuildContext) -> TaskResult {
    let tasks = assemble(context.flags.format);
    tracing::info!(
        format = ?context.flags.format,
        tasks = tasks.len(),
        package = %context.project.package,
        "starting build"
    );
    Compiler::run(context, &tasks)
}
