#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod context;
mod error;
mod hash;
mod library;
mod manifest;
mod pipeline;
mod predex;
mod project;
mod report;
mod requirements;
mod task;
mod tasks;
#[cfg(test)]
mod testutil;
mod tools;

pub use crate::context::{BuildContext, BuildFlags, BuildPaths, OutputFormat};
pub use crate::error::{TaskError, TaskResult};
pub use crate::library::{ArchiveLibrary, ArchiveLibrarySet};
pub use crate::manifest::ManifestSynthesizer;
pub use crate::pipeline::{Compiler, assemble, build};
pub use crate::predex::{DexConverter, PredexCache};
pub use crate::project::{Project, Theme};
pub use crate::report::{LogReporter, Reporter};
pub use crate::requirements::{ComponentRequirements, ConstraintValue, PermissionConstraint};
pub use crate::task::{Applies, Task, TaskFn};
pub use crate::tools::{
    CommandOutput, CommandRunner, CommandSpec, SystemRunner, Tool, ToolLocator,
};

/// Install a `tracing` subscriber reading its filter from `RUST_LOG`.
/// Embedders with their own subscriber skip this and get the events anyway.
#[cfg(feature = "logging")]
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
