use thiserror::Error;

/// Outcome of a single pipeline task. The executor aborts the build on the
/// first `Err` and returns it verbatim.
pub type TaskResult = Result<(), TaskError>;

/// Every failure a task can report, one variant per failure kind.
///
/// `Configuration` and `ToolUnavailable` indicate problems with the build
/// request or the host rather than with the project being built, while
/// `NoUserCode` is kept distinct from `Tool` so callers can show a more
/// specific message than "the compiler failed".
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Required tool '{0}' could not be located on this host")]
    ToolUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Couldn't read archive '{0}'.\n{1}")]
    Archive(String, #[source] zip::result::ZipError),

    #[error("External tool '{name}' failed.\n{detail}")]
    Tool { name: String, detail: String },

    #[error("The generated sources contain no user code")]
    NoUserCode,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    pub(crate) fn tool(name: impl Into<String>, detail: impl Into<String>) -> Self {
        TaskError::Tool {
            name: name.into(),
            detail: detail.into(),
        }
    }
}
