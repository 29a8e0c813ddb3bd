//! The unit of pipeline work.

use crate::context::{BuildContext, OutputFormat};
use crate::error::TaskResult;

/// Which output formats a task participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applies {
    Apk,
    Aab,
    Both,
}

impl Applies {
    pub fn matches(self, format: OutputFormat) -> bool {
        match self {
            Applies::Both => true,
            Applies::Apk => format == OutputFormat::Apk,
            Applies::Aab => format == OutputFormat::Aab,
        }
    }
}

/// A pipeline task: stateless beyond its applicability tag, invoked once per
/// build in its fixed position against the shared [`BuildContext`].
pub type TaskFn = fn(&mut BuildContext) -> TaskResult;

#[derive(Clone, Copy)]
pub struct Task {
    pub name: &'static str,
    pub applies: Applies,
    pub run: TaskFn,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applicability_matches_formats() {
        assert!(Applies::Both.matches(OutputFormat::Apk));
        assert!(Applies::Both.matches(OutputFormat::Aab));
        assert!(Applies::Apk.matches(OutputFormat::Apk));
        assert!(!Applies::Apk.matches(OutputFormat::Aab));
        assert!(!Applies::Aab.matches(OutputFormat::Apk));
    }
}
