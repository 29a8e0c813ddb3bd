/// Sink for user-facing build progress. The server front-end forwards this to
/// whatever surface started the build; the pipeline itself only ever calls
/// through this trait.
pub trait Reporter: Send + Sync {
    fn progress(&self, percent: u8, message: &str);

    fn info(&self, message: &str) {
        let _ = message;
    }

    fn warn(&self, message: &str) {
        let _ = message;
    }
}

/// Default reporter that forwards everything to `tracing`.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn progress(&self, percent: u8, message: &str) {
        tracing::info!(percent, "{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }
}
