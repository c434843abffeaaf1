/// Progress observer injected into the import pipeline.
///
/// The orchestrator emits coarse stage events plus periodic progress during
/// sequential footprint construction. Implementations decide where the
/// messages go; the pipeline itself holds no verbosity state.
pub trait Reporter: Sync {
    fn event(&self, message: &str);
    fn progress(&self, completed: usize, total: usize);
}

/// Forwards events to the `log` crate at info level.
pub struct LogReporter;

impl Reporter for LogReporter {
    fn event(&self, message: &str) {
        log::info!("{}", message);
    }

    fn progress(&self, completed: usize, total: usize) {
        log::info!("processed {} / {} sessions", completed, total);
    }
}

/// Discards all events.
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn event(&self, _message: &str) {}

    fn progress(&self, _completed: usize, _total: usize) {}
}
