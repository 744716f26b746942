//! Progress reporting for long-running mission phases.

/// Progress callback for mission operations.
pub trait MissionProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Per-entity progress within the current phase.
    fn entity(&self, current: usize, total: usize, detail: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl MissionProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn entity(&self, _current: usize, _total: usize, _detail: &str) {}
}
