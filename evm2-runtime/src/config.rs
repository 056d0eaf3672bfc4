//! Process configuration

use std::path::PathBuf;
use std::time::Duration;

/// VM configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Random-access file served by the `read`/`write` opcodes.
    /// Opened read/write at start, created if absent.
    pub binary_file: Option<PathBuf>,

    /// Scripted console input; `consoleRead` pops from the front and yields
    /// -1 once it is exhausted
    pub input: Option<Vec<i64>>,

    /// Collect `consoleWrite` values instead of printing them
    pub capture_output: bool,

    /// Longest uninterrupted sleep between cancellation checks
    pub sleep_slice: Duration,

    /// Bounded wait per lock acquisition attempt
    pub lock_poll_interval: Duration,

    /// Pause after a thread releases the last lock it holds
    pub unlock_pause: Duration,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            binary_file: None,
            input: None,
            capture_output: false,
            sleep_slice: Duration::from_millis(100),
            lock_poll_interval: Duration::from_millis(10),
            unlock_pause: Duration::from_millis(50),
        }
    }
}

impl VmConfig {
    /// Scripted console: `input` in, output captured
    pub fn captured(input: Vec<i64>) -> Self {
        Self {
            input: Some(input),
            capture_output: true,
            ..Self::default()
        }
    }

    pub fn with_binary_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_file = Some(path.into());
        self
    }
}
