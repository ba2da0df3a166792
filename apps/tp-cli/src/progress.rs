// progress.rs — Human-readable progress lines on stdout.
//
// Every line is prefixed with the ticket so output from concurrent
// pipelines stays attributable.

use std::io::Write;

use tp_pipeline::{NotificationSink, PipelineEvent};

pub struct ProgressSink {
    lock: std::sync::Mutex<()>,
}

impl ProgressSink {
    pub fn new() -> Self {
        Self {
            lock: std::sync::Mutex::new(()),
        }
    }
}

impl Default for ProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

/// `[IOS-1] Provisioning workspace...`
pub fn progress_line(event: &PipelineEvent) -> String {
    format!("[{}] {}", event.ticket(), event.describe())
}

impl NotificationSink for ProgressSink {
    fn send(&self, event: &PipelineEvent) -> std::io::Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| std::io::Error::other("progress lock poisoned"))?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", progress_line(event))
    }
}
