//! Progress reporting for streamed exports

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives progress events while an export stream is consumed
pub trait ProgressReporter {
    /// Called once before the first data line, with the server's expected
    /// row count if it sent one
    fn start(&self, expected: Option<u64>);

    /// Called once per data line
    fn advance(&self, rows: u64);

    /// Called after the final batch has been parsed
    fn finish(&self);
}

/// Reporter that discards all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn start(&self, _expected: Option<u64>) {}

    fn advance(&self, _rows: u64) {}

    fn finish(&self) {}
}

/// Terminal progress bar, or a spinner when the total is unknown
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for TerminalProgress {
    fn start(&self, expected: Option<u64>) {
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        match expected {
            Some(total) => {
                self.bar.set_length(total);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{bar:40.cyan/blue} {pos}/{len} rows [{elapsed_precise}<{eta}]")
                {
                    self.bar.set_style(style.progress_chars("=> "));
                }
            }
            None => {
                if let Ok(style) = ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {pos} rows [{elapsed}]")
                {
                    self.bar.set_style(style);
                }
                self.bar.enable_steady_tick(Duration::from_millis(100));
            }
        }
    }

    fn advance(&self, rows: u64) {
        self.bar.inc(rows);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};

    use super::ProgressReporter;

    /// Records every event for assertions
    #[derive(Debug, Default)]
    pub struct RecordingProgress {
        pub started: RefCell<Vec<Option<u64>>>,
        pub advanced: Cell<u64>,
        pub finished: Cell<usize>,
    }

    impl ProgressReporter for RecordingProgress {
        fn start(&self, expected: Option<u64>) {
            self.started.borrow_mut().push(expected);
        }

        fn advance(&self, rows: u64) {
            self.advanced.set(self.advanced.get() + rows);
        }

        fn finish(&self) {
            self.finished.set(self.finished.get() + 1);
        }
    }
}
