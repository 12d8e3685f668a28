//! Progress reporting
//!
//! Bars are drawn on one process-wide [`MultiProgress`] so that log output
//! can suspend them while it writes (see [`crate::logging`]).

use std::sync::LazyLock;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::executor::ExecutionMode;

static DRAW_TARGET: LazyLock<MultiProgress> = LazyLock::new(MultiProgress::new);

/// Run `f` with every bar hidden, then redraw
pub fn suspend<F: FnOnce() -> R, R>(f: F) -> R {
    DRAW_TARGET.suspend(f)
}

/// Advance-by-one sink for one run. A disabled reporter ignores every call.
///
/// The bar leaves the shared draw target once it is finished or abandoned.
#[derive(Debug, Clone)]
pub struct Progress {
    bar: Option<ProgressBar>,
    target: MultiProgress,
}

impl Progress {
    pub fn new(total: usize, mode: ExecutionMode, workers: usize, enabled: bool) -> Self {
        Self::on(&DRAW_TARGET, total, mode, workers, enabled)
    }

    fn on(target: &MultiProgress, total: usize, mode: ExecutionMode, workers: usize, enabled: bool) -> Self {
        if !enabled {
            return Self::disabled();
        }

        let (message, color) = match mode {
            ExecutionMode::Threads => (format!("Running code in threads [{} threads]", workers), "blue"),
            ExecutionMode::Processes => (format!("Running code in parallel [{} cores]", workers), "red"),
        };

        let bar = target.add(ProgressBar::new(total as u64));
        bar.set_style(bar_style(color));
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(200));
        Self {
            bar: Some(bar),
            target: target.clone(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            bar: None,
            target: DRAW_TARGET.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bar.is_some()
    }

    pub fn advance(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.as_ref().map_or(0, ProgressBar::position)
    }

    /// All tasks accounted for
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish();
            self.target.remove(bar);
        }
    }

    /// Stopped early
    pub fn abandon(&self) {
        if let Some(bar) = &self.bar {
            bar.abandon_with_message("Cancelled");
            self.target.remove(bar);
        }
    }

    #[cfg(test)]
    fn is_drawn(&self) -> bool {
        self.bar.as_ref().is_some_and(|bar| !bar.is_hidden())
    }
}

fn bar_style(color: &str) -> ProgressStyle {
    let template = format!(
        "{{msg}} {{bar:40.{}}} {{pos}}/{{len}} [{{elapsed_precise}}<{{eta_precise}}]",
        color
    );
    ProgressStyle::with_template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
}
