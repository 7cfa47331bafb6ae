// src/commands/progress.rs
//! Terminal progress display for pack switches
//!
//! One bar whose prefix names the current switch phase and whose message
//! names the component being worked on.

use indicatif::{ProgressBar, ProgressStyle};
use packshift::{ProgressTracker, SwitchState};
use std::time::Duration;

pub struct SwitchProgress {
    bar: ProgressBar,
}

impl SwitchProgress {
    pub fn new(pack: &str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:>12.cyan.bold} [{bar:30.green/dim}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_prefix(SwitchState::PreCheck.to_string());
        bar.set_message(format!("switching to {}", pack));
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }
}

impl ProgressTracker for SwitchProgress {
    fn phase(&self, state: SwitchState) {
        self.bar.set_prefix(state.to_string());
        self.bar.set_length(0);
        self.bar.set_position(0);
    }

    fn expect(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn advance(&self) {
        self.bar.inc(1);
    }

    fn installing(&self, component: &str) {
        self.bar.set_message(format!("installing {}", component));
    }

    fn finished(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    fn failed(&self, message: &str) {
        self.bar.abandon_with_message(format!("failed: {}", message));
    }
}
