use indicatif::{ProgressBar, ProgressStyle};
use keepsafe_core::{ProgressEvent, ProgressObserver};

/// Renders core progress events on the terminal.
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn spinner(quiet: bool) -> Self {
        let bar = if quiet { ProgressBar::hidden() } else { ProgressBar::new_spinner() };
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            bar.set_style(style);
        }
        Self { bar }
    }

    pub fn bar(quiet: bool, total: u64) -> Self {
        let bar = if quiet { ProgressBar::hidden() } else { ProgressBar::new(total) };
        if let Ok(style) = ProgressStyle::default_bar().template("{bar:40.cyan/blue} {pos:>7}/{len:7} {msg}") {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }
}

impl ProgressObserver for TerminalProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match event.total {
            Some(total) => {
                self.bar.set_length(total);
                self.bar.set_position(event.processed);
                self.bar.set_message(event.label.clone());
            }
            None => {
                let label: String = event.label.chars().take(40).collect();
                self.bar.set_message(format!("Files found: {} | {}", event.processed, label));
                self.bar.tick();
            }
        }
    }
}
