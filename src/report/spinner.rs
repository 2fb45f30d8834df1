//! Progress spinner shown while a blocking collaborator call runs.
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::Indent;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix}[{spinner}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

/// Scoped spinner. The animation is cleared from the terminal when the guard
/// is dropped or [`Spinner::stop`] is called, so the next report line never
/// interleaves with it.
#[derive(Debug)]
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    /// Start an animated spinner on stdout.
    #[must_use]
    pub fn start(indent: Indent, message: &str) -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout());
        bar.set_style(spinner_style());
        bar.set_prefix(indent.to_string());
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// A spinner that draws nothing, for non-terminal or machine output.
    #[must_use]
    pub const fn hidden() -> Self {
        Self { bar: None }
    }

    /// `true` when an animation is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.bar.is_some()
    }

    /// Stop and clear the animation early, e.g. before prompting.
    pub fn stop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_spinner_is_inactive() {
        let spinner = Spinner::hidden();
        assert!(!spinner.is_active());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut spinner = Spinner::hidden();
        spinner.stop();
        spinner.stop();
        assert!(!spinner.is_active());
    }

    #[test]
    fn started_spinner_stops_on_request() {
        let mut spinner = Spinner::start(Indent::Small, "Working...");
        assert!(spinner.is_active());
        spinner.stop();
        assert!(!spinner.is_active());
    }
}
