//! Terminal spinner shown while files are processed

use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Keeps a spinner ticking on its own thread for as long as the guard is
/// alive. Dropping the guard stops the ticker thread, joins it, and clears
/// the line, on every exit path.
pub struct SpinnerGuard {
    bar: Option<ProgressBar>,
}

impl SpinnerGuard {
    /// Start a spinner labelled `message` on stderr. Nothing is drawn when
    /// `enabled` is false or stderr is not a terminal.
    pub fn start(message: &str, enabled: bool) -> Self {
        if !enabled || !io::stderr().is_terminal() {
            return Self::hidden();
        }
        Self::with_bar(ProgressBar::new_spinner(), message)
    }

    /// A guard that shows nothing.
    pub fn hidden() -> Self {
        Self { bar: None }
    }

    fn with_bar(bar: ProgressBar, message: &str) -> Self {
        if let Ok(style) = ProgressStyle::with_template("{msg}... {spinner}") {
            bar.set_style(style.tick_chars("|/-\\ "));
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(TICK_INTERVAL);
        Self { bar: Some(bar) }
    }

    pub fn is_active(&self) -> bool {
        self.bar.is_some()
    }
}

impl Drop for SpinnerGuard {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.take() {
            // Stops and joins the ticker thread before the line is cleared.
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_spinner_is_hidden() {
        let guard = SpinnerGuard::start("Encrypting", false);
        assert!(!guard.is_active());
    }

    #[test]
    fn test_drop_finishes_bar() {
        let bar = ProgressBar::hidden();
        let observer = bar.clone();
        {
            let guard = SpinnerGuard::with_bar(bar, "Decrypting");
            assert!(guard.is_active());
            assert_eq!(observer.message(), "Decrypting");
        }
        assert!(observer.is_finished());
    }

    #[test]
    fn test_drop_on_panic_path() {
        let bar = ProgressBar::hidden();
        let observer = bar.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = SpinnerGuard::with_bar(bar, "Encrypting");
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(observer.is_finished());
    }
}
