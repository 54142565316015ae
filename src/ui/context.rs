//! UI context for detecting the GitHub Actions host vs a plain terminal

use std::io::IsTerminal;

/// UI context that determines output behavior
#[derive(Debug, Clone)]
pub struct UiContext {
    /// Whether GitHub Actions workflow commands are understood
    actions: bool,
    /// Whether stdout is a terminal
    interactive: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        Self {
            actions: Self::detect_actions(),
            interactive: std::io::stdout().is_terminal(),
        }
    }

    /// Plain output with no workflow commands (for testing or local runs)
    pub fn plain() -> Self {
        Self {
            actions: false,
            interactive: false,
        }
    }

    /// Check if running under GitHub Actions
    pub fn is_actions(&self) -> bool {
        self.actions
    }

    /// Check if we should use styled output
    pub fn use_fancy_output(&self) -> bool {
        self.interactive && !self.actions
    }

    fn detect_actions() -> bool {
        std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true")
    }
}
