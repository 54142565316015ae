//! Output functions for log groups, annotations and key/value reports

use super::context::UiContext;
use console::style;

/// Escape a message for a workflow command
pub fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// A collapsible section of the job log.
///
/// Under GitHub Actions the section is closed with `::endgroup::` when the
/// guard drops, so early returns still close it.
#[must_use = "the group closes when this guard is dropped"]
pub struct LogGroup {
    actions: bool,
}

/// Open a log group.
///
/// Outside Actions the header goes to stderr, leaving stdout to step
/// outputs.
pub fn group(ctx: &UiContext, title: &str) -> LogGroup {
    if ctx.is_actions() {
        println!("::group::{}", title);
    } else if ctx.use_fancy_output() {
        eprintln!();
        eprintln!("{}", style(title).cyan().bold());
    } else {
        eprintln!();
        eprintln!("{}", title);
    }
    LogGroup {
        actions: ctx.is_actions(),
    }
}

impl Drop for LogGroup {
    fn drop(&mut self) {
        if self.actions {
            println!("::endgroup::");
        }
    }
}

/// Report a failure to the host
pub fn error(ctx: &UiContext, message: &str) {
    if ctx.is_actions() {
        println!("::error::{}", escape_data(message));
    }
}

/// Report a non-fatal problem to the host
pub fn warning(ctx: &UiContext, message: &str) {
    if ctx.is_actions() {
        println!("::warning::{}", escape_data(message));
    }
}

/// Print styled key-value
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("{}: {}", style(key).dim(), value);
    } else {
        println!("{}: {}", key, value);
    }
}
