//! UI module for job log output
//!
//! Under GitHub Actions, sections become collapsible `::group::` blocks and
//! failures become `::error::` annotations. Elsewhere the same calls print
//! plain or `console`-styled headers.
//!
//! # Example
//!
//! ```rust,ignore
//! use dockhand::ui::{self, UiContext};
//!
//! let ctx = UiContext::detect();
//! {
//!     let _group = ui::group(&ctx, "Restoring cache");
//!     // ... work logged inside the group ...
//! }
//! ui::error(&ctx, "buildx call failed");
//! ```

mod context;
mod output;

pub use context::UiContext;
pub use output::{error, escape_data, group, key_value, warning, LogGroup};
