//! CLI command implementations

pub mod classify;
pub mod run;

pub use classify::execute as classify;
pub use run::execute as run;
