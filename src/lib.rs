//! Dockhand - container image build and publish pipeline for CI jobs
//!
//! Logs into the target registry (fetching ECR credentials through the AWS
//! CLI when needed), restores the buildx layer cache, builds and pushes the
//! image, and cleans up in a second invocation at the end of the job.

pub mod build;
pub mod builder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod docker;
pub mod error;
pub mod git;
pub mod inputs;
pub mod outputs;
pub mod process;
pub mod qemu;
pub mod registry;
pub mod state;
pub mod ui;

pub use error::{DockhandError, DockhandResult};
