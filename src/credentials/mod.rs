//! Registry credential providers

pub mod aws;
pub mod resolver;

pub use aws::{AwsCli, EcrPolicies, EcrService};
pub use resolver::{CredentialResolver, RegistryCredentials, ECR_USERNAME};
