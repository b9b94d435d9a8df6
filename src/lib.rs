//! tfstate-bootstrap - Terraform remote state bootstrapper for Azure
//!
//! Creates (or removes) the resource group, service principal, storage account
//! and blob container a Terraform project keeps its state in, and writes the
//! variables file Terraform reads its credentials from.

pub mod cli;
pub mod cloud;
pub mod config;
pub mod error;
pub mod mode;
pub mod output;
pub mod reconcile;
pub mod resource;
pub mod secret;

pub use cloud::{
    AzureClient, AzureError, CloudClient, Created, PrincipalCredentials, PrincipalInfo, Simulated,
};
pub use config::ProjectConfig;
pub use error::BootstrapError;
pub use mode::{Direction, Execution, Invocation, RunMode};
pub use output::{ClientSecret, ProvisioningResult, VariablesArtifact};
pub use reconcile::{Outcome, Reconciler, Step, Subject};
pub use resource::{ManagedResource, ResourceKind};
pub use secret::Secret;
