//! Provision and destroy reconciliation.
//!
//! Both directions run strictly sequentially. Each step probes the live
//! account first, so re-running after an interrupted run picks up where the
//! previous one stopped. Any cloud error ends the run immediately.

use std::fmt;

use crate::cloud::{AzureError, CloudClient, Created};
use crate::config::ProjectConfig;
use crate::error::BootstrapError;
use crate::output::{ClientSecret, ProvisioningResult, VariablesArtifact};
use crate::resource::{ManagedResource, ResourceKind, destroy_order, provision_order};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    AlreadyExists,
    Deleted,
    /// Absent during destroy.
    NotFound,
    /// A mutation replaced by its description.
    Simulated(SimulatedAction),
    SecretIssued,
    SecretPreserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedAction {
    Create,
    Delete,
    ResetSecret,
    WriteArtifact,
    RemoveArtifact,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => write!(f, "created"),
            Outcome::AlreadyExists => write!(f, "already exists"),
            Outcome::Deleted => write!(f, "deleted"),
            Outcome::NotFound => write!(f, "not found"),
            Outcome::Simulated(SimulatedAction::Create) => write!(f, "would create"),
            Outcome::Simulated(SimulatedAction::Delete) => write!(f, "would delete"),
            Outcome::Simulated(SimulatedAction::ResetSecret) => write!(f, "would issue secret"),
            Outcome::Simulated(SimulatedAction::WriteArtifact) => write!(f, "would write"),
            Outcome::Simulated(SimulatedAction::RemoveArtifact) => write!(f, "would remove"),
            Outcome::SecretIssued => write!(f, "secret issued"),
            Outcome::SecretPreserved => write!(f, "secret preserved"),
        }
    }
}

/// What a step acted on. The artifact is not a cloud resource but is part of
/// both sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Resource(ResourceKind),
    ClientSecret,
    Artifact,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Resource(kind) => write!(f, "{}", kind),
            Subject::ClientSecret => write!(f, "client secret"),
            Subject::Artifact => write!(f, "variables file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub subject: Subject,
    pub name: String,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub struct ProvisionReport {
    pub steps: Vec<Step>,
    pub result: ProvisioningResult,
    pub artifact_written: bool,
}

#[derive(Debug)]
pub struct DestroyReport {
    pub steps: Vec<Step>,
}

pub struct Reconciler<'a> {
    cloud: &'a dyn CloudClient,
    config: &'a ProjectConfig,
    artifact: &'a VariablesArtifact,
    simulate: bool,
    steps: Vec<Step>,
}

impl<'a> Reconciler<'a> {
    /// `simulate` must match whether `cloud` is wrapped in
    /// [`crate::cloud::Simulated`]; it controls the artifact and the reported
    /// outcomes.
    pub fn new(
        cloud: &'a dyn CloudClient,
        config: &'a ProjectConfig,
        artifact: &'a VariablesArtifact,
        simulate: bool,
    ) -> Self {
        Self {
            cloud,
            config,
            artifact,
            simulate,
            steps: Vec::new(),
        }
    }

    fn record(&mut self, subject: Subject, name: &str, outcome: Outcome) {
        match outcome {
            Outcome::NotFound => {
                tracing::warn!(resource = %subject, name, "not found, nothing to remove")
            }
            Outcome::Simulated(_) => {
                tracing::debug!(resource = %subject, name, outcome = %outcome, "simulated")
            }
            _ => tracing::info!(resource = %subject, name, "{}", outcome),
        }
        self.steps.push(Step {
            subject,
            name: name.to_string(),
            outcome,
        });
    }

    fn created_outcome(&self) -> Outcome {
        if self.simulate {
            Outcome::Simulated(SimulatedAction::Create)
        } else {
            Outcome::Created
        }
    }

    fn deleted_outcome(&self) -> Outcome {
        if self.simulate {
            Outcome::Simulated(SimulatedAction::Delete)
        } else {
            Outcome::Deleted
        }
    }

    /// Creates whatever is missing and writes the variables file.
    pub async fn provision(mut self) -> Result<ProvisionReport, BootstrapError> {
        let config = self.config;

        // Read before any mutation: an existing file means credentials were
        // already handed out.
        let artifact_present = self.artifact.exists();

        let mut principal = None;
        for resource in provision_order(config) {
            if resource.kind() == ResourceKind::ServicePrincipal {
                principal = Some(
                    self.ensure_service_principal(&resource, artifact_present)
                        .await?,
                );
            } else {
                self.ensure(&resource).await?;
            }
        }
        let (client_id, client_secret) =
            principal.ok_or_else(|| AzureError::InvalidResponse {
                message: "service principal was not reconciled".to_string(),
            })?;

        let result = ProvisioningResult {
            client_id,
            client_secret,
            tenant_id: self.cloud.tenant_id().to_string(),
            subscription_id: self.cloud.subscription_id().to_string(),
            resource_group: config.resource_group(),
            region: config.region().to_string(),
            project_name: config.project_name().to_string(),
            subfix: config.subfix().to_string(),
            container_name: config.container_name().to_string(),
        };

        let artifact_name = self.artifact.path().display().to_string();
        let artifact_written = if self.simulate {
            tracing::info!("[dry-run] would write {}", artifact_name);
            self.record(
                Subject::Artifact,
                &artifact_name,
                Outcome::Simulated(SimulatedAction::WriteArtifact),
            );
            false
        } else {
            let written = self.artifact.write(&result)?;
            if written {
                self.record(Subject::Artifact, &artifact_name, Outcome::Created);
            }
            written
        };

        Ok(ProvisionReport {
            steps: self.steps,
            result,
            artifact_written,
        })
    }

    async fn ensure(&mut self, resource: &ManagedResource) -> Result<(), BootstrapError> {
        let subject = Subject::Resource(resource.kind());

        if self.cloud.exists(resource).await? {
            self.record(subject, resource.name(), Outcome::AlreadyExists);
            return Ok(());
        }

        self.cloud.create(resource).await?;
        let outcome = self.created_outcome();
        self.record(subject, resource.name(), outcome);
        Ok(())
    }

    async fn ensure_service_principal(
        &mut self,
        resource: &ManagedResource,
        artifact_present: bool,
    ) -> Result<(String, ClientSecret), BootstrapError> {
        let subject = Subject::Resource(ResourceKind::ServicePrincipal);
        let name = resource.name().to_string();

        if let Some(principal) = self.cloud.find_service_principal(&name).await? {
            self.record(subject, &name, Outcome::AlreadyExists);

            if artifact_present {
                self.record(Subject::ClientSecret, &name, Outcome::SecretPreserved);
                return Ok((principal.client_id, ClientSecret::Preserved));
            }

            // NOTE: Only the first run for an existing principal lands here.
            // The new secret does not revoke earlier ones.
            let secret = self.cloud.reset_secret(&principal).await?;
            let outcome = if self.simulate {
                Outcome::Simulated(SimulatedAction::ResetSecret)
            } else {
                Outcome::SecretIssued
            };
            self.record(Subject::ClientSecret, &name, outcome);
            return Ok((principal.client_id, ClientSecret::Issued(secret)));
        }

        let credentials = match self.cloud.create(resource).await? {
            Created::Principal(credentials) => credentials,
            Created::Resource => {
                return Err(AzureError::InvalidResponse {
                    message: format!(
                        "creating service principal '{}' returned no credentials",
                        name
                    ),
                }
                .into());
            }
        };
        let outcome = self.created_outcome();
        self.record(subject, &name, outcome);

        Ok((
            credentials.client_id,
            ClientSecret::Issued(credentials.client_secret),
        ))
    }

    /// Removes every managed resource, dependents first, then the variables
    /// file. Absent resources are reported, not treated as errors.
    pub async fn destroy(mut self) -> Result<DestroyReport, BootstrapError> {
        for resource in destroy_order(self.config) {
            let subject = Subject::Resource(resource.kind());

            if !self.cloud.exists(&resource).await? {
                self.record(subject, resource.name(), Outcome::NotFound);
                continue;
            }

            self.cloud.delete(&resource).await?;
            let outcome = self.deleted_outcome();
            self.record(subject, resource.name(), outcome);
        }

        let artifact_name = self.artifact.path().display().to_string();
        if self.simulate {
            if self.artifact.exists() {
                tracing::info!("[dry-run] would remove {}", artifact_name);
                self.record(
                    Subject::Artifact,
                    &artifact_name,
                    Outcome::Simulated(SimulatedAction::RemoveArtifact),
                );
            } else {
                self.record(Subject::Artifact, &artifact_name, Outcome::NotFound);
            }
        } else if self.artifact.remove()? {
            self.record(Subject::Artifact, &artifact_name, Outcome::Deleted);
        } else {
            self.record(Subject::Artifact, &artifact_name, Outcome::NotFound);
        }

        Ok(DestroyReport { steps: self.steps })
    }
}
