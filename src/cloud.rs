pub mod azure;

use async_trait::async_trait;

use crate::resource::ManagedResource;
use crate::secret::Secret;

pub use azure::{AzureAuth, AzureClient, AzureCredentials, AzureError, Endpoints};

const SIMULATED_CLIENT_ID: &str = "00000000-0000-0000-0000-000000000000";
const SIMULATED_SECRET: &str = "<simulated>";

/// A service principal found in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalInfo {
    pub object_id: String,
    pub client_id: String,
    pub display_name: String,
}

/// Identity and secret of a freshly created service principal.
#[derive(Debug, Clone)]
pub struct PrincipalCredentials {
    pub client_id: String,
    pub client_secret: Secret,
}

#[derive(Debug, Clone)]
pub enum Created {
    Resource,
    Principal(PrincipalCredentials),
}

/// Typed operations against the cloud control plane.
///
/// `exists` and `find_service_principal` are read-only probes. A resource that
/// does not exist is `Ok(false)`/`Ok(None)`; `Err` always means the run must
/// stop (authentication, authorization, network).
#[async_trait]
pub trait CloudClient: Send + Sync {
    fn tenant_id(&self) -> &str;

    fn subscription_id(&self) -> &str;

    async fn exists(&self, resource: &ManagedResource) -> Result<bool, AzureError>;

    async fn find_service_principal(
        &self,
        display_name: &str,
    ) -> Result<Option<PrincipalInfo>, AzureError>;

    async fn create(&self, resource: &ManagedResource) -> Result<Created, AzureError>;

    async fn delete(&self, resource: &ManagedResource) -> Result<(), AzureError>;

    /// Issues a new client secret for an existing principal. Secrets issued
    /// earlier stay valid until they expire.
    async fn reset_secret(&self, principal: &PrincipalInfo) -> Result<Secret, AzureError>;
}

/// Dry-run decorator: probes reach the wrapped client, every mutation is
/// logged and skipped.
pub struct Simulated<C> {
    inner: C,
}

impl<C: CloudClient> Simulated<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    #[cfg(test)]
    fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C: CloudClient> CloudClient for Simulated<C> {
    fn tenant_id(&self) -> &str {
        self.inner.tenant_id()
    }

    fn subscription_id(&self) -> &str {
        self.inner.subscription_id()
    }

    async fn exists(&self, resource: &ManagedResource) -> Result<bool, AzureError> {
        self.inner.exists(resource).await
    }

    async fn find_service_principal(
        &self,
        display_name: &str,
    ) -> Result<Option<PrincipalInfo>, AzureError> {
        self.inner.find_service_principal(display_name).await
    }

    async fn create(&self, resource: &ManagedResource) -> Result<Created, AzureError> {
        tracing::info!("[dry-run] would {}", describe_create(resource));
        match resource {
            ManagedResource::ServicePrincipal { .. } => {
                Ok(Created::Principal(PrincipalCredentials {
                    client_id: SIMULATED_CLIENT_ID.to_string(),
                    client_secret: Secret::new(SIMULATED_SECRET),
                }))
            }
            _ => Ok(Created::Resource),
        }
    }

    async fn delete(&self, resource: &ManagedResource) -> Result<(), AzureError> {
        tracing::info!("[dry-run] would {}", describe_delete(resource));
        Ok(())
    }

    async fn reset_secret(&self, principal: &PrincipalInfo) -> Result<Secret, AzureError> {
        tracing::info!(
            client_id = %principal.client_id,
            "[dry-run] would issue a new client secret for service principal '{}'",
            principal.display_name
        );
        Ok(Secret::new(SIMULATED_SECRET))
    }
}

pub fn describe_create(resource: &ManagedResource) -> String {
    match resource {
        ManagedResource::ResourceGroup { name, location } => {
            format!("create resource group '{}' in '{}'", name, location)
        }
        ManagedResource::ServicePrincipal {
            name,
            scope_resource_group,
        } => format!(
            "create service principal '{}' with Contributor role on resource group '{}'",
            name, scope_resource_group
        ),
        ManagedResource::StorageAccount {
            name,
            resource_group,
            location,
        } => format!(
            "create storage account '{}' (Standard_LRS, blob encryption) in resource group '{}' ({})",
            name, resource_group, location
        ),
        ManagedResource::BlobContainer {
            name,
            storage_account,
            ..
        } => format!(
            "create blob container '{}' in storage account '{}'",
            name, storage_account
        ),
    }
}

pub fn describe_delete(resource: &ManagedResource) -> String {
    match resource {
        ManagedResource::ResourceGroup { name, .. } => {
            format!("request deletion of resource group '{}'", name)
        }
        ManagedResource::ServicePrincipal { name, .. } => {
            format!("delete service principal '{}' and its application", name)
        }
        ManagedResource::StorageAccount {
            name,
            resource_group,
            ..
        } => format!(
            "delete storage account '{}' from resource group '{}'",
            name, resource_group
        ),
        ManagedResource::BlobContainer {
            name,
            storage_account,
            ..
        } => format!(
            "delete blob container '{}' from storage account '{}'",
            name, storage_account
        ),
    }
}
