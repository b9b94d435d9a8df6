mod auth;
mod client;
mod error;
mod shared_key;
mod types;

pub use auth::{AzureAuth, AzureCredentials};
pub use client::{AzureClient, Endpoints};
pub use error::AzureError;

use async_trait::async_trait;

use super::{CloudClient, Created, PrincipalInfo};
use crate::resource::ManagedResource;
use crate::secret::Secret;

#[async_trait]
impl CloudClient for AzureClient {
    fn tenant_id(&self) -> &str {
        AzureClient::tenant_id(self)
    }

    fn subscription_id(&self) -> &str {
        AzureClient::subscription_id(self)
    }

    async fn exists(&self, resource: &ManagedResource) -> Result<bool, AzureError> {
        match resource {
            ManagedResource::ResourceGroup { name, .. } => self.resource_group_exists(name).await,
            ManagedResource::ServicePrincipal { name, .. } => {
                Ok(AzureClient::find_service_principal(self, name)
                    .await?
                    .is_some())
            }
            ManagedResource::StorageAccount {
                name,
                resource_group,
                ..
            } => self.storage_account_exists(resource_group, name).await,
            ManagedResource::BlobContainer {
                name,
                storage_account,
                resource_group,
            } => {
                // No account, no container.
                let Some(key) = self.storage_account_key(resource_group, storage_account).await?
                else {
                    return Ok(false);
                };
                self.container_exists(storage_account, &key, name).await
            }
        }
    }

    async fn find_service_principal(
        &self,
        display_name: &str,
    ) -> Result<Option<PrincipalInfo>, AzureError> {
        AzureClient::find_service_principal(self, display_name).await
    }

    async fn create(&self, resource: &ManagedResource) -> Result<Created, AzureError> {
        match resource {
            ManagedResource::ResourceGroup { name, location } => {
                self.create_resource_group(name, location).await?;
            }
            ManagedResource::ServicePrincipal {
                name,
                scope_resource_group,
            } => {
                let credentials = self
                    .create_service_principal(name, scope_resource_group)
                    .await?;
                return Ok(Created::Principal(credentials));
            }
            ManagedResource::StorageAccount {
                name,
                resource_group,
                location,
            } => {
                self.create_storage_account(resource_group, name, location)
                    .await?;
            }
            ManagedResource::BlobContainer {
                name,
                storage_account,
                resource_group,
            } => {
                let key = self
                    .require_account_key(resource_group, storage_account)
                    .await?;
                self.create_container(storage_account, &key, name).await?;
            }
        }

        Ok(Created::Resource)
    }

    async fn delete(&self, resource: &ManagedResource) -> Result<(), AzureError> {
        match resource {
            ManagedResource::ResourceGroup { name, .. } => self.delete_resource_group(name).await,
            ManagedResource::ServicePrincipal { name, .. } => {
                self.delete_service_principal(name).await
            }
            ManagedResource::StorageAccount {
                name,
                resource_group,
                ..
            } => self.delete_storage_account(resource_group, name).await,
            ManagedResource::BlobContainer {
                name,
                storage_account,
                resource_group,
            } => {
                let key = self
                    .require_account_key(resource_group, storage_account)
                    .await?;
                self.delete_container(storage_account, &key, name).await
            }
        }
    }

    async fn reset_secret(&self, principal: &PrincipalInfo) -> Result<Secret, AzureError> {
        AzureClient::reset_secret(self, principal).await
    }
}

impl AzureClient {
    async fn require_account_key(
        &self,
        resource_group: &str,
        storage_account: &str,
    ) -> Result<Secret, AzureError> {
        self.storage_account_key(resource_group, storage_account)
            .await?
            .ok_or_else(|| AzureError::Api {
                status: 404,
                message: format!("storage account '{}' not found", storage_account),
            })
    }
}
