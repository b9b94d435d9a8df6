use std::fmt;

use crate::config::ProjectConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ResourceGroup,
    ServicePrincipal,
    StorageAccount,
    BlobContainer,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ResourceGroup => write!(f, "resource group"),
            ResourceKind::ServicePrincipal => write!(f, "service principal"),
            ResourceKind::StorageAccount => write!(f, "storage account"),
            ResourceKind::BlobContainer => write!(f, "blob container"),
        }
    }
}

/// One resource the bootstrap manages, carrying everything the cloud client
/// needs to address it.
///
/// Dependency chain: ResourceGroup -> StorageAccount -> BlobContainer, and
/// ResourceGroup (role scope) -> ServicePrincipal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedResource {
    ResourceGroup {
        name: String,
        location: String,
    },
    ServicePrincipal {
        name: String,
        /// Resource group the principal's role assignment is scoped to.
        scope_resource_group: String,
    },
    StorageAccount {
        name: String,
        resource_group: String,
        location: String,
    },
    BlobContainer {
        name: String,
        storage_account: String,
        resource_group: String,
    },
}

impl ManagedResource {
    pub fn resource_group(config: &ProjectConfig) -> Self {
        ManagedResource::ResourceGroup {
            name: config.resource_group(),
            location: config.region().to_string(),
        }
    }

    pub fn service_principal(config: &ProjectConfig) -> Self {
        ManagedResource::ServicePrincipal {
            name: config.service_principal_name(),
            scope_resource_group: config.resource_group(),
        }
    }

    pub fn storage_account(config: &ProjectConfig) -> Self {
        ManagedResource::StorageAccount {
            name: config.storage_account_name(),
            resource_group: config.resource_group(),
            location: config.region().to_string(),
        }
    }

    pub fn blob_container(config: &ProjectConfig) -> Self {
        ManagedResource::BlobContainer {
            name: config.container_name().to_string(),
            storage_account: config.storage_account_name(),
            resource_group: config.resource_group(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ManagedResource::ResourceGroup { .. } => ResourceKind::ResourceGroup,
            ManagedResource::ServicePrincipal { .. } => ResourceKind::ServicePrincipal,
            ManagedResource::StorageAccount { .. } => ResourceKind::StorageAccount,
            ManagedResource::BlobContainer { .. } => ResourceKind::BlobContainer,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ManagedResource::ResourceGroup { name, .. }
            | ManagedResource::ServicePrincipal { name, .. }
            | ManagedResource::StorageAccount { name, .. }
            | ManagedResource::BlobContainer { name, .. } => name,
        }
    }
}

impl fmt::Display for ManagedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.name())
    }
}

/// Resources in the order provision visits them.
pub fn provision_order(config: &ProjectConfig) -> [ManagedResource; 4] {
    [
        ManagedResource::resource_group(config),
        ManagedResource::service_principal(config),
        ManagedResource::storage_account(config),
        ManagedResource::blob_container(config),
    ]
}

/// Resources in the order destroy visits them: dependents first.
pub fn destroy_order(config: &ProjectConfig) -> [ManagedResource; 4] {
    [
        ManagedResource::blob_container(config),
        ManagedResource::storage_account(config),
        ManagedResource::service_principal(config),
        ManagedResource::resource_group(config),
    ]
}
