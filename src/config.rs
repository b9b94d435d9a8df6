use std::path::Path;

use serde::Deserialize;

use crate::error::BootstrapError;

pub const CONTAINER_NAME: &str = "tfstate";
const STORAGE_ACCOUNT_PREFIX: &str = "terraformstate";
const RESOURCE_GROUP_MAX_LEN: usize = 90;

/// The three settings a project supplies. Every resource name is derived from
/// these, so two runs against the same config always address the same
/// resources.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectConfig {
    subfix: String,
    #[serde(rename = "projectname")]
    project_name: String,
    region: String,
}

impl ProjectConfig {
    /// Builds a config and checks that every derived name is valid.
    pub fn new(
        subfix: impl Into<String>,
        project_name: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, BootstrapError> {
        let config = Self {
            subfix: subfix.into(),
            project_name: project_name.into(),
            region: region.into(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, BootstrapError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BootstrapError::Config(format!(
                "cannot read project config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
            .map_err(|e| BootstrapError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        config.validate().map_err(|e| match e {
            BootstrapError::Config(message) => message,
            other => other.to_string(),
        })?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BootstrapError> {
        for (field, value) in [
            ("subfix", &self.subfix),
            ("projectname", &self.project_name),
            ("region", &self.region),
        ] {
            if value.trim().is_empty() {
                return Err(BootstrapError::Config(format!(
                    "field `{}` must not be empty",
                    field
                )));
            }
        }

        if !is_lower_alphanumeric(&self.subfix) {
            return Err(BootstrapError::Config(format!(
                "subfix '{}' must contain only lowercase letters and digits",
                self.subfix
            )));
        }

        let account = self.storage_account_name();
        if !(3..=24).contains(&account.len()) {
            return Err(BootstrapError::Config(format!(
                "storage account name '{}' must be 3-24 characters long",
                account
            )));
        }

        let group = self.resource_group();
        if group.len() > RESOURCE_GROUP_MAX_LEN
            || !group
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_.()".contains(c))
        {
            return Err(BootstrapError::Config(format!(
                "resource group name '{}' is not a valid Azure resource group name",
                group
            )));
        }

        // Azure location names, e.g. `westeurope`, `eastus2`.
        if !is_lower_alphanumeric(&self.region) {
            return Err(BootstrapError::Config(format!(
                "region '{}' must be an Azure location name (lowercase letters and digits)",
                self.region
            )));
        }

        Ok(())
    }

    pub fn subfix(&self) -> &str {
        &self.subfix
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn resource_group(&self) -> String {
        format!("{}-rg", self.project_name)
    }

    pub fn service_principal_name(&self) -> String {
        format!("{}-sp", self.project_name)
    }

    pub fn storage_account_name(&self) -> String {
        format!("{}{}", STORAGE_ACCOUNT_PREFIX, self.subfix)
    }

    pub fn container_name(&self) -> &'static str {
        CONTAINER_NAME
    }
}

fn is_lower_alphanumeric(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}
