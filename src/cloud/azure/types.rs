use serde::Deserialize;

pub const RESOURCE_GROUP_API_VERSION: &str = "2021-04-01";
pub const STORAGE_API_VERSION: &str = "2023-01-01";
pub const ROLE_ASSIGNMENT_API_VERSION: &str = "2022-04-01";
pub const BLOB_SERVICE_VERSION: &str = "2021-08-06";

/// Built-in "Contributor" role definition id.
pub const CONTRIBUTOR_ROLE_ID: &str = "b24988ac-6180-42a0-ab88-20f7382dd24c";

pub const STORAGE_SKU: &str = "Standard_LRS";
pub const STORAGE_KIND: &str = "StorageV2";

/// Error envelope shared by ARM and Microsoft Graph.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// OAuth2 token endpoint responses.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccount {
    #[serde(default)]
    pub properties: Option<StorageAccountProperties>,
}

impl StorageAccount {
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccountProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListKeysResponse {
    #[serde(default)]
    pub keys: Vec<StorageAccountKey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccountKey {
    pub value: String,
    #[serde(default)]
    pub permissions: String,
}

impl ListKeysResponse {
    /// First key with full permissions.
    pub fn full_access_key(self) -> Option<String> {
        self.keys
            .into_iter()
            .find(|k| k.permissions.eq_ignore_ascii_case("full"))
            .map(|k| k.value)
    }
}

/// `{"value": [...]}` collection returned by Microsoft Graph.
#[derive(Debug, Deserialize)]
pub struct GraphCollection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphServicePrincipal {
    pub id: String,
    pub app_id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphApplication {
    pub id: String,
    pub app_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphPasswordCredential {
    pub secret_text: String,
}
