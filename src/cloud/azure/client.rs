use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;

use super::AzureError;
use super::auth::{self, AzureCredentials};
use super::shared_key;
use super::types::{
    BLOB_SERVICE_VERSION, CONTRIBUTOR_ROLE_ID, ErrorEnvelope, GraphApplication, GraphCollection,
    GraphPasswordCredential, GraphServicePrincipal, ListKeysResponse, RESOURCE_GROUP_API_VERSION,
    ROLE_ASSIGNMENT_API_VERSION, STORAGE_API_VERSION, STORAGE_KIND, STORAGE_SKU, StorageAccount,
};
use crate::cloud::{PrincipalCredentials, PrincipalInfo};
use crate::secret::Secret;

const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const MANAGEMENT_BASE: &str = "https://management.azure.com";
const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const BLOB_BASE: &str = "https://{account}.blob.core.windows.net";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const SECRET_DISPLAY_NAME: &str = "terraform";

/// Base URLs of the services the client talks to.
///
/// `blob` is a template in which `{account}` is replaced by the storage
/// account name.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub login: String,
    pub management: String,
    pub graph: String,
    pub blob: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: LOGIN_BASE.to_string(),
            management: MANAGEMENT_BASE.to_string(),
            graph: GRAPH_BASE.to_string(),
            blob: BLOB_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// NOTE: Primarily used for testing with mock servers. Routes every
    /// service to `base`; blob requests go to `{base}/blob/{account}`.
    pub fn single_host(base: &str) -> Self {
        Self {
            login: format!("{}/login", base),
            management: base.to_string(),
            graph: format!("{}/graph", base),
            blob: format!("{}/blob/{{account}}", base),
        }
    }

    fn blob_account(&self, account: &str) -> String {
        self.blob.replace("{account}", account)
    }
}

#[derive(Clone)]
pub struct AzureClient {
    client: reqwest::Client,
    management_token: Secret,
    graph_token: Secret,
    tenant_id: String,
    subscription_id: String,
    endpoints: Endpoints,
    poll_interval: Duration,
}

impl AzureClient {
    pub async fn connect(credentials: &AzureCredentials) -> Result<Self, AzureError> {
        Self::with_endpoints(credentials, Endpoints::default()).await
    }

    /// NOTE: Primarily used for testing with mock servers.
    pub async fn with_endpoints(
        credentials: &AzureCredentials,
        endpoints: Endpoints,
    ) -> Result<Self, AzureError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(AzureError::Network)?;

        let tokens = auth::acquire_tokens(&client, &endpoints.login, credentials).await?;
        tracing::debug!(
            tenant_id = %credentials.tenant_id,
            subscription_id = %credentials.subscription_id,
            "Azure credentials ready"
        );

        Ok(Self {
            client,
            management_token: tokens.management,
            graph_token: tokens.graph,
            tenant_id: credentials.tenant_id.clone(),
            subscription_id: credentials.subscription_id.clone(),
            endpoints,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn resource_group_url(&self, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourcegroups/{}?api-version={}",
            self.endpoints.management,
            self.subscription_id,
            urlencoding::encode(name),
            RESOURCE_GROUP_API_VERSION
        )
    }

    fn storage_account_path(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}",
            self.endpoints.management,
            self.subscription_id,
            urlencoding::encode(resource_group),
            name
        )
    }

    fn container_url(&self, account: &str, container: &str) -> String {
        format!(
            "{}/{}?restype=container",
            self.endpoints.blob_account(account),
            container
        )
    }

    fn management(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.management_token.expose()),
            )
    }

    fn graph(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.endpoints.graph, path))
            .header(AUTHORIZATION, format!("Bearer {}", self.graph_token.expose()))
    }

    // Resource groups

    pub async fn resource_group_exists(&self, name: &str) -> Result<bool, AzureError> {
        let response = self
            .management(reqwest::Method::HEAD, &self.resource_group_url(name))
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from_response(response).await),
        }
    }

    pub async fn create_resource_group(&self, name: &str, location: &str) -> Result<(), AzureError> {
        let response = self
            .management(reqwest::Method::PUT, &self.resource_group_url(name))
            .json(&serde_json::json!({ "location": location }))
            .send()
            .await?;

        ensure_success(response).await
    }

    /// Accepts the deletion request without waiting for it to complete.
    pub async fn delete_resource_group(&self, name: &str) -> Result<(), AzureError> {
        let response = self
            .management(reqwest::Method::DELETE, &self.resource_group_url(name))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await
    }

    // Storage accounts

    pub async fn storage_account_exists(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<bool, AzureError> {
        let url = format!(
            "{}?api-version={}",
            self.storage_account_path(resource_group, name),
            STORAGE_API_VERSION
        );
        let response = self.management(reqwest::Method::GET, &url).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from_response(response).await),
        }
    }

    pub async fn create_storage_account(
        &self,
        resource_group: &str,
        name: &str,
        location: &str,
    ) -> Result<(), AzureError> {
        let url = format!(
            "{}?api-version={}",
            self.storage_account_path(resource_group, name),
            STORAGE_API_VERSION
        );
        let body = serde_json::json!({
            "location": location,
            "sku": { "name": STORAGE_SKU },
            "kind": STORAGE_KIND,
            "properties": {
                "supportsHttpsTrafficOnly": true,
                "minimumTlsVersion": "TLS1_2",
                "encryption": {
                    "keySource": "Microsoft.Storage",
                    "services": { "blob": { "enabled": true } }
                }
            }
        });

        let response = self
            .management(reqwest::Method::PUT, &url)
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await?;

        self.wait_for_storage_account(resource_group, name).await
    }

    // NOTE: Storage account creation is asynchronous; the account key is
    // only available once provisioning has succeeded.
    async fn wait_for_storage_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<(), AzureError> {
        let url = format!(
            "{}?api-version={}",
            self.storage_account_path(resource_group, name),
            STORAGE_API_VERSION
        );

        loop {
            let response = self.management(reqwest::Method::GET, &url).send().await?;
            let status = response.status();

            // Not visible yet right after the PUT was accepted.
            if status != StatusCode::NOT_FOUND {
                let account: StorageAccount = parse_success(response).await?;
                match account.provisioning_state() {
                    Some("Succeeded") => return Ok(()),
                    Some(state @ ("Failed" | "Canceled")) => {
                        return Err(AzureError::ProvisioningFailed {
                            resource: format!("storage account '{}'", name),
                            state: state.to_string(),
                        });
                    }
                    state => {
                        tracing::debug!(
                            account = name,
                            state = state.unwrap_or("unknown"),
                            "waiting for storage account"
                        );
                    }
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn delete_storage_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<(), AzureError> {
        let url = format!(
            "{}?api-version={}",
            self.storage_account_path(resource_group, name),
            STORAGE_API_VERSION
        );
        let response = self.management(reqwest::Method::DELETE, &url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await
    }

    /// Fetches a full-access key. `None` when the account does not exist.
    pub async fn storage_account_key(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<Secret>, AzureError> {
        let url = format!(
            "{}/listKeys?api-version={}",
            self.storage_account_path(resource_group, name),
            STORAGE_API_VERSION
        );
        let response = self
            .management(reqwest::Method::POST, &url)
            .body("")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let keys: ListKeysResponse = parse_success(response).await?;
        let key = keys.full_access_key().ok_or_else(|| AzureError::InvalidResponse {
            message: format!("storage account '{}' has no full-access key", name),
        })?;

        Ok(Some(Secret::new(key)))
    }

    // Blob containers

    async fn container_request(
        &self,
        method: reqwest::Method,
        account: &str,
        key: &Secret,
        container: &str,
    ) -> Result<reqwest::Response, AzureError> {
        let date = shared_key::request_date();
        let string_to_sign = shared_key::string_to_sign(
            method.as_str(),
            &date,
            BLOB_SERVICE_VERSION,
            &shared_key::container_resource(account, container),
        );
        let authorization = shared_key::authorization(account, key, &string_to_sign)?;

        let mut request = self
            .client
            .request(method.clone(), self.container_url(account, container))
            .header("x-ms-date", date)
            .header("x-ms-version", BLOB_SERVICE_VERSION)
            .header(AUTHORIZATION, authorization);
        if method == reqwest::Method::PUT {
            request = request.body("");
        }

        Ok(request.send().await?)
    }

    pub async fn container_exists(
        &self,
        account: &str,
        key: &Secret,
        container: &str,
    ) -> Result<bool, AzureError> {
        let response = self
            .container_request(reqwest::Method::GET, account, key, container)
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from_response(response).await),
        }
    }

    pub async fn create_container(
        &self,
        account: &str,
        key: &Secret,
        container: &str,
    ) -> Result<(), AzureError> {
        let response = self
            .container_request(reqwest::Method::PUT, account, key, container)
            .await?;

        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(container, "container already exists");
            return Ok(());
        }
        ensure_success(response).await
    }

    pub async fn delete_container(
        &self,
        account: &str,
        key: &Secret,
        container: &str,
    ) -> Result<(), AzureError> {
        let response = self
            .container_request(reqwest::Method::DELETE, account, key, container)
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await
    }

    // Service principals

    pub async fn find_service_principal(
        &self,
        display_name: &str,
    ) -> Result<Option<PrincipalInfo>, AzureError> {
        let filter = format!("displayName eq '{}'", escape_odata(display_name));
        let path = format!("/servicePrincipals?$filter={}", urlencoding::encode(&filter));
        let response = self.graph(reqwest::Method::GET, &path).send().await?;

        let principals: GraphCollection<GraphServicePrincipal> = parse_success(response).await?;

        Ok(principals.value.into_iter().next().map(|sp| PrincipalInfo {
            object_id: sp.id,
            client_id: sp.app_id,
            display_name: sp.display_name,
        }))
    }

    async fn find_application(&self, app_id: &str) -> Result<Option<GraphApplication>, AzureError> {
        let filter = format!("appId eq '{}'", escape_odata(app_id));
        let path = format!("/applications?$filter={}", urlencoding::encode(&filter));
        let response = self.graph(reqwest::Method::GET, &path).send().await?;

        let applications: GraphCollection<GraphApplication> = parse_success(response).await?;
        Ok(applications.value.into_iter().next())
    }

    async fn add_password(&self, application_object_id: &str) -> Result<Secret, AzureError> {
        let path = format!("/applications/{}/addPassword", application_object_id);
        let response = self
            .graph(reqwest::Method::POST, &path)
            .json(&serde_json::json!({
                "passwordCredential": { "displayName": SECRET_DISPLAY_NAME }
            }))
            .send()
            .await?;

        let credential: GraphPasswordCredential = parse_success(response).await?;
        Ok(Secret::new(credential.secret_text))
    }

    /// Registers an application, its service principal and a client secret,
    /// then grants Contributor on the resource group only.
    pub async fn create_service_principal(
        &self,
        display_name: &str,
        scope_resource_group: &str,
    ) -> Result<PrincipalCredentials, AzureError> {
        let response = self
            .graph(reqwest::Method::POST, "/applications")
            .json(&serde_json::json!({ "displayName": display_name }))
            .send()
            .await?;
        let application: GraphApplication = parse_success(response).await?;
        tracing::debug!(client_id = %application.app_id, "application registered");

        let response = self
            .graph(reqwest::Method::POST, "/servicePrincipals")
            .json(&serde_json::json!({ "appId": application.app_id }))
            .send()
            .await?;
        let principal: GraphServicePrincipal = parse_success(response).await?;

        let client_secret = self.add_password(&application.id).await?;

        self.assign_contributor(&principal.id, scope_resource_group)
            .await?;

        Ok(PrincipalCredentials {
            client_id: application.app_id,
            client_secret,
        })
    }

    async fn assign_contributor(
        &self,
        principal_object_id: &str,
        resource_group: &str,
    ) -> Result<(), AzureError> {
        let scope = format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, resource_group
        );
        let url = format!(
            "{}{}/providers/Microsoft.Authorization/roleAssignments/{}?api-version={}",
            self.endpoints.management,
            scope,
            uuid::Uuid::new_v4(),
            ROLE_ASSIGNMENT_API_VERSION
        );
        let body = serde_json::json!({
            "properties": {
                "roleDefinitionId": format!(
                    "/subscriptions/{}/providers/Microsoft.Authorization/roleDefinitions/{}",
                    self.subscription_id, CONTRIBUTOR_ROLE_ID
                ),
                "principalId": principal_object_id,
                // Lets ARM accept a principal that has not replicated yet.
                "principalType": "ServicePrincipal"
            }
        });

        let response = self
            .management(reqwest::Method::PUT, &url)
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(scope = %scope, "role assignment already exists");
            return Ok(());
        }
        ensure_success(response).await
    }

    pub async fn reset_secret(&self, principal: &PrincipalInfo) -> Result<Secret, AzureError> {
        let application = self
            .find_application(&principal.client_id)
            .await?
            .ok_or_else(|| AzureError::InvalidResponse {
                message: format!(
                    "no application registration owns service principal '{}'",
                    principal.display_name
                ),
            })?;

        self.add_password(&application.id).await
    }

    /// Deletes the application registration behind the principal, which
    /// removes the principal with it.
    pub async fn delete_service_principal(&self, display_name: &str) -> Result<(), AzureError> {
        let Some(principal) = self.find_service_principal(display_name).await? else {
            return Ok(());
        };

        let path = match self.find_application(&principal.client_id).await? {
            Some(application) => format!("/applications/{}", application.id),
            None => format!("/servicePrincipals/{}", principal.object_id),
        };

        let response = self.graph(reqwest::Method::DELETE, &path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await
    }
}

impl std::fmt::Debug for AzureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureClient")
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .field("management_token", &"[REDACTED]")
            .field("graph_token", &"[REDACTED]")
            .finish()
    }
}

fn escape_odata(value: &str) -> String {
    value.replace('\'', "''")
}

async fn ensure_success(response: reqwest::Response) -> Result<(), AzureError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(error_from_response(response).await)
}

async fn parse_success<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AzureError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| AzureError::InvalidResponse {
        message: format!("Failed to parse response: {}", e),
    })
}

async fn error_from_response(response: reqwest::Response) -> AzureError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) if !envelope.error.code.is_empty() => {
            format!("{}: {}", envelope.error.code, envelope.error.message)
        }
        Ok(envelope) => envelope.error.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    };

    if status == StatusCode::UNAUTHORIZED {
        return AzureError::Auth { message };
    }

    AzureError::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::AzureAuth;

    fn credentials() -> AzureCredentials {
        AzureCredentials {
            tenant_id: "tenant-id".to_string(),
            subscription_id: "sub-id".to_string(),
            auth: AzureAuth::Tokens {
                management: Secret::new("super_secret_token_12345"),
                graph: Secret::new("graph_secret_token_67890"),
            },
        }
    }

    #[tokio::test]
    async fn test_debug_does_not_expose_tokens() {
        let client = AzureClient::connect(&credentials()).await.unwrap();
        let debug_output = format!("{:?}", client);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_token_12345"));
        assert!(!debug_output.contains("graph_secret_token_67890"));
    }

    #[tokio::test]
    async fn test_client_is_clone() {
        let client = AzureClient::connect(&credentials()).await.unwrap();
        let _cloned = client.clone();
    }

    #[tokio::test]
    async fn test_resource_group_url() {
        let client = AzureClient::connect(&credentials()).await.unwrap();
        assert_eq!(
            client.resource_group_url("paperless-rg"),
            "https://management.azure.com/subscriptions/sub-id/resourcegroups/paperless-rg?api-version=2021-04-01"
        );
    }

    #[tokio::test]
    async fn test_container_url_uses_account_host() {
        let client = AzureClient::connect(&credentials()).await.unwrap();
        assert_eq!(
            client.container_url("terraformstateea001", "tfstate"),
            "https://terraformstateea001.blob.core.windows.net/tfstate?restype=container"
        );
    }

    #[test]
    fn test_single_host_endpoints() {
        let endpoints = Endpoints::single_host("http://127.0.0.1:8080");
        assert_eq!(endpoints.graph, "http://127.0.0.1:8080/graph");
        assert_eq!(
            endpoints.blob_account("acct"),
            "http://127.0.0.1:8080/blob/acct"
        );
    }

    #[test]
    fn test_escape_odata_quotes() {
        assert_eq!(escape_odata("o'brien-sp"), "o''brien-sp");
    }
}
