use std::fmt;

use super::AzureError;
use super::types::{TokenErrorResponse, TokenResponse};
use crate::secret::Secret;

pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// How the tool authenticates against Azure.
#[derive(Clone)]
pub enum AzureAuth {
    /// OAuth2 client-credentials flow with an existing automation identity.
    ClientSecret {
        client_id: String,
        client_secret: Secret,
    },
    /// Bearer tokens issued out of band, e.g. `az account get-access-token`.
    Tokens { management: Secret, graph: Secret },
}

impl fmt::Debug for AzureAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AzureAuth::ClientSecret { client_id, .. } => f
                .debug_struct("ClientSecret")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
            AzureAuth::Tokens { .. } => f
                .debug_struct("Tokens")
                .field("management", &"[REDACTED]")
                .field("graph", &"[REDACTED]")
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AzureCredentials {
    pub tenant_id: String,
    pub subscription_id: String,
    pub auth: AzureAuth,
}

pub(super) struct AccessTokens {
    pub management: Secret,
    pub graph: Secret,
}

pub(super) async fn acquire_tokens(
    http: &reqwest::Client,
    login_base: &str,
    credentials: &AzureCredentials,
) -> Result<AccessTokens, AzureError> {
    match &credentials.auth {
        AzureAuth::Tokens { management, graph } => Ok(AccessTokens {
            management: management.clone(),
            graph: graph.clone(),
        }),
        AzureAuth::ClientSecret {
            client_id,
            client_secret,
        } => {
            let management = request_token(
                http,
                login_base,
                &credentials.tenant_id,
                client_id,
                client_secret,
                MANAGEMENT_SCOPE,
            )
            .await?;
            let graph = request_token(
                http,
                login_base,
                &credentials.tenant_id,
                client_id,
                client_secret,
                GRAPH_SCOPE,
            )
            .await?;
            Ok(AccessTokens { management, graph })
        }
    }
}

async fn request_token(
    http: &reqwest::Client,
    login_base: &str,
    tenant_id: &str,
    client_id: &str,
    client_secret: &Secret,
    scope: &str,
) -> Result<Secret, AzureError> {
    let url = format!(
        "{}/{}/oauth2/v2.0/token",
        login_base,
        urlencoding::encode(tenant_id)
    );
    let response = http
        .post(&url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret.expose()),
            ("scope", scope),
        ])
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        let token: TokenResponse =
            serde_json::from_str(&text).map_err(|e| AzureError::InvalidResponse {
                message: format!("Failed to parse token response: {}", e),
            })?;
        tracing::debug!(scope, "access token acquired");
        return Ok(Secret::new(token.access_token));
    }

    let message = serde_json::from_str::<TokenErrorResponse>(&text)
        .map(|e| e.error_description.unwrap_or(e.error))
        .unwrap_or_else(|_| format!("token endpoint returned {}", status.as_u16()));

    Err(AzureError::Auth { message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_does_not_expose_client_secret() {
        let auth = AzureAuth::ClientSecret {
            client_id: "app-id".to_string(),
            client_secret: Secret::new("super_secret_value"),
        };
        let debug_output = format!("{:?}", auth);
        assert!(debug_output.contains("app-id"));
        assert!(!debug_output.contains("super_secret_value"));
    }

    #[test]
    fn test_debug_does_not_expose_tokens() {
        let credentials = AzureCredentials {
            tenant_id: "tenant".to_string(),
            subscription_id: "sub".to_string(),
            auth: AzureAuth::Tokens {
                management: Secret::new("eyJ0eXAi.management"),
                graph: Secret::new("eyJ0eXAi.graph"),
            },
        };
        let debug_output = format!("{:?}", credentials);
        assert!(!debug_output.contains("eyJ0eXAi"));
    }

    #[tokio::test]
    async fn test_pre_issued_tokens_skip_token_endpoint() {
        let credentials = AzureCredentials {
            tenant_id: "tenant".to_string(),
            subscription_id: "sub".to_string(),
            auth: AzureAuth::Tokens {
                management: Secret::new("mgmt"),
                graph: Secret::new("graph"),
            },
        };
        let http = reqwest::Client::new();
        // Unroutable base: any request would fail.
        let tokens = acquire_tokens(&http, "http://127.0.0.1:9", &credentials)
            .await
            .unwrap();
        assert_eq!(tokens.management.expose(), "mgmt");
        assert_eq!(tokens.graph.expose(), "graph");
    }
}
