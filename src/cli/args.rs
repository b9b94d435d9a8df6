use std::path::PathBuf;

use clap::Parser;

use crate::cloud::{AzureAuth, AzureCredentials};
use crate::error::BootstrapError;
use crate::mode::ModeFlags;
use crate::output::DEFAULT_ARTIFACT_PATH;
use crate::secret::Secret;

/// Bootstrap (or tear down) the Azure resources a Terraform project needs
/// for its remote state: resource group, service principal, storage account
/// and blob container. Writes the credentials Terraform needs to a variables
/// file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Create missing resources and write the variables file
    #[arg(long)]
    pub provision: bool,

    /// Delete all managed resources and the variables file
    #[arg(long)]
    pub destroy: bool,

    /// Only describe mutations; existence checks still query Azure.
    /// Implies --provision when no direction is given
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the interactive confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Print short usage and exit
    #[arg(long)]
    pub usage: bool,

    /// Project config (JSON with subfix, projectname, region)
    #[arg(
        long,
        short,
        env = "TFSTATE_BOOTSTRAP_CONFIG",
        default_value = "config.json"
    )]
    pub config: PathBuf,

    /// Where the Terraform variables file is written
    #[arg(
        long,
        short,
        env = "TFSTATE_BOOTSTRAP_OUTPUT",
        default_value = DEFAULT_ARTIFACT_PATH
    )]
    pub output: PathBuf,

    /// Debug logging
    #[arg(long, short)]
    pub verbose: bool,

    #[command(flatten)]
    pub azure: AzureArgs,
}

impl Cli {
    pub fn mode_flags(&self) -> ModeFlags {
        ModeFlags {
            provision: self.provision,
            destroy: self.destroy,
            dry_run: self.dry_run,
            yes: self.yes,
            usage: self.usage,
        }
    }
}

#[derive(clap::Args, Debug)]
#[command(next_help_heading = "Azure credentials")]
pub struct AzureArgs {
    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: Option<String>,

    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Client id of the identity running the bootstrap
    #[arg(long, env = "AZURE_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Pre-issued ARM token, used when no client secret is given
    #[arg(long, env = "AZURE_MANAGEMENT_TOKEN", hide_env_values = true)]
    pub management_token: Option<String>,

    /// Pre-issued Microsoft Graph token, used when no client secret is given
    #[arg(long, env = "AZURE_GRAPH_TOKEN", hide_env_values = true)]
    pub graph_token: Option<String>,
}

impl AzureArgs {
    pub fn credentials(&self) -> Result<AzureCredentials, BootstrapError> {
        let tenant_id = required(&self.tenant_id, "AZURE_TENANT_ID")?;
        let subscription_id = required(&self.subscription_id, "AZURE_SUBSCRIPTION_ID")?;

        let auth = match (
            &self.client_id,
            &self.client_secret,
            &self.management_token,
            &self.graph_token,
        ) {
            (Some(client_id), Some(client_secret), _, _) => AzureAuth::ClientSecret {
                client_id: client_id.clone(),
                client_secret: Secret::new(client_secret.clone()),
            },
            (_, _, Some(management), Some(graph)) => AzureAuth::Tokens {
                management: Secret::new(management.clone()),
                graph: Secret::new(graph.clone()),
            },
            _ => {
                return Err(BootstrapError::Config(
                    "No Azure credentials provided. Set AZURE_CLIENT_ID and AZURE_CLIENT_SECRET, \
                     or AZURE_MANAGEMENT_TOKEN and AZURE_GRAPH_TOKEN"
                        .to_string(),
                ));
            }
        };

        Ok(AzureCredentials {
            tenant_id,
            subscription_id,
            auth,
        })
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, BootstrapError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BootstrapError::Config(format!("{} is not set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    const AZURE_VARS: [&str; 6] = [
        "AZURE_TENANT_ID",
        "AZURE_SUBSCRIPTION_ID",
        "AZURE_CLIENT_ID",
        "AZURE_CLIENT_SECRET",
        "AZURE_MANAGEMENT_TOKEN",
        "AZURE_GRAPH_TOKEN",
    ];

    fn with_clean_env<T>(f: impl FnOnce() -> T) -> T {
        let backup: Vec<(&str, Option<String>)> = AZURE_VARS
            .iter()
            .map(|name| (*name, std::env::var(name).ok()))
            .collect();
        unsafe {
            for name in AZURE_VARS {
                std::env::remove_var(name);
            }
        }

        let result = f();

        unsafe {
            for (name, value) in backup {
                match value {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
        }
        result
    }

    #[test]
    fn test_mode_flags_from_args() {
        let cli = Cli::parse_from(["tfstate-bootstrap", "--destroy", "--dry-run", "--yes"]);
        let flags = cli.mode_flags();

        assert!(flags.destroy);
        assert!(flags.dry_run);
        assert!(flags.yes);
        assert!(!flags.provision);
        assert!(!flags.usage);
    }

    #[test]
    fn test_default_paths() {
        let cli = Cli::parse_from(["tfstate-bootstrap", "--provision"]);
        assert_eq!(cli.output, PathBuf::from("terraform/terraform.tfvars"));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let result = Cli::try_parse_from(["tfstate-bootstrap", "--nuke"]);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_credentials_from_client_secret_flags() {
        let credentials = with_clean_env(|| {
            let cli = Cli::parse_from([
                "tfstate-bootstrap",
                "--tenant-id=tenant",
                "--subscription-id=sub",
                "--client-id=app",
                "--client-secret=secret",
            ]);
            cli.azure.credentials().unwrap()
        });

        assert_eq!(credentials.tenant_id, "tenant");
        assert_eq!(credentials.subscription_id, "sub");
        assert!(matches!(credentials.auth, AzureAuth::ClientSecret { .. }));
    }

    #[test]
    #[serial]
    fn test_credentials_from_env_tokens() {
        let credentials = with_clean_env(|| {
            unsafe {
                std::env::set_var("AZURE_TENANT_ID", "env_tenant");
                std::env::set_var("AZURE_SUBSCRIPTION_ID", "env_sub");
                std::env::set_var("AZURE_MANAGEMENT_TOKEN", "mgmt");
                std::env::set_var("AZURE_GRAPH_TOKEN", "graph");
            }
            let cli = Cli::parse_from(["tfstate-bootstrap", "--provision"]);
            cli.azure.credentials().unwrap()
        });

        assert_eq!(credentials.tenant_id, "env_tenant");
        match credentials.auth {
            AzureAuth::Tokens { management, graph } => {
                assert_eq!(management.expose(), "mgmt");
                assert_eq!(graph.expose(), "graph");
            }
            other => panic!("Expected token auth, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_cli_flag_takes_precedence_over_env() {
        let credentials = with_clean_env(|| {
            unsafe {
                std::env::set_var("AZURE_TENANT_ID", "env_tenant");
            }
            let cli = Cli::parse_from([
                "tfstate-bootstrap",
                "--tenant-id=cli_tenant",
                "--subscription-id=sub",
                "--management-token=m",
                "--graph-token=g",
            ]);
            cli.azure.credentials().unwrap()
        });

        assert_eq!(credentials.tenant_id, "cli_tenant");
    }

    #[test]
    #[serial]
    fn test_missing_subscription_is_config_error() {
        let err = with_clean_env(|| {
            let cli = Cli::parse_from([
                "tfstate-bootstrap",
                "--tenant-id=tenant",
                "--client-id=app",
                "--client-secret=secret",
            ]);
            cli.azure.credentials().unwrap_err()
        });

        assert!(matches!(err, BootstrapError::Config(_)));
        assert!(err.to_string().contains("AZURE_SUBSCRIPTION_ID"));
    }

    #[test]
    #[serial]
    fn test_missing_auth_is_config_error() {
        let err = with_clean_env(|| {
            let cli = Cli::parse_from([
                "tfstate-bootstrap",
                "--tenant-id=tenant",
                "--subscription-id=sub",
                "--client-id=app",
            ]);
            cli.azure.credentials().unwrap_err()
        });

        assert!(err.to_string().contains("No Azure credentials provided"));
    }
}
