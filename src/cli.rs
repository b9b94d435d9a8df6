mod args;

pub use args::{AzureArgs, Cli};

use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::CommandFactory;
use clap::error::ErrorKind;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cloud::{AzureClient, CloudClient, Simulated};
use crate::config::ProjectConfig;
use crate::error::BootstrapError;
use crate::mode::{Direction, RunMode};
use crate::output::VariablesArtifact;
use crate::reconcile::{Reconciler, Step};

pub fn usage() -> String {
    format!(
        "{}\n\nRun with --help for the full list of options.",
        Cli::command().render_usage()
    )
}

/// Help and version go to stdout with exit 0; every other parse failure
/// (unknown flag, bad value) prints the error with usage and exits 1.
pub fn report_parse_error(err: clap::Error) -> ExitCode {
    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// Loads config and credentials, connects, then hands off to [`execute`].
pub async fn run(cli: &Cli, mode: RunMode) -> Result<(), BootstrapError> {
    let config = ProjectConfig::load(&cli.config)?;
    let credentials = cli.azure.credentials()?;
    let artifact = VariablesArtifact::new(&cli.output);

    let client = AzureClient::connect(&credentials).await?;

    let stdin = std::io::stdin();
    let steps = execute(
        mode,
        client,
        &config,
        &artifact,
        stdin.lock(),
        std::io::stderr(),
    )
    .await?;

    println!("{}", summary(&steps));
    Ok(())
}

/// Confirmation gate and dispatch. Nothing is mutated before the gate passes.
pub async fn execute<C, R, W>(
    mode: RunMode,
    cloud: C,
    config: &ProjectConfig,
    artifact: &VariablesArtifact,
    input: R,
    prompt: W,
) -> Result<Vec<Step>, BootstrapError>
where
    C: CloudClient,
    R: BufRead,
    W: Write,
{
    tracing::info!(
        mode = %mode,
        project = config.project_name(),
        subscription_id = cloud.subscription_id(),
        "starting"
    );

    if mode.requires_confirmation() && !confirm(input, prompt, &confirmation_prompt(mode, config))? {
        return Err(BootstrapError::UserAbort);
    }

    if mode.is_simulation() {
        let simulated = Simulated::new(cloud);
        dispatch(mode, &simulated, config, artifact).await
    } else {
        dispatch(mode, &cloud, config, artifact).await
    }
}

async fn dispatch(
    mode: RunMode,
    cloud: &dyn CloudClient,
    config: &ProjectConfig,
    artifact: &VariablesArtifact,
) -> Result<Vec<Step>, BootstrapError> {
    let reconciler = Reconciler::new(cloud, config, artifact, mode.is_simulation());

    match mode.direction {
        Direction::Provision => {
            let report = reconciler.provision().await?;
            if report.artifact_written {
                tracing::info!(
                    client_id = %report.result.client_id,
                    path = %artifact.path().display(),
                    "provisioning complete"
                );
            }
            Ok(report.steps)
        }
        Direction::Destroy => {
            let report = reconciler.destroy().await?;
            tracing::info!("destroy complete; resource group deletion continues in Azure");
            Ok(report.steps)
        }
    }
}

fn confirmation_prompt(mode: RunMode, config: &ProjectConfig) -> String {
    match mode.direction {
        Direction::Provision => format!(
            "Create missing resources for project '{}' in '{}' (resource group '{}')? [y/N] ",
            config.project_name(),
            config.region(),
            config.resource_group()
        ),
        Direction::Destroy => format!(
            "DELETE resource group '{}', storage account '{}' and service principal '{}'? [y/N] ",
            config.resource_group(),
            config.storage_account_name(),
            config.service_principal_name()
        ),
    }
}

/// Accepts `y` or `yes` in any case. Anything else, including end of input,
/// is a refusal.
pub fn confirm<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    prompt: &str,
) -> Result<bool, BootstrapError> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        return Ok(false);
    }

    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "Resource")]
    subject: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Result")]
    outcome: String,
}

pub fn summary(steps: &[Step]) -> String {
    let rows = steps.iter().map(|step| StepRow {
        subject: step.subject.to_string(),
        name: step.name.clone(),
        outcome: step.outcome.to_string(),
    });

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{Outcome, Subject};
    use crate::resource::ResourceKind;
    use std::io::Cursor;

    #[test]
    fn test_confirm_accepts_y() {
        let mut prompt = Vec::new();
        let answer = confirm(Cursor::new("y\n"), &mut prompt, "Continue? ").unwrap();
        assert!(answer);
        assert_eq!(String::from_utf8(prompt).unwrap(), "Continue? ");
    }

    #[test]
    fn test_confirm_accepts_yes_any_case() {
        assert!(confirm(Cursor::new("  YES \n"), Vec::new(), "").unwrap());
    }

    #[test]
    fn test_confirm_rejects_other_answers() {
        for answer in ["n\n", "no\n", "\n", "yep\n", "sure\n"] {
            assert!(
                !confirm(Cursor::new(answer), Vec::new(), "").unwrap(),
                "{:?} must not confirm",
                answer
            );
        }
    }

    #[test]
    fn test_confirm_rejects_eof() {
        assert!(!confirm(Cursor::new(""), Vec::new(), "").unwrap());
    }

    #[test]
    fn test_usage_mentions_help() {
        let usage = usage();
        assert!(usage.contains("Usage"));
        assert!(usage.contains("--help"));
    }

    #[test]
    fn test_summary_lists_steps() {
        let steps = vec![
            Step {
                subject: Subject::Resource(ResourceKind::ResourceGroup),
                name: "paperless-rg".to_string(),
                outcome: Outcome::Created,
            },
            Step {
                subject: Subject::Resource(ResourceKind::BlobContainer),
                name: "tfstate".to_string(),
                outcome: Outcome::AlreadyExists,
            },
        ];

        let table = summary(&steps);
        assert!(table.contains("paperless-rg"));
        assert!(table.contains("created"));
        assert!(table.contains("already exists"));
    }

    #[test]
    fn test_destroy_prompt_names_everything() {
        let config = ProjectConfig::new("ea001", "paperless", "westeurope").unwrap();
        let mode = RunMode {
            direction: Direction::Destroy,
            execution: crate::mode::Execution::Execute,
            pre_confirmed: false,
        };
        let prompt = confirmation_prompt(mode, &config);
        assert!(prompt.contains("paperless-rg"));
        assert!(prompt.contains("terraformstateea001"));
        assert!(prompt.contains("paperless-sp"));
    }
}
