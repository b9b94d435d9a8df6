//! The variables artifact handed to Terraform.
//!
//! SECURITY: `client_secret` is written in cleartext. This file is the
//! credential handoff to Terraform and is the one place the secret leaves the
//! process. It is created with owner-only permissions on Unix and must be kept
//! out of version control.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::BootstrapError;
use crate::secret::Secret;

pub const DEFAULT_ARTIFACT_PATH: &str = "terraform/terraform.tfvars";

/// Keys of the artifact, in the order they are written.
pub const ARTIFACT_KEYS: [&str; 9] = [
    "resource_group_name",
    "resource_group_location",
    "project_name",
    "subfix",
    "storage_container_name",
    "client_id",
    "client_secret",
    "tenant_id",
    "subscription_id",
];

const HEADER: &str = "# Generated by tfstate-bootstrap. Contains service principal credentials; do not commit.";

/// Identifiers discovered or created by a provision run.
#[derive(Debug, Clone)]
pub struct ProvisioningResult {
    pub client_id: String,
    pub client_secret: ClientSecret,
    pub tenant_id: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub region: String,
    pub project_name: String,
    pub subfix: String,
    pub container_name: String,
}

/// Where the `client_secret` value comes from on this run.
#[derive(Debug, Clone)]
pub enum ClientSecret {
    /// Minted during this run.
    Issued(Secret),
    /// Not regenerated; the value already in the artifact stays authoritative.
    Preserved,
}

/// The on-disk variables file. Its presence means credentials were already
/// handed out.
#[derive(Debug, Clone)]
pub struct VariablesArtifact {
    path: PathBuf,
}

impl VariablesArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Parses `key = "value"` lines back into a map.
    pub fn read(&self) -> Result<BTreeMap<String, String>, BootstrapError> {
        let raw = std::fs::read_to_string(&self.path)?;
        parse(&raw)
    }

    /// Writes the artifact. Returns `false` when the secret was preserved but
    /// the existing file has no `client_secret` to carry over, in which case
    /// the file is left untouched.
    pub fn write(&self, result: &ProvisioningResult) -> Result<bool, BootstrapError> {
        let secret = match &result.client_secret {
            ClientSecret::Issued(secret) => secret.clone(),
            ClientSecret::Preserved => {
                let existing = if self.exists() {
                    self.read()?
                } else {
                    BTreeMap::new()
                };
                match existing.get("client_secret") {
                    Some(value) if !value.is_empty() => Secret::new(value.clone()),
                    _ => {
                        tracing::warn!(
                            path = %self.path.display(),
                            "existing variables file has no client_secret; leaving it untouched"
                        );
                        return Ok(false);
                    }
                }
            }
        };

        self.write_atomic(&render(result, &secret)?)?;
        tracing::info!(path = %self.path.display(), "variables file written");
        Ok(true)
    }

    fn write_atomic(&self, contents: &str) -> Result<(), BootstrapError> {
        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        // NamedTempFile is created 0600 on Unix.
        let mut file = tempfile::NamedTempFile::new_in(&parent)?;
        file.write_all(contents.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| {
            BootstrapError::Artifact(format!("cannot replace {}: {}", self.path.display(), e.error))
        })?;

        Ok(())
    }

    /// Removes the artifact. Returns `false` when there was nothing to remove.
    pub fn remove(&self) -> Result<bool, BootstrapError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Serializes the result as a `.tfvars` body, one string attribute per key.
pub fn render(result: &ProvisioningResult, client_secret: &Secret) -> Result<String, BootstrapError> {
    let values = [
        result.resource_group.as_str(),
        result.region.as_str(),
        result.project_name.as_str(),
        result.subfix.as_str(),
        result.container_name.as_str(),
        result.client_id.as_str(),
        client_secret.expose(),
        result.tenant_id.as_str(),
        result.subscription_id.as_str(),
    ];

    let body = ARTIFACT_KEYS
        .iter()
        .zip(values)
        .fold(hcl::Body::builder(), |body, (key, value)| {
            body.add_attribute((*key, value))
        })
        .build();

    // Values are quoted strings; the formatter escapes quotes, control
    // characters and template markers.
    let attributes = hcl::to_string(&body)
        .map_err(|e| BootstrapError::Artifact(format!("cannot render variables: {}", e)))?;

    Ok(format!("{}\n{}", HEADER, attributes))
}

fn parse(raw: &str) -> Result<BTreeMap<String, String>, BootstrapError> {
    let body: hcl::Body = hcl::from_str(raw)
        .map_err(|e| BootstrapError::Artifact(format!("cannot parse variables file: {}", e)))?;

    body.attributes()
        .map(|attr| literal(attr.key(), attr.expr()).map(|value| (attr.key().to_string(), value)))
        .collect()
}

/// The string value of an attribute. Anything that would need evaluation
/// (interpolation, references, numbers) was not written by this tool.
fn literal(key: &str, expr: &hcl::Expression) -> Result<String, BootstrapError> {
    let not_literal =
        || BootstrapError::Artifact(format!("`{}` is not a plain string value", key));

    match expr {
        hcl::Expression::String(value) => Ok(value.clone()),
        hcl::Expression::TemplateExpr(template) => {
            let template = hcl::template::Template::from_expr(template).map_err(|_| not_literal())?;
            template
                .elements()
                .iter()
                .map(|element| match element {
                    hcl::template::Element::Literal(text) => Ok(text.as_str()),
                    _ => Err(not_literal()),
                })
                .collect()
        }
        _ => Err(not_literal()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(secret: ClientSecret) -> ProvisioningResult {
        ProvisioningResult {
            client_id: "22222222-2222-2222-2222-222222222222".to_string(),
            client_secret: secret,
            tenant_id: "tenant-id".to_string(),
            subscription_id: "sub-id".to_string(),
            resource_group: "paperless-rg".to_string(),
            region: "westeurope".to_string(),
            project_name: "paperless".to_string(),
            subfix: "ea001".to_string(),
            container_name: "tfstate".to_string(),
        }
    }

    #[test]
    fn test_render_contains_every_key() {
        let rendered = render(&result(ClientSecret::Preserved), &Secret::new("s3cr3t")).unwrap();
        assert!(rendered.starts_with('#'));

        let values = parse(&rendered).unwrap();
        for key in ARTIFACT_KEYS {
            assert!(values.contains_key(key), "missing {}", key);
        }
        assert_eq!(values["resource_group_name"], "paperless-rg");
        assert_eq!(values["client_secret"], "s3cr3t");
    }

    #[test]
    fn test_render_keeps_special_characters_literal() {
        let mut special = result(ClientSecret::Preserved);
        special.region = "west${var.x}%{ if true }".to_string();
        let secret = Secret::new("a\"b\\c\nline2\t~.");

        let rendered = render(&special, &secret).unwrap();

        // Header plus one line per key: nothing spills onto extra lines.
        assert_eq!(rendered.lines().count(), ARTIFACT_KEYS.len() + 1);
        let values = parse(&rendered).unwrap();
        assert_eq!(values["resource_group_location"], "west${var.x}%{ if true }");
        assert_eq!(values["client_secret"], "a\"b\\c\nline2\t~.");
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let parsed =
            parse("# comment\n\nsubfix = \"ea001\"\nregion=\"westeurope\"\n").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["subfix"], "ea001");
        assert_eq!(parsed["region"], "westeurope");
    }

    #[test]
    fn test_parse_rejects_interpolation() {
        let err = parse("client_secret = \"${var.secret}\"\n").unwrap_err();
        assert!(matches!(err, BootstrapError::Artifact(_)));
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn test_write_preserves_secret_with_special_characters() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = VariablesArtifact::new(dir.path().join("terraform.tfvars"));
        let original = "q\"uo\\te${x}\nnext";
        artifact
            .write(&result(ClientSecret::Issued(Secret::new(original))))
            .unwrap();

        assert!(artifact.write(&result(ClientSecret::Preserved)).unwrap());

        assert_eq!(artifact.read().unwrap()["client_secret"], original);
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = VariablesArtifact::new(dir.path().join("nested/terraform/terraform.tfvars"));

        let written = artifact
            .write(&result(ClientSecret::Issued(Secret::new("fresh"))))
            .unwrap();

        assert!(written);
        assert!(artifact.exists());
        let values = artifact.read().unwrap();
        assert_eq!(values["client_secret"], "fresh");
        assert_eq!(values["tenant_id"], "tenant-id");
        assert_eq!(values.len(), ARTIFACT_KEYS.len());
    }

    #[test]
    fn test_write_preserves_existing_secret() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = VariablesArtifact::new(dir.path().join("terraform.tfvars"));
        artifact
            .write(&result(ClientSecret::Issued(Secret::new("original"))))
            .unwrap();

        let mut rerun = result(ClientSecret::Preserved);
        rerun.tenant_id = "other-tenant".to_string();
        assert!(artifact.write(&rerun).unwrap());

        let values = artifact.read().unwrap();
        assert_eq!(values["client_secret"], "original");
        assert_eq!(values["tenant_id"], "other-tenant");
    }

    #[test]
    fn test_write_preserved_without_existing_secret_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terraform.tfvars");
        std::fs::write(&path, "subfix = \"ea001\"\n").unwrap();
        let artifact = VariablesArtifact::new(&path);

        let written = artifact.write(&result(ClientSecret::Preserved)).unwrap();

        assert!(!written);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "subfix = \"ea001\"\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let artifact = VariablesArtifact::new(dir.path().join("terraform.tfvars"));
        artifact
            .write(&result(ClientSecret::Issued(Secret::new("fresh"))))
            .unwrap();

        let mode = std::fs::metadata(artifact.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = VariablesArtifact::new(dir.path().join("terraform.tfvars"));
        assert!(!artifact.remove().unwrap());

        artifact
            .write(&result(ClientSecret::Issued(Secret::new("fresh"))))
            .unwrap();
        assert!(artifact.remove().unwrap());
        assert!(!artifact.exists());
    }
}
