use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::AppError;
use crate::models::RegistryImage;

/// Artifact Registry repository that Cloud Run source deploys push to.
pub fn repository_path(region: &str, project: &str, service: &str) -> String {
    format!(
        "{}-docker.pkg.dev/{}/cloud-run-source-deploy/{}",
        region, project, service
    )
}

/// Listing and deletion of container images.
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    async fn list_images(&self, repository: &str) -> Result<Vec<RegistryImage>>;

    /// Delete `package@version` together with its tags, without prompting.
    async fn delete_image(&self, image_ref: &str) -> Result<()>;
}

/// Drives Artifact Registry through the `gcloud` command line.
pub struct GcloudRegistry {
    program: String,
}

impl GcloudRegistry {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    fn list_args(repository: &str) -> Vec<String> {
        vec![
            "artifacts".into(),
            "docker".into(),
            "images".into(),
            "list".into(),
            repository.into(),
            "--include-tags".into(),
            "--format=json".into(),
        ]
    }

    fn delete_args(image_ref: &str) -> Vec<String> {
        vec![
            "artifacts".into(),
            "docker".into(),
            "images".into(),
            "delete".into(),
            image_ref.into(),
            "--delete-tags".into(),
            "--quiet".into(),
        ]
    }

    /// Run gcloud and return its stdout; a non-zero exit is an error.
    async fn exec(&self, args: &[String]) -> Result<Vec<u8>> {
        let command_line = format!("{} {}", self.program, args.join(" "));
        debug!(command = %command_line, "exec");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to run `{}`", command_line))?;

        if !output.status.success() {
            return Err(AppError::CommandFailed {
                command: command_line,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl ImageRegistry for GcloudRegistry {
    async fn list_images(&self, repository: &str) -> Result<Vec<RegistryImage>> {
        let stdout = self.exec(&Self::list_args(repository)).await?;
        parse_image_list(&stdout)
            .with_context(|| format!("Failed to parse image list for {}", repository))
    }

    async fn delete_image(&self, image_ref: &str) -> Result<()> {
        self.exec(&Self::delete_args(image_ref)).await?;
        Ok(())
    }
}

/// Parse the JSON array gcloud prints for `images list --format=json`.
pub fn parse_image_list(stdout: &[u8]) -> Result<Vec<RegistryImage>, AppError> {
    Ok(serde_json::from_slice(stdout)?)
}
