use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("gcloud config file not found at {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Failed to read gcloud config file at {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse gcloud config file at {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("{key} not found in gcloud config file at {}: under [{section}], set e.g. {key} = {example}", .path.display())]
    MissingConfigKey {
        key: &'static str,
        section: &'static str,
        example: &'static str,
        path: PathBuf,
    },

    #[error("Invalid resource name: {0}")]
    InvalidResourceName(String),

    #[error("Cloud Run API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Command `{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
