use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::AppError;

pub const ACTIVE_CONDITION: &str = "Active";
pub const CONDITION_SUCCEEDED: &str = "CONDITION_SUCCEEDED";

/// GET /v2/{parent}/services response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListServicesResponse {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// GET /v2/{service}/revisions response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRevisionsResponse {
    #[serde(default)]
    pub revisions: Vec<Revision>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub image: Option<String>,
}

impl Revision {
    /// Serving traffic: an `Active` condition in state `CONDITION_SUCCEEDED`.
    pub fn is_active(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.kind == ACTIVE_CONDITION && c.state == CONDITION_SUCCEEDED)
    }

    /// Non-empty image references of every container.
    pub fn image_refs(&self) -> impl Iterator<Item = &str> {
        self.containers
            .iter()
            .filter_map(|c| c.image.as_deref())
            .filter(|image| !image.is_empty())
    }
}

/// One record of `gcloud artifacts docker images list --include-tags --format=json`
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryImage {
    pub package: String,
    pub version: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
}

impl RegistryImage {
    /// `package@version`
    pub fn image_ref(&self) -> String {
        format!("{}@{}", self.package, self.version)
    }

    pub fn is_tagged(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// gcloud emits tags either as a JSON list or as a comma-separated string.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<Tags>::deserialize(deserializer)? {
        Some(Tags::List(tags)) => tags,
        Some(Tags::Joined(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    })
}

/// Short service name from a `projects/{p}/locations/{l}/services/{s}` name,
/// optionally followed by `/revisions/{r}`.
pub fn service_short_name(name: &str) -> Result<String, AppError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"^projects/[^/]+/locations/[^/]+/services/([^/]+)(?:/revisions/[^/]+)?$")
            .expect("static regex")
    });

    re.captures(name)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| AppError::InvalidResourceName(name.to_string()))
}

/// Outcome of cleaning one service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceReport {
    pub service: String,
    pub revisions_kept: usize,
    pub revisions_deleted: usize,
    pub images_kept: usize,
    pub images_deleted: usize,
}

/// Totals across every service of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub services: usize,
    pub revisions_kept: usize,
    pub revisions_deleted: usize,
    pub images_kept: usize,
    pub images_deleted: usize,
}

impl RunSummary {
    pub fn add(&mut self, report: &ServiceReport) {
        self.services += 1;
        self.revisions_kept += report.revisions_kept;
        self.revisions_deleted += report.revisions_deleted;
        self.images_kept += report.images_kept;
        self.images_deleted += report.images_deleted;
    }
}
