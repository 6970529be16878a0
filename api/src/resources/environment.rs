use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::{
    error::{Error, Result},
    resources::project::ProjectId,
};

/// Full resource path of a Cloud Composer environment:
/// `projects/<project>/locations/<location>/environments/<name>`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct EnvironmentPath(pub String);

impl EnvironmentPath {
    pub fn new(project_id: &ProjectId, location: &str, name: &str) -> Self {
        Self(format!(
            "projects/{}/locations/{}/environments/{}",
            project_id.0, location, name
        ))
    }

    fn segments(&self) -> Vec<&str> {
        self.0.split('/').collect()
    }

    pub fn project(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or_default()
    }

    pub fn location(&self) -> &str {
        self.0.split('/').nth(3).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0.split('/').nth(5).unwrap_or_default()
    }
}

impl FromStr for EnvironmentPath {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        let path = Self(string.trim_matches('/').to_owned());
        match path.segments().as_slice() {
            ["projects", project, "locations", location, "environments", name]
                if !project.is_empty() && !location.is_empty() && !name.is_empty() =>
            {
                Ok(path)
            }
            _ => Err(Error::BadEnvironmentPath {
                path: string.to_owned(),
            }),
        }
    }
}

impl Display for EnvironmentPath {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvironmentState {
    StateUnspecified,
    Creating,
    Running,
    Updating,
    Deleting,
    Error,
    #[serde(other)]
    Unknown,
}

impl Display for EnvironmentState {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        let state = match self {
            EnvironmentState::StateUnspecified => "STATE_UNSPECIFIED",
            EnvironmentState::Creating => "CREATING",
            EnvironmentState::Running => "RUNNING",
            EnvironmentState::Updating => "UPDATING",
            EnvironmentState::Deleting => "DELETING",
            EnvironmentState::Error => "ERROR",
            EnvironmentState::Unknown => "UNKNOWN",
        };
        write!(formatter, "{state}")
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub dag_gcs_prefix: Option<String>,
    #[serde(default)]
    pub airflow_uri: Option<String>,
    #[serde(default)]
    pub gke_cluster: Option<String>,
    #[serde(default)]
    pub node_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: EnvironmentPath,
    #[serde(default)]
    pub uuid: Option<String>,
    pub state: EnvironmentState,
    #[serde(default)]
    pub config: EnvironmentConfig,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
}

impl Environment {
    pub fn short_name(&self) -> &str {
        self.name.name()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListEnvironmentsResponse {
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
