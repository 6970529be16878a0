use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct ProjectId(pub String);

impl Display for ProjectId {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: ProjectId,
    // Projects created without a display name have none.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project_number: Option<String>,
    #[serde(default)]
    pub lifecycle_state: Option<String>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
}

impl Project {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.project_id.0)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListProjectsResponse {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewProject<'request> {
    pub project_id: &'request ProjectId,
    pub name: &'request str,
}

/// Long running operation returned by project creation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
}
