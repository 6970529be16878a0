use anyhow::{Context, Result};
use fuga_client::{
    Bucket, BucketName, Client, Environment, EnvironmentPath, NewBucket, NewProject, Object, Page,
    Project, ProjectId,
};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    errors::guard_credentials,
    prompt::{choose_from, required_text, PromptProvider},
    selector::{Creation, ResourceCollection, Selectable, SelectionPage},
};

/// Locations offered when creating a new bucket.
pub const STORAGE_LOCATIONS: [&str; 20] = [
    "northamerica-northeast1",
    "us-central1",
    "us-east1",
    "us-east4",
    "us-west1",
    "us-west2",
    "southamerica-east1",
    "europe-north1",
    "europe-west1",
    "europe-west2",
    "europe-west3",
    "europe-west4",
    "europe-west6",
    "asia-east1",
    "asia-east2",
    "asia-northeast1",
    "asia-northeast2",
    "asia-south1",
    "asia-southeast1",
    "australia-southeast1",
];

pub const COMPOSER_CREATION_NOTICE: &str = "Creating new Cloud Composer Environment is not supported with fuga at the moment. Until it's supported, please create the environment beforehand on your own.";

/// The Google Cloud operations fuga needs. Authorization failures surface as `CredentialError`.
pub trait CloudApi {
    fn get_project(&self, project_id: &ProjectId) -> Result<Project>;

    fn list_projects(&self, page_token: Option<&str>) -> Result<Page<Project>>;

    fn create_project(&self, project_id: &ProjectId, name: &str) -> Result<Project>;

    fn get_bucket(&self, bucket_name: &BucketName) -> Result<Bucket>;

    fn list_buckets(
        &self,
        project_id: &ProjectId,
        page_token: Option<&str>,
    ) -> Result<Page<Bucket>>;

    fn create_bucket(
        &self,
        project_id: &ProjectId,
        bucket_name: &BucketName,
        location: &str,
    ) -> Result<Bucket>;

    fn get_environment(&self, environment_path: &EnvironmentPath) -> Result<Environment>;

    fn list_environments(
        &self,
        project_id: &ProjectId,
        location: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Environment>>;

    fn upload_object(
        &self,
        bucket_name: &BucketName,
        object_name: &str,
        body: Vec<u8>,
    ) -> Result<Object>;
}

impl CloudApi for Client {
    fn get_project(&self, project_id: &ProjectId) -> Result<Project> {
        guard_credentials(Client::get_project(self, project_id))
            .with_context(|| format!("Unable to get project `{project_id}`"))
    }

    fn list_projects(&self, page_token: Option<&str>) -> Result<Page<Project>> {
        guard_credentials(self.get_projects_page(page_token))
            .context("Operation to list projects has failed.")
    }

    fn create_project(&self, project_id: &ProjectId, name: &str) -> Result<Project> {
        let operation = guard_credentials(Client::create_project(
            self,
            NewProject { project_id, name },
        ))
        .with_context(|| format!("Failed to create project `{project_id}`"))?;
        info!(
            "Requested creation of project `{}` (operation `{}`).",
            project_id, operation.name
        );
        Ok(Project {
            project_id: project_id.clone(),
            name: Some(name.to_owned()),
            project_number: None,
            lifecycle_state: None,
            create_time: None,
        })
    }

    fn get_bucket(&self, bucket_name: &BucketName) -> Result<Bucket> {
        guard_credentials(Client::get_bucket(self, bucket_name))
            .with_context(|| format!("Unable to get bucket `{bucket_name}`"))
    }

    fn list_buckets(
        &self,
        project_id: &ProjectId,
        page_token: Option<&str>,
    ) -> Result<Page<Bucket>> {
        guard_credentials(self.get_buckets_page(project_id, page_token)).with_context(|| {
            format!("Operation to list buckets in project `{project_id}` has failed.")
        })
    }

    fn create_bucket(
        &self,
        project_id: &ProjectId,
        bucket_name: &BucketName,
        location: &str,
    ) -> Result<Bucket> {
        guard_credentials(Client::create_bucket(
            self,
            project_id,
            NewBucket {
                name: bucket_name,
                location,
            },
        ))
        .with_context(|| format!("Failed to create bucket `{bucket_name}` in `{location}`"))
    }

    fn get_environment(&self, environment_path: &EnvironmentPath) -> Result<Environment> {
        guard_credentials(Client::get_environment(self, environment_path))
            .with_context(|| format!("Unable to get environment `{environment_path}`"))
    }

    fn list_environments(
        &self,
        project_id: &ProjectId,
        location: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Environment>> {
        guard_credentials(self.get_environments_page(project_id, location, page_token))
            .with_context(|| {
                format!(
                    "Operation to list environments in `{project_id}` ({location}) has failed."
                )
            })
    }

    fn upload_object(
        &self,
        bucket_name: &BucketName,
        object_name: &str,
        body: Vec<u8>,
    ) -> Result<Object> {
        guard_credentials(Client::upload_object(self, bucket_name, object_name, body))
            .with_context(|| format!("Could not upload `gs://{bucket_name}/{object_name}`"))
    }
}

impl Selectable for Project {
    fn id(&self) -> &str {
        &self.project_id.0
    }

    fn display_name(&self) -> String {
        Project::display_name(self).to_owned()
    }
}

impl Selectable for Bucket {
    fn id(&self) -> &str {
        &self.name.0
    }

    fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.location)
    }

    fn label(&self) -> String {
        Selectable::display_name(self)
    }
}

impl Selectable for Environment {
    fn id(&self) -> &str {
        &self.name.0
    }

    fn display_name(&self) -> String {
        self.short_name().to_owned()
    }
}

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Whitespace regex is valid"));

/// Suggested id for a new project: the name lower-cased, whitespace runs replaced by `_`.
pub fn default_project_id(name: &str) -> String {
    WHITESPACE.replace_all(name.trim(), "_").to_lowercase()
}

pub struct ProjectCollection<'a> {
    pub api: &'a dyn CloudApi,
}

impl ResourceCollection for ProjectCollection<'_> {
    type Item = Project;

    fn name(&self) -> &str {
        "GCP project"
    }

    fn list_page(&self, page_token: Option<&str>) -> Result<SelectionPage<Project>> {
        self.api.list_projects(page_token).map(SelectionPage::from)
    }

    fn create(&self, prompt: &mut dyn PromptProvider) -> Result<Project> {
        let name = required_text(prompt, "Project name", None)?;
        let suggested_id = default_project_id(&name);
        let project_id = required_text(prompt, "Project id", Some(suggested_id.as_str()))?;
        self.api.create_project(&ProjectId(project_id), &name)
    }
}

pub struct BucketCollection<'a> {
    pub api: &'a dyn CloudApi,
    pub project_id: &'a ProjectId,
}

impl ResourceCollection for BucketCollection<'_> {
    type Item = Bucket;

    fn name(&self) -> &str {
        "GCS bucket"
    }

    fn list_page(&self, page_token: Option<&str>) -> Result<SelectionPage<Bucket>> {
        self.api
            .list_buckets(self.project_id, page_token)
            .map(SelectionPage::from)
    }

    fn create(&self, prompt: &mut dyn PromptProvider) -> Result<Bucket> {
        let bucket_name = BucketName(required_text(prompt, "Bucket name", None)?);
        let location = STORAGE_LOCATIONS[choose_from(
            prompt,
            "Please choose a location for the new bucket.",
            &STORAGE_LOCATIONS,
        )?];
        self.api
            .create_bucket(self.project_id, &bucket_name, location)
    }
}

pub struct EnvironmentCollection<'a> {
    pub api: &'a dyn CloudApi,
    pub project_id: &'a ProjectId,
    pub location: String,
}

impl ResourceCollection for EnvironmentCollection<'_> {
    type Item = Environment;

    fn name(&self) -> &str {
        "Cloud Composer environment"
    }

    fn list_page(&self, page_token: Option<&str>) -> Result<SelectionPage<Environment>> {
        self.api
            .list_environments(self.project_id, &self.location, page_token)
            .map(SelectionPage::from)
    }

    fn creation(&self) -> Creation {
        Creation::Unsupported {
            notice: COMPOSER_CREATION_NOTICE.to_owned(),
        }
    }
}
