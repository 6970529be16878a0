use anyhow::{Context, Result};
use fuga_client::{BucketName, EnvironmentPath, EnvironmentState, ProjectId};
use serde::Serialize;
use structopt::StructOpt;

use crate::{
    bootstrap::{BootstrappedEnvironment, EnvironmentBootstrapper},
    cloud::CloudApi,
    config::{FugaConfig, BUCKET_NAME, ENVIRONMENT_PATH, PROJECT_ID},
    printer::Printer,
    prompt::PromptProvider,
};

#[derive(Debug, StructOpt)]
pub enum EnvironmentArgs {
    #[structopt(name = "init")]
    /// Choose (or create) the GCP project, GCS bucket and Cloud Composer environment to use
    Init,

    #[structopt(name = "show")]
    /// Show the configured project, bucket and Cloud Composer environment
    Show,
}

/// Configured resources as reported by `fuga environment show`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentSummary {
    pub project_id: String,
    pub project_name: String,
    pub bucket_name: String,
    pub bucket_location: String,
    pub environment_name: String,
    pub environment_path: String,
    pub state: EnvironmentState,
    pub dag_gcs_prefix: Option<String>,
    pub airflow_uri: Option<String>,
}

impl From<&BootstrappedEnvironment> for EnvironmentSummary {
    fn from(resolved: &BootstrappedEnvironment) -> Self {
        Self {
            project_id: resolved.project.project_id.0.clone(),
            project_name: resolved.project.display_name().to_owned(),
            bucket_name: resolved.bucket.name.0.clone(),
            bucket_location: resolved.bucket.location.clone(),
            environment_name: resolved.environment.short_name().to_owned(),
            environment_path: resolved.environment.name.0.clone(),
            state: resolved.environment.state,
            dag_gcs_prefix: resolved.environment.config.dag_gcs_prefix.clone(),
            airflow_uri: resolved.environment.config.airflow_uri.clone(),
        }
    }
}

pub fn run(
    args: &EnvironmentArgs,
    api: &dyn CloudApi,
    config: &mut FugaConfig,
    prompt: &mut dyn PromptProvider,
    printer: &Printer,
) -> Result<()> {
    match args {
        EnvironmentArgs::Init => {
            EnvironmentBootstrapper {
                api,
                config,
                prompt,
            }
            .run()?;
        }
        EnvironmentArgs::Show => {
            let summary = show(api, config)?;
            printer.print_resources(&[summary])?;
        }
    }
    Ok(())
}

/// Fetch the configured resources without prompting.
pub fn show(api: &dyn CloudApi, config: &FugaConfig) -> Result<EnvironmentSummary> {
    let required = config.require(&[PROJECT_ID, BUCKET_NAME, ENVIRONMENT_PATH])?;
    let (project_id, bucket_name, environment_path) = (required[0], required[1], required[2]);

    let environment_path: EnvironmentPath = environment_path
        .parse()
        .with_context(|| format!("Invalid `{ENVIRONMENT_PATH}` in configuration"))?;
    let resolved = BootstrappedEnvironment {
        project: api.get_project(&ProjectId(project_id.to_owned()))?,
        bucket: api.get_bucket(&BucketName(bucket_name.to_owned()))?,
        environment: api.get_environment(&environment_path)?,
    };
    Ok(EnvironmentSummary::from(&resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cloud::testing::{bucket, environment, project, Call, FakeCloud},
        errors::MissingConfig,
    };
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use tempfile::TempDir;

    const ENVIRONMENT: &str = "projects/repro-lab/locations/asia-northeast1/environments/composer";

    fn configured(dir: &TempDir) -> FugaConfig {
        let mut config = FugaConfig::load(dir.path().join("config.yml"), Vec::new()).unwrap();
        config.set(PROJECT_ID, "repro-lab").unwrap();
        config.set(BUCKET_NAME, "fuga-data").unwrap();
        config.set(ENVIRONMENT_PATH, ENVIRONMENT).unwrap();
        config
    }

    #[test]
    fn test_show() {
        let dir = TempDir::new().unwrap();
        let config = configured(&dir);
        let cloud = FakeCloud {
            projects: vec![project("repro-lab", "Reproducible Lab")],
            buckets: RefCell::new(vec![bucket("fuga-data", "ASIA-NORTHEAST1")]),
            environments: vec![environment(
                ENVIRONMENT,
                EnvironmentState::Running,
                Some("gs://asia-northeast1-composer/dags"),
            )],
            ..Default::default()
        };

        let summary = show(&cloud, &config).unwrap();
        assert_eq!(
            summary,
            EnvironmentSummary {
                project_id: "repro-lab".to_owned(),
                project_name: "Reproducible Lab".to_owned(),
                bucket_name: "fuga-data".to_owned(),
                bucket_location: "ASIA-NORTHEAST1".to_owned(),
                environment_name: "composer".to_owned(),
                environment_path: ENVIRONMENT.to_owned(),
                state: EnvironmentState::Running,
                dag_gcs_prefix: Some("gs://asia-northeast1-composer/dags".to_owned()),
                airflow_uri: None,
            }
        );
    }

    #[test]
    fn test_show_requires_configuration_before_remote_calls() {
        let dir = TempDir::new().unwrap();
        let mut config = FugaConfig::load(dir.path().join("config.yml"), Vec::new()).unwrap();
        config.set(PROJECT_ID, "repro-lab").unwrap();
        let cloud = FakeCloud::default();

        let error = show(&cloud, &config).unwrap_err();
        let missing = error.downcast_ref::<MissingConfig>().unwrap();
        assert_eq!(missing.keys, vec!["bucket_name", "environment_path"]);
        assert_eq!(cloud.calls(), Vec::<Call>::new());
    }
}
